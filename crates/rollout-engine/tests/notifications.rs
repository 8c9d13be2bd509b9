//! Lifecycle notifications.

use rollout_engine::notify::{Channel, Published, RecordingChannel};
use rollout_engine::{Notifier, Rollout, TextChannel};
use rollout_store::MemoryStore;

struct Unreachable;

impl TextChannel for Unreachable {
    fn publish(&self, _text: &str) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }
}

#[test]
fn activate_and_deactivate_are_announced() {
    let text = RecordingChannel::new();
    let mail = RecordingChannel::new();
    let rollout = Rollout::new(MemoryStore::new()).with_notifications(
        Notifier::default()
            .on_status_change(Channel::text(text.clone()))
            .on_status_change(Channel::mail(mail.clone())),
    );

    rollout.activate_percentage("search", 20).unwrap();
    rollout.deactivate("search").unwrap();

    assert_eq!(
        text.texts(),
        vec![
            "Feature flag 'search' has been activated with percentage 20!",
            "Feature flag 'search' has been deactivated and deleted!",
        ]
    );
    assert_eq!(
        mail.messages(),
        vec![
            Published {
                subject: Some("Feature flag has been activated!".into()),
                text: "Feature flag 'search' has been activated with percentage 20!".into(),
            },
            Published {
                subject: Some("Feature flag has been deactivated!".into()),
                text: "Feature flag 'search' has been deactivated and deleted!".into(),
            },
        ]
    );
}

#[test]
fn deactivating_a_missing_flag_still_notifies() {
    let text = RecordingChannel::new();
    let rollout = Rollout::new(MemoryStore::new())
        .with_notifications(Notifier::default().on_status_change(Channel::text(text.clone())));

    assert!(!rollout.deactivate("ghost").unwrap());
    assert_eq!(text.texts().len(), 1);
}

#[test]
fn failed_activation_is_not_announced() {
    let store = MemoryStore::new();
    let text = RecordingChannel::new();
    let rollout = Rollout::new(store.clone())
        .with_notifications(Notifier::default().on_status_change(Channel::text(text.clone())));

    store.set_available(false);
    assert!(rollout.activate_fully("search").is_err());
    assert!(text.texts().is_empty());
}

#[test]
fn publish_failure_does_not_fail_the_operation() {
    let text = RecordingChannel::new();
    let rollout = Rollout::new(MemoryStore::new()).with_notifications(
        Notifier::default()
            .on_status_change(Channel::text(Unreachable))
            .on_status_change(Channel::text(text.clone())),
    );

    rollout.activate_fully("search").unwrap();
    assert!(rollout.is_active("search", None).unwrap());
    assert_eq!(text.texts().len(), 1);
}

#[test]
fn degrade_channels_do_not_hear_status_changes() {
    let degrade = RecordingChannel::new();
    let rollout = Rollout::new(MemoryStore::new())
        .with_notifications(Notifier::default().on_degrade(Channel::text(degrade.clone())));

    rollout.activate_fully("search").unwrap();
    rollout.deactivate("search").unwrap();
    assert!(degrade.messages().is_empty());
}
