use std::io::Write;

use anyhow::{Context, bail};
use rollout_engine::{DegradeConfig, FeatureSummary, Rollout};

pub fn on(
    rollout: &Rollout,
    out: &mut impl Write,
    name: &str,
    percentage: u32,
    degrade: Option<(u64, f64)>,
) -> anyhow::Result<()> {
    let degrade = degrade.map(|(min, threshold)| DegradeConfig::new(min, threshold));
    match &degrade {
        Some(config) => writeln!(
            out,
            "Activating feature {name} at {percentage}% (degrade config set to a min of {} requests and a threshold of error of {:.1}%)...",
            config.min,
            config.threshold * 100.0
        )?,
        None => writeln!(out, "Activating feature {name} at {percentage}%...")?,
    }

    rollout
        .activate(name, percentage, degrade)
        .with_context(|| format!("activating {name}"))?;
    writeln!(out, "Feature flag {name} has been activated! :)")?;
    Ok(())
}

pub fn off(rollout: &Rollout, out: &mut impl Write, name: &str) -> anyhow::Result<()> {
    writeln!(out, "Deactivating feature {name}...")?;
    let removed = rollout
        .deactivate(name)
        .with_context(|| format!("deactivating {name}"))?;
    if removed {
        writeln!(out, "Feature flag {name} has been deactivated! :)")?;
    } else {
        writeln!(out, "Feature flag {name} was not stored, nothing to do")?;
    }
    Ok(())
}

pub fn list(rollout: &Rollout, out: &mut impl Write, format: &str) -> anyhow::Result<()> {
    let features = rollout.features().context("listing feature flags")?;

    match format {
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(&features)?)?;
        }
        "text" => {
            writeln!(out, "This is the list of all the available features:")?;
            if features.is_empty() {
                writeln!(out, "- No feature flags stored")?;
            }
            for feature in &features {
                writeln!(out, "- {}", describe(feature))?;
            }
        }
        other => bail!("unknown list format '{other}', expected text or json"),
    }
    Ok(())
}

pub fn check(
    rollout: &Rollout,
    out: &mut impl Write,
    name: &str,
    determinator: Option<&str>,
) -> anyhow::Result<()> {
    let active = rollout
        .is_active(name, determinator)
        .with_context(|| format!("evaluating {name}"))?;
    let state = if active { "active" } else { "inactive" };
    match determinator {
        Some(d) => writeln!(out, "Feature flag {name} is {state} for {d}")?,
        None => writeln!(out, "Feature flag {name} is {state}")?,
    }
    Ok(())
}

fn describe(feature: &FeatureSummary) -> String {
    let mut line = format!(
        "{}: {}% (requests: {}, errors: {})",
        feature.name, feature.percentage, feature.requests, feature.errors
    );
    if let Some(degrade) = &feature.degrade {
        line.push_str(&format!(
            ", degrade at {:.1}% errors after {} requests",
            degrade.threshold * 100.0,
            degrade.min
        ));
    }
    if feature.degraded {
        line.push_str(" [degraded]");
    }
    line
}
