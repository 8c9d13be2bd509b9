use std::io::Write;

use anyhow::Context;
use rollout_engine::{MigrateOptions, Rollout};

pub fn migrate(rollout: &Rollout, out: &mut impl Write, skip_existing: bool) -> anyhow::Result<()> {
    writeln!(out, "Starting the migration...")?;

    let report = rollout
        .migrate_legacy_with(MigrateOptions { skip_existing })
        .context("migrating legacy flags")?;

    for flag in &report.migrated {
        writeln!(
            out,
            "Migrated key from {} to {}. Migrating data from '{}' to '{}'.",
            flag.legacy_key, flag.key, flag.legacy_value, flag.value
        )?;
    }
    for name in &report.skipped {
        writeln!(out, "Skipped {name}, a current record already exists.")?;
    }

    writeln!(out, "Migration has finished!")?;
    Ok(())
}
