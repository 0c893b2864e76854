use clap::Subcommand;
use pomosync_core::error::SyncError;
use pomosync_core::{Config, Stats};

use super::{report, runtime, sync_engine, Remote};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Refresh and print the stats snapshot
    Show,
}

pub fn run(action: StatsAction, remote: &Remote) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let engine = sync_engine(remote, &config)?;
    if !engine.auth().is_authenticated() {
        return Err(SyncError::Unauthenticated.into());
    }

    match action {
        StatsAction::Show => {
            runtime()?.block_on(engine.refresh_stats());
            let snapshot = engine.snapshot();
            report(&snapshot);
            let stats = snapshot.stats.unwrap_or_else(Stats::empty);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
