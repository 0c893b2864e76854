use clap::Subcommand;
use pomosync_core::error::SyncError;
use pomosync_core::{Config, NewSession, RecentTasks, Session};
use serde::Serialize;
use tracing::warn;

use super::{report, runtime, sync_engine, Remote};

#[derive(Subcommand)]
pub enum SessionsAction {
    /// Refresh and print the session list as JSON
    List,
    /// Record a session by hand
    Add {
        /// Duration in minutes
        #[arg(long)]
        duration: u32,
        /// Task label
        #[arg(long)]
        task: String,
        /// Mark the session as not completed
        #[arg(long)]
        incomplete: bool,
    },
}

#[derive(Serialize)]
struct SessionRow<'a> {
    #[serde(flatten)]
    session: &'a Session,
    status: pomosync_core::sync::SessionSyncStatus,
}

fn rows(sessions: &[Session]) -> Vec<SessionRow<'_>> {
    sessions
        .iter()
        .map(|session| SessionRow {
            session,
            status: session.sync_status(),
        })
        .collect()
}

pub fn run(action: SessionsAction, remote: &Remote) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let engine = sync_engine(remote, &config)?;
    if !engine.auth().is_authenticated() {
        return Err(SyncError::Unauthenticated.into());
    }
    let rt = runtime()?;

    match action {
        SessionsAction::List => {
            rt.block_on(engine.refresh_stats());
            let snapshot = engine.snapshot();
            report(&snapshot);
            println!("{}", serde_json::to_string_pretty(&rows(&snapshot.sessions))?);
        }
        SessionsAction::Add {
            duration,
            task,
            incomplete,
        } => {
            if duration == 0 {
                return Err("duration must be at least one minute".into());
            }
            let record = NewSession::new(duration, task.trim(), !incomplete);

            let mut recent = RecentTasks::load();
            recent.remember(&record.task);
            if let Err(error) = recent.save() {
                warn!(%error, "could not update recent task cache");
            }

            rt.block_on(engine.add_session(record))?;
            let snapshot = engine.snapshot();
            report(&snapshot);
            if let Some(head) = snapshot.sessions.first() {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&SessionRow {
                        session: head,
                        status: head.sync_status(),
                    })?
                );
            }
        }
    }
    Ok(())
}
