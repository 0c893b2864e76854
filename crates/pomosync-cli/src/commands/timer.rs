use std::time::Duration;

use clap::{Args, Subcommand};
use pomosync_core::{
    Config, Event, RecentTasks, ReqwestSessionApi, SyncEngine, TaskContext, TimerEngine,
    TimerProgress, TimerRunner, TimerState, TodoItem,
};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::{report, runtime, sync_engine, Remote};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run the timer in the foreground, printing events as JSON lines.
    /// The next run picks up the cycle where this one stopped.
    Run(RunArgs),
    /// Print the timer state the next run starts from, as JSON
    Status,
    /// Start the next run from the top of a new cycle
    Reset,
}

#[derive(Args)]
pub struct RunArgs {
    /// What you are working on (defaults to the last used task)
    #[arg(long)]
    task: Option<String>,
    /// Open todo item; repeatable
    #[arg(long = "todo")]
    todos: Vec<String>,
    /// Already finished todo item; repeatable
    #[arg(long = "done")]
    done: Vec<String>,
    /// Stop after this many work phases
    #[arg(long)]
    cycles: Option<u32>,
}

fn emit(event: &Event) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

pub fn run(action: TimerAction, remote: &Remote) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;

    match action {
        TimerAction::Status => {
            let engine = TimerEngine::new(config.timer.clone()).with_progress(TimerProgress::load());
            println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
        }
        TimerAction::Reset => {
            TimerProgress::default().save()?;
            println!("timer cycle reset");
        }
        TimerAction::Run(args) => {
            let sync = sync_engine(remote, &config)?;
            if !sync.auth().is_authenticated() {
                eprintln!("warning: not signed in; sessions will not be saved");
            }
            let mut recent = RecentTasks::load();
            let task = args
                .task
                .or_else(|| recent.preselect().map(str::to_string))
                .unwrap_or_default();
            if !task.trim().is_empty() {
                recent.remember(&task);
                if let Err(error) = recent.save() {
                    warn!(%error, "could not update recent task cache");
                }
            }

            let todos = args
                .todos
                .into_iter()
                .map(TodoItem::new)
                .chain(args.done.into_iter().map(TodoItem::done))
                .collect();
            let context = TaskContext {
                current_task: task,
                todos,
            };
            let engine = TimerEngine::new(config.timer.clone()).with_progress(TimerProgress::load());
            let mut runner = TimerRunner::new(engine, context);
            let result = runtime()?.block_on(run_loop(&mut runner, &sync, args.cycles));
            if let Err(error) = runner.engine().progress().save() {
                warn!(%error, "could not save timer progress");
            }
            result?;
        }
    }
    Ok(())
}

async fn run_loop(
    runner: &mut TimerRunner,
    sync: &SyncEngine<ReqwestSessionApi>,
    cycles: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(event) = runner.engine_mut().start() {
        emit(&event)?;
    }
    sync.refresh_stats().await;
    report(&sync.snapshot());

    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    ticker.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut work_done = 0u32;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                if let Some(event) = runner.engine_mut().pause() {
                    emit(&event)?;
                }
                break;
            }
            _ = ticker.tick() => {
                let outcome = runner.tick();
                for event in &outcome.events {
                    emit(event)?;
                }

                match outcome.session {
                    Some(record) => {
                        work_done += 1;
                        if let Err(error) = sync.add_session(record).await {
                            eprintln!("warning: {error}");
                        }
                        report(&sync.snapshot());
                    }
                    None if outcome.events.iter().any(|e| matches!(e, Event::PhaseCompleted(_))) => {
                        sync.refresh_stats().await;
                    }
                    None => {}
                }

                if cycles.is_some_and(|n| work_done >= n) {
                    break;
                }
                if !outcome.events.is_empty() && runner.engine().state() == TimerState::Idle {
                    eprintln!("phase finished; start the next one with `pomosync timer run`");
                    break;
                }
            }
        }
    }
    Ok(())
}
