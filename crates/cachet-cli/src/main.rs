// Entry point for the cachet demo binary.

mod tasks;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use cachet_core::app::QueueCounts;
use cachet_core::config::LogFormat;
use cachet_core::impls::InMemoryRecordStore;
use cachet_core::observability::init_logging;
use cachet_core::{App, ResultView, Settings, Task, TaskId};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::tasks::{
    Flaky, FlakyHandler, ProcessMessage, ProcessMessageHandler, SendEmail, SendEmailHandler,
};

/// cachet - cache-aside reads and background tasks with retries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML settings file; defaults plus CACHET_* variables when omitted
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the example tasks and a cache-aside read/update/read cycle
    Demo {
        /// Worker count, overriding the settings
        #[arg(short, long)]
        workers: Option<usize>,

        /// Retry base delay for this run, so the demo does not wait out production backoff
        #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
        retry_base_delay: Duration,

        /// Give up waiting for a task result after this long
        #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
        timeout: Duration,

        /// Log format, overriding the settings
        #[arg(long, value_parser = parse_log_format)]
        log_format: Option<LogFormat>,
    },

    /// Print the effective settings as YAML
    Config,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse()
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Settings::from_env().context("failed to read settings from environment"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_ref())?;

    match args.command {
        Command::Config => {
            print!("{}", serde_yaml::to_string(&settings)?);
            Ok(())
        }
        Command::Demo {
            workers,
            retry_base_delay,
            timeout,
            log_format,
        } => {
            if let Some(workers) = workers {
                settings.workers.count = workers;
            }
            if let Some(format) = log_format {
                settings.logging.format = format;
            }
            settings.retry.base_delay = retry_base_delay;
            init_logging(&settings.logging);

            tokio::select! {
                result = run_demo(settings, timeout) => result,
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    Ok(())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Example {
    name: String,
    description: Option<String>,
}

async fn run_demo(settings: Settings, timeout: Duration) -> Result<()> {
    let app = App::builder()
        .settings(settings)
        .register::<ProcessMessage, _>(ProcessMessageHandler {
            work: Duration::from_millis(200),
        })?
        .register::<SendEmail, _>(SendEmailHandler {
            work: Duration::from_millis(100),
        })?
        .register::<Flaky, _>(FlakyHandler::new(2))?
        .expect_tasks(&[ProcessMessage::TYPE, SendEmail::TYPE, Flaky::TYPE])
        .build()?;
    info!(task_types = ?app.registry().registered_types(), "handlers registered");

    let pool = app.spawn_workers();
    let sweeper = app.sweeper().spawn();

    let submissions = vec![
        (
            "process message",
            app.submit(&ProcessMessage {
                message: "hello".into(),
            })
            .await?,
        ),
        (
            "send email",
            app.submit(&SendEmail {
                recipient: "user@example.com".into(),
                subject: "Welcome".into(),
                body: "Thanks for signing up.".into(),
            })
            .await?,
        ),
        (
            "send email (bad recipient)",
            app.submit(&SendEmail {
                recipient: "nobody".into(),
                subject: "Welcome".into(),
                body: "Thanks for signing up.".into(),
            })
            .await?,
        ),
        (
            "flaky",
            app.submit(&Flaky {
                label: "eventually".into(),
            })
            .await?,
        ),
    ];

    for (label, submission) in &submissions {
        println!("{label}: {}", serde_json::to_string(submission)?);
    }

    for (label, submission) in &submissions {
        let view = wait_for_result(&app, submission.task_id, timeout).await?;
        let status = app.task_status(submission.task_id).await?;
        println!("{label} -> {}", serde_json::to_string(&view)?);
        if let Some(status) = status {
            println!("  state={:?} retries={}", status.state, status.attempt);
        }
    }

    cache_aside_demo(&app).await?;

    let counts: QueueCounts = app.counts().await?;
    println!("queue: {}", serde_json::to_string(&counts)?);

    pool.shutdown_and_join().await;
    sweeper.shutdown_and_join().await;
    Ok(())
}

async fn wait_for_result(app: &App, task_id: TaskId, timeout: Duration) -> Result<ResultView> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(view) = app.result(task_id).await? {
            return Ok(view);
        }
        if let Some(state) = app.task_state(task_id).await?
            && state.is_terminal()
        {
            // Finished, yet no result: expired or never recorded.
            bail!("{task_id} is {state:?} but has no result");
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("no result for {task_id} after {}", humantime::format_duration(timeout));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn cache_aside_demo(app: &App) -> Result<()> {
    let store = Arc::new(InMemoryRecordStore::<Example>::new("example"));
    let cache = app.cache_aside(Arc::clone(&store));

    let id = store.create(Example {
        name: "first".into(),
        description: None,
    });

    let first = cache.read(&id).await?;
    let second = cache.read(&id).await?;
    println!(
        "cache-aside: read {:?} then {:?}, durable fetches={}",
        first.map(|e| e.name),
        second.map(|e| e.name),
        store.fetch_count()
    );

    // Commit first, then invalidate.
    store.update(
        &id,
        Example {
            name: "renamed".into(),
            description: Some("updated".into()),
        },
    );
    cache.invalidate(&id).await;

    let third = cache.read(&id).await?;
    println!(
        "cache-aside: after update read {:?}, durable fetches={}",
        third.map(|e| (e.name, e.description)),
        store.fetch_count()
    );

    let missing = cache.read("999").await?;
    println!("cache-aside: missing record -> {missing:?}");
    Ok(())
}
