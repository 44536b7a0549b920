use std::{io::Write, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use taskfocus::{
    config::ServerConfig,
    db::{helpers::parse_date, Database},
    timer::{
        LocalRecorder, TickSource, TimerController, TimerDurations, TimerMode, TimerSnapshot,
    },
    ApiClient, SettingsStore,
};

const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

#[derive(Parser)]
#[command(name = "taskfocus", version, about = "Tasks with a Pomodoro focus timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        db: Option<PathBuf>,
        /// User assumed when a request names none
        #[arg(long)]
        user: Option<String>,
    },
    /// Interactive focus timer
    Focus {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        user: Option<String>,
        /// Task to bind before the first phase
        #[arg(long)]
        task: Option<i64>,
        #[arg(long)]
        focus_mins: Option<u32>,
        #[arg(long)]
        break_mins: Option<u32>,
        /// Remember the given durations and server
        #[arg(long)]
        save: bool,
        /// Record into a local database instead of a server
        #[arg(long)]
        local: bool,
        #[arg(long, requires = "local")]
        db: Option<PathBuf>,
    },
    /// List today's tasks
    Tasks {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// Show the sessions of one day
    History {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        user: Option<String>,
        /// YYYY-MM-DD, defaults to today (UTC)
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // The interactive timer keeps the terminal quiet unless RUST_LOG says otherwise.
    let default_filter = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(err) = run(cli.command).await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    let settings = SettingsStore::new(SettingsStore::default_path())?;

    match command {
        Commands::Serve { bind, db, user } => {
            let mut config = ServerConfig::from_env()?;
            if let Some(bind) = bind {
                config.bind = bind
                    .parse()
                    .with_context(|| format!("invalid bind address {bind:?}"))?;
            }
            if let Some(db) = db {
                config.db_path = db;
            }
            if let Some(user) = user {
                config.default_user = user;
            }

            let shutdown = CancellationToken::new();
            let trigger = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });
            taskfocus::serve(config, shutdown).await
        }
        Commands::Focus {
            server,
            user,
            task,
            focus_mins,
            break_mins,
            save,
            local,
            db,
        } => {
            let saved = settings.durations();
            let durations = TimerDurations::new(
                phase_secs(focus_mins, saved.focus_secs, "--focus-mins")?,
                phase_secs(break_mins, saved.break_secs, "--break-mins")?,
            );
            if save {
                settings.update_durations(durations)?;
                if server.is_some() {
                    settings.update_server_url(server.clone())?;
                }
            }

            let controller = if local {
                let env_config = ServerConfig::from_env()?;
                let database = Database::new(db.unwrap_or(env_config.db_path))?;
                let username = user.unwrap_or(env_config.default_user);
                let (owner, _) = database.ensure_user(&username).await?;
                let recorder = Arc::new(LocalRecorder::new(database, owner.id));
                TimerController::spawn(
                    Arc::clone(&recorder),
                    recorder,
                    durations,
                    TickSource::default(),
                )
            } else {
                let client = Arc::new(client_for(server, user, &settings));
                TimerController::spawn(
                    Arc::clone(&client),
                    client,
                    durations,
                    TickSource::default(),
                )
            };

            if let Some(task_id) = task {
                controller.select_task(task_id).await?;
            }
            run_focus_loop(controller).await
        }
        Commands::Tasks { server, user } => {
            let client = client_for(server, user, &settings);
            let tasks = client.list_tasks().await?;
            if tasks.is_empty() {
                println!("No tasks for today.");
            }
            for task in tasks {
                let mark = if task.completed { "x" } else { " " };
                println!(
                    "[{mark}] #{:<4} {:<7} {} ({}/{} min)",
                    task.id,
                    task.priority.as_str(),
                    task.text,
                    task.actual_minutes,
                    task.estimated_minutes
                );
            }
            Ok(())
        }
        Commands::History { server, user, date } => {
            let client = client_for(server, user, &settings);
            let date = match date {
                Some(raw) => parse_date(&raw, "date")?,
                None => Utc::now().date_naive(),
            };
            print_history(&client, date).await
        }
    }
}

fn phase_secs(minutes: Option<u32>, saved_secs: u32, flag: &str) -> Result<u32> {
    match minutes {
        Some(mins) => TimerDurations::secs_from_minutes(mins)
            .with_context(|| format!("{flag} {mins} is too large")),
        None => Ok(saved_secs),
    }
}

fn client_for(server: Option<String>, user: Option<String>, settings: &SettingsStore) -> ApiClient {
    let base_url = server
        .or_else(|| settings.server_url())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let client = ApiClient::new(base_url);
    match user {
        Some(user) => client.with_user(user),
        None => client,
    }
}

async fn print_history(client: &ApiClient, date: NaiveDate) -> Result<()> {
    let history = client.session_history(date).await?;
    println!("Sessions on {date}:");
    for record in &history.sessions {
        let session = &record.session;
        println!(
            "  {} {:<5} {:>3} min {}{}",
            session.started_at.format("%H:%M"),
            session.kind.as_str(),
            session.duration_secs / 60,
            if session.completed { "done" } else { "open" },
            record
                .task_text
                .as_deref()
                .map(|text| format!("  {text}"))
                .unwrap_or_default()
        );
    }
    let stats = &history.stats;
    println!(
        "{} sessions, {} focus ({} completed, {}%), {} min focused",
        stats.total_sessions,
        stats.focus_sessions,
        stats.completed_focus_sessions,
        stats.completion_rate,
        stats.total_focus_time_seconds / 60
    );
    Ok(())
}

const HELP: &str = "commands: [enter] start/pause  r reset  f focus  b break  t <id> task  d drop task  x <id> task done elsewhere  q quit";

async fn run_focus_loop(controller: TimerController) -> Result<()> {
    println!("{HELP}");
    render(&controller.snapshot());

    let mut updates = controller.subscribe();
    let renderer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            render(&snapshot);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let mut parts = line.split_whitespace();
        let result = match (parts.next(), parts.next()) {
            (None, _) => controller.toggle().await,
            (Some("r"), _) => controller.reset().await,
            (Some("f"), _) => controller.switch_mode(TimerMode::Focus).await,
            (Some("b"), _) => controller.switch_mode(TimerMode::Break).await,
            (Some("d"), _) => controller.deselect_task().await,
            (Some("t"), Some(id)) => match id.parse() {
                Ok(task_id) => controller.select_task(task_id).await,
                Err(_) => {
                    println!("\ntask id must be a number");
                    continue;
                }
            },
            (Some("x"), Some(id)) => match id.parse() {
                Ok(task_id) => controller.task_removed(task_id).await,
                Err(_) => {
                    println!("\ntask id must be a number");
                    continue;
                }
            },
            (Some("q"), _) => break,
            _ => {
                println!("\n{HELP}");
                continue;
            }
        };
        result?;
    }

    controller.shutdown();
    renderer.abort();
    println!();
    Ok(())
}

fn render(snapshot: &TimerSnapshot) {
    let mode = match snapshot.mode {
        TimerMode::Focus => "FOCUS",
        TimerMode::Break => "BREAK",
    };
    let state = if snapshot.running { "running" } else { "paused " };
    let task = snapshot
        .active_task_id
        .map(|id| format!("task #{id}"))
        .unwrap_or_else(|| "no task".to_string());

    print!(
        "\r{mode} {:02}:{:02} {state} | {task} | {} done    ",
        snapshot.remaining_secs / 60,
        snapshot.remaining_secs % 60,
        snapshot.completed_focus_count
    );
    let _ = std::io::stdout().flush();
}
