use anyhow::Context;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use ollie_calendar::{
    CalendarPage,
    agenda::format_agenda_text,
    command_mode::{CommandOutput, execute, parse_command},
    identity::{Identity, SessionStore},
    sample_data::add_sample_appointments,
    storage::config::Config,
};

mod cli;
use cli::{CliMode, USAGE, parse_cli_mode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = match parse_cli_mode() {
        Ok(options) => options,
        Err(err) => {
            eprintln!("Error: {}", err);
            println!("{}", USAGE);
            return Ok(());
        }
    };

    if options.mode == CliMode::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = match &options.config_path {
        Some(path) => Config::load_from(path),
        None => Config::load_or_create(),
    }
    .context("Failed to load configuration")?;

    let _guard = setup_logging(&config.log.level);

    let session = SessionStore::global();
    let subscription = session.subscribe(|identity| match identity {
        Some(identity) => tracing::info!(email = %identity.email, "Practitioner signed in"),
        None => tracing::info!("Practitioner signed out"),
    });
    if let Some(email) = &options.practitioner_email {
        session
            .sign_in(Identity {
                uid: email.clone(),
                email: email.clone(),
                display_name: None,
            })
            .context("Failed to sign in")?;
    }

    let mut page = CalendarPage::from_config(&config).context("Invalid calendar configuration")?;
    let today = page.today(Utc::now());
    if options.sample {
        add_sample_appointments(&mut page, today);
    }

    let result = match options.mode {
        CliMode::AgendaDate(date) => {
            let date = date.unwrap_or(today);
            let occurrences = page.events_for_date(date)?;
            println!("{}", format_agenda_text(date, &occurrences, page.tz));
            Ok(())
        }
        _ => run_interactive(&mut page).await,
    };

    if let Err(e) = session.sign_out() {
        tracing::warn!("Sign-out failed: {}", e);
    }
    session.unsubscribe(subscription);
    tracing::info!("ollie stopped");
    result
}

async fn run_interactive(page: &mut CalendarPage) -> anyhow::Result<()> {
    println!("ollie calendar – type :help for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match execute(parse_command(&line), page, Utc::now()) {
            Ok(CommandOutput::Quit) => break,
            Ok(CommandOutput::Lines(output)) => {
                for line in output {
                    println!("{}", line);
                }
            }
            Ok(CommandOutput::Nothing) => {}
            Err(e) => {
                eprintln!("Error: {}", e);
                tracing::error!("Command '{}' failed: {}", line.trim(), e);
            }
        }
    }

    Ok(())
}

fn setup_logging(default_level: &str) -> WorkerGuard {
    let log_dir = Config::config_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "ollie.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    tracing::info!("ollie started");
    guard
}
