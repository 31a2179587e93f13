mod clock;
mod router;
mod session;
mod ticker;
mod timezone;
mod ui;
mod views;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{NaiveTime, Utc};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::clock::render::{AnalogClock, ClockTime, DEFAULT_CLOCK_SIZE, DisplayList};
use crate::router::{Navigator, Route};
use crate::session::events::{SESSION_INVALID_STATUS, install_session_guard};
use crate::session::service::SessionService;
use crate::session::store::{FileStore, MemoryStore, TokenStore};
use crate::session::transport::HttpTransport;
use crate::timezone::delta::{display_delta, parse_delta, wall_clock_at};
use crate::ticker::DEFAULT_TICK_INTERVAL;
use crate::ui::app::GuiConfig;

#[derive(Parser, Debug)]
#[command(
    name = "tzclock",
    version,
    about = "Timezone list with live analog clocks, backed by a REST API"
)]
struct Cli {
    #[arg(long, env = "TZCLOCK_API_BASE", default_value = "http://127.0.0.1:8080")]
    api_base: String,

    /// Where a logged-in token is kept between runs.
    #[arg(long, default_value = "tzclock-session.json")]
    state_file: PathBuf,

    #[arg(long, default_value_t = DEFAULT_TICK_INTERVAL.as_millis() as u64)]
    tick_ms: u64,

    #[arg(long, default_value_t = DEFAULT_CLOCK_SIZE)]
    clock_size: f32,

    /// Log filter, e.g. `tzclock=debug`.
    #[arg(long, default_value = "tzclock=info")]
    log: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the desktop window (default).
    Gui {
        /// Start on this view, e.g. `/timezones?q=york`.
        #[arg(long, default_value = "/login")]
        route: String,
    },
    Login {
        login: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        remember: bool,
    },
    Logout,
    Whoami,
    List {
        #[arg(long)]
        query: Option<String>,
    },
    /// Parse a GMT delta such as `+5:30` and print it in seconds.
    Delta {
        #[arg(allow_hyphen_values = true)]
        text: String,
    },
    /// Print the analog hand angles for a wall time or the current time at a delta.
    Clock {
        /// Wall time as HH:MM:SS; defaults to now.
        #[arg(long)]
        at: Option<String>,
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        delta: String,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.tick_ms == 0 {
        bail!("--tick-ms must be greater than zero");
    }
    if !(cli.clock_size.is_finite() && cli.clock_size > 0.0) {
        bail!("--clock-size must be a positive number");
    }
    init_logging(&cli.log)?;

    let command = cli.command.unwrap_or(Command::Gui {
        route: Route::Login.path(),
    });
    match &command {
        Command::Delta { text } => {
            let seconds = parse_delta(text).with_context(|| format!("invalid delta '{text}'"))?;
            println!("{seconds}\t{}", display_delta(seconds));
            return Ok(());
        }
        Command::Clock { at, delta } => return print_clock(cli.clock_size, at.as_deref(), delta),
        _ => {}
    }

    let durable = FileStore::new(&cli.state_file);
    debug!(state_file = %durable.path().display(), "using state file");
    let tokens = Arc::new(TokenStore::new(
        Box::new(durable),
        Box::new(MemoryStore::new()),
    ));
    let transport = HttpTransport::new(&cli.api_base)
        .with_context(|| format!("failed to build HTTP client for {}", cli.api_base))?;
    debug!(api_base = %transport.base_url(), "using backend");
    let session = Arc::new(SessionService::new(Box::new(transport), tokens));
    let navigator = Navigator::new(Route::Login);
    install_session_guard(&session, navigator.clone());

    match command {
        Command::Gui { route } => {
            navigator.navigate(Route::parse(&route));
            ui::app::run_gui(
                session,
                navigator,
                GuiConfig {
                    api_base: cli.api_base,
                    tick_interval: Duration::from_millis(cli.tick_ms),
                    clock_size: cli.clock_size,
                },
            )
        }
        Command::Login {
            login,
            password,
            remember,
        } => {
            session
                .login(&login, &password, remember)
                .with_context(|| format!("login as '{login}' failed"))?;
            let name = session
                .get_user()
                .context("server issued an unreadable token")?
                .map(|user| user.display_name().to_string())
                .unwrap_or(login);
            println!("logged in as {name}");
            Ok(())
        }
        Command::Logout => {
            session.logout().context("failed to clear stored session")?;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => {
            match session.get_user().context("stored token is unreadable")? {
                Some(user) => match user.id {
                    Some(id) => println!("{} ({}) #{id}", user.login, user.display_name()),
                    None => println!("{} ({})", user.login, user.display_name()),
                },
                None => println!("not logged in"),
            }
            Ok(())
        }
        Command::List { query } => {
            let timezones = match session.list(query.as_deref()) {
                Ok(timezones) => timezones,
                Err(err) if err.status() == Some(SESSION_INVALID_STATUS) => {
                    return Err(anyhow::Error::new(err)
                        .context("session expired or invalid, log in again"));
                }
                Err(err) => return Err(anyhow::Error::new(err).context("failed to list timezones")),
            };
            let now_ms = Utc::now().timestamp_millis();
            for timezone in timezones {
                let time = wall_clock_at(now_ms, timezone.gmt_delta_seconds)
                    .map(|wall| wall.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "--:--:--".to_string());
                let id = timezone.id.map(|id| id.to_string()).unwrap_or_default();
                println!(
                    "{id}\t{}\t{}\t{time}",
                    timezone.city,
                    display_delta(timezone.gmt_delta_seconds)
                );
            }
            Ok(())
        }
        Command::Delta { .. } | Command::Clock { .. } => Ok(()),
    }
}

fn print_clock(size: f32, at: Option<&str>, delta: &str) -> Result<()> {
    let time = match at {
        Some(text) => NaiveTime::parse_from_str(text, "%H:%M:%S")
            .with_context(|| format!("invalid --at '{text}', expected HH:MM:SS"))?
            .into(),
        None => {
            let seconds = parse_delta(delta).with_context(|| format!("invalid delta '{delta}'"))?;
            let wall = wall_clock_at(Utc::now().timestamp_millis(), seconds)
                .with_context(|| format!("delta '{delta}' is out of range"))?;
            ClockTime::from(wall)
        }
    };

    let mut frame = DisplayList::default();
    let angles = AnalogClock::new(size)
        .tick(&mut frame, Some(time))
        .context("time is not representable")?;
    let wall = time
        .wall_time()
        .map(|wall| wall.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    println!(
        "{wall}\thour {:.1}\tminute {:.1}\tsecond {:.1}\t({} draw ops)",
        angles.hour.to_degrees(),
        angles.minute.to_degrees(),
        angles.second.to_degrees(),
        frame.ops.len()
    );
    Ok(())
}

fn init_logging(filter: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_new(filter).with_context(|| format!("invalid --log filter '{filter}'"))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
    Ok(())
}
