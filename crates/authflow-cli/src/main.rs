//! authflow - log in to an auth server and manage the stored session.
//!
//! A thin terminal front end over `authflow-core`: each command raises intent
//! events into the session controller and prints every state it publishes.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use authflow_core::auth::{FileBackend, TokenStore};
use authflow_core::session::SessionDiagnostic;
use authflow_core::{ApiClient, Config, Credentials, SessionController, SessionState};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// Constants
// ============================================================================

const USERNAME_ENV: &str = "AUTHFLOW_USERNAME";
const PASSWORD_ENV: &str = "AUTHFLOW_PASSWORD";

const USAGE: &str = "\
Usage: authflow <command>

Commands:
  login [username]   Log in and store the session
  status             Check whether a stored session is still valid
  logout             Clear the stored session

Environment:
  AUTHFLOW_BASE_URL   Auth server base URL
  AUTHFLOW_USERNAME   Username for login
  AUTHFLOW_PASSWORD   Password for login (skips the prompt)
  RUST_LOG            Log filter (default: warn)";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Login(Option<String>),
    Status,
    Logout,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        Some("login") => Ok(Command::Login(args.get(1).cloned())),
        Some("status") => Ok(Command::Status),
        Some("logout") => Ok(Command::Logout),
        None | Some("help") | Some("--help") | Some("-h") => Ok(Command::Help),
        Some(other) => Err(anyhow::anyhow!("Unknown command: {}\n\n{}", other, USAGE)),
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = Config::load()?;
    let client = ApiClient::new(&config)?;
    let store = Arc::new(TokenStore::new(FileBackend::new(config.cache_dir()?)));
    info!(base_url = client.base_url(), session_file = ?store.backend().path(), "authflow starting");

    run(command, client, store, &mut config).await
}

async fn run(
    command: Command,
    client: ApiClient,
    store: Arc<TokenStore<FileBackend>>,
    config: &mut Config,
) -> Result<ExitCode> {
    let handle = SessionController::spawn(client, store);
    let mut states = handle.subscribe();
    let mut diagnostics = handle.subscribe_diagnostics();

    let final_state = match command {
        Command::Login(username) => {
            let credentials = prompt_credentials(username, config)?;
            let username = credentials.username.clone();
            println!("Authenticating...");
            handle.submit(credentials).await?;

            let state = wait_until_settled(&mut states).await?;
            if state.is_authenticated() {
                config.last_username = Some(username);
                if let Err(e) = config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
            state
        }
        Command::Status => {
            handle.check_stored_session().await?;
            wait_until_settled(&mut states).await?
        }
        Command::Logout => {
            handle.check_stored_session().await?;
            match wait_until_settled(&mut states).await? {
                SessionState::Authenticated { .. } => {
                    handle.reset().await?;
                    wait_until_settled(&mut states).await?
                }
                other => other,
            }
        }
        Command::Help => {
            println!("{}", USAGE);
            return Ok(ExitCode::SUCCESS);
        }
    };

    while let Ok(diagnostic) = diagnostics.try_recv() {
        match diagnostic {
            SessionDiagnostic::TokenWriteFailed { detail } => {
                eprintln!("Warning: session could not be saved: {}", detail)
            }
            SessionDiagnostic::TokenClearFailed { detail } => {
                eprintln!("Warning: stored session could not be removed: {}", detail)
            }
        }
    }

    Ok(match final_state {
        SessionState::Failed { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

/// Print published states until one other than `Loading` arrives
async fn wait_until_settled(states: &mut broadcast::Receiver<SessionState>) -> Result<SessionState> {
    loop {
        match states.recv().await {
            Ok(SessionState::Loading) => {}
            Ok(state) => {
                render(&state);
                return Ok(state);
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed session updates"),
            Err(RecvError::Closed) => {
                return Err(anyhow::anyhow!("Session controller stopped unexpectedly"))
            }
        }
    }
}

fn render(state: &SessionState) {
    match state {
        SessionState::Initial => println!("Not logged in."),
        SessionState::Loading => println!("Working..."),
        SessionState::Authenticated { token } => match token.expires_at {
            Some(expiry) => println!("Logged in (expires {}).", expiry.format("%Y-%m-%d %H:%M UTC")),
            None => println!("Logged in."),
        },
        SessionState::Failed { detail, .. } => println!("Login failed: {}", detail),
    }
}

fn prompt_credentials(username: Option<String>, config: &Config) -> Result<Credentials> {
    let username = match username.or_else(|| std::env::var(USERNAME_ENV).ok()) {
        Some(username) => username,
        None => prompt_username(config.last_username.as_deref())?,
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    Ok(Credentials::new(username, password))
}

fn prompt_username(last_username: Option<&str>) -> Result<String> {
    match last_username {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last_username) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}
