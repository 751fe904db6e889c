//! garmin-connect - command line access to Garmin Connect.
//!
//! Signs in once, keeps the session in a state file and reuses it on later
//! runs. The session is renewed transparently when Garmin expires it, using
//! `GARMIN_PASSWORD` or else the password kept in the OS keychain.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use garmin_connect_core::api::DUMP_TARGET;
use garmin_connect_core::{
    ApiClient, ApiError, Config, CredentialStore, Credentials, SessionFile, SessionState,
};
use tracing::{debug, info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variables consulted before prompting for credentials
const EMAIL_VAR: &str = "GARMIN_EMAIL";
const PASSWORD_VAR: &str = "GARMIN_PASSWORD";

#[derive(Parser)]
#[command(name = "garmin-connect", version, about = "Access Garmin Connect from the command line")]
struct Cli {
    /// State file to use
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    /// File to dump requests and responses to
    #[arg(short, long, global = true)]
    dump: Option<PathBuf>,

    /// Verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session
    Authenticate,
    /// End the session and forget the stored credentials
    Signout,
    /// Show the profile of a user, yourself by default
    Info { display_name: Option<String> },
    /// Get data from Garmin Connect, print to stdout
    Get {
        url: String,
        /// Format output as indented JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the dump file and must live until exit.
fn init_tracing(verbose: bool, dump: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let (dump_layer, guard) = match dump {
        Some(path) => {
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid dump file {}", path.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(Targets::new().with_target(DUMP_TARGET, Level::TRACE));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_filter(filter))
        .with(dump_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.dump.as_deref())?;

    let mut config = Config::load()?;
    if cli.dump.is_some() {
        config.dump_http = true;
    }

    let session_file = SessionFile::new(match cli.state {
        Some(path) => path,
        None => Config::session_path()?,
    });
    let state = session_file.load()?.unwrap_or_default();
    let client = ApiClient::with_state(config, state)?;
    restore_password(&client, std::env::var(EMAIL_VAR).ok(), std::env::var(PASSWORD_VAR).ok()).await;

    let result = run(&client, cli.command).await;

    // Store the state whatever happened, a renewal may have replaced the session
    if let Err(e) = save_state(&client, &session_file).await {
        warn!(error = %e, "Failed to save session");
    }

    result
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
    match command {
        Command::Authenticate => authenticate(client).await,
        Command::Signout => signout(client).await,
        Command::Info { display_name } => show_profile(client, display_name.as_deref().unwrap_or("")).await,
        Command::Get { url, json } => get(client, &url, json).await,
    }
}

/// Fill in the password for the email remembered in the state file, from
/// the environment or else the OS keychain
async fn restore_password(client: &ApiClient, env_email: Option<String>, env_password: Option<String>) {
    let credentials = client.credentials().await;
    if credentials.email.is_empty() || !credentials.password.is_empty() {
        return;
    }
    if let Some(password) = password_from_env(&credentials.email, env_email, env_password) {
        client.set_credentials(Credentials::new(credentials.email, password)).await;
        return;
    }
    match CredentialStore::load(&credentials.email) {
        Ok(credentials) => client.set_credentials(credentials).await,
        Err(e) => debug!(error = %e, "No stored password, session cannot be renewed"),
    }
}

/// `GARMIN_PASSWORD`, unless `GARMIN_EMAIL` names a different account
fn password_from_env(email: &str, env_email: Option<String>, env_password: Option<String>) -> Option<String> {
    let password = env_password.filter(|p| !p.is_empty())?;
    match env_email {
        Some(env_email) if env_email != email => None,
        _ => Some(password),
    }
}

/// Save the session without the password, which lives in the keychain
async fn save_state(client: &ApiClient, session_file: &SessionFile) -> Result<()> {
    let mut state = client.snapshot().await;
    let email = state.credentials().email.clone();
    state.set_credentials(Credentials::new(email, ""));
    session_file.save(&state)
}

async fn authenticate(client: &ApiClient) -> Result<()> {
    let email = match std::env::var(EMAIL_VAR) {
        Ok(email) => email,
        Err(_) => prompt_email()?,
    };
    let password = match std::env::var(PASSWORD_VAR) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };
    let credentials = Credentials::new(email, password);

    client.set_credentials(credentials.clone()).await;
    let profile = client.authenticate().await?;

    if let Err(e) = CredentialStore::store(&credentials) {
        warn!(error = %e, "Failed to store credentials");
    }

    info!(display_name = %profile.display_name, "Login successful");
    println!("Signed in as {} ({})", profile.name(), profile.display_name);
    Ok(())
}

async fn signout(client: &ApiClient) -> Result<()> {
    match client.signout().await {
        Ok(()) | Err(ApiError::NotAuthenticated) => {}
        Err(e) => return Err(e.into()),
    }

    let email = client.credentials().await.email;
    if !email.is_empty() {
        if let Err(e) = CredentialStore::delete(&email) {
            debug!(error = %e, "No stored credentials to delete");
        }
    }

    client.restore(SessionState::default()).await;
    println!("Signed out");
    Ok(())
}

async fn show_profile(client: &ApiClient, display_name: &str) -> Result<()> {
    let profile = client.social_profile(display_name).await?;

    let rows = [
        ("ID", profile.id.to_string()),
        ("Profile ID", profile.profile_id.to_string()),
        ("Display Name", profile.display_name.clone()),
        ("Name", profile.full_name.clone()),
        ("Location", profile.location.clone().unwrap_or_default()),
        ("Level", profile.user_level.map(|l| l.to_string()).unwrap_or_default()),
        ("Points", profile.user_point.map(|p| p.to_string()).unwrap_or_default()),
        ("Profile Image", profile.profile_image_url_large.clone().unwrap_or_default()),
    ];
    for (label, value) in rows {
        println!("{:<14} {}", label, value);
    }
    Ok(())
}

async fn get(client: &ApiClient, url: &str, json: bool) -> Result<()> {
    let body = client.download(url).await?;

    let mut stdout = io::stdout().lock();
    if json {
        let value: serde_json::Value =
            serde_json::from_slice(&body).context("Response is not JSON")?;
        serde_json::to_writer_pretty(&mut stdout, &value)?;
        writeln!(stdout)?;
    } else {
        stdout.write_all(&body)?;
    }
    stdout.flush()?;
    Ok(())
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().lock().read_line(&mut email)?;
    Ok(email.trim().to_string())
}
