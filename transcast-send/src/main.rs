//! transcast-send - Translate and republish posts from one account to another
//!
//! Polls the source account for new posts, translates them and posts the
//! translations on the target account with a link to the original.

use clap::Parser;
use libtranscast::config::Config;
use libtranscast::cursor::FileCursorStore;
use libtranscast::error::{ConfigError, Result, TranscastError};
use libtranscast::forwarder::{ForwardSettings, Forwarder, Services};
use libtranscast::logging::LoggingConfig;
use libtranscast::platforms::twitter::{SourceTimeline, TwitterClient};
use libtranscast::translate::google::GoogleTranslator;
use libtranscast::TokioSleeper;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "transcast-send")]
#[command(version)]
#[command(about = "Forward new posts from one account to another, translated")]
#[command(long_about = "\
transcast-send - Forward new posts from one account to another, translated

DESCRIPTION:
    transcast-send is a long-running daemon that watches an X/Twitter
    account for new original posts, translates each one and publishes
    the translation on a second account with a link to the original.

    The id of the last forwarded post is kept in a cursor file so a
    restart resumes where the previous run stopped.

USAGE:
    # Run in foreground (logs to stderr)
    transcast-send

    # Enable verbose logging
    transcast-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current step)

CONFIGURATION:
    Required environment variables:
        CONSUMER_KEY, CONSUMER_SECRET, ACCESS_TOKEN, ACCESS_TOKEN_SECRET
        BEARER_TOKEN, SOURCE_USER, TARGET_USER

    Optional environment variables:
        POLL_INTERVAL (5m), POST_DELAY (30s), BATCH_SIZE (5),
        BACKLOG_POLICY (cap|drain), ATTRIBUTION_PREFIX,
        SOURCE_LANG (en), TARGET_LANG (hi), GOOGLE_TRANSLATE_API_KEY,
        TRANSLATE_MAX_ATTEMPTS (3), CURSOR_FILE (lastTweetId.txt)

    Configuration file: ~/.config/transcast/config.toml
    (override with TRANSCAST_CONFIG; environment variables take precedence)

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Poll and forward once, then exit (for testing)")]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Config {
        credentials,
        accounts,
        forwarding,
        mut translation,
        cursor,
    } = Config::load()?;

    info!("transcast-send daemon starting");

    let client = Arc::new(TwitterClient::new(credentials)?);
    check_identity(&client, &accounts.target_user).await?;

    let account = client.resolve_account(&accounts.source_user).await?;
    info!(id = %account.id, handle = %account.handle, "Watching source account");

    let translator = GoogleTranslator::new(translation.api_key.take())?;
    info!(
        backend = translator.backend_name(),
        source_lang = %translation.source_lang,
        target_lang = %translation.target_lang,
        "Translator ready"
    );

    let cursor = FileCursorStore::new(cursor.path);
    info!(path = %cursor.path().display(), "Using cursor file");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let settings = ForwardSettings::new(account.clone(), &forwarding, &translation);
    let services = Services {
        timeline: Arc::new(SourceTimeline::new(client.clone(), account)),
        translator: Arc::new(translator),
        publisher: client,
        cursor: Arc::new(cursor),
        sleeper: Arc::new(TokioSleeper::with_shutdown(shutdown.clone())),
    };
    let forwarder = Forwarder::new(services, settings)?;

    if cli.once {
        let report = forwarder.tick().await?;
        info!(
            forwarded = report.forwarded(),
            "transcast-send: polled once, exiting"
        );
    } else {
        forwarder.run(&shutdown).await?;
    }

    info!("transcast-send daemon stopped");
    Ok(())
}

/// Refuse to start when the posting credentials belong to another
/// account. A check that cannot complete is only logged.
async fn check_identity(client: &TwitterClient, target_user: &str) -> Result<()> {
    match client.verify_identity(target_user).await {
        Ok(()) => {
            info!(target = %target_user, "Posting credentials verified");
            Ok(())
        }
        Err(e @ TranscastError::Config(ConfigError::IdentityMismatch { .. })) => Err(e),
        Err(e) => {
            warn!(error = %e, "Could not verify posting account, continuing");
            Ok(())
        }
    }
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| TranscastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}
