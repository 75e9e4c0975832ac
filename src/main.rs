use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod config;
mod dispatch;
mod download;
mod lifecycle;
mod media;
mod session;
mod utils;

use config::{
    LogFormat, SessionSettings, Settings, SettingsStore, AUTH_TOKEN_ENV, CT0_ENV, CURRENT_VERSION,
};
use dispatch::{Backends, Dispatcher};
use download::{Aria2Client, BackendKind, Downloader, HttpDownloader};
use lifecycle::InstallReason;
use media::{PostReference, TwitterApi};
use session::{
    CookieFile, CookieProvider, CookieQuery, LayeredCookies, StaticCookies, AUTH_COOKIE,
    SESSION_COOKIE,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct BackendArgs {
    /// Send downloads to aria2 regardless of the stored setting
    #[arg(long, conflicts_with = "browser")]
    aria2: bool,

    /// Download directly regardless of the stored setting
    #[arg(long)]
    browser: bool,
}

impl BackendArgs {
    fn external_manager_enabled(&self, settings: &Settings) -> bool {
        if self.aria2 {
            true
        } else if self.browser {
            false
        } else {
            settings.aria2.enabled
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every media item of a post (URL or `handle/id`)
    Download {
        post: PostReference,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Read post references from stdin, one download task per line
    Listen {
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Write the default settings file
    Init,
    /// Run the upgrade steps for an installation of an older version
    Update {
        /// Version that was installed before
        #[arg(long)]
        from: String,
    },
    /// Inspect the settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
}

fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(env_filter).init(),
    }
}

/// Cookie lookup order: environment, then the cookie file, then inline settings.
fn session_cookies(session: &SessionSettings, env: StaticCookies) -> Arc<dyn CookieProvider> {
    let mut layers: Vec<Arc<dyn CookieProvider>> = vec![Arc::new(env)];
    if let Some(path) = &session.cookies_file {
        layers.push(Arc::new(CookieFile::new(path)));
    }
    layers.push(Arc::new(
        StaticCookies::new()
            .with(SESSION_COOKIE, session.ct0.as_deref())
            .with(AUTH_COOKIE, session.auth_token.as_deref()),
    ));
    Arc::new(LayeredCookies::new(layers))
}

fn env_cookies() -> StaticCookies {
    StaticCookies::new()
        .with(SESSION_COOKIE, std::env::var(CT0_ENV).ok().as_deref())
        .with(AUTH_COOKIE, std::env::var(AUTH_TOKEN_ENV).ok().as_deref())
}

async fn build_dispatcher(store: &SettingsStore, settings: &Settings) -> Result<Arc<Dispatcher>> {
    let session = &settings.session;
    let cookies = session_cookies(session, env_cookies());

    let auth_token = cookies
        .fetch_cookie(&CookieQuery::new(&session.domain, AUTH_COOKIE))
        .await
        .map(|cookie| cookie.value)
        .ok();
    if auth_token.is_none() {
        warn!("No {} cookie configured, only public posts can be read", AUTH_COOKIE);
    }

    let media = TwitterApi::new(&settings.twitter, auth_token)?;
    let browser = HttpDownloader::new(settings.browser.resolve_download_root())?
        .with_conflict_action(settings.browser.conflict_action);
    let aria2 = Aria2Client::new(&settings.aria2)?;

    Ok(Arc::new(Dispatcher::new(
        cookies,
        Arc::new(media),
        Arc::new(store.clone()),
        Backends::new(Arc::new(browser), Arc::new(aria2)),
        &session.domain,
    )))
}

async fn check_backend(settings: &Settings, external_manager_enabled: bool) {
    let kind = BackendKind::from_external_manager(external_manager_enabled);
    let available = match kind {
        BackendKind::Aria2 => match Aria2Client::new(&settings.aria2) {
            Ok(client) => client.test_availability().await,
            Err(_) => false,
        },
        BackendKind::Browser => match HttpDownloader::new(settings.browser.resolve_download_root()) {
            Ok(downloader) => downloader.test_availability().await,
            Err(_) => false,
        },
    };

    if !available {
        warn!("The {} backend does not look usable, downloads may fail", kind);
    }
}

async fn listen(dispatcher: Arc<Dispatcher>, external_manager_enabled: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = Vec::new();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<PostReference>() {
            Ok(post) => tasks.push(dispatcher.spawn(post, external_manager_enabled)),
            Err(e) => warn!("Ignoring {:?}: {}", line, e),
        }
    }

    for task in tasks {
        if let Err(e) = task.await {
            warn!("Download task ended abnormally: {}", e);
        }
    }
    Ok(())
}

fn show_settings(store: &SettingsStore, settings: &Settings) -> Result<()> {
    println!("# {}", store.path().display());
    print!(
        "{}",
        toml::to_string_pretty(settings).context("Failed to serialize settings")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let store = SettingsStore::locate(args.config.as_deref())?;
    let settings = store
        .load()
        .with_context(|| format!("Failed to load settings from {}", store.path().display()))?;

    init_logging(settings.logging.format);
    info!("Using settings from {}", store.path().display());

    match args.command {
        Command::Download { post, backend } => {
            let enabled = backend.external_manager_enabled(&settings);
            check_backend(&settings, enabled).await;

            let dispatcher = build_dispatcher(&store, &settings).await?;
            let report = dispatcher.handle(&post, enabled).await?;
            for id in &report.submitted {
                println!("{id}");
            }
            if report.failed > 0 {
                anyhow::bail!(
                    "{} of {} downloads failed",
                    report.failed,
                    report.failed + report.submitted.len()
                );
            }
        }
        Command::Listen { backend } => {
            let enabled = backend.external_manager_enabled(&settings);
            check_backend(&settings, enabled).await;

            let dispatcher = build_dispatcher(&store, &settings).await?;
            listen(dispatcher, enabled).await?;
        }
        Command::Init => {
            let settings = lifecycle::on_installed(&store, &InstallReason::Install, CURRENT_VERSION)?;
            show_settings(&store, &settings)?;
        }
        Command::Update { from } => {
            let reason = InstallReason::Update {
                previous_version: from,
            };
            let settings = lifecycle::on_installed(&store, &reason, CURRENT_VERSION)?;
            show_settings(&store, &settings)?;
        }
        Command::Config { action } => match action {
            ConfigAction::Show => show_settings(&store, &settings)?,
            ConfigAction::Path => println!("{}", store.path().display()),
        },
    }

    Ok(())
}
