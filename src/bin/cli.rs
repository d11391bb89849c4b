//! mangawatch CLI
//!
//! Entry point for both the long-running watcher and one-shot
//! administration commands against the store.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mangawatch::{
    App,
    error::{AppError, Result},
    models::{Config, SourceKind},
    services::LogNotifier,
    sources,
    storage::{JsonStore, Store},
    utils::http,
};

/// mangawatch - Manga Release Watcher
#[derive(Parser, Debug)]
#[command(
    name = "mangawatch",
    version,
    about = "Watches manga sources and alerts subscribed roles"
)]

struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the watcher until interrupted
    Run,

    /// Mark a source enabled; the watcher picks the flag up on startup
    Enable {
        /// Source name (mangadex, mangasee)
        source: String,
    },

    /// Mark a source disabled
    Disable {
        /// Source name (mangadex, mangasee)
        source: String,
    },

    /// Subscribe a role to the series behind a pasted URL
    Subscribe {
        guild: String,
        role: String,
        url: String,
    },

    /// Unsubscribe a role from a series by title, alias or id
    Unsubscribe {
        guild: String,
        role: String,
        /// Source name (mangadex, mangasee)
        source: String,
        series: String,
    },

    /// List subscriptions of one role, or of every role in the guild
    Subscriptions {
        guild: String,
        role: Option<String>,
    },

    /// Route a role's alerts to a channel
    SetChannel {
        guild: String,
        role: String,
        channel: String,
    },

    /// Check which source claims a series URL
    Resolve { url: String },

    /// Validate the configuration file
    Validate,

    /// Show persisted source flags
    Status,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Run => {
            log::info!("mangawatch starting...");
            let app = App::build(config).await?;
            app.run(Arc::new(LogNotifier)).await?;
        }

        Command::Enable { source } => {
            let kind = SourceKind::from_str(&source)?;
            let store = JsonStore::open(&config.store.path).await?;
            store.set_source_enabled(kind, true).await?;
            log::info!("Source {kind} marked enabled");
        }

        Command::Disable { source } => {
            let kind = SourceKind::from_str(&source)?;
            let store = JsonStore::open(&config.store.path).await?;
            store.set_source_enabled(kind, false).await?;
            log::info!("Source {kind} marked disabled");
        }

        Command::Subscribe { guild, role, url } => {
            let client = http::create_async_client(&config.http)?;
            let adapters = sources::registry(&client, &config.sources);
            let Some(series) = sources::resolve_link(&adapters, &url).await? else {
                log::error!("No source recognizes {url}");
                return Err(AppError::validation(format!("unrecognized series link: {url}")));
            };

            let store = JsonStore::open(&config.store.path).await?;
            let added = store
                .add_subscription(&guild, &role, series.source, &series.id)
                .await?;
            store.set_title(series.source, &series.id, &series.title).await?;
            store.set_alias(series.source, &series.title, &series.id).await?;

            if added {
                log::info!(
                    "Subscribed role {role} in guild {guild} to '{}' on {}",
                    series.title,
                    series.source
                );
            } else {
                log::warn!("Role {role} was already subscribed to '{}'", series.title);
            }
        }

        Command::Unsubscribe {
            guild,
            role,
            source,
            series,
        } => {
            let kind = SourceKind::from_str(&source)?;
            let store = JsonStore::open(&config.store.path).await?;
            let series_id = match store.alias(kind, &series).await? {
                Some(id) => id,
                None => series.clone(),
            };
            let removed = store
                .remove_subscription(&guild, &role, kind, &series_id)
                .await?;
            if removed {
                log::info!("Unsubscribed role {role} from {series_id} on {kind}");
            } else {
                log::warn!("Role {role} was not subscribed to {series_id} on {kind}");
            }
        }

        Command::Subscriptions { guild, role } => {
            let store = JsonStore::open(&config.store.path).await?;
            let roles = match role {
                Some(role) => vec![role],
                None => store.roles(&guild).await?,
            };
            let mut total = 0;
            for role in &roles {
                for kind in SourceKind::ALL {
                    for series_id in store.subscriptions(&guild, role, kind).await? {
                        let title = store
                            .title(kind, &series_id)
                            .await?
                            .unwrap_or_else(|| series_id.clone());
                        log::info!("{role}: [{kind}] {title} ({series_id})");
                        total += 1;
                    }
                }
            }
            if total == 0 {
                log::info!("No subscriptions found in guild {guild}");
            }
        }

        Command::SetChannel {
            guild,
            role,
            channel,
        } => {
            let store = JsonStore::open(&config.store.path).await?;
            store.set_channel(&guild, &role, &channel).await?;
            log::info!("Alerts for role {role} in guild {guild} now go to channel {channel}");
        }

        Command::Resolve { url } => {
            let client = http::create_async_client(&config.http)?;
            let adapters = sources::registry(&client, &config.sources);
            match sources::resolve_link(&adapters, &url).await? {
                Some(series) => {
                    log::info!("[{}] '{}' (id: {})", series.source, series.title, series.id);
                }
                None => {
                    log::warn!("No source recognizes {url}");
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            for kind in SourceKind::ALL {
                config.sources.get(kind).validate(kind)?;
            }
            log::info!("✓ Config OK (http, scheduler, store, dedup, and sources)");
        }

        Command::Status => {
            let store = JsonStore::open(&config.store.path).await?;
            for kind in SourceKind::ALL {
                let state = if config.sources.get(kind).disabled {
                    "disabled by configuration".to_string()
                } else {
                    match store.source_enabled(kind).await? {
                        Some(true) => "enabled".to_string(),
                        Some(false) => "disabled".to_string(),
                        None => "never enabled".to_string(),
                    }
                };
                log::info!("{kind}: {state}");
            }
        }
    }

    Ok(())
}
