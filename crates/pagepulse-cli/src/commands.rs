//! Subcommand handlers.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

use pagepulse_core::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
use pagepulse_core::config::TokenStorage;
use pagepulse_core::models::{embed_snippet, AnalyticsQuery, DEFAULT_TRACKER_URL};
use pagepulse_core::{ApiClient, Config};

use crate::report::{render_dashboard, render_sites};
use crate::{Cli, Commands};

/// Token store chosen for this run, with a description for `status`.
struct OpenedStore {
    store: Arc<dyn TokenStore>,
    description: String,
}

fn open_store(config: &Config, ephemeral: bool) -> Result<OpenedStore> {
    if ephemeral {
        return Ok(OpenedStore {
            store: Arc::new(MemoryTokenStore::new()),
            description: "memory (this run only)".to_string(),
        });
    }

    match config.token_storage {
        TokenStorage::File => {
            let cache_dir = config.cache_dir()?;
            let store = FileTokenStore::open(&cache_dir);
            let mut description = format!("session file {}", store.path().display());
            if let Some(updated) = store.updated_at() {
                description.push_str(&format!(" (updated {})", updated.format("%Y-%m-%d %H:%M UTC")));
            }
            Ok(OpenedStore {
                store: Arc::new(store),
                description,
            })
        }
        TokenStorage::Keyring => Ok(OpenedStore {
            store: Arc::new(KeyringTokenStore::new()),
            description: "OS keychain".to_string(),
        }),
    }
}

fn save_config(config: &Config) {
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

/// Typed input wins; an empty line falls back to the remembered username.
fn resolve_username(input: &str, remembered: Option<&str>) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        remembered.map(str::to_string)
    } else {
        Some(input.to_string())
    }
}

fn prompt_username(remembered: Option<&str>) -> Result<String> {
    match remembered {
        Some(name) => print!("Username [{}]: ", name),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read username")?;
    resolve_username(&line, remembered).ok_or_else(|| anyhow!("Username is required"))
}

fn build_query(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    days: Option<i64>,
) -> Result<AnalyticsQuery> {
    match days {
        Some(days) if days < 1 => bail!("--days must be at least 1"),
        Some(days) => AnalyticsQuery::last_days(days)
            .ok_or_else(|| anyhow!("--days {} reaches past the earliest supported date", days)),
        None => Ok(AnalyticsQuery::between(from, to)),
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    let opened = open_store(&config, cli.ephemeral)?;
    let client = match cli.api_base.as_deref() {
        Some(base) => ApiClient::with_timeout(base, config.timeout(), opened.store)?,
        None => ApiClient::from_config(&config, opened.store)?,
    };
    debug!(base = client.base_url(), "API base resolved");

    match cli.command {
        Commands::Login { username } => {
            let username = match username {
                Some(name) => name,
                None => prompt_username(config.last_username.as_deref())?,
            };
            let password = rpassword::prompt_password("Password: ")
                .context("Failed to read password")?;
            client.login(&username, &password).await?;

            println!("Logged in as {}.", username.trim());
            config.last_username = Some(username.trim().to_string());
            save_config(&config);
        }

        Commands::Signup { username } => {
            let username = match username {
                Some(name) => name,
                None => prompt_username(None)?,
            };
            let password = rpassword::prompt_password("Choose a password: ")
                .context("Failed to read password")?;
            client.signup(&username, &password).await?;

            println!("Account created. Logged in as {}.", username.trim());
            config.last_username = Some(username.trim().to_string());
            save_config(&config);
        }

        Commands::Logout => {
            client.logout()?;
            println!("Logged out.");
        }

        Commands::Sites { json } => {
            let sites = client.list_sites().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sites)?);
            } else {
                println!("{}", render_sites(&sites));
            }
        }

        Commands::AddSite { domain } => {
            let created = client.create_site(&domain).await?;
            let tracker = config.tracker_url.as_deref().unwrap_or(DEFAULT_TRACKER_URL);
            let snippet = embed_snippet(&created.site_id, tracker)?;

            println!("Registered {} as {}.", domain.trim(), created.site_id);
            println!();
            println!("Add this to every page you want to track:");
            println!();
            println!("{}", snippet);

            config.last_site_id = Some(created.site_id);
            save_config(&config);
        }

        Commands::Snippet { site_id } => {
            let tracker = config.tracker_url.as_deref().unwrap_or(DEFAULT_TRACKER_URL);
            println!("{}", embed_snippet(site_id.trim(), tracker)?);
        }

        Commands::Dashboard {
            site_id,
            from,
            to,
            days,
            json,
        } => {
            let site_id = site_id
                .or_else(|| config.last_site_id.clone())
                .ok_or_else(|| {
                    anyhow!("No site given. Pass a site ID (see `pagepulse sites`).")
                })?;
            let query = build_query(from, to, days)?;
            let dashboard = client.load_dashboard(&site_id, &query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                println!("{}", render_dashboard(&dashboard, &query));
            }

            config.last_site_id = Some(site_id);
            save_config(&config);
        }

        Commands::Status => {
            println!("API base:   {}", client.base_url());
            println!("Tokens:     {}", opened.description);
            println!(
                "Logged in:  {}",
                if client.is_authenticated() { "yes" } else { "no" }
            );
            if let Some(name) = &config.last_username {
                println!("Username:   {}", name);
            }
            if let Some(site) = &config.last_site_id {
                println!("Last site:  {}", site);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_username() {
        assert_eq!(resolve_username("ana\n", None).as_deref(), Some("ana"));
        assert_eq!(resolve_username(" \n", Some("ana")).as_deref(), Some("ana"));
        assert_eq!(resolve_username("bob\n", Some("ana")).as_deref(), Some("bob"));
        assert_eq!(resolve_username("\n", None), None);
    }

    #[test]
    fn test_build_query() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 9, day);
        assert!(build_query(None, None, None).unwrap().is_empty());
        assert_eq!(
            build_query(d(1), d(14), None).unwrap(),
            AnalyticsQuery::between(d(1), d(14))
        );

        let week = build_query(None, None, Some(7)).unwrap();
        assert_eq!((week.end.unwrap() - week.start.unwrap()).num_days(), 6);

        assert!(build_query(None, None, Some(0)).is_err());
        assert!(build_query(None, None, Some(1_000_000_000)).is_err());
        assert!(build_query(None, None, Some(i64::MAX)).is_err());
    }

    #[test]
    fn test_ephemeral_store_starts_logged_out() {
        let opened = open_store(&Config::default(), true).unwrap();
        assert!(opened.store.credentials().is_none());
        assert!(opened.description.starts_with("memory"));
    }
}
