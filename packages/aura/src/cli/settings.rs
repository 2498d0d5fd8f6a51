//! `aura config` subcommands: inspect and change the persisted settings.

use anyhow::{Context, Result, bail};

use crate::config::{AuraPaths, FileConfig, save_server_url};

/// Print the effective configuration (defaults, config.toml and env merged).
pub fn show_command(paths: &AuraPaths, settings: &FileConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(settings).context("Failed to render configuration")?;
    println!("# {}", paths.config_toml_path().display());
    print!("{rendered}");
    Ok(())
}

pub fn set_server_command(paths: &AuraPaths, url: &str) -> Result<()> {
    let url = normalize_server_url(url)?;
    save_server_url(paths, &url)?;
    println!("Server set to {url}");
    Ok(())
}

fn normalize_server_url(url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');
    let Some(host) = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
    else {
        bail!("Server URL must start with http:// or https://, got {url:?}");
    };
    if host.is_empty() {
        bail!("Server URL has no host: {url:?}");
    }
    Ok(url.to_string())
}
