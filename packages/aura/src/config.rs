use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use aura_stream::{DEFAULT_BASE_URL, StreamConfig};

// =============================================================================
// Tunable config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [server]
//                    url = "http://localhost:8787"
//
//   env var:         AURA_SERVER__URL=http://localhost:8787   (double underscore = nesting)
//                    AURA_STREAM__THROTTLE_MS=30

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub stream: StreamFileConfig,
}

/// Lives under `[server]` in config.toml.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerFileConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

/// Lives under `[stream]` in config.toml.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamFileConfig {
    /// Minimum spacing between two rendered updates. 0 renders every delta.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

impl Default for StreamFileConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_throttle_ms() -> u64 {
    aura_stream::DEFAULT_THROTTLE_INTERVAL.as_millis() as u64
}

impl FileConfig {
    /// The settings the streaming core consumes.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            base_url: self.server.url.clone(),
            throttle_interval: Duration::from_millis(self.stream.throttle_ms),
        }
    }
}

/// Build a figment that layers: defaults → config.toml → AURA_* env vars.
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("AURA_").split("__"))
}

// =============================================================================
// Directory layout (derived from --data-dir, not tunable via figment)
// =============================================================================

#[derive(Clone, Debug)]
pub struct AuraPaths {
    pub data_dir: PathBuf,
}

impl AuraPaths {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".aura"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        debug!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn load(&self) -> Result<FileConfig> {
        load_config(&self.data_dir)
            .extract()
            .with_context(|| format!("Invalid configuration in {}", self.config_toml_path().display()))
    }
}

/// Read-modify-write config.toml so that only `[server] url` changes.
pub fn save_server_url(paths: &AuraPaths, url: &str) -> Result<()> {
    let path = paths.config_toml_path();
    let mut doc = if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        contents
            .parse::<toml::Table>()
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        toml::Table::new()
    };

    let server = doc
        .entry("server")
        .or_insert_with(|| toml::Value::Table(toml::Table::new()))
        .as_table_mut()
        .context("[server] is not a table")?;
    server.insert("url".to_string(), toml::Value::String(url.to_string()));

    let serialized = toml::to_string_pretty(&doc).context("Failed to serialize config.toml")?;
    std::fs::write(&path, serialized)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Server URL saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(tmp: &tempfile::TempDir) -> AuraPaths {
        AuraPaths::new(Some(tmp.path().to_path_buf())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let fc = FileConfig::default();
        assert_eq!(fc.server.url, "http://localhost:8787");
        assert_eq!(fc.stream.throttle_ms, 50);

        let sc = fc.stream_config();
        assert_eq!(sc.base_url, "http://localhost:8787");
        assert_eq!(sc.throttle_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_aura_paths_with_custom_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("nested").join("aura");
        let p = AuraPaths::new(Some(nested.clone())).unwrap();
        assert!(nested.is_dir());
        assert_eq!(p.config_toml_path(), nested.join("config.toml"));
    }

    #[test]
    fn test_load_config_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc, FileConfig::default());
    }

    #[test]
    fn test_load_config_toml_sets_values() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[server]\nurl = \"http://10.0.0.2:9000\"\n\n[stream]\nthrottle_ms = 0\n",
        )
        .unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.server.url, "http://10.0.0.2:9000");
        assert_eq!(fc.stream.throttle_ms, 0);
    }

    #[test]
    fn test_load_config_partial_section_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "[stream]\nthrottle_ms = 20\n").unwrap();
        let fc: FileConfig = load_config(tmp.path()).extract().unwrap();
        assert_eq!(fc.server.url, "http://localhost:8787");
        assert_eq!(fc.stream.throttle_ms, 20);
    }

    #[test]
    fn test_load_invalid_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let p = paths(&tmp);
        std::fs::write(p.config_toml_path(), "[stream]\nthrottle_ms = \"fast\"\n").unwrap();
        assert!(p.load().is_err());
    }

    #[test]
    fn test_save_server_url_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let p = paths(&tmp);
        save_server_url(&p, "https://aura.example.com").unwrap();
        assert_eq!(p.load().unwrap().server.url, "https://aura.example.com");
    }

    #[test]
    fn test_save_server_url_preserves_other_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let p = paths(&tmp);
        std::fs::write(
            p.config_toml_path(),
            "[server]\nurl = \"http://old:1\"\nnote = \"keep\"\n\n[stream]\nthrottle_ms = 75\n",
        )
        .unwrap();

        save_server_url(&p, "http://new:2").unwrap();

        let contents = std::fs::read_to_string(p.config_toml_path()).unwrap();
        let doc: toml::Table = contents.parse().unwrap();
        assert_eq!(doc["server"]["url"].as_str(), Some("http://new:2"));
        assert_eq!(doc["server"]["note"].as_str(), Some("keep"));
        assert_eq!(doc["stream"]["throttle_ms"].as_integer(), Some(75));
    }

    #[test]
    fn test_save_server_url_rejects_non_table_section() {
        let tmp = tempfile::tempdir().unwrap();
        let p = paths(&tmp);
        std::fs::write(p.config_toml_path(), "server = 3\n").unwrap();
        assert!(save_server_url(&p, "http://x:1").is_err());
    }
}
