use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration for Gantry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GantryConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Local store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Name of the active upstream data source
    #[serde(default = "default_active_source")]
    pub active_source: String,

    /// Configured upstream data sources, by name
    #[serde(default = "default_sources")]
    pub sources: HashMap<String, SourceConfig>,

    /// Reconciler configuration
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Config assembly and caching
    #[serde(default)]
    pub assembler: AssemblerConfig,

    /// Store cleanup configuration
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listener address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Directory of UI assets to serve as a fallback (none = API only)
    #[serde(default)]
    pub ui_dir: Option<PathBuf>,

    /// Enable permissive CORS on the API
    #[serde(default)]
    pub cors_enabled: bool,

    /// Request read timeout (seconds)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Response write timeout (seconds)
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Keep-alive idle timeout (seconds)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Header read timeout (seconds)
    #[serde(default = "default_read_header_timeout")]
    pub read_header_timeout_secs: u64,

    /// Graceful shutdown drain window (seconds)
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file path
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Upstream flavor
    pub kind: SourceKind,

    /// Base URL of the upstream API
    pub base_url: String,

    /// Optional basic-auth credentials
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,

    /// Site scope passed to the gateway upstream
    #[serde(default)]
    pub site_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// General-purpose gateway API
    Gateway,
    /// The reverse proxy's own read-only API
    Traefik,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Upstream poll interval (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Duplicate-cleanup sweep interval (seconds)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// TTL of the assembled whole-document cache (seconds)
    #[serde(default = "default_config_cache_ttl")]
    pub config_cache_ttl_secs: u64,

    /// TTL of the upstream snapshot cache fronting the adapter (seconds)
    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_secs: u64,

    /// Base the served document on the proxied upstream config instead of
    /// synthesizing it, overlaying store overrides
    #[serde(default)]
    pub proxied_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Reactivate the collapse winner when every row for a host is disabled
    #[serde(default)]
    pub recover_corrupted: bool,

    /// Maximum rows deleted per batch
    #[serde(default = "default_max_delete_batch")]
    pub max_delete_batch: usize,

    /// Hard deadline for one sweep transaction (seconds)
    #[serde(default = "default_cleanup_deadline")]
    pub deadline_secs: u64,
}

impl GantryConfig {
    /// Load configuration from YAML file + environment variables.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["gantry.yaml", "/etc/gantry/gantry.yaml", "config/gantry.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }

        // Environment variables override: GANTRY_SERVER__LISTEN_ADDR, etc.
        figment = figment.merge(Env::prefixed("GANTRY_").split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }

    /// The active source's configuration, if it names a configured source.
    pub fn active_source_config(&self) -> Option<&SourceConfig> {
        self.sources.get(&self.active_source)
    }
}

// Default implementations

impl Default for GantryConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            active_source: default_active_source(),
            sources: default_sources(),
            reconcile: ReconcileConfig::default(),
            assembler: AssemblerConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            ui_dir: None,
            cors_enabled: false,
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            read_header_timeout_secs: default_read_header_timeout(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path() }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            config_cache_ttl_secs: default_config_cache_ttl(),
            snapshot_ttl_secs: default_snapshot_ttl(),
            proxied_fallback: false,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            recover_corrupted: false,
            max_delete_batch: default_max_delete_batch(),
            deadline_secs: default_cleanup_deadline(),
        }
    }
}

// Serde default functions

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:3456".parse().unwrap()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/gantry.db")
}

fn default_active_source() -> String {
    "gateway".to_string()
}

fn default_sources() -> HashMap<String, SourceConfig> {
    let mut sources = HashMap::new();
    sources.insert(
        "gateway".to_string(),
        SourceConfig {
            kind: SourceKind::Gateway,
            base_url: "http://127.0.0.1:3000/api/v1".to_string(),
            basic_auth: None,
            site_id: None,
        },
    );
    sources
}

fn default_poll_interval() -> u64 {
    30
}

fn default_cleanup_interval() -> u64 {
    3600
}

fn default_config_cache_ttl() -> u64 {
    5
}

fn default_snapshot_ttl() -> u64 {
    5
}

fn default_max_delete_batch() -> usize {
    50
}

fn default_cleanup_deadline() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    15
}

fn default_write_timeout() -> u64 {
    15
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_read_header_timeout() -> u64 {
    5
}

fn default_drain_timeout() -> u64 {
    15
}
