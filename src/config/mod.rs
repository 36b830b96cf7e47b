//! Layered configuration.
//!
//! Two surfaces, following different lifecycles:
//!
//! - [`ServerConfig`]: process-level settings (bind address, collaborator
//!   URLs) read once from `TOLLGATE_*` environment variables at startup.
//! - [`RoutingConfig`]: routing/cache/pricing policy, merged from built-in
//!   defaults, an optional JSON file, and environment overrides. Held by a
//!   [`ConfigStore`] and hot-swappable at runtime; a failed reload keeps the
//!   last-known-good snapshot active.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::collections::HashMap;
use std::env;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::query::TaskType;
use crate::tier::{Tier, TierPricing, TierSpec};

/// Process-level configuration loaded from environment variables.
///
/// Use [`ServerConfig::from_env`] to read `TOLLGATE_*` overrides on top of
/// defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Qdrant endpoint URL. Default: `http://localhost:6334`.
    pub qdrant_url: String,

    /// Embedding service URL. When unset, the server runs the mock embedder
    /// (deterministic text-derived vectors) and logs a warning.
    pub embed_url: Option<String>,

    /// Dimensionality the embedding service produces. Default: `384`.
    pub embed_dim: usize,

    /// Path to the routing policy JSON file. When unset, built-in defaults
    /// plus environment overrides apply.
    pub routing_config_path: Option<PathBuf>,

    /// Answer every model invocation locally with a canned response instead
    /// of calling the provider. For offline operation and e2e tests.
    pub mock_provider: bool,
}

/// Default Qdrant URL used when `TOLLGATE_QDRANT_URL` is not set.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default embedding dimensionality when `TOLLGATE_EMBED_DIM` is not set.
pub const DEFAULT_EMBED_DIM: usize = 384;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            embed_url: None,
            embed_dim: DEFAULT_EMBED_DIM,
            routing_config_path: None,
            mock_provider: false,
        }
    }
}

impl ServerConfig {
    const ENV_PORT: &'static str = "TOLLGATE_PORT";
    const ENV_BIND_ADDR: &'static str = "TOLLGATE_BIND_ADDR";
    const ENV_QDRANT_URL: &'static str = "TOLLGATE_QDRANT_URL";
    const ENV_EMBED_URL: &'static str = "TOLLGATE_EMBED_URL";
    const ENV_EMBED_DIM: &'static str = "TOLLGATE_EMBED_DIM";
    const ENV_ROUTING_CONFIG: &'static str = "TOLLGATE_ROUTING_CONFIG";
    const ENV_MOCK_PROVIDER: &'static str = "TOLLGATE_MOCK_PROVIDER";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let qdrant_url = Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url);
        let embed_url = Self::parse_optional_string_from_env(Self::ENV_EMBED_URL);
        let embed_dim = Self::parse_embed_dim_from_env(defaults.embed_dim)?;
        let routing_config_path =
            Self::parse_optional_string_from_env(Self::ENV_ROUTING_CONFIG).map(PathBuf::from);
        let mock_provider = env::var_os(Self::ENV_MOCK_PROVIDER).is_some_and(|v| !v.is_empty());

        Ok(Self {
            port,
            bind_addr,
            qdrant_url,
            embed_url,
            embed_dim,
            routing_config_path,
            mock_provider,
        })
    }

    /// Validates basic invariants (does not touch the network).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.routing_config_path {
            if path.exists() && !path.is_file() {
                return Err(ConfigError::Invalid {
                    reason: format!("routing config path {} is not a file", path.display()),
                });
            }
        }
        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_embed_dim_from_env(default: usize) -> Result<usize, ConfigError> {
        match env::var(Self::ENV_EMBED_DIM) {
            Ok(value) => {
                let dim: usize = value.parse().map_err(|_| ConfigError::Invalid {
                    reason: format!("{} must be a positive integer, got '{value}'", Self::ENV_EMBED_DIM),
                })?;
                if dim == 0 {
                    return Err(ConfigError::Invalid {
                        reason: format!("{} must be non-zero", Self::ENV_EMBED_DIM),
                    });
                }
                Ok(dim)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Settings for the built-in length rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthRuleConfig {
    pub enabled: bool,
    pub priority: u32,
    /// Estimated-token ceiling for Cheap.
    pub cheap_max_tokens: u32,
    /// Estimated-token ceiling for Mid; above this the rule yields Premium.
    pub mid_max_tokens: u32,
}

impl Default for LengthRuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 30,
            cheap_max_tokens: 256,
            mid_max_tokens: 1024,
        }
    }
}

/// Settings for the built-in complexity rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityRuleConfig {
    pub enabled: bool,
    pub priority: u32,
    /// Substrings that escalate straight to Premium.
    pub premium_markers: Vec<String>,
    /// Substrings that escalate to at least Mid.
    pub mid_markers: Vec<String>,
}

impl Default for ComplexityRuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 10,
            premium_markers: [
                "refactor",
                "architecture",
                "redesign",
                "security",
                "concurrency",
                "race condition",
                "deadlock",
                "migrate",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            mid_markers: ["compare", "tradeoff", "trade-off", "review", "why does"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Settings for the built-in task-type rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTypeRuleConfig {
    pub enabled: bool,
    pub priority: u32,
    /// Direct task-type to tier mapping. Unmapped task types fall through to
    /// lower-priority rules.
    pub map: HashMap<TaskType, Tier>,
}

impl Default for TaskTypeRuleConfig {
    fn default() -> Self {
        let mut map = HashMap::new();
        map.insert(TaskType::Debug, Tier::Premium);
        map.insert(TaskType::Refactor, Tier::Premium);
        map.insert(TaskType::Generate, Tier::Mid);
        Self {
            enabled: true,
            priority: 20,
            map,
        }
    }
}

/// Enable/priority/threshold settings for all built-in rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub complexity: ComplexityRuleConfig,
    pub task_type: TaskTypeRuleConfig,
    pub length: LengthRuleConfig,
}

/// Per-tier model bindings and pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiersConfig {
    pub cheap: TierSpec,
    pub mid: TierSpec,
    pub premium: TierSpec,
}

impl TiersConfig {
    /// Returns the spec bound to a tier.
    pub fn spec(&self, tier: Tier) -> &TierSpec {
        match tier {
            Tier::Cheap => &self.cheap,
            Tier::Mid => &self.mid,
            Tier::Premium => &self.premium,
        }
    }

    /// Cost of the given token counts at a tier's pricing.
    pub fn cost(&self, tier: Tier, input_tokens: u64, output_tokens: u64) -> f64 {
        self.spec(tier).pricing.cost(input_tokens, output_tokens)
    }
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            cheap: TierSpec {
                model: "gpt-4o-mini".to_string(),
                max_tokens: 1024,
                pricing: TierPricing {
                    input_per_1k: 0.000_15,
                    output_per_1k: 0.000_6,
                },
            },
            mid: TierSpec {
                model: "gpt-4o".to_string(),
                max_tokens: 4096,
                pricing: TierPricing {
                    input_per_1k: 0.002_5,
                    output_per_1k: 0.01,
                },
            },
            premium: TierSpec {
                model: "claude-sonnet-4-20250514".to_string(),
                max_tokens: 8192,
                pricing: TierPricing {
                    input_per_1k: 0.003,
                    output_per_1k: 0.015,
                },
            },
        }
    }
}

/// Semantic cache tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Minimum cosine similarity for a hit.
    pub similarity_threshold: f32,
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
    /// Hard ceiling on resident entries.
    pub max_entries: usize,
    /// Upper bound on a single embedding call during lookup/store.
    pub embed_timeout_ms: u64,
    /// Upper bound on a single vector-index query during lookup.
    pub index_timeout_ms: u64,
    /// Background eviction sweep interval.
    pub sweep_interval_secs: u64,
    /// Candidates fetched per nearest-neighbor query.
    pub search_top_k: u64,
    pub evict_expired: bool,
    pub evict_by_quality: bool,
    pub evict_by_lru: bool,
    /// Deleted-vector fraction above which the index is compacted.
    pub compaction_ratio: f32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            ttl_secs: 3_600,
            max_entries: 10_000,
            embed_timeout_ms: 2_000,
            index_timeout_ms: 2_000,
            sweep_interval_secs: 60,
            search_top_k: 8,
            evict_expired: true,
            evict_by_quality: true,
            evict_by_lru: true,
            compaction_ratio: 0.5,
        }
    }
}

/// Cost ledger tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSettings {
    /// Usage records older than this are purged.
    pub retention_days: u32,
    /// Purge task interval.
    pub purge_interval_secs: u64,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            retention_days: 30,
            purge_interval_secs: 3_600,
        }
    }
}

/// Routing/cache/pricing policy. Immutable once published; replaced as a
/// whole on reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Monotonically increasing snapshot version, bumped on each reload.
    pub version: u64,
    pub rules: RulesConfig,
    pub tiers: TiersConfig,
    pub cache: CacheSettings,
    pub cost: CostSettings,
}

impl RoutingConfig {
    const ENV_SIMILARITY_THRESHOLD: &'static str = "TOLLGATE_SIMILARITY_THRESHOLD";
    const ENV_CACHE_TTL_SECS: &'static str = "TOLLGATE_CACHE_TTL_SECS";
    const ENV_CACHE_MAX_ENTRIES: &'static str = "TOLLGATE_CACHE_MAX_ENTRIES";

    /// Builds the effective config: defaults, then the JSON file (if any),
    /// then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses a config file. Missing keys take their default values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::FileParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Some(threshold) = Self::parse_env::<f32>(Self::ENV_SIMILARITY_THRESHOLD) {
            self.cache.similarity_threshold = threshold;
        }
        if let Some(ttl) = Self::parse_env::<u64>(Self::ENV_CACHE_TTL_SECS) {
            self.cache.ttl_secs = ttl;
        }
        if let Some(max) = Self::parse_env::<usize>(Self::ENV_CACHE_MAX_ENTRIES) {
            self.cache.max_entries = max;
        }
    }

    fn parse_env<T: std::str::FromStr>(var_name: &str) -> Option<T> {
        env::var(var_name).ok().and_then(|v| v.parse().ok())
    }

    /// Checks semantic invariants. A config that fails here is never
    /// published.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.cache.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) || threshold == 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!("similarity_threshold must be in (0, 1], got {threshold}"),
            });
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid {
                reason: "cache max_entries must be non-zero".to_string(),
            });
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "cache ttl_secs must be non-zero".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.cache.compaction_ratio) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "compaction_ratio must be in [0, 1], got {}",
                    self.cache.compaction_ratio
                ),
            });
        }
        if self.rules.length.cheap_max_tokens >= self.rules.length.mid_max_tokens {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "length rule requires cheap_max_tokens < mid_max_tokens ({} >= {})",
                    self.rules.length.cheap_max_tokens, self.rules.length.mid_max_tokens
                ),
            });
        }
        for tier in Tier::ALL {
            let spec = self.tiers.spec(tier);
            if spec.model.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    reason: format!("tier {tier} has an empty model name"),
                });
            }
            if spec.pricing.input_per_1k < 0.0 || spec.pricing.output_per_1k < 0.0 {
                return Err(ConfigError::Invalid {
                    reason: format!("tier {tier} has negative pricing"),
                });
            }
        }
        if self.cost.retention_days == 0 {
            return Err(ConfigError::Invalid {
                reason: "cost retention_days must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Holds the active [`RoutingConfig`] snapshot and swaps it atomically.
///
/// Requests clone the `Arc` once at the start and keep using that snapshot
/// even if a reload lands mid-flight.
pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<RoutingConfig>>,
}

impl ConfigStore {
    /// Loads the initial config. Fails hard; a process should not start with
    /// invalid policy.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = RoutingConfig::load(path.as_deref())?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// Creates a store around an already-validated config (tests, embedding).
    pub fn with_config(config: RoutingConfig) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Returns the active immutable snapshot.
    pub fn snapshot(&self) -> Arc<RoutingConfig> {
        Arc::clone(&self.current.read())
    }

    /// Re-reads the config source and swaps it in if valid. On any failure
    /// the previous snapshot stays active and the error is returned.
    pub fn reload(&self) -> Result<Arc<RoutingConfig>, ConfigError> {
        let mut fresh = RoutingConfig::load(self.path.as_deref())?;
        let mut current = self.current.write();
        fresh.version = current.version + 1;
        let fresh = Arc::new(fresh);
        *current = Arc::clone(&fresh);
        Ok(fresh)
    }

    /// Replaces the snapshot with an explicit config after validation.
    pub fn replace(&self, mut config: RoutingConfig) -> Result<Arc<RoutingConfig>, ConfigError> {
        config.validate()?;
        let mut current = self.current.write();
        config.version = current.version + 1;
        let fresh = Arc::new(config);
        *current = Arc::clone(&fresh);
        Ok(fresh)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("version", &self.current.read().version)
            .finish()
    }
}
