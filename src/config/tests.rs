use super::*;
use serial_test::serial;
use std::env;
use std::io::Write as _;
use std::net::IpAddr;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_tollgate_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        env::remove_var("TOLLGATE_PORT");
        env::remove_var("TOLLGATE_BIND_ADDR");
        env::remove_var("TOLLGATE_QDRANT_URL");
        env::remove_var("TOLLGATE_EMBED_URL");
        env::remove_var("TOLLGATE_EMBED_DIM");
        env::remove_var("TOLLGATE_ROUTING_CONFIG");
        env::remove_var("TOLLGATE_MOCK_PROVIDER");
        env::remove_var("TOLLGATE_SIMILARITY_THRESHOLD");
        env::remove_var("TOLLGATE_CACHE_TTL_SECS");
        env::remove_var("TOLLGATE_CACHE_MAX_ENTRIES");
    }
}

#[test]
fn test_default_server_config() {
    let config = ServerConfig::default();

    assert_eq!(config.port, 8080);
    assert_eq!(
        config.bind_addr,
        IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
    );
    assert_eq!(config.qdrant_url, "http://localhost:6334");
    assert!(config.embed_url.is_none());
    assert!(config.routing_config_path.is_none());
    assert!(!config.mock_provider);
}

#[test]
fn test_socket_addr() {
    let config = ServerConfig::default();
    assert_eq!(config.socket_addr(), "127.0.0.1:8080");

    let config = ServerConfig {
        port: 3000,
        bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        ..Default::default()
    };
    assert_eq!(config.socket_addr(), "0.0.0.0:3000");
}

#[test]
#[serial]
fn test_server_config_from_env_defaults() {
    clear_tollgate_env();

    let config = ServerConfig::from_env().expect("should parse with defaults");

    assert_eq!(config.port, 8080);
    assert!(!config.mock_provider);
}

#[test]
#[serial]
fn test_server_config_env_overrides() {
    clear_tollgate_env();

    let config = with_env_vars(
        &[
            ("TOLLGATE_PORT", "9100"),
            ("TOLLGATE_BIND_ADDR", "0.0.0.0"),
            ("TOLLGATE_QDRANT_URL", "http://qdrant:6334"),
            ("TOLLGATE_EMBED_URL", "http://embedder:8000/embed"),
            ("TOLLGATE_MOCK_PROVIDER", "1"),
        ],
        || ServerConfig::from_env().expect("should parse overrides"),
    );

    assert_eq!(config.port, 9100);
    assert_eq!(
        config.bind_addr,
        IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
    );
    assert_eq!(config.qdrant_url, "http://qdrant:6334");
    assert_eq!(config.embed_url.as_deref(), Some("http://embedder:8000/embed"));
    assert!(config.mock_provider);
}

#[test]
#[serial]
fn test_server_config_rejects_bad_port() {
    clear_tollgate_env();

    let result = with_env_vars(&[("TOLLGATE_PORT", "not-a-port")], ServerConfig::from_env);
    assert!(matches!(result, Err(ConfigError::PortParseError { .. })));

    let result = with_env_vars(&[("TOLLGATE_PORT", "0")], ServerConfig::from_env);
    assert!(matches!(result, Err(ConfigError::InvalidPort { .. })));
}

#[test]
#[serial]
fn test_server_config_embed_dim_parsing() {
    clear_tollgate_env();

    let config = with_env_vars(&[("TOLLGATE_EMBED_DIM", "768")], ServerConfig::from_env).unwrap();
    assert_eq!(config.embed_dim, 768);

    let result = with_env_vars(&[("TOLLGATE_EMBED_DIM", "many")], ServerConfig::from_env);
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));

    let result = with_env_vars(&[("TOLLGATE_EMBED_DIM", "0")], ServerConfig::from_env);
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}

#[test]
#[serial]
fn test_server_config_rejects_bad_bind_addr() {
    clear_tollgate_env();

    let result = with_env_vars(
        &[("TOLLGATE_BIND_ADDR", "localhost")],
        ServerConfig::from_env,
    );
    assert!(matches!(result, Err(ConfigError::InvalidBindAddr { .. })));
}

#[test]
fn test_routing_config_defaults_validate() {
    let config = RoutingConfig::default();
    config.validate().expect("defaults must be valid");
    assert_eq!(config.cache.similarity_threshold, 0.85);
    assert_eq!(config.cache.max_entries, 10_000);
}

#[test]
fn test_routing_config_rejects_bad_threshold() {
    let mut config = RoutingConfig::default();
    config.cache.similarity_threshold = 0.0;
    assert!(config.validate().is_err());

    config.cache.similarity_threshold = 1.5;
    assert!(config.validate().is_err());
}

#[test]
fn test_routing_config_rejects_inverted_length_thresholds() {
    let mut config = RoutingConfig::default();
    config.rules.length.cheap_max_tokens = 2_000;
    config.rules.length.mid_max_tokens = 1_000;
    assert!(config.validate().is_err());
}

#[test]
fn test_routing_config_rejects_negative_pricing() {
    let mut config = RoutingConfig::default();
    config.tiers.mid.pricing.input_per_1k = -0.1;
    assert!(config.validate().is_err());
}

#[test]
fn test_routing_config_from_file_partial_keys() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(
        file,
        r#"{{ "cache": {{ "similarity_threshold": 0.9, "max_entries": 50 }} }}"#
    )
    .expect("write config");

    let config = RoutingConfig::from_file(file.path()).expect("parse partial config");

    assert_eq!(config.cache.similarity_threshold, 0.9);
    assert_eq!(config.cache.max_entries, 50);
    // Unspecified keys keep defaults.
    assert_eq!(config.cache.ttl_secs, 3_600);
    assert!(config.rules.length.enabled);
}

#[test]
fn test_routing_config_from_file_rejects_garbage() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, "not json at all").expect("write config");

    let result = RoutingConfig::from_file(file.path());
    assert!(matches!(result, Err(ConfigError::FileParse { .. })));
}

#[test]
#[serial]
fn test_routing_config_env_overrides_beat_file() {
    clear_tollgate_env();

    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(
        file,
        r#"{{ "cache": {{ "similarity_threshold": 0.9 }} }}"#
    )
    .expect("write config");

    let config = with_env_vars(&[("TOLLGATE_SIMILARITY_THRESHOLD", "0.7")], || {
        RoutingConfig::load(Some(file.path())).expect("load with overrides")
    });

    assert_eq!(config.cache.similarity_threshold, 0.7);
}

#[test]
fn test_config_store_snapshot_is_stable_across_replace() {
    let store = ConfigStore::with_config(RoutingConfig::default());
    let before = store.snapshot();

    let mut updated = RoutingConfig::default();
    updated.cache.max_entries = 7;
    store.replace(updated).expect("replace valid config");

    // The earlier snapshot is untouched; new snapshots see the change.
    assert_eq!(before.cache.max_entries, 10_000);
    assert_eq!(store.snapshot().cache.max_entries, 7);
    assert_eq!(store.snapshot().version, before.version + 1);
}

#[test]
fn test_config_store_keeps_last_known_good_on_invalid_replace() {
    let store = ConfigStore::with_config(RoutingConfig::default());

    let mut broken = RoutingConfig::default();
    broken.cache.max_entries = 0;
    let result = store.replace(broken);

    assert!(result.is_err());
    assert_eq!(store.snapshot().cache.max_entries, 10_000);
}

#[test]
#[serial]
fn test_config_store_reload_from_changed_file() {
    clear_tollgate_env();

    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, r#"{{ "cache": {{ "ttl_secs": 120 }} }}"#).expect("write config");
    file.flush().expect("flush");

    let store =
        ConfigStore::load(Some(file.path().to_path_buf())).expect("initial load");
    assert_eq!(store.snapshot().cache.ttl_secs, 120);

    std::fs::write(file.path(), r#"{ "cache": { "ttl_secs": 240 } }"#).expect("rewrite");
    let fresh = store.reload().expect("reload");

    assert_eq!(fresh.cache.ttl_secs, 240);
    assert_eq!(store.snapshot().cache.ttl_secs, 240);
}

#[test]
#[serial]
fn test_config_store_reload_rejects_broken_file() {
    clear_tollgate_env();

    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, r#"{{ "cache": {{ "ttl_secs": 120 }} }}"#).expect("write config");
    file.flush().expect("flush");

    let store =
        ConfigStore::load(Some(file.path().to_path_buf())).expect("initial load");

    std::fs::write(file.path(), "{ broken").expect("rewrite");
    assert!(store.reload().is_err());

    // Last-known-good stays active.
    assert_eq!(store.snapshot().cache.ttl_secs, 120);
}
