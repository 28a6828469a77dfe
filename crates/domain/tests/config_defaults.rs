use kd_domain::config::{BusyPolicy, Config, MemoryEviction};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn explicit_zero_host_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 3210
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(!config.server.cors.allowed_origins.is_empty());
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn cors_config_parses_custom_origins() {
    let toml_str = r#"
[server.cors]
allowed_origins = ["https://myapp.com", "http://localhost:3000"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.cors.allowed_origins.len(), 2);
    assert!(config.server.cors.allowed_origins.contains(&"https://myapp.com".to_string()));
}

#[test]
fn cors_wildcard_port_preserved_in_config() {
    let toml_str = r#"
[server.cors]
allowed_origins = ["http://localhost:*"]
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.cors.allowed_origins[0], "http://localhost:*");
}

#[test]
fn orchestration_defaults() {
    let config = Config::default();
    assert_eq!(config.orchestrator.aggregation_window_ms, 2_000);
    assert_eq!(config.orchestrator.aggregation_max_ms, 6_000);
    assert_eq!(config.orchestrator.cap_flush_delay_ms, 200);
    assert_eq!(config.orchestrator.busy_policy, BusyPolicy::RerunAfter);
    assert_eq!(config.context.memory_eviction, MemoryEviction::Importance);
    assert_eq!(config.background.workers, 4);
}

#[test]
fn policies_parse_from_snake_case() {
    let toml_str = r#"
[orchestrator]
busy_policy = "skip"

[context]
memory_eviction = "recency"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.orchestrator.busy_policy, BusyPolicy::Skip);
    assert_eq!(config.context.memory_eviction, MemoryEviction::Recency);
}

#[test]
fn companions_parse_with_default_traits() {
    let toml_str = r#"
[[companions]]
id = "luna"
name = "Luna"
interests = ["astronomy", "jazz"]

[companions.traits]
confidence = 0.8
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.companions.len(), 1);
    let luna = &config.companions[0];
    assert_eq!(luna.interests.len(), 2);
    assert!((luna.traits.confidence - 0.8).abs() < f32::EPSILON);
    assert!((luna.traits.intelligence - 0.5).abs() < f32::EPSILON);
    assert!(config.is_valid());
}
