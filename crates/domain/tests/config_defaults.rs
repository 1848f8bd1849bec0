use wf_domain::config::{Config, ConfigSeverity, DeliveryMode, StatusBackend};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8770);
}

#[test]
fn empty_toml_resolves_all_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.status.backend, StatusBackend::File);
    assert_eq!(config.status.ttl_secs, 3600);
    assert_eq!(config.admission.suppress_window_secs, 5);
    assert_eq!(config.notifier.first_delay_ms, 8_000);
    assert_eq!(config.notifier.second_delay_ms, 12_000);
    assert_eq!(config.turn.max_iterations, 3);
    assert_eq!(config.delivery.mode, DeliveryMode::Log);
    assert!(config.tools.http.is_empty());
}

#[test]
fn partial_section_keeps_sibling_defaults() {
    let toml_str = r#"
[status]
backend = "memory"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.status.backend, StatusBackend::Memory);
    assert_eq!(config.status.ttl_secs, 3600);
}

#[test]
fn http_tools_parse() {
    let toml_str = r#"
[[tools.http]]
name = "search_flights"
url = "http://localhost:9001/search"
description = "Search for flights."
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.tools.http.len(), 1);
    assert_eq!(config.tools.http[0].name, "search_flights");
    assert_eq!(config.tools.http[0].timeout_secs, 30);
}

#[test]
fn default_config_validates_clean() {
    let issues = Config::default().validate();
    assert!(
        issues.iter().all(|i| i.severity != ConfigSeverity::Error),
        "default config must not carry errors: {issues:?}"
    );
}

#[test]
fn webhook_mode_without_url_is_an_error() {
    let toml_str = r#"
[delivery]
mode = "webhook"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error && i.message.contains("webhook_url")));
}

#[test]
fn duplicate_tool_names_are_an_error() {
    let toml_str = r#"
[[tools.http]]
name = "search_flights"
url = "http://localhost:9001/search"

[[tools.http]]
name = "search_flights"
url = "http://localhost:9002/search"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error && i.message.contains("duplicate")));
}

#[test]
fn zero_suppress_window_is_a_warning() {
    let toml_str = r#"
[admission]
suppress_window_secs = 0
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Warning));
}
