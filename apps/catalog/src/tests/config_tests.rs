use std::collections::HashMap;

use super::{normalize_api_base_url, resolve_settings, Settings};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = resolve_settings(None, env_from(&[]), None).expect("settings");
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_are_overridden_by_env_then_flag() {
    let file = r#"
api_base_url = "https://file.example/Prod/"
request_timeout_secs = 5
"#;

    let from_file = resolve_settings(Some(file), env_from(&[]), None).expect("settings");
    assert_eq!(from_file.api_base_url, "https://file.example/Prod");
    assert_eq!(from_file.request_timeout_secs, 5);

    let env = env_from(&[
        ("CATALOG_API_URL", "https://env.example"),
        ("APP__REQUEST_TIMEOUT_SECS", "12"),
    ]);
    let from_env = resolve_settings(Some(file), env, None).expect("settings");
    assert_eq!(from_env.api_base_url, "https://env.example");
    assert_eq!(from_env.request_timeout_secs, 12);

    let from_flag = resolve_settings(
        Some(file),
        env_from(&[("CATALOG_API_URL", "https://env.example")]),
        Some("http://localhost:4000/"),
    )
    .expect("settings");
    assert_eq!(from_flag.api_base_url, "http://localhost:4000");
}

#[test]
fn app_prefixed_env_wins_over_plain_env() {
    let env = env_from(&[
        ("CATALOG_API_URL", "https://plain.example"),
        ("APP__API_BASE_URL", "https://app.example"),
    ]);
    let settings = resolve_settings(None, env, None).expect("settings");
    assert_eq!(settings.api_base_url, "https://app.example");
}

#[test]
fn unparsable_timeout_keeps_previous_value() {
    let env = env_from(&[("APP__REQUEST_TIMEOUT_SECS", "soon")]);
    let settings = resolve_settings(None, env, None).expect("settings");
    assert_eq!(settings.request_timeout_secs, 30);
}

#[test]
fn rejects_non_http_base_urls() {
    assert!(normalize_api_base_url("ftp://books.example").is_err());
    assert!(normalize_api_base_url("not a url").is_err());
    assert_eq!(
        normalize_api_base_url(" https://api.example/Prod// ").expect("valid"),
        "https://api.example/Prod"
    );
}

#[test]
fn malformed_config_file_is_an_error() {
    assert!(resolve_settings(Some("api_base_url = "), env_from(&[]), None).is_err());
}
