use super::{apply_env, apply_file, load_settings, normalize_server_url, ClientSettings};

use std::{
    collections::HashMap,
    env, fs,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_point_at_local_server() {
    let settings = ClientSettings::default();
    assert_eq!(settings.server_url, "http://127.0.0.1:8080/api");
    assert_eq!(settings.auth_token, None);
    assert_eq!(settings.request_timeout(), Duration::from_secs(30));
}

#[test]
fn file_values_override_defaults() {
    let mut settings = ClientSettings::default();
    apply_file(
        &mut settings,
        r#"
server_url = "https://school.example/api"
auth_token = "teacher-token"
branch_id = 4
request_timeout_secs = 5
"#,
    )
    .expect("apply file");

    assert_eq!(settings.server_url, "https://school.example/api");
    assert_eq!(settings.auth_token.as_deref(), Some("teacher-token"));
    assert_eq!(settings.branch_id.as_deref(), Some("4"));
    assert_eq!(settings.request_timeout_secs, 5);
}

#[test]
fn file_rejects_negative_timeout() {
    let mut settings = ClientSettings::default();
    assert!(apply_file(&mut settings, "request_timeout_secs = -3").is_err());
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let mut settings = ClientSettings::default();
    apply_env(
        &mut settings,
        lookup_from(&[
            ("BPS_SERVER_URL", "http://first"),
            ("APP__SERVER_URL", "http://second"),
            ("BPS_BRANCH_ID", "b-2"),
            ("APP__REQUEST_TIMEOUT_SECS", "not-a-number"),
        ]),
    );

    assert_eq!(settings.server_url, "http://second");
    assert_eq!(settings.branch_id.as_deref(), Some("b-2"));
    assert_eq!(settings.request_timeout_secs, 30);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("bps_missing_{suffix}.toml"));
    assert!(load_settings(Some(&path)).is_err());
}

#[test]
fn explicit_file_is_loaded() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("bps_config_{suffix}.toml"));
    fs::write(&path, "request_timeout_secs = 12\n").expect("write config");

    let settings = load_settings(Some(&path)).expect("load settings");
    assert_eq!(settings.request_timeout_secs, 12);

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn normalizes_trailing_slashes() {
    assert_eq!(
        normalize_server_url("https://school.example/api//").expect("valid url"),
        "https://school.example/api"
    );
}

#[test]
fn rejects_relative_and_non_http_urls() {
    assert!(normalize_server_url("school.example/api").is_err());
    assert!(normalize_server_url("ftp://school.example").is_err());
}
