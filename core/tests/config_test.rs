use mockstream_core::ServerConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn defaults_match_original_server() {
    let config = ServerConfig::default();
    assert_eq!(config.port, 5000);
    assert_eq!(config.latency_ms, 1000);
    assert_eq!(config.chunk_size, 20);
    assert_eq!(config.data_path, PathBuf::from("mock-event-stream-data.json"));
    assert_eq!(config.latency(), Duration::from_secs(1));
    assert_eq!(config.addr(), "127.0.0.1:5000");
}

#[test]
fn json_overlays_defaults() {
    let config = ServerConfig::from_json(r#"{ "port": 8080, "latency": 250 }"#).unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.latency_ms, 250);
    assert_eq!(config.host, "127.0.0.1");
}

#[test]
fn zero_values_fall_back_to_defaults() {
    let config = ServerConfig::from_json(r#"{ "port": 0, "latency": 0 }"#).unwrap();
    assert_eq!(config.port, 5000);
    assert_eq!(config.latency_ms, 1000);
}

#[test]
fn empty_object_is_all_defaults() {
    let config = ServerConfig::from_json("{}").unwrap();
    assert_eq!(config.port, 5000);
    assert_eq!(config.latency_ms, 1000);
}

#[test]
fn data_file_and_host_are_configurable() {
    let config =
        ServerConfig::from_json(r#"{ "host": "0.0.0.0", "dataFile": "/tmp/data.json" }"#).unwrap();
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.data_path, PathBuf::from("/tmp/data.json"));
}

#[test]
fn invalid_json_is_an_error() {
    assert!(ServerConfig::from_json("port = 5000").is_err());
}

#[test]
fn load_from_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::load_from(dir.path().join("absent.json"));
    assert_eq!(config.port, 5000);
}

#[test]
fn load_from_invalid_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ broken").unwrap();

    let config = ServerConfig::load_from(&path);
    assert_eq!(config.port, 5000);
    assert_eq!(config.latency_ms, 1000);
}

#[test]
fn load_from_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mock-event-stream-config.json");
    std::fs::write(&path, r#"{ "port": 6001, "latency": 10 }"#).unwrap();

    let config = ServerConfig::load_from(&path);
    assert_eq!(config.port, 6001);
    assert_eq!(config.latency(), Duration::from_millis(10));
}

#[test]
fn variables_override_file() {
    let vars: HashMap<&str, &str> = [
        ("MOCKSTREAM_HOST", "0.0.0.0"),
        ("MOCKSTREAM_PORT", "7000"),
        ("MOCKSTREAM_LATENCY_MS", "5"),
        ("MOCKSTREAM_DATA", "other.json"),
    ]
    .into_iter()
    .collect();

    let config = ServerConfig::from_json(r#"{ "port": 8080 }"#)
        .unwrap()
        .with_vars(|name| vars.get(name).map(|v| v.to_string()));

    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 7000);
    assert_eq!(config.latency_ms, 5);
    assert_eq!(config.data_path, PathBuf::from("other.json"));
}

#[test]
fn unparsable_variables_are_ignored() {
    let config = ServerConfig::default().with_vars(|name| match name {
        "MOCKSTREAM_PORT" => Some("not-a-port".to_string()),
        "MOCKSTREAM_LATENCY_MS" => Some("0".to_string()),
        _ => None,
    });

    assert_eq!(config.port, 5000);
    assert_eq!(config.latency_ms, 1000);
}
