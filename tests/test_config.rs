use std::time::Duration;

use pollhttpd::config::Config;

#[test]
fn test_config_defaults() {
    let cfg = Config::resolve(None, None).unwrap();

    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.server.idle_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.server.poll_timeout(), Duration::from_secs(60));
    assert_eq!(cfg.server.keep_alive_max, 100);
    assert!(cfg.access_log.is_none());
}

#[test]
fn test_config_listen_override() {
    let cfg = Config::resolve(None, Some("0.0.0.0:3000".to_string())).unwrap();

    assert_eq!(cfg.server.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.server.socket_addr().unwrap().port(), 3000);
}

#[test]
fn test_config_partial_yaml_keeps_defaults() {
    let yaml = r#"
server:
  idle_timeout_secs: 5
  keep_alive_max: 10
access_log: /tmp/access.log
"#;
    let cfg = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(cfg.server.idle_timeout_secs, 5);
    assert_eq!(cfg.server.keep_alive_max, 10);
    assert_eq!(cfg.server.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.server.max_connections, 1024);
    assert_eq!(cfg.access_log.unwrap().to_str(), Some("/tmp/access.log"));
}

#[test]
fn test_config_from_file_with_override() {
    let path = std::env::temp_dir().join(format!("pollhttpd-config-{}.yaml", std::process::id()));
    std::fs::write(&path, "server:\n  listen_addr: \"127.0.0.1:9000\"\n  read_burst: 8\n").unwrap();

    let from_file = Config::resolve(Some(&path), None).unwrap();
    assert_eq!(from_file.server.listen_addr, "127.0.0.1:9000");
    assert_eq!(from_file.server.read_burst, 8);

    let overridden = Config::resolve(Some(&path), Some("127.0.0.1:9001".to_string())).unwrap();
    assert_eq!(overridden.server.listen_addr, "127.0.0.1:9001");
    assert_eq!(overridden.server.read_burst, 8);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_config_missing_file_fails() {
    let path = std::env::temp_dir().join("pollhttpd-does-not-exist.yaml");

    assert!(Config::resolve(Some(&path), None).is_err());
}

#[test]
fn test_config_rejects_zero_timeout() {
    let cfg = Config::from_yaml_str("server:\n  idle_timeout_secs: 0\n").unwrap();

    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("idle_timeout_secs"));
}

#[test]
fn test_config_rejects_bad_address() {
    let err = Config::resolve(None, Some("not-an-address".to_string())).unwrap_err();

    assert!(err.to_string().contains("invalid listen address"));
}

#[test]
fn test_config_rejects_malformed_yaml() {
    assert!(Config::from_yaml_str("server: [unterminated").is_err());
}
