use mc_panel::config::{MAX_MEMORY_MB, PanelConfig, validate_config, validate_create_request};
use mc_panel::error::{Error, Result};
use mc_panel::server::CreateServerRequest;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_parse_config() -> Result<()> {
    let config_str = r#"{
        "dataDir": "/srv/minecraft",
        "stateFile": "/var/lib/mc-panel/servers.json",
        "runtime": {
            "dockerBinary": "/usr/bin/docker",
            "containerPrefix": "mc",
            "image": "itzg/minecraft-server:java21",
            "memoryOverheadMb": 256,
            "stopTimeout": "45s"
        },
        "lifecycle": {
            "launchTimeout": "10m",
            "eventHistory": 50
        },
        "stats": { "pollInterval": "2s" },
        "monitor": { "checkInterval": "1m", "maxConsecutiveFailures": 3 },
        "api": { "address": "127.0.0.1", "port": 8080, "workers": 2 }
    }"#;

    let config = PanelConfig::parse_from_str(config_str)?;

    assert_eq!(config.data_dir, PathBuf::from("/srv/minecraft"));
    assert_eq!(
        config.state_file(),
        PathBuf::from("/var/lib/mc-panel/servers.json")
    );
    assert_eq!(config.runtime.docker_binary, "/usr/bin/docker");
    assert_eq!(config.runtime.container_prefix, "mc");
    assert_eq!(config.runtime.memory_overhead_mb, 256);
    assert_eq!(config.runtime.stop_timeout, Duration::from_secs(45));
    assert_eq!(config.runtime.game_port, 25565);
    assert_eq!(config.lifecycle.launch_timeout, Duration::from_secs(600));
    assert_eq!(config.lifecycle.event_history, 50);
    assert_eq!(config.stats.poll_interval, Duration::from_secs(2));
    assert_eq!(config.monitor.check_interval, Duration::from_secs(60));
    assert_eq!(config.monitor.max_consecutive_failures, 3);

    let api = config.api.as_ref().unwrap();
    assert_eq!(api.address, "127.0.0.1");
    assert_eq!(api.port, 8080);
    assert_eq!(api.workers, Some(2));

    validate_config(&config)?;

    Ok(())
}

#[test]
fn test_config_from_json_file() -> Result<()> {
    let mut file = NamedTempFile::with_suffix(".json").unwrap();
    write!(file, r#"{{ "dataDir": "/data", "api": {{ "port": 3002 }} }}"#).unwrap();

    let config = PanelConfig::from_file(file.path())?;

    assert_eq!(config.data_dir, PathBuf::from("/data"));
    assert_eq!(config.api.unwrap().port, 3002);

    Ok(())
}

#[test]
fn test_config_from_yaml_file() -> Result<()> {
    let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
    writeln!(file, "dataDir: /data").unwrap();
    writeln!(file, "monitor:").unwrap();
    writeln!(file, "  checkInterval: 15s").unwrap();

    let config = PanelConfig::from_file(file.path())?;

    assert_eq!(config.monitor.check_interval, Duration::from_secs(15));
    assert_eq!(config.monitor.max_consecutive_failures, 2);

    Ok(())
}

#[test]
fn test_missing_config_file() {
    let result = PanelConfig::from_file("/nonexistent/panel.json");
    assert!(matches!(result, Err(Error::ConfigParse(_))));
}

#[test]
fn test_invalid_config_values() {
    let mut config = PanelConfig::default();
    config.lifecycle.launch_timeout = Duration::ZERO;
    assert!(matches!(validate_config(&config), Err(Error::InvalidConfig(_))));

    let mut config = PanelConfig::default();
    config.runtime.image = String::new();
    assert!(matches!(validate_config(&config), Err(Error::InvalidConfig(_))));

    let mut config = PanelConfig::default();
    config.monitor.max_consecutive_failures = 0;
    assert!(matches!(validate_config(&config), Err(Error::InvalidConfig(_))));

    assert!(validate_config(&PanelConfig::default()).is_ok());
}

#[test]
fn test_validate_create_request() {
    let valid = CreateServerRequest {
        name: Some("S1".to_string()),
        version: Some("1.20.4".to_string()),
        memory: Some(1024),
        port: Some(25565),
        ..Default::default()
    };
    assert!(validate_create_request(&valid).is_ok());

    let blank_name = CreateServerRequest {
        name: Some("   ".to_string()),
        ..valid.clone()
    };
    match validate_create_request(&blank_name) {
        Err(Error::InvalidConfig(msg)) => assert_eq!(msg, "Missing required fields: name"),
        other => panic!("expected InvalidConfig, got {:?}", other),
    }

    let zero_port = CreateServerRequest {
        port: Some(0),
        ..valid.clone()
    };
    assert!(matches!(
        validate_create_request(&zero_port),
        Err(Error::InvalidConfig(msg)) if msg.contains("port")
    ));

    let no_players = CreateServerRequest {
        max_players: Some(0),
        ..valid.clone()
    };
    assert!(validate_create_request(&no_players).is_err());

    let largest = CreateServerRequest {
        memory: Some(MAX_MEMORY_MB),
        ..valid.clone()
    };
    assert!(validate_create_request(&largest).is_ok());

    let oversized = CreateServerRequest {
        memory: Some(u32::MAX),
        ..valid.clone()
    };
    assert!(matches!(
        validate_create_request(&oversized),
        Err(Error::InvalidConfig(msg)) if msg.contains("memory")
    ));

    let spaced_version = CreateServerRequest {
        version: Some("1.20.4 --rm".to_string()),
        ..valid
    };
    assert!(validate_create_request(&spaced_version).is_err());
}
