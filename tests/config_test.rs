use std::env;
use std::fs;
use std::time::Duration;

use ghostpass::{
    get_default_config, set_default_config, ConfigError, GhostPass, GhostPassConfig, SdkError,
};
use tempfile::tempdir;

#[test]
fn toml_file_drives_component_timing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ghostpass.toml");
    fs::write(
        &path,
        r#"
base_url = "functions.ghostpass.test"
port = 8443
token_ttl_secs = 20
display_window_secs = 3
sound_enabled = false
"#,
    )
    .unwrap();

    let config = GhostPassConfig::load(&path).unwrap();
    assert_eq!(config.tick_interval_ms, 1000);

    let presenter = config.presenter_settings();
    assert_eq!(presenter.token_ttl, Duration::from_secs(20));
    assert_eq!(presenter.tick_interval, Duration::from_secs(1));

    let scanner = config.scanner_settings();
    assert_eq!(scanner.display_window, Duration::from_secs(3));
    assert!(!scanner.sound_enabled);

    let sdk = GhostPass::new(config).unwrap();
    assert_eq!(sdk.config().port, Some(8443));
}

#[test]
fn saved_json_loads_back_unchanged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("ghostpass.json");

    let config = GhostPassConfig::builder()
        .base_url("functions.ghostpass.test")
        .session_token("session-abc")
        .display_window_secs(2)
        .build()
        .unwrap();
    config.save(&path).unwrap();

    assert_eq!(GhostPassConfig::load(&path).unwrap(), config);
}

#[test]
fn invalid_files_are_rejected_on_load() {
    let dir = tempdir().unwrap();

    let zero_ttl = dir.path().join("zero.toml");
    fs::write(&zero_ttl, "base_url = \"x.test\"\ntoken_ttl_secs = 0\n").unwrap();
    assert!(matches!(
        GhostPassConfig::load(&zero_ttl),
        Err(ConfigError::InvalidValue {
            field: "token_ttl_secs",
            ..
        })
    ));

    let slow_tick = dir.path().join("tick.toml");
    fs::write(
        &slow_tick,
        "base_url = \"x.test\"\ntoken_ttl_secs = 2\ntick_interval_ms = 5000\n",
    )
    .unwrap();
    assert!(matches!(
        GhostPassConfig::load(&slow_tick),
        Err(ConfigError::InvalidValue {
            field: "tick_interval_ms",
            ..
        })
    ));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    assert!(matches!(
        GhostPassConfig::load(&broken),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn environment_with_secret_files() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("session");
    fs::write(&session, "session-from-file\n").unwrap();

    env::set_var("GPROOTTEST_BASE_URL", "functions.ghostpass.test");
    env::set_var("GPROOTTEST_SESSION_TOKEN_FILE", &session);
    env::set_var("GPROOTTEST_DISPLAY_WINDOW_SECS", "4");
    env::set_var("GPROOTTEST_SOUND_ENABLED", "false");

    let config = GhostPassConfig::from_env_or_file("GPROOTTEST").unwrap();
    assert_eq!(config.session_token.as_deref(), Some("session-from-file"));
    assert_eq!(config.display_window_secs, 4);
    assert!(!config.sound_enabled);

    env::set_var("GPROOTTEST_PORT", "not-a-port");
    assert!(matches!(
        GhostPassConfig::from_env_or_file("GPROOTTEST"),
        Err(ConfigError::InvalidPort)
    ));
}

#[test]
fn sdk_refuses_unusable_config() {
    let err = GhostPass::builder().token_ttl_secs(30).build().unwrap_err();
    assert!(matches!(err, SdkError::Config(_)));
}

#[test]
fn default_config_is_set_once() {
    let config = GhostPassConfig::new("functions.ghostpass.test");
    set_default_config(config.clone()).unwrap();

    assert_eq!(get_default_config(), Some(&config));
    assert!(matches!(
        set_default_config(config),
        Err(ConfigError::AlreadyInitialized)
    ));
}
