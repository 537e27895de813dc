//! Password comes from the named env var unless a passfile is given.

use cmw_config::{resolve_password, DeviceConfig};

#[test]
fn env_var_named_in_config_is_used() {
    let device = DeviceConfig {
        password_env: "CMW_TEST_PW_RESOLUTION_A".to_string(),
        ..DeviceConfig::default()
    };
    std::env::set_var("CMW_TEST_PW_RESOLUTION_A", "from-env");

    let pw = resolve_password(&device, None).unwrap();
    assert_eq!(pw.expose(), "from-env");
}

#[test]
fn passfile_wins_over_env() {
    let device = DeviceConfig {
        password_env: "CMW_TEST_PW_RESOLUTION_B".to_string(),
        ..DeviceConfig::default()
    };
    std::env::set_var("CMW_TEST_PW_RESOLUTION_B", "from-env");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modem.pass");
    std::fs::write(&path, "from-file\n").unwrap();

    let pw = resolve_password(&device, Some(&path)).unwrap();
    assert_eq!(pw.expose(), "from-file");
}

#[test]
fn missing_env_names_the_variable_only() {
    let device = DeviceConfig {
        password_env: "CMW_TEST_PW_RESOLUTION_UNSET".to_string(),
        ..DeviceConfig::default()
    };
    std::env::remove_var("CMW_TEST_PW_RESOLUTION_UNSET");

    let err = resolve_password(&device, None).unwrap_err().to_string();
    assert!(err.contains("SECRET_MISSING"));
    assert!(err.contains("CMW_TEST_PW_RESOLUTION_UNSET"));
}
