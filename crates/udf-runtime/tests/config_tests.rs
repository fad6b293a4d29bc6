//! Integration tests for loading runtime configuration from disk

mod common;

use common::{math_class, write_class};
use udf_runtime::{ConfigError, NamespaceLoader, RuntimeConfig, UdfError};

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let classes = dir.path().join("classes");
    std::fs::create_dir(&classes).unwrap();
    write_class(&classes, "Math", &math_class("Math"));

    let config_path = dir.path().join("udf.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[loader]
base_path = "{}"
verify = true

[invoke]
max_call_depth = 64
"#,
            classes.display()
        ),
    )
    .unwrap();

    let config = RuntimeConfig::from_file(&config_path).unwrap();
    assert_eq!(config.loader.base_path, classes);
    assert_eq!(config.loader.extension, "udfc");
    assert_eq!(config.invoke.max_call_depth, 64);

    let loader = NamespaceLoader::from_config(&config);
    assert!(loader.resolve("Math").is_ok());
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = RuntimeConfig::from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::IoError { .. })));
}

#[test]
fn test_invalid_config_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("udf.toml");

    std::fs::write(&path, "[invoke]\nmax_call_depth = 0\n").unwrap();
    assert!(matches!(
        RuntimeConfig::from_file(&path),
        Err(ConfigError::ValidationError(_))
    ));

    std::fs::write(&path, "[loader]\nextension = \".udfc\"\n").unwrap();
    assert!(matches!(
        RuntimeConfig::from_file(&path),
        Err(ConfigError::ValidationError(_))
    ));

    std::fs::write(&path, "[loader\n").unwrap();
    assert!(matches!(
        RuntimeConfig::from_file(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_config_error_converts() {
    let err: UdfError = ConfigError::ValidationError("bad".to_string()).into();
    assert!(matches!(err, UdfError::Config(_)));
    assert!(err.to_string().contains("bad"));
}
