//! Integration tests for postern-core infrastructure

use postern_core::{
    config_error, init_logging, not_found_error, storage_error, validation_error, ErrorContext,
    LogFormat, LoggingConfig, PosternConfig, PosternError,
};

#[test]
fn test_error_handling() {
    let error = storage_error!("Test storage error", "test_component");

    match &error {
        PosternError::Storage {
            message, context, ..
        } => {
            assert_eq!(message, "Test storage error");
            assert_eq!(context.component, "test_component");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Storage error"),
    }

    // Should not panic without a subscriber
    error.log();
    assert!(error.is_recoverable());

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());
    assert!(config_error
        .context()
        .unwrap()
        .recovery_suggestions
        .iter()
        .any(|s| s.contains("postern config --init")));

    let validation = validation_error!("bad value", "page_size", "test");
    match validation {
        PosternError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("page_size")),
        _ => panic!("Expected Validation error"),
    }

    let missing = not_found_error!("subdomain 42", "test");
    assert_eq!(missing.to_string(), "Resource not found: subdomain 42");
}

#[test]
fn test_error_context_builder() {
    let context = ErrorContext::new("resolver")
        .with_operation("resolve_ownership")
        .with_metadata("entity_kind", "email")
        .with_suggestion("Check the read model");

    assert_eq!(context.operation.as_deref(), Some("resolve_ownership"));
    assert_eq!(context.metadata.get("entity_kind").unwrap(), "email");
    assert_eq!(context.recovery_suggestions.len(), 1);
}

#[test]
fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Compact,
        filter_directives: vec!["postern_core=debug".to_string()],
        ..LoggingConfig::default()
    };

    // A second initialisation in the same process reports an error instead of panicking
    let _ = init_logging(&config);
    assert!(init_logging(&config).is_err());
}

#[test]
fn test_logging_requires_file_path() {
    let config = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };

    let err = init_logging(&config).unwrap_err();
    assert!(err.to_string().contains("log_file_path"));
}

#[test]
fn test_config_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("postern.toml");

    let mut config = PosternConfig::default();
    config.store.database_url = "sqlite::memory:".to_string();
    config.access.resolver_timeout_ms = 750;
    config.save_to_file(&path).unwrap();

    let loaded = PosternConfig::from_file(&path).unwrap();
    assert_eq!(loaded.store.database_url, "sqlite::memory:");
    assert_eq!(loaded.access.resolver_timeout_ms, 750);
    assert_eq!(loaded.logging.format, LogFormat::Compact);
}

#[test]
fn test_config_partial_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("postern.toml");
    std::fs::write(&path, "[access]\nmax_page_size = 50\n").unwrap();

    let loaded = PosternConfig::from_file(&path).unwrap();
    assert_eq!(loaded.access.max_page_size, 50);
    assert_eq!(loaded.access.default_page_size, 25);
    assert_eq!(loaded.store.max_connections, 5);
}

#[test]
fn test_config_validation() {
    let config = PosternConfig::default();
    tokio_test::assert_ok!(config.validate());

    let mut bad = PosternConfig::default();
    bad.access.resolver_timeout_ms = 0;
    assert!(matches!(bad.validate(), Err(PosternError::Config { .. })));

    let mut bad = PosternConfig::default();
    bad.access.default_page_size = 500;
    assert!(bad.validate().is_err());

    let mut bad = PosternConfig::default();
    bad.store.database_url = "  ".to_string();
    tokio_test::assert_err!(bad.validate());
}

#[test]
fn test_with_timeout_outside_a_runtime_test() {
    let value = tokio_test::block_on(postern_core::with_timeout(async { 7 }, 50, "quick"));
    assert_eq!(tokio_test::assert_ok!(value), 7);

    let slow = tokio_test::block_on(async {
        postern_core::with_timeout(
            tokio::time::sleep(std::time::Duration::from_millis(200)),
            10,
            "slow",
        )
        .await
    });
    assert!(matches!(slow, Err(PosternError::Timeout { duration_ms: 10, .. })));
}

#[test]
fn test_config_rejects_invalid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[access\nresolver_timeout_ms = ").unwrap();

    match PosternConfig::from_file(&path) {
        Err(PosternError::Config { context, .. }) => {
            assert_eq!(context.operation.as_deref(), Some("parse_toml"));
        }
        other => panic!("Expected config error, got {:?}", other.map(|_| ())),
    }
}
