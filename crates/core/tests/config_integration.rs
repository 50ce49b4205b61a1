//! passiverecon.toml 통합 설정 테스트
//!
//! - passiverecon.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use passiverecon_core::config::{PassiveReconConfig, WriteMode};
use passiverecon_core::error::{ConfigError, PassiveReconError};

// =============================================================================
// passiverecon.toml.example 파싱 테스트
// =============================================================================

const EXAMPLE: &str = include_str!("../../../passiverecon.toml.example");

#[test]
fn example_config_parses_successfully() {
    let config = PassiveReconConfig::parse(EXAMPLE).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    // 예시 파일에서 sensor / ignore_spec은 주석 처리되어 있음
    assert_eq!(config.ingest.sensor, None);
    assert_eq!(config.ingest.ignore_spec, None);
}

#[test]
fn example_config_passes_validation() {
    let config = PassiveReconConfig::parse(EXAMPLE).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let example = PassiveReconConfig::parse(EXAMPLE).expect("should parse");
    let defaults = PassiveReconConfig::default();

    assert_eq!(example.general.log_level, defaults.general.log_level);
    assert_eq!(example.general.log_format, defaults.general.log_format);
    assert_eq!(
        example.ingest.recon_prefix_len,
        defaults.ingest.recon_prefix_len
    );
    assert_eq!(example.ingest.max_value_len, defaults.ingest.max_value_len);
    assert_eq!(example.ingest.input_format, defaults.ingest.input_format);
    assert_eq!(example.store.path, defaults.store.path);
    assert_eq!(example.store.write_mode, defaults.store.write_mode);
    assert_eq!(example.store.bulk_batch_size, defaults.store.bulk_batch_size);
    assert_eq!(
        example.store.local_bulk_max_entries,
        defaults.store.local_bulk_max_entries
    );
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let toml = r#"
[general]
log_level = "debug"
log_format = "pretty"
"#;
    let config = PassiveReconConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.store.write_mode, WriteMode::Bulk);
    assert_eq!(config.ingest.recon_prefix_len, 14);
}

#[test]
fn partial_config_ingest_only() {
    let toml = r#"
[ingest]
sensor = "edge-01"
ignore_spec = "/etc/passiverecon/ignore.yml"
input_format = "zeek"
"#;
    let config = PassiveReconConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.ingest.sensor.as_deref(), Some("edge-01"));
    assert_eq!(
        config.ingest.ignore_spec.as_deref(),
        Some("/etc/passiverecon/ignore.yml")
    );
    assert_eq!(config.ingest.input_format, "zeek");
    assert_eq!(config.ingest.max_value_len, 1000);
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn partial_config_store_only() {
    let toml = r#"
[store]
path = ":memory:"
write_mode = "single"
"#;
    let config = PassiveReconConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.store.path, ":memory:");
    assert_eq!(config.store.write_mode, WriteMode::Single);
    assert_eq!(config.store.bulk_batch_size, 500);
    assert_eq!(config.store.local_bulk_max_entries, 10_000);
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;

    let original = std::env::var("PASSIVERECON_GENERAL_LOG_LEVEL").ok();
    // SAFETY: 테스트는 serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("PASSIVERECON_GENERAL_LOG_LEVEL", "error");
    }

    let mut config = PassiveReconConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.general.log_level.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("PASSIVERECON_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("PASSIVERECON_GENERAL_LOG_LEVEL"),
        }
    }

    assert_eq!(result, "error");
}

#[test]
#[serial_test::serial]
fn env_override_write_mode_and_numbers() {
    let toml = r#"
[store]
write_mode = "bulk"
local_bulk_max_entries = 100
"#;

    // SAFETY: 테스트는 serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("PASSIVERECON_STORE_WRITE_MODE", "local-bulk");
        std::env::set_var("PASSIVERECON_STORE_LOCAL_BULK_MAX_ENTRIES", "2000");
    }

    let mut config = PassiveReconConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();

    // SAFETY: 테스트 정리
    unsafe {
        std::env::remove_var("PASSIVERECON_STORE_WRITE_MODE");
        std::env::remove_var("PASSIVERECON_STORE_LOCAL_BULK_MAX_ENTRIES");
    }

    assert_eq!(config.store.write_mode, WriteMode::LocalBulk);
    assert_eq!(config.store.local_bulk_max_entries, 2000);
}

#[test]
#[serial_test::serial]
fn env_override_unknown_write_mode_keeps_toml_value() {
    let toml = r#"
[store]
write_mode = "single"
"#;

    // SAFETY: 테스트는 serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("PASSIVERECON_STORE_WRITE_MODE", "turbo");
    }

    let mut config = PassiveReconConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();

    // SAFETY: 테스트 정리
    unsafe {
        std::env::remove_var("PASSIVERECON_STORE_WRITE_MODE");
    }

    assert_eq!(config.store.write_mode, WriteMode::Single);
}

// =============================================================================
// 빈 파일 / 잘못된 형식 테스트
// =============================================================================

#[test]
fn empty_string_parses_with_defaults() {
    let config = PassiveReconConfig::parse("").expect("empty config should parse");
    config.validate().expect("defaults should validate");
    assert_eq!(config.store.write_mode, WriteMode::Bulk);
}

#[test]
fn comments_only_parses_with_defaults() {
    let config =
        PassiveReconConfig::parse("# nothing here\n# [store]\n").expect("should parse");
    assert_eq!(config.general.log_format, "json");
}

#[test]
fn malformed_toml_returns_parse_error() {
    let result = PassiveReconConfig::parse("[store\npath = 1");
    assert!(matches!(
        result,
        Err(PassiveReconError::Config(ConfigError::ParseFailed { .. }))
    ));
}

#[test]
fn unknown_write_mode_returns_parse_error() {
    let toml = r#"
[store]
write_mode = "turbo"
"#;
    assert!(PassiveReconConfig::parse(toml).is_err());
}

#[test]
fn wrong_type_for_numeric_field() {
    let toml = r#"
[store]
bulk_batch_size = "five hundred"
"#;
    assert!(PassiveReconConfig::parse(toml).is_err());
}

#[test]
fn out_of_range_value_fails_validation_with_field_name() {
    let toml = r#"
[store]
local_bulk_max_entries = 0
"#;
    let config = PassiveReconConfig::parse(toml).expect("should parse");
    let err = config.validate().expect_err("zero entries is invalid");
    assert!(err.to_string().contains("store.local_bulk_max_entries"));
}

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result =
        PassiveReconConfig::from_file("/tmp/passiverecon_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result,
        Err(PassiveReconError::Config(ConfigError::FileNotFound { .. }))
    ));
}

#[tokio::test]
async fn load_config_from_disk() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("passiverecon.toml");
    std::fs::write(&path, EXAMPLE).expect("should write config");

    let config = PassiveReconConfig::from_file(&path)
        .await
        .expect("example should load");
    assert_eq!(config.store.path, "/var/lib/passiverecon/passive.db");
}

// =============================================================================
// 직렬화 라운드트립 테스트
// =============================================================================

#[test]
fn serialize_and_reparse_roundtrip() {
    let mut original = PassiveReconConfig::default();
    original.ingest.sensor = Some("edge-01".to_owned());
    original.store.write_mode = WriteMode::LocalBulk;

    let toml_str = toml::to_string_pretty(&original).expect("should serialize");
    assert!(toml_str.contains("write_mode = \"local-bulk\""));

    let parsed = PassiveReconConfig::parse(&toml_str).expect("should reparse");
    parsed.validate().expect("reparsed should validate");

    assert_eq!(parsed.ingest.sensor, original.ingest.sensor);
    assert_eq!(parsed.store.write_mode, original.store.write_mode);
    assert_eq!(parsed.store.path, original.store.path);
}
