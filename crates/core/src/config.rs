//! 설정 관리 — passiverecon.toml 파싱 및 런타임 설정
//!
//! [`PassiveReconConfig`]는 수집 도구 전체의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PASSIVERECON_STORE_PATH=/tmp/passive.db` 형식)
//! 3. 설정 파일 (`passiverecon.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), passiverecon_core::error::PassiveReconError> {
//! use passiverecon_core::config::PassiveReconConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PassiveReconConfig::load("passiverecon.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PassiveReconConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PassiveReconError};

/// 쓰기 전략
///
/// 세 전략은 같은 레코드 시퀀스를 소비하며 메모리/지연/내구성 특성만 다릅니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// 저장소의 네이티브 bulk upsert 사용 (기본값)
    #[default]
    Bulk,
    /// 클라이언트 메모리에서 dedup 키로 병합한 뒤 flush
    LocalBulk,
    /// 레코드마다 upsert 한 번
    Single,
}

impl WriteMode {
    /// 설정/로그에서 사용하는 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bulk => "bulk",
            Self::LocalBulk => "local-bulk",
            Self::Single => "single",
        }
    }

    /// 이름에서 쓰기 전략을 파싱합니다.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bulk" => Some(Self::Bulk),
            "local-bulk" | "local_bulk" => Some(Self::LocalBulk),
            "single" | "no-bulk" => Some(Self::Single),
            _ => None,
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// passiverecon 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassiveReconConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 입력/정규화/필터 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 저장소 및 쓰기 전략 설정
    #[serde(default)]
    pub store: StoreConfig,
}

impl PassiveReconConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PassiveReconError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일 없이 기본값에 환경변수 오버라이드만 적용합니다.
    pub fn from_env() -> Result<Self, PassiveReconError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PassiveReconError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PassiveReconError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PassiveReconError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PassiveReconError> {
        toml::from_str(toml_str).map_err(|e| {
            PassiveReconError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PASSIVERECON_{SECTION}_{FIELD}`
    /// 예: `PASSIVERECON_INGEST_SENSOR=edge-01`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PASSIVERECON_GENERAL_LOG_LEVEL");
        override_string(
            &mut self.general.log_format,
            "PASSIVERECON_GENERAL_LOG_FORMAT",
        );

        // Ingest
        override_opt_string(&mut self.ingest.sensor, "PASSIVERECON_INGEST_SENSOR");
        override_opt_string(
            &mut self.ingest.ignore_spec,
            "PASSIVERECON_INGEST_IGNORE_SPEC",
        );
        override_usize(
            &mut self.ingest.recon_prefix_len,
            "PASSIVERECON_INGEST_RECON_PREFIX_LEN",
        );
        override_usize(
            &mut self.ingest.max_value_len,
            "PASSIVERECON_INGEST_MAX_VALUE_LEN",
        );
        override_string(
            &mut self.ingest.input_format,
            "PASSIVERECON_INGEST_INPUT_FORMAT",
        );

        // Store
        override_string(&mut self.store.path, "PASSIVERECON_STORE_PATH");
        override_write_mode(&mut self.store.write_mode, "PASSIVERECON_STORE_WRITE_MODE");
        override_usize(
            &mut self.store.bulk_batch_size,
            "PASSIVERECON_STORE_BULK_BATCH_SIZE",
        );
        override_usize(
            &mut self.store.local_bulk_max_entries,
            "PASSIVERECON_STORE_LOCAL_BULK_MAX_ENTRIES",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PassiveReconError> {
        const MAX_BATCH_SIZE: usize = 100_000;
        const MAX_LOCAL_BULK_ENTRIES: usize = 10_000_000;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let valid_inputs = ["auto", "zeek", "json"];
        if !valid_inputs.contains(&self.ingest.input_format.as_str()) {
            return Err(invalid(
                "ingest.input_format",
                format!("must be one of: {}", valid_inputs.join(", ")),
            ));
        }

        if self.ingest.max_value_len == 0 {
            return Err(invalid("ingest.max_value_len", "must be greater than 0"));
        }

        if self.store.path.is_empty() {
            return Err(invalid("store.path", "must not be empty"));
        }

        if self.store.bulk_batch_size == 0 || self.store.bulk_batch_size > MAX_BATCH_SIZE {
            return Err(invalid(
                "store.bulk_batch_size",
                format!("must be 1-{MAX_BATCH_SIZE}"),
            ));
        }

        if self.store.local_bulk_max_entries == 0
            || self.store.local_bulk_max_entries > MAX_LOCAL_BULK_ENTRIES
        {
            return Err(invalid(
                "store.local_bulk_max_entries",
                format!("must be 1-{MAX_LOCAL_BULK_ENTRIES}"),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> PassiveReconError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 입력 및 필터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 모든 레코드에 붙일 센서 이름
    pub sensor: Option<String>,
    /// ignore 규칙 파일 경로 (YAML)
    pub ignore_spec: Option<String>,
    /// recon_type에서 제거할 네임스페이스 접두어 길이 (`PassiveRecon::` = 14)
    pub recon_prefix_len: usize,
    /// 이 길이를 넘는 value는 해시로 대체하여 저장
    pub max_value_len: usize,
    /// 입력 형식 (auto, zeek, json)
    pub input_format: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sensor: None,
            ignore_spec: None,
            recon_prefix_len: 14,
            max_value_len: 1000,
            input_format: "auto".to_owned(),
        }
    }
}

/// 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite 데이터베이스 경로 (`:memory:` 허용)
    pub path: String,
    /// 기본 쓰기 전략 (CLI 플래그가 우선)
    pub write_mode: WriteMode,
    /// bulk 전략에서 한 트랜잭션에 담을 레코드 수
    pub bulk_batch_size: usize,
    /// local-bulk 버퍼가 flush 전까지 담을 최대 dedup 키 수
    pub local_bulk_max_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "/var/lib/passiverecon/passive.db".to_owned(),
            write_mode: WriteMode::Bulk,
            bulk_batch_size: 500,
            local_bulk_max_entries: 10_000,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_opt_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = if val.is_empty() { None } else { Some(val) };
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_write_mode(target: &mut WriteMode, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match WriteMode::from_name(&val) {
            Some(mode) => *target = mode,
            None => warn!(
                env_key,
                value = val.as_str(),
                "unknown write mode in env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        PassiveReconConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let config = PassiveReconConfig::parse(
            r#"
[ingest]
sensor = "edge-01"

[store]
write_mode = "local-bulk"
"#,
        )
        .unwrap();
        assert_eq!(config.ingest.sensor.as_deref(), Some("edge-01"));
        assert_eq!(config.ingest.recon_prefix_len, 14);
        assert_eq!(config.store.write_mode, WriteMode::LocalBulk);
        assert_eq!(config.store.bulk_batch_size, 500);
    }

    #[test]
    fn parse_invalid_toml_fails() {
        let err = PassiveReconConfig::parse("[general\nlog_level = 1").unwrap_err();
        assert!(matches!(
            err,
            PassiveReconError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = PassiveReconConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_format"));
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = PassiveReconConfig::default();
        config.store.bulk_batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("store.bulk_batch_size"));
    }

    #[test]
    fn validate_rejects_unknown_input_format() {
        let mut config = PassiveReconConfig::default();
        config.ingest.input_format = "pcap".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn write_mode_names() {
        assert_eq!(WriteMode::from_name("bulk"), Some(WriteMode::Bulk));
        assert_eq!(WriteMode::from_name("local-bulk"), Some(WriteMode::LocalBulk));
        assert_eq!(WriteMode::from_name("no-bulk"), Some(WriteMode::Single));
        assert_eq!(WriteMode::from_name("fast"), None);
        assert_eq!(WriteMode::LocalBulk.to_string(), "local-bulk");
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        // SAFETY: serial 테스트에서만 환경변수를 변경합니다.
        unsafe {
            std::env::set_var("PASSIVERECON_INGEST_SENSOR", "env-sensor");
            std::env::set_var("PASSIVERECON_STORE_WRITE_MODE", "single");
            std::env::set_var("PASSIVERECON_STORE_BULK_BATCH_SIZE", "not-a-number");
        }

        let mut config = PassiveReconConfig::default();
        config.apply_env_overrides();

        unsafe {
            std::env::remove_var("PASSIVERECON_INGEST_SENSOR");
            std::env::remove_var("PASSIVERECON_STORE_WRITE_MODE");
            std::env::remove_var("PASSIVERECON_STORE_BULK_BATCH_SIZE");
        }

        assert_eq!(config.ingest.sensor.as_deref(), Some("env-sensor"));
        assert_eq!(config.store.write_mode, WriteMode::Single);
        // 파싱 실패한 값은 무시되고 기본값 유지
        assert_eq!(config.store.bulk_batch_size, 500);
    }

    #[test]
    #[serial]
    fn empty_env_value_clears_optional_field() {
        unsafe {
            std::env::set_var("PASSIVERECON_INGEST_IGNORE_SPEC", "");
        }
        let mut config = PassiveReconConfig::default();
        config.ingest.ignore_spec = Some("/etc/passiverecon/ignore.yml".to_owned());
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("PASSIVERECON_INGEST_IGNORE_SPEC");
        }
        assert_eq!(config.ingest.ignore_spec, None);
    }

    #[tokio::test]
    async fn load_missing_file_is_file_not_found() {
        let err = PassiveReconConfig::load("/nonexistent/passiverecon.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PassiveReconError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
