//! 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`PassiveReconConfig`]에서 `[ingest]`, `[store]`
//! 섹션을 가져와 파이프라인이 직접 쓰는 타입으로 변환한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use passiverecon_core::config::PassiveReconConfig;
//! use passiverecon_pipeline::config::PipelineConfig;
//!
//! let core_config = PassiveReconConfig::default();
//! let config = PipelineConfig::from_core(&core_config)?;
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use passiverecon_core::config::{PassiveReconConfig, WriteMode};

use crate::error::ReconPipelineError;
use crate::filter::DEFAULT_MAX_VALUE_LEN;
use crate::normalize::DEFAULT_RECON_PREFIX_LEN;
use crate::parser::InputFormat;
use crate::writer::{DEFAULT_BULK_BATCH_SIZE, DEFAULT_LOCAL_BULK_MAX_ENTRIES};

/// 파이프라인 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 센서 이름 (없으면 ignore 규칙이 적용되지 않음)
    pub sensor: Option<String>,
    /// ignore 규칙 파일 경로
    pub ignore_spec: Option<PathBuf>,
    /// recon_type 접두어 길이
    pub recon_prefix_len: usize,
    /// 해시로 대체하기 전 최대 value 길이
    pub max_value_len: usize,
    /// 입력 형식
    #[serde(with = "input_format_serde")]
    pub input_format: InputFormat,
    /// 쓰기 전략
    pub write_mode: WriteMode,
    /// bulk 묶음 크기
    pub bulk_batch_size: usize,
    /// local-bulk 버퍼 고유 키 수
    pub local_bulk_max_entries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sensor: None,
            ignore_spec: None,
            recon_prefix_len: DEFAULT_RECON_PREFIX_LEN,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
            input_format: InputFormat::Auto,
            write_mode: WriteMode::Bulk,
            bulk_batch_size: DEFAULT_BULK_BATCH_SIZE,
            local_bulk_max_entries: DEFAULT_LOCAL_BULK_MAX_ENTRIES,
        }
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// # Errors
    /// `input_format`을 해석할 수 없는 경우
    pub fn from_core(core: &PassiveReconConfig) -> Result<Self, ReconPipelineError> {
        let input_format = core
            .ingest
            .input_format
            .parse::<InputFormat>()
            .map_err(|reason| ReconPipelineError::Config {
                field: "ingest.input_format".to_owned(),
                reason,
            })?;

        Ok(Self {
            sensor: core.ingest.sensor.clone().filter(|s| !s.is_empty()),
            ignore_spec: core.ingest.ignore_spec.as_ref().map(PathBuf::from),
            recon_prefix_len: core.ingest.recon_prefix_len,
            max_value_len: core.ingest.max_value_len,
            input_format,
            write_mode: core.store.write_mode,
            bulk_batch_size: core.store.bulk_batch_size,
            local_bulk_max_entries: core.store.local_bulk_max_entries,
        })
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ReconPipelineError> {
        const MAX_BULK_BATCH_SIZE: usize = 100_000;
        const MAX_LOCAL_BULK_ENTRIES: usize = 10_000_000;

        if self.bulk_batch_size == 0 || self.bulk_batch_size > MAX_BULK_BATCH_SIZE {
            return Err(ReconPipelineError::Config {
                field: "bulk_batch_size".to_owned(),
                reason: format!("must be 1-{MAX_BULK_BATCH_SIZE}"),
            });
        }

        if self.local_bulk_max_entries == 0 || self.local_bulk_max_entries > MAX_LOCAL_BULK_ENTRIES
        {
            return Err(ReconPipelineError::Config {
                field: "local_bulk_max_entries".to_owned(),
                reason: format!("must be 1-{MAX_LOCAL_BULK_ENTRIES}"),
            });
        }

        if self.max_value_len == 0 {
            return Err(ReconPipelineError::Config {
                field: "max_value_len".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self
            .ignore_spec
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ReconPipelineError::Config {
                field: "ignore_spec".to_owned(),
                reason: "path must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}

mod input_format_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::parser::InputFormat;

    pub fn serialize<S: Serializer>(format: &InputFormat, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(format.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<InputFormat, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// [`PipelineConfig`] 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 기본값으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sensor(mut self, sensor: impl Into<String>) -> Self {
        let sensor = sensor.into();
        self.config.sensor = if sensor.is_empty() { None } else { Some(sensor) };
        self
    }

    pub fn ignore_spec(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ignore_spec = Some(path.into());
        self
    }

    pub fn recon_prefix_len(mut self, len: usize) -> Self {
        self.config.recon_prefix_len = len;
        self
    }

    pub fn max_value_len(mut self, len: usize) -> Self {
        self.config.max_value_len = len;
        self
    }

    pub fn input_format(mut self, format: InputFormat) -> Self {
        self.config.input_format = format;
        self
    }

    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.config.write_mode = mode;
        self
    }

    pub fn bulk_batch_size(mut self, size: usize) -> Self {
        self.config.bulk_batch_size = size;
        self
    }

    pub fn local_bulk_max_entries(mut self, entries: usize) -> Self {
        self.config.local_bulk_max_entries = entries;
        self
    }

    /// 설정을 검증하고 반환합니다.
    pub fn build(self) -> Result<PipelineConfig, ReconPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
