//! 파이프라인 에러 타입
//!
//! [`ReconPipelineError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<ReconPipelineError> for PassiveReconError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use passiverecon_core::error::{ConfigError, PassiveReconError, RecordError, StorageError};

/// 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ReconPipelineError {
    /// ignore 규칙 파일 로딩 실패
    #[error("ignore spec load error: {path}: {reason}")]
    IgnoreSpec {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// ignore 규칙 항목 검증 실패
    #[error("ignore rule error: {table}[{sensor}] '{entry}': {reason}")]
    IgnoreRule {
        /// 테이블 이름 (ignorenets, neverignore)
        table: String,
        /// 센서 이름
        sensor: String,
        /// 문제가 된 항목
        entry: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 레코드 하나를 처리할 수 없음 (스트림은 계속)
    #[error("malformed record: {0}")]
    Record(#[from] RecordError),

    /// 저장소 에러
    #[error("storage error: {0}")]
    Store(#[from] StorageError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 입력 스트림 I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReconPipelineError {
    /// 레코드 하나에 국한된 에러인지 확인합니다.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::Record(_))
    }
}

impl From<ReconPipelineError> for PassiveReconError {
    fn from(err: ReconPipelineError) -> Self {
        match err {
            ReconPipelineError::IgnoreSpec { path, reason } => {
                PassiveReconError::Config(ConfigError::IgnoreSpec { path, reason })
            }
            e @ ReconPipelineError::IgnoreRule { .. } => {
                PassiveReconError::Config(ConfigError::IgnoreSpec {
                    path: "(ignore spec)".to_owned(),
                    reason: e.to_string(),
                })
            }
            ReconPipelineError::Config { field, reason } => {
                PassiveReconError::Config(ConfigError::InvalidValue { field, reason })
            }
            ReconPipelineError::Record(e) => PassiveReconError::Record(e),
            ReconPipelineError::Store(e) => PassiveReconError::Storage(e),
            ReconPipelineError::Io(e) => PassiveReconError::Io(e),
        }
    }
}
