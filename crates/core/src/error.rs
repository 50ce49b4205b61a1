//! 에러 타입 — 도메인별 에러 정의
//!
//! 전파 범위에 따라 세 가지로 나뉩니다.
//! - [`ConfigError`]: 레코드 처리 전에 발생, 프로세스 종료
//! - [`RecordError`]: 레코드 하나에 국한, 해당 레코드만 건너뜀
//! - [`StorageError`]: 저장 실패, 쓰기 전략에 따라 중단 여부 결정

/// passiverecon 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum PassiveReconError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 레코드 형식 에러
    #[error("malformed record: {0}")]
    Record(#[from] RecordError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러 (설정 파일, ignore 규칙 파일)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// ignore 규칙 파일 로딩 실패
    #[error("ignore spec error: {path}: {reason}")]
    IgnoreSpec { path: String, reason: String },
}

/// 레코드 단위 에러
///
/// 정규화 또는 필터링 단계에서 레코드 하나를 처리할 수 없을 때 발생합니다.
/// 스트림 처리는 계속됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// 필수 필드 누락
    #[error("missing field '{field}'")]
    MissingField { field: String },

    /// recon_type이 네임스페이스 접두어보다 짧음
    #[error("recon_type '{recon_type}' is shorter than the {prefix_len}-character prefix")]
    ReconTypeTooShort { recon_type: String, prefix_len: usize },

    /// 필드 값의 타입 또는 형식이 올바르지 않음
    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// 입력 스트림 토큰화 실패
    #[error("tokenize error at line {line}: {reason}")]
    Tokenize { line: u64, reason: String },
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 연결 또는 스키마 초기화 실패
    #[error("connection failed: {0}")]
    Connection(String),

    /// 레코드 커밋 실패
    #[error("write failed for {records} record(s): {reason}")]
    Write { records: usize, reason: String },

    /// 조회 실패
    #[error("query failed: {0}")]
    Query(String),
}
