#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`parser`]: Zeek ASCII / JSON lines 토크나이저와 형식 자동 감지
//! - [`normalize`]: `ts` 승격, recon 타입 접두어 제거
//! - [`ignore`]: 센서별 ignore 규칙 (YAML 로딩, CIDR/범위 매칭)
//! - [`filter`]: 유지/드롭 판정, 필드 정책, dedup 키
//! - [`enrich`]: 쓰기 직전 보강 필드 (`infos`)
//! - [`buffer`]: local-bulk 병합 버퍼
//! - [`writer`]: 쓰기 전략 선택과 배치 기록
//! - [`store`]: 저장소 트레이트와 SQLite/인메모리 백엔드
//! - [`pipeline`]: 전체 흐름 오케스트레이션
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! stdin -> RecordReader -> Normalizer -> IgnoreFilter -> BatchWriter -> PassiveStore
//!            |                 |              |              |
//!       Zeek/JSON         ts, prefix    IGNORENETS/     bulk / local-bulk
//!                                       NEVERIGNORE       / single
//! ```

pub mod buffer;
pub mod config;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod normalize;
pub mod pipeline;
pub mod writer;

pub mod ignore;
pub mod parser;
pub mod store;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{PipelineStats, ReconPipeline, ReconPipelineBuilder, RecordStream, RunSummary};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::ReconPipelineError;

// 입력
pub use parser::{InputFormat, RecordReader};

// 정규화/필터
pub use filter::IgnoreFilter;
pub use ignore::{IgnoreRuleSet, IgnoreSpecLoader, NetworkMatcher, RuleTable};
pub use normalize::Normalizer;

// 기록
pub use buffer::LocalBulkBuffer;
pub use enrich::{Enricher, NoInfos, ReconInfos};
pub use store::{MemoryStore, PassiveStore, SqliteStore};
pub use writer::{BatchWriter, WriteModeFlags, WriteReport, select};
