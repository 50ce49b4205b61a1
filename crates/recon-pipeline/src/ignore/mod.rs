//! ignore 규칙 -- 센서별 네트워크 제외 규칙
//!
//! 실행 시작 시 한 번 로드되고 이후에는 변경되지 않으며, `Arc`로
//! 읽기 전용 공유됩니다.
//!
//! # 판정 순서
//! 1. `neverignore[sensor]`에 속하면 유지 (항상 우선)
//! 2. `ignorenets[sensor]`에 속하면 드롭
//! 3. 그 외에는 유지
//!
//! 센서가 없거나 테이블에 등록되지 않은 센서는 어느 테이블에도 매칭되지 않습니다.
//!
//! # 아키텍처
//! - [`IgnoreRuleSet`]: 두 테이블의 묶음과 판정 로직
//! - [`loader`]: YAML 파일 로딩 및 항목 검증
//! - [`types`]: 규칙 파일 구조와 [`NetworkMatcher`]

pub mod loader;
pub mod types;

pub use loader::IgnoreSpecLoader;
pub use types::{IgnoreSpecFile, NetworkMatcher};

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use crate::error::ReconPipelineError;

/// 센서 이름 -> 네트워크 매처 목록
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    by_sensor: HashMap<String, Vec<NetworkMatcher>>,
}

impl RuleTable {
    /// 빈 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 센서별 매처 맵으로 테이블을 생성합니다.
    pub fn from_map(by_sensor: HashMap<String, Vec<NetworkMatcher>>) -> Self {
        Self { by_sensor }
    }

    /// 센서에 매처를 추가합니다.
    pub fn insert(&mut self, sensor: impl Into<String>, matcher: NetworkMatcher) {
        self.by_sensor.entry(sensor.into()).or_default().push(matcher);
    }

    /// `sensor`에 등록된 매처 중 `addr`를 포함하는 것이 있는지 확인합니다.
    pub fn matches(&self, sensor: &str, addr: IpAddr) -> bool {
        self.by_sensor
            .get(sensor)
            .is_some_and(|matchers| matchers.iter().any(|m| m.contains(addr)))
    }

    /// 등록된 센서 수
    pub fn sensor_count(&self) -> usize {
        self.by_sensor.len()
    }

    /// 전체 매처 수
    pub fn matcher_count(&self) -> usize {
        self.by_sensor.values().map(Vec::len).sum()
    }

    /// 매처가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.matcher_count() == 0
    }
}

/// 실행 전체에서 공유되는 ignore 규칙 집합
#[derive(Debug, Clone, Default)]
pub struct IgnoreRuleSet {
    ignore_nets: RuleTable,
    never_ignore: RuleTable,
}

impl IgnoreRuleSet {
    /// 두 테이블로 규칙 집합을 생성합니다.
    pub fn new(ignore_nets: RuleTable, never_ignore: RuleTable) -> Self {
        Self {
            ignore_nets,
            never_ignore,
        }
    }

    /// 빈 규칙 집합 (모든 레코드 유지)
    pub fn empty() -> Self {
        Self::default()
    }

    /// 규칙 파일을 로드합니다. 경로가 없으면 빈 규칙 집합입니다.
    ///
    /// # Errors
    /// 파일을 읽을 수 없거나 형식이 잘못된 경우
    pub async fn load(source: Option<&Path>) -> Result<Self, ReconPipelineError> {
        match source {
            Some(path) => IgnoreSpecLoader::load_file(path).await,
            None => {
                tracing::debug!("no ignore spec configured, keeping all records");
                Ok(Self::empty())
            }
        }
    }

    /// `IGNORENETS` 테이블
    pub fn ignore_nets(&self) -> &RuleTable {
        &self.ignore_nets
    }

    /// `NEVERIGNORE` 테이블
    pub fn never_ignore(&self) -> &RuleTable {
        &self.never_ignore
    }

    /// 두 테이블이 모두 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.ignore_nets.is_empty() && self.never_ignore.is_empty()
    }

    /// 주체 주소가 `addr`인 레코드를 드롭해야 하는지 판정합니다.
    pub fn is_ignored(&self, sensor: Option<&str>, addr: IpAddr) -> bool {
        let Some(sensor) = sensor.filter(|s| !s.is_empty()) else {
            return false;
        };
        if self.never_ignore.matches(sensor, addr) {
            return false;
        }
        self.ignore_nets.matches(sensor, addr)
    }
}
