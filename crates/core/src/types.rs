//! 도메인 타입 — 레코드가 파이프라인을 통과하며 거치는 단계별 데이터 구조
//!
//! ```text
//! RawRecord -> NormalizedRecord -> PersistableRecord -> Observation
//!  (토크나이저)     (정규화)            (필터/dedup 키)      (저장소 병합 단위)
//! ```
//!
//! `RawRecord`, `NormalizedRecord`, `PersistableRecord`는 레코드 하나를 처리하는
//! 동안에만 존재합니다. 필드 맵은 단계 사이에서 복사되지 않고 이동합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 필드 이름 -> 값 매핑
///
/// 키 순서가 결정적이어야 dedup 키와 저장 형식이 재현 가능하므로 `BTreeMap`을 사용합니다.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// 토크나이저가 전달하는 타입이 있는 필드 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 설정되지 않은 값 (Zeek `-`, JSON `null`)
    Null,
    /// 불리언
    Bool(bool),
    /// 정수 (count, int, port)
    Int(i64),
    /// 실수 (time, interval, double)
    Float(f64),
    /// 문자열 (addr, string, enum 등)
    Str(String),
    /// 목록 (set, vector)
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// 값이 `Null`인지 확인합니다.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 문자열 값이면 참조를 반환합니다.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 정수 값이면 반환합니다.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// 값을 문자열로 렌더링합니다. `Null`은 `None`입니다.
    ///
    /// 목록은 `,`로 이어 붙입니다.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::List(items) => Some(
                items
                    .iter()
                    .filter_map(Self::render)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        Self::List(items)
    }
}

/// 토크나이저가 생성한 원시 레코드
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// 필드 맵 (토크나이저가 전달한 그대로)
    pub fields: FieldMap,
}

impl RawRecord {
    /// 빈 레코드를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 필드를 추가한 레코드를 반환합니다.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// 필드 값을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// 필드 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 필드가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<FieldMap> for RawRecord {
    fn from(fields: FieldMap) -> Self {
        Self { fields }
    }
}

/// 정규화된 레코드
///
/// `ts`는 `timestamp`로, `recon_type`은 네임스페이스 접두어가 제거된 형태로
/// 승격되고 나머지 필드는 `fields`에 그대로 남습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// 관측 시각 (원본 `ts`)
    pub timestamp: DateTime<Utc>,
    /// 접두어가 제거된 recon 타입 (예: `SSL_SERVER`)
    pub recon_type: String,
    /// 센서 이름 (설정되지 않을 수 있음)
    pub sensor: Option<String>,
    /// 나머지 필드
    pub fields: FieldMap,
}

impl NormalizedRecord {
    /// 센서 이름을 설정합니다. 빈 문자열은 `None`으로 취급합니다.
    pub fn with_sensor(mut self, sensor: Option<&str>) -> Self {
        self.sensor = sensor.filter(|s| !s.is_empty()).map(str::to_owned);
        self
    }

    /// 필드 값을 조회합니다. `Null` 값은 없는 것으로 취급합니다.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).filter(|v| !v.is_null())
    }
}

/// 저장소가 삽입/병합을 결정하는 dedup 키
///
/// 같은 `NormalizedRecord`에서는 항상 같은 키가 만들어집니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    /// 미리 계산된 키 문자열로 생성합니다.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// 키 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 필터를 통과하여 저장 가능한 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct PersistableRecord {
    /// dedup 키
    pub key: DedupKey,
    /// 관측 시각
    pub timestamp: DateTime<Utc>,
    /// 센서 이름
    pub sensor: Option<String>,
    /// 주체 주소 (없으면 `targetval`로 식별)
    pub addr: Option<IpAddr>,
    /// 주소가 없는 레코드의 식별 값 (예: DNS 응답 대상)
    pub targetval: Option<String>,
    /// recon 타입
    pub recon_type: String,
    /// 서비스 포트
    pub port: Option<u16>,
    /// 관측 출처 (헤더 이름, 인증서 종류 등)
    pub source: Option<String>,
    /// 저장용 값 (길면 해시로 대체됨)
    pub value: String,
    /// 해시로 대체된 경우 원본 값
    pub full_value: Option<String>,
    /// 나머지 통과 필드
    pub fields: FieldMap,
}

/// 저장소에 기록되는 논리 레코드
///
/// 같은 dedup 키의 관측은 [`Observation::merge`]로 하나로 합쳐집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub key: DedupKey,
    pub sensor: Option<String>,
    pub addr: Option<IpAddr>,
    pub targetval: Option<String>,
    pub recon_type: String,
    pub port: Option<u16>,
    pub source: Option<String>,
    pub value: String,
    pub full_value: Option<String>,
    /// 보강(enrichment) 결과
    pub infos: FieldMap,
    /// 최초 관측 시각
    pub first_seen: DateTime<Utc>,
    /// 마지막 관측 시각
    pub last_seen: DateTime<Utc>,
    /// 관측 횟수
    pub count: u64,
}

impl Observation {
    /// 단일 레코드로부터 관측 횟수 1의 `Observation`을 생성합니다.
    pub fn from_record(record: PersistableRecord, infos: FieldMap) -> Self {
        Self {
            key: record.key,
            sensor: record.sensor,
            addr: record.addr,
            targetval: record.targetval,
            recon_type: record.recon_type,
            port: record.port,
            source: record.source,
            value: record.value,
            full_value: record.full_value,
            infos,
            first_seen: record.timestamp,
            last_seen: record.timestamp,
            count: 1,
        }
    }

    /// 같은 키의 관측을 병합합니다.
    ///
    /// 횟수는 더하고, 관측 구간은 넓히기만 합니다. 기존 `infos`가 비어 있을 때만
    /// 새 값으로 채웁니다.
    pub fn merge(&mut self, other: &Observation) {
        debug_assert_eq!(self.key, other.key);
        self.count = self.count.saturating_add(other.count);
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);
        if self.infos.is_empty() && !other.infos.is_empty() {
            self.infos = other.infos.clone();
        }
    }
}
