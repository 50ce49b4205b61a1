//! ignore 규칙 데이터 타입
//!
//! YAML 규칙 파일에서 역직렬화되는 구조체와 네트워크 매처를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

/// ignore 규칙 파일 -- 하나의 YAML 파일에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// ignorenets:
///   sensor-a:
///     - 10.0.0.0/8
///     - 192.0.2.10-192.0.2.20
/// neverignore:
///   sensor-a:
///     - 10.1.0.0/16
/// ```
///
/// 테이블 이름은 대문자(`IGNORENETS`, `NEVERIGNORE`)도 허용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IgnoreSpecFile {
    /// 센서별 무시할 네트워크
    #[serde(default, alias = "IGNORENETS")]
    pub ignorenets: BTreeMap<String, Vec<String>>,
    /// 센서별 절대 무시하지 않을 네트워크 (ignorenets보다 우선)
    #[serde(default, alias = "NEVERIGNORE")]
    pub neverignore: BTreeMap<String, Vec<String>>,
}

/// IP 주소 소속을 검사하는 매처
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMatcher {
    /// CIDR 블록 (접두어 없는 단일 주소는 /32, /128)
    Cidr(IpNetwork),
    /// 양 끝을 포함하는 주소 범위 (같은 주소 체계)
    Range {
        /// 시작 주소
        start: IpAddr,
        /// 끝 주소
        end: IpAddr,
    },
}

impl NetworkMatcher {
    /// 주소가 이 매처에 속하는지 확인합니다.
    ///
    /// 주소 체계(IPv4/IPv6)가 다르면 항상 `false`입니다.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match self {
            Self::Cidr(net) => net.contains(addr),
            Self::Range { start, end } => {
                start.is_ipv4() == addr.is_ipv4() && *start <= addr && addr <= *end
            }
        }
    }
}

impl FromStr for NetworkMatcher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty network entry".to_owned());
        }

        if let Some((start, end)) = s.split_once('-') {
            let start: IpAddr = start
                .trim()
                .parse()
                .map_err(|e| format!("invalid range start: {e}"))?;
            let end: IpAddr = end
                .trim()
                .parse()
                .map_err(|e| format!("invalid range end: {e}"))?;
            if start.is_ipv4() != end.is_ipv4() {
                return Err("range mixes IPv4 and IPv6 addresses".to_owned());
            }
            if start > end {
                return Err(format!("range start {start} is after end {end}"));
            }
            return Ok(Self::Range { start, end });
        }

        s.parse::<IpNetwork>()
            .map(Self::Cidr)
            .map_err(|e| format!("invalid network: {e}"))
    }
}

impl fmt::Display for NetworkMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cidr(net) => write!(f, "{net}"),
            Self::Range { start, end } => write!(f, "{start}-{end}"),
        }
    }
}
