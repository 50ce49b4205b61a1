//! ignore 필터 및 병합 키 생성
//!
//! 정규화된 레코드 하나를 받아 주체 주소를 결정하고, ignore 규칙으로
//! 유지/드롭을 판정한 뒤, 유지되는 레코드에 dedup 키와 저장용 정규 컬럼을
//! 부여합니다. 레코드 하나에서 최대 하나의 [`PersistableRecord`]가 나옵니다.
//!
//! # 필드 정책
//! - `value`가 `max_value_len` 바이트를 넘으면 `sha256:<hex>`로 대체하고 원본은
//!   `full_value`에 보관
//! - `DNS_*` 타입은 `value`, `targetval`을 소문자로 변환
//! - HTTP `AUTHORIZATION`/`PROXY-AUTHORIZATION` Digest 값은 고정 파라미터만 유지

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use passiverecon_core::error::RecordError;
use passiverecon_core::types::{DedupKey, FieldValue, NormalizedRecord, PersistableRecord};

use crate::ignore::IgnoreRuleSet;

/// 기본 최대 value 길이 (바이트)
pub const DEFAULT_MAX_VALUE_LEN: usize = 1000;

/// dedup 키 구성요소 구분자
const KEY_SEPARATOR: &str = "\x1f";

/// Digest 인증 값에서 유지하는 파라미터
const DIGEST_STABLE_PARAMS: &[&str] = &["username", "realm", "uri", "algorithm", "qop"];

/// ignore 필터
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    rules: Arc<IgnoreRuleSet>,
    max_value_len: usize,
}

impl IgnoreFilter {
    /// 규칙 집합으로 필터를 생성합니다.
    pub fn new(rules: Arc<IgnoreRuleSet>) -> Self {
        Self {
            rules,
            max_value_len: DEFAULT_MAX_VALUE_LEN,
        }
    }

    /// 최대 value 길이를 설정합니다.
    pub fn with_max_value_len(mut self, max_value_len: usize) -> Self {
        self.max_value_len = max_value_len;
        self
    }

    /// 공유 규칙 집합
    pub fn rules(&self) -> &Arc<IgnoreRuleSet> {
        &self.rules
    }

    /// 레코드를 필터링합니다.
    ///
    /// 드롭되면 `Ok(None)`, 유지되면 저장 가능한 레코드를 반환합니다.
    ///
    /// # Errors
    /// 주체 주소 필드가 IP 주소가 아니거나 포트가 정수가 아닌 경우
    pub fn process(
        &self,
        mut record: NormalizedRecord,
    ) -> Result<Option<PersistableRecord>, RecordError> {
        let subject = subject_field(&record);
        let addr = match subject {
            Some(name) => parse_addr(name, record.fields.remove(name))?,
            None => None,
        };

        if let Some(addr) = addr {
            if self.rules.is_ignored(record.sensor.as_deref(), addr) {
                tracing::trace!(
                    sensor = ?record.sensor,
                    %addr,
                    recon_type = %record.recon_type,
                    "record ignored"
                );
                return Ok(None);
            }
        }

        let port = match record.fields.remove("srvport") {
            Some(v) if !v.is_null() => parse_port("srvport", v)?,
            _ => match record.fields.remove("port") {
                Some(v) => parse_port("port", v)?,
                None => None,
            },
        };

        let source = take_rendered(&mut record, "source");
        let mut targetval = take_rendered(&mut record, "targetval");
        let mut value = take_rendered(&mut record, "value").unwrap_or_default();

        if record.recon_type.starts_with("DNS_") {
            value = value.to_lowercase();
            targetval = targetval.map(|t| t.to_lowercase());
        }

        if is_http_authorization(&record.recon_type, source.as_deref()) {
            if let Some(stripped) = strip_digest_params(&value) {
                value = stripped;
            }
        }

        let mut full_value = None;
        if value.len() > self.max_value_len {
            let hashed = format!("sha256:{}", hex::encode(Sha256::digest(value.as_bytes())));
            full_value = Some(std::mem::replace(&mut value, hashed));
        }

        let key = dedup_key(
            record.sensor.as_deref(),
            addr,
            targetval.as_deref(),
            &record.recon_type,
            port,
            source.as_deref(),
            &value,
        );

        Ok(Some(PersistableRecord {
            key,
            timestamp: record.timestamp,
            sensor: record.sensor,
            addr,
            targetval,
            recon_type: record.recon_type,
            port,
            source,
            value,
            full_value,
            fields: record.fields,
        }))
    }
}

/// 주체 주소 필드 이름을 결정합니다.
///
/// `host`가 있으면 `host`, 없으면 `*_HEADER_SERVER` 타입은 `dst`, 그 외는 `src`.
/// 해당 필드가 없으면 `None`이며 ignore 필터를 거치지 않습니다.
pub fn subject_field(record: &NormalizedRecord) -> Option<&'static str> {
    if record.field("host").is_some() {
        return Some("host");
    }
    let name = if record.recon_type.ends_with("_HEADER_SERVER") {
        "dst"
    } else {
        "src"
    };
    record.field(name).map(|_| name)
}

fn parse_addr(field: &str, value: Option<FieldValue>) -> Result<Option<IpAddr>, RecordError> {
    let invalid = |reason: String| RecordError::InvalidField {
        field: field.to_owned(),
        reason,
    };
    match value {
        None | Some(FieldValue::Null) => Ok(None),
        Some(FieldValue::Str(s)) => s
            .trim()
            .parse::<IpAddr>()
            .map(Some)
            .map_err(|e| invalid(format!("'{s}' is not an IP address: {e}"))),
        Some(FieldValue::Int(i)) => u32::try_from(i)
            .map(|n| Some(IpAddr::V4(Ipv4Addr::from(n))))
            .map_err(|_| invalid(format!("{i} is not an IPv4 integer"))),
        Some(other) => Err(invalid(format!("expected IP address, got {other:?}"))),
    }
}

fn parse_port(field: &str, value: FieldValue) -> Result<Option<u16>, RecordError> {
    let invalid = |reason: String| RecordError::InvalidField {
        field: field.to_owned(),
        reason,
    };
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Int(i) => u16::try_from(i)
            .map(Some)
            .map_err(|_| invalid(format!("{i} is out of port range"))),
        FieldValue::Str(s) => s
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|e| invalid(format!("'{s}': {e}"))),
        other => Err(invalid(format!("expected port number, got {other:?}"))),
    }
}

fn take_rendered(record: &mut NormalizedRecord, name: &str) -> Option<String> {
    record.fields.remove(name).and_then(|v| v.render())
}

fn is_http_authorization(recon_type: &str, source: Option<&str>) -> bool {
    recon_type.starts_with("HTTP_")
        && source.is_some_and(|s| {
            s.eq_ignore_ascii_case("AUTHORIZATION") || s.eq_ignore_ascii_case("PROXY-AUTHORIZATION")
        })
}

/// Digest 인증 값에서 요청마다 바뀌는 파라미터(nonce, response 등)를 제거합니다.
///
/// Digest 값이 아니면 `None`입니다.
fn strip_digest_params(value: &str) -> Option<String> {
    let (scheme, params) = value.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("digest") {
        return None;
    }

    let kept: Vec<&str> = split_params(params)
        .into_iter()
        .filter(|param| {
            param.split_once('=').is_some_and(|(name, _)| {
                let name = name.trim();
                DIGEST_STABLE_PARAMS
                    .iter()
                    .any(|stable| stable.eq_ignore_ascii_case(name))
            })
        })
        .collect();

    Some(format!("{scheme} {}", kept.join(", ")))
}

/// 따옴표 밖의 `,`로 파라미터를 나눕니다.
fn split_params(params: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in params.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                out.push(params[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(params[start..].trim());
    out.retain(|p| !p.is_empty());
    out
}

/// 정규 컬럼으로부터 dedup 키를 계산합니다.
///
/// 같은 입력에는 항상 같은 키가 나옵니다.
pub fn dedup_key(
    sensor: Option<&str>,
    addr: Option<IpAddr>,
    targetval: Option<&str>,
    recon_type: &str,
    port: Option<u16>,
    source: Option<&str>,
    value: &str,
) -> DedupKey {
    let addr = addr.map(|a| a.to_string()).unwrap_or_default();
    let port = port.map(|p| p.to_string()).unwrap_or_default();
    let components = [
        sensor.unwrap_or_default(),
        addr.as_str(),
        targetval.unwrap_or_default(),
        recon_type,
        port.as_str(),
        source.unwrap_or_default(),
        value,
    ];
    let digest = Sha256::digest(components.join(KEY_SEPARATOR).as_bytes());
    DedupKey::new(hex::encode(digest))
}
