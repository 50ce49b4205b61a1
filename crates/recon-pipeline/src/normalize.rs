//! 레코드 정규화 -- `ts`를 `timestamp`로 승격하고 recon 타입 접두어를 제거합니다.
//!
//! 나머지 필드는 복사 없이 [`NormalizedRecord::fields`]로 이동합니다.

use chrono::{DateTime, Utc};

use passiverecon_core::error::RecordError;
use passiverecon_core::types::{FieldValue, NormalizedRecord, RawRecord};

/// Zeek passiverecon 스크립트가 붙이는 네임스페이스 접두어 길이 (`"PassiveRecon::"`)
pub const DEFAULT_RECON_PREFIX_LEN: usize = 14;

/// 레코드 정규화기
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// 제거할 recon 타입 접두어 길이 (문자 단위)
    prefix_len: usize,
    /// 정규화된 레코드에 붙일 센서 이름
    sensor: Option<String>,
}

impl Normalizer {
    /// 접두어 길이를 지정하여 정규화기를 생성합니다.
    pub fn new(prefix_len: usize) -> Self {
        Self {
            prefix_len,
            sensor: None,
        }
    }

    /// 센서 이름을 설정합니다. 빈 문자열은 센서 없음으로 취급합니다.
    pub fn with_sensor(mut self, sensor: Option<&str>) -> Self {
        self.sensor = sensor.filter(|s| !s.is_empty()).map(str::to_owned);
        self
    }

    /// 설정된 접두어 길이
    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// 원시 레코드를 정규화합니다.
    ///
    /// # Errors
    /// - `ts`가 없거나 시각으로 해석할 수 없는 경우
    /// - `recon_type`이 없거나 문자열이 아니거나 접두어보다 짧은 경우
    pub fn normalize(&self, raw: RawRecord) -> Result<NormalizedRecord, RecordError> {
        let mut fields = raw.fields;

        let ts = fields.remove("ts").filter(|v| !v.is_null()).ok_or_else(|| {
            RecordError::MissingField {
                field: "ts".to_owned(),
            }
        })?;
        let timestamp = parse_timestamp(&ts)?;

        let recon_type = match fields.remove("recon_type") {
            Some(FieldValue::Str(s)) => s,
            Some(FieldValue::Null) | None => {
                return Err(RecordError::MissingField {
                    field: "recon_type".to_owned(),
                });
            }
            Some(other) => {
                return Err(RecordError::InvalidField {
                    field: "recon_type".to_owned(),
                    reason: format!("expected string, got {other:?}"),
                });
            }
        };
        let recon_type = strip_prefix_chars(&recon_type, self.prefix_len).ok_or_else(|| {
            RecordError::ReconTypeTooShort {
                recon_type: recon_type.clone(),
                prefix_len: self.prefix_len,
            }
        })?;

        Ok(NormalizedRecord {
            timestamp,
            recon_type: recon_type.to_owned(),
            sensor: self.sensor.clone(),
            fields,
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_RECON_PREFIX_LEN)
    }
}

/// 앞의 `n`개 문자를 제거합니다. 문자열이 `n`보다 짧으면 `None`입니다.
fn strip_prefix_chars(s: &str, n: usize) -> Option<&str> {
    if n == 0 {
        return Some(s);
    }
    let mut indices = s.char_indices().map(|(i, _)| i).chain(std::iter::once(s.len()));
    indices.nth(n).map(|i| &s[i..])
}

/// `ts` 필드 값을 UTC 시각으로 변환합니다.
///
/// epoch 초(실수/정수), 숫자 문자열, RFC 3339 문자열을 허용합니다.
fn parse_timestamp(value: &FieldValue) -> Result<DateTime<Utc>, RecordError> {
    let invalid = |reason: String| RecordError::InvalidField {
        field: "ts".to_owned(),
        reason,
    };

    match value {
        FieldValue::Float(f) => from_epoch_secs(*f).ok_or_else(|| invalid(format!("out of range: {f}"))),
        FieldValue::Int(i) => DateTime::from_timestamp(*i, 0)
            .ok_or_else(|| invalid(format!("out of range: {i}"))),
        FieldValue::Str(s) => {
            let s = s.trim();
            if let Ok(secs) = s.parse::<f64>() {
                return from_epoch_secs(secs).ok_or_else(|| invalid(format!("out of range: {s}")));
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| invalid(format!("'{s}': {e}")))
        }
        other => Err(invalid(format!("unsupported timestamp value: {other:?}"))),
    }
}

fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1_000_000.0).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}
