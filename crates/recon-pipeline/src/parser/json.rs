//! JSON lines 토크나이저
//!
//! 한 줄에 JSON 객체 하나. Zeek의 `LogAscii::use_json=T` 출력 형식입니다.
//! 중첩 객체는 JSON 문자열로 보관합니다.

use passiverecon_core::error::RecordError;
use passiverecon_core::types::{FieldMap, FieldValue, RawRecord};

/// JSON 한 줄을 레코드로 변환합니다.
///
/// # Errors
/// JSON 구문 오류이거나 최상위 값이 객체가 아닌 경우
pub fn parse_json_line(line: &str, line_no: u64) -> Result<RawRecord, RecordError> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| RecordError::Tokenize {
            line: line_no,
            reason: format!("JSON parse error: {e}"),
        })?;

    let serde_json::Value::Object(object) = value else {
        return Err(RecordError::Tokenize {
            line: line_no,
            reason: "expected a JSON object".to_owned(),
        });
    };

    let fields: FieldMap = object
        .into_iter()
        .map(|(name, value)| (name, convert(value)))
        .collect();
    Ok(RawRecord::from(fields))
}

fn convert(value: serde_json::Value) -> FieldValue {
    use serde_json::Value;

    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Int(i),
            None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => FieldValue::Str(s),
        Value::Array(items) => FieldValue::List(items.into_iter().map(convert).collect()),
        object @ Value::Object(_) => FieldValue::Str(object.to_string()),
    }
}
