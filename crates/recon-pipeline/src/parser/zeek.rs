//! Zeek ASCII 로그 토크나이저
//!
//! `#separator`, `#set_separator`, `#empty_field`, `#unset_field`, `#fields`,
//! `#types` 헤더를 해석하고 데이터 줄을 타입에 맞는 [`FieldValue`]로 변환합니다.
//! 스트림 중간에 새 헤더 블록이 나타나면(로테이션된 로그를 이어 붙인 경우)
//! 새 헤더를 따릅니다.
//!
//! # 입력 예시
//! ```text
//! #separator \x09
//! #set_separator	,
//! #empty_field	(empty)
//! #unset_field	-
//! #path	passiverecon
//! #fields	ts	uid	host	srvport	recon_type	source	value	targetval
//! #types	time	string	addr	port	enum	string	string	string
//! 1700000000.0	C1	10.0.0.5	443	PassiveRecon::SSL_SERVER	cert	MIIB...	-
//! ```

use passiverecon_core::error::RecordError;
use passiverecon_core::types::{FieldMap, FieldValue, RawRecord};

/// 현재 헤더 블록 상태
#[derive(Debug, Clone)]
struct ZeekHeader {
    separator: String,
    set_separator: String,
    empty_field: String,
    unset_field: String,
    fields: Vec<String>,
    types: Vec<String>,
}

impl Default for ZeekHeader {
    fn default() -> Self {
        Self {
            separator: "\t".to_owned(),
            set_separator: ",".to_owned(),
            empty_field: "(empty)".to_owned(),
            unset_field: "-".to_owned(),
            fields: Vec::new(),
            types: Vec::new(),
        }
    }
}

/// Zeek ASCII 로그 줄 단위 파서
#[derive(Debug, Clone, Default)]
pub struct ZeekParser {
    header: ZeekHeader,
}

impl ZeekParser {
    /// 기본 구분자로 파서를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 `#fields` 목록
    pub fn fields(&self) -> &[String] {
        &self.header.fields
    }

    /// 한 줄을 처리합니다.
    ///
    /// 헤더 줄이면 상태만 갱신하고 `Ok(None)`, 데이터 줄이면 레코드를 반환합니다.
    ///
    /// # Errors
    /// `#fields` 헤더 이전의 데이터 줄, 컬럼 수 불일치, 타입 변환 실패
    pub fn parse_line(&mut self, line: &str, line_no: u64) -> Result<Option<RawRecord>, RecordError> {
        if let Some(directive) = line.strip_prefix('#') {
            self.apply_directive(directive);
            return Ok(None);
        }

        if self.header.fields.is_empty() {
            return Err(RecordError::Tokenize {
                line: line_no,
                reason: "data line before #fields header".to_owned(),
            });
        }

        let columns: Vec<&str> = line.split(self.header.separator.as_str()).collect();
        if columns.len() != self.header.fields.len() {
            return Err(RecordError::Tokenize {
                line: line_no,
                reason: format!(
                    "expected {} columns, got {}",
                    self.header.fields.len(),
                    columns.len()
                ),
            });
        }

        let mut fields = FieldMap::new();
        for (idx, (name, column)) in self.header.fields.iter().zip(columns).enumerate() {
            let ty = self.header.types.get(idx).map_or("string", String::as_str);
            let value = self.convert(column, ty).map_err(|reason| RecordError::Tokenize {
                line: line_no,
                reason: format!("field '{name}': {reason}"),
            })?;
            fields.insert(name.clone(), value);
        }

        Ok(Some(RawRecord::from(fields)))
    }

    fn apply_directive(&mut self, directive: &str) {
        // `#separator`는 공백으로 구분되며 값이 이스케이프되어 있음
        if let Some(value) = directive.strip_prefix("separator ") {
            self.header = ZeekHeader {
                separator: unescape(value.trim()),
                ..ZeekHeader::default()
            };
            return;
        }

        let mut parts = directive.split(self.header.separator.as_str());
        let name = parts.next().unwrap_or_default();
        match name {
            "set_separator" => {
                if let Some(v) = parts.next() {
                    self.header.set_separator = unescape(v);
                }
            }
            "empty_field" => {
                if let Some(v) = parts.next() {
                    self.header.empty_field = unescape(v);
                }
            }
            "unset_field" => {
                if let Some(v) = parts.next() {
                    self.header.unset_field = unescape(v);
                }
            }
            "fields" => {
                self.header.fields = parts.map(str::to_owned).collect();
                self.header.types.clear();
            }
            "types" => {
                self.header.types = parts.map(str::to_owned).collect();
            }
            _ => {}
        }
    }

    fn convert(&self, column: &str, ty: &str) -> Result<FieldValue, String> {
        if column == self.header.unset_field {
            return Ok(FieldValue::Null);
        }

        if let Some(inner) = container_inner(ty) {
            if column == self.header.empty_field {
                return Ok(FieldValue::List(Vec::new()));
            }
            return column
                .split(self.header.set_separator.as_str())
                .map(|item| self.convert_scalar(item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::List);
        }

        if column == self.header.empty_field {
            return Ok(FieldValue::Str(String::new()));
        }
        self.convert_scalar(column, ty)
    }

    fn convert_scalar(&self, column: &str, ty: &str) -> Result<FieldValue, String> {
        if column == self.header.unset_field {
            return Ok(FieldValue::Null);
        }
        match ty {
            "time" | "interval" | "double" => column
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|e| format!("invalid {ty} '{column}': {e}")),
            "count" | "int" | "port" => column
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|e| format!("invalid {ty} '{column}': {e}")),
            "bool" => match column {
                "T" => Ok(FieldValue::Bool(true)),
                "F" => Ok(FieldValue::Bool(false)),
                _ => Err(format!("invalid bool '{column}'")),
            },
            _ => Ok(FieldValue::Str(unescape(column))),
        }
    }
}

/// `set[addr]` -> `addr`, `vector[string]` -> `string`
fn container_inner(ty: &str) -> Option<&str> {
    ["set[", "vector["]
        .iter()
        .find_map(|prefix| ty.strip_prefix(prefix))
        .and_then(|rest| rest.strip_suffix(']'))
}

/// `\xHH` 이스케이프를 바이트로 되돌립니다. 잘못된 UTF-8은 대체 문자로 바뀝니다.
pub fn unescape(s: &str) -> String {
    if !s.contains("\\x") {
        return s.to_owned();
    }

    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'x') {
            let hex = bytes.get(i + 2..i + 4).and_then(|h| std::str::from_utf8(h).ok());
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
