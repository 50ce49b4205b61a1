//! 입력 토크나이저 -- Zeek ASCII 로그와 JSON lines
//!
//! [`RecordReader`]는 `BufRead`에서 한 줄씩 읽어 [`RawRecord`]를 만드는
//! 지연(lazy) 이터레이터입니다. 소비자가 다음 레코드를 요청할 때만 읽으므로
//! 역압(backpressure)이 자동으로 걸립니다.
//!
//! # 형식 감지
//! `auto`이면 첫 번째 비어 있지 않은 줄로 판별합니다.
//! - `#`로 시작: Zeek ASCII ([`ZeekParser`])
//! - `{`로 시작: JSON lines ([`parse_json_line`])
//!
//! # 에러
//! - 줄 하나를 해석할 수 없으면 `Err(Record(Tokenize))`를 내고 다음 줄로 진행
//! - I/O 에러는 `Err(Io)`를 한 번 내고 스트림을 종료

pub mod json;
pub mod zeek;

pub use json::parse_json_line;
pub use zeek::ZeekParser;

use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use passiverecon_core::error::RecordError;
use passiverecon_core::types::RawRecord;

use crate::error::ReconPipelineError;

/// 입력 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// 첫 줄로 자동 감지
    #[default]
    Auto,
    /// Zeek ASCII (TSV + `#` 헤더)
    Zeek,
    /// JSON lines
    Json,
}

impl InputFormat {
    /// 설정 파일에서 쓰는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Zeek => "zeek",
            Self::Json => "json",
        }
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "zeek" | "ascii" => Ok(Self::Zeek),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown input format '{other}' (expected auto, zeek or json)")),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 줄 단위 레코드 리더
pub struct RecordReader<R> {
    reader: R,
    format: InputFormat,
    zeek: ZeekParser,
    buf: Vec<u8>,
    line_no: u64,
    finished: bool,
}

impl<R: BufRead> RecordReader<R> {
    /// 입력 형식을 지정하여 리더를 생성합니다.
    pub fn new(reader: R, format: InputFormat) -> Self {
        Self {
            reader,
            format,
            zeek: ZeekParser::new(),
            buf: Vec::with_capacity(4096),
            line_no: 0,
            finished: false,
        }
    }

    /// 현재 (감지된) 입력 형식
    pub fn format(&self) -> InputFormat {
        self.format
    }

    /// 지금까지 읽은 줄 수
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }

    fn parse_line(&mut self, line: &str) -> Result<Option<RawRecord>, RecordError> {
        if self.format == InputFormat::Auto {
            self.format = match line.as_bytes().first() {
                Some(b'#') => InputFormat::Zeek,
                Some(b'{') => InputFormat::Json,
                _ => {
                    return Err(RecordError::Tokenize {
                        line: self.line_no,
                        reason: "cannot detect input format (expected '#' header or JSON object)"
                            .to_owned(),
                    });
                }
            };
            tracing::debug!(format = %self.format, "detected input format");
        }

        match self.format {
            InputFormat::Json => parse_json_line(line, self.line_no).map(Some),
            _ => self.zeek.parse_line(line, self.line_no),
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<RawRecord, ReconPipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(ReconPipelineError::Io(e)));
                }
            }
            self.line_no += 1;

            let line = String::from_utf8_lossy(&self.buf)
                .trim_end_matches(['\n', '\r'])
                .to_owned();
            if line.trim().is_empty() {
                continue;
            }

            match self.parse_line(&line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}
