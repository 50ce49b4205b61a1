//! 파이프라인 오케스트레이션 -- 토크나이저/정규화/필터/기록의 전체 흐름
//!
//! # 내부 아키텍처
//! ```text
//! BufRead -> RecordReader -> Normalizer -> IgnoreFilter -> BatchWriter -> PassiveStore
//!              (RawRecord)   (Normalized)   (Persistable)     (Observation)
//! ```
//!
//! 모든 단계는 지연 이터레이터로 연결됩니다. 기록기가 다음 레코드를 요청할 때만
//! 입력을 읽으므로 메모리 사용량은 local-bulk 버퍼를 제외하면 일정합니다.
//!
//! 레코드 단위 에러(토크나이저/정규화/필터)는 경고를 남기고 건너뜁니다.
//! 입력 I/O 에러는 스트림을 끝내고, 이미 받은 레코드를 모두 기록한 뒤 보고됩니다.

use std::io::BufRead;
use std::sync::Arc;

use passiverecon_core::error::RecordError;
use passiverecon_core::metrics as m;
use passiverecon_core::types::{PersistableRecord, RawRecord};

use crate::config::PipelineConfig;
use crate::enrich::Enricher;
use crate::error::ReconPipelineError;
use crate::filter::IgnoreFilter;
use crate::ignore::IgnoreRuleSet;
use crate::normalize::Normalizer;
use crate::parser::RecordReader;
use crate::store::PassiveStore;
use crate::writer::{BatchWriter, WriteReport};

/// 레코드 흐름 통계
///
/// `read == malformed + ignored + kept`가 항상 성립합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// 토크나이저가 내놓은 레코드 수 (형식 오류 포함)
    pub read: u64,
    /// 형식 오류로 건너뛴 레코드 수
    pub malformed: u64,
    /// ignore 규칙으로 드롭된 레코드 수
    pub ignored: u64,
    /// 기록기로 전달된 레코드 수
    pub kept: u64,
}

/// 한 번의 실행 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 레코드 흐름 통계
    pub stats: PipelineStats,
    /// 기록 결과
    pub write: WriteReport,
}

/// passiverecon 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use passiverecon_pipeline::{ReconPipeline, ReconInfos, SqliteStore};
///
/// let pipeline = ReconPipeline::load(config).await?;
/// let mut store = SqliteStore::open("/var/lib/passiverecon/passive.db")?;
/// let summary = pipeline.run(std::io::stdin().lock(), &mut store, &ReconInfos)?;
/// ```
pub struct ReconPipeline {
    config: PipelineConfig,
    normalizer: Normalizer,
    filter: IgnoreFilter,
}

impl ReconPipeline {
    /// 빌더를 생성합니다.
    pub fn builder() -> ReconPipelineBuilder {
        ReconPipelineBuilder::new()
    }

    /// 설정의 ignore 규칙 파일을 로드하여 파이프라인을 생성합니다.
    ///
    /// # Errors
    /// 설정이 유효하지 않거나 규칙 파일을 로드할 수 없는 경우
    pub async fn load(config: PipelineConfig) -> Result<Self, ReconPipelineError> {
        config.validate()?;
        let rules = IgnoreRuleSet::load(config.ignore_spec.as_deref()).await?;
        Self::builder().config(config).rules(Arc::new(rules)).build()
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 공유 ignore 규칙 집합
    pub fn rules(&self) -> &Arc<IgnoreRuleSet> {
        self.filter.rules()
    }

    /// 원시 레코드 하나를 정규화하고 필터링합니다.
    ///
    /// 드롭되면 `Ok(None)`입니다.
    pub fn process_one(&self, raw: RawRecord) -> Result<Option<PersistableRecord>, RecordError> {
        let normalized = self.normalizer.normalize(raw)?;
        self.filter.process(normalized)
    }

    /// 원시 레코드 이터레이터를 저장 가능한 레코드의 지연 스트림으로 변환합니다.
    pub fn stream<I>(&self, raw: I) -> RecordStream<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Result<RawRecord, ReconPipelineError>>,
    {
        RecordStream {
            pipeline: self,
            inner: raw.into_iter(),
            stats: PipelineStats::default(),
            fatal: None,
        }
    }

    /// 입력을 끝까지 읽어 저장소에 기록합니다.
    ///
    /// # Errors
    /// - 기록 전략이 중단된 경우 (`Store`)
    /// - 입력 I/O 에러 (`Io`), 이 경우에도 이미 읽은 레코드는 기록된 뒤 반환
    pub fn run<R, S, E>(
        &self,
        input: R,
        store: S,
        enricher: &E,
    ) -> Result<RunSummary, ReconPipelineError>
    where
        R: BufRead,
        S: PassiveStore,
        E: Enricher + ?Sized,
    {
        let reader = RecordReader::new(input, self.config.input_format);
        let mut stream = self.stream(reader);
        let mut writer = BatchWriter::new(store, self.config.write_mode)
            .with_bulk_batch_size(self.config.bulk_batch_size)
            .with_local_bulk_max_entries(self.config.local_bulk_max_entries);

        let write = writer.write(&mut stream, enricher)?;
        let stats = stream.finish()?;

        tracing::debug!(
            read = stats.read,
            malformed = stats.malformed,
            ignored = stats.ignored,
            kept = stats.kept,
            committed = write.committed,
            failed = write.failed,
            "pipeline run finished"
        );
        Ok(RunSummary { stats, write })
    }
}

/// 저장 가능한 레코드의 지연 스트림
///
/// 레코드 단위 에러는 통계에 남기고 건너뜁니다. 치명적 에러(입력 I/O)가
/// 발생하면 스트림이 끝나며, [`RecordStream::finish`]가 그 에러를 반환합니다.
pub struct RecordStream<'a, I> {
    pipeline: &'a ReconPipeline,
    inner: I,
    stats: PipelineStats,
    fatal: Option<ReconPipelineError>,
}

impl<I> RecordStream<'_, I> {
    /// 현재까지의 통계
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// 스트림을 종료하고 통계를 반환합니다.
    ///
    /// # Errors
    /// 스트림이 치명적 에러로 끝난 경우 그 에러
    pub fn finish(self) -> Result<PipelineStats, ReconPipelineError> {
        match self.fatal {
            Some(e) => Err(e),
            None => Ok(self.stats),
        }
    }

    fn skip_malformed(&mut self, stage: &'static str, error: &dyn std::fmt::Display) {
        self.stats.malformed += 1;
        metrics::counter!(m::RECORDS_MALFORMED_TOTAL, m::LABEL_REASON => stage).increment(1);
        tracing::warn!(stage, error = %error, "skipping malformed record");
    }
}

impl<I> Iterator for RecordStream<'_, I>
where
    I: Iterator<Item = Result<RawRecord, ReconPipelineError>>,
{
    type Item = PersistableRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fatal.is_some() {
            return None;
        }

        loop {
            let raw = match self.inner.next()? {
                Ok(raw) => raw,
                Err(e) if e.is_record_level() => {
                    self.stats.read += 1;
                    metrics::counter!(m::RECORDS_READ_TOTAL).increment(1);
                    self.skip_malformed("tokenize", &e);
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "input stream failed");
                    self.fatal = Some(e);
                    return None;
                }
            };
            self.stats.read += 1;
            metrics::counter!(m::RECORDS_READ_TOTAL).increment(1);

            let normalized = match self.pipeline.normalizer.normalize(raw) {
                Ok(record) => record,
                Err(e) => {
                    self.skip_malformed("normalize", &e);
                    continue;
                }
            };

            match self.pipeline.filter.process(normalized) {
                Ok(Some(record)) => {
                    self.stats.kept += 1;
                    metrics::counter!(m::RECORDS_KEPT_TOTAL).increment(1);
                    return Some(record);
                }
                Ok(None) => {
                    self.stats.ignored += 1;
                    metrics::counter!(m::RECORDS_IGNORED_TOTAL).increment(1);
                }
                Err(e) => self.skip_malformed("filter", &e),
            }
        }
    }
}

/// [`ReconPipeline`] 빌더
#[derive(Default)]
pub struct ReconPipelineBuilder {
    config: PipelineConfig,
    rules: Option<Arc<IgnoreRuleSet>>,
}

impl ReconPipelineBuilder {
    /// 기본 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 이미 로드된 ignore 규칙 집합을 지정합니다.
    pub fn rules(mut self, rules: Arc<IgnoreRuleSet>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// 파이프라인을 생성합니다.
    ///
    /// # Errors
    /// - 설정이 유효하지 않은 경우
    /// - 설정에 규칙 파일이 있는데 규칙 집합이 주어지지 않은 경우
    ///   ([`ReconPipeline::load`]를 사용해야 함)
    pub fn build(self) -> Result<ReconPipeline, ReconPipelineError> {
        self.config.validate()?;

        let rules = match (self.rules, &self.config.ignore_spec) {
            (Some(rules), _) => rules,
            (None, None) => Arc::new(IgnoreRuleSet::empty()),
            (None, Some(path)) => {
                return Err(ReconPipelineError::Config {
                    field: "ignore_spec".to_owned(),
                    reason: format!(
                        "{} is configured but not loaded; use ReconPipeline::load",
                        path.display()
                    ),
                });
            }
        };

        let normalizer = Normalizer::new(self.config.recon_prefix_len)
            .with_sensor(self.config.sensor.as_deref());
        let filter = IgnoreFilter::new(rules).with_max_value_len(self.config.max_value_len);

        Ok(ReconPipeline {
            config: self.config,
            normalizer,
            filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfigBuilder;
    use passiverecon_core::types::FieldValue;

    fn raw(ts: f64, host: &str) -> RawRecord {
        RawRecord::new()
            .with_field("ts", ts)
            .with_field("recon_type", "PassiveRecon::SSL_SERVER")
            .with_field("host", host)
            .with_field("srvport", 443_i64)
            .with_field("source", "cert")
            .with_field("value", "MIIB")
    }

    fn pipeline() -> ReconPipeline {
        ReconPipeline::builder()
            .config(PipelineConfigBuilder::new().sensor("s1").build().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn process_one_keeps_record() {
        let record = pipeline().process_one(raw(1.0, "10.0.0.5")).unwrap().unwrap();
        assert_eq!(record.recon_type, "SSL_SERVER");
        assert_eq!(record.sensor.as_deref(), Some("s1"));
    }

    #[test]
    fn stream_counts_every_outcome() {
        let pipeline = pipeline();
        let input: Vec<Result<RawRecord, ReconPipelineError>> = vec![
            Ok(raw(1.0, "10.0.0.5")),
            Err(RecordError::Tokenize {
                line: 2,
                reason: "bad".to_owned(),
            }
            .into()),
            Ok(RawRecord::new().with_field("recon_type", "PassiveRecon::X")),
            Ok(raw(2.0, "not-an-ip")),
            Ok(raw(3.0, "10.0.0.6")),
        ];
        let mut stream = pipeline.stream(input);
        let kept: Vec<_> = stream.by_ref().collect();
        assert_eq!(kept.len(), 2);

        let stats = stream.finish().unwrap();
        assert_eq!(
            stats,
            PipelineStats {
                read: 5,
                malformed: 3,
                ignored: 0,
                kept: 2,
            }
        );
    }

    #[test]
    fn fatal_error_ends_stream() {
        let pipeline = pipeline();
        let input: Vec<Result<RawRecord, ReconPipelineError>> = vec![
            Ok(raw(1.0, "10.0.0.5")),
            Err(std::io::Error::other("disk gone").into()),
            Ok(raw(2.0, "10.0.0.6")),
        ];
        let mut stream = pipeline.stream(input);
        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert!(matches!(stream.finish(), Err(ReconPipelineError::Io(_))));
    }

    #[test]
    fn build_without_loaded_rules_fails_when_spec_configured() {
        let config = PipelineConfigBuilder::new()
            .ignore_spec("/etc/passiverecon/ignore.yml")
            .build()
            .unwrap();
        let result = ReconPipeline::builder().config(config).build();
        assert!(matches!(result, Err(ReconPipelineError::Config { .. })));
    }

    #[test]
    fn pass_through_fields_survive() {
        let record = pipeline()
            .process_one(raw(1.0, "10.0.0.5").with_field("uid", "CAbc"))
            .unwrap()
            .unwrap();
        assert_eq!(record.fields.get("uid"), Some(&FieldValue::from("CAbc")));
    }
}
