//! 쓰기 전략 선택 및 배치 기록
//!
//! [`select`]는 운영 플래그로 쓰기 전략을 고르는 순수 함수이고,
//! [`BatchWriter`]는 선택된 전략으로 지연 레코드 시퀀스를 소비하여
//! [`PassiveStore`]에 커밋합니다.
//!
//! # 전략
//! | 전략 | 커밋 단위 | 실패 시 |
//! |---|---|---|
//! | `bulk` | `bulk_batch_size`개 묶음, 묶음당 트랜잭션 1회 | 실행 중단 |
//! | `local-bulk` | 클라이언트 병합 후 `local_bulk_max_entries` 고유 키마다 | 실행 중단 |
//! | `single` | 레코드 1개 | 기록 후 건너뜀 |
//!
//! 어떤 전략도 쓰기를 병렬화하지 않으므로 dedup 키별 입력 순서가 유지됩니다.

use passiverecon_core::config::WriteMode;
use passiverecon_core::error::StorageError;
use passiverecon_core::metrics as m;
use passiverecon_core::types::{Observation, PersistableRecord};

use crate::buffer::LocalBulkBuffer;
use crate::enrich::Enricher;
use crate::store::PassiveStore;

/// 기본 bulk 묶음 크기
pub const DEFAULT_BULK_BATCH_SIZE: usize = 500;

/// 기본 local-bulk 버퍼 고유 키 수
pub const DEFAULT_LOCAL_BULK_MAX_ENTRIES: usize = 10_000;

/// 명령줄 쓰기 모드 플래그
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteModeFlags {
    /// `--bulk`
    pub bulk: bool,
    /// `--local-bulk`
    pub local_bulk: bool,
    /// `--no-bulk`
    pub no_bulk: bool,
}

impl WriteModeFlags {
    /// 플래그가 하나라도 설정되었는지 확인합니다.
    pub fn any(&self) -> bool {
        self.bulk || self.local_bulk || self.no_bulk
    }
}

/// 플래그로 쓰기 전략을 선택합니다.
///
/// `bulk`가 설정되었거나 아무 플래그도 없으면 bulk, 그 외 `no_bulk`이면 single,
/// 나머지는 local-bulk입니다.
pub fn select(flags: WriteModeFlags) -> WriteMode {
    if flags.bulk || !flags.any() {
        WriteMode::Bulk
    } else if flags.no_bulk {
        WriteMode::Single
    } else {
        WriteMode::LocalBulk
    }
}

/// 쓰기 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// 전달받은 레코드 수
    pub received: u64,
    /// 커밋된 레코드 수
    pub committed: u64,
    /// 커밋에 실패한 레코드 수 (single 모드에서만 0이 아닐 수 있음)
    pub failed: u64,
    /// 저장소 커밋 호출 수
    pub flushes: u64,
}

impl WriteReport {
    /// 실패한 레코드가 없는지 확인합니다.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// 배치 기록기
pub struct BatchWriter<S> {
    store: S,
    mode: WriteMode,
    bulk_batch_size: usize,
    local_bulk_max_entries: usize,
}

impl<S: PassiveStore> BatchWriter<S> {
    /// 저장소와 전략으로 기록기를 생성합니다.
    pub fn new(store: S, mode: WriteMode) -> Self {
        Self {
            store,
            mode,
            bulk_batch_size: DEFAULT_BULK_BATCH_SIZE,
            local_bulk_max_entries: DEFAULT_LOCAL_BULK_MAX_ENTRIES,
        }
    }

    /// bulk 묶음 크기를 설정합니다 (최소 1).
    pub fn with_bulk_batch_size(mut self, size: usize) -> Self {
        self.bulk_batch_size = size.max(1);
        self
    }

    /// local-bulk 버퍼 고유 키 수를 설정합니다 (최소 1).
    pub fn with_local_bulk_max_entries(mut self, entries: usize) -> Self {
        self.local_bulk_max_entries = entries.max(1);
        self
    }

    /// 선택된 전략
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// 저장소 참조
    pub fn store(&self) -> &S {
        &self.store
    }

    /// 기록기를 해체하여 저장소를 돌려받습니다.
    pub fn into_store(self) -> S {
        self.store
    }

    /// 선택된 전략으로 레코드를 기록합니다.
    ///
    /// # Errors
    /// bulk/local-bulk 모드에서 커밋이 실패하면 `StorageError`로 중단합니다.
    /// single 모드는 개별 실패를 보고서에 남기고 계속합니다.
    pub fn write<I, E>(&mut self, records: I, enricher: &E) -> Result<WriteReport, StorageError>
    where
        I: IntoIterator<Item = PersistableRecord>,
        E: Enricher + ?Sized,
    {
        tracing::debug!(
            mode = %self.mode,
            backend = self.store.backend_name(),
            "writing records"
        );
        match self.mode {
            WriteMode::Bulk => self.insert_or_update_bulk(records, enricher),
            WriteMode::LocalBulk => self.insert_or_update_local_bulk(records, enricher),
            WriteMode::Single => self.insert_or_update(records, enricher),
        }
    }

    /// 레코드를 `bulk_batch_size`개씩 묶어 순서대로 커밋합니다.
    pub fn insert_or_update_bulk<I, E>(
        &mut self,
        records: I,
        enricher: &E,
    ) -> Result<WriteReport, StorageError>
    where
        I: IntoIterator<Item = PersistableRecord>,
        E: Enricher + ?Sized,
    {
        let mut report = WriteReport::default();
        let mut chunk = Vec::with_capacity(self.bulk_batch_size);

        for record in records {
            report.received += 1;
            let infos = enricher.infos(&record);
            chunk.push(Observation::from_record(record, infos));
            if chunk.len() >= self.bulk_batch_size {
                self.flush(&mut chunk, &mut report)?;
            }
        }
        self.flush(&mut chunk, &mut report)?;

        Ok(report)
    }

    /// 레코드를 클라이언트 측에서 dedup 키로 병합한 뒤 커밋합니다.
    pub fn insert_or_update_local_bulk<I, E>(
        &mut self,
        records: I,
        enricher: &E,
    ) -> Result<WriteReport, StorageError>
    where
        I: IntoIterator<Item = PersistableRecord>,
        E: Enricher + ?Sized,
    {
        let mut report = WriteReport::default();
        let mut buffer = LocalBulkBuffer::new(self.local_bulk_max_entries);

        for record in records {
            report.received += 1;
            buffer.push(record, enricher);
            if buffer.should_flush() {
                let mut batch = buffer.drain_all();
                self.flush(&mut batch, &mut report)?;
            }
            metrics::gauge!(m::STORE_LOCAL_BUFFER_ENTRIES).set(buffer.len() as f64);
        }
        let mut batch = buffer.drain_all();
        self.flush(&mut batch, &mut report)?;
        metrics::gauge!(m::STORE_LOCAL_BUFFER_ENTRIES).set(0.0);

        tracing::debug!(
            received = buffer.total_received(),
            merged = buffer.merged_count(),
            "local-bulk merge finished"
        );
        Ok(report)
    }

    /// 레코드를 하나씩 커밋합니다. 개별 실패는 기록 후 건너뜁니다.
    pub fn insert_or_update<I, E>(
        &mut self,
        records: I,
        enricher: &E,
    ) -> Result<WriteReport, StorageError>
    where
        I: IntoIterator<Item = PersistableRecord>,
        E: Enricher + ?Sized,
    {
        let mut report = WriteReport::default();
        let mode = self.mode.as_str();

        for record in records {
            report.received += 1;
            let infos = enricher.infos(&record);
            let observation = Observation::from_record(record, infos);
            match self.store.upsert(&observation) {
                Ok(()) => {
                    report.committed += 1;
                    report.flushes += 1;
                    metrics::counter!(m::STORE_RECORDS_WRITTEN_TOTAL, m::LABEL_WRITE_MODE => mode)
                        .increment(1);
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::counter!(m::STORE_WRITE_FAILURES_TOTAL, m::LABEL_WRITE_MODE => mode)
                        .increment(1);
                    tracing::warn!(
                        key = %observation.key,
                        recon_type = %observation.recon_type,
                        error = %e,
                        "failed to store record, skipping"
                    );
                }
            }
        }

        Ok(report)
    }

    /// 묶음을 커밋하고 비웁니다. 빈 묶음은 무시합니다.
    fn flush(
        &mut self,
        batch: &mut Vec<Observation>,
        report: &mut WriteReport,
    ) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mode = self.mode.as_str();
        let records: u64 = batch.iter().map(|o| o.count).sum();

        if let Err(e) = self.store.upsert_bulk(batch) {
            metrics::counter!(m::STORE_WRITE_FAILURES_TOTAL, m::LABEL_WRITE_MODE => mode)
                .increment(records);
            tracing::error!(
                mode,
                observations = batch.len(),
                committed_so_far = report.committed,
                error = %e,
                "bulk commit failed, aborting"
            );
            return Err(e);
        }

        report.committed += records;
        report.flushes += 1;
        metrics::counter!(m::STORE_RECORDS_WRITTEN_TOTAL, m::LABEL_WRITE_MODE => mode)
            .increment(records);
        metrics::counter!(m::STORE_FLUSHES_TOTAL, m::LABEL_WRITE_MODE => mode).increment(1);
        tracing::debug!(mode, observations = batch.len(), records, "flushed batch");

        batch.clear();
        Ok(())
    }
}
