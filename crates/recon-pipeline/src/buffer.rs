//! local-bulk 병합 버퍼 -- dedup 키 기준 클라이언트 측 병합
//!
//! [`LocalBulkBuffer`]는 같은 dedup 키의 레코드를 하나의 [`Observation`]으로
//! 합쳐 보관하고, 고유 키 수가 용량에 도달하면 플러시 대상이 됩니다.
//! 드레인 순서는 키가 처음 들어온 순서입니다.
//!
//! 보강(`infos`)은 플러시 구간마다 키당 한 번, 키가 처음 들어올 때 계산됩니다.

use std::collections::HashMap;

use passiverecon_core::types::{DedupKey, Observation, PersistableRecord};

use crate::enrich::Enricher;

/// 인메모리 병합 버퍼
pub struct LocalBulkBuffer {
    /// 삽입 순서의 관측 목록
    entries: Vec<Observation>,
    /// dedup 키 -> `entries` 인덱스
    index: HashMap<DedupKey, usize>,
    /// 최대 고유 키 수
    capacity: usize,
    /// 기존 키에 병합된 레코드 수 (통계용)
    merged_count: u64,
    /// 총 유입 레코드 수
    total_received: u64,
}

impl LocalBulkBuffer {
    /// 새 병합 버퍼를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity.min(10_000)),
            index: HashMap::with_capacity(capacity.min(10_000)),
            capacity,
            merged_count: 0,
            total_received: 0,
        }
    }

    /// 레코드를 버퍼에 추가합니다.
    ///
    /// 같은 키가 이미 있으면 병합하고 `true`를 반환합니다.
    pub fn push<E: Enricher + ?Sized>(&mut self, record: PersistableRecord, enricher: &E) -> bool {
        self.total_received += 1;

        if let Some(&idx) = self.index.get(&record.key) {
            let stored = &mut self.entries[idx];
            stored.count = stored.count.saturating_add(1);
            stored.first_seen = stored.first_seen.min(record.timestamp);
            stored.last_seen = stored.last_seen.max(record.timestamp);
            self.merged_count += 1;
            return true;
        }

        let infos = enricher.infos(&record);
        self.index.insert(record.key.clone(), self.entries.len());
        self.entries.push(Observation::from_record(record, infos));
        false
    }

    /// 버퍼의 모든 관측을 삽입 순서로 드레인합니다.
    pub fn drain_all(&mut self) -> Vec<Observation> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }

    /// 현재 고유 키 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 최대 고유 키 수를 반환합니다.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 기존 키에 병합된 레코드 수를 반환합니다.
    pub fn merged_count(&self) -> u64 {
        self.merged_count
    }

    /// 총 유입 레코드 수를 반환합니다.
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// 버퍼 사용률을 0.0~1.0 범위로 반환합니다.
    pub fn utilization(&self) -> f64 {
        f64::from(u32::try_from(self.entries.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }

    /// 고유 키 수가 용량에 도달했는지 확인합니다.
    pub fn should_flush(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}
