//! 인메모리 저장소

use std::collections::HashMap;

use passiverecon_core::error::StorageError;
use passiverecon_core::types::{DedupKey, Observation};

use super::PassiveStore;

/// `HashMap` 기반 저장소
///
/// 병합 규칙은 [`SqliteStore`](super::SqliteStore)와 같습니다.
#[derive(Debug, Default)]
pub struct MemoryStore {
    observations: HashMap<DedupKey, Observation>,
}

impl MemoryStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 모든 관측을 반환합니다 (순서 없음).
    pub fn observations(&self) -> impl Iterator<Item = &Observation> {
        self.observations.values()
    }
}

impl PassiveStore for MemoryStore {
    fn upsert(&mut self, observation: &Observation) -> Result<(), StorageError> {
        match self.observations.get_mut(&observation.key) {
            Some(stored) => stored.merge(observation),
            None => {
                self.observations
                    .insert(observation.key.clone(), observation.clone());
            }
        }
        Ok(())
    }

    fn upsert_bulk(&mut self, observations: &[Observation]) -> Result<(), StorageError> {
        for observation in observations {
            self.upsert(observation)?;
        }
        Ok(())
    }

    fn get(&self, key: &DedupKey) -> Result<Option<Observation>, StorageError> {
        Ok(self.observations.get(key).cloned())
    }

    fn count(&self) -> Result<u64, StorageError> {
        Ok(self.observations.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
