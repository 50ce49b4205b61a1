//! 패시브 저장소 추상화
//!
//! [`PassiveStore`]는 dedup 키 기준 insert-or-merge 연산을 제공합니다.
//! 같은 키가 이미 있으면 관측 횟수를 더하고 관측 구간을 넓힙니다
//! ([`Observation::merge`]와 같은 규칙).
//!
//! # 구현
//! - [`SqliteStore`]: 기본 백엔드, 파일 또는 인메모리
//! - [`MemoryStore`]: 테스트와 dry-run용

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use passiverecon_core::error::StorageError;
use passiverecon_core::types::{DedupKey, Observation};

/// 패시브 저장소 트레이트
pub trait PassiveStore: Send {
    /// 관측 하나를 삽입하거나 기존 관측에 병합합니다.
    fn upsert(&mut self, observation: &Observation) -> Result<(), StorageError>;

    /// 관측 묶음을 한 번에 커밋합니다.
    ///
    /// 구현은 묶음 전체를 원자적으로 적용해야 합니다. 실패하면 묶음의
    /// 어떤 관측도 반영되지 않습니다.
    fn upsert_bulk(&mut self, observations: &[Observation]) -> Result<(), StorageError>;

    /// 키로 관측을 조회합니다.
    fn get(&self, key: &DedupKey) -> Result<Option<Observation>, StorageError>;

    /// 저장된 관측(고유 키) 수
    fn count(&self) -> Result<u64, StorageError>;

    /// 백엔드 이름 (로그용)
    fn backend_name(&self) -> &'static str;
}

macro_rules! forward_store {
    ($ty:ty) => {
        impl<S: PassiveStore + ?Sized> PassiveStore for $ty {
            fn upsert(&mut self, observation: &Observation) -> Result<(), StorageError> {
                (**self).upsert(observation)
            }

            fn upsert_bulk(&mut self, observations: &[Observation]) -> Result<(), StorageError> {
                (**self).upsert_bulk(observations)
            }

            fn get(&self, key: &DedupKey) -> Result<Option<Observation>, StorageError> {
                (**self).get(key)
            }

            fn count(&self) -> Result<u64, StorageError> {
                (**self).count()
            }

            fn backend_name(&self) -> &'static str {
                (**self).backend_name()
            }
        }
    };
}

forward_store!(Box<S>);
forward_store!(&mut S);
