//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 파이프라인과 쓰기 전략은 이 상수로 `metrics::counter!()`를 호출합니다.
//! 레코더 설치 여부는 바이너리가 결정하며, 레코더가 없으면 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `passiverecon_`
//! - 단계명: `records_`, `store_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 쓰기 전략 레이블 키 (bulk, local-bulk, single)
pub const LABEL_WRITE_MODE: &str = "write_mode";

/// 형식 오류가 발생한 단계 레이블 키 (tokenize, normalize, filter)
pub const LABEL_REASON: &str = "reason";

// ─── 파이프라인 메트릭 ────────────────────────────────────────────────

/// 입력에서 읽은 전체 레코드 수 (counter)
pub const RECORDS_READ_TOTAL: &str = "passiverecon_records_read_total";

/// 형식 오류로 건너뛴 레코드 수 (counter, label: reason)
pub const RECORDS_MALFORMED_TOTAL: &str = "passiverecon_records_malformed_total";

/// ignore 규칙으로 드롭된 레코드 수 (counter)
pub const RECORDS_IGNORED_TOTAL: &str = "passiverecon_records_ignored_total";

/// 필터를 통과한 레코드 수 (counter)
pub const RECORDS_KEPT_TOTAL: &str = "passiverecon_records_kept_total";

// ─── 저장소 메트릭 ──────────────────────────────────────────────────

/// 저장소에 커밋된 레코드 수 (counter, label: write_mode)
pub const STORE_RECORDS_WRITTEN_TOTAL: &str = "passiverecon_store_records_written_total";

/// 커밋에 실패한 레코드 수 (counter, label: write_mode)
pub const STORE_WRITE_FAILURES_TOTAL: &str = "passiverecon_store_write_failures_total";

/// 수행된 flush(bulk 커밋) 횟수 (counter, label: write_mode)
pub const STORE_FLUSHES_TOTAL: &str = "passiverecon_store_flushes_total";

/// local-bulk 버퍼에 있는 dedup 키 수 (gauge)
pub const STORE_LOCAL_BUFFER_ENTRIES: &str = "passiverecon_store_local_buffer_entries";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        RECORDS_READ_TOTAL,
        "Total number of records read from the input stream"
    );
    describe_counter!(
        RECORDS_MALFORMED_TOTAL,
        "Total number of records skipped because they could not be normalized"
    );
    describe_counter!(
        RECORDS_IGNORED_TOTAL,
        "Total number of records dropped by ignore rules"
    );
    describe_counter!(
        RECORDS_KEPT_TOTAL,
        "Total number of records that passed the ignore filter"
    );
    describe_counter!(
        STORE_RECORDS_WRITTEN_TOTAL,
        "Total number of records committed to the passive store"
    );
    describe_counter!(
        STORE_WRITE_FAILURES_TOTAL,
        "Total number of records whose commit failed"
    );
    describe_counter!(
        STORE_FLUSHES_TOTAL,
        "Total number of bulk commits issued to the passive store"
    );
    describe_gauge!(
        STORE_LOCAL_BUFFER_ENTRIES,
        "Distinct dedup keys currently held by the local-bulk buffer"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_share_prefix() {
        for name in [
            RECORDS_READ_TOTAL,
            RECORDS_MALFORMED_TOTAL,
            RECORDS_IGNORED_TOTAL,
            RECORDS_KEPT_TOTAL,
            STORE_RECORDS_WRITTEN_TOTAL,
            STORE_WRITE_FAILURES_TOTAL,
            STORE_FLUSHES_TOTAL,
            STORE_LOCAL_BUFFER_ENTRIES,
        ] {
            assert!(name.starts_with("passiverecon_"), "{name}");
        }
    }

    #[test]
    fn describe_all_without_recorder_is_noop() {
        describe_all();
    }
}
