//! ignore 필터 벤치마크
//!
//! 센서별 규칙 수에 따른 `is_ignored` 스케일링과 레코드 단위 필터 처리량을 측정합니다.

use std::net::IpAddr;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use passiverecon_core::types::RawRecord;
use passiverecon_pipeline::{IgnoreFilter, IgnoreRuleSet, NetworkMatcher, Normalizer, RuleTable};

fn rule_set(matchers: usize) -> IgnoreRuleSet {
    let mut ignore_nets = RuleTable::new();
    for i in 0..matchers {
        let cidr = format!("10.{}.{}.0/24", (i / 256) % 256, i % 256);
        if let Ok(matcher) = cidr.parse::<NetworkMatcher>() {
            ignore_nets.insert("s1", matcher);
        }
    }
    let mut never_ignore = RuleTable::new();
    if let Ok(matcher) = "10.0.0.5/32".parse::<NetworkMatcher>() {
        never_ignore.insert("s1", matcher);
    }
    IgnoreRuleSet::new(ignore_nets, never_ignore)
}

fn bench_is_ignored(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_ignored");
    let miss: IpAddr = "192.0.2.1".parse().unwrap();

    for count in [1, 10, 100, 1000] {
        let rules = rule_set(count);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("miss", count), &rules, |b, rules| {
            b.iter(|| rules.is_ignored(black_box(Some("s1")), black_box(miss)))
        });
    }

    let rules = rule_set(1000);
    let never: IpAddr = "10.0.0.5".parse().unwrap();
    group.bench_function("neverignore_hit", |b| {
        b.iter(|| rules.is_ignored(black_box(Some("s1")), black_box(never)))
    });

    group.finish();
}

fn ssl_record(host: &str) -> RawRecord {
    RawRecord::new()
        .with_field("ts", 1_700_000_000.0)
        .with_field("recon_type", "PassiveRecon::SSL_SERVER")
        .with_field("host", host)
        .with_field("srvport", 443_i64)
        .with_field("source", "cert")
        .with_field("value", "MIIBszCCAVmgAwIBAgIUJ")
}

fn bench_normalize_and_filter(c: &mut Criterion) {
    let normalizer = Normalizer::default().with_sensor(Some("s1"));
    let filter = IgnoreFilter::new(Arc::new(rule_set(100)));

    let mut group = c.benchmark_group("normalize_and_filter");

    group.throughput(Throughput::Elements(1));
    group.bench_function("kept", |b| {
        b.iter(|| {
            let record = normalizer.normalize(ssl_record("192.0.2.1")).unwrap();
            filter.process(black_box(record)).unwrap()
        })
    });

    group.bench_function("ignored", |b| {
        b.iter(|| {
            let record = normalizer.normalize(ssl_record("10.0.1.7")).unwrap();
            filter.process(black_box(record)).unwrap()
        })
    });

    // 1000건 반복 처리량
    group.throughput(Throughput::Elements(1000));
    group.bench_function("throughput_1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                let record = normalizer.normalize(ssl_record("192.0.2.1")).unwrap();
                black_box(filter.process(record).unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_is_ignored, bench_normalize_and_filter);
criterion_main!(benches);
