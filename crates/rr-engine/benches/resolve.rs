//! Benchmarks for rule compilation and per-request resolution.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rr_engine::Rules;

fn rule_text(hosts: usize) -> String {
    let mut text = String::new();
    for i in 0..hosts {
        text.push_str(&format!("site{i}.example.com 10.0.{}.{}\n", i / 256, i % 256));
        text.push_str(&format!("site{i}.example.com/api http://api{i}.internal/v1\n"));
        text.push_str(&format!("/^https?://cdn{i}\\.example\\.com/(.*)$/ file:///srv/cdn{i}/$1\n"));
        text.push_str(&format!("**.site{i}.example.com/static resHeaders://{{headers}}\n"));
    }
    text.push_str("*.example.com filter://log\n");
    text
}

fn bench_set_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_root");
    for hosts in [10, 100, 1000] {
        let text = rule_text(hosts);
        group.bench_with_input(BenchmarkId::from_parameter(hosts), &text, |b, text| {
            let mut rules = Rules::new();
            b.iter(|| rules.set_root(black_box(text)))
        });
    }
    group.finish();
}

fn bench_resolve_rules(c: &mut Criterion) {
    let mut rules = Rules::new();
    rules.set_root(&rule_text(1000));

    let mut group = c.benchmark_group("resolve_rules");

    // Best case: first rules in every bucket
    group.bench_function("early_hit", |b| {
        b.iter(|| rules.resolve_rules(black_box("http://site0.example.com/api/users?id=1")))
    });

    group.bench_function("late_hit", |b| {
        b.iter(|| rules.resolve_rules(black_box("http://site999.example.com/api/users?id=1")))
    });

    group.bench_function("regex_hit", |b| {
        b.iter(|| rules.resolve_rules(black_box("https://cdn500.example.com/js/app.js")))
    });

    group.bench_function("miss", |b| {
        b.iter(|| rules.resolve_rules(black_box("http://unrelated.org/")))
    });

    group.finish();
}

fn bench_get_host(c: &mut Criterion) {
    let mut rules = Rules::new();
    rules.set_root(&rule_text(1000));

    c.bench_function("get_host", |b| {
        b.iter(|| rules.get_host(black_box("site500.example.com/index.html"), Default::default()))
    });
}

criterion_group!(benches, bench_set_root, bench_resolve_rules, bench_get_host);
criterion_main!(benches);
