//! Performance benchmarks for vigil
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion};
use vigil::normalize::normalize;
use vigil::patterns::PatternMatcher;
use vigil::{BatchProcessor, PiiClassifier, Record, VigilConfig};

const SAMPLE: &str = "Prezados, meu nome é Carlos Eduardo Pereira, CPF 123.456.789-00, \
                      RG 1.234.567. Solicito cópia do processo SEI 00015-00012345/2023-11 \
                      e peço retorno pelo e-mail carlos@exemplo.com ou (61) 98765-4321.";

fn heuristic_config() -> VigilConfig {
    let mut config = VigilConfig::default();
    config.oracle.enabled = false;
    config
}

fn bench_components(c: &mut Criterion) {
    c.bench_function("normalize", |b| {
        b.iter(|| normalize(SAMPLE));
    });

    let matcher = PatternMatcher::new(&VigilConfig::default().patterns).unwrap();
    c.bench_function("PatternMatcher detect", |b| {
        b.iter(|| matcher.detect(SAMPLE));
    });
}

fn bench_classify(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let classifier = PiiClassifier::new(&heuristic_config(), None).unwrap();
    let record = Record::new("bench", SAMPLE);

    c.bench_function("classify (heuristic)", |b| {
        b.to_async(&rt)
            .iter(|| async { classifier.classify(&record).await.unwrap() });
    });
}

fn bench_batch_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let processor = BatchProcessor::new(&heuristic_config(), None).unwrap();

    let mut group = c.benchmark_group("batch_throughput");
    for count in [10, 100, 1000] {
        let records: Vec<Record> = (0..count)
            .map(|i| Record::new(format!("r{}", i), SAMPLE))
            .collect();
        group.bench_function(format!("{} records", count), |b| {
            b.to_async(&rt)
                .iter(|| async { processor.run(records.clone()).await });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_components, bench_classify, bench_batch_throughput);
criterion_main!(benches);
