use criterion::{criterion_group, criterion_main, Criterion};
use termdex::{index_documents, Analyzer, Document, IndexConfig, IndexReader, StandardAnalyzer};

const TEXT: &str = "The Federal Reserve held interest rates steady on Wednesday, citing \
    slower growth in consumer spending and a cooling labor market. Oil prices rose 2.5 percent \
    after the announcement while stock markets closed mixed across Asia and Europe.";

fn bench_analyze(c: &mut Criterion) {
    let analyzer = StandardAnalyzer::new();
    c.bench_function("analyze_paragraph", |b| b.iter(|| analyzer.analyze(TEXT, true)));
}

fn bench_lookup(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let docs: Vec<Document> = (0..500).map(|i| Document::new(format!("doc-{i}"), TEXT)).collect();
    let config = IndexConfig { compressor: "gzip".into(), ..IndexConfig::new(dir.path()) };
    let (meta, _) = index_documents(&config, &StandardAnalyzer::new(), &docs).expect("build");
    let reader = IndexReader::open(meta, 64).expect("open");
    c.bench_function("term_vector_cached", |b| b.iter(|| reader.get_term_vector("market")));
}

criterion_group!(benches, bench_analyze, bench_lookup);
criterion_main!(benches);
