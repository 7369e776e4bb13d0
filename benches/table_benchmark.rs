use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use fieldvault::core::config::Config;
use fieldvault::core::database::Database;
use fieldvault::core::types::{DataType, DocId, DocKey, DocRef, Document, Field, WordCount};
use fieldvault::index::inverted::InvertedIndex;
use fieldvault::schema::schema::TableSchema;
use rand::Rng;
use tempfile::TempDir;

const WORDS: [&str; 8] = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];

fn schema() -> TableSchema {
    TableSchema::new("bench")
        .add_string_field("title", true)
        .add_long_field("views")
        .add_double_field("score")
}

/// Helper to create test documents
fn create_test_document(id: u64) -> Document {
    let mut rng = rand::thread_rng();
    Document::new(format!("doc-{}", id))
        .with_field(Field::string("title", &format!("Document {}", id)))
        .with_field(Field::long("views", rng.gen_range(0..1_000_000)))
        .with_field(Field::double("score", rng.gen_range(0.0..100.0)))
        .with_field(Field::string("category", &format!("category_{}", id % 10)))
}

fn open_database(dir: &TempDir) -> Database {
    let db = Database::open_with_schema(schema(), Config::with_path(dir.path())).unwrap();
    db.add_field("category", DataType::String, false).unwrap();
    db
}

/// Benchmark batch insertion
fn bench_batch_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_insert");

    for batch_size in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let dir = TempDir::new().unwrap();
                let db = open_database(&dir);
                let mut id_counter = 0u64;

                b.iter(|| {
                    let docs: Vec<Document> = (0..batch_size)
                        .map(|_| {
                            let doc = create_test_document(id_counter);
                            id_counter += 1;
                            doc
                        })
                        .collect();
                    black_box(db.add_docs(&docs));
                });
            },
        );
    }
    group.finish();
}

/// Benchmark lookups by key and by docid
fn bench_get_doc(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = open_database(&dir);
    let docs: Vec<Document> = (0..10_000).map(create_test_document).collect();
    db.add_docs(&docs);

    let mut group = c.benchmark_group("get_doc");
    group.bench_function("by_key", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let key = DocKey::from(format!("doc-{}", rng.gen_range(0..10_000)));
            black_box(db.get_doc(&DocRef::Key(key), &[]).unwrap());
        });
    });
    group.bench_function("by_docid_dynamic_only", |b| {
        let mut rng = rand::thread_rng();
        b.iter(|| {
            let docid = DocId(rng.gen_range(0..10_000));
            black_box(db.get_doc(&DocRef::Id(docid), &["category"]).unwrap());
        });
    });
    group.finish();
}

/// Benchmark conjunctive queries over the retrieval index
fn bench_query(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let mut index = InvertedIndex::new();
    for docid in 0..50_000u32 {
        let words: Vec<WordCount> = (0..4)
            .map(|_| WordCount::new(WORDS[rng.gen_range(0..WORDS.len())], 1))
            .collect();
        index.index(DocId(docid), &words).unwrap();
    }

    let mut group = c.benchmark_group("query");
    for query in [vec!["fox"], vec!["quick", "fox"], vec!["quick", "brown", "lazy"]] {
        group.bench_with_input(
            BenchmarkId::from_parameter(query.join("+")),
            &query,
            |b, query| {
                b.iter(|| black_box(index.query(query).unwrap()));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_batch_insert, bench_get_doc, bench_query);
criterion_main!(benches);
