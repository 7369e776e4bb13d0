use std::path::Path;
use std::time::Duration;
use fieldvault::core::config::Config;
use fieldvault::core::database::Database;
use fieldvault::core::error::ErrorKind;
use fieldvault::core::types::{DataType, DocId, DocKey, DocRef, Document, Field, WordCount};
use fieldvault::schema::schema::TableSchema;
use fieldvault::writer::batch::BatchWriter;
use tempfile::TempDir;

fn test_config(path: &Path) -> Config {
    Config {
        storage_path: path.to_path_buf(),
        segment_capacity: 4,
        string_block_size: 64 * 1024,
        cache_size_mb: 1,
        string_cache_size_mb: 1,
        column_cache_size_mb: 1,
        block_docs_num: 4,
        flush_interval: Duration::from_millis(50),
        workers: 2,
        ..Config::default()
    }
}

fn schema() -> TableSchema {
    TableSchema::new("articles")
        .add_string_field("title", true)
        .add_long_field("views")
}

fn key(s: &str) -> DocRef {
    DocRef::Key(DocKey::from(s))
}

fn article(k: &str, title: &str, views: i64) -> Document {
    Document::new(k)
        .with_field(Field::string("title", title))
        .with_field(Field::long("views", views))
}

#[test]
fn open_without_table_fails() {
    let dir = TempDir::new().unwrap();
    let err = Database::open(test_config(dir.path())).err().unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidState);
}

#[test]
fn second_writer_is_locked_out() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_with_schema(schema(), test_config(dir.path())).unwrap();

    let err = Database::open(test_config(dir.path())).err().unwrap();
    assert_eq!(err.kind, ErrorKind::InvalidState);

    db.close().unwrap();
    drop(db);
    assert!(Database::open(test_config(dir.path())).is_ok());
}

#[test]
fn reopen_restores_rows_fields_and_deletions() {
    let dir = TempDir::new().unwrap();
    {
        let db = Database::open_with_schema(schema(), test_config(dir.path())).unwrap();
        db.add_field("author", DataType::String, false).unwrap();

        for i in 0..10 {
            let doc = article(&format!("a{}", i), &format!("title {}", i), i * 100)
                .with_field(Field::string("author", "ann"));
            assert_eq!(db.add_doc(doc).unwrap(), DocId(i as u32));
        }
        let deleted = db.delete_docs(&[DocKey::from("a3"), DocKey::from("missing")]);
        assert_eq!(deleted[0].as_ref().unwrap(), &DocId(3));
        assert_eq!(deleted[1].as_ref().unwrap_err().kind, ErrorKind::DocNotFound);
        db.close().unwrap();
    }

    let db = Database::open(test_config(dir.path())).unwrap();
    let stats = db.stats();
    assert_eq!(stats.doc_count, 10);
    assert_eq!(stats.live_keys, 9);
    assert_eq!(stats.deleted_docs, 1);
    assert_eq!(stats.dynamic_fields, 1);

    let doc = db.get_doc(&key("a7"), &[]).unwrap();
    assert_eq!(
        doc.fields,
        vec![
            Field::string("title", "title 7"),
            Field::long("views", 700),
            Field::string("author", "ann"),
        ]
    );
    assert_eq!(db.get_doc(&key("a3"), &[]).unwrap_err().kind, ErrorKind::DocNotFound);
    assert_eq!(db.get_doc(&DocRef::Id(DocId(3)), &[]).unwrap_err().kind, ErrorKind::DocNotFound);
    assert_eq!(db.field_type("author"), Some(DataType::String));

    assert_eq!(db.add_doc(article("a10", "new", 1)).unwrap(), DocId(10));
}

#[test]
fn deleted_documents_leave_queries() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_with_schema(schema(), test_config(dir.path())).unwrap();

    for (k, words) in [("x", &["rust", "fast"][..]), ("y", &["rust"][..]), ("z", &["rust", "fast"][..])] {
        db.add_doc(article(k, k, 0)).unwrap();
        let counts: Vec<WordCount> = words.iter().map(|w| WordCount::new(w, 1)).collect();
        db.add_texts(&key(k), &counts).unwrap();
    }

    let ids = |words: &[&str]| db.query(words).unwrap();
    assert_eq!(ids(&["rust"]), vec![DocId(0), DocId(1), DocId(2)]);
    assert_eq!(ids(&["rust", "fast"]), vec![DocId(0), DocId(2)]);

    db.delete_docs(&[DocKey::from("x")]);
    assert_eq!(ids(&["rust", "fast"]), vec![DocId(2)]);
    assert_eq!(db.query(&["slow"]).unwrap_err().kind, ErrorKind::TermNotFound);
    assert!(db.query(&[]).unwrap().is_empty());

    // deleted documents take no more text
    let err = db.add_texts(&DocRef::Id(DocId(0)), &[WordCount::new("late", 1)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DocNotFound);
}

#[test]
fn texts_must_arrive_in_docid_order() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_with_schema(schema(), test_config(dir.path())).unwrap();
    db.add_docs(&[article("a", "a", 0), article("b", "b", 0)]);

    db.add_texts(&key("b"), &[WordCount::new("w", 2), WordCount::new("w", 1)]).unwrap();
    let err = db.add_texts(&key("a"), &[WordCount::new("w", 1)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidInput);

    let stats = db.stats();
    assert_eq!(stats.term_count, 1);
    assert_eq!(stats.indexed_docs, 1);
}

#[test]
fn update_and_get_docs() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_with_schema(schema(), test_config(dir.path())).unwrap();
    db.add_docs(&[article("a", "one", 1), article("b", "two", 2)]);

    db.update_doc(&key("b"), &[Field::long("views", 20)]).unwrap();
    let err = db.update_doc(&key("nope"), &[Field::long("views", 1)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DocNotFound);

    let docs = db.get_docs(&[key("a"), key("b"), key("nope")], &["views"]);
    assert_eq!(docs[0].as_ref().unwrap().fields, vec![Field::long("views", 1)]);
    assert_eq!(docs[1].as_ref().unwrap().fields, vec![Field::long("views", 20)]);
    assert_eq!(docs[2].as_ref().unwrap_err().kind, ErrorKind::DocNotFound);
}

#[test]
fn batch_writer_keeps_input_order() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_with_schema(schema(), test_config(dir.path())).unwrap();

    let mut writer = BatchWriter::new(&db, 3);
    for i in 0..7 {
        let k = if i == 4 { String::new() } else { format!("k{}", i) };
        writer.add(article(&k, "t", i));
    }
    let result = writer.finish();

    assert_eq!(result.results.len(), 7);
    assert_eq!(result.success_count(), 6);
    assert_eq!(result.results[4].as_ref().unwrap_err().kind, ErrorKind::Validation);
    assert_eq!(result.docids(), (0..6).map(DocId).collect::<Vec<_>>());
    assert_eq!(db.stats().doc_count, 6);
}

#[test]
fn sync_persists_without_close() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let db = Database::open_with_schema(schema(), config.clone()).unwrap();
    db.add_docs(&[article("a", "t", 1), article("b", "t", 2)]);
    db.sync().unwrap();

    let stats = db.stats();
    assert_eq!(stats.flushed_size, 0);
    assert_eq!(stats.fixed_fields, 3);
    assert_eq!(stats.name, "articles");
    db.close().unwrap();
    db.close().unwrap();
    drop(db);

    let db = Database::open_with_schema(TableSchema::new("ignored"), config).unwrap();
    assert_eq!(db.table().name(), "articles");
    assert_eq!(db.stats().doc_count, 2);
    let names: Vec<String> = db.all_fields().into_iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["_id", "title", "views"]);
}

#[test]
fn cache_budgets_pass_through_and_memory_is_reported() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_with_schema(schema(), test_config(dir.path())).unwrap();
    assert_eq!(db.cache_size(), (1, 1));

    db.add_docs(&(0..9).map(|i| article(&format!("k{}", i), "t", i)).collect::<Vec<_>>());
    db.get_docs(&(0..9).map(|i| key(&format!("k{}", i))).collect::<Vec<_>>(), &["views"]);
    assert!(db.memory_bytes() > 0);
    assert_eq!(db.stats().memory_bytes, db.memory_bytes());

    db.alter_cache_size(4, 2);
    assert_eq!(db.cache_size(), (4, 2));
    assert_eq!(db.table().cache_size(), (4, 2));
    assert_eq!(
        db.table().field_raw_value(DocId(3), "views").unwrap(),
        3i64.to_ne_bytes().to_vec()
    );
}
