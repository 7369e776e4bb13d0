use std::path::Path;
use std::time::Duration;
use fieldvault::core::config::Config;
use fieldvault::core::error::ErrorKind;
use fieldvault::core::types::{DataType, DocId, DocKey, DocRef, Document, Field, FieldValue};
use fieldvault::schema::schema::TableSchema;
use fieldvault::storage::layout::StorageLayout;
use fieldvault::table::{AllLive, DeletedDocs, Table};
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
    TableSchema::new("docs")
        .add_string_field("title", false)
        .add_double_field("score")
        .add_int_field("count")
        .add_field("tags", DataType::MultiString, false)
}

fn open_table(dir: &Path, config: &Config) -> Table {
    let storage = StorageLayout::new(dir.to_path_buf()).unwrap();
    Table::open(&storage, schema(), config).unwrap()
}

fn key(s: &str) -> DocKey {
    DocKey::from(s)
}

fn by_key(s: &str) -> DocRef {
    DocRef::Key(key(s))
}

#[test]
fn add_then_get_renders_values() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));

    table
        .add(
            &key("a"),
            &[Field::string("title", "first"), Field::double("score", 0.5), Field::int("count", 3)],
            DocId(0),
        )
        .unwrap();

    let doc = table.get_doc(&by_key("a"), &[]).unwrap();
    assert_eq!(doc.key, key("a"));
    assert_eq!(
        doc.fields,
        vec![Field::string("title", "first"), Field::double("score", 0.5), Field::int("count", 3)]
    );
    assert_eq!(doc.get_field("score").unwrap().to_string(), "0.500000");
    assert_eq!(doc.get_field("count").unwrap().to_string(), "3");
    assert_eq!(table.doc_count(), 1);
    assert_eq!(table.docid_of(&key("a")), Some(DocId(0)));
}

#[test]
fn add_validates_fields_and_docid() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));
    let full = [Field::string("title", "t"), Field::double("score", 1.0), Field::int("count", 1)];

    // missing a fixed field
    let err = table.add(&key("a"), &full[..2], DocId(0)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    // wrong type
    let wrong = [Field::string("title", "t"), Field::double("score", 1.0), Field::long("count", 1)];
    assert_eq!(table.add(&key("a"), &wrong, DocId(0)).unwrap_err().kind, ErrorKind::Validation);

    // not the next docid
    assert_eq!(table.add(&key("a"), &full, DocId(5)).unwrap_err().kind, ErrorKind::Validation);

    // empty key
    assert_eq!(table.add(&key(""), &full, DocId(0)).unwrap_err().kind, ErrorKind::Validation);

    // key field disagreeing with the key
    let mut with_key = full.to_vec();
    with_key.push(Field::string("_id", "b"));
    assert_eq!(table.add(&key("a"), &with_key, DocId(0)).unwrap_err().kind, ErrorKind::Validation);

    assert_eq!(table.doc_count(), 0);
    assert_eq!(table.key_count(), 0);

    table.add(&key("a"), &full, DocId(0)).unwrap();
    assert_eq!(table.doc_count(), 1);
}

#[test]
fn batch_stores_dynamic_fields_and_zeroes_missing_ones() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));
    table.add_field("color", DataType::String, false).unwrap();

    let docs = vec![
        Document::new("x")
            .with_field(Field::string("title", "hello"))
            .with_field(Field::string("color", "red"))
            .with_field(Field::multi_string("tags", &["a", "b"])),
        Document::new("y").with_field(Field::int("count", 7)),
    ];
    let result = table.batch_add(&docs);
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.docids(), vec![DocId(0), DocId(1)]);

    let x = table.get_doc(&by_key("x"), &[]).unwrap();
    assert_eq!(
        x.fields,
        vec![
            Field::string("title", "hello"),
            Field::double("score", 0.0),
            Field::int("count", 0),
            Field::multi_string("tags", &["a", "b"]),
            Field::string("color", "red"),
        ]
    );

    // empty title left out
    let y = table.get_doc(&by_key("y"), &[]).unwrap();
    assert_eq!(y.fields, vec![Field::double("score", 0.0), Field::int("count", 7)]);

    let picked = table.get_doc(&DocRef::Id(DocId(0)), &["color", "count", "missing"]).unwrap();
    assert_eq!(picked.fields, vec![Field::int("count", 0), Field::string("color", "red")]);
}

#[test]
fn rejected_documents_take_no_docid() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));

    let too_many: Vec<String> = (0..300).map(|i| format!("t{}", i)).collect();
    let docs = vec![
        Document::new("a"),
        Document::new(""),
        Document::new("b").with_field(Field::new("tags", FieldValue::MultiStr(too_many))),
        Document::new("c").with_field(Field::string("score", "not a number")),
        Document::new("d"),
    ];
    let result = table.batch_add(&docs);

    assert_eq!(result.success_count(), 2);
    assert_eq!(result.failure_count(), 3);
    assert_eq!(result.results[0].as_ref().unwrap(), &DocId(0));
    assert_eq!(result.results[1].as_ref().unwrap_err().kind, ErrorKind::Validation);
    assert_eq!(result.results[2].as_ref().unwrap_err().kind, ErrorKind::TooManyStrings);
    assert_eq!(result.results[3].as_ref().unwrap_err().kind, ErrorKind::Validation);
    assert_eq!(result.results[4].as_ref().unwrap(), &DocId(1));

    assert_eq!(table.doc_count(), 2);
    assert_eq!(table.docid_of(&key("b")), None);
    assert_eq!(table.key_of(DocId(1)).unwrap(), key("d"));
}

#[test]
fn parallel_and_sequential_batches_agree() {
    let docs: Vec<Document> = (0..40)
        .map(|i| {
            let mut doc = Document::new(format!("doc-{}", i))
                .with_field(Field::string("title", &format!("title {}", i)))
                .with_field(Field::double("score", i as f64 / 4.0));
            if i % 3 == 0 {
                doc.add_field(Field::multi_string("tags", &["even", "three"]));
            }
            if i % 7 == 0 {
                doc.add_field(Field::string("title", "duplicate"));
            }
            doc
        })
        .collect();

    let mut outcomes = Vec::new();
    for threshold in [1, 1_000] {
        let dir = TempDir::new().unwrap();
        let config = Config {
            parallel_batch_threshold: threshold,
            ..test_config(dir.path())
        };
        let table = open_table(dir.path(), &config);
        let result = table.batch_add(&docs);

        let ids: Vec<Option<DocId>> = result.results.iter().map(|r| r.as_ref().ok().copied()).collect();
        let stored: Vec<Document> = (0..table.doc_count())
            .map(|d| table.get_doc(&DocRef::Id(DocId(d)), &[]).unwrap())
            .collect();
        outcomes.push((ids, stored));
    }

    assert_eq!(outcomes[0], outcomes[1]);
    // every seventh document repeats a field and is rejected
    assert_eq!(outcomes[0].1.len(), 40 - 6);
}

#[test]
fn last_write_wins_on_duplicate_keys() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));

    let docs = vec![
        Document::new("k").with_field(Field::int("count", 1)),
        Document::new("k").with_field(Field::int("count", 2)),
    ];
    assert_eq!(table.batch_add(&docs).success_count(), 2);

    assert_eq!(table.docid_of(&key("k")), Some(DocId(1)));
    let doc = table.get_doc(&by_key("k"), &["count"]).unwrap();
    assert_eq!(doc.fields, vec![Field::int("count", 2)]);

    assert_eq!(table.key_of(DocId(0)).unwrap_err().kind, ErrorKind::DocNotFound);
    assert_eq!(table.key_of(DocId(1)).unwrap(), key("k"));
    assert_eq!(table.key_of(DocId(2)).unwrap_err().kind, ErrorKind::DocNotFound);
}

#[test]
fn integer_keys() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let long_dir = dir.path().join("long");
    let storage = StorageLayout::new(long_dir).unwrap();
    let schema = TableSchema::new("by_long").add_long_field("id").with_key_field("id");
    let table = Table::open(&storage, schema, &config).unwrap();
    table.batch_add(&[Document::new(1_i64 << 40)]);
    assert_eq!(table.docid_of(&DocKey::Long(1 << 40)), Some(DocId(0)));
    assert_eq!(table.key_of(DocId(0)).unwrap(), DocKey::Long(1 << 40));

    let int_dir = dir.path().join("int");
    let storage = StorageLayout::new(int_dir).unwrap();
    let schema = TableSchema::new("by_int").add_int_field("id").with_key_field("id");
    let table = Table::open(&storage, schema, &config).unwrap();
    let result = table.batch_add(&[Document::new(42_i64), Document::new(1_i64 << 40)]);
    assert_eq!(result.results[0].as_ref().unwrap(), &DocId(0));
    assert_eq!(result.results[1].as_ref().unwrap_err().kind, ErrorKind::Validation);
    assert_eq!(table.get_doc(&DocRef::Key(DocKey::Long(42)), &[]).unwrap().key, DocKey::Long(42));

    let err = Table::open(
        &StorageLayout::new(dir.path().join("bad")).unwrap(),
        TableSchema::new("bad").add_double_field("id").with_key_field("id"),
        &config,
    )
    .err()
    .unwrap();
    assert_eq!(err.kind, ErrorKind::Schema);
}

#[test]
fn update_in_place_and_relocated() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));
    let result = table.batch_add(&[Document::new("a").with_field(Field::string("title", "short"))]);
    assert_eq!(result.docids(), vec![DocId(0)]);

    table.update(DocId(0), &[Field::string("title", "tiny"), Field::int("count", 9)]).unwrap();
    let doc = table.get_doc(&by_key("a"), &["title", "count"]).unwrap();
    assert_eq!(doc.fields, vec![Field::string("title", "tiny"), Field::int("count", 9)]);

    let longer = "a considerably longer title than before";
    table.update(DocId(0), &[Field::string("title", longer)]).unwrap();
    let doc = table.get_doc(&by_key("a"), &["title"]).unwrap();
    assert_eq!(doc.fields, vec![Field::string("title", longer)]);

    table.update(DocId(0), &[Field::string("title", "")]).unwrap();
    assert!(table.get_doc(&by_key("a"), &["title"]).unwrap().fields.is_empty());

    let err = table.update(DocId(0), &[Field::string("_id", "b")]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    let err = table.update(DocId(3), &[Field::int("count", 1)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DocNotFound);
    let err = table.update(DocId(0), &[Field::double("count", 1.0)]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[test]
fn load_rebuilds_keys_and_truncates() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    {
        let table = open_table(dir.path(), &config);
        table.add_field("color", DataType::String, false).unwrap();
        let docs: Vec<Document> = (0..6)
            .map(|i| Document::new(format!("k{}", i)).with_field(Field::string("color", "blue")))
            .collect();
        assert_eq!(table.batch_add(&docs).success_count(), 6);
        table.close().unwrap();
    }

    let table = open_table(dir.path(), &config);
    assert_eq!(table.key_count(), 0);
    assert_eq!(table.load(6, &AllLive).unwrap(), 6);
    assert_eq!(table.key_count(), 6);

    let mut deleted = DeletedDocs::new();
    deleted.mark(1);
    assert_eq!(table.load(4, &deleted).unwrap(), 4);
    assert_eq!(table.doc_count(), 4);
    assert_eq!(table.key_count(), 3);
    assert_eq!(table.docid_of(&key("k1")), None);
    assert_eq!(table.docid_of(&key("k4")), None);
    assert_eq!(table.docid_of(&key("k3")), Some(DocId(3)));
    assert!(table.fields_index().get_all(4).unwrap().is_empty());

    // more docs recorded than on disk keeps what is there
    assert_eq!(table.load(100, &AllLive).unwrap(), 4);

    let result = table.batch_add(&[Document::new("k9").with_field(Field::string("color", "green"))]);
    assert_eq!(result.docids(), vec![DocId(4)]);
    let doc = table.get_doc(&by_key("k9"), &["color"]).unwrap();
    assert_eq!(doc.fields, vec![Field::string("color", "green")]);
}

#[test]
fn delete_removes_only_the_key() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));
    table.batch_add(&[Document::new("a"), Document::new("b")]);

    assert_eq!(table.delete(&key("a")).unwrap(), DocId(0));
    assert_eq!(table.delete(&key("a")).unwrap_err().kind, ErrorKind::DocNotFound);
    assert_eq!(table.get_doc(&by_key("a"), &[]).unwrap_err().kind, ErrorKind::DocNotFound);
    assert_eq!(table.doc_count(), 2);
    assert_eq!(table.get_doc(&DocRef::Id(DocId(0)), &[]).unwrap().key, key("a"));
}

#[test]
fn dynamic_field_names_cannot_shadow_fixed_ones() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));

    assert_eq!(table.add_field("title", DataType::String, false).unwrap_err().kind, ErrorKind::Schema);
    let first = table.add_field("color", DataType::String, true).unwrap();
    assert_eq!(table.add_field("color", DataType::String, true).unwrap(), first);

    assert_eq!(table.field_type("title"), Some(DataType::String));
    assert_eq!(table.field_type("tags"), Some(DataType::MultiString));
    assert_eq!(table.field_type("color"), Some(DataType::String));
    assert_eq!(table.field_type("nope"), None);

    let names: Vec<String> = table.all_fields().into_iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["_id", "title", "score", "count", "tags", "color"]);
}

#[test]
fn strict_mode_rejects_unknown_fields() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        strict_fields: true,
        ..test_config(dir.path())
    };
    let table = open_table(dir.path(), &config);

    let result = table.batch_add(&[Document::new("a").with_field(Field::int("ghost", 1))]);
    assert_eq!(result.results[0].as_ref().unwrap_err().kind, ErrorKind::FieldNotFound);
    assert_eq!(table.doc_count(), 0);
}

#[test]
fn raw_values_of_fixed_fields() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));
    table
        .add(
            &key("a"),
            &[Field::string("title", "first"), Field::double("score", 0.5), Field::int("count", 3)],
            DocId(0),
        )
        .unwrap();

    assert_eq!(table.field_raw_value(DocId(0), "title").unwrap(), b"first".to_vec());
    assert_eq!(table.field_raw_value(DocId(0), "score").unwrap(), 0.5f64.to_ne_bytes().to_vec());
    assert_eq!(table.field_raw_value(DocId(0), "count").unwrap(), 3i32.to_ne_bytes().to_vec());

    let count_id = table.layout().fields().iter().position(|f| f.name == "count").unwrap();
    assert_eq!(table.field_raw_value_by_id(DocId(0), count_id).unwrap(), 3i32.to_ne_bytes().to_vec());

    assert_eq!(table.field_raw_value(DocId(0), "missing").unwrap_err().kind, ErrorKind::FieldNotFound);
    assert_eq!(
        table.field_raw_value_by_id(DocId(0), table.layout().len()).unwrap_err().kind,
        ErrorKind::FieldNotFound
    );
    assert_eq!(table.field_raw_value(DocId(1), "count").unwrap_err().kind, ErrorKind::DocNotFound);
}

#[test]
fn raw_values_of_dynamic_fields() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));
    let color_id = table.add_field("color", DataType::String, false).unwrap();
    table.add_field("rank", DataType::Long, false).unwrap();

    let docs = vec![Document::new("x")
        .with_field(Field::string("color", "red"))
        .with_field(Field::long("rank", -9))
        .with_field(Field::multi_string("tags", &["a", "bc"]))];
    assert_eq!(table.batch_add(&docs).success_count(), 1);

    assert_eq!(table.dynamic_raw_value(DocId(0), "color").unwrap(), vec![b"red".to_vec()]);
    assert_eq!(table.dynamic_raw_value_by_id(DocId(0), color_id).unwrap(), vec![b"red".to_vec()]);
    assert_eq!(table.dynamic_raw_value(DocId(0), "rank").unwrap(), vec![(-9i64).to_ne_bytes().to_vec()]);
    assert_eq!(
        table.dynamic_raw_value(DocId(0), "tags").unwrap(),
        vec![b"a".to_vec(), b"bc".to_vec()]
    );

    assert_eq!(table.dynamic_raw_value(DocId(0), "nope").unwrap_err().kind, ErrorKind::FieldNotFound);
    assert_eq!(table.dynamic_raw_value_by_id(DocId(0), 200).unwrap_err().kind, ErrorKind::FieldNotFound);
    assert_eq!(table.dynamic_raw_value(DocId(3), "color").unwrap_err().kind, ErrorKind::DocNotFound);
}

#[test]
fn cache_budgets_and_memory() {
    let dir = TempDir::new().unwrap();
    let table = open_table(dir.path(), &test_config(dir.path()));
    assert_eq!(table.cache_size(), (1, 1));

    let docs: Vec<Document> = (0..10)
        .map(|i| Document::new(format!("k{}", i)).with_field(Field::int("count", i)))
        .collect();
    assert_eq!(table.batch_add(&docs).success_count(), 10);
    for i in 0..10 {
        table.get_doc(&DocRef::Id(DocId(i)), &["count"]).unwrap();
    }
    let warm = table.memory_bytes();
    assert!(warm > 0);

    table.alter_cache_size(0, 0);
    assert_eq!(table.cache_size(), (0, 0));
    assert!(table.memory_bytes() <= warm);
    let doc = table.get_doc(&DocRef::Id(DocId(7)), &["count"]).unwrap();
    assert_eq!(doc.fields, vec![Field::int("count", 7)]);
}
