/// FieldVault API Demo
///
/// Walks through the table operations:
/// - Schema creation and dynamic fields
/// - Batch insert, lookup by key and docid
/// - Updates and deletes
/// - Keyword retrieval
/// - Statistics and reopening

use fieldvault::core::config::Config;
use fieldvault::core::database::Database;
use fieldvault::core::types::{DataType, DocId, DocKey, DocRef, Document, Field, WordCount};
use fieldvault::schema::schema::TableSchema;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║        FieldVault - Table API Demo           ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let dir = tempfile::tempdir()?;
    let config = Config::with_path(dir.path());

    // Step 1: Create table
    println!("Creating table...");
    let schema = TableSchema::new("articles")
        .add_string_field("title", true)
        .add_long_field("views")
        .add_double_field("rating")
        .add_field("tags", DataType::MultiString, false);
    let db = Database::open_with_schema(schema, config.clone())?;
    db.add_field("author", DataType::String, false)?;
    println!("Done!\n");

    // Step 2: INSERT
    println!("Step 2: INSERT - Adding documents...");
    let docs = vec![
        create_document("rust-intro", "Rust Programming", 120, 4.5).with_field(Field::string("author", "ann")),
        create_document("db-systems", "Database Systems", 80, 3.9)
            .with_field(Field::multi_string("tags", &["storage", "sql"])),
        create_document("web-dev", "Web Development", 45, 4.1),
        Document::new(""),
    ];
    let result = db.add_docs(&docs);
    println!("  Inserted {} documents, {} rejected", result.success_count(), result.failure_count());
    for (doc, outcome) in docs.iter().zip(&result.results) {
        match outcome {
            Ok(docid) => println!("  {:>12} -> docid {}", doc.key, docid),
            Err(e) => println!("  {:>12?} -> {}", doc.key.to_string(), e),
        }
    }
    println!();

    // Step 3: READ
    println!("Step 3: READ - Fetching documents...");
    let doc = db.get_doc(&DocRef::Key(DocKey::from("rust-intro")), &[])?;
    print_document(&doc);
    let doc = db.get_doc(&DocRef::Id(DocId(1)), &["title", "tags"])?;
    print_document(&doc);
    println!();

    // Step 4: UPDATE
    println!("Step 4: UPDATE - Updating document...");
    db.update_doc(
        &DocRef::Key(DocKey::from("web-dev")),
        &[Field::string("title", "Modern Web Development"), Field::long("views", 46)],
    )?;
    print_document(&db.get_doc(&DocRef::Key(DocKey::from("web-dev")), &["title", "views"])?);
    println!();

    // Step 5: RETRIEVAL
    println!("Step 5: RETRIEVAL - Indexing words...");
    let texts = [
        ("rust-intro", vec![WordCount::new("rust", 3), WordCount::new("programming", 1)]),
        ("db-systems", vec![WordCount::new("database", 2), WordCount::new("programming", 1)]),
        ("web-dev", vec![WordCount::new("web", 2), WordCount::new("rust", 1)]),
    ];
    for (key, words) in &texts {
        db.add_texts(&DocRef::Key(DocKey::from(*key)), words)?;
    }
    for query in [&["rust"][..], &["programming"][..], &["rust", "programming"][..]] {
        let hits = db.query(query)?;
        println!("  {:?}: {:?}", query, hits.iter().map(|d| d.value()).collect::<Vec<_>>());
    }
    println!();

    // Step 6: DELETE
    println!("Step 6: DELETE - Removing document...");
    for outcome in db.delete_docs(&[DocKey::from("db-systems")]) {
        match outcome {
            Ok(docid) => println!("  Deleted docid {}", docid),
            Err(e) => println!("  Delete failed: {}", e),
        }
    }
    println!("  'programming' now: {:?}", db.query(&["programming"])?);
    println!();

    // Step 7: STATISTICS
    println!("Step 7: STATISTICS");
    let stats = db.stats();
    println!("  Documents:      {}", stats.doc_count);
    println!("  Live keys:      {}", stats.live_keys);
    println!("  Deleted:        {}", stats.deleted_docs);
    println!("  Fixed fields:   {} ({} bytes per row)", stats.fixed_fields, stats.row_width);
    println!("  Dynamic fields: {}", stats.dynamic_fields);
    println!("  Terms:          {}", stats.term_count);
    println!("  Memory:         {} bytes (cache budgets {:?} MiB)", stats.memory_bytes, db.cache_size());
    println!();

    // Step 8: REOPEN
    println!("Step 8: REOPEN - Closing and reopening...");
    db.close()?;
    drop(db);
    let db = Database::open(config)?;
    println!("  Reopened with {} documents", db.stats().doc_count);
    print_document(&db.get_doc(&DocRef::Key(DocKey::from("rust-intro")), &[])?);

    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║           Demo Completed!                     ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    Ok(())
}

fn create_document(key: &str, title: &str, views: i64, rating: f64) -> Document {
    Document::new(key)
        .with_field(Field::string("title", title))
        .with_field(Field::long("views", views))
        .with_field(Field::double("rating", rating))
}

fn print_document(doc: &Document) {
    let fields: Vec<String> = doc
        .fields
        .iter()
        .map(|f| format!("{}={}", f.name, f.value))
        .collect();
    println!("  [{}] {}", doc.key, fields.join(", "));
}
