use std::collections::HashSet;
use parking_lot::Mutex;
use rayon::prelude::*;
use crate::column::ColumnOptions;
use crate::column::string::truncate_to_boundary;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DataType, DocId, DocKey, DocRef, Document, Field, FieldValue};
use crate::fields::DocidFieldsIndex;
use crate::schema::schema::{FieldDefinition, TableSchema};
use crate::storage::layout::StorageLayout;
use crate::storage::string_arena::StrPosition;
use crate::storage::value_store::{SegmentedStore, StoreOptions};
use crate::table::key_map::KeyMap;
use crate::table::liveness::DocLiveness;
use crate::table::row::{FixedField, RowLayout};

/// Per-document outcome of a batch insert, in input order
#[derive(Debug)]
pub struct BatchResult {
    pub results: Vec<Result<DocId>>,
}

impl BatchResult {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    pub fn docids(&self) -> Vec<DocId> {
        self.results.iter().filter_map(|r| r.as_ref().ok().copied()).collect()
    }
}

/// A batch document that passed validation
struct Prepared {
    key: DocKey,
    fixed: Vec<Field>,
    dynamic: Vec<Field>,
}

/// Fixed-schema row table with a key map and the dynamic field index.
///
/// Docid n is row n of the row store. Writers are serialized; readers never
/// take the write lock.
pub struct Table {
    name: String,
    schema: TableSchema,
    layout: RowLayout,
    key_field: FixedField,
    max_string_len: usize,
    max_indexed_string_len: usize,
    strict: bool,
    parallel_threshold: usize,
    pool: rayon::ThreadPool,
    store: SegmentedStore,
    keys: KeyMap,
    sparse: DocidFieldsIndex,
    write_lock: Mutex<()>,
}

/// Fill in the key field and check the key type
fn prepare_schema(schema: TableSchema) -> Result<TableSchema> {
    let mut schema = schema;

    if schema.key_field.is_empty() {
        return Err(Error::new(ErrorKind::Schema, "key field name is empty".to_string()));
    }
    if schema.get_field(&schema.key_field).is_none() {
        let key = FieldDefinition::new(&schema.key_field, DataType::String, false);
        schema.fields.insert(0, key);
    }

    let mut seen = HashSet::new();
    schema.fields.retain(|f| {
        if seen.insert(f.name.clone()) {
            true
        } else {
            tracing::warn!(field = %f.name, "duplicate field in schema ignored");
            false
        }
    });

    if let Some(key) = schema.get_field(&schema.key_field) {
        if !matches!(key.data_type, DataType::String | DataType::Int | DataType::Long) {
            return Err(Error::new(
                ErrorKind::Schema,
                format!("key field {} must be STRING, INT or LONG, got {:?}", key.name, key.data_type),
            ));
        }
    }
    Ok(schema)
}

impl Table {
    /// Create or reopen the table stored under `storage`
    pub fn open(storage: &StorageLayout, schema: TableSchema, config: &Config) -> Result<Self> {
        let schema = prepare_schema(schema)?;

        let mut inline = Vec::new();
        let mut multi = Vec::new();
        for def in &schema.fields {
            match def.data_type {
                DataType::MultiString => multi.push(def.clone()),
                DataType::Vector => {
                    tracing::warn!(table = %schema.name, field = %def.name, "vector field is not stored by the table");
                }
                _ => inline.push(def.clone()),
            }
        }
        let layout = RowLayout::new(&inline)?;
        let key_field = layout.get(&schema.key_field).cloned().ok_or_else(|| {
            Error::new(ErrorKind::Schema, format!("key field {} missing from layout", schema.key_field))
        })?;

        let store = SegmentedStore::open(
            &storage.table_dir,
            &schema.name,
            StoreOptions {
                segment_capacity: config.segment_capacity,
                row_width: layout.width(),
                string_block_size: config.string_block_size,
            },
            config.cache_size_mb,
            config.string_cache_size_mb,
        )?;

        let sparse = DocidFieldsIndex::open(
            &storage.columns_dir,
            &storage.fields_index_path(),
            ColumnOptions::from_config(config),
            config.block_docs_num,
            config.flush_interval,
            config.strict_fields,
        )?;
        for def in &multi {
            sparse.add_field(&def.name, def.data_type, def.indexed)?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("table-worker-{}", i))
            .build()
            .map_err(|e| Error::new(ErrorKind::InvalidState, format!("worker pool: {}", e)))?;

        tracing::info!(
            table = %schema.name,
            fixed_fields = layout.len(),
            row_width = layout.width(),
            rows = store.size(),
            "opened table"
        );

        Ok(Table {
            name: schema.name.clone(),
            schema,
            layout,
            key_field,
            max_string_len: config.max_string_len,
            max_indexed_string_len: config.max_indexed_string_len,
            strict: config.strict_fields,
            parallel_threshold: config.parallel_batch_threshold.max(1),
            pool,
            store,
            keys: KeyMap::new(),
            sparse,
            write_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    pub fn fields_index(&self) -> &DocidFieldsIndex {
        &self.sparse
    }

    /// Number of rows, which is also the next docid
    pub fn doc_count(&self) -> u32 {
        self.store.size()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn check_key(&self, key: &DocKey) -> Result<()> {
        if key.is_empty() {
            return Err(Error::new(ErrorKind::Validation, "document key is empty".to_string()));
        }
        match (key, self.key_field.data_type) {
            (DocKey::Str(s), DataType::String) if s.len() > self.string_limit(&self.key_field) => Err(Error::new(
                ErrorKind::Validation,
                format!("key of {} bytes exceeds the key field limit", s.len()),
            )),
            (DocKey::Str(_), DataType::String) => Ok(()),
            (DocKey::Long(_), DataType::Long) => Ok(()),
            (DocKey::Long(v), DataType::Int) if i32::try_from(*v).is_ok() => Ok(()),
            _ => Err(Error::new(
                ErrorKind::Validation,
                format!("key {} does not fit key field {} of type {:?}", key, self.key_field.name, self.key_field.data_type),
            )),
        }
    }

    fn key_value(&self, key: &DocKey) -> FieldValue {
        match (key, self.key_field.data_type) {
            (DocKey::Long(v), DataType::Int) => FieldValue::Int(*v as i32),
            (DocKey::Long(v), _) => FieldValue::Long(*v),
            (DocKey::Str(s), _) => FieldValue::Str(s.clone()),
        }
    }

    fn key_from_value(value: &FieldValue) -> Option<DocKey> {
        match value {
            FieldValue::Str(s) => Some(DocKey::Str(s.clone())),
            FieldValue::Int(v) => Some(DocKey::Long(*v as i64)),
            FieldValue::Long(v) => Some(DocKey::Long(*v)),
            _ => None,
        }
    }

    fn check_fixed(&self, fixed: &FixedField, field: &Field) -> Result<()> {
        if field.data_type() != fixed.data_type {
            return Err(Error::new(
                ErrorKind::Validation,
                format!("field {} is {:?}, got {:?}", fixed.name, fixed.data_type, field.data_type()),
            ));
        }
        Ok(())
    }

    /// Key field value supplied in `fields` must agree with `key`
    fn check_key_field(&self, key: &DocKey, fields: &[Field]) -> Result<bool> {
        let Some(field) = fields.iter().find(|f| f.name == self.key_field.name) else {
            return Ok(false);
        };
        if field.value != self.key_value(key) {
            return Err(Error::new(
                ErrorKind::Validation,
                format!("key field {} = {} disagrees with key {}", self.key_field.name, field.value, key),
            ));
        }
        Ok(true)
    }

    fn string_limit(&self, fixed: &FixedField) -> usize {
        if fixed.indexed {
            self.max_indexed_string_len.min(self.max_string_len)
        } else {
            self.max_string_len
        }
    }

    fn limit_string<'a>(&self, docid: u32, fixed: &FixedField, value: &'a str) -> &'a str {
        let limit = self.string_limit(fixed);
        let stored = truncate_to_boundary(value, limit);
        if stored.len() < value.len() {
            tracing::warn!(
                table = %self.name,
                docid,
                field = %fixed.name,
                len = value.len(),
                max = limit,
                "string too long, truncated"
            );
        }
        stored
    }

    /// Serialize one fixed field into its slot of `row`
    fn write_field(&self, docid: u32, row: &mut [u8], fixed: &FixedField, value: &FieldValue) -> Result<()> {
        match value {
            FieldValue::Str(s) => {
                let stored = self.limit_string(docid, fixed, s);
                let position = if stored.is_empty() {
                    StrPosition::default()
                } else {
                    let (block_id, in_block_pos) = self.store.add_string(stored.as_bytes())?;
                    StrPosition {
                        block_id,
                        in_block_pos,
                        len: stored.len() as u32,
                    }
                };
                position.encode(fixed.slice_mut(row));
            }
            other => {
                let bytes = other.numeric_bytes().ok_or_else(|| {
                    Error::new(
                        ErrorKind::Validation,
                        format!("field {} cannot hold {:?}", fixed.name, other.data_type()),
                    )
                })?;
                fixed.slice_mut(row).copy_from_slice(&bytes);
            }
        }
        Ok(())
    }

    fn encode_row<'a>(&self, docid: u32, fields: impl Iterator<Item = &'a Field>) -> Result<Vec<u8>> {
        let mut row = self.layout.empty_row();
        for field in fields {
            if let Some(fixed) = self.layout.get(&field.name) {
                self.write_field(docid, &mut row, fixed, &field.value)?;
            }
        }
        Ok(row)
    }

    fn read_field(&self, docid: u32, row: &[u8], fixed: &FixedField) -> Result<FieldValue> {
        let raw = fixed.slice(row);
        if fixed.data_type != DataType::String {
            return FieldValue::from_numeric_bytes(fixed.data_type, raw);
        }

        let position = StrPosition::decode(raw);
        let bytes = self.store.get_string(docid, position)?;
        let s = String::from_utf8(bytes).map_err(|_| {
            Error::new(
                ErrorKind::Corruption,
                format!("field {} of docid {} is not UTF-8", fixed.name, docid),
            )
        })?;
        Ok(FieldValue::Str(s))
    }

    fn read_key(&self, docid: u32, row: &[u8]) -> Result<DocKey> {
        let value = self.read_field(docid, row, &self.key_field)?;
        Self::key_from_value(&value).ok_or_else(|| {
            Error::new(ErrorKind::Corruption, format!("docid {} has an unreadable key", docid))
        })
    }

    /// Insert a document holding exactly the fixed-schema fields.
    ///
    /// `docid` must be the next sequential docid. The key field is filled
    /// from `key` when `fields` does not carry it.
    pub fn add(&self, key: &DocKey, fields: &[Field], docid: DocId) -> Result<()> {
        let _guard = self.write_lock.lock();

        self.check_key(key)?;
        let has_key_field = self.check_key_field(key, fields)?;
        let key_field = Field::new(&self.key_field.name, self.key_value(key));

        let count = fields.len() + usize::from(!has_key_field);
        if count != self.layout.len() {
            return Err(Error::new(
                ErrorKind::Validation,
                format!("got {} fields, table {} has {}", count, self.name, self.layout.len()),
            ));
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for field in fields {
            let fixed = self.layout.get(&field.name).ok_or_else(|| {
                Error::new(
                    ErrorKind::Validation,
                    format!("field {} is not part of table {}", field.name, self.name),
                )
            })?;
            self.check_fixed(fixed, field)?;
            if !seen.insert(field.name.as_str()) {
                return Err(Error::new(
                    ErrorKind::Validation,
                    format!("field {} given twice", field.name),
                ));
            }
        }

        let expected = self.store.size();
        if docid.value() != expected {
            return Err(Error::new(
                ErrorKind::Validation,
                format!("docid {} out of order, next is {}", docid, expected),
            ));
        }

        let docid = docid.value();
        self.keys.insert(key, docid);

        let extra = (!has_key_field).then_some(&key_field);
        let stored = self
            .encode_row(docid, fields.iter().chain(extra))
            .and_then(|row| self.store.add(&row));
        if let Err(e) = stored {
            self.keys.remove_if(key, docid);
            tracing::error!(table = %self.name, docid, key = %key, error = %e, "failed to append row");
            return Err(e);
        }

        if docid % 10_000 == 0 {
            tracing::info!(table = %self.name, key = %key, docid, "added document");
        }
        Ok(())
    }

    /// Split a batch document into fixed and dynamic fields and validate both
    fn prepare(&self, doc: &Document) -> Result<Prepared> {
        self.check_key(&doc.key)?;
        let has_key_field = self.check_key_field(&doc.key, &doc.fields)?;

        let mut fixed = Vec::with_capacity(self.layout.len());
        let mut dynamic = Vec::new();
        let mut seen = HashSet::with_capacity(doc.fields.len());

        for field in &doc.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::new(
                    ErrorKind::Validation,
                    format!("field {} given twice in document {}", field.name, doc.key),
                ));
            }
            if let Some(def) = self.layout.get(&field.name) {
                self.check_fixed(def, field)?;
                fixed.push(field.clone());
            } else if self.sparse.contains_field(&field.name) {
                dynamic.push(field.clone());
            } else if self.strict {
                return Err(Error::new(
                    ErrorKind::FieldNotFound,
                    format!("field {} of document {} is not registered", field.name, doc.key),
                ));
            } else {
                tracing::warn!(table = %self.name, key = %doc.key, field = %field.name, "unknown field dropped");
            }
        }
        if !has_key_field {
            fixed.push(Field::new(&self.key_field.name, self.key_value(&doc.key)));
        }

        self.sparse.validate(self.store.size(), &dynamic)?;

        Ok(Prepared {
            key: doc.key.clone(),
            fixed,
            dynamic,
        })
    }

    /// Insert many documents. Fixed fields a document leaves out are stored
    /// as zero or empty; fields outside the fixed schema go to the dynamic
    /// field index.
    pub fn batch_add(&self, docs: &[Document]) -> BatchResult {
        let _guard = self.write_lock.lock();

        let prepared: Vec<Result<Prepared>> = if docs.len() >= self.parallel_threshold {
            self.pool.install(|| docs.par_iter().map(|doc| self.prepare(doc)).collect())
        } else {
            docs.iter().map(|doc| self.prepare(doc)).collect()
        };

        let first = self.store.size();
        let mut next = first;
        let mut results: Vec<Result<DocId>> = Vec::with_capacity(docs.len());
        let mut accepted: Vec<(usize, u32, Prepared)> = Vec::new();
        for (i, p) in prepared.into_iter().enumerate() {
            match p {
                Ok(p) => {
                    accepted.push((i, next, p));
                    results.push(Ok(DocId(next)));
                    next += 1;
                }
                Err(e) => {
                    tracing::error!(table = %self.name, key = %docs[i].key, error = %e, "document rejected");
                    results.push(Err(e));
                }
            }
        }

        // keys first, in parallel for large batches
        if accepted.len() >= self.parallel_threshold {
            self.pool.install(|| {
                accepted.par_iter().for_each(|(_, docid, p)| self.keys.insert_latest(&p.key, *docid))
            });
        } else {
            for (_, docid, p) in &accepted {
                self.keys.insert_latest(&p.key, *docid);
            }
        }

        // rows and dynamic fields strictly in docid order
        let mut failed_at = None;
        for (n, (i, docid, p)) in accepted.iter().enumerate() {
            let stored = self
                .encode_row(*docid, p.fixed.iter())
                .and_then(|row| self.store.add(&row))
                .and_then(|_| self.sparse.put(*docid, &p.dynamic));
            if let Err(e) = stored {
                tracing::error!(table = %self.name, docid, key = %p.key, error = %e, "batch insert failed");
                results[*i] = Err(e);
                failed_at = Some(n);
                break;
            }
            if docid % 10_000 == 0 {
                tracing::info!(table = %self.name, key = %p.key, docid, "added document");
            }
        }

        if let Some(n) = failed_at {
            for (i, docid, p) in &accepted[n..] {
                self.keys.remove_if(&p.key, *docid);
                if results[*i].is_ok() {
                    results[*i] = Err(Error::new(
                        ErrorKind::InvalidState,
                        format!("document {} not stored, batch aborted at an earlier failure", p.key),
                    ));
                }
            }
        }

        tracing::debug!(
            table = %self.name,
            first,
            submitted = docs.len(),
            stored = accepted.len() - failed_at.map_or(0, |n| accepted.len() - n),
            "batch added"
        );
        BatchResult { results }
    }

    /// Rewrite the given fixed fields of `docid`. Strings that grew are
    /// relocated in the arena. Dynamic fields cannot change once set.
    pub fn update(&self, docid: DocId, fields: &[Field]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        let docid = docid.value();
        self.check_docid(docid)?;

        let mut changes: Vec<(&FixedField, &Field)> = Vec::with_capacity(fields.len());
        for field in fields {
            if let Some(fixed) = self.layout.get(&field.name) {
                self.check_fixed(fixed, field)?;
                changes.push((fixed, field));
            } else if self.strict {
                let kind = if self.sparse.contains_field(&field.name) {
                    ErrorKind::Validation
                } else {
                    ErrorKind::FieldNotFound
                };
                return Err(Error::new(
                    kind,
                    format!("field {} cannot be updated on docid {}", field.name, docid),
                ));
            } else {
                tracing::warn!(table = %self.name, docid, field = %field.name, "only fixed fields can be updated, dropped");
            }
        }

        let mut row = self.store.get(docid)?;
        if let Some((_, key_change)) = changes.iter().find(|(f, _)| f.name == self.key_field.name) {
            let current = self.read_field(docid, &row, &self.key_field)?;
            if current != key_change.value {
                return Err(Error::new(
                    ErrorKind::Validation,
                    format!("key field of docid {} cannot change", docid),
                ));
            }
        }

        for (fixed, field) in changes {
            match &field.value {
                FieldValue::Str(s) => {
                    let stored = self.limit_string(docid, fixed, s);
                    let old = StrPosition::decode(fixed.slice(&row));
                    let position = if stored.is_empty() {
                        StrPosition::default()
                    } else {
                        self.store.update_string(docid, stored.as_bytes(), old)?
                    };
                    position.encode(fixed.slice_mut(&mut row));
                }
                other => self.write_field(docid, &mut row, fixed, other)?,
            }
        }
        self.store.update(docid, &row)
    }

    fn check_docid(&self, docid: u32) -> Result<()> {
        let count = self.store.size();
        if docid >= count {
            return Err(Error::new(
                ErrorKind::DocNotFound,
                format!("docid {} not in table {} ({} documents)", docid, self.name, count),
            ));
        }
        Ok(())
    }

    pub fn docid_of(&self, key: &DocKey) -> Option<DocId> {
        self.keys.get(key).map(DocId)
    }

    /// Key stored for `docid`, if the key still maps to it
    pub fn key_of(&self, docid: DocId) -> Result<DocKey> {
        let docid = docid.value();
        self.check_docid(docid)?;
        let row = self.store.get(docid)?;
        let key = self.read_key(docid, &row)?;
        if self.keys.get(&key) != Some(docid) {
            return Err(Error::new(
                ErrorKind::DocNotFound,
                format!("docid {} is no longer mapped", docid),
            ));
        }
        Ok(key)
    }

    fn resolve(&self, doc: &DocRef) -> Result<u32> {
        match doc {
            DocRef::Key(key) => self.keys.get(key).ok_or_else(|| {
                Error::new(ErrorKind::DocNotFound, format!("key {} not found in {}", key, self.name))
            }),
            DocRef::Id(docid) => {
                self.check_docid(docid.value())?;
                Ok(docid.value())
            }
        }
    }

    /// Fetch a document by key or docid. An empty `requested` list returns
    /// every fixed and dynamic field; empty strings are left out.
    pub fn get_doc(&self, doc: &DocRef, requested: &[&str]) -> Result<Document> {
        let docid = self.resolve(doc)?;
        let row = self.store.get(docid)?;
        let key = self.read_key(docid, &row)?;

        let mut fields = Vec::new();
        if requested.is_empty() {
            for fixed in self.layout.fields() {
                if fixed.name == self.key_field.name {
                    continue;
                }
                let value = self.read_field(docid, &row, fixed)?;
                if !matches!(&value, FieldValue::Str(s) if s.is_empty()) {
                    fields.push(Field::new(&fixed.name, value));
                }
            }
            fields.extend(self.sparse.get_all(docid)?);
        } else {
            let mut dynamic = Vec::new();
            for &name in requested {
                match self.layout.get(name) {
                    Some(fixed) => {
                        let value = self.read_field(docid, &row, fixed)?;
                        if !matches!(&value, FieldValue::Str(s) if s.is_empty()) {
                            fields.push(Field::new(name, value));
                        }
                    }
                    None => dynamic.push(name),
                }
            }
            if !dynamic.is_empty() {
                fields.extend(self.sparse.get_fields(docid, &dynamic)?);
            }
        }

        Ok(Document { key, fields })
    }

    fn raw_value(&self, docid: u32, fixed: &FixedField) -> Result<Vec<u8>> {
        self.check_docid(docid)?;
        let row = self.store.get(docid)?;
        let raw = fixed.slice(&row);
        if fixed.data_type == DataType::String {
            return self.store.get_string(docid, StrPosition::decode(raw));
        }
        Ok(raw.to_vec())
    }

    /// Stored bytes of a fixed field: native-endian for numbers, the
    /// string bytes for strings
    pub fn field_raw_value(&self, docid: DocId, name: &str) -> Result<Vec<u8>> {
        let fixed = self.layout.get(name).ok_or_else(|| {
            Error::new(ErrorKind::FieldNotFound, format!("field {} is not in the row of {}", name, self.name))
        })?;
        self.raw_value(docid.value(), fixed)
    }

    /// Same as `field_raw_value`, addressing the field by its row position
    pub fn field_raw_value_by_id(&self, docid: DocId, field_id: usize) -> Result<Vec<u8>> {
        let fixed = self.layout.fields().get(field_id).ok_or_else(|| {
            Error::new(
                ErrorKind::FieldNotFound,
                format!("row of {} has {} fields, no field {}", self.name, self.layout.len(), field_id),
            )
        })?;
        self.raw_value(docid.value(), fixed)
    }

    /// Stored bytes of a dynamic field, one entry per string of a
    /// multi-string value
    pub fn dynamic_raw_value(&self, docid: DocId, name: &str) -> Result<Vec<Vec<u8>>> {
        self.check_docid(docid.value())?;
        let value = self.sparse.get(docid.value(), name)?;
        Ok(match value {
            FieldValue::Str(s) => vec![s.into_bytes()],
            FieldValue::MultiStr(values) => values.into_iter().map(String::into_bytes).collect(),
            other => vec![other.numeric_bytes().unwrap_or_default()],
        })
    }

    pub fn dynamic_raw_value_by_id(&self, docid: DocId, field_id: u8) -> Result<Vec<Vec<u8>>> {
        let name = self.sparse.field_name(field_id).ok_or_else(|| {
            Error::new(ErrorKind::FieldNotFound, format!("no dynamic field with id {}", field_id))
        })?;
        self.dynamic_raw_value(docid, &name)
    }

    /// Remove the key mapping. The row stays in place.
    pub fn delete(&self, key: &DocKey) -> Result<DocId> {
        let docid = self.keys.remove(key).ok_or_else(|| {
            Error::new(ErrorKind::DocNotFound, format!("key {} not found in {}", key, self.name))
        })?;
        tracing::debug!(table = %self.name, key = %key, docid, "deleted key");
        Ok(DocId(docid))
    }

    /// Keep the first `doc_num` rows and rebuild the key map from them,
    /// skipping deleted docids. Returns the number of rows kept.
    pub fn load(&self, doc_num: u32, liveness: &dyn DocLiveness) -> Result<u32> {
        let _guard = self.write_lock.lock();

        let rows = self.store.size();
        let doc_num = if doc_num > rows {
            tracing::warn!(table = %self.name, expected = doc_num, rows, "fewer rows on disk than recorded");
            rows
        } else {
            if doc_num < rows {
                tracing::warn!(table = %self.name, from = rows, to = doc_num, "dropping rows past the last checkpoint");
                self.store.truncate(doc_num)?;
            }
            doc_num
        };
        self.sparse.truncate(doc_num);

        self.keys.clear();
        self.pool.install(|| {
            (0..doc_num)
                .into_par_iter()
                .filter(|&docid| !liveness.is_deleted(docid))
                .try_for_each(|docid| -> Result<()> {
                    let row = self.store.get(docid)?;
                    let key = self.read_key(docid, &row)?;
                    self.keys.insert_latest(&key, docid);
                    Ok(())
                })
        })?;

        tracing::info!(table = %self.name, docs = doc_num, keys = self.keys.len(), "loaded table");
        Ok(doc_num)
    }

    /// Register a dynamic field
    pub fn add_field(&self, name: &str, data_type: DataType, indexed: bool) -> Result<u8> {
        if self.layout.get(name).is_some() || self.schema.get_field(name).is_some_and(|f| f.data_type == DataType::Vector) {
            return Err(Error::new(
                ErrorKind::Schema,
                format!("field {} is already part of the fixed schema of {}", name, self.name),
            ));
        }
        self.sparse.add_field(name, data_type, indexed)
    }

    pub fn field_type(&self, name: &str) -> Option<DataType> {
        if let Some(fixed) = self.layout.get(name) {
            return Some(fixed.data_type);
        }
        if let Some(meta) = self.sparse.field_meta(name) {
            return Some(meta.data_type);
        }
        self.schema.get_field(name).map(|f| f.data_type)
    }

    /// Fixed schema fields followed by the dynamic fields not declared in it
    pub fn all_fields(&self) -> Vec<FieldDefinition> {
        let mut all = self.schema.fields.clone();
        for meta in self.sparse.fields() {
            if self.schema.get_field(&meta.name).is_none() {
                all.push(FieldDefinition::new(&meta.name, meta.data_type, meta.indexed));
            }
        }
        all
    }

    /// Row and string cache budgets in MiB
    pub fn cache_size(&self) -> (usize, usize) {
        self.store.cache_size()
    }

    pub fn alter_cache_size(&self, cache_size_mb: usize, string_cache_size_mb: usize) {
        self.store.alter_cache_size(cache_size_mb, string_cache_size_mb)
    }

    /// Bytes held in memory by the row caches and the docid directory
    pub fn memory_bytes(&self) -> usize {
        self.store.memory_bytes() + self.sparse.memory_bytes()
    }

    pub fn sync(&self) -> Result<()> {
        self.store.sync()?;
        self.sparse.flush()?;
        Ok(())
    }

    /// Sync rows and stop the dynamic field flush task
    pub fn close(&self) -> Result<()> {
        self.store.sync()?;
        self.sparse.close()
    }
}
