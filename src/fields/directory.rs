use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use parking_lot::{Mutex, RwLock};
use crate::column::{ColumnOptions, FieldColumn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DataType, Field, FieldValue};
use crate::fields::persist::{self, FieldMeta, IndexImage};
use crate::fields::record::{self, RecordView};

pub const MAX_DYNAMIC_FIELDS: usize = 255;

struct CatalogEntry {
    meta: FieldMeta,
    column: Arc<FieldColumn>,
}

#[derive(Default)]
struct Catalog {
    by_name: HashMap<String, u8>,
    by_id: BTreeMap<u8, CatalogEntry>,
}

impl Catalog {
    fn next_id(&self) -> Option<u8> {
        match self.by_id.keys().next_back() {
            None => Some(0),
            Some(&last) => last.checked_add(1),
        }
    }

    fn insert(&mut self, meta: FieldMeta, column: FieldColumn) {
        self.by_name.insert(meta.name.clone(), meta.field_id);
        self.by_id.insert(meta.field_id, CatalogEntry { meta, column: Arc::new(column) });
    }
}

struct Records {
    slots: Vec<Option<Box<[u8]>>>,
    size: u32,
}

impl Records {
    fn ensure(&mut self, docid: u32) {
        let needed = docid as usize + 1;
        if needed <= self.slots.len() {
            return;
        }
        let mut capacity = self.slots.len().max(1);
        while capacity < needed {
            capacity *= 2;
        }
        tracing::debug!(from = self.slots.len(), to = capacity, "growing docid directory");
        self.slots.resize(capacity, None);
    }
}

/// A field of a put, resolved against the catalog
struct Resolved<'a> {
    field_id: u8,
    column: Arc<FieldColumn>,
    value: &'a FieldValue,
}

/// Per-docid directory of `(field_id, value_id)` pairs over the dynamic
/// field columns, plus the catalog of those fields.
pub struct SparseDirectory {
    columns_dir: PathBuf,
    index_path: PathBuf,
    options: ColumnOptions,
    strict: bool,
    catalog: RwLock<Catalog>,
    records: RwLock<Records>,
    version: AtomicU64,
    flushed_version: AtomicU64,
    flushed_size: AtomicU32,
    flush_lock: Mutex<()>,
}

impl SparseDirectory {
    /// Open the directory, replaying `index_path` when it exists
    pub fn open(
        columns_dir: &Path,
        index_path: &Path,
        options: ColumnOptions,
        initial_capacity: u32,
        strict: bool,
    ) -> Result<Self> {
        let image = persist::load(index_path)?;

        let mut catalog = Catalog::default();
        let mut slots: Vec<Option<Box<[u8]>>> = Vec::new();
        let mut size = 0u32;
        let mut flushed_size = 0u32;

        if let Some(image) = image {
            flushed_size = image.flushed_size();
            let (restored, empty_columns) = Self::restore_catalog(columns_dir, &options, image.fields)?;
            catalog = restored;

            let capacity = Self::restored_capacity(image.capacity, image.records.len(), initial_capacity);
            slots.resize(capacity, None);
            for (docid, record) in image.records.into_iter().enumerate() {
                let Some(record) = record else { continue };
                if let Some(record) = Self::replay_record(docid as u32, record, &catalog, &empty_columns) {
                    slots[docid] = Some(record);
                    size = docid as u32 + 1;
                }
            }

            tracing::info!(
                fields = catalog.by_id.len(),
                records = flushed_size,
                capacity,
                "loaded docid fields index"
            );
        } else {
            slots.resize(initial_capacity.max(1) as usize, None);
        }

        Ok(SparseDirectory {
            columns_dir: columns_dir.to_path_buf(),
            index_path: index_path.to_path_buf(),
            options,
            strict,
            catalog: RwLock::new(catalog),
            records: RwLock::new(Records { slots, size }),
            version: AtomicU64::new(0),
            flushed_version: AtomicU64::new(0),
            flushed_size: AtomicU32::new(flushed_size),
            flush_lock: Mutex::new(()),
        })
    }

    /// Capacity to reopen with. Doubling keeps a directory under twice its
    /// size, so a persisted capacity past that bound is clamped.
    fn restored_capacity(persisted: u32, records: usize, initial_capacity: u32) -> usize {
        let needed = records.max(initial_capacity.max(1) as usize);
        let bound = needed.max(records.saturating_mul(2));
        let persisted = persisted as usize;
        if persisted > bound {
            tracing::warn!(persisted, bound, records, "persisted directory capacity out of bounds, clamped");
            return bound;
        }
        persisted.max(needed)
    }

    /// Reopen the column of every catalog field. Fields whose column
    /// directory is gone get a fresh empty column and their id is returned
    /// so replay can drop the stale pairs.
    fn restore_catalog(
        columns_dir: &Path,
        options: &ColumnOptions,
        fields: Vec<FieldMeta>,
    ) -> Result<(Catalog, HashSet<u8>)> {
        let mut catalog = Catalog::default();
        let mut empty_columns = HashSet::new();

        for meta in fields {
            if catalog.by_name.contains_key(&meta.name) || catalog.by_id.contains_key(&meta.field_id) {
                tracing::warn!(field = %meta.name, field_id = meta.field_id, "duplicate catalog entry skipped");
                continue;
            }

            let dir = columns_dir.join(&meta.name);
            if meta.data_type != DataType::Vector && !dir.exists() {
                tracing::warn!(field = %meta.name, "column directory missing, recreating empty column");
                empty_columns.insert(meta.field_id);
            }

            let column = FieldColumn::open(&dir, &meta.name, meta.data_type, options)?;
            catalog.insert(meta, column);
        }
        Ok((catalog, empty_columns))
    }

    fn replay_record(
        docid: u32,
        record: Box<[u8]>,
        catalog: &Catalog,
        empty_columns: &HashSet<u8>,
    ) -> Option<Box<[u8]>> {
        let Some(view) = RecordView::parse(&record) else {
            tracing::warn!(docid, len = record.len(), "malformed docid record skipped");
            return None;
        };

        let mut kept: Vec<(u8, u32)> = Vec::with_capacity(view.len());
        for (field_id, value_id) in view.iter() {
            let Some(entry) = catalog.by_id.get(&field_id) else {
                tracing::warn!(docid, field_id, "pair references unknown field, skipped");
                continue;
            };
            if empty_columns.contains(&field_id) {
                continue;
            }
            if value_id >= entry.column.current_max_id() {
                tracing::warn!(
                    docid,
                    field = %entry.meta.name,
                    value_id,
                    committed = entry.column.current_max_id(),
                    "pair references an uncommitted value, skipped"
                );
                continue;
            }
            kept.push((field_id, value_id));
        }

        if kept.is_empty() {
            return None;
        }
        if kept.len() == view.len() {
            return Some(record);
        }
        Some(record::encode(&mut kept))
    }

    /// Register a dynamic field and return its id. A name already in the
    /// catalog returns the existing id.
    pub fn add_field(&self, name: &str, data_type: DataType, indexed: bool) -> Result<u8> {
        if name.is_empty() || name.len() > u8::MAX as usize || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(Error::new(
                ErrorKind::Schema,
                format!("invalid dynamic field name {:?}", name),
            ));
        }

        let mut catalog = self.catalog.write();
        if let Some(&field_id) = catalog.by_name.get(name) {
            tracing::info!(field = name, field_id, "field already registered");
            return Ok(field_id);
        }
        if catalog.by_id.len() >= MAX_DYNAMIC_FIELDS {
            return Err(Error::new(
                ErrorKind::Schema,
                format!("cannot add field {}, at most {} dynamic fields", name, MAX_DYNAMIC_FIELDS),
            ));
        }
        let field_id = catalog.next_id().ok_or_else(|| {
            Error::new(ErrorKind::Schema, format!("no field id left for {}", name))
        })?;

        let column = FieldColumn::open(&self.columns_dir.join(name), name, data_type, &self.options)?;
        if data_type == DataType::Vector {
            tracing::warn!(field = name, "vector field registered without storage");
        }
        catalog.insert(
            FieldMeta {
                name: name.to_string(),
                field_id,
                data_type,
                indexed,
            },
            column,
        );
        self.version.fetch_add(1, Ordering::AcqRel);

        tracing::info!(field = name, field_id, data_type = ?data_type, "added dynamic field");
        Ok(field_id)
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.catalog.read().by_name.contains_key(name)
    }

    pub fn field_meta(&self, name: &str) -> Option<FieldMeta> {
        let catalog = self.catalog.read();
        let field_id = catalog.by_name.get(name)?;
        catalog.by_id.get(field_id).map(|e| e.meta.clone())
    }

    pub fn field_name(&self, field_id: u8) -> Option<String> {
        self.catalog.read().by_id.get(&field_id).map(|e| e.meta.name.clone())
    }

    /// Catalog in field-id order
    pub fn fields(&self) -> Vec<FieldMeta> {
        self.catalog.read().by_id.values().map(|e| e.meta.clone()).collect()
    }

    fn unknown_field(&self, docid: u32, name: &str) -> Result<()> {
        if self.strict {
            return Err(Error::new(
                ErrorKind::FieldNotFound,
                format!("field {} is not registered (docid {})", name, docid),
            ));
        }
        tracing::warn!(docid, field = name, "unknown dynamic field dropped");
        Ok(())
    }

    fn resolve<'a>(&self, docid: u32, fields: &'a [Field]) -> Result<Vec<Resolved<'a>>> {
        let catalog = self.catalog.read();
        let mut seen = HashSet::with_capacity(fields.len());
        let mut resolved = Vec::with_capacity(fields.len());

        for field in fields {
            let Some(&field_id) = catalog.by_name.get(&field.name) else {
                self.unknown_field(docid, &field.name)?;
                continue;
            };
            let Some(entry) = catalog.by_id.get(&field_id) else { continue };

            if !entry.column.is_stored() {
                tracing::warn!(docid, field = %field.name, "vector value skipped by the field index");
                continue;
            }
            if !seen.insert(field_id) {
                tracing::warn!(docid, field = %field.name, "field given twice, later value dropped");
                continue;
            }
            resolved.push(Resolved {
                field_id,
                column: entry.column.clone(),
                value: &field.value,
            });
        }
        Ok(resolved)
    }

    fn check_values(docid: u32, resolved: &[Resolved]) -> Result<()> {
        for r in resolved {
            r.column.validate(r.value).map_err(|e| {
                Error::new(e.kind, format!("docid {} field id {}: {}", docid, r.field_id, e.context))
            })?;
        }
        Ok(())
    }

    /// Check a put without writing anything
    pub fn validate(&self, docid: u32, fields: &[Field]) -> Result<()> {
        let resolved = self.resolve(docid, fields)?;
        Self::check_values(docid, &resolved)
    }

    /// Store the dynamic fields of `docid`. Every value is validated before
    /// any column is written.
    pub fn put(&self, docid: u32, fields: &[Field]) -> Result<()> {
        let resolved = self.resolve(docid, fields)?;
        if resolved.is_empty() {
            return Ok(());
        }
        Self::check_values(docid, &resolved)?;

        let mut pairs = Vec::with_capacity(resolved.len());
        for r in &resolved {
            let value_id = r.column.put(r.value)?;
            pairs.push((r.field_id, value_id));
        }
        let record = record::encode(&mut pairs);

        {
            let mut records = self.records.write();
            records.ensure(docid);
            if records.slots[docid as usize].is_some() {
                tracing::debug!(docid, "replacing docid record");
            }
            records.slots[docid as usize] = Some(record);
            records.size = records.size.max(docid + 1);
        }
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Drop the records of every docid at or beyond `doc_count`. Column
    /// values they referenced stay allocated.
    pub fn truncate(&self, doc_count: u32) {
        let mut records = self.records.write();
        if records.size <= doc_count {
            return;
        }
        let dropped = records.size - doc_count;
        for slot in records.slots.iter_mut().skip(doc_count as usize) {
            *slot = None;
        }
        records.size = doc_count;
        drop(records);

        self.version.fetch_add(1, Ordering::AcqRel);
        tracing::warn!(doc_count, dropped, "dropped docid records past the table end");
    }

    /// Pairs stored for `docid`, `None` if the docid lies beyond the directory
    fn pairs(&self, docid: u32) -> Option<Vec<(u8, u32)>> {
        let records = self.records.read();
        let slot = records.slots.get(docid as usize)?;
        Some(
            slot.as_deref()
                .and_then(RecordView::parse)
                .map(|view| view.iter().collect())
                .unwrap_or_default(),
        )
    }

    pub fn get(&self, docid: u32, name: &str) -> Result<FieldValue> {
        let (field_id, column) = {
            let catalog = self.catalog.read();
            let field_id = *catalog.by_name.get(name).ok_or_else(|| {
                Error::new(ErrorKind::FieldNotFound, format!("field {} is not registered", name))
            })?;
            let entry = catalog.by_id.get(&field_id).ok_or_else(|| {
                Error::new(ErrorKind::FieldNotFound, format!("field {} is not registered", name))
            })?;
            (field_id, entry.column.clone())
        };

        let value_id = {
            let records = self.records.read();
            let capacity = records.slots.len();
            let slot = records.slots.get(docid as usize).ok_or_else(|| {
                Error::new(
                    ErrorKind::OutOfRange,
                    format!("docid {} beyond directory capacity {}", docid, capacity),
                )
            })?;
            slot.as_deref()
                .and_then(RecordView::parse)
                .and_then(|view| view.find(field_id))
        };

        let value_id = value_id.ok_or_else(|| {
            Error::new(ErrorKind::FieldNotFound, format!("docid {} has no value for {}", docid, name))
        })?;
        column.get(value_id)
    }

    /// Values of `names` for `docid`. Names the docid does not carry are left out.
    pub fn get_fields(&self, docid: u32, names: &[&str]) -> Result<Vec<Field>> {
        let wanted: Vec<(&str, u8, Arc<FieldColumn>)> = {
            let catalog = self.catalog.read();
            let mut wanted = Vec::with_capacity(names.len());
            for &name in names {
                match catalog.by_name.get(name).and_then(|id| catalog.by_id.get(id)) {
                    Some(entry) => wanted.push((name, entry.meta.field_id, entry.column.clone())),
                    None if self.strict => {
                        return Err(Error::new(
                            ErrorKind::FieldNotFound,
                            format!("field {} is not registered", name),
                        ));
                    }
                    None => tracing::debug!(docid, field = name, "unknown field ignored"),
                }
            }
            wanted
        };

        let found: Vec<(&str, Arc<FieldColumn>, u32)> = {
            let records = self.records.read();
            let view = records
                .slots
                .get(docid as usize)
                .and_then(|slot| slot.as_deref())
                .and_then(RecordView::parse);
            let Some(view) = view else {
                return Ok(Vec::new());
            };
            wanted
                .into_iter()
                .filter_map(|(name, field_id, column)| view.find(field_id).map(|value_id| (name, column, value_id)))
                .collect()
        };

        let mut out = Vec::with_capacity(found.len());
        for (name, column, value_id) in found {
            out.push(Field::new(name, column.get(value_id)?));
        }
        Ok(out)
    }

    /// Every dynamic field `docid` carries, in field-id order
    pub fn get_all(&self, docid: u32) -> Result<Vec<Field>> {
        let Some(pairs) = self.pairs(docid) else {
            return Ok(Vec::new());
        };
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let columns: Vec<(String, Arc<FieldColumn>, u32)> = {
            let catalog = self.catalog.read();
            pairs
                .iter()
                .filter_map(|&(field_id, value_id)| {
                    catalog
                        .by_id
                        .get(&field_id)
                        .map(|e| (e.meta.name.clone(), e.column.clone(), value_id))
                })
                .collect()
        };

        let mut out = Vec::with_capacity(columns.len());
        for (name, column, value_id) in columns {
            out.push(Field::new(&name, column.get(value_id)?));
        }
        Ok(out)
    }

    /// Raw `(field_id, value_id)` pairs of `docid`
    pub fn record_pairs(&self, docid: u32) -> Vec<(u8, u32)> {
        self.pairs(docid).unwrap_or_default()
    }

    pub fn capacity(&self) -> u32 {
        self.records.read().slots.len() as u32
    }

    /// One past the highest docid holding a record
    pub fn size(&self) -> u32 {
        self.records.read().size
    }

    /// Bytes held by the directory slots and their records
    pub fn memory_bytes(&self) -> usize {
        let records = self.records.read();
        let slots = records.slots.capacity() * std::mem::size_of::<Option<Box<[u8]>>>();
        slots + records.slots.iter().flatten().map(|r| r.len()).sum::<usize>()
    }

    pub fn flushed_size(&self) -> u32 {
        self.flushed_size.load(Ordering::Acquire)
    }

    pub fn is_dirty(&self) -> bool {
        self.version.load(Ordering::Acquire) != self.flushed_version.load(Ordering::Acquire)
    }

    /// Persist the catalog and records if anything changed since the last
    /// flush. Returns whether a file was written.
    pub fn flush(&self) -> Result<bool> {
        let _guard = self.flush_lock.lock();
        let version = self.version.load(Ordering::Acquire);
        if version == self.flushed_version.load(Ordering::Acquire) {
            return Ok(false);
        }

        let (fields, columns): (Vec<FieldMeta>, Vec<Arc<FieldColumn>>) = {
            let catalog = self.catalog.read();
            catalog
                .by_id
                .values()
                .map(|e| (e.meta.clone(), e.column.clone()))
                .unzip()
        };
        for column in &columns {
            column.sync()?;
        }

        let image = {
            let records = self.records.read();
            IndexImage {
                capacity: records.slots.len() as u32,
                fields,
                records: records.slots[..records.size as usize].to_vec(),
            }
        };
        persist::dump(&self.index_path, &image)?;

        self.flushed_version.store(version, Ordering::Release);
        self.flushed_size.store(image.flushed_size(), Ordering::Release);
        tracing::debug!(records = image.flushed_size(), fields = image.fields.len(), "flushed docid fields index");
        Ok(true)
    }
}
