use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::layout::segment_path;
use crate::storage::segment::{Segment, SegmentHeader};
use crate::storage::string_arena::{StrPosition, StringArena};

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub segment_capacity: u32,
    pub row_width: usize,
    pub string_block_size: u32,
}

/// Append-only fixed-width row storage partitioned into capacity-bounded
/// segment files, with a companion string arena and LRU caches over sealed
/// segments and blocks.
///
/// Row ids are implicit: the n-th row ever added has id n. Appends are
/// serialized internally; reads of committed rows never wait on an append
/// beyond the file handle of the segment being written.
pub struct SegmentedStore {
    name: String,
    dir: PathBuf,
    options: StoreOptions,
    segments: RwLock<Vec<Arc<Segment>>>,
    size: AtomicU32,
    cache: Mutex<LruCache<u32, Arc<Vec<u8>>>>,
    cache_size_mb: AtomicUsize,
    generation: AtomicU64,   // bumped under the cache lock on every row rewrite
    strings: StringArena,
    append_lock: Mutex<()>,
}

fn cache_capacity(cache_size_mb: usize, options: &StoreOptions) -> NonZeroUsize {
    let segment_bytes = options.segment_capacity as usize * options.row_width;
    let cached_segments = (cache_size_mb * 1024 * 1024) / segment_bytes.max(1);
    NonZeroUsize::new(cached_segments.max(1)).unwrap_or(NonZeroUsize::MIN)
}

impl SegmentedStore {
    pub fn open(
        dir: &Path,
        name: &str,
        options: StoreOptions,
        cache_size_mb: usize,
        string_cache_size_mb: usize,
    ) -> Result<Self> {
        if options.row_width == 0 || options.segment_capacity == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("Store {} needs a non-zero row width and segment capacity", name),
            ));
        }
        fs::create_dir_all(dir)?;

        let header = SegmentHeader::new(options.row_width as u32, options.segment_capacity);
        let mut segments: Vec<Arc<Segment>> = Vec::new();
        let mut size = 0u32;
        loop {
            let segment_no = segments.len() as u32;
            let path = segment_path(dir, name, segment_no);
            if !path.exists() {
                break;
            }
            if let Some(prev) = segments.last() {
                if !prev.is_full() {
                    return Err(Error::new(
                        ErrorKind::Corruption,
                        format!("Segment {} of {} is followed by another but not full", prev.segment_no, name),
                    ));
                }
            }
            let segment = Segment::open(&path, segment_no, header)?;
            size += segment.rows();
            segments.push(Arc::new(segment));
        }

        let cap = cache_capacity(cache_size_mb, &options);

        let strings = StringArena::open(dir, name, options.string_block_size, string_cache_size_mb)?;

        tracing::info!(
            store = name,
            rows = size,
            segments = segments.len(),
            row_width = options.row_width,
            "opened segmented store"
        );

        Ok(SegmentedStore {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            options,
            segments: RwLock::new(segments),
            size: AtomicU32::new(size),
            cache: Mutex::new(LruCache::new(cap)),
            cache_size_mb: AtomicUsize::new(cache_size_mb),
            generation: AtomicU64::new(0),
            strings,
            append_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_width(&self) -> usize {
        self.options.row_width
    }

    /// Number of committed rows, which is also the next row id
    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    fn locate(&self, row_id: u32) -> (u32, u32) {
        let cap = self.options.segment_capacity;
        (row_id / cap, row_id % cap)
    }

    fn check_width(&self, row: &[u8]) -> Result<()> {
        if row.len() != self.options.row_width {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!(
                    "Row of {} bytes does not match width {} of {}",
                    row.len(), self.options.row_width, self.name
                ),
            ));
        }
        Ok(())
    }

    fn check_row(&self, row_id: u32) -> Result<()> {
        let size = self.size();
        if row_id >= size {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                format!("Row {} out of range, {} holds {} rows", row_id, self.name, size),
            ));
        }
        Ok(())
    }

    fn segment(&self, segment_no: u32) -> Result<Arc<Segment>> {
        self.segments.read().get(segment_no as usize).cloned().ok_or_else(|| {
            Error::new(
                ErrorKind::OutOfRange,
                format!("Segment {} missing in {}", segment_no, self.name),
            )
        })
    }

    /// Append one row and return its id
    pub fn add(&self, row: &[u8]) -> Result<u32> {
        self.check_width(row)?;
        let _lock = self.append_lock.lock();

        let row_id = self.size();
        let (segment_no, _) = self.locate(row_id);

        let segment = {
            let mut segments = self.segments.write();
            if segment_no as usize == segments.len() {
                let path = segment_path(&self.dir, &self.name, segment_no);
                let header = SegmentHeader::new(self.options.row_width as u32, self.options.segment_capacity);
                segments.push(Arc::new(Segment::create(&path, segment_no, header)?));
                tracing::debug!(store = %self.name, segment_no, "opened new segment");
            }
            segments[segment_no as usize].clone()
        };

        segment.append(row)?;
        self.size.store(row_id + 1, Ordering::Release);
        Ok(row_id)
    }

    pub fn get(&self, row_id: u32) -> Result<Vec<u8>> {
        self.check_row(row_id)?;
        let (segment_no, pos) = self.locate(row_id);
        let segment = self.segment(segment_no)?;

        if !segment.is_full() {
            return segment.read(pos);
        }

        let data = self.cached_segment(segment_no, &segment)?;
        let width = self.options.row_width;
        let start = pos as usize * width;
        Ok(data[start..start + width].to_vec())
    }

    fn cached_segment(&self, segment_no: u32, segment: &Segment) -> Result<Arc<Vec<u8>>> {
        if let Some(data) = self.cache.lock().get(&segment_no) {
            return Ok(data.clone());
        }
        let generation = self.generation.load(Ordering::Acquire);
        let data = Arc::new(segment.read_all()?);

        // a rewrite since the read makes this copy stale
        let mut cache = self.cache.lock();
        if self.generation.load(Ordering::Acquire) == generation {
            cache.put(segment_no, data.clone());
        }
        Ok(data)
    }

    fn invalidate(&self, segment_no: Option<u32>) {
        let mut cache = self.cache.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        match segment_no {
            Some(segment_no) => {
                cache.pop(&segment_no);
            }
            None => cache.clear(),
        }
    }

    pub fn update(&self, row_id: u32, row: &[u8]) -> Result<()> {
        self.check_width(row)?;
        self.check_row(row_id)?;
        let (segment_no, pos) = self.locate(row_id);
        let segment = self.segment(segment_no)?;
        segment.write(pos, row)?;
        self.invalidate(Some(segment_no));
        Ok(())
    }

    pub fn add_string(&self, bytes: &[u8]) -> Result<(u32, u32)> {
        self.strings.add(bytes)
    }

    pub fn get_string(&self, row_id: u32, position: StrPosition) -> Result<Vec<u8>> {
        self.strings.get(position).map_err(|e| {
            Error::new(e.kind, format!("row {} of {}: {}", row_id, self.name, e.context))
        })
    }

    /// Rewrite the string referenced by `row_id`. Bytes that fit in the old
    /// slot stay in place, longer values are appended and relocated.
    pub fn update_string(&self, row_id: u32, bytes: &[u8], old: StrPosition) -> Result<StrPosition> {
        if bytes.len() as u64 <= old.len as u64 && old.len > 0 {
            self.strings.overwrite(old.block_id, old.in_block_pos, bytes)?;
            return Ok(StrPosition {
                block_id: old.block_id,
                in_block_pos: old.in_block_pos,
                len: bytes.len() as u32,
            });
        }

        let (block_id, in_block_pos) = self.strings.add(bytes)?;
        tracing::trace!(store = %self.name, row_id, block_id, in_block_pos, "relocated string");
        Ok(StrPosition {
            block_id,
            in_block_pos,
            len: bytes.len() as u32,
        })
    }

    /// Drop every row from `count` onwards
    pub fn truncate(&self, count: u32) -> Result<()> {
        let _lock = self.append_lock.lock();
        let size = self.size();
        if count >= size {
            return Ok(());
        }

        let cap = self.options.segment_capacity;
        let keep = count.div_ceil(cap) as usize;

        let mut segments = self.segments.write();
        for segment in segments.drain(keep..) {
            fs::remove_file(&segment.path)?;
        }
        if let Some(last) = segments.last() {
            last.truncate(count - (keep as u32 - 1) * cap)?;
        }
        self.size.store(count, Ordering::Release);
        self.invalidate(None);

        tracing::info!(store = %self.name, from = size, to = count, "truncated segmented store");
        Ok(())
    }

    /// Row and string cache budgets in MiB
    pub fn cache_size(&self) -> (usize, usize) {
        (self.cache_size_mb.load(Ordering::Acquire), self.strings.cache_size_mb())
    }

    /// Change both cache budgets at runtime
    pub fn alter_cache_size(&self, cache_size_mb: usize, string_cache_size_mb: usize) {
        let cap = cache_capacity(cache_size_mb, &self.options);
        self.cache.lock().resize(cap);
        self.cache_size_mb.store(cache_size_mb, Ordering::Release);
        self.strings.resize_cache(string_cache_size_mb);
        tracing::info!(store = %self.name, cache_size_mb, segments = cap.get(), "resized segment cache");
    }

    /// Bytes held by the segment and string block caches
    pub fn memory_bytes(&self) -> usize {
        let segments: usize = self.cache.lock().iter().map(|(_, data)| data.len()).sum();
        segments + self.strings.cached_bytes()
    }

    /// Segments currently cached
    pub fn cached_segments(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn sync(&self) -> Result<()> {
        for segment in self.segments.read().iter() {
            segment.sync()?;
        }
        self.strings.sync()
    }
}
