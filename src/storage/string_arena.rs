use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::layout::string_block_path;

/// Location of a string inside the arena: `(block_id, in_block_pos, len)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StrPosition {
    pub block_id: u32,
    pub in_block_pos: u32,
    pub len: u32,
}

impl StrPosition {
    pub const SIZE: usize = 12;

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.block_id.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.in_block_pos.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.len.to_ne_bytes());
    }

    pub fn decode(buf: &[u8]) -> Self {
        let word = |i: usize| u32::from_ne_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        StrPosition {
            block_id: word(0),
            in_block_pos: word(4),
            len: word(8),
        }
    }
}

struct StringBlock {
    file: Mutex<File>,
    len: Mutex<u32>,
}

impl StringBlock {
    fn open(path: &Path, create: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(create)
            .read(true)
            .write(true)
            .open(path)?;
        let len = file.metadata()?.len() as u32;
        Ok(StringBlock {
            file: Mutex::new(file),
            len: Mutex::new(len),
        })
    }

    fn len(&self) -> u32 {
        *self.len.lock()
    }

    fn append(&self, bytes: &[u8]) -> Result<u32> {
        let mut len = self.len.lock();
        let pos = *len;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pos as u64))?;
        file.write_all(bytes)?;
        *len += bytes.len() as u32;
        Ok(pos)
    }

    fn read(&self, pos: u32, len: u32) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pos as u64))?;
        file.read_exact(&mut out)?;
        Ok(out)
    }

    fn write_at(&self, pos: u32, bytes: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pos as u64))?;
        file.write_all(bytes)?;
        Ok(())
    }
}

/// Append-only variable-length byte arena split into fixed-size blocks
pub struct StringArena {
    dir: PathBuf,
    name: String,
    block_size: u32,
    blocks: RwLock<Vec<Arc<StringBlock>>>,
    cache: Mutex<LruCache<u32, Arc<Vec<u8>>>>,
    cache_size_mb: AtomicUsize,
    generation: AtomicU64,   // bumped under the cache lock on every overwrite
    append_lock: Mutex<()>,
}

fn cache_capacity(cache_size_mb: usize, block_size: u32) -> NonZeroUsize {
    let cached_blocks = (cache_size_mb * 1024 * 1024) / block_size.max(1) as usize;
    NonZeroUsize::new(cached_blocks.max(1)).unwrap_or(NonZeroUsize::MIN)
}

impl StringArena {
    pub fn open(dir: &Path, name: &str, block_size: u32, cache_size_mb: usize) -> Result<Self> {
        fs::create_dir_all(dir.join("strings"))?;

        let mut blocks = Vec::new();
        loop {
            let path = string_block_path(dir, name, blocks.len() as u32);
            if !path.exists() {
                break;
            }
            blocks.push(Arc::new(StringBlock::open(&path, false)?));
        }
        if blocks.is_empty() {
            let path = string_block_path(dir, name, 0);
            blocks.push(Arc::new(StringBlock::open(&path, true)?));
        }

        let cap = cache_capacity(cache_size_mb, block_size);

        Ok(StringArena {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            block_size,
            blocks: RwLock::new(blocks),
            cache: Mutex::new(LruCache::new(cap)),
            cache_size_mb: AtomicUsize::new(cache_size_mb),
            generation: AtomicU64::new(0),
            append_lock: Mutex::new(()),
        })
    }

    pub fn cache_size_mb(&self) -> usize {
        self.cache_size_mb.load(Ordering::Acquire)
    }

    /// Change the block cache budget. Shrinking evicts least recently used blocks.
    pub fn resize_cache(&self, cache_size_mb: usize) {
        let cap = cache_capacity(cache_size_mb, self.block_size);
        self.cache.lock().resize(cap);
        self.cache_size_mb.store(cache_size_mb, Ordering::Release);
        tracing::info!(store = %self.name, cache_size_mb, blocks = cap.get(), "resized string block cache");
    }

    /// Bytes of the blocks currently cached
    pub fn cached_bytes(&self) -> usize {
        self.cache.lock().iter().map(|(_, data)| data.len()).sum()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.read().len()
    }

    /// Append bytes, returning `(block_id, in_block_pos)`. A string never
    /// straddles two blocks.
    pub fn add(&self, bytes: &[u8]) -> Result<(u32, u32)> {
        let _lock = self.append_lock.lock();

        let (mut block_id, mut block) = {
            let blocks = self.blocks.read();
            let id = blocks.len() as u32 - 1;
            (id, blocks[id as usize].clone())
        };

        let used = block.len();
        if used > 0 && used as u64 + bytes.len() as u64 > self.block_size as u64 {
            block_id += 1;
            let path = string_block_path(&self.dir, &self.name, block_id);
            block = Arc::new(StringBlock::open(&path, true)?);
            self.blocks.write().push(block.clone());
            tracing::debug!(store = %self.name, block_id, "opened new string block");
        }

        let pos = block.append(bytes)?;
        Ok((block_id, pos))
    }

    pub fn get(&self, position: StrPosition) -> Result<Vec<u8>> {
        if position.len == 0 {
            return Ok(Vec::new());
        }

        let (block, sealed) = {
            let blocks = self.blocks.read();
            let block = blocks.get(position.block_id as usize).cloned().ok_or_else(|| {
                Error::new(
                    ErrorKind::OutOfRange,
                    format!("String block {} does not exist in {}", position.block_id, self.name),
                )
            })?;
            (block, (position.block_id as usize) < blocks.len() - 1)
        };

        let end = position.in_block_pos as u64 + position.len as u64;
        if end > block.len() as u64 {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                format!("String at {:?} runs past the end of its block", position),
            ));
        }

        if !sealed {
            return block.read(position.in_block_pos, position.len);
        }

        let data = self.cached_block(position.block_id, &block)?;
        let start = position.in_block_pos as usize;
        Ok(data[start..start + position.len as usize].to_vec())
    }

    fn cached_block(&self, block_id: u32, block: &StringBlock) -> Result<Arc<Vec<u8>>> {
        if let Some(data) = self.cache.lock().get(&block_id) {
            return Ok(data.clone());
        }
        let generation = self.generation.load(Ordering::Acquire);
        let data = Arc::new(block.read(0, block.len())?);

        // an overwrite since the read makes this copy stale
        let mut cache = self.cache.lock();
        if self.generation.load(Ordering::Acquire) == generation {
            cache.put(block_id, data.clone());
        }
        Ok(data)
    }

    /// Overwrite a string in place. The caller guarantees it fits.
    pub fn overwrite(&self, block_id: u32, pos: u32, bytes: &[u8]) -> Result<()> {
        let block = self.blocks.read().get(block_id as usize).cloned().ok_or_else(|| {
            Error::new(
                ErrorKind::OutOfRange,
                format!("String block {} does not exist in {}", block_id, self.name),
            )
        })?;
        block.write_at(pos, bytes)?;

        let mut cache = self.cache.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        cache.pop(&block_id);
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        for block in self.blocks.read().iter() {
            block.file.lock().sync_all()?;
        }
        Ok(())
    }
}
