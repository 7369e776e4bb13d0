pub mod core;
pub mod storage;
pub mod schema;
pub mod column;
pub mod fields;
pub mod table;
pub mod index;
pub mod writer;

/*
┌────────────────────────────────────────────────────────────────────────────────────────┐
│                              FIELDVAULT STRUCT ARCHITECTURE                             │
└────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── CORE LAYER ─────────────────────────────────────┐
│                                                                                         │
│  ┌──────────────────────────────────────────────────────────────────────────────────┐  │
│  │                               struct Database                                     │  │
│  │ config: Config                         // Paths, store sizes, limits             │  │
│  │ storage: Arc<StorageLayout>            // table/ col_table/ meta/                │  │
│  │ table: Table                           // Rows + key map + dynamic fields        │  │
│  │ retrieval: RwLock<InvertedIndex>       // Keyword postings, memory only          │  │
│  │ deleted: RwLock<DeletedDocs>           // Roaring bitmap of deleted docids       │  │
│  │ _lock: FileLock                        // One writer per directory               │  │
│  └──────────────────────────────────────────────────────────────────────────────────┘  │
│                                                                                         │
│  ┌──────────────────┐  ┌────────────────────┐  ┌─────────────────────────────────────┐ │
│  │ struct Document  │  │ enum FieldValue    │  │ struct TableStats                   │ │
│  │ • key: DocKey    │  │ • Int(i32)         │  │ • doc_count / live_keys / deleted   │ │
│  │ • fields: Vec<   │  │ • Long(i64)        │  │ • fixed_fields / dynamic_fields     │ │
│  │     Field>       │  │ • Float(f32)       │  │ • directory_capacity / flushed_size │ │
│  └──────────────────┘  │ • Double(f64)      │  │ • term_count                        │ │
│                        │ • Str(String)      │  └─────────────────────────────────────┘ │
│  ┌──────────────────┐  │ • MultiStr(Vec<>)  │                                          │
│  │ struct DocId     │  │ • Vector(Vec<f32>) │                                          │
│  │ • 0: u32         │  └────────────────────┘                                          │
│  └──────────────────┘                                                                  │
└─────────────────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────────────── TABLE LAYER ────────────────────────────────────┐
│                                                                                         │
│  ┌──────────────────────────────────────────────────────────────────────────────────┐  │
│  │                                 struct Table                                      │  │
│  │ layout: RowLayout                      // Offset + width of every fixed field    │  │
│  │ store: SegmentedStore                  // Row n == docid n                       │  │
│  │ keys: KeyMap                           // DashMap<u64, u32>, ahash for strings   │  │
│  │ sparse: DocidFieldsIndex               // Fields added after creation            │  │
│  │ write_lock: Mutex<()>                  // Single writer                          │  │
│  └──────────────────────────────────────────────────────────────────────────────────┘  │
│                                                                                         │
│  add / batch_add ──► fixed fields ──► row bytes ──► SegmentedStore                      │
│                  └─► other fields ──► DocidFieldsIndex::put                             │
└─────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── FIELDS LAYER ────────────────────────────────────┐
│                                                                                         │
│  ┌────────────────────────────┐   ┌────────────────────────────────────────────────┐   │
│  │ struct DocidFieldsIndex    │   │ struct SparseDirectory                          │   │
│  │ • directory: Arc<Sparse..> │──►│ • catalog: RwLock<Catalog>  name ─► field_id    │   │
│  │ • flusher: FlushTask       │   │ • records: RwLock<Vec<Option<Box<[u8]>>>>       │   │
│  └────────────────────────────┘   │     [k][field_id x k][value_id u32 LE x k]      │   │
│                                   └────────────────────────────────────────────────┘   │
│  ┌──────────────────────────────────────────────────────────────────────────────────┐  │
│  │ enum FieldColumn: Fixed(FixedColumn) | Str(StringColumn) | MultiStr(..) | Vector  │  │
│  └──────────────────────────────────────────────────────────────────────────────────┘  │
└─────────────────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────────── STORAGE LAYER ────────────────────────────────────┐
│                                                                                         │
│  ┌───────────────────────┐  ┌──────────────────────┐  ┌──────────────────────────────┐ │
│  │ struct SegmentedStore │  │ struct Segment       │  │ struct StringArena           │ │
│  │ • segments: Vec<Arc>  │  │ • header (bincode)   │  │ • blocks: Vec<Arc<Block>>    │ │
│  │ • cache: LruCache     │  │ • rows: fixed width  │  │ • cache: LruCache            │ │
│  │ • strings: StringArena│  └──────────────────────┘  └──────────────────────────────┘ │
│  └───────────────────────┘                                                             │
│  ┌───────────────────────┐  ┌──────────────────────┐  ┌──────────────────────────────┐ │
│  │ struct Checkpoint     │  │ struct FileLock      │  │ struct StorageLayout         │ │
│  │ • schema, doc_count   │  │ • flock(LOCK_EX)     │  │ • table/ col_table/ meta/    │ │
│  └───────────────────────┘  └──────────────────────┘  └──────────────────────────────┘ │
└─────────────────────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────────────── INDEX LAYER ─────────────────────────────────────┐
│                                                                                         │
│  struct InvertedIndex { postings: HashMap<String, PostingList> }                        │
│  struct PostingList   { docids: Vec<u32>, freqs: Vec<u8> }   ascending docids           │
│  query: one forward cursor per word, pivot list holds the candidate                     │
└─────────────────────────────────────────────────────────────────────────────────────────┘
*/
