pub mod row;
pub mod key_map;
pub mod liveness;
pub mod table;

pub use liveness::{AllLive, DeletedDocs, DocLiveness};
pub use table::{BatchResult, Table};
