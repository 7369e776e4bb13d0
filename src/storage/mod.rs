pub mod layout;
pub mod segment;
pub mod string_arena;
pub mod value_store;
pub mod checkpoint;
pub mod file_lock;
