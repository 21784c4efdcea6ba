pub mod chunk_table;
pub mod erased;
pub mod sparse_table;

pub use chunk_table::ChunkedTable;
pub use erased::{ErasedPlainStore, ErasedRefStore};
pub use sparse_table::SparseTable;
