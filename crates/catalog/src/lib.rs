//! Tables, indexes, the catalog lookup surface, and the ordered KV engine
//! contract this core consumes (spec §3/§4.2, §6).

pub mod catalog;
pub mod error;
pub mod index;
pub mod kv;
pub mod range;
pub mod schema;
pub mod table;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
pub use kv::{ByteRange, KvEngine};
#[cfg(any(test, feature = "testing"))]
pub use kv::mem::MemKv;
pub use range::{Range, Ranges};
pub use schema::{ColumnDef, IndexDef, PrimaryKey, TableDef};
