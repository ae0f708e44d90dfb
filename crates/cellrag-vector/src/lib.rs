//! Vector index and its LanceDB-backed persistence.

pub mod index;
pub mod schema;
pub mod store;
pub mod table;

pub use index::VectorIndex;
pub use store::{clear, load, read_manifest, save, StoreManifest};
