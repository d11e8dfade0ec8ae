pub mod memo;
pub mod metadata_cache;
pub mod metadata_model;

pub use memo::Memo;
pub use metadata_cache::MetadataCache;
pub use metadata_model::{ContractSnapshot, DataCategory};
