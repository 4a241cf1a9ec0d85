pub mod blob;
pub mod error;
pub mod lease;
pub mod plugin;

pub use blob::{BlobStore, GetObject, ListPage, ListedObject, ObjectStoreBlob, PutCondition, PutOpts};
pub use error::StoreError;
pub use lease::Lease;
pub use plugin::PluginStorage;
