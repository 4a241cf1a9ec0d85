pub mod hash;
pub mod id;

pub use hash::{content_digest, stable_json, stable_json_string};
pub use id::{new_id, new_prefixed_id};
