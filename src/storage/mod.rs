pub mod hash;
pub mod local;
pub mod metadata;
pub mod records;

pub use hash::short_hash;
pub use local::LocalFileStorage;
pub use metadata::*;
pub use records::{list_tryon_records, save_tryon_record};

pub const UPLOADS_DIR: &str = "uploads";
pub const GENERATED_DIR: &str = "generated";
