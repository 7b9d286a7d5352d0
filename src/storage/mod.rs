pub mod guard;
pub mod layout;
pub mod local;
pub mod naming;

pub use guard::validate_path;
pub use layout::{ensure_directories, FileCategory, Partition};
pub use local::LocalStorage;
pub use naming::{derive_stored_name, thumbnail_name};
