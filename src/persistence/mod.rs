pub mod files;
pub mod store;

pub use files::{
    atomic_write, ensure_dir, get_data_dir, init_local_data_dir, read_file, resolve_data_dir,
    DATA_DIR_NAME,
};
pub use store::{Store, StoreError};
