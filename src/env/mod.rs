//! Environment Module
//!
//! Lifecycle of directory-bound engine environments.
//!
//! ## Responsibilities
//! - At most one owner per environment directory (`DirectoryLock`)
//! - Open, track, recover and close one environment (`EnvironmentHolder`)
//! - Close every live environment at orderly shutdown (`ShutdownRegistry`)
//!
//! ## Directory Layout
//! ```text
//! persistent:  {parent_dir}/
//!                ├── data.mdb
//!                ├── lock.mdb
//!                └── binstore.lck
//!
//! temporary:   {parent_dir}/lmdbtemp{random}/
//!                ├── data.mdb
//!                ├── lock.mdb
//!                └── binstore.lck      (whole directory deleted on close)
//! ```

mod holder;
mod lock;
mod registry;

pub use holder::{default_sub_dir, generate_environment_name, EnvironmentHolder, ENVIRONMENT_NAME_PREFIX};
pub use lock::{DirectoryLock, LOCK_FILE_NAME};
pub use registry::ShutdownRegistry;
