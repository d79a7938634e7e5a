//! Concrete adapter implementations of the port traits.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod model_file_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
