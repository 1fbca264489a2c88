pub mod config;
pub mod database;
pub mod loader;
pub mod snapshot;

pub use config::DumpConfig;
pub use database::AnalysisDatabase;
pub use loader::{load_image, LoadOptions, LoaderError};
pub use snapshot::{Snapshot, SnapshotDumper, SnapshotError, SnapshotWriter};
