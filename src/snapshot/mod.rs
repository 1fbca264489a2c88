pub mod dumper;
pub mod error;
pub mod report;
pub mod schema;
pub mod stats;
pub mod writer;

pub use dumper::SnapshotDumper;
pub use error::SnapshotError;
pub use report::{generate_markdown_report, generate_text_report, ReportFormat, ReportGenerator};
pub use schema::{
    ArgumentRecord, ExportRecord, FunctionRecord, GeneralRecord, LabelRecord, NameRecord,
    SegmentRecord, Snapshot,
};
pub use stats::SnapshotStats;
pub use writer::{read_snapshot, write_snapshot, SnapshotWriter};
