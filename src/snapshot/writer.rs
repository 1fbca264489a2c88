use crate::snapshot::schema::Snapshot;
use crate::snapshot::SnapshotError;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Serializes snapshots to JSON. Consumers of the document diff successive
/// dumps textually, so the four-space pretty layout is the default and part
/// of the contract.
pub struct SnapshotWriter {
    pretty: bool,
    indent: usize,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self {
            pretty: true,
            indent: 4,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn to_string(&self, snapshot: &Snapshot) -> Result<String, SnapshotError> {
        let mut buf = Vec::new();
        self.to_writer(&mut buf, snapshot)?;
        // Snapshot serialization only ever emits UTF-8.
        String::from_utf8(buf).map_err(|e| {
            SnapshotError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    pub fn to_writer<W: Write>(&self, writer: W, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if self.pretty {
            let indent = vec![b' '; self.indent];
            let formatter = PrettyFormatter::with_indent(&indent);
            let mut ser = Serializer::with_formatter(writer, formatter);
            snapshot.serialize(&mut ser)?;
        } else {
            serde_json::to_writer(writer, snapshot)?;
        }
        Ok(())
    }

    pub fn to_file<P: AsRef<Path>>(
        &self,
        snapshot: &Snapshot,
        path: P,
    ) -> Result<(), SnapshotError> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.to_writer(&mut writer, snapshot)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Snapshot, SnapshotError> {
        let file = File::open(path.as_ref())?;
        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(snapshot)
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_snapshot<P: AsRef<Path>>(snapshot: &Snapshot, path: P) -> Result<(), SnapshotError> {
    SnapshotWriter::new().to_file(snapshot, path)
}

pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Snapshot, SnapshotError> {
    SnapshotWriter::read_from_file(path)
}
