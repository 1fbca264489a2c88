use crate::snapshot::schema::Snapshot;
use indexmap::IndexMap;

/// Counts derived from a finished snapshot, used for the console summary
/// and the report footer. Never serialized into the snapshot itself.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStats {
    pub segment_count: usize,
    pub export_count: usize,
    pub function_count: usize,
    pub name_count: usize,
    pub label_count: usize,
    pub public_functions: usize,
    pub autonamed_functions: usize,
    pub typed_functions: usize,
    pub functions_per_segment: IndexMap<String, usize>,
}

impl SnapshotStats {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut stats = Self {
            segment_count: snapshot.segments.len(),
            export_count: snapshot.exports.len(),
            function_count: snapshot.functions.len(),
            name_count: snapshot.names.len(),
            ..Self::default()
        };

        for segment in &snapshot.segments {
            stats.functions_per_segment.insert(segment.name.clone(), 0);
        }

        for func in &snapshot.functions {
            stats.label_count += func.labels.len();
            if func.is_public {
                stats.public_functions += 1;
            }
            if func.is_autonamed {
                stats.autonamed_functions += 1;
            }
            if matches!(func.calling_convention.as_deref(), Some(cc) if cc != "unknown")
                || !func.arguments.is_empty()
            {
                stats.typed_functions += 1;
            }
            if let Some(name) = segment_for(snapshot, func.start_rva) {
                if let Some(count) = stats.functions_per_segment.get_mut(name) {
                    *count += 1;
                }
            }
        }

        stats
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("segments:  {}", self.segment_count),
            format!("exports:   {}", self.export_count),
            format!(
                "functions: {} ({} public, {} autonamed)",
                self.function_count, self.public_functions, self.autonamed_functions
            ),
            format!("labels:    {}", self.label_count),
            format!("names:     {}", self.name_count),
        ];
        for (segment, count) in &self.functions_per_segment {
            if *count > 0 {
                lines.push(format!("  {} -> {} functions", segment, count));
            }
        }
        lines
    }
}

/// Segments carry only their start in the snapshot, so a function belongs
/// to the last segment starting at or below it.
fn segment_for(snapshot: &Snapshot, rva: u64) -> Option<&str> {
    snapshot
        .segments
        .iter()
        .rev()
        .find(|seg| seg.start_rva <= rva)
        .map(|seg| seg.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::schema::{
        FunctionRecord, GeneralRecord, LabelRecord, SegmentRecord, Snapshot,
    };

    fn func(rva: u64, name: &str, public: bool, auto: bool) -> FunctionRecord {
        FunctionRecord {
            start_rva: rva,
            name: name.to_string(),
            is_public: public,
            is_autonamed: auto,
            calling_convention: Some("unknown".to_string()),
            return_type: String::new(),
            arguments: Vec::new(),
            labels: Vec::new(),
        }
    }

    fn sample() -> Snapshot {
        let mut f1 = func(0x1100, "Initialize", true, false);
        f1.calling_convention = Some("fastcall".to_string());
        f1.labels.push(LabelRecord {
            offset: 0x40,
            name: "retry".to_string(),
            is_public: false,
            is_autonamed: false,
        });
        Snapshot {
            general: GeneralRecord {
                filename: "app.exe".to_string(),
                architecture: "x64".to_string(),
                bitness: 64,
            },
            segments: vec![
                SegmentRecord {
                    name: ".text".to_string(),
                    start_rva: 0x1000,
                    class: "CODE".to_string(),
                    selector: 1,
                },
                SegmentRecord {
                    name: ".data".to_string(),
                    start_rva: 0x5000,
                    class: "DATA".to_string(),
                    selector: 2,
                },
            ],
            exports: Vec::new(),
            functions: vec![f1, func(0x2000, "sub_2000", false, true)],
            names: Vec::new(),
        }
    }

    #[test]
    fn test_counts() {
        let stats = SnapshotStats::from_snapshot(&sample());
        assert_eq!(stats.segment_count, 2);
        assert_eq!(stats.function_count, 2);
        assert_eq!(stats.public_functions, 1);
        assert_eq!(stats.autonamed_functions, 1);
        assert_eq!(stats.label_count, 1);
        assert_eq!(stats.typed_functions, 1);
    }

    #[test]
    fn test_null_convention_is_untyped() {
        // A convention byte outside the table serializes as null; that is
        // no more typed than "unknown".
        let mut snapshot = sample();
        let mut f = func(0x2100, "sub_2100", false, true);
        f.calling_convention = None;
        snapshot.functions.push(f);
        let stats = SnapshotStats::from_snapshot(&snapshot);
        assert_eq!(stats.typed_functions, 1);
    }

    #[test]
    fn test_per_segment_tally() {
        let stats = SnapshotStats::from_snapshot(&sample());
        assert_eq!(stats.functions_per_segment[".text"], 2);
        assert_eq!(stats.functions_per_segment[".data"], 0);
    }

    #[test]
    fn test_summary_mentions_nonempty_segments_only() {
        let lines = SnapshotStats::from_snapshot(&sample()).summary_lines();
        let joined = lines.join("\n");
        assert!(joined.contains(".text -> 2 functions"));
        assert!(!joined.contains(".data ->"));
    }
}
