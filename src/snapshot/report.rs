use crate::snapshot::schema::{FunctionRecord, Snapshot};
use crate::snapshot::stats::SnapshotStats;
use itertools::Itertools;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Human-readable rendering of a snapshot, for eyeballing a dump before
/// shipping it to the symbol pipeline. The JSON document stays the machine
/// contract; nothing here feeds back into it.
pub struct ReportGenerator {
    format: ReportFormat,
    include_header: bool,
    include_summary: bool,
    include_details: bool,
    max_items_per_section: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Markdown,
}

impl ReportGenerator {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            include_header: true,
            include_summary: true,
            include_details: true,
            max_items_per_section: None,
        }
    }

    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    pub fn with_summary(mut self, include: bool) -> Self {
        self.include_summary = include;
        self
    }

    pub fn with_details(mut self, include: bool) -> Self {
        self.include_details = include;
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items_per_section = Some(max);
        self
    }

    pub fn generate(&self, snapshot: &Snapshot) -> String {
        match self.format {
            ReportFormat::Text => self.generate_text(snapshot),
            ReportFormat::Markdown => self.generate_markdown(snapshot),
        }
    }

    pub fn generate_to_file<P: AsRef<Path>>(
        &self,
        snapshot: &Snapshot,
        path: P,
    ) -> std::io::Result<()> {
        let report = self.generate(snapshot);
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(report.as_bytes())?;
        Ok(())
    }

    fn generate_text(&self, snapshot: &Snapshot) -> String {
        let mut report = String::new();

        if self.include_header {
            report.push_str(&self.text_header(snapshot));
            report.push_str("\n\n");
        }

        if self.include_summary {
            report.push_str(&self.text_summary(snapshot));
            report.push_str("\n\n");
        }

        if self.include_details {
            report.push_str(&self.text_segments(snapshot));
            report.push_str("\n\n");
            report.push_str(&self.text_exports(snapshot));
            report.push_str("\n\n");
            report.push_str(&self.text_functions(snapshot));
            report.push_str("\n\n");
            report.push_str(&self.text_names(snapshot));
        }

        report
    }

    fn text_header(&self, snapshot: &Snapshot) -> String {
        let mut header = String::new();
        header.push_str("================================================================================\n");
        header.push_str("                          SYMBOL SNAPSHOT REPORT\n");
        header.push_str("================================================================================\n");
        header.push_str(&format!("Image: {}\n", snapshot.general.filename));
        header.push_str(&format!("Architecture: {}\n", snapshot.general.architecture));
        header.push_str(&format!("Bitness: {}\n", snapshot.general.bitness));
        header.push_str("================================================================================");
        header
    }

    fn text_summary(&self, snapshot: &Snapshot) -> String {
        let stats = SnapshotStats::from_snapshot(snapshot);
        let mut summary = String::new();
        summary.push_str("SUMMARY\n");
        summary.push_str("-------\n");
        summary.push_str(&format!("Segments:   {:>8}\n", stats.segment_count));
        summary.push_str(&format!("Exports:    {:>8}\n", stats.export_count));
        summary.push_str(&format!("Functions:  {:>8}\n", stats.function_count));
        summary.push_str(&format!("  public:   {:>8}\n", stats.public_functions));
        summary.push_str(&format!("  autonamed:{:>8}\n", stats.autonamed_functions));
        summary.push_str(&format!("  typed:    {:>8}\n", stats.typed_functions));
        summary.push_str(&format!("Labels:     {:>8}\n", stats.label_count));
        summary.push_str(&format!("Names:      {:>8}\n", stats.name_count));
        summary
    }

    fn text_segments(&self, snapshot: &Snapshot) -> String {
        let mut text = String::new();
        text.push_str("SEGMENTS\n");
        text.push_str("--------\n");
        for seg in &snapshot.segments {
            text.push_str(&format!(
                "  0x{:08x}  {:<16} {:<6} sel {}\n",
                seg.start_rva, seg.name, seg.class, seg.selector
            ));
        }
        text
    }

    fn text_exports(&self, snapshot: &Snapshot) -> String {
        let mut text = String::new();
        text.push_str("EXPORTS\n");
        text.push_str("-------\n");
        for export in &snapshot.exports {
            text.push_str(&format!(
                "  #{:<5} 0x{:08x}  {} ({})\n",
                export.ordinal, export.rva, export.name, export.kind
            ));
        }
        text
    }

    fn text_functions(&self, snapshot: &Snapshot) -> String {
        let mut text = String::new();
        text.push_str("FUNCTIONS\n");
        text.push_str("---------\n");

        let shown = self.section_len(snapshot.functions.len());
        for func in &snapshot.functions[..shown] {
            text.push_str(&format!("  0x{:08x}  {}\n", func.start_rva, func.name));
            text.push_str(&format!("              {}\n", prototype(func)));
            for label in &func.labels {
                text.push_str(&format!("              +0x{:x} {}\n", label.offset, label.name));
            }
        }
        if shown < snapshot.functions.len() {
            text.push_str(&format!(
                "  ... and {} more\n",
                snapshot.functions.len() - shown
            ));
        }

        text
    }

    fn text_names(&self, snapshot: &Snapshot) -> String {
        let mut text = String::new();
        text.push_str("NAMES\n");
        text.push_str("-----\n");

        let shown = self.section_len(snapshot.names.len());
        for name in &snapshot.names[..shown] {
            let vis = if name.is_public { "public" } else { "local" };
            text.push_str(&format!("  0x{:08x}  {:<40} {}\n", name.rva, name.name, vis));
        }
        if shown < snapshot.names.len() {
            text.push_str(&format!("  ... and {} more\n", snapshot.names.len() - shown));
        }

        text
    }

    fn generate_markdown(&self, snapshot: &Snapshot) -> String {
        let mut md = String::new();

        if self.include_header {
            md.push_str("# Symbol Snapshot\n\n");
            md.push_str(&format!("- **Image:** {}\n", snapshot.general.filename));
            md.push_str(&format!(
                "- **Architecture:** {}\n",
                snapshot.general.architecture
            ));
            md.push_str(&format!("- **Bitness:** {}\n\n", snapshot.general.bitness));
        }

        if self.include_summary {
            let stats = SnapshotStats::from_snapshot(snapshot);
            md.push_str("## Summary\n\n");
            md.push_str("| Metric | Value |\n");
            md.push_str("|--------|-------|\n");
            md.push_str(&format!("| Segments | {} |\n", stats.segment_count));
            md.push_str(&format!("| Exports | {} |\n", stats.export_count));
            md.push_str(&format!("| Functions | {} |\n", stats.function_count));
            md.push_str(&format!("| Labels | {} |\n", stats.label_count));
            md.push_str(&format!("| Names | {} |\n\n", stats.name_count));
        }

        if self.include_details {
            md.push_str("## Segments\n\n");
            md.push_str("| Name | Start RVA | Class | Selector |\n");
            md.push_str("|------|-----------|-------|----------|\n");
            for seg in &snapshot.segments {
                md.push_str(&format!(
                    "| {} | `0x{:x}` | {} | {} |\n",
                    seg.name, seg.start_rva, seg.class, seg.selector
                ));
            }

            md.push_str("\n## Exports\n\n");
            md.push_str("| Ordinal | RVA | Name | Kind |\n");
            md.push_str("|---------|-----|------|------|\n");
            for export in &snapshot.exports {
                md.push_str(&format!(
                    "| {} | `0x{:x}` | {} | {} |\n",
                    export.ordinal, export.rva, export.name, export.kind
                ));
            }

            md.push_str("\n## Functions\n\n");
            md.push_str("| RVA | Name | Prototype | Labels |\n");
            md.push_str("|-----|------|-----------|--------|\n");
            let shown = self.section_len(snapshot.functions.len());
            for func in &snapshot.functions[..shown] {
                md.push_str(&format!(
                    "| `0x{:x}` | {} | `{}` | {} |\n",
                    func.start_rva,
                    func.name,
                    prototype(func),
                    func.labels.len()
                ));
            }
            if shown < snapshot.functions.len() {
                md.push_str(&format!(
                    "\n_... and {} more_\n",
                    snapshot.functions.len() - shown
                ));
            }

            md.push_str("\n## Names\n\n");
            md.push_str("| RVA | Name | Public |\n");
            md.push_str("|-----|------|--------|\n");
            let shown = self.section_len(snapshot.names.len());
            for name in &snapshot.names[..shown] {
                md.push_str(&format!(
                    "| `0x{:x}` | {} | {} |\n",
                    name.rva, name.name, name.is_public
                ));
            }
            if shown < snapshot.names.len() {
                md.push_str(&format!("\n_... and {} more_\n", snapshot.names.len() - shown));
            }
        }

        md
    }

    fn section_len(&self, available: usize) -> usize {
        match self.max_items_per_section {
            Some(max) => max.min(available),
            None => available,
        }
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(ReportFormat::Text)
    }
}

/// C-ish one-line rendering of what the snapshot knows about a function's
/// type, e.g. `fastcall int (void * ctx, int flags)`.
fn prototype(func: &FunctionRecord) -> String {
    let convention = func.calling_convention.as_deref().unwrap_or("unknown");
    let return_type = if func.return_type.is_empty() {
        "?"
    } else {
        func.return_type.as_str()
    };
    let args = func
        .arguments
        .iter()
        .map(|arg| {
            if arg.name.is_empty() {
                arg.type_name.clone()
            } else {
                format!("{} {}", arg.type_name, arg.name)
            }
        })
        .join(", ");
    format!("{} {} ({})", convention, return_type, args)
}

pub fn generate_text_report(snapshot: &Snapshot) -> String {
    ReportGenerator::new(ReportFormat::Text).generate(snapshot)
}

pub fn generate_markdown_report(snapshot: &Snapshot) -> String {
    ReportGenerator::new(ReportFormat::Markdown).generate(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::schema::{
        ArgumentRecord, ExportRecord, GeneralRecord, NameRecord, SegmentRecord,
    };

    fn sample() -> Snapshot {
        Snapshot {
            general: GeneralRecord {
                filename: "app.exe".to_string(),
                architecture: "x64".to_string(),
                bitness: 64,
            },
            segments: vec![SegmentRecord {
                name: ".text".to_string(),
                start_rva: 0x1000,
                class: "CODE".to_string(),
                selector: 1,
            }],
            exports: vec![ExportRecord {
                ordinal: 1,
                rva: 0x1100,
                name: "Initialize".to_string(),
                kind: "function".to_string(),
            }],
            functions: vec![FunctionRecord {
                start_rva: 0x1100,
                name: "Initialize".to_string(),
                is_public: true,
                is_autonamed: false,
                calling_convention: Some("fastcall".to_string()),
                return_type: "int".to_string(),
                arguments: vec![
                    ArgumentRecord {
                        name: "ctx".to_string(),
                        type_name: "void *".to_string(),
                        argument_location: "register_one".to_string(),
                    },
                    ArgumentRecord {
                        name: "flags".to_string(),
                        type_name: "int".to_string(),
                        argument_location: "register_one".to_string(),
                    },
                ],
                labels: Vec::new(),
            }],
            names: vec![NameRecord {
                rva: 0x5010,
                name: "g_table".to_string(),
                is_public: true,
                is_func: false,
            }],
        }
    }

    #[test]
    fn test_text_report_sections() {
        let report = generate_text_report(&sample());
        assert!(report.contains("SYMBOL SNAPSHOT REPORT"));
        assert!(report.contains("SEGMENTS"));
        assert!(report.contains("EXPORTS"));
        assert!(report.contains("FUNCTIONS"));
        assert!(report.contains("NAMES"));
        assert!(report.contains("fastcall int (void * ctx, int flags)"));
    }

    #[test]
    fn test_markdown_tables() {
        let md = generate_markdown_report(&sample());
        assert!(md.starts_with("# Symbol Snapshot"));
        assert!(md.contains("| Name | Start RVA | Class | Selector |"));
        assert!(md.contains("| `0x1100` | Initialize |"));
    }

    #[test]
    fn test_max_items_truncates() {
        let mut snap = sample();
        snap.functions.push(FunctionRecord {
            start_rva: 0x2000,
            name: "sub_2000".to_string(),
            is_public: false,
            is_autonamed: true,
            calling_convention: Some("unknown".to_string()),
            return_type: String::new(),
            arguments: Vec::new(),
            labels: Vec::new(),
        });
        let report = ReportGenerator::new(ReportFormat::Text)
            .with_max_items(1)
            .generate(&snap);
        assert!(report.contains("... and 1 more"));
        assert!(!report.contains("sub_2000"));
    }

    #[test]
    fn test_header_toggle() {
        let report = ReportGenerator::new(ReportFormat::Text)
            .with_header(false)
            .with_details(false)
            .generate(&sample());
        assert!(!report.contains("SYMBOL SNAPSHOT REPORT"));
        assert!(report.contains("SUMMARY"));
    }
}
