use crate::config::DumpConfig;
use crate::database::{AnalysisDatabase, Function, NamedLocation};
use crate::snapshot::schema::{
    ArgumentRecord, ExportRecord, FunctionRecord, GeneralRecord, LabelRecord, NameRecord,
    SegmentRecord, Snapshot,
};
use crate::snapshot::SnapshotError;
use rayon::prelude::*;
use regex::Regex;

/// One read-only pass over the database producing the snapshot document.
/// Functions and names come out in address order, exports in ordinal order,
/// exactly as the database stores them after `finalize()`.
pub struct SnapshotDumper {
    include_labels: bool,
    use_parallel: bool,
    filter: Option<Regex>,
}

impl SnapshotDumper {
    pub fn new() -> Self {
        Self {
            include_labels: true,
            use_parallel: true,
            filter: None,
        }
    }

    pub fn from_config(config: &DumpConfig) -> Result<Self, SnapshotError> {
        let filter = match &config.filter {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| SnapshotError::InvalidFilter(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            include_labels: config.include_labels,
            use_parallel: config.threads != 1,
            filter,
        })
    }

    pub fn with_labels(mut self, include: bool) -> Self {
        self.include_labels = include;
        self
    }

    pub fn use_parallel(mut self, parallel: bool) -> Self {
        self.use_parallel = parallel;
        self
    }

    pub fn with_filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn dump(&self, db: &AnalysisDatabase) -> Result<Snapshot, SnapshotError> {
        let image = db.image()?;

        let general = GeneralRecord {
            filename: image.root_filename(),
            architecture: image.architecture.as_str().to_string(),
            bitness: image.bitness.as_u32(),
        };

        let segments = db
            .segments()
            .iter()
            .map(|seg| SegmentRecord {
                name: seg.name.clone(),
                start_rva: seg.start.as_u64(),
                class: seg.class.as_str().to_string(),
                selector: seg.selector,
            })
            .collect();

        let exports = db
            .entries()
            .iter()
            .map(|entry| ExportRecord {
                ordinal: entry.ordinal,
                rva: entry.rva.as_u64(),
                name: entry.name.clone(),
                kind: entry.kind.as_str().to_string(),
            })
            .collect();

        let kept: Vec<&Function> = db
            .functions()
            .iter()
            .filter(|f| self.name_matches(&f.name))
            .collect();
        let functions = if self.use_parallel {
            kept.par_iter().map(|f| self.function_record(f)).collect()
        } else {
            kept.iter().map(|f| self.function_record(f)).collect()
        };

        let names = db
            .names()
            .iter()
            .filter(|n| db.function_containing(n.rva).is_none())
            .filter(|n| self.name_matches(&n.name))
            .map(name_record)
            .collect();

        Ok(Snapshot {
            general,
            segments,
            exports,
            functions,
            names,
        })
    }

    fn name_matches(&self, name: &str) -> bool {
        match &self.filter {
            Some(re) => re.is_match(name),
            None => true,
        }
    }

    fn function_record(&self, func: &Function) -> FunctionRecord {
        // Downstream PE tooling addresses at most 32-bit RVAs.
        if !func.start.fits_in_u32() {
            log::warn!("RVA out of range for function: {}", func.name);
        }

        let (calling_convention, return_type, arguments) = match &func.signature {
            Some(sig) => (
                sig.convention.map(|cc| cc.as_str().to_string()),
                sig.return_type.clone(),
                sig.arguments
                    .iter()
                    .map(|arg| ArgumentRecord {
                        name: arg.name.clone(),
                        type_name: arg.type_name.clone(),
                        argument_location: arg.location.as_str().to_string(),
                    })
                    .collect(),
            ),
            None => (Some("unknown".to_string()), String::new(), Vec::new()),
        };

        let labels = if self.include_labels {
            func.labels
                .iter()
                .map(|label| LabelRecord {
                    offset: label.offset,
                    name: label.name.clone(),
                    is_public: label.flags.is_public(),
                    is_autonamed: label.flags.is_autonamed(),
                })
                .collect()
        } else {
            Vec::new()
        };

        FunctionRecord {
            start_rva: func.start.as_u64(),
            name: func.name.clone(),
            is_public: func.flags.is_public(),
            is_autonamed: func.flags.is_autonamed(),
            calling_convention,
            return_type,
            arguments,
            labels,
        }
    }
}

impl Default for SnapshotDumper {
    fn default() -> Self {
        Self::new()
    }
}

fn name_record(name: &NamedLocation) -> NameRecord {
    if !name.rva.fits_in_u32() {
        log::warn!("RVA out of range for name: {}", name.name);
    }
    NameRecord {
        rva: name.rva.as_u64(),
        name: name.name.clone(),
        is_public: name.flags.is_public(),
        // In-function locations were filtered out above, so this is false
        // by construction; the key itself is part of the consumer schema.
        is_func: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{
        Architecture, ArgLocation, Argument, Bitness, CallingConvention, EntryKind, EntryPoint,
        Function, FunctionSignature, ImageFormat, ImageInfo, NameFlags, NamedLocation, Rva,
        Segment, SegmentClass,
    };

    fn sample_db() -> AnalysisDatabase {
        let mut db = AnalysisDatabase::new();
        db.set_image(ImageInfo::new(
            "fixtures/app.exe",
            ImageFormat::Pe,
            Architecture::X64,
            Bitness::Bits64,
            0x140000000,
        ));
        db.add_segment(
            Segment::new(".text", Rva::new(0x1000), 0x4000, SegmentClass::Code).with_selector(1),
        );
        db.add_segment(
            Segment::new(".data", Rva::new(0x5000), 0x1000, SegmentClass::Data).with_selector(2),
        );
        db.add_entry(EntryPoint::new(
            1,
            Rva::new(0x1100),
            "Initialize",
            EntryKind::Function,
        ));

        db.add_function(
            Function::new(Rva::new(0x1100), "Initialize")
                .with_size(0x200)
                .with_flags(NameFlags::PUBLIC)
                .with_signature(
                    FunctionSignature::new(CallingConvention::Fastcall)
                        .with_return_type("int")
                        .with_argument(Argument::new("ctx", "void *", ArgLocation::RegisterOne)),
                ),
        );
        db.add_function(
            Function::new(Rva::new(0x2000), "sub_142002000")
                .with_size(0x80)
                .with_flags(NameFlags::AUTONAMED),
        );
        db.attach_label(Rva::new(0x1140), "retry", NameFlags::empty())
            .unwrap();

        db.add_name(NamedLocation::new(
            Rva::new(0x5010),
            "g_table",
            NameFlags::PUBLIC,
        ));
        // Falls inside Initialize and must not reach the names section.
        db.add_name(NamedLocation::new(
            Rva::new(0x1180),
            "inner_marker",
            NameFlags::empty(),
        ));
        db.finalize();
        db
    }

    #[test]
    fn test_dump_sections() {
        let snap = SnapshotDumper::new().dump(&sample_db()).unwrap();
        assert_eq!(snap.general.filename, "app.exe");
        assert_eq!(snap.general.architecture, "x64");
        assert_eq!(snap.general.bitness, 64);
        assert_eq!(snap.segments.len(), 2);
        assert_eq!(snap.exports.len(), 1);
        assert_eq!(snap.functions.len(), 2);
        assert_eq!(snap.names.len(), 1);
    }

    #[test]
    fn test_function_records() {
        let snap = SnapshotDumper::new().use_parallel(false).dump(&sample_db()).unwrap();
        let init = &snap.functions[0];
        assert_eq!(init.start_rva, 0x1100);
        assert!(init.is_public);
        assert!(!init.is_autonamed);
        assert_eq!(init.calling_convention.as_deref(), Some("fastcall"));
        assert_eq!(init.return_type, "int");
        assert_eq!(init.arguments.len(), 1);
        assert_eq!(init.arguments[0].argument_location, "register_one");
        assert_eq!(init.labels.len(), 1);
        assert_eq!(init.labels[0].offset, 0x40);

        let auto = &snap.functions[1];
        assert!(auto.is_autonamed);
        assert_eq!(auto.calling_convention.as_deref(), Some("unknown"));
        assert_eq!(auto.return_type, "");
        assert!(auto.arguments.is_empty());
    }

    #[test]
    fn test_functions_in_address_order() {
        let snap = SnapshotDumper::new().dump(&sample_db()).unwrap();
        let rvas: Vec<u64> = snap.functions.iter().map(|f| f.start_rva).collect();
        let mut sorted = rvas.clone();
        sorted.sort_unstable();
        assert_eq!(rvas, sorted);
    }

    #[test]
    fn test_names_exclude_function_bodies() {
        let snap = SnapshotDumper::new().dump(&sample_db()).unwrap();
        assert_eq!(snap.names.len(), 1);
        assert_eq!(snap.names[0].name, "g_table");
        assert!(!snap.names[0].is_func);
    }

    #[test]
    fn test_labels_toggle() {
        let snap = SnapshotDumper::new()
            .with_labels(false)
            .dump(&sample_db())
            .unwrap();
        assert!(snap.functions.iter().all(|f| f.labels.is_empty()));
    }

    #[test]
    fn test_name_filter() {
        let snap = SnapshotDumper::new()
            .with_filter(Regex::new("^Init").unwrap())
            .dump(&sample_db())
            .unwrap();
        assert_eq!(snap.functions.len(), 1);
        assert_eq!(snap.functions[0].name, "Initialize");
        assert!(snap.names.is_empty());
        // Exports are the ABI surface and are never filtered.
        assert_eq!(snap.exports.len(), 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let db = sample_db();
        let seq = SnapshotDumper::new().use_parallel(false).dump(&db).unwrap();
        let par = SnapshotDumper::new().use_parallel(true).dump(&db).unwrap();
        assert_eq!(
            serde_json::to_value(&seq).unwrap(),
            serde_json::to_value(&par).unwrap()
        );
    }

    #[test]
    fn test_missing_image_is_error() {
        let db = AnalysisDatabase::new();
        assert!(SnapshotDumper::new().dump(&db).is_err());
    }
}
