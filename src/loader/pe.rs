use crate::database::{
    AnalysisDatabase, Architecture, Bitness, CallingConvention, EntryKind, EntryPoint, Function,
    FunctionSignature, ImageFormat, ImageInfo, NameFlags, NamedLocation, Rva, Segment,
    SegmentClass,
};
use crate::loader::decoration::parse_pe_decoration;
use crate::loader::{LoadOptions, LoaderError};
use goblin::pe::export::ExportAddressTableEntry;
use goblin::pe::header::{
    COFF_MACHINE_ARM, COFF_MACHINE_ARM64, COFF_MACHINE_ARMNT, COFF_MACHINE_X86,
    COFF_MACHINE_X86_64,
};
use goblin::pe::section_table::{
    IMAGE_SCN_CNT_CODE, IMAGE_SCN_CNT_INITIALIZED_DATA, IMAGE_SCN_CNT_UNINITIALIZED_DATA,
    IMAGE_SCN_MEM_WRITE,
};
use goblin::pe::PE;
use std::collections::HashMap;
use std::path::Path;

/// PE images rarely ship a symbol table, so the recorded functions are the
/// exports landing in executable sections plus the entry point. Data
/// exports become named locations.
pub fn load(
    db: &mut AnalysisDatabase,
    path: &Path,
    data: &[u8],
    options: &LoadOptions,
) -> Result<(), LoaderError> {
    let pe = PE::parse(data)?;

    let architecture = architecture_of(pe.header.coff_header.machine);
    let bitness = if pe.is_64 {
        Bitness::Bits64
    } else {
        Bitness::Bits32
    };
    let base = options.image_base_override.unwrap_or(pe.image_base as u64);
    db.set_image(ImageInfo::new(
        path,
        ImageFormat::Pe,
        architecture.clone(),
        bitness,
        base,
    ));

    for (index, section) in pe.sections.iter().enumerate() {
        let name = String::from_utf8_lossy(&section.name);
        let name = name.trim_end_matches('\0');
        let size = if section.virtual_size != 0 {
            section.virtual_size
        } else {
            section.size_of_raw_data
        };
        if size == 0 {
            continue;
        }
        db.add_segment(
            Segment::new(
                name,
                Rva::new(section.virtual_address as u64),
                size as u64,
                section_class(section.characteristics),
            )
            .with_selector(index as u64 + 1),
        );
    }

    // True ordinals come from the export address table: slot index plus the
    // directory's ordinal base. Forwarder slots resolve outside this image
    // and carry no RVA worth recording.
    let mut ordinals: HashMap<u64, u64> = HashMap::new();
    if let Some(export_data) = &pe.export_data {
        let ordinal_base = export_data.export_directory_table.ordinal_base as u64;
        for (index, slot) in export_data.export_address_table.iter().enumerate() {
            match slot {
                ExportAddressTableEntry::ExportRVA(rva) => {
                    ordinals.insert(*rva as u64, ordinal_base + index as u64);
                }
                ExportAddressTableEntry::ForwarderRVA(_) => {
                    log::debug!("skipping forwarder in export slot {}", index);
                }
            }
        }
    }

    let mut next_free = ordinals.values().max().copied().unwrap_or(0);
    let mut export_rvas: Vec<u64> = Vec::new();

    for export in &pe.exports {
        if export.reexport.is_some() {
            log::debug!("skipping re-export {:?}", export.name);
            continue;
        }
        let rva = export.rva as u64;
        if rva == 0 {
            continue;
        }

        let ordinal = match ordinals.get(&rva) {
            Some(ordinal) => *ordinal,
            None => {
                next_free += 1;
                next_free
            }
        };

        let (name, flags, convention) = match export.name {
            Some(raw) if !raw.is_empty() => {
                let decorated = parse_pe_decoration(raw, bitness);
                (decorated.name, NameFlags::PUBLIC, decorated.convention)
            }
            _ => (
                format!("ordinal_{}", ordinal),
                NameFlags::PUBLIC | NameFlags::AUTONAMED,
                None,
            ),
        };

        record_entry(db, ordinal, Rva::new(rva), &name, flags, convention, &architecture);
        export_rvas.push(rva);
    }

    let entry_rva = pe.entry as u64;
    if entry_rva != 0 && !export_rvas.contains(&entry_rva) {
        // The program entry joins the export list keyed by its address, so
        // it cannot collide with a real export ordinal.
        record_entry(
            db,
            entry_rva,
            Rva::new(entry_rva),
            "start",
            NameFlags::PUBLIC,
            None,
            &architecture,
        );
    }

    Ok(())
}

fn record_entry(
    db: &mut AnalysisDatabase,
    ordinal: u64,
    rva: Rva,
    name: &str,
    flags: NameFlags,
    convention: Option<CallingConvention>,
    architecture: &Architecture,
) {
    let class = db.segment_containing(rva).map(|s| s.class);
    let kind = match class {
        Some(SegmentClass::Code) => EntryKind::Function,
        Some(_) => EntryKind::Data,
        None => EntryKind::Unknown,
    };
    db.add_entry(EntryPoint::new(ordinal, rva, name, kind));

    match kind {
        EntryKind::Function => {
            let convention = convention.unwrap_or_else(|| {
                CallingConvention::default_for(architecture.clone(), ImageFormat::Pe)
            });
            let mut function = Function::new(rva, name).with_flags(flags);
            if convention != CallingConvention::Unknown {
                function = function.with_signature(FunctionSignature::new(convention));
            }
            db.add_function(function);
        }
        EntryKind::Data => {
            db.add_name(NamedLocation::new(rva, name, flags));
        }
        EntryKind::Unknown => {}
    }
}

fn architecture_of(machine: u16) -> Architecture {
    match machine {
        COFF_MACHINE_X86 => Architecture::X86,
        COFF_MACHINE_X86_64 => Architecture::X64,
        COFF_MACHINE_ARM | COFF_MACHINE_ARMNT => Architecture::Arm,
        COFF_MACHINE_ARM64 => Architecture::Arm64,
        other => Architecture::Other(format!("coff_{:#x}", other)),
    }
}

fn section_class(characteristics: u32) -> SegmentClass {
    if characteristics & IMAGE_SCN_CNT_CODE != 0 {
        SegmentClass::Code
    } else if characteristics & IMAGE_SCN_CNT_UNINITIALIZED_DATA != 0 {
        SegmentClass::Bss
    } else if characteristics & IMAGE_SCN_CNT_INITIALIZED_DATA != 0 {
        if characteristics & IMAGE_SCN_MEM_WRITE != 0 {
            SegmentClass::Data
        } else {
            SegmentClass::Const
        }
    } else {
        SegmentClass::Undefined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_mapping() {
        assert_eq!(architecture_of(COFF_MACHINE_X86), Architecture::X86);
        assert_eq!(architecture_of(COFF_MACHINE_X86_64), Architecture::X64);
        assert_eq!(architecture_of(COFF_MACHINE_ARM64), Architecture::Arm64);
        assert_eq!(
            architecture_of(0x1d3),
            Architecture::Other("coff_0x1d3".to_string())
        );
    }

    #[test]
    fn test_section_class_from_characteristics() {
        assert_eq!(section_class(IMAGE_SCN_CNT_CODE), SegmentClass::Code);
        assert_eq!(
            section_class(IMAGE_SCN_CNT_UNINITIALIZED_DATA | IMAGE_SCN_MEM_WRITE),
            SegmentClass::Bss
        );
        assert_eq!(
            section_class(IMAGE_SCN_CNT_INITIALIZED_DATA | IMAGE_SCN_MEM_WRITE),
            SegmentClass::Data
        );
        assert_eq!(
            section_class(IMAGE_SCN_CNT_INITIALIZED_DATA),
            SegmentClass::Const
        );
        assert_eq!(section_class(0), SegmentClass::Undefined);
    }
}
