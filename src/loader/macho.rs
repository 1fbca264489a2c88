use crate::database::{
    is_autogenerated_name, AnalysisDatabase, Architecture, Bitness, CallingConvention,
    DatabaseError, EntryKind, EntryPoint, Function, FunctionSignature, ImageFormat, ImageInfo,
    NameFlags, NamedLocation, Rva, Segment, SegmentClass,
};
use crate::loader::decoration::strip_macho_underscore;
use crate::loader::{LoadOptions, LoaderError};
use goblin::mach::constants::{
    SECTION_TYPE, S_ATTR_PURE_INSTRUCTIONS, S_ATTR_SOME_INSTRUCTIONS, S_ZEROFILL,
};
use goblin::mach::cputype::{CPU_TYPE_ARM, CPU_TYPE_ARM64, CPU_TYPE_X86, CPU_TYPE_X86_64};
use goblin::mach::exports::ExportInfo;
use goblin::mach::symbols::{N_EXT, N_SECT, N_STAB, N_TYPE};
use goblin::mach::{Mach, MachO};
use std::collections::HashSet;
use std::path::Path;

const VM_PROT_WRITE: u32 = 0x2;

/// Mach-O sections become segments, nlist symbols in code sections become
/// functions with sizes from the next-start delta, and the export trie
/// drives both the entry list and public visibility.
pub fn load(
    db: &mut AnalysisDatabase,
    path: &Path,
    data: &[u8],
    options: &LoadOptions,
) -> Result<(), LoaderError> {
    let macho = match Mach::parse(data)? {
        Mach::Binary(macho) => macho,
        Mach::Fat(_) => return Err(LoaderError::FatArchive),
    };
    load_binary(db, path, &macho, options)
}

fn load_binary(
    db: &mut AnalysisDatabase,
    path: &Path,
    macho: &MachO,
    options: &LoadOptions,
) -> Result<(), LoaderError> {
    let architecture = architecture_of(macho.header.cputype());
    let bitness = if macho.is_64 {
        Bitness::Bits64
    } else {
        Bitness::Bits32
    };

    let mut link_base = 0u64;
    for segment in &macho.segments {
        if segment_name(&segment.segname) == "__TEXT" {
            link_base = segment.vmaddr;
        }
    }
    let base = options.image_base_override.unwrap_or(link_base);
    db.set_image(ImageInfo::new(
        path,
        ImageFormat::MachO,
        architecture.clone(),
        bitness,
        base,
    ));

    // Sections carry the addresses; segments only group them. Code ranges
    // are kept for classifying symbols and bounding function sizes.
    let mut code_ranges: Vec<(u64, u64)> = Vec::new();
    let mut selector = 0u64;
    for segment in &macho.segments {
        let segname = segment_name(&segment.segname);
        if segname == "__PAGEZERO" {
            continue;
        }
        for section_result in segment.into_iter() {
            let (section, _data) = section_result?;
            if section.size == 0 {
                continue;
            }
            let Some(rva) = section.addr.checked_sub(base) else {
                continue;
            };
            let sectname = segment_name(&section.sectname);
            let class = section_class(section.flags, segment.initprot);
            if class == SegmentClass::Code {
                code_ranges.push((rva, rva + section.size));
            }
            selector += 1;
            db.add_segment(
                Segment::new(sectname, Rva::new(rva), section.size, class)
                    .with_selector(selector),
            );
        }
    }
    code_ranges.sort_unstable();

    let mut export_rvas: HashSet<u64> = HashSet::new();
    let mut export_functions: Vec<(u64, String)> = Vec::new();
    let mut next_ordinal = 0u64;
    if let Ok(exports) = macho.exports() {
        for export in exports {
            if matches!(export.info, ExportInfo::Reexport { .. }) {
                log::debug!("skipping re-export {}", export.name);
                continue;
            }
            let rva = export.offset;
            if rva == 0 || !export_rvas.insert(rva) {
                continue;
            }
            let name = strip_macho_underscore(&export.name).to_string();
            next_ordinal += 1;
            let kind = if in_code(&code_ranges, rva) {
                EntryKind::Function
            } else {
                EntryKind::Data
            };
            if kind == EntryKind::Function {
                export_functions.push((rva, name.clone()));
            }
            db.add_entry(EntryPoint::new(next_ordinal, Rva::new(rva), &name, kind));
        }
    }

    let mut raw_functions: Vec<(u64, String, NameFlags)> = Vec::new();
    let mut raw_names: Vec<(u64, String, NameFlags)> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();
    for sym in macho.symbols() {
        let Ok((name, nlist)) = sym else {
            continue;
        };
        if name.is_empty() || nlist.n_type & N_STAB != 0 {
            continue;
        }
        if nlist.n_type & N_TYPE != N_SECT {
            continue;
        }
        let Some(rva) = nlist.n_value.checked_sub(base) else {
            continue;
        };
        if !seen.insert(rva) {
            continue;
        }
        let mut flags = if nlist.n_type & N_EXT != 0 {
            NameFlags::PUBLIC
        } else {
            NameFlags::empty()
        };
        if export_rvas.contains(&rva) {
            flags |= NameFlags::PUBLIC;
        }
        let display = strip_macho_underscore(name).to_string();
        if is_autogenerated_name(&display) {
            flags |= NameFlags::AUTONAMED;
        }
        if in_code(&code_ranges, rva) {
            raw_functions.push((rva, display, flags));
        } else {
            raw_names.push((rva, display, flags));
        }
    }

    // Exported functions without an nlist entry (stripped images) still
    // belong in the function list.
    for (rva, name) in export_functions {
        if seen.insert(rva) {
            raw_functions.push((rva, name, NameFlags::PUBLIC));
        }
    }

    let entry = macho.entry;
    if entry != 0 {
        // LC_MAIN records a file offset, LC_UNIXTHREAD an absolute address.
        let rva = if entry >= base { entry - base } else { entry };
        if export_rvas.insert(rva) {
            next_ordinal += 1;
            db.add_entry(EntryPoint::new(
                next_ordinal,
                Rva::new(rva),
                "start",
                EntryKind::Function,
            ));
        }
        if seen.insert(rva) {
            raw_functions.push((rva, "start".to_string(), NameFlags::PUBLIC));
        }
    }

    raw_functions.sort_by_key(|(rva, _, _)| *rva);
    let convention = CallingConvention::default_for(architecture, ImageFormat::MachO);
    for index in 0..raw_functions.len() {
        let (rva, ref name, flags) = raw_functions[index];
        let size = function_size(&code_ranges, &raw_functions, index);
        let mut function = Function::new(Rva::new(rva), name)
            .with_size(size)
            .with_flags(flags);
        if convention != CallingConvention::Unknown {
            function = function.with_signature(FunctionSignature::new(convention));
        }
        db.add_function(function);
    }

    for (rva, name, flags) in raw_names {
        match db.attach_label(Rva::new(rva), &name, flags) {
            Ok(()) => {}
            Err(DatabaseError::LabelOutOfRange(_)) => {
                db.add_name(NamedLocation::new(Rva::new(rva), &name, flags));
            }
            Err(other) => return Err(other.into()),
        }
    }

    Ok(())
}

fn segment_name(raw: &[u8]) -> &str {
    std::str::from_utf8(raw).unwrap_or("").trim_end_matches('\0')
}

fn section_class(flags: u32, initprot: u32) -> SegmentClass {
    if flags & (S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS) != 0 {
        SegmentClass::Code
    } else if flags & SECTION_TYPE == S_ZEROFILL {
        SegmentClass::Bss
    } else if initprot & VM_PROT_WRITE != 0 {
        SegmentClass::Data
    } else {
        SegmentClass::Const
    }
}

fn in_code(code_ranges: &[(u64, u64)], rva: u64) -> bool {
    code_ranges
        .iter()
        .any(|(start, end)| rva >= *start && rva < *end)
}

/// A symbol runs to the next symbol in the same code section, or to the
/// section end for the last one.
fn function_size(
    code_ranges: &[(u64, u64)],
    functions: &[(u64, String, NameFlags)],
    index: usize,
) -> u64 {
    let rva = functions[index].0;
    let range_end = code_ranges
        .iter()
        .find(|(start, end)| rva >= *start && rva < *end)
        .map(|(_, end)| *end)
        .unwrap_or(rva);
    let next = functions
        .get(index + 1)
        .map(|(next_rva, _, _)| *next_rva)
        .filter(|next_rva| *next_rva < range_end)
        .unwrap_or(range_end);
    next.saturating_sub(rva)
}

fn architecture_of(cputype: u32) -> Architecture {
    match cputype {
        CPU_TYPE_X86 => Architecture::X86,
        CPU_TYPE_X86_64 => Architecture::X64,
        CPU_TYPE_ARM => Architecture::Arm,
        CPU_TYPE_ARM64 => Architecture::Arm64,
        other => Architecture::Other(format!("cpu_{:#x}", other)),
    }
}
