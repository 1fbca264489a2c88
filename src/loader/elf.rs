use crate::database::{
    is_autogenerated_name, AnalysisDatabase, Architecture, Bitness, CallingConvention,
    DatabaseError, EntryKind, EntryPoint, Function, FunctionSignature, ImageFormat, ImageInfo,
    NameFlags, NamedLocation, Rva, Segment, SegmentClass,
};
use crate::loader::{LoadOptions, LoaderError};
use goblin::elf::header::{EM_386, EM_AARCH64, EM_ARM, EM_X86_64};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::section_header::{
    SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHN_UNDEF, SHT_NOBITS,
};
use goblin::elf::sym::{Sym, STB_GLOBAL, STB_WEAK, STT_FUNC, STT_NOTYPE, STT_OBJECT};
use goblin::elf::Elf;
use goblin::strtab::Strtab;
use std::collections::HashSet;
use std::path::Path;

/// ELF images keep their analysis results in the symbol tables: STT_FUNC
/// definitions become functions, other named definitions become names or,
/// when they fall inside a function body, labels. The dynamic table is the
/// exported surface and feeds the entry list.
pub fn load(
    db: &mut AnalysisDatabase,
    path: &Path,
    data: &[u8],
    options: &LoadOptions,
) -> Result<(), LoaderError> {
    let elf = Elf::parse(data)?;

    let architecture = architecture_of(elf.header.e_machine);
    let bitness = if elf.is_64 {
        Bitness::Bits64
    } else {
        Bitness::Bits32
    };
    let link_base = elf
        .program_headers
        .iter()
        .filter(|ph| ph.p_type == PT_LOAD)
        .map(|ph| ph.p_vaddr)
        .min()
        .unwrap_or(0);
    let base = options.image_base_override.unwrap_or(link_base);
    db.set_image(ImageInfo::new(
        path,
        ImageFormat::Elf,
        architecture.clone(),
        bitness,
        base,
    ));
    let convention = CallingConvention::default_for(architecture, ImageFormat::Elf);

    for (index, header) in elf.section_headers.iter().enumerate() {
        if header.sh_flags & SHF_ALLOC as u64 == 0 || header.sh_size == 0 {
            continue;
        }
        let Some(rva) = header.sh_addr.checked_sub(base) else {
            continue;
        };
        let name = elf
            .shdr_strtab
            .get_at(header.sh_name)
            .unwrap_or_default();
        let class = if header.sh_flags & SHF_EXECINSTR as u64 != 0 {
            SegmentClass::Code
        } else if header.sh_type == SHT_NOBITS {
            SegmentClass::Bss
        } else if header.sh_flags & SHF_WRITE as u64 != 0 {
            SegmentClass::Data
        } else {
            SegmentClass::Const
        };
        db.add_segment(
            Segment::new(name, Rva::new(rva), header.sh_size, class)
                .with_selector(index as u64 + 1),
        );
    }

    // Functions first, from both tables, so the later name walk can tell a
    // standalone location from an in-body label.
    let mut function_starts: HashSet<u64> = HashSet::new();
    record_functions(
        db,
        base,
        elf.syms.iter(),
        &elf.strtab,
        convention,
        &mut function_starts,
    );
    record_functions(
        db,
        base,
        elf.dynsyms.iter(),
        &elf.dynstrtab,
        convention,
        &mut function_starts,
    );

    let mut entry_rvas: HashSet<u64> = HashSet::new();
    let mut next_ordinal = 0u64;
    for sym in elf.dynsyms.iter() {
        if !is_defined(&sym) || !is_exported(&sym) {
            continue;
        }
        let Some(name) = symbol_name(&elf.dynstrtab, &sym) else {
            continue;
        };
        let Some(rva) = sym.st_value.checked_sub(base) else {
            continue;
        };
        if !entry_rvas.insert(rva) {
            continue;
        }
        next_ordinal += 1;
        let kind = match sym.st_type() {
            STT_FUNC => EntryKind::Function,
            STT_OBJECT => EntryKind::Data,
            _ => kind_by_segment(db, Rva::new(rva)),
        };
        db.add_entry(EntryPoint::new(next_ordinal, Rva::new(rva), name, kind));
    }

    let entry = elf.header.e_entry;
    if entry != 0 {
        if let Some(rva) = entry.checked_sub(base) {
            if entry_rvas.insert(rva) {
                next_ordinal += 1;
                db.add_entry(EntryPoint::new(
                    next_ordinal,
                    Rva::new(rva),
                    "start",
                    EntryKind::Function,
                ));
                if function_starts.insert(rva) {
                    let mut function =
                        Function::new(Rva::new(rva), "start").with_flags(NameFlags::PUBLIC);
                    if convention != CallingConvention::Unknown {
                        function = function.with_signature(FunctionSignature::new(convention));
                    }
                    db.add_function(function);
                }
            }
        }
    }

    let mut named_rvas: HashSet<u64> = HashSet::new();
    record_data_names(
        db,
        base,
        elf.syms.iter(),
        &elf.strtab,
        &function_starts,
        &mut named_rvas,
    )?;
    record_data_names(
        db,
        base,
        elf.dynsyms.iter(),
        &elf.dynstrtab,
        &function_starts,
        &mut named_rvas,
    )?;

    Ok(())
}

fn record_functions<'a>(
    db: &mut AnalysisDatabase,
    base: u64,
    syms: impl Iterator<Item = Sym>,
    strtab: &Strtab<'a>,
    convention: CallingConvention,
    function_starts: &mut HashSet<u64>,
) {
    for sym in syms {
        if sym.st_type() != STT_FUNC || !is_defined(&sym) || sym.st_value == 0 {
            continue;
        }
        let Some(name) = symbol_name(strtab, &sym) else {
            continue;
        };
        let Some(rva) = sym.st_value.checked_sub(base) else {
            continue;
        };
        if !function_starts.insert(rva) {
            continue;
        }
        let mut function = Function::new(Rva::new(rva), name)
            .with_size(sym.st_size)
            .with_flags(symbol_flags(&sym, name));
        if convention != CallingConvention::Unknown {
            function = function.with_signature(FunctionSignature::new(convention));
        }
        db.add_function(function);
    }
}

fn record_data_names<'a>(
    db: &mut AnalysisDatabase,
    base: u64,
    syms: impl Iterator<Item = Sym>,
    strtab: &Strtab<'a>,
    function_starts: &HashSet<u64>,
    seen: &mut HashSet<u64>,
) -> Result<(), LoaderError> {
    for sym in syms {
        let st_type = sym.st_type();
        if st_type != STT_OBJECT && st_type != STT_NOTYPE {
            continue;
        }
        if !is_defined(&sym) || sym.st_value == 0 {
            continue;
        }
        let Some(name) = symbol_name(strtab, &sym) else {
            continue;
        };
        let Some(rva) = sym.st_value.checked_sub(base) else {
            continue;
        };
        if function_starts.contains(&rva) || !seen.insert(rva) {
            continue;
        }
        let flags = symbol_flags(&sym, name);
        match db.attach_label(Rva::new(rva), name, flags) {
            Ok(()) => {}
            Err(DatabaseError::LabelOutOfRange(_)) => {
                db.add_name(NamedLocation::new(Rva::new(rva), name, flags));
            }
            Err(other) => return Err(other.into()),
        }
    }
    Ok(())
}

fn is_defined(sym: &Sym) -> bool {
    sym.st_shndx != SHN_UNDEF as usize
}

fn is_exported(sym: &Sym) -> bool {
    matches!(sym.st_bind(), STB_GLOBAL | STB_WEAK)
}

/// Bind flags plus the autonamed marker for placeholder-style names.
fn symbol_flags(sym: &Sym, name: &str) -> NameFlags {
    let mut flags = match sym.st_bind() {
        STB_GLOBAL => NameFlags::PUBLIC,
        STB_WEAK => NameFlags::PUBLIC | NameFlags::WEAK,
        _ => NameFlags::empty(),
    };
    if is_autogenerated_name(name) {
        flags |= NameFlags::AUTONAMED;
    }
    flags
}

fn symbol_name<'a>(strtab: &Strtab<'a>, sym: &Sym) -> Option<&'a str> {
    match strtab.get_at(sym.st_name) {
        Some(name) if !name.is_empty() => Some(name),
        _ => None,
    }
}

fn kind_by_segment(db: &AnalysisDatabase, rva: Rva) -> EntryKind {
    match db.segment_containing(rva).map(|s| s.class) {
        Some(SegmentClass::Code) => EntryKind::Function,
        Some(_) => EntryKind::Data,
        None => EntryKind::Unknown,
    }
}

fn architecture_of(machine: u16) -> Architecture {
    match machine {
        EM_386 => Architecture::X86,
        EM_X86_64 => Architecture::X64,
        EM_ARM => Architecture::Arm,
        EM_AARCH64 => Architecture::Arm64,
        other => Architecture::Other(format!("em_{}", other)),
    }
}
