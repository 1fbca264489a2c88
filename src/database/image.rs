use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Pe,
    Elf,
    MachO,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Pe => "PE",
            ImageFormat::Elf => "ELF",
            ImageFormat::MachO => "Mach-O",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Architecture {
    X86,
    X64,
    Arm,
    Arm64,
    Other(String),
}

impl Architecture {
    pub fn as_str(&self) -> &str {
        match self {
            Architecture::X86 => "x86",
            Architecture::X64 => "x64",
            Architecture::Arm => "arm",
            Architecture::Arm64 => "arm64",
            Architecture::Other(name) => name.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitness {
    Bits16,
    Bits32,
    Bits64,
}

impl Bitness {
    pub fn as_u32(&self) -> u32 {
        match self {
            Bitness::Bits16 => 16,
            Bitness::Bits32 => 32,
            Bitness::Bits64 => 64,
        }
    }
}

/// Identity of the loaded image: where it came from, what machine it runs
/// on, and the base every RVA in the database is relative to.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub architecture: Architecture,
    pub bitness: Bitness,
    pub base: u64,
}

impl ImageInfo {
    pub fn new(
        path: impl AsRef<Path>,
        format: ImageFormat,
        architecture: Architecture,
        bitness: Bitness,
        base: u64,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
            architecture,
            bitness,
            base,
        }
    }

    /// File name without directory components, used as the snapshot's
    /// `filename` field.
    pub fn root_filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
