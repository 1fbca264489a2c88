pub mod decoration;
pub mod elf;
pub mod error;
pub mod macho;
pub mod pe;

pub use decoration::{parse_pe_decoration, strip_macho_underscore, Decoration};
pub use error::LoaderError;

use crate::database::{AnalysisDatabase, ImageFormat};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Knobs applied while an image is read into the database.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Use this load base instead of the one recorded in the header.
    pub image_base_override: Option<u64>,
}

// Mach-O magics in file order, both endiannesses, 32- and 64-bit.
const MACHO_MAGICS: [[u8; 4]; 4] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xcf, 0xfa, 0xed, 0xfe],
];
const FAT_MAGICS: [[u8; 4]; 2] = [[0xca, 0xfe, 0xba, 0xbe], [0xbe, 0xba, 0xfe, 0xca]];

/// Identify the container format from the leading magic bytes. Fat Mach-O
/// archives sniff as Mach-O and are rejected with a dedicated error during
/// the parse.
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    if data.len() < 4 {
        return None;
    }
    if data.starts_with(b"MZ") {
        return Some(ImageFormat::Pe);
    }
    if data.starts_with(&[0x7f, b'E', b'L', b'F']) {
        return Some(ImageFormat::Elf);
    }
    let magic = [data[0], data[1], data[2], data[3]];
    if MACHO_MAGICS.contains(&magic) || FAT_MAGICS.contains(&magic) {
        return Some(ImageFormat::MachO);
    }
    None
}

/// Map the image and run the matching producer, returning a finalized
/// database ready for the snapshot pass.
pub fn load_image<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
) -> Result<AnalysisDatabase, LoaderError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file) }?;

    let mut db = AnalysisDatabase::new();
    match sniff_format(&mmap).ok_or(LoaderError::UnknownFormat)? {
        ImageFormat::Pe => pe::load(&mut db, path, &mmap, options)?,
        ImageFormat::Elf => elf::load(&mut db, path, &mmap, options)?,
        ImageFormat::MachO => macho::load(&mut db, path, &mmap, options)?,
    }
    db.finalize();
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_pe() {
        assert_eq!(sniff_format(b"MZ\x90\x00rest"), Some(ImageFormat::Pe));
    }

    #[test]
    fn test_sniff_elf() {
        assert_eq!(
            sniff_format(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]),
            Some(ImageFormat::Elf)
        );
    }

    #[test]
    fn test_sniff_macho() {
        assert_eq!(
            sniff_format(&[0xcf, 0xfa, 0xed, 0xfe, 0, 0, 0, 0]),
            Some(ImageFormat::MachO)
        );
        assert_eq!(
            sniff_format(&[0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 2]),
            Some(ImageFormat::MachO)
        );
    }

    #[test]
    fn test_sniff_rejects_garbage() {
        assert_eq!(sniff_format(b"\x00\x01\x02\x03"), None);
        assert_eq!(sniff_format(b"MZ"), None);
        assert_eq!(sniff_format(b""), None);
    }

    #[test]
    fn test_load_image_unknown_format() {
        let path = std::env::temp_dir().join(format!("symsnap-junk-{}.bin", std::process::id()));
        std::fs::write(&path, b"not an image at all").unwrap();
        let result = load_image(&path, &LoadOptions::default());
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(LoaderError::UnknownFormat)));
    }

    #[test]
    fn test_load_image_missing_file() {
        let result = load_image("/nonexistent/image.bin", &LoadOptions::default());
        assert!(matches!(result, Err(LoaderError::Io(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_image_end_to_end() {
        let exe = std::env::current_exe().unwrap();
        let db = load_image(&exe, &LoadOptions::default()).unwrap();
        assert!(!db.segments().is_empty());
        assert_eq!(db.image().unwrap().format, ImageFormat::Elf);
    }
}
