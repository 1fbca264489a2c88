use crate::database::{Bitness, CallingConvention};

/// Result of undoing the C-level decoration on a PE symbol name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub name: String,
    pub convention: Option<CallingConvention>,
    pub argument_bytes: Option<u32>,
}

impl Decoration {
    fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            convention: None,
            argument_bytes: None,
        }
    }
}

/// 32-bit MSVC tools decorate C symbols by convention: `_name` for cdecl,
/// `_name@N` for stdcall, `@name@N` for fastcall, where N counts argument
/// bytes. 64-bit images carry undecorated C names, so those pass through.
pub fn parse_pe_decoration(raw: &str, bitness: Bitness) -> Decoration {
    if bitness == Bitness::Bits64 || is_mangled(raw) {
        return Decoration::plain(raw);
    }

    if let Some(rest) = raw.strip_prefix('@') {
        if let Some((name, bytes)) = split_at_suffix(rest) {
            return Decoration {
                name: name.to_string(),
                convention: Some(CallingConvention::Fastcall),
                argument_bytes: Some(bytes),
            };
        }
        return Decoration::plain(raw);
    }

    if let Some(rest) = raw.strip_prefix('_') {
        if let Some((name, bytes)) = split_at_suffix(rest) {
            return Decoration {
                name: name.to_string(),
                convention: Some(CallingConvention::Stdcall),
                argument_bytes: Some(bytes),
            };
        }
        return Decoration {
            name: rest.to_string(),
            convention: Some(CallingConvention::Cdecl),
            argument_bytes: None,
        };
    }

    // MinGW emits stdcall decorations without the leading underscore.
    if let Some((name, bytes)) = split_at_suffix(raw) {
        return Decoration {
            name: name.to_string(),
            convention: Some(CallingConvention::Stdcall),
            argument_bytes: Some(bytes),
        };
    }

    Decoration::plain(raw)
}

/// C symbols in Mach-O images carry one leading underscore.
pub fn strip_macho_underscore(raw: &str) -> &str {
    if is_mangled(raw) {
        return raw;
    }
    raw.strip_prefix('_').unwrap_or(raw)
}

/// C++ manglings encode the full signature and are left for downstream
/// tooling. `?` is MSVC, `_Z`/`__Z` is Itanium.
pub fn is_mangled(name: &str) -> bool {
    name.starts_with('?') || name.starts_with("_Z") || name.starts_with("__Z")
}

fn split_at_suffix(name: &str) -> Option<(&str, u32)> {
    let (base, digits) = name.rsplit_once('@')?;
    if base.is_empty() || digits.is_empty() {
        return None;
    }
    let bytes = digits.parse::<u32>().ok()?;
    Some((base, bytes))
}
