use crate::database::flags::NameFlags;
use crate::database::rva::Rva;

/// A named location that is not a function head: data symbols, string
/// tables, import thunk slots and the like.
#[derive(Debug, Clone)]
pub struct NamedLocation {
    pub rva: Rva,
    pub name: String,
    pub flags: NameFlags,
}

impl NamedLocation {
    pub fn new(rva: Rva, name: &str, flags: NameFlags) -> Self {
        Self {
            rva,
            name: name.to_string(),
            flags,
        }
    }
}
