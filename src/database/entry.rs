use crate::database::rva::Rva;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Function,
    Data,
    Unknown,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Function => "function",
            EntryKind::Data => "data",
            EntryKind::Unknown => "unknown",
        }
    }
}

/// An exported entry point. PE images carry real ordinals; other formats
/// get sequential ones assigned by the producer.
#[derive(Debug, Clone)]
pub struct EntryPoint {
    pub ordinal: u64,
    pub rva: Rva,
    pub name: String,
    pub kind: EntryKind,
}

impl EntryPoint {
    pub fn new(ordinal: u64, rva: Rva, name: &str, kind: EntryKind) -> Self {
        Self {
            ordinal,
            rva,
            name: name.to_string(),
            kind,
        }
    }
}
