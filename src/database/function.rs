use crate::database::flags::NameFlags;
use crate::database::rva::Rva;
use crate::database::typeinfo::FunctionSignature;

/// A named location inside a function body, stored relative to the
/// function start.
#[derive(Debug, Clone)]
pub struct Label {
    pub offset: u64,
    pub name: String,
    pub flags: NameFlags,
}

impl Label {
    pub fn new(offset: u64, name: &str, flags: NameFlags) -> Self {
        Self {
            offset,
            name: name.to_string(),
            flags,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub start: Rva,
    pub size: u64,
    pub name: String,
    pub flags: NameFlags,
    pub signature: Option<FunctionSignature>,
    pub labels: Vec<Label>,
}

impl Function {
    pub fn new(start: Rva, name: &str) -> Self {
        Self {
            start,
            size: 0,
            name: name.to_string(),
            flags: NameFlags::empty(),
            signature: None,
            labels: Vec::new(),
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_flags(mut self, flags: NameFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_signature(mut self, signature: FunctionSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn add_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn contains(&self, rva: Rva) -> bool {
        if self.size == 0 {
            rva == self.start
        } else {
            rva.is_within(self.start, self.size)
        }
    }

    pub fn end(&self) -> Rva {
        self.start + self.size
    }
}
