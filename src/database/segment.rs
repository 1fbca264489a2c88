use crate::database::rva::Rva;

/// Broad classification of a segment's contents. The string forms are what
/// the snapshot carries in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentClass {
    Code,
    Data,
    Bss,
    Const,
    Extern,
    Undefined,
}

impl SegmentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentClass::Code => "CODE",
            SegmentClass::Data => "DATA",
            SegmentClass::Bss => "BSS",
            SegmentClass::Const => "CONST",
            SegmentClass::Extern => "XTRN",
            SegmentClass::Undefined => "UNDF",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    pub start: Rva,
    pub size: u64,
    pub class: SegmentClass,
    pub selector: u64,
}

impl Segment {
    pub fn new(name: &str, start: Rva, size: u64, class: SegmentClass) -> Self {
        Self {
            name: name.to_string(),
            start,
            size,
            class,
            selector: 0,
        }
    }

    pub fn with_selector(mut self, selector: u64) -> Self {
        self.selector = selector;
        self
    }

    pub fn contains(&self, rva: Rva) -> bool {
        rva.is_within(self.start, self.size)
    }

    pub fn end(&self) -> Rva {
        self.start + self.size
    }
}
