pub mod entry;
pub mod error;
pub mod flags;
pub mod function;
pub mod image;
pub mod name;
pub mod rva;
pub mod segment;
pub mod typeinfo;

pub use entry::{EntryKind, EntryPoint};
pub use error::DatabaseError;
pub use flags::NameFlags;
pub use function::{Function, Label};
pub use image::{Architecture, Bitness, ImageFormat, ImageInfo};
pub use name::NamedLocation;
pub use rva::Rva;
pub use segment::{Segment, SegmentClass};
pub use typeinfo::{ArgLocation, Argument, CallingConvention, FunctionSignature};

use ahash::AHashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;

/// Dummy-name prefixes autoanalysis hands out when nothing better is known
/// (sub_401000, loc_40102A, byte_404000, ...).
static AUTOGEN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(sub|loc|locret|unk|byte|word|dword|qword|off|flt|dbl|asc|stru)_[0-9A-Fa-f]+$")
        .unwrap()
});

pub fn is_autogenerated_name(name: &str) -> bool {
    AUTOGEN_NAME.is_match(name)
}

/// In-memory analysis results for one loaded image. Producers (the loaders,
/// or a host embedding the library) mutate it; the snapshot pass only
/// queries. Mutation invalidates the lazy function index, so the usual
/// shape is: fill everything, `finalize()`, then query.
pub struct AnalysisDatabase {
    image: Option<ImageInfo>,
    segments: Vec<Segment>,
    functions: Vec<Function>,
    entries: Vec<EntryPoint>,
    names: Vec<NamedLocation>,
    func_index: RwLock<Option<AHashMap<u64, usize>>>,
}

impl AnalysisDatabase {
    pub fn new() -> Self {
        Self {
            image: None,
            segments: Vec::new(),
            functions: Vec::new(),
            entries: Vec::new(),
            names: Vec::new(),
            func_index: RwLock::new(None),
        }
    }

    //
    // mutation (producer side)
    //

    pub fn set_image(&mut self, image: ImageInfo) {
        self.image = Some(image);
    }

    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
        self.invalidate_index();
    }

    pub fn add_entry(&mut self, entry: EntryPoint) {
        self.entries.push(entry);
    }

    pub fn add_name(&mut self, name: NamedLocation) {
        self.names.push(name);
    }

    /// Attaches a label to the function containing `rva`, storing the
    /// offset relative to the function start.
    pub fn attach_label(
        &mut self,
        rva: Rva,
        name: &str,
        flags: NameFlags,
    ) -> Result<(), DatabaseError> {
        if name.is_empty() {
            return Err(DatabaseError::InvalidName(String::new()));
        }
        let func = self
            .functions
            .iter_mut()
            .find(|f| f.contains(rva))
            .ok_or(DatabaseError::LabelOutOfRange(rva.as_u64()))?;
        let offset = rva.offset_from(func.start);
        func.add_label(Label::new(offset, name, flags));
        Ok(())
    }

    /// Sorts segments/functions/names by address and entries by ordinal,
    /// drops duplicate function starts, and orders labels within each
    /// function. Queries that rely on ordering assume this ran.
    pub fn finalize(&mut self) {
        self.segments.sort_by_key(|s| s.start);
        self.functions.sort_by_key(|f| f.start);
        self.functions.dedup_by(|dup, keep| {
            if keep.start == dup.start {
                log::warn!("duplicate function at {}, keeping {}", keep.start, keep.name);
                true
            } else {
                false
            }
        });
        for func in &mut self.functions {
            func.labels.sort_by_key(|l| l.offset);
        }
        self.names.sort_by_key(|n| n.rva);
        self.entries.sort_by_key(|e| e.ordinal);
        self.invalidate_index();
    }

    //
    // queries (exporter side)
    //

    pub fn image(&self) -> Result<&ImageInfo, DatabaseError> {
        self.image.as_ref().ok_or(DatabaseError::MissingImage)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn entries(&self) -> &[EntryPoint] {
        &self.entries
    }

    pub fn names(&self) -> &[NamedLocation] {
        &self.names
    }

    /// Exact-start lookup through the lazy index.
    pub fn function_at(&self, rva: Rva) -> Option<&Function> {
        self.ensure_index();
        let guard = self.func_index.read();
        let idx = guard.as_ref()?.get(&rva.as_u64()).copied()?;
        self.functions.get(idx)
    }

    /// Body lookup. Exact starts resolve through the cached index; interior
    /// addresses fall back to a binary search over the sorted list.
    pub fn function_containing(&self, rva: Rva) -> Option<&Function> {
        if let Some(func) = self.function_at(rva) {
            return Some(func);
        }
        let idx = self.functions.partition_point(|f| f.start <= rva);
        if idx == 0 {
            return None;
        }
        let func = &self.functions[idx - 1];
        func.contains(rva).then_some(func)
    }

    pub fn segment_containing(&self, rva: Rva) -> Option<&Segment> {
        self.segments.iter().find(|s| s.contains(rva))
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn label_count(&self) -> usize {
        self.functions.iter().map(|f| f.labels.len()).sum()
    }

    fn ensure_index(&self) {
        let mut guard = self.func_index.write();
        if guard.is_none() {
            let mut map = AHashMap::with_capacity(self.functions.len());
            for (i, func) in self.functions.iter().enumerate() {
                map.insert(func.start.as_u64(), i);
            }
            *guard = Some(map);
        }
    }

    fn invalidate_index(&mut self) {
        *self.func_index.get_mut() = None;
    }
}

impl Default for AnalysisDatabase {
    fn default() -> Self {
        Self::new()
    }
}
