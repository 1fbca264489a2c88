use crate::database::image::{Architecture, ImageFormat};

/// ABI contract for argument passing and stack cleanup. Raw codes follow the
/// compiler-model convention byte (high nibble selects the convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    Invalid,
    Unknown,
    VoidArg,
    Cdecl,
    CdeclEllipsis,
    Stdcall,
    Pascal,
    Fastcall,
    Thiscall,
    Manual,
    Spoiled,
    Reserved,
    SpecialEllipsis,
    SpecialPstack,
    Special,
}

impl CallingConvention {
    /// Maps a convention byte to a convention. Codes outside the table yield
    /// None, which the snapshot pass serializes as null.
    pub fn from_raw(cc: u8) -> Option<Self> {
        match cc {
            0x00 => Some(CallingConvention::Invalid),
            0x10 => Some(CallingConvention::Unknown),
            0x20 => Some(CallingConvention::VoidArg),
            0x30 => Some(CallingConvention::Cdecl),
            0x40 => Some(CallingConvention::CdeclEllipsis),
            0x50 => Some(CallingConvention::Stdcall),
            0x60 => Some(CallingConvention::Pascal),
            0x70 => Some(CallingConvention::Fastcall),
            0x80 => Some(CallingConvention::Thiscall),
            0x90 => Some(CallingConvention::Manual),
            0xA0 => Some(CallingConvention::Spoiled),
            0xB0 | 0xC0 => Some(CallingConvention::Reserved),
            0xD0 => Some(CallingConvention::SpecialEllipsis),
            0xE0 => Some(CallingConvention::SpecialPstack),
            0xF0 => Some(CallingConvention::Special),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallingConvention::Invalid => "invalid",
            CallingConvention::Unknown => "unknown",
            CallingConvention::VoidArg => "voidarg",
            CallingConvention::Cdecl => "cdecl",
            CallingConvention::CdeclEllipsis => "cdecl_ellipsis",
            CallingConvention::Stdcall => "stdcall",
            CallingConvention::Pascal => "pascal",
            CallingConvention::Fastcall => "fastcall",
            CallingConvention::Thiscall => "thiscall",
            CallingConvention::Manual => "manual",
            CallingConvention::Spoiled => "spoiled",
            CallingConvention::Reserved => "reserved",
            CallingConvention::SpecialEllipsis => "special_ellipsis",
            CallingConvention::SpecialPstack => "special_pstack",
            CallingConvention::Special => "special",
        }
    }

    /// Platform default recorded by the ABI: the 64-bit and ARM conventions
    /// pass arguments in registers (the fastcall slot), 32-bit ELF code is
    /// cdecl. PE32 stays unknown until a name decoration says otherwise.
    pub fn default_for(arch: Architecture, format: ImageFormat) -> Self {
        match (arch, format) {
            (Architecture::X64, _) => CallingConvention::Fastcall,
            (Architecture::Arm64, _) => CallingConvention::Fastcall,
            (Architecture::Arm, _) => CallingConvention::Fastcall,
            (Architecture::X86, ImageFormat::Elf) => CallingConvention::Cdecl,
            (Architecture::X86, ImageFormat::MachO) => CallingConvention::Cdecl,
            _ => CallingConvention::Unknown,
        }
    }
}

/// Where an argument lives at the call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgLocation {
    None,
    Stack,
    Distributed,
    RegisterOne,
    RegisterPair,
    RegisterRelative,
    GlobalAddress,
    Custom,
}

impl ArgLocation {
    pub fn from_atype(atype: u32) -> Self {
        match atype {
            0 => ArgLocation::None,
            1 => ArgLocation::Stack,
            2 => ArgLocation::Distributed,
            3 => ArgLocation::RegisterOne,
            4 => ArgLocation::RegisterPair,
            5 => ArgLocation::RegisterRelative,
            6 => ArgLocation::GlobalAddress,
            _ => ArgLocation::Custom,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArgLocation::None => "none",
            ArgLocation::Stack => "stack",
            ArgLocation::Distributed => "distributed",
            ArgLocation::RegisterOne => "register_one",
            ArgLocation::RegisterPair => "register_pair",
            ArgLocation::RegisterRelative => "register_relative",
            ArgLocation::GlobalAddress => "global_address",
            ArgLocation::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub type_name: String,
    pub location: ArgLocation,
}

impl Argument {
    pub fn new(name: &str, type_name: &str, location: ArgLocation) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub convention: Option<CallingConvention>,
    pub return_type: String,
    pub arguments: Vec<Argument>,
}

impl FunctionSignature {
    pub fn new(convention: CallingConvention) -> Self {
        Self {
            convention: Some(convention),
            return_type: String::new(),
            arguments: Vec::new(),
        }
    }

    pub fn from_raw_convention(cc: u8) -> Self {
        Self {
            convention: CallingConvention::from_raw(cc),
            return_type: String::new(),
            arguments: Vec::new(),
        }
    }

    pub fn with_return_type(mut self, return_type: &str) -> Self {
        self.return_type = return_type.to_string();
        self
    }

    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convention_table() {
        assert_eq!(
            CallingConvention::from_raw(0x30),
            Some(CallingConvention::Cdecl)
        );
        assert_eq!(
            CallingConvention::from_raw(0x50),
            Some(CallingConvention::Stdcall)
        );
        assert_eq!(
            CallingConvention::from_raw(0x80),
            Some(CallingConvention::Thiscall)
        );
        assert_eq!(
            CallingConvention::from_raw(0xB0),
            Some(CallingConvention::Reserved)
        );
        assert_eq!(
            CallingConvention::from_raw(0xC0),
            Some(CallingConvention::Reserved)
        );
        assert_eq!(CallingConvention::from_raw(0x15), None);
    }

    #[test]
    fn test_convention_strings() {
        assert_eq!(CallingConvention::CdeclEllipsis.as_str(), "cdecl_ellipsis");
        assert_eq!(
            CallingConvention::SpecialEllipsis.as_str(),
            "special_ellipsis"
        );
        assert_eq!(CallingConvention::VoidArg.as_str(), "voidarg");
    }

    #[test]
    fn test_argloc_table() {
        assert_eq!(ArgLocation::from_atype(0), ArgLocation::None);
        assert_eq!(ArgLocation::from_atype(1), ArgLocation::Stack);
        assert_eq!(ArgLocation::from_atype(6), ArgLocation::GlobalAddress);
        assert_eq!(ArgLocation::from_atype(7), ArgLocation::Custom);
        assert_eq!(ArgLocation::from_atype(99), ArgLocation::Custom);
    }

    #[test]
    fn test_platform_defaults() {
        assert_eq!(
            CallingConvention::default_for(Architecture::X64, ImageFormat::Pe),
            CallingConvention::Fastcall
        );
        assert_eq!(
            CallingConvention::default_for(Architecture::X86, ImageFormat::Elf),
            CallingConvention::Cdecl
        );
        assert_eq!(
            CallingConvention::default_for(Architecture::X86, ImageFormat::Pe),
            CallingConvention::Unknown
        );
    }

    #[test]
    fn test_signature_builder() {
        let sig = FunctionSignature::new(CallingConvention::Stdcall)
            .with_return_type("int")
            .with_argument(Argument::new("hwnd", "HWND", ArgLocation::Stack));
        assert_eq!(sig.return_type, "int");
        assert_eq!(sig.arguments.len(), 1);
        assert_eq!(sig.arguments[0].location, ArgLocation::Stack);
    }
}
