use serde::{Deserialize, Serialize};

/// The document consumed by the symbol-server pipeline. Field names and
/// their order are part of the contract; additions go elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub general: GeneralRecord,
    pub segments: Vec<SegmentRecord>,
    pub exports: Vec<ExportRecord>,
    pub functions: Vec<FunctionRecord>,
    pub names: Vec<NameRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralRecord {
    pub filename: String,
    pub architecture: String,
    pub bitness: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub name: String,
    pub start_rva: u64,
    #[serde(rename = "type")]
    pub class: String,
    pub selector: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub ordinal: u64,
    pub rva: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub start_rva: u64,
    pub name: String,
    pub is_public: bool,
    pub is_autonamed: bool,
    pub calling_convention: Option<String>,
    pub return_type: String,
    pub arguments: Vec<ArgumentRecord>,
    pub labels: Vec<LabelRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub argument_location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRecord {
    pub offset: u64,
    pub name: String,
    pub is_public: bool,
    pub is_autonamed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRecord {
    pub rva: u64,
    pub name: String,
    pub is_public: bool,
    pub is_func: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_keys_renamed() {
        let seg = SegmentRecord {
            name: ".text".to_string(),
            start_rva: 0x1000,
            class: "CODE".to_string(),
            selector: 1,
        };
        let value = serde_json::to_value(&seg).unwrap();
        assert_eq!(value["type"], "CODE");
        assert!(value.get("class").is_none());

        let arg = ArgumentRecord {
            name: "ctx".to_string(),
            type_name: "void *".to_string(),
            argument_location: "register_one".to_string(),
        };
        let value = serde_json::to_value(&arg).unwrap();
        assert_eq!(value["type"], "void *");
        assert_eq!(value["argument_location"], "register_one");
    }

    #[test]
    fn test_function_record_key_order() {
        let func = FunctionRecord {
            start_rva: 0x1000,
            name: "main".to_string(),
            is_public: true,
            is_autonamed: false,
            calling_convention: Some("cdecl".to_string()),
            return_type: "int".to_string(),
            arguments: Vec::new(),
            labels: Vec::new(),
        };
        let json = serde_json::to_string(&func).unwrap();
        let start = json.find("start_rva").unwrap();
        let name = json.find("\"name\"").unwrap();
        let cc = json.find("calling_convention").unwrap();
        let labels = json.find("labels").unwrap();
        assert!(start < name && name < cc && cc < labels);
    }

    #[test]
    fn test_null_convention() {
        let func = FunctionRecord {
            start_rva: 0,
            name: "f".to_string(),
            is_public: false,
            is_autonamed: false,
            calling_convention: None,
            return_type: String::new(),
            arguments: Vec::new(),
            labels: Vec::new(),
        };
        let value = serde_json::to_value(&func).unwrap();
        assert!(value["calling_convention"].is_null());
    }
}
