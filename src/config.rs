use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    pub input: Option<PathBuf>,
    pub output_file: PathBuf,
    pub pretty: bool,
    pub indent: usize,
    pub include_labels: bool,
    pub filter: Option<String>,
    pub threads: usize,
    pub image_base_override: Option<u64>,
    pub text_report: Option<PathBuf>,
    pub markdown_report: Option<PathBuf>,
    pub enable_progress_bars: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            input: None,
            output_file: PathBuf::from("snapshot.json"),
            pretty: true,
            indent: 4,
            include_labels: true,
            filter: None,
            threads: num_cpus::get(),
            image_base_override: None,
            text_report: None,
            markdown_report: None,
            enable_progress_bars: true,
        }
    }
}

impl DumpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: PathBuf) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output_file(mut self, output: PathBuf) -> Self {
        self.output_file = output;
        self
    }

    pub fn with_filter(mut self, filter: String) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.input.is_none() {
            return Err("input image must be set".to_string());
        }
        if self.threads == 0 {
            return Err("threads must be greater than 0".to_string());
        }
        if self.indent > 16 {
            return Err("indent must be at most 16 spaces".to_string());
        }
        if let Some(filter) = &self.filter {
            if filter.is_empty() {
                return Err("filter must not be empty".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DumpConfig::default();
        assert!(config.pretty);
        assert_eq!(config.indent, 4);
        assert!(config.include_labels);
        assert!(config.threads >= 1);
        assert_eq!(config.output_file, PathBuf::from("snapshot.json"));
    }

    #[test]
    fn test_validate_requires_input() {
        assert!(DumpConfig::default().validate().is_err());
        let config = DumpConfig::default().with_input(PathBuf::from("app.exe"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let config = DumpConfig::default()
            .with_input(PathBuf::from("app.exe"))
            .with_threads(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_filter() {
        let config = DumpConfig::default()
            .with_input(PathBuf::from("app.exe"))
            .with_filter(String::new());
        assert!(config.validate().is_err());
    }
}
