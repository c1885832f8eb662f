//! The converter capability and its declaration.

use serde::{Deserialize, Serialize};

use crate::properties::Properties;

/// Normalize a format identifier: trim, drop one leading dot, ASCII
/// lowercase. `".JSON"`, `"json"` and `"Json "` all name one format.
pub fn normalize_format(format: &str) -> String {
    format
        .trim()
        .trim_start_matches('.')
        .trim()
        .to_ascii_lowercase()
}

/// Static description of a converter: what it reads and what it
/// writes. Formats are normalized at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterDecl {
    /// Unique id, conventionally `family.from-to-to`.
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub input_format: String,
    pub output_format: String,
}

impl ConverterDecl {
    pub fn new(id: impl Into<String>, input_format: &str, output_format: &str) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            input_format: normalize_format(input_format),
            output_format: normalize_format(output_format),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Errors a converter can raise.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("conversion failed: {0}")]
    Failed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing required option: {0}")]
    MissingOption(String),

    /// Wrap any other error type.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A byte-to-byte file conversion between one format pair.
///
/// Implementations must be thread safe; the pipeline may run them from
/// a worker thread while other threads register nothing and read
/// everything.
pub trait Converter: Send + Sync {
    /// The converter's declaration.
    fn decl(&self) -> &ConverterDecl;

    /// Convert input bytes, honoring any recognized options.
    fn convert(&self, input: &[u8], options: &Properties) -> Result<Vec<u8>, ConvertError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough {
        decl: ConverterDecl,
    }

    impl Converter for Passthrough {
        fn decl(&self) -> &ConverterDecl {
            &self.decl
        }

        fn convert(&self, input: &[u8], _options: &Properties) -> Result<Vec<u8>, ConvertError> {
            Ok(input.to_vec())
        }
    }

    #[test]
    fn test_normalize_format() {
        assert_eq!(normalize_format("PNG"), "png");
        assert_eq!(normalize_format(".json"), "json");
        assert_eq!(normalize_format("  .Yaml  "), "yaml");
        assert_eq!(normalize_format("webp"), "webp");
    }

    #[test]
    fn test_decl_normalizes_formats() {
        let decl = ConverterDecl::new("test.a-to-b", ".JSON", "Yaml ")
            .description("json to yaml");
        assert_eq!(decl.input_format, "json");
        assert_eq!(decl.output_format, "yaml");
        assert_eq!(decl.description, "json to yaml");
    }

    #[test]
    fn test_converter_object_safety() {
        let converter: Box<dyn Converter> = Box::new(Passthrough {
            decl: ConverterDecl::new("test.pass", "txt", "txt"),
        });
        let out = converter.convert(b"hello", &Properties::new()).unwrap();
        assert_eq!(out, b"hello");
    }
}
