//! Serde-based format converters for ConvertHub.
//!
//! This crate provides converters between data serialization formats
//! using the serde ecosystem. Enable formats via feature flags.
//!
//! # Features
//!
//! ## Text formats (human-readable)
//! - `json` (default) - JSON via serde_json
//! - `yaml` (default) - YAML via serde_yaml
//! - `toml` (default) - TOML via toml
//!
//! ## Text transforms
//! - `markdown` - Markdown to HTML conversion
//!
//! ## Feature group
//! - `all` - All formats

use converthub::{ConvertError, Converter, ConverterDecl, ConverterRegistry, Properties, Value};

/// Register all enabled converters with the registry.
pub fn register_all(registry: &mut ConverterRegistry) {
    let formats = enabled_formats();

    // Register converters between all pairs of enabled formats
    for from in &formats {
        for to in &formats {
            if from != to {
                registry.register(SerdeConverter::new(from, to));
            }
        }
    }

    // Register text transform converters
    #[cfg(feature = "markdown")]
    {
        registry.register(MarkdownToHtml::new("md"));
        registry.register(MarkdownToHtml::new("markdown"));
    }
}

/// Get list of enabled formats based on feature flags.
pub fn enabled_formats() -> Vec<&'static str> {
    [
        #[cfg(feature = "json")]
        "json",
        #[cfg(feature = "yaml")]
        "yaml",
        #[cfg(feature = "toml")]
        "toml",
    ]
    .into()
}

/// A converter between two serde-compatible formats.
pub struct SerdeConverter {
    decl: ConverterDecl,
    from: &'static str,
    to: &'static str,
}

impl SerdeConverter {
    pub fn new(from: &'static str, to: &'static str) -> Self {
        let id = format!("serde.{}-to-{}", from, to);
        let decl = ConverterDecl::new(&id, from, to).description(format!(
            "Convert {} to {} via serde",
            from.to_uppercase(),
            to.to_uppercase()
        ));

        Self { decl, from, to }
    }
}

impl Converter for SerdeConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn convert(&self, input: &[u8], options: &Properties) -> Result<Vec<u8>, ConvertError> {
        // Deserialize from source format
        let value: serde_json::Value = deserialize(self.from, input)?;

        // Serialize to target format
        serialize(self.to, &value, options)
    }
}

// ============================================
// Markdown → HTML
// ============================================

#[cfg(feature = "markdown")]
mod markdown_impl {
    use super::*;
    use pulldown_cmark::{Parser, html};

    /// Convert Markdown to HTML.
    ///
    /// Registered once per accepted input format so that both `md` and
    /// `markdown` resolve to it.
    pub struct MarkdownToHtml {
        decl: ConverterDecl,
    }

    impl MarkdownToHtml {
        pub fn new(input_format: &str) -> Self {
            let decl = ConverterDecl::new(
                format!("text.{}-to-html", input_format),
                input_format,
                "html",
            )
            .description("Convert Markdown to HTML");

            Self { decl }
        }
    }

    impl Converter for MarkdownToHtml {
        fn decl(&self) -> &ConverterDecl {
            &self.decl
        }

        fn convert(&self, input: &[u8], _options: &Properties) -> Result<Vec<u8>, ConvertError> {
            let text = std::str::from_utf8(input)
                .map_err(|e| ConvertError::InvalidInput(format!("Invalid UTF-8: {}", e)))?;

            let parser = Parser::new(text);
            let mut html_output = String::new();
            html::push_html(&mut html_output, parser);

            Ok(html_output.into_bytes())
        }
    }
}

#[cfg(feature = "markdown")]
pub use markdown_impl::MarkdownToHtml;

// ============================================
// Format dispatch
// ============================================

fn deserialize(format: &str, data: &[u8]) -> Result<serde_json::Value, ConvertError> {
    match format {
        #[cfg(feature = "json")]
        "json" => serde_json::from_slice(data)
            .map_err(|e| ConvertError::InvalidInput(format!("Invalid JSON: {}", e))),

        #[cfg(feature = "yaml")]
        "yaml" => serde_yaml::from_slice(data)
            .map_err(|e| ConvertError::InvalidInput(format!("Invalid YAML: {}", e))),

        #[cfg(feature = "toml")]
        "toml" => {
            let s = std::str::from_utf8(data)
                .map_err(|e| ConvertError::InvalidInput(format!("Invalid UTF-8: {}", e)))?;
            toml::from_str(s)
                .map_err(|e| ConvertError::InvalidInput(format!("Invalid TOML: {}", e)))
        }

        _ => Err(ConvertError::Failed(format!(
            "no decoder for format: {}",
            format
        ))),
    }
}

fn serialize(
    format: &str,
    value: &serde_json::Value,
    options: &Properties,
) -> Result<Vec<u8>, ConvertError> {
    match format {
        #[cfg(feature = "json")]
        "json" => {
            // `pretty = false` requests compact output
            let pretty = options.get("pretty").and_then(Value::as_bool).unwrap_or(true);
            let out = if pretty {
                serde_json::to_vec_pretty(value)
            } else {
                serde_json::to_vec(value)
            };
            out.map_err(|e| ConvertError::Failed(format!("JSON serialization failed: {}", e)))
        }

        #[cfg(feature = "yaml")]
        "yaml" => serde_yaml::to_string(value)
            .map(|s| s.into_bytes())
            .map_err(|e| ConvertError::Failed(format!("YAML serialization failed: {}", e))),

        #[cfg(feature = "toml")]
        "toml" => toml::to_string_pretty(value)
            .map(|s| s.into_bytes())
            .map_err(|e| ConvertError::Failed(format!("TOML serialization failed: {}", e))),

        _ => Err(ConvertError::Failed(format!(
            "no encoder for format: {}",
            format
        ))),
    }
}
