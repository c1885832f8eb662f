//! Registry of available file converters.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::converter::{Converter, ConverterDecl, normalize_format};

/// Converters keyed by normalized `(input_format, output_format)`.
///
/// Lookup is exact pair match: registering json→yaml and yaml→toml
/// does not make json→toml convertible. Chains are the caller's
/// business, never the registry's.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: IndexMap<(String, String), Arc<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter under its declared format pair.
    ///
    /// Registering a second converter for the same pair replaces the
    /// first.
    pub fn register(&mut self, converter: impl Converter + 'static) {
        let decl = converter.decl();
        let key = (
            normalize_format(&decl.input_format),
            normalize_format(&decl.output_format),
        );
        self.converters.insert(key, Arc::new(converter));
    }

    /// Find the converter for a format pair, if any.
    pub fn lookup(&self, input_format: &str, output_format: &str) -> Option<Arc<dyn Converter>> {
        let key = (normalize_format(input_format), normalize_format(output_format));
        self.converters.get(&key).cloned()
    }

    pub fn contains(&self, input_format: &str, output_format: &str) -> bool {
        self.lookup(input_format, output_format).is_some()
    }

    /// All registered declarations, in registration order.
    pub fn declarations(&self) -> impl Iterator<Item = &ConverterDecl> {
        self.converters.values().map(|c| c.decl())
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}
