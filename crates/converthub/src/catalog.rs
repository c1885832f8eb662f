//! Declarative conversion catalogs.
//!
//! A catalog is a TOML document listing categories and conversion
//! types. Ids are not written by hand; they are assigned in file order
//! when the catalog is turned into a [`UnitRegistry`].
//!
//! ```toml
//! [[categories]]
//! name = "Temperature"
//! slug = "temperature"
//!
//! [[types]]
//! category = "temperature"
//! name = "Celsius to Fahrenheit"
//! slug = "celsius-to-fahrenheit"
//! input_unit = "celsius"
//! output_unit = "fahrenheit"
//! formula = "F = C × 9/5 + 32"
//! ```

use serde::{Deserialize, Serialize};

use crate::units::{CatalogError, ConversionCategory, ConversionType, UnitRegistry};

/// A parsed catalog document, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub categories: Vec<CategoryDef>,
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

/// A category definition as written in a catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDef {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// A conversion type definition as written in a catalog file.
///
/// `category` refers to a category by slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub category: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub input_unit: String,
    pub output_unit: String,
    pub formula: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Catalog {
    /// Parse a catalog from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
        toml::from_str(text).map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Serialize back to TOML text.
    pub fn to_toml_string(&self) -> Result<String, CatalogError> {
        toml::to_string_pretty(self).map_err(|e| CatalogError::Parse(e.to_string()))
    }

    /// Validate and build a registry, assigning 1-based ids in file
    /// order (categories and types number independently).
    pub fn into_registry(self) -> Result<UnitRegistry, CatalogError> {
        let mut registry = UnitRegistry::new();
        for (idx, def) in self.categories.into_iter().enumerate() {
            registry.add_category(ConversionCategory {
                id: idx as u64 + 1,
                name: def.name,
                slug: def.slug,
                description: def.description,
                icon: def.icon,
                active: def.active,
            })?;
        }
        for (idx, def) in self.types.into_iter().enumerate() {
            let category_id = registry
                .category_by_slug(&def.category)
                .map(|c| c.id)
                .ok_or_else(|| CatalogError::UnknownCategory {
                    category: def.category.clone(),
                    slug: def.slug.clone(),
                })?;
            registry.add_type(ConversionType {
                id: idx as u64 + 1,
                category_id,
                name: def.name,
                slug: def.slug,
                description: def.description,
                input_unit: def.input_unit,
                output_unit: def.output_unit,
                formula: def.formula,
                active: def.active,
            })?;
        }
        Ok(registry)
    }
}
