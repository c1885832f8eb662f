//! The conversion catalog: categories, types, and the unit registry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::formula::{Formula, FormulaError};

/// A group of related conversion types ("temperature", "length").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionCategory {
    pub id: u64,
    pub name: String,
    /// Globally unique among categories.
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub active: bool,
}

/// A single directed conversion (celsius to fahrenheit) and its formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionType {
    pub id: u64,
    pub category_id: u64,
    pub name: String,
    /// Globally unique among types.
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub input_unit: String,
    pub output_unit: String,
    /// Evaluated by [`crate::Formula`]; must parse before the type can
    /// be registered as active.
    pub formula: String,
    pub active: bool,
}

/// Errors while building a registry from catalog definitions.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("malformed catalog: {0}")]
    Parse(String),

    #[error("duplicate category: {0}")]
    DuplicateCategory(String),

    #[error("duplicate conversion type: {0}")]
    DuplicateType(String),

    #[error("conversion type `{slug}` references unknown category `{category}`")]
    UnknownCategory { slug: String, category: String },

    #[error("invalid formula for conversion type `{slug}`: {source}")]
    InvalidFormula {
        slug: String,
        #[source]
        source: FormulaError,
    },
}

/// Errors from read-path lookups.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// The type is absent, inactive, or sits in an inactive category.
    #[error("conversion type not found: {0}")]
    NotFound(String),

    /// The category is absent or inactive.
    #[error("conversion category not found: {0}")]
    CategoryNotFound(String),
}

/// Read-mostly catalog of conversion types.
///
/// Built once on the administrative path (`add_category`/`add_type`
/// need `&mut self`), then shared behind an `Arc`. Every read takes
/// `&self`, so concurrent lookups need no locking and nothing on the
/// read path can mutate the catalog.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    categories: IndexMap<u64, ConversionCategory>,
    types: IndexMap<u64, ConversionType>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self {
            categories: IndexMap::new(),
            types: IndexMap::new(),
        }
    }

    /// Add a category, rejecting duplicate ids or slugs.
    pub fn add_category(&mut self, category: ConversionCategory) -> Result<(), CatalogError> {
        if self.categories.contains_key(&category.id)
            || self.categories.values().any(|c| c.slug == category.slug)
        {
            return Err(CatalogError::DuplicateCategory(category.slug));
        }
        self.categories.insert(category.id, category);
        Ok(())
    }

    /// Add a conversion type.
    ///
    /// An active type must carry a parseable formula; malformed
    /// formulas are an activation-time error, never a conversion-time
    /// one. An inactive type may hold a broken formula.
    pub fn add_type(&mut self, ty: ConversionType) -> Result<(), CatalogError> {
        if self.types.contains_key(&ty.id) || self.types.values().any(|t| t.slug == ty.slug) {
            return Err(CatalogError::DuplicateType(ty.slug));
        }
        if !self.categories.contains_key(&ty.category_id) {
            return Err(CatalogError::UnknownCategory {
                category: ty.category_id.to_string(),
                slug: ty.slug,
            });
        }
        if ty.active {
            if let Err(source) = Formula::parse(&ty.formula) {
                return Err(CatalogError::InvalidFormula {
                    slug: ty.slug,
                    source,
                });
            }
        }
        self.types.insert(ty.id, ty);
        Ok(())
    }

    /// Look up an active type by id.
    ///
    /// Absent, inactive, and inactive-category all read as not found.
    pub fn resolve(&self, id: u64) -> Result<&ConversionType, RegistryError> {
        let ty = self
            .types
            .get(&id)
            .filter(|t| t.active)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if !self.category_active(ty.category_id) {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        Ok(ty)
    }

    /// Look up an active type by category slug and type slug.
    pub fn resolve_by_slug(
        &self,
        category_slug: &str,
        type_slug: &str,
    ) -> Result<&ConversionType, RegistryError> {
        let category = self
            .categories
            .values()
            .find(|c| c.active && c.slug == category_slug)
            .ok_or_else(|| RegistryError::CategoryNotFound(category_slug.to_string()))?;
        self.types
            .values()
            .find(|t| t.active && t.category_id == category.id && t.slug == type_slug)
            .ok_or_else(|| RegistryError::NotFound(format!("{category_slug}/{type_slug}")))
    }

    fn category_active(&self, id: u64) -> bool {
        self.categories.get(&id).is_some_and(|c| c.active)
    }

    /// A category by id, regardless of the active flag.
    pub fn category(&self, id: u64) -> Option<&ConversionCategory> {
        self.categories.get(&id)
    }

    /// A category by slug, regardless of the active flag (build path).
    pub fn category_by_slug(&self, slug: &str) -> Option<&ConversionCategory> {
        self.categories.values().find(|c| c.slug == slug)
    }

    /// Active categories in insertion order.
    pub fn categories(&self) -> impl Iterator<Item = &ConversionCategory> {
        self.categories.values().filter(|c| c.active)
    }

    /// Active types in active categories, in insertion order.
    pub fn types(&self) -> impl Iterator<Item = &ConversionType> {
        self.types
            .values()
            .filter(|t| t.active && self.category_active(t.category_id))
    }

    /// Number of registered types, active or not.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: u64, slug: &str, active: bool) -> ConversionCategory {
        ConversionCategory {
            id,
            name: slug.to_uppercase(),
            slug: slug.to_string(),
            description: String::new(),
            icon: String::new(),
            active,
        }
    }

    fn ctype(id: u64, category_id: u64, slug: &str, formula: &str, active: bool) -> ConversionType {
        ConversionType {
            id,
            category_id,
            name: slug.replace('-', " "),
            slug: slug.to_string(),
            description: String::new(),
            input_unit: "celsius".to_string(),
            output_unit: "fahrenheit".to_string(),
            formula: formula.to_string(),
            active,
        }
    }

    fn make_registry() -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        registry.add_category(category(1, "temperature", true)).unwrap();
        registry.add_category(category(2, "archived", false)).unwrap();
        registry
            .add_type(ctype(1, 1, "celsius-to-fahrenheit", "F = C × 9/5 + 32", true))
            .unwrap();
        registry
            .add_type(ctype(2, 1, "retired", "x + 1", false))
            .unwrap();
        registry
            .add_type(ctype(3, 2, "in-archived-category", "x + 1", true))
            .unwrap();
        registry
    }

    #[test]
    fn test_resolve_active_type() {
        let registry = make_registry();
        let ty = registry.resolve(1).unwrap();
        assert_eq!(ty.slug, "celsius-to-fahrenheit");
    }

    #[test]
    fn test_resolve_absent_and_inactive() {
        let registry = make_registry();
        assert!(matches!(registry.resolve(99), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.resolve(2), Err(RegistryError::NotFound(_))));
        // Active type, inactive category.
        assert!(matches!(registry.resolve(3), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_resolve_by_slug() {
        let registry = make_registry();
        let ty = registry
            .resolve_by_slug("temperature", "celsius-to-fahrenheit")
            .unwrap();
        assert_eq!(ty.id, 1);

        assert!(matches!(
            registry.resolve_by_slug("nope", "celsius-to-fahrenheit"),
            Err(RegistryError::CategoryNotFound(_))
        ));
        assert!(matches!(
            registry.resolve_by_slug("archived", "in-archived-category"),
            Err(RegistryError::CategoryNotFound(_))
        ));
        assert!(matches!(
            registry.resolve_by_slug("temperature", "in-archived-category"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_active_formula_must_parse() {
        let mut registry = UnitRegistry::new();
        registry.add_category(category(1, "temperature", true)).unwrap();

        let err = registry
            .add_type(ctype(10, 1, "broken", "x + (", true))
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidFormula { .. }));

        // The same formula is fine while the type stays inactive.
        registry
            .add_type(ctype(10, 1, "broken", "x + (", false))
            .unwrap();
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut registry = make_registry();
        assert!(matches!(
            registry.add_category(category(9, "temperature", true)),
            Err(CatalogError::DuplicateCategory(_))
        ));
        assert!(matches!(
            registry.add_type(ctype(9, 1, "celsius-to-fahrenheit", "x", true)),
            Err(CatalogError::DuplicateType(_))
        ));
        assert!(matches!(
            registry.add_type(ctype(1, 1, "fresh-slug", "x", true)),
            Err(CatalogError::DuplicateType(_))
        ));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut registry = UnitRegistry::new();
        assert!(matches!(
            registry.add_type(ctype(1, 42, "orphan", "x", true)),
            Err(CatalogError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_iterators_hide_inactive() {
        let registry = make_registry();
        let categories: Vec<_> = registry.categories().map(|c| c.slug.as_str()).collect();
        assert_eq!(categories, vec!["temperature"]);

        let types: Vec<_> = registry.types().map(|t| t.slug.as_str()).collect();
        assert_eq!(types, vec!["celsius-to-fahrenheit"]);
        assert_eq!(registry.len(), 3);
    }
}
