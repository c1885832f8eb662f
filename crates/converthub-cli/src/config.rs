//! Catalog loading for the CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use converthub::{Catalog, CategoryDef, TypeDef, UnitRegistry};
use tracing::debug;

/// Build the unit registry for this invocation.
///
/// An explicit path must load, or the command fails. Without one, a
/// catalog at the default location is used when present; if it is
/// unreadable or invalid a warning goes to stderr and the built-in
/// catalog takes over.
pub fn load_catalog(path: Option<&Path>) -> Result<UnitRegistry> {
    if let Some(path) = path {
        return registry_from_file(path)
            .with_context(|| format!("failed to load catalog {}", path.display()));
    }

    if let Some(path) = default_catalog_path().filter(|p| p.exists()) {
        match registry_from_file(&path) {
            Ok(registry) => {
                debug!(path = %path.display(), "loaded user catalog");
                return Ok(registry);
            }
            Err(e) => eprintln!("Warning: ignoring catalog {}: {}", path.display(), e),
        }
    }

    debug!("using built-in catalog");
    builtin_catalog()
        .into_registry()
        .context("built-in catalog is invalid")
}

fn registry_from_file(path: &Path) -> Result<UnitRegistry> {
    let contents = std::fs::read_to_string(path)?;
    let catalog = Catalog::from_toml_str(&contents)?;
    Ok(catalog.into_registry()?)
}

/// Get the default catalog file path (~/.config/converthub/catalog.toml).
pub fn default_catalog_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("converthub").join("catalog.toml"))
}

/// The catalog shipped with the CLI.
pub fn builtin_catalog() -> Catalog {
    fn category(name: &str, slug: &str, description: &str) -> CategoryDef {
        CategoryDef {
            name: name.into(),
            slug: slug.into(),
            description: description.into(),
            icon: String::new(),
            active: true,
        }
    }

    fn ctype(
        category: &str,
        name: &str,
        slug: &str,
        input_unit: &str,
        output_unit: &str,
        formula: &str,
    ) -> TypeDef {
        TypeDef {
            category: category.into(),
            name: name.into(),
            slug: slug.into(),
            description: String::new(),
            input_unit: input_unit.into(),
            output_unit: output_unit.into(),
            formula: formula.into(),
            active: true,
        }
    }

    Catalog {
        categories: vec![
            category("Temperature", "temperature", "Temperature scales"),
            category("Length", "length", "Distance and length"),
            category("Weight", "weight", "Mass and weight"),
        ],
        types: vec![
            ctype(
                "temperature",
                "Celsius to Fahrenheit",
                "celsius-to-fahrenheit",
                "celsius",
                "fahrenheit",
                "F = C × 9/5 + 32",
            ),
            ctype(
                "temperature",
                "Fahrenheit to Celsius",
                "fahrenheit-to-celsius",
                "fahrenheit",
                "celsius",
                "C = (F - 32) × 5/9",
            ),
            ctype(
                "length",
                "Kilometers to Miles",
                "kilometers-to-miles",
                "kilometers",
                "miles",
                "mi = km × 0.621371",
            ),
            ctype(
                "length",
                "Miles to Kilometers",
                "miles-to-kilometers",
                "miles",
                "kilometers",
                "km = mi × 1.609344",
            ),
            ctype(
                "weight",
                "Kilograms to Pounds",
                "kilograms-to-pounds",
                "kilograms",
                "pounds",
                "lb = kg × 2.2046226218",
            ),
            ctype(
                "weight",
                "Pounds to Kilograms",
                "pounds-to-kilograms",
                "pounds",
                "kilograms",
                "kg = lb ÷ 2.2046226218",
            ),
        ],
    }
}
