//! The conversion engine: resolve a type, validate units, evaluate.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::formula::{Formula, FormulaError, RESULT_SCALE};
use crate::units::{RegistryError, UnitRegistry};

/// Errors from a single conversion request.
///
/// Registry and formula failures pass through with their kind intact;
/// a caller can still tell a missing type from a division by zero.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(
        "unit mismatch for `{type_slug}`: converts {expected_input} to {expected_output}, \
         requested {requested_input} to {requested_output}"
    )]
    UnitMismatch {
        type_slug: String,
        expected_input: String,
        expected_output: String,
        requested_input: String,
        requested_output: String,
    },

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// The outcome of one conversion: the value plus a snapshot of what
/// produced it, ready to become an audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub type_id: u64,
    pub type_slug: String,
    pub input_value: Decimal,
    pub output_value: Decimal,
    /// Units as declared on the type, not as requested.
    pub input_unit: String,
    pub output_unit: String,
}

/// Stateless front end over a shared [`UnitRegistry`].
///
/// Holds nothing but the registry handle; every call resolves fresh,
/// so concurrent conversions never contend.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    registry: Arc<UnitRegistry>,
}

impl ConversionEngine {
    pub fn new(registry: Arc<UnitRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    /// Convert `input_value` using the type identified by `type_id`.
    ///
    /// The requested units must both match the type's declared pair
    /// (ASCII case-insensitive, surrounding whitespace ignored).
    /// Nothing is persisted here; see [`crate::HistoryStore`].
    pub fn convert(
        &self,
        type_id: u64,
        input_value: Decimal,
        input_unit: &str,
        output_unit: &str,
    ) -> Result<ConversionResult, ConversionError> {
        let ty = self.registry.resolve(type_id)?;

        let input_ok = ty.input_unit.eq_ignore_ascii_case(input_unit.trim());
        let output_ok = ty.output_unit.eq_ignore_ascii_case(output_unit.trim());
        if !input_ok || !output_ok {
            return Err(ConversionError::UnitMismatch {
                type_slug: ty.slug.clone(),
                expected_input: ty.input_unit.clone(),
                expected_output: ty.output_unit.clone(),
                requested_input: input_unit.to_string(),
                requested_output: output_unit.to_string(),
            });
        }

        let output_value = Formula::parse(&ty.formula)?.eval(input_value)?;

        // Snapshot the input at storage precision so the record shows
        // both values with the same scale.
        let mut input_snapshot = input_value;
        input_snapshot.rescale(RESULT_SCALE);

        Ok(ConversionResult {
            type_id: ty.id,
            type_slug: ty.slug.clone(),
            input_value: input_snapshot,
            output_value,
            input_unit: ty.input_unit.clone(),
            output_unit: ty.output_unit.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{ConversionCategory, ConversionType};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn make_engine() -> ConversionEngine {
        let mut registry = UnitRegistry::new();
        registry
            .add_category(ConversionCategory {
                id: 1,
                name: "Temperature".into(),
                slug: "temperature".into(),
                description: String::new(),
                icon: String::new(),
                active: true,
            })
            .unwrap();
        registry
            .add_type(ConversionType {
                id: 1,
                category_id: 1,
                name: "Celsius to Fahrenheit".into(),
                slug: "celsius-to-fahrenheit".into(),
                description: String::new(),
                input_unit: "celsius".into(),
                output_unit: "fahrenheit".into(),
                formula: "F = C × 9/5 + 32".into(),
                active: true,
            })
            .unwrap();
        registry
            .add_type(ConversionType {
                id: 2,
                category_id: 1,
                name: "Fahrenheit to Celsius".into(),
                slug: "fahrenheit-to-celsius".into(),
                description: String::new(),
                input_unit: "fahrenheit".into(),
                output_unit: "celsius".into(),
                formula: "C = (F - 32) × 5/9".into(),
                active: true,
            })
            .unwrap();
        registry
            .add_type(ConversionType {
                id: 3,
                category_id: 1,
                name: "Degenerate".into(),
                slug: "degenerate".into(),
                description: String::new(),
                input_unit: "celsius".into(),
                output_unit: "celsius".into(),
                formula: "x / (x - x)".into(),
                active: true,
            })
            .unwrap();
        ConversionEngine::new(Arc::new(registry))
    }

    #[test]
    fn test_boiling_point() {
        let engine = make_engine();
        let result = engine
            .convert(1, dec("100.0000000000"), "celsius", "fahrenheit")
            .unwrap();
        assert_eq!(result.output_value.to_string(), "212.0000000000");
        assert_eq!(result.input_value.to_string(), "100.0000000000");
        assert_eq!(result.type_slug, "celsius-to-fahrenheit");
        assert_eq!(result.input_unit, "celsius");
        assert_eq!(result.output_unit, "fahrenheit");
    }

    #[test]
    fn test_round_trip_is_lossless_here() {
        let engine = make_engine();
        let there = engine.convert(1, dec("40.5"), "celsius", "fahrenheit").unwrap();
        let back = engine
            .convert(2, there.output_value, "fahrenheit", "celsius")
            .unwrap();
        assert_eq!(back.output_value, dec("40.5"));
    }

    #[test]
    fn test_unit_mismatch_on_every_wrong_pair() {
        let engine = make_engine();
        for (input, output) in [
            ("kelvin", "fahrenheit"),
            ("celsius", "kelvin"),
            ("kelvin", "kelvin"),
            ("fahrenheit", "celsius"),
        ] {
            let err = engine.convert(1, dec("1"), input, output).unwrap_err();
            assert!(
                matches!(err, ConversionError::UnitMismatch { .. }),
                "{input}->{output} should mismatch"
            );
        }
    }

    #[test]
    fn test_units_compare_case_insensitively() {
        let engine = make_engine();
        let result = engine.convert(1, dec("0"), "Celsius", " FAHRENHEIT ").unwrap();
        assert_eq!(result.output_value.to_string(), "32.0000000000");
        // Echoed units keep the catalog casing.
        assert_eq!(result.input_unit, "celsius");
    }

    #[test]
    fn test_registry_errors_pass_through() {
        let engine = make_engine();
        let err = engine.convert(99, dec("1"), "celsius", "fahrenheit").unwrap_err();
        assert!(matches!(
            err,
            ConversionError::Registry(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_formula_errors_keep_their_kind() {
        let engine = make_engine();
        let err = engine.convert(3, dec("7"), "celsius", "celsius").unwrap_err();
        assert!(matches!(
            err,
            ConversionError::Formula(FormulaError::DivisionByZero)
        ));
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let engine = make_engine();
        let a = engine.convert(1, dec("36.6"), "celsius", "fahrenheit").unwrap();
        let b = engine.convert(1, dec("36.6"), "celsius", "fahrenheit").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.output_value.to_string(), b.output_value.to_string());
    }
}
