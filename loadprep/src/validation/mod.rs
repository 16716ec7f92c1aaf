//! JSON Schema validation for pipeline recipes.
//!
//! Recipe documents are checked against a JSON Schema Draft 7 before they
//! are deserialized, so a typo in a step type or parameter name is reported
//! as a schema violation rather than a bare serde message.
//!
//! # Embedded Schema
//!
//! The schema is embedded at compile time from the `schemas/` directory:
//! - `pipeline-recipe.json`
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use loadprep::{validate_recipe, is_valid_recipe};
//!
//! let recipe = json!({
//!     "sources": { "raw": { "path": "catalog.csv" } },
//!     "steps": [
//!         { "type": "build", "name": "artists", "from": "raw", "columns": ["artist"] }
//!     ]
//! });
//! assert!(validate_recipe(&recipe).is_ok());
//! assert!(!is_valid_recipe(&json!({ "steps": [{ "type": "explode" }] })));
//! ```

use serde_json::Value;

use crate::error::ValidationError;

const RECIPE_SCHEMA: &str = include_str!("../../schemas/pipeline-recipe.json");

/// Validate a JSON document against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation otherwise
///
/// # Example
/// ```ignore
/// use serde_json::json;
/// use loadprep::validation::validate;
///
/// let schema = json!({
///     "type": "object",
///     "required": ["name"],
///     "properties": {
///         "name": { "type": "string" }
///     }
/// });
///
/// assert!(validate(&schema, &json!({ "name": "test" })).is_ok());
/// assert!(validate(&schema, &json!({ "age": 42 })).is_err());
/// ```
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Simpler variant: just true/false.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// The embedded recipe schema.
pub fn recipe_schema() -> Result<Value, ValidationError> {
    serde_json::from_str(RECIPE_SCHEMA).map_err(|e| ValidationError::InvalidSchema(e.to_string()))
}

/// Validate a recipe document against the recipe schema.
pub fn validate_recipe(data: &Value) -> Result<(), ValidationError> {
    let schema = recipe_schema()?;
    validate(&schema, data).map_err(|errors| ValidationError::SchemaError { errors })
}

/// Quick check against the recipe schema.
pub fn is_valid_recipe(data: &Value) -> bool {
    recipe_schema().is_ok_and(|schema| is_valid(&schema, data))
}
