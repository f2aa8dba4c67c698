//! # params-cli — Command-Line Front End
//!
//! Provides the `params` binary over the validation engine.
//!
//! ## Subcommands
//!
//! - `params check` — compile every descriptor document in a directory and
//!   report what it declares.
//! - `params validate` — validate a payload (or a batch) against one schema
//!   from a directory and print the result as JSON.
//!
//! ```bash
//! params check --schema-dir schemas/
//! params validate --schema-dir schemas/ --schema signup --input request.json --pretty
//! cat batch.json | params validate --schema-dir schemas/ --schema signup --batch
//! ```
//!
//! ## Exit codes
//!
//! `0` valid, `1` invalid payload, `2` configuration or operational error.

pub mod check;
pub mod validate;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use params_engine::ParseOptions;
use params_schema::{load_document, FunctionRegistry, SchemaRegistry};
use serde_json::Value as Json;

/// Payload (or every schema) was valid.
pub const EXIT_VALID: u8 = 0;
/// Payload failed validation.
pub const EXIT_INVALID: u8 = 1;
/// Bad descriptors, unreadable input, or any other operational failure.
pub const EXIT_ERROR: u8 = 2;

/// Compile every descriptor document in `dir`.
pub fn load_registry(dir: &Path) -> Result<SchemaRegistry> {
    let functions = FunctionRegistry::new();
    SchemaRegistry::load_dir(dir, &functions)
        .with_context(|| format!("failed to load schemas from {}", dir.display()))
}

/// Read a payload from `input`, or from stdin when `None`.
///
/// Files with a `.yaml`/`.yml` extension are read as YAML, everything else
/// (including stdin) as JSON.
pub fn read_payload(input: Option<&Path>) -> Result<Json> {
    match input {
        Some(path) if is_yaml(path) => Ok(load_document(path)?),
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", path.display()))
        }
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("failed to read payload from stdin")?;
            serde_json::from_str(&content).context("stdin is not valid JSON")
        }
    }
}

/// Load [`ParseOptions`] from a YAML or JSON file.
pub fn load_options(path: &Path) -> Result<ParseOptions> {
    let raw = load_document(path)?;
    serde_json::from_value(raw)
        .with_context(|| format!("invalid parse options in {}", path.display()))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_payload_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("payload.json");
        std::fs::write(&json_path, r#"{"age": "42"}"#).unwrap();
        assert_eq!(read_payload(Some(&json_path)).unwrap()["age"], "42");

        let yaml_path = dir.path().join("payload.yaml");
        std::fs::write(&yaml_path, "age: 42\ntags: [a, b]\n").unwrap();
        let payload = read_payload(Some(&yaml_path)).unwrap();
        assert_eq!(payload["age"], 42);
        assert_eq!(payload["tags"][1], "b");
    }

    #[test]
    fn test_read_payload_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.txt");
        std::fs::write(&path, "age=42").unwrap();
        let err = read_payload(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("not valid JSON"));
    }

    #[test]
    fn test_load_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.yaml");
        std::fs::write(&path, "empty_string_as_nil: false\n").unwrap();
        assert!(!load_options(&path).unwrap().empty_string_as_nil);

        std::fs::write(&path, "empty_strings: keep\n").unwrap();
        assert!(load_options(&path).is_err());
    }

    #[test]
    fn test_load_registry_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_registry(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("failed to load schemas"));
    }
}
