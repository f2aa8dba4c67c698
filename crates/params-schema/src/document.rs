//! # Descriptor Documents
//!
//! Loading descriptor documents from YAML or JSON, and checking their
//! structure against the bundled JSON Schema (Draft 2020-12) before they
//! are compiled.
//!
//! The structural check catches misspelled keys and ill-typed parameters
//! with a JSON Pointer to the offending node, which is more useful to a
//! document author than the compiler's first-error-wins report. Semantic
//! checks (unknown type names, rule applicability, defaults) stay with the
//! compiler.

use std::fmt;
use std::path::Path;

use jsonschema::Validator;
use params_core::ConfigurationError;
use serde_json::Value as Json;

/// The bundled descriptor meta-schema.
pub const DESCRIPTOR_SCHEMA: &str = include_str!("../schemas/descriptor.schema.json");

/// Source format of a descriptor document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
}

impl DocumentFormat {
    /// Format implied by a file extension, if it is a descriptor document.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Self::Json),
            Some("yaml" | "yml") => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// A single structural violation.
#[derive(Debug, Clone)]
pub struct Violation {
    /// JSON Pointer to the violating node in the document.
    pub instance_path: String,
    /// Description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Compiled structural check for descriptor documents.
pub struct DocumentChecker {
    validator: Validator,
}

impl fmt::Debug for DocumentChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentChecker").finish_non_exhaustive()
    }
}

impl DocumentChecker {
    /// Compile the bundled meta-schema.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidDescriptor`] if the bundled schema
    /// does not compile, which indicates a broken build.
    pub fn new() -> Result<Self, ConfigurationError> {
        let schema: Json =
            serde_json::from_str(DESCRIPTOR_SCHEMA).map_err(|e| ConfigurationError::InvalidDescriptor {
                reason: format!("bundled descriptor schema is not JSON: {e}"),
            })?;
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        let validator = opts
            .build(&schema)
            .map_err(|e| ConfigurationError::InvalidDescriptor {
                reason: format!("bundled descriptor schema does not compile: {e}"),
            })?;
        Ok(Self { validator })
    }

    /// Every structural violation in `doc`.
    pub fn violations(&self, doc: &Json) -> Vec<Violation> {
        self.validator
            .iter_errors(doc)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }

    /// Check `doc`, reporting every violation at once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Document`] listing the violations.
    pub fn check(&self, source_name: &str, doc: &Json) -> Result<(), ConfigurationError> {
        let violations = self.violations(doc);
        if violations.is_empty() {
            return Ok(());
        }
        tracing::debug!(source = source_name, count = violations.len(), "descriptor document rejected");
        Err(ConfigurationError::Document {
            source_name: source_name.to_string(),
            violations: violations.iter().map(ToString::to_string).collect(),
        })
    }
}

/// Parse document text in the given format.
///
/// # Errors
///
/// Returns [`ConfigurationError::DocumentLoad`] for syntax errors.
pub fn parse_document(
    source_name: &str,
    content: &str,
    format: DocumentFormat,
) -> Result<Json, ConfigurationError> {
    let load_error = |reason: String| ConfigurationError::DocumentLoad {
        path: source_name.to_string(),
        reason,
    };
    match format {
        DocumentFormat::Yaml => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(content).map_err(|e| load_error(format!("invalid YAML: {e}")))?;
            json_from_yaml(yaml, "").map_err(|e| load_error(format!("unsupported YAML: {e}")))
        }
        DocumentFormat::Json => {
            serde_json::from_str(content).map_err(|e| load_error(format!("invalid JSON: {e}")))
        }
    }
}

/// Read and parse a document, choosing the format from the extension.
///
/// # Errors
///
/// Returns [`ConfigurationError::DocumentLoad`] if the file cannot be read,
/// has an unsupported extension, or does not parse.
pub fn load_document(path: &Path) -> Result<Json, ConfigurationError> {
    let name = path.display().to_string();
    let format = DocumentFormat::from_path(path).ok_or_else(|| ConfigurationError::DocumentLoad {
        path: name.clone(),
        reason: "expected a .yaml, .yml or .json file".into(),
    })?;
    let content = std::fs::read_to_string(path).map_err(|e| ConfigurationError::DocumentLoad {
        path: name.clone(),
        reason: format!("cannot read file: {e}"),
    })?;
    parse_document(&name, &content, format)
}

// ─── YAML ────────────────────────────────────────────────────────────

/// Turn a parsed YAML tree into JSON.
///
/// Tags are transparent. Scalar keys become their text, so `1:` and `"1":`
/// name the same field and collide. Failures name the JSON pointer of the
/// offending node.
fn json_from_yaml(yaml: serde_yaml::Value, pointer: &str) -> Result<Json, String> {
    use serde_yaml::Value as Yaml;

    Ok(match yaml {
        Yaml::Null => Json::Null,
        Yaml::Bool(flag) => Json::Bool(flag),
        Yaml::String(text) => Json::String(text),
        Yaml::Number(number) => yaml_number(&number).ok_or_else(|| {
            format!("at '{pointer}': number {number} has no JSON representation")
        })?,
        Yaml::Sequence(items) => Json::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| json_from_yaml(item, &format!("{pointer}/{i}")))
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut object = serde_json::Map::with_capacity(entries.len());
            for (key, value) in entries {
                let key = mapping_key(&key)
                    .ok_or_else(|| format!("at '{pointer}': keys must be scalars, got {key:?}"))?;
                let child = format!("{pointer}/{key}");
                if object.contains_key(&key) {
                    return Err(format!("at '{child}': key appears twice"));
                }
                let value = json_from_yaml(value, &child)?;
                object.insert(key, value);
            }
            Json::Object(object)
        }
        Yaml::Tagged(tagged) => json_from_yaml(tagged.value, pointer)?,
    })
}

fn yaml_number(number: &serde_yaml::Number) -> Option<Json> {
    if let Some(i) = number.as_i64() {
        return Some(i.into());
    }
    if let Some(u) = number.as_u64() {
        return Some(u.into());
    }
    number
        .as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Json::Number)
}

fn mapping_key(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(text) => Some(text.clone()),
        serde_yaml::Value::Number(number) => Some(number.to_string()),
        serde_yaml::Value::Bool(flag) => Some(flag.to_string()),
        serde_yaml::Value::Tagged(tagged) => mapping_key(&tagged.value),
        _ => None,
    }
}
