//! # Check Subcommand
//!
//! Compiles every descriptor document in a directory, resolves record
//! references across them, and prints a summary of each schema. Any
//! configuration error fails the command.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use params_schema::descriptor::rule_names;
use params_schema::{Schema, SchemaRegistry};
use serde::Serialize;

use crate::{load_registry, EXIT_VALID};

/// Arguments for the check subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Directory of descriptor documents (*.yaml, *.yml, *.json).
    #[arg(long)]
    pub schema_dir: PathBuf,

    /// List every field with its kind and checks.
    #[arg(long)]
    pub fields: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Summary of one compiled schema.
#[derive(Debug, Serialize)]
pub struct SchemaSummary {
    pub id: String,
    pub fields: Vec<FieldSummary>,
}

/// One field of a [`SchemaSummary`].
#[derive(Debug, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub kind: String,
    pub checks: Vec<String>,
}

/// Execute the check subcommand.
pub fn run_check(args: &CheckArgs) -> Result<u8> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    check_to(args, &mut out)
}

/// Execute the check subcommand, writing the summary to `out`.
pub fn check_to(args: &CheckArgs, out: &mut impl Write) -> Result<u8> {
    let registry = load_registry(&args.schema_dir)?;
    let summaries = summarize(&registry);

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &summaries)?;
        writeln!(out)?;
        return Ok(EXIT_VALID);
    }

    for summary in &summaries {
        writeln!(out, "{}: {} field(s)", summary.id, summary.fields.len())?;
        if args.fields {
            for field in &summary.fields {
                write!(out, "  {:<24} {}", field.name, field.kind)?;
                if !field.checks.is_empty() {
                    write!(out, " [{}]", field.checks.join(", "))?;
                }
                writeln!(out)?;
            }
        }
    }
    writeln!(out, "OK: {} schema(s)", summaries.len())?;
    Ok(EXIT_VALID)
}

/// Summaries of every schema in `registry`, ordered by id.
pub fn summarize(registry: &SchemaRegistry) -> Vec<SchemaSummary> {
    registry
        .ids()
        .filter_map(|id| registry.get(id).map(|schema| summarize_schema(id, schema)))
        .collect()
}

fn summarize_schema(id: &str, schema: &Schema) -> SchemaSummary {
    SchemaSummary {
        id: id.to_string(),
        fields: schema
            .fields()
            .iter()
            .map(|field| FieldSummary {
                name: field.name().to_string(),
                kind: field.descriptor().kind().to_string(),
                checks: rule_names(field.descriptor())
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect(),
            })
            .collect(),
    }
}
