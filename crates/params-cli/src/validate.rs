//! # Validate Subcommand
//!
//! Validates a payload against one schema of a descriptor directory and
//! prints the [`ParseResult`](params_engine::ParseResult) as JSON on stdout.
//! Record references resolve against the other schemas of the directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use params_engine::{ParseOptions, RecordSchemas, Validator};
use serde::Serialize;
use serde_json::Value as Json;

use crate::{load_options, load_registry, read_payload, EXIT_INVALID, EXIT_VALID};

/// Arguments for the validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Directory of descriptor documents (*.yaml, *.yml, *.json).
    #[arg(long)]
    pub schema_dir: PathBuf,

    /// Schema to validate against (file stem within --schema-dir).
    #[arg(long)]
    pub schema: String,

    /// Payload file. Reads JSON from stdin when omitted.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Treat the payload as an array of independent payloads.
    #[arg(long)]
    pub batch: bool,

    /// Keep blank strings instead of treating them as absent.
    #[arg(long)]
    pub keep_empty_strings: bool,

    /// Parse options file (YAML or JSON). Flags override it.
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Pretty-print the result.
    #[arg(long)]
    pub pretty: bool,
}

/// Execute the validate subcommand, writing the result to stdout.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    validate_to(args, &mut out)
}

/// Execute the validate subcommand, writing the result to `out`.
pub fn validate_to(args: &ValidateArgs, out: &mut impl Write) -> Result<u8> {
    let options = parse_options(args.options.as_deref(), args.keep_empty_strings)?;
    let validator = build_validator(&args.schema_dir, &args.schema, options)?;
    let payload = read_payload(args.input.as_deref())?;

    let valid = if args.batch {
        let Json::Array(payloads) = payload else {
            bail!("--batch expects a JSON array of payloads");
        };
        let result = validator.parse_many(&payloads)?;
        write_json(out, &result, args.pretty)?;
        result.is_valid()
    } else {
        let result = validator.parse(&payload)?;
        write_json(out, &result, args.pretty)?;
        result.is_valid()
    };

    tracing::info!(schema = %args.schema, valid, "validation finished");
    Ok(if valid { EXIT_VALID } else { EXIT_INVALID })
}

fn parse_options(path: Option<&Path>, keep_empty_strings: bool) -> Result<ParseOptions> {
    let mut options = match path {
        Some(path) => load_options(path)?,
        None => ParseOptions::default(),
    };
    if keep_empty_strings {
        options.empty_string_as_nil = false;
    }
    Ok(options)
}

fn build_validator(schema_dir: &Path, id: &str, options: ParseOptions) -> Result<Validator> {
    let registry = Arc::new(load_registry(schema_dir)?);
    let Some(schema) = registry.get(id).cloned() else {
        let known: Vec<&str> = registry.ids().collect();
        bail!(
            "no schema '{id}' in {} (available: {})",
            schema_dir.display(),
            known.join(", ")
        );
    };
    let delegate = RecordSchemas::new(registry).with_options(options);
    let validator = Validator::new(schema)
        .with_options(options)
        .with_delegate(Arc::new(delegate))
        .with_context(|| format!("schema '{id}' has unresolved references"))?;
    Ok(validator)
}

fn write_json(out: &mut impl Write, value: &impl Serialize, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out).context("failed to write result")?;
    Ok(())
}
