//! TR-015: CLI subcommands: init, validate, build, status.

use crate::codegen::CodeGenerator;
use crate::core::{parser, resolver, types};
use crate::output::record::{self, BuildRecord, SourceStatus};
use clap::Subcommand;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new tron project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate tron.yaml without generating anything
    Validate {
        /// Path to tron.yaml
        #[arg(short, long, default_value = "tron.yaml")]
        file: PathBuf,
    },

    /// Generate the application source
    Build {
        /// Path to tron.yaml
        #[arg(short, long, default_value = "tron.yaml")]
        file: PathBuf,

        /// Generated source file
        #[arg(short, long, default_value = "app.rs")]
        output: PathBuf,

        /// Application type name (default: manifest name)
        #[arg(long)]
        app_name: Option<String>,

        /// Reuse a build identifier instead of drawing a random one
        #[arg(long)]
        app_id: Option<u64>,
    },

    /// Check a generated source against its build record
    Status {
        /// Generated source file
        #[arg(short, long, default_value = "app.rs")]
        output: PathBuf,

        /// Exit non-zero if the source is missing or was modified
        #[arg(long)]
        check: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Build {
            file,
            output,
            app_name,
            app_id,
        } => cmd_build(&file, &output, app_name.as_deref(), app_id),
        Commands::Status {
            output,
            check,
            json,
        } => cmd_status(&output, check, json),
    }
}

const STARTER_MANIFEST: &str = r#"version: "1.0"
name: KvApp
description: "Generated by tron"

services:
  kv:
    package: simple_kv
    url: "127.0.0.1:34601"
    name: simple_kv.instance0
    schema:
      name: SimpleKv
      module: simple_kv
      methods:
        read: { request: String, response: String }

queries:
  lookup:
    input: String
    output: String
    body:
      call:
        target: { member: kv }
        method: read
        args: [request]
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let manifest_path = path.join("tron.yaml");
    if manifest_path.exists() {
        return Err(format!("{} already exists", manifest_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    std::fs::write(&manifest_path, STARTER_MANIFEST)
        .map_err(|e| format!("cannot write {}: {}", manifest_path.display(), e))?;

    println!("Initialized tron project at {}", path.display());
    println!("  Created: {}", manifest_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let manifest = parser::parse_manifest_file(file)?;
    let errors = parser::validate_manifest(&manifest);

    if errors.is_empty() {
        println!(
            "OK: {} ({} services, {} queries)",
            manifest.name,
            manifest.services.len(),
            manifest.queries.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate a manifest, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<types::Manifest, String> {
    let manifest = parser::parse_manifest_file(file)?;
    let errors = parser::validate_manifest(&manifest);
    if errors.is_empty() {
        return Ok(manifest);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

fn cmd_build(
    file: &Path,
    output: &Path,
    app_name: Option<&str>,
    app_id: Option<u64>,
) -> Result<(), String> {
    let manifest = parse_and_validate(file)?;
    let mut contexts = resolver::build_contexts(&manifest)?;

    let mut generator = CodeGenerator::with_defaults();
    if let Some(id) = app_id {
        generator = generator.with_app_id(id);
    }
    let app = app_name.unwrap_or(&manifest.name);
    let program = generator
        .build(app, &mut contexts)
        .map_err(|e| format!("code generation failed: {}", e))?;

    let written = record::write_program(output, &program)?;

    println!("Generated {} -> {}", program.app_name, output.display());
    println!("  app id:   {}", written.app_id);
    println!("  queries:  {}", program.queries.len());
    println!("  services: {}", program.services.len());
    println!("  wrappers: {}", program.wrappers.len());
    println!("  hash:     {}", written.source_hash);
    Ok(())
}

#[derive(Serialize)]
struct StatusReport<'a> {
    source: String,
    status: &'static str,
    record: &'a BuildRecord,
}

fn status_label(status: &SourceStatus) -> &'static str {
    match status {
        SourceStatus::Fresh => "fresh",
        SourceStatus::Modified { .. } => "modified",
        SourceStatus::Missing => "missing",
    }
}

fn cmd_status(output: &Path, check: bool, json: bool) -> Result<(), String> {
    let Some(rec) = record::load_record(output)? else {
        println!("No build record for {}. Run `tron build` first.", output.display());
        return if check {
            Err(format!("{} has no build record", output.display()))
        } else {
            Ok(())
        };
    };
    let status = record::check_source(output, &rec)?;

    if json {
        let report = StatusReport {
            source: output.display().to_string(),
            status: status_label(&status),
            record: &rec,
        };
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("JSON serialization error: {}", e))?;
        println!("{}", text);
    } else {
        println!("{} ({}, generated {})", rec.app, rec.app_id, rec.generated_at);
        println!("  generator: {}", rec.generator);
        println!(
            "  {} queries, {} services, {} wrappers",
            rec.queries.len(),
            rec.services.len(),
            rec.wrappers.len()
        );
        match &status {
            SourceStatus::Fresh => println!("  source: up to date ({})", rec.source_hash),
            SourceStatus::Modified { expected, actual } => {
                println!("  source: MODIFIED");
                println!("    expected: {}", expected);
                println!("    actual:   {}", actual);
            }
            SourceStatus::Missing => println!("  source: MISSING"),
        }
    }

    if check && status != SourceStatus::Fresh {
        return Err(format!(
            "{} is {}",
            output.display(),
            status_label(&status)
        ));
    }
    Ok(())
}
