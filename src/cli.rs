//! CLI: schema | validate | normalize, all driven by a registry file.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;

use crate::descriptor::TypeRef;
use crate::engine::Engine;
use crate::error::{Checked, ValidationError};
use crate::matcher::{DEFAULT_MAX_DEPTH, ErrorMode, MatchOptions, UnknownKeys};
use crate::openapi::OpenApi;
use crate::registry::{self, Registry};
use crate::{codec, value::Value};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate, normalize and describe JSON against declared types
#[derive(Parser, Debug)]
#[command(name = "json-shape", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the JSON Schema (or an OpenAPI components document) of a type
    Schema(SchemaOut),
    /// check JSON documents against a type
    Validate(ValidateRun),
    /// decode then re-encode a document: sorted keys, no unknown keys, no nil optionals
    Normalize(NormalizeOut),
}

#[derive(Args, Debug, Clone)]
struct TypeSettings {
    /// registry file: {"modules": {"App.User": {"types": {"t": <descriptor>}}}}
    #[arg(long)]
    registry: PathBuf,

    /// type reference, e.g. App.User.t
    #[arg(long = "type")]
    type_ref: TypeRef,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct MatchSettings {
    /// report keys the type does not declare
    #[arg(long, default_value_t = false)]
    strict_keys: bool,

    /// keep going after the first error in each document
    #[arg(long, default_value_t = false)]
    all_errors: bool,

    /// nesting limit before a document is refused
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    types: TypeSettings,

    /// emit an OpenAPI 3.1 document with the type under components.schemas
    #[arg(long, default_value_t = false)]
    openapi: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ValidateRun {
    #[command(flatten)]
    types: TypeSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    match_settings: MatchSettings,

    /// one JSON line per document instead of the colored report
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(clap::Parser, Debug)]
struct NormalizeOut {
    #[command(flatten)]
    types: TypeSettings,

    /// input document
    #[arg(long, short)]
    input: PathBuf,

    #[command(flatten)]
    match_settings: MatchSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// Outcome for one input document.
struct Report {
    path: PathBuf,
    outcome: anyhow::Result<Checked<()>>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeSettings {
    fn engine(&self, options: MatchOptions) -> anyhow::Result<Engine<Registry>> {
        let registry = Registry::load(&self.registry)?;
        // Fail once, up front, instead of once per input.
        registry::check(&registry, &self.type_ref)?;
        Ok(Engine::new(registry).with_options(options))
    }
}

impl MatchSettings {
    fn options(&self) -> MatchOptions {
        MatchOptions {
            max_depth: self.max_depth,
            unknown_keys: if self.strict_keys { UnknownKeys::Reject } else { UnknownKeys::Ignore },
            error_mode: if self.all_errors { ErrorMode::CollectAll } else { ErrorMode::FirstError },
        }
    }
}

impl InputSettings {
    fn validate_file(&self, engine: &Engine<Registry>, type_ref: &TypeRef, path: &Path) -> anyhow::Result<Checked<()>> {
        let source = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let Some(pointer) = self.json_pointer.as_deref() else {
            return Ok(engine.validate(&source, type_ref)?);
        };
        let document = match codec::parse(&source) {
            Ok(value) => serde_json::Value::from(value),
            Err(error) => return Ok(Err(vec![error])),
        };
        let Some(selected) = document.pointer(pointer) else {
            bail!("JSON pointer {pointer} selects nothing in {}", path.display());
        };
        Ok(engine.decode_value(&Value::from(selected.clone()), type_ref)?.map(drop))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<ExitCode> {
        match &self.cmd {
            Command::Schema(target) => {
                let engine = target.types.engine(MatchOptions::default())?;
                let type_ref = &target.types.type_ref;
                let schema = if target.openapi {
                    let title = type_ref.to_string();
                    engine.openapi(&OpenApi::new(title, env!("CARGO_PKG_VERSION")).component(type_ref.clone()))?
                } else {
                    engine.schema_value(type_ref)?
                };
                let schema_src = serde_json::to_string_pretty(&schema)?;
                write_output(target.out.as_deref(), &schema_src)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Validate(target) => {
                let engine = target.types.engine(target.match_settings.options())?;
                let type_ref = &target.types.type_ref;
                let paths = resolve_file_path_patterns(&target.input_settings.input)?;
                tracing::info!(files = paths.len(), %type_ref, "validating");

                let reports: Vec<Report> = paths
                    .into_par_iter()
                    .map(|path| {
                        let outcome = target.input_settings.validate_file(&engine, type_ref, &path);
                        Report { path, outcome }
                    })
                    .collect();

                let failed = reports.iter().filter(|r| !matches!(r.outcome, Ok(Ok(())))).count();
                for report in &reports {
                    if target.json {
                        println!("{}", report_json(report));
                    } else {
                        print_report(report);
                    }
                }
                if !target.json {
                    let summary = format!("{} checked, {failed} failed", reports.len());
                    if failed == 0 {
                        eprintln!("{}", summary.green().bold());
                    } else {
                        eprintln!("{}", summary.red().bold());
                    }
                }
                Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
            }
            Command::Normalize(target) => {
                let engine = target.types.engine(target.match_settings.options())?;
                let source = std::fs::read(&target.input)
                    .with_context(|| format!("failed to read {}", target.input.display()))?;
                match engine.normalize(&source, &target.types.type_ref)? {
                    Ok(bytes) => {
                        write_output(target.out.as_deref(), &String::from_utf8_lossy(&bytes))?;
                        Ok(ExitCode::SUCCESS)
                    }
                    Err(errors) => {
                        print_errors(&errors);
                        Ok(ExitCode::FAILURE)
                    }
                }
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn print_report(report: &Report) {
    let path = report.path.display().to_string();
    match &report.outcome {
        Ok(Ok(())) => println!("{} {}", "ok".green(), path),
        Ok(Err(errors)) => {
            println!("{} {}", "FAIL".red().bold(), path);
            print_errors(errors);
        }
        Err(error) => println!("{} {}: {error:#}", "ERROR".yellow().bold(), path),
    }
}

fn print_errors(errors: &[ValidationError]) {
    for error in errors {
        let context = serde_json::to_string(&error.context).unwrap_or_default();
        println!("  {} {}", error.message().red(), context.dimmed());
    }
}

fn report_json(report: &Report) -> serde_json::Value {
    let path = report.path.display().to_string();
    match &report.outcome {
        Ok(Ok(())) => serde_json::json!({ "path": path, "ok": true }),
        Ok(Err(errors)) => serde_json::json!({ "path": path, "ok": false, "errors": errors }),
        Err(error) => serde_json::json!({ "path": path, "ok": false, "failure": format!("{error:#}") }),
    }
}

fn write_output(out: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    let Some(out) = out else {
        println!("{contents}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through() {
        let out = resolve_file_path_patterns(["a.json", "dir/b.json"]).unwrap();
        assert_eq!(out, [PathBuf::from("a.json"), PathBuf::from("dir/b.json")]);
    }

    #[test]
    fn empty_glob_is_an_error() {
        let err = resolve_file_path_patterns(["/definitely/not/here/*.json"]).unwrap_err();
        assert!(err.to_string().contains("matched no files"));
    }

    #[test]
    fn flags_map_to_options() {
        let cli = CommandLineInterface::try_parse_from([
            "json-shape", "validate", "--registry", "r.json", "--type", "App.User.t",
            "-i", "a.json", "--strict-keys", "--all-errors", "--max-depth", "10",
        ])
        .unwrap();
        let Command::Validate(run) = cli.cmd else { panic!("expected validate") };
        assert_eq!(run.types.type_ref, TypeRef::new("App.User", "t"));
        assert_eq!(run.match_settings.options(), MatchOptions {
            max_depth: 10,
            unknown_keys: UnknownKeys::Reject,
            error_mode: ErrorMode::CollectAll,
        });
    }

    #[test]
    fn bad_type_refs_are_refused_by_the_parser() {
        assert!(CommandLineInterface::try_parse_from([
            "json-shape", "schema", "--registry", "r.json", "--type", "user",
        ])
        .is_err());
    }
}
