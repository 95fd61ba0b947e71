//! Replays `fixtures/cases.json` against the library.
//!
//! `cargo run -p dev-test-runner [name-regex]`
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use json_shape::{Engine, ErrorMode, MatchOptions, Registry, TypeRef, UnknownKeys};
use regex::Regex;
use serde::Deserialize;

// ————————————————————————————————————————————————————————————————————————————
// FIXTURE FORMAT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
struct Suite {
    cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Case {
    name: String,
    #[serde(rename = "type")]
    type_ref: TypeRef,
    #[serde(default)]
    options: CaseOptions,
    /// Well-formed input, serialized in fixture key order.
    #[serde(default)]
    input: Option<serde_json::Value>,
    /// Raw text, for inputs that are not JSON at all.
    #[serde(default)]
    raw: Option<String>,
    expect: Expect,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CaseOptions {
    strict_keys: bool,
    all_errors: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Expect {
    Valid,
    Normalized(String),
    Errors(Vec<ExpectedError>),
}

#[derive(Debug, Deserialize)]
struct ExpectedError {
    #[serde(rename = "type")]
    kind: String,
    location: serde_json::Value,
}

// ————————————————————————————————————————————————————————————————————————————
// RUNNER
// ————————————————————————————————————————————————————————————————————————————

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn load_suite(path: &Path) -> Result<Suite, String> {
    let src = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let de = &mut serde_json::Deserializer::from_str(&src);
    serde_path_to_error::deserialize(de).map_err(|err| {
        let at = err.path().to_string();
        format!("{}: at JSON path {at} → {}", path.display(), err.into_inner())
    })
}

impl Case {
    fn options(&self) -> MatchOptions {
        MatchOptions {
            unknown_keys: if self.options.strict_keys { UnknownKeys::Reject } else { UnknownKeys::Ignore },
            error_mode: if self.options.all_errors { ErrorMode::CollectAll } else { ErrorMode::FirstError },
            ..MatchOptions::default()
        }
    }

    fn bytes(&self) -> Result<Vec<u8>, String> {
        match (&self.raw, &self.input) {
            (Some(raw), None) => Ok(raw.clone().into_bytes()),
            (None, Some(input)) => Ok(input.to_string().into_bytes()),
            _ => Err("exactly one of `input` and `raw` is required".into()),
        }
    }

    /// `Ok(())` when the library agrees with the fixture, else a description of the drift.
    fn run(&self, registry: &Registry) -> Result<(), String> {
        let engine = Engine::new(registry).with_options(self.options());
        let data = self.bytes()?;
        let outcome = engine.normalize(&data, &self.type_ref).map_err(|e| format!("config error: {e}"))?;

        match (&self.expect, outcome) {
            (Expect::Valid, Ok(_)) => Ok(()),
            (Expect::Normalized(expected), Ok(bytes)) => {
                let actual = String::from_utf8_lossy(&bytes);
                if actual == *expected {
                    Ok(())
                } else {
                    Err(format!("expected {expected}\n      actual   {actual}"))
                }
            }
            (Expect::Errors(expected), Err(actual)) => {
                let actual: Vec<(String, serde_json::Value)> = actual
                    .iter()
                    .map(|e| (e.kind.to_string(), serde_json::to_value(&e.location).unwrap_or_default()))
                    .collect();
                let expected: Vec<(String, serde_json::Value)> =
                    expected.iter().map(|e| (e.kind.clone(), e.location.clone())).collect();
                if actual == expected {
                    Ok(())
                } else {
                    Err(format!("expected errors {expected:?}\n      actual          {actual:?}"))
                }
            }
            (Expect::Errors(_), Ok(bytes)) => {
                Err(format!("expected errors, got {}", String::from_utf8_lossy(&bytes)))
            }
            (_, Err(errors)) => {
                let messages: Vec<String> = errors.iter().map(|e| e.message()).collect();
                Err(format!("expected success, got {messages:?}"))
            }
        }
    }
}

fn main() -> ExitCode {
    let filter = match std::env::args().nth(1).map(|p| Regex::new(&p)).transpose() {
        Ok(filter) => filter,
        Err(error) => {
            eprintln!("bad filter: {error}");
            return ExitCode::FAILURE;
        }
    };

    let registry = match Registry::load(fixture("registry.json")) {
        Ok(registry) => registry,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };
    let suite = match load_suite(&fixture("cases.json")) {
        Ok(suite) => suite,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let mut failed = 0usize;
    let mut ran = 0usize;
    for case in &suite.cases {
        if filter.as_ref().is_some_and(|f| !f.is_match(&case.name)) {
            continue;
        }
        ran += 1;
        match case.run(&registry) {
            Ok(()) => println!("{} {}", "pass".green(), case.name),
            Err(why) => {
                failed += 1;
                println!("{} {}\n      {why}", "FAIL".red().bold(), case.name);
            }
        }
    }

    println!("{ran} cases, {failed} failed");
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
