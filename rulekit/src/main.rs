//! Command-line front end for loading and evaluating WAF operators.
//!
//! `check` loads an `inspectFile` target the way a rule would, `eval` runs any
//! registered operator against one value, and `var` prints what a variable
//! extracts right now.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rulekit::exit_codes;
use rulekit::io::config::load_config;
use rulekit::operators::{InspectFile, LoadContext, OperatorRegistry};
use rulekit::transaction::{DebugEntry, Transaction};
use rulekit::variables::VariableRegistry;
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "rulekit",
    version,
    about = "Load and evaluate WAF rule operators and variables"
)]
struct Cli {
    /// Engine configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "rulekit.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and probe an inspectFile target; print its mode and path.
    Check {
        /// Target path as written in a rule.
        target: String,
    },
    /// Evaluate one value with a registered operator.
    Eval {
        /// Operator name, with or without the leading `@`.
        operator: String,
        /// Operator parameter as written in a rule.
        param: String,
        /// Value to evaluate.
        value: String,
        /// Transaction debug level (0-9). Overrides the config file.
        #[arg(long)]
        debug_level: Option<u8>,
        /// Print a JSON report instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the values a variable extracts from an empty transaction.
    Var {
        /// Variable name, e.g. `TIME_MIN`.
        name: String,
    },
}

#[derive(Serialize)]
struct EvalReport<'a> {
    operator: &'a str,
    value: &'a str,
    matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostic: Option<String>,
    debug_log: Vec<DebugEntry>,
}

fn main() {
    rulekit::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check { target } => cmd_check(&cli.config, &target),
        Command::Eval {
            operator,
            param,
            value,
            debug_level,
            json,
        } => cmd_eval(&cli.config, &operator, &param, &value, debug_level, json),
        Command::Var { name } => cmd_var(&name),
    }
}

fn cmd_check(config_path: &Path, target: &str) -> Result<i32> {
    let config = load_config(config_path)?;
    let ctx = LoadContext::from_config(&config);
    let operator = InspectFile::load(target, &ctx).context("load inspectFile target")?;
    println!("mode: {}", operator.mode());
    println!("path: {}", operator.resolved_path().display());
    Ok(exit_codes::OK)
}

fn cmd_eval(
    config_path: &Path,
    operator: &str,
    param: &str,
    value: &str,
    debug_level: Option<u8>,
    json: bool,
) -> Result<i32> {
    let config = load_config(config_path)?;
    let ctx = LoadContext::from_config(&config);
    let registry = OperatorRegistry::with_builtins();
    let built = registry
        .build(operator, param, &ctx)
        .with_context(|| format!("load operator {operator}"))?;

    let transaction =
        Transaction::new("cli").with_debug_level(debug_level.unwrap_or(config.debug_log_level));
    let verdict = built.evaluate(&transaction, value);
    let code = if verdict.matched {
        exit_codes::OK
    } else {
        exit_codes::NO_MATCH
    };

    if json {
        let report = EvalReport {
            operator: built.name(),
            value,
            matched: verdict.matched,
            diagnostic: verdict.diagnostic,
            debug_log: transaction.debug_entries(),
        };
        let payload = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{payload}");
        return Ok(code);
    }

    for entry in transaction.debug_entries() {
        println!("[{}] {}", entry.level, entry.message);
    }
    if let Some(diagnostic) = &verdict.diagnostic {
        println!("diagnostic: {diagnostic}");
    }
    println!("{}", if verdict.matched { "match" } else { "no match" });
    Ok(code)
}

fn cmd_var(name: &str) -> Result<i32> {
    let variable = VariableRegistry::default()
        .build(name)
        .with_context(|| format!("load variable {name}"))?;
    for extracted in variable.evaluate(&Transaction::new("cli")) {
        println!("{}: {}", extracted.name, extracted.value);
    }
    Ok(exit_codes::OK)
}
