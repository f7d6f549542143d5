//! Administrative CLI: explains how a relation query would be served.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use penumbra::{
    logging::init_logging,
    query::{
        analyze, coverage::usable_key_prefix, has_key_prefix_constraint, Coverage, RelationQuery,
        Scope, TypeFacts,
    },
    Config,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "penumbra",
    version,
    about = "Inspect relation-loading and index-coverage decisions",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "PENUMBRA_CONFIG",
        help = "TOML file with the type schema"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a JSON query and report its scope and index coverage
    Explain {
        #[arg(long, value_name = "FILE", help = "JSON file describing the query")]
        query: PathBuf,
    },
    /// List the relation types declared in the configuration
    Types,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct ExplainReport {
    vertex: u64,
    direction: &'static str,
    scope: Scope,
    coverage: Coverage,
    usable_prefix: Vec<String>,
    key_prefix_constrained: bool,
    records_fetch: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    init_logging(&config.logging.filter)?;

    match cli.command {
        Command::Explain { query } => {
            let report = explain(&config, &query)?;
            emit(cli.format, &report, || print_explain_text(&report))?;
        }
        Command::Types => {
            emit(cli.format, &config.types, || print_types_text(&config.types))?;
        }
    }
    Ok(())
}

fn explain(config: &Config, path: &Path) -> Result<ExplainReport, Box<dyn Error>> {
    let catalog = config.catalog();
    let query: RelationQuery = serde_json::from_str(&fs::read_to_string(path)?)?;
    let resolved = query.resolve(&catalog)?;
    let coverage = analyze(&resolved)?;
    let usable_prefix = usable_key_prefix(&resolved)?.to_vec();
    let key_prefix_constrained = has_key_prefix_constraint(&resolved);
    let scope = resolved.scope();
    let records_fetch = config.loading.cache
        && !(matches!(scope, Scope::Type { .. }) && key_prefix_constrained);
    Ok(ExplainReport {
        vertex: query.vertex().0,
        direction: resolved.direction().as_str(),
        scope,
        coverage,
        usable_prefix,
        key_prefix_constrained,
        records_fetch,
    })
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_explain_text(report: &ExplainReport) {
    println!("vertex:          v{}", report.vertex);
    println!("direction:       {}", report.direction);
    let scope = match report.scope {
        Scope::All => "all types".to_string(),
        Scope::Group { group } => format!("group {group}"),
        Scope::Type { ty, group } => format!("type {ty} (group {group})"),
    };
    println!("scope:           {scope}");
    println!(
        "coverage:        {}",
        if report.coverage.exact {
            "index-exact"
        } else {
            "needs in-memory filtering"
        }
    );
    if report.usable_prefix.is_empty() {
        println!("usable prefix:   (none)");
    } else {
        println!("usable prefix:   {}", report.usable_prefix.join(", "));
    }
    println!(
        "records fetch:   {}",
        if report.records_fetch { "yes" } else { "no" }
    );
}

fn print_types_text(types: &[TypeFacts]) {
    if types.is_empty() {
        println!("no types declared");
        return;
    }
    for facts in types {
        let mut flags = Vec::new();
        if facts.hidden {
            flags.push("hidden");
        }
        if facts.functional {
            flags.push("functional");
        }
        println!(
            "{:>5}  {:<20} {:?} group={} keys=[{}]{}",
            facts.id.0,
            facts.name,
            facts.kind,
            facts.group,
            facts.key_signature.join(", "),
            if flags.is_empty() {
                String::new()
            } else {
                format!(" {}", flags.join(" "))
            }
        );
    }
}
