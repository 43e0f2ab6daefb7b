use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;

use jxsql::expressions::JxLang;
use jxsql::schema::{Snowflake, SnowflakeCatalog};
use jxsql::{planner, query::Query, CompilerConfig, Expression};

/// jxsql - compile jx queries over nested JSON into SQLite
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML file with compiler limits (defaults, then JXSQL_* environment variables, otherwise)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the SQL and result column mappings for a query against a saved catalog
    Compile {
        /// Catalog YAML describing the fact's tables
        #[arg(long)]
        catalog: String,

        /// Query as JSON, or @path to read it from a file
        #[arg(long)]
        query: String,
    },

    /// Print an expression after constant folding
    Simplify {
        /// Expression as JSON, or @path
        #[arg(long)]
        expr: String,
    },

    /// Evaluate an expression against one document
    Eval {
        #[arg(long)]
        expr: String,

        /// Document as JSON, or @path
        #[arg(long)]
        doc: String,
    },
}

fn read_json(arg: &str) -> anyhow::Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).with_context(|| format!("parsing JSON `{}`", arg))
}

fn load_config(path: Option<&str>) -> anyhow::Result<CompilerConfig> {
    Ok(match path {
        Some(path) => CompilerConfig::from_yaml_file(path)?,
        None => CompilerConfig::from_env()?,
    })
}

fn main() -> anyhow::Result<()> {
    // Initialize logger - defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Compile { catalog, query } => {
            let catalog = SnowflakeCatalog::from_yaml_file(&catalog)?;
            let snowflake =
                Snowflake::from_catalog(catalog)?.with_max_nesting_depth(config.max_nesting_depth);
            let query = Query::from_json(&read_json(&query)?)?;
            let plan = planner::compile(&query, &snowflake, &config)?;
            println!("{}", plan.sql);
            println!("{}", serde_json::to_string_pretty(&plan.columns)?);
        }
        Command::Simplify { expr } => {
            let expr = Expression::from_json(&read_json(&expr)?)?;
            println!("{}", expr.partial_eval::<JxLang>());
        }
        Command::Eval { expr, doc } => {
            let expr = Expression::from_json(&read_json(&expr)?)?;
            println!("{}", expr.evaluate(&read_json(&doc)?)?);
        }
    }
    Ok(())
}
