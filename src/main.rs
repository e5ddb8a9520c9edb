use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use sieve_query::DatabaseDialect;
use sieve_query::cli::{self, CliError, CompileOptions, FilterOptions};
use std::fs;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "sieve")]
#[command(about = "Sieve - A query DSL for filtering, sorting and paging entity collections")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Dialect {
    Postgres,
    Sqlserver,
}

impl From<Dialect> for DatabaseDialect {
    fn from(d: Dialect) -> Self {
        match d {
            Dialect::Postgres => DatabaseDialect::Postgres,
            Dialect::Sqlserver => DatabaseDialect::SqlServer,
        }
    }
}

#[derive(clap::Args)]
struct QueryArgs {
    /// The sieve query
    query: String,

    /// Entity schema JSON file
    #[arg(short, long)]
    schema: String,

    /// Engine configuration JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Default query merged into categories the query leaves out
    #[arg(long)]
    default_query: Option<String>,

    /// Use the configured safe maximum as the page size
    #[arg(long)]
    ignore_limit: bool,

    /// Reference time for relative date ranges (YYYY-MM-DD[THH:MM:SS])
    #[arg(long)]
    now: Option<String>,

    /// Pretty-print the output
    #[arg(short, long)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query to parameterized SQL
    Compile {
        #[command(flatten)]
        args: QueryArgs,

        /// Override the configured SQL dialect
        #[arg(short, long, value_enum)]
        dialect: Option<Dialect>,

        /// Wrap the row statement so it returns a single JSON array
        #[arg(long)]
        json_aggregate: bool,
    },

    /// Run a query over a JSON array of records
    Filter {
        #[command(flatten)]
        args: QueryArgs,

        /// JSON records file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,
    },

    /// Print the canonical form of a query
    Canonical {
        /// The sieve query
        query: String,

        /// Entity schema JSON file; without it the query is only tokenized
        #[arg(short, long)]
        schema: Option<String>,

        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// List documentation categories
    Docs,

    /// Show documentation for a specific category
    Doc {
        /// Category name (use 'sieve docs' to list categories)
        category: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            args,
            dialect,
            json_aggregate,
        } => run_compile(args, dialect, json_aggregate),
        Commands::Filter { args, input } => run_filter(args, input),
        Commands::Canonical {
            query,
            schema,
            config,
        } => run_canonical(query, schema, config),
        Commands::Docs => {
            print!("{}", cli::get_docs_overview());
            Ok(())
        }
        Commands::Doc { category } => match cli::get_doc_category(&category) {
            Ok(content) => {
                print!("{}", content);
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_optional(path: Option<&str>) -> Result<Option<String>, CliError> {
    path.map(fs::read_to_string).transpose().map_err(CliError::Io)
}

fn compile_options(args: &QueryArgs, json_aggregate: bool) -> Result<CompileOptions, CliError> {
    Ok(CompileOptions {
        query: args.query.clone(),
        default_query: args.default_query.clone(),
        ignore_limit: args.ignore_limit,
        json_aggregate,
        now: cli::parse_now(args.now.as_deref())?,
    })
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<(), CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }?;
    println!("{}", json);
    Ok(())
}

fn run_compile(args: QueryArgs, dialect: Option<Dialect>, json_aggregate: bool) -> Result<(), CliError> {
    let schema = cli::load_schema(&fs::read_to_string(&args.schema)?)?;
    let mut config = cli::load_config(read_optional(args.config.as_deref())?.as_deref())?;
    if let Some(dialect) = dialect {
        config = config.with_dialect(dialect.into());
    }

    let options = compile_options(&args, json_aggregate)?;
    let output = cli::execute_compile(config, &schema, &options)?;
    print_json(&output, args.pretty)
}

fn run_filter(args: QueryArgs, input: Option<String>) -> Result<(), CliError> {
    let schema = cli::load_schema(&fs::read_to_string(&args.schema)?)?;
    let config = cli::load_config(read_optional(args.config.as_deref())?.as_deref())?;

    let records = match input {
        Some(path) => Some(fs::read_to_string(path)?),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Some(buffer)
        }
        None => None,
    };

    let options = FilterOptions {
        compile: compile_options(&args, false)?,
        records,
    };
    let output = cli::execute_filter(config, &schema, &options)?;
    print_json(&output, args.pretty)
}

fn run_canonical(query: String, schema: Option<String>, config: Option<String>) -> Result<(), CliError> {
    let schema = read_optional(schema.as_deref())?
        .map(|json| cli::load_schema(&json))
        .transpose()?;
    let config = cli::load_config(read_optional(config.as_deref())?.as_deref())?;
    println!("{}", cli::execute_canonical(config, schema.as_ref(), &query)?);
    Ok(())
}
