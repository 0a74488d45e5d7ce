use clap::{Parser, Subcommand};
use mysql_tool::config::{self, Config};
use mysql_tool::{logging, sql, Client, ColumnValues, Result, Value};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Self-healing MySQL client for scripts and one-off data jobs.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults to `<config dir>/mysql-tool/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect (honouring the retry policy) and report success.
    Ping,
    /// Run a query and print every row as one JSON object per line.
    Query(QueryArgs),
    /// Insert every non-empty line of a file into one column of a table.
    Import(ImportArgs),
}

#[derive(Parser)]
struct QueryArgs {
    /// SQL text with `?` placeholders.
    sql: String,
    /// Placeholder values. Integers and `NULL` are bound as such, anything else as text.
    params: Vec<String>,
}

#[derive(Parser)]
struct ImportArgs {
    /// Target table.
    #[arg(long)]
    table: String,
    /// Column receiving each line.
    #[arg(long)]
    column: String,
    /// File with one value per line.
    file: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load(cli.config)?;
    let _guard = logging::init(&config.log)?;
    info!(driver = ?config.database.driver, "Starting mysql-tool...");

    let connector = config.database.connector()?;
    let mut client = Client::connect(config.database.connection.clone(), connector)?;

    match cli.command {
        Commands::Ping => {
            println!("ok: connected to {:?} database", config.database.driver);
            Ok(())
        }
        Commands::Query(args) => handle_query(&mut client, args),
        Commands::Import(args) => handle_import(&mut client, args),
    }
}

fn load(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => match config::default_config_path() {
            Some(path) if path.exists() => config::load_config(path),
            _ => Ok(Config::default()),
        },
    }
}

fn handle_query(client: &mut Client, args: QueryArgs) -> Result<()> {
    let params: Vec<Value> = args.params.iter().map(|p| parse_param(p)).collect();
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut count = 0usize;
    for row in client.iter_query(&args.sql, &params)? {
        let row = row?;
        serde_json::to_writer(&mut out, &row)?;
        out.write_all(b"\n")?;
        count += 1;
    }
    out.flush()?;
    info!("query returned {} rows", count);
    Ok(())
}

fn handle_import(client: &mut Client, args: ImportArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)?;
    let rows: Vec<Vec<Value>> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| vec![Value::from(line)])
        .collect();

    let template = sql::insert(&args.table, &ColumnValues::new().with(args.column.as_str(), Value::Null))?;
    client.insert_many(template.sql(), &rows)?;
    println!("imported {} rows into {}", rows.len(), args.table);
    Ok(())
}

fn parse_param(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    raw.parse::<i64>()
        .map(Value::Int)
        .unwrap_or_else(|_| Value::from(raw))
}
