use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Table as ComfyTable};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spiritfood_warehouse::frame::{LocalFrame, TabularSource};
use spiritfood_warehouse::{
    lookup_flavor_profile, ComputePolicy, ConfigLoader, ConnectionOverrides, ExecutionMode,
    FallbackPolicy, Frame, GatewayBuilder, MemoryWarehouse, Params, TabularResult, Value,
    WarehouseGateway, WriteMode,
};

type CliError = Box<dyn std::error::Error + Send + Sync>;

/// Spirit Food warehouse gateway CLI
#[derive(Parser, Debug, Clone)]
#[command(name = "spiritfood-wh")]
#[command(about = "Query and load the Spirit Food warehouse through the access gateway", long_about = None)]
struct Args {
    /// Reference warehouse snapshot file
    #[arg(short = 's', long, default_value = "./data/warehouse.db")]
    snapshot: PathBuf,

    /// Warehouse account
    #[arg(short = 'a', long)]
    account: Option<String>,

    /// Warehouse user
    #[arg(short = 'u', long)]
    user: Option<String>,

    /// Warehouse password
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Default database
    #[arg(short = 'd', long)]
    database: Option<String>,

    /// Default schema
    #[arg(long)]
    schema: Option<String>,

    /// Virtual warehouse
    #[arg(short = 'w', long)]
    warehouse: Option<String>,

    /// Role
    #[arg(short = 'r', long)]
    role: Option<String>,

    /// Extra config file, read after the default locations
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Abort the command after this many seconds
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    /// Fail instead of falling back to the driver when a backend is missing
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Create the snapshot (if needed) and register the configured user
    Init,
    /// Run a query and print the result
    Query {
        sql: String,
        /// driver, distributed or columnar
        #[arg(short = 'm', long, default_value = "driver")]
        mode: ExecutionMode,
        /// Bind variable, repeatable
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
    },
    /// Run a statement and discard its result
    Exec { sql: String },
    /// Load a JSON array of records into a table
    Load {
        file: PathBuf,
        table: String,
        /// append, overwrite, error or ignore
        #[arg(short = 'm', long, default_value = "append")]
        mode: WriteMode,
        /// Write strategy; follows the data when omitted
        #[arg(long)]
        via: Option<ExecutionMode>,
        /// Create (or replace) the table from the inferred schema first
        #[arg(long)]
        create: bool,
    },
    /// Print the CREATE TABLE statement inferred for a JSON file
    Infer { file: PathBuf, table: String },
    /// Drop a table if it exists
    Drop { table: String },
    /// List tables in the snapshot
    Tables,
    /// Look up the flavor profile for an e-mail address
    Profile { email: String },
    /// Interactive SQL shell
    Shell,
}

impl Args {
    fn overrides(&self) -> ConnectionOverrides {
        let mut overrides = ConnectionOverrides::new();
        if let Some(account) = &self.account {
            overrides = overrides.account(account.clone());
        }
        if let Some(user) = &self.user {
            overrides = overrides.user(user.clone());
        }
        if let Some(password) = &self.password {
            overrides = overrides.password(password.clone());
        }
        if let Some(database) = &self.database {
            overrides = overrides.database(database.clone());
        }
        if let Some(schema) = &self.schema {
            overrides = overrides.schema(schema.clone());
        }
        if let Some(warehouse) = &self.warehouse {
            overrides = overrides.warehouse(warehouse.clone());
        }
        if let Some(role) = &self.role {
            overrides = overrides.role(role.clone());
        }
        overrides
    }

    fn loader(&self) -> ConfigLoader {
        match &self.config {
            Some(path) => ConfigLoader::new().with_file(path.clone()),
            None => ConfigLoader::new(),
        }
    }

    fn builder(&self, warehouse: &MemoryWarehouse, policy: ComputePolicy) -> GatewayBuilder {
        let fallback = if self.strict {
            FallbackPolicy::Strict
        } else {
            FallbackPolicy::Driver
        };
        WarehouseGateway::builder(warehouse.registry())
            .overrides(self.overrides())
            .config_loader(self.loader())
            .compute_policy(policy)
            .fallback_policy(fallback)
    }

    fn compute_policy(mode: Option<ExecutionMode>) -> ComputePolicy {
        match mode {
            Some(ExecutionMode::Distributed) => ComputePolicy::Private,
            _ => ComputePolicy::Disabled,
        }
    }
}

fn render(result: &TabularResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let mut table = ComfyTable::new();
    table.load_preset(UTF8_FULL);
    table.set_header(result.column_names().into_iter().map(Cell::new));
    for row in result.rows() {
        table.add_row(row.iter().map(|v| Cell::new(v.to_string())));
    }

    format!("{}\n({} rows)", table, result.row_count())
}

/// `name=value`; numbers bind as numbers, anything else as text.
fn parse_params(raw: &[String]) -> Result<Params, CliError> {
    let mut params = Params::new();
    for item in raw {
        let (name, value) = item
            .split_once('=')
            .ok_or_else(|| format!("parameter '{item}' is not NAME=VALUE"))?;
        let value = if let Ok(i) = value.parse::<i64>() {
            Value::Integer(i)
        } else if let Ok(f) = value.parse::<f64>() {
            Value::Float(f)
        } else {
            Value::Text(value.to_string())
        };
        params = params.bind(name.trim(), value);
    }
    Ok(params)
}

fn read_frame(path: &Path) -> Result<Frame, CliError> {
    let text = std::fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    let records = json
        .as_array()
        .ok_or_else(|| format!("{} must hold a JSON array of records", path.display()))?;
    Ok(LocalFrame::from_records(records)?.into())
}

fn open_warehouse(args: &Args) -> Result<MemoryWarehouse, CliError> {
    MemoryWarehouse::load(&args.snapshot).map_err(|e| {
        format!(
            "cannot open {}: {e} (run `spiritfood-wh init` first)",
            args.snapshot.display()
        )
        .into()
    })
}

fn run_command(args: &Args) -> Result<(), CliError> {
    if let Command::Init = args.command {
        let config = args.loader().load(&args.overrides())?;
        let warehouse = MemoryWarehouse::open_or_init(&args.snapshot, config.account())?;
        warehouse.create_user(config.user(), config.password());
        warehouse.save(&args.snapshot)?;
        println!("Initialized {} for account {}", args.snapshot.display(), warehouse.account());
        return Ok(());
    }

    let warehouse = open_warehouse(args)?;
    let mut dirty = false;

    match &args.command {
        Command::Init | Command::Shell => {}
        Command::Query { sql, mode, params } => {
            let params = parse_params(params)?;
            let builder = args.builder(&warehouse, Args::compute_policy(Some(*mode)));
            let result = WarehouseGateway::scoped(builder, |gw| gw.execute(sql, *mode, &params))?;
            println!("{}", render(&result));
            dirty = true;
        }
        Command::Exec { sql } => {
            let builder = args.builder(&warehouse, ComputePolicy::Disabled);
            WarehouseGateway::scoped(builder, |gw| gw.execute_statement(sql))?;
            println!("OK");
            dirty = true;
        }
        Command::Load {
            file,
            table,
            mode,
            via,
            create,
        } => {
            let frame = read_frame(file)?;
            let builder = args.builder(&warehouse, Args::compute_policy(*via));
            WarehouseGateway::scoped(builder, |gw| {
                if *create {
                    gw.create_and_populate(&frame, table, None, None, *via)
                } else {
                    gw.write(table, &frame, *via, *mode)
                }
            })?;
            println!("Loaded {} rows into {}", frame.source().row_count(), table);
            dirty = true;
        }
        Command::Infer { file, table } => {
            let frame = read_frame(file)?;
            let gateway = args.builder(&warehouse, ComputePolicy::Disabled).build()?;
            let ddl = gateway.infer(&frame, table, None, None)?;
            println!("{};", ddl.statement);
        }
        Command::Drop { table } => {
            let builder = args.builder(&warehouse, ComputePolicy::Disabled);
            WarehouseGateway::scoped(builder, |gw| gw.drop_table(table))?;
            println!("Dropped {table}");
            dirty = true;
        }
        Command::Tables => {
            let mut table = ComfyTable::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![Cell::new("table"), Cell::new("rows")]);
            for name in warehouse.table_names() {
                let rows = warehouse.row_count(&name).unwrap_or(0);
                table.add_row(vec![Cell::new(&name), Cell::new(rows)]);
            }
            println!("{table}");
        }
        Command::Profile { email } => {
            let builder = args.builder(&warehouse, ComputePolicy::Disabled);
            let lookup = lookup_flavor_profile(builder, email);
            if lookup.is_failed() {
                warn!("Profile lookup failed, reporting as not found");
            }
            println!("{}", serde_json::to_string_pretty(&lookup.into_profile())?);
        }
    }

    if dirty {
        warehouse.save(&args.snapshot)?;
    }
    Ok(())
}

fn run_shell(args: &Args) -> Result<(), CliError> {
    let warehouse = open_warehouse(args)?;
    let mut gateway = args
        .builder(&warehouse, ComputePolicy::Private)
        .open()?;
    let mut mode = ExecutionMode::Driver;

    let mut rl = DefaultEditor::new()?;
    let history_file = dirs::home_dir().map(|mut p| {
        p.push(".spiritfood_wh_history");
        p
    });
    if let Some(path) = &history_file {
        let _ = rl.load_history(path); // Ignore error if file doesn't exist
    }

    println!("Connected as {} to {}", gateway.config().user(), gateway.config().account());
    println!("Type \\? for help, \\q to quit.\n");

    loop {
        match rl.readline("spiritfood> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(meta) = line.strip_prefix('\\') {
                    let mut parts = meta.split_whitespace();
                    match (parts.next(), parts.next()) {
                        (Some("q" | "quit"), _) => break,
                        (Some("dt"), _) => {
                            for name in warehouse.table_names() {
                                println!("{name}");
                            }
                        }
                        (Some("mode"), Some(requested)) => match requested.parse() {
                            Ok(next) => {
                                mode = next;
                                println!("Execution mode: {mode}");
                            }
                            Err(e) => println!("{e}"),
                        },
                        (Some("mode"), None) => {
                            let modes: Vec<String> =
                                gateway.available_modes().iter().map(ToString::to_string).collect();
                            println!("Execution mode: {mode} (available: {})", modes.join(", "));
                        }
                        _ => {
                            println!("Meta-commands:");
                            println!("  \\q, \\quit             - Quit");
                            println!("  \\dt                   - List tables");
                            println!("  \\mode [driver|distributed|columnar] - Show or set execution mode");
                            println!("  \\?                    - Show this help");
                        }
                    }
                    continue;
                }

                match gateway.execute(line, mode, &Params::new()) {
                    Ok(result) => println!("{}", render(&result)),
                    Err(e) => println!("ERROR: {e}"),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                error!("Readline error: {}", e);
                break;
            }
        }
    }

    if let Some(path) = &history_file {
        let _ = rl.save_history(path);
    }
    gateway.close();
    warehouse.save(&args.snapshot)?;
    Ok(())
}

/// Runs `job` on the blocking pool, giving up after `timeout` seconds.
async fn run_with_deadline<F>(timeout: Option<u64>, job: F) -> Result<(), CliError>
where
    F: FnOnce() -> Result<(), CliError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(job);
    let joined = match timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), handle)
            .await
            .map_err(|_| format!("command timed out after {secs}s"))?,
        None => handle.await,
    };
    joined?
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let outcome = if matches!(args.command, Command::Shell) {
        run_with_deadline(None, move || run_shell(&args)).await
    } else {
        let timeout = args.timeout;
        run_with_deadline(timeout, move || run_command(&args)).await
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
