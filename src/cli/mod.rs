use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::application::{parse_payload, OrderContract, OrderLedger, PageRequest};
use crate::config::{DuplicatePolicy, LedgerConfig};
use crate::domain::{OrderCreateRequest, OrderStatusUpdate};
use crate::storage::SortOrder;

/// Orderledger - fulfillment order lifecycle ledger
#[derive(Parser)]
#[command(name = "orderledger")]
#[command(about = "Track fulfillment orders as an append-only history of status changes")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "ORDERLEDGER_DB", default_value = "orderledger.db")]
    pub database: String,

    /// Fail order creation when the order id is already taken
    #[arg(long, env = "ORDERLEDGER_REJECT_DUPLICATES", global = true)]
    pub reject_duplicates: bool,

    /// Only allow status changes along the lifecycle graph
    #[arg(long, env = "ORDERLEDGER_ENFORCE_TRANSITIONS", global = true)]
    pub enforce_transitions: bool,

    /// Upper bound for page sizes
    #[arg(long, env = "ORDERLEDGER_MAX_PAGE_SIZE", default_value_t = 1000, global = true)]
    pub max_page_size: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Create an order from a JSON payload ("-" reads stdin, "@file" reads a file)
    Create { payload: String },

    /// Record a status change from a JSON payload ("-" reads stdin, "@file" reads a file)
    Update { payload: String },

    /// Show the current record of an order
    Get { order_id: String },

    /// Print whether an order exists
    Exists { order_id: String },

    /// Show every stored version of an order
    History { order_id: String },

    /// List orders one page at a time
    List {
        /// Number of orders per page
        #[arg(short, long, default_value_t = 20)]
        page_size: usize,

        /// Bookmark returned by the previous page
        #[arg(short, long, default_value = "")]
        bookmark: String,

        /// Field to sort by (defaults to createdAt)
        #[arg(long)]
        sort_field: Option<String>,

        /// Sort direction: asc or desc (defaults to desc)
        #[arg(long)]
        sort_order: Option<String>,
    },

    /// Verify that every order's history matches its current status
    Check,

    /// Export all orders
    Export {
        /// Format: json, csv
        format: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import a JSON array of order creation payloads
    Import {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Validate without importing
        #[arg(long)]
        dry_run: bool,

        /// Skip orders that already exist
        #[arg(long)]
        skip_existing: bool,
    },

    /// Invoke a contract function by name with raw text arguments
    Invoke {
        /// Function name, e.g. createOrder or getAllOrdersWithPagination
        function: String,

        /// Arguments passed through unchanged
        args: Vec<String>,
    },
}

impl Cli {
    fn config(&self) -> LedgerConfig {
        let policy = if self.reject_duplicates {
            DuplicatePolicy::Reject
        } else {
            DuplicatePolicy::Overwrite
        };

        LedgerConfig::default()
            .with_duplicate_policy(policy)
            .with_enforced_transitions(self.enforce_transitions)
            .with_max_page_size(self.max_page_size)
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();
        tracing::debug!(database = %self.database, ?config, "starting");

        let Cli {
            database, command, ..
        } = self;

        if let Commands::Init = command {
            OrderLedger::init(&database, config).await?;
            println!("Database initialized: {}", database);
            return Ok(());
        }

        let ledger = OrderLedger::connect(&database, config)
            .await
            .with_context(|| format!("Failed to open database {}", database))?;
        run_command(&ledger, command).await
    }
}

async fn run_command(ledger: &OrderLedger, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {}

        Commands::Create { payload } => {
            let text = read_payload(&payload)?;
            let request: OrderCreateRequest = parse_payload(&text, "order data")?;
            let order = ledger.create_order(request).await?;
            print_json(&order)?;
        }

        Commands::Update { payload } => {
            let text = read_payload(&payload)?;
            let update: OrderStatusUpdate = parse_payload(&text, "status update data")?;
            let order = ledger.update_order_status(update).await?;
            print_json(&order)?;
        }

        Commands::Get { order_id } => {
            let order = ledger.get_order(&order_id).await?;
            print_json(&order)?;
        }

        Commands::Exists { order_id } => {
            println!("{}", ledger.order_exists(&order_id).await?);
        }

        Commands::History { order_id } => {
            let history = ledger.get_order_history(&order_id).await?;
            print_json(&history)?;
        }

        Commands::List {
            page_size,
            bookmark,
            sort_field,
            sort_order,
        } => {
            let sort_order = sort_order
                .map(|s| {
                    SortOrder::from_str(&s)
                        .with_context(|| format!("Invalid sort order '{}'. Use asc or desc", s))
                })
                .transpose()?;
            let request = PageRequest {
                page_size,
                bookmark,
                sort_field,
                sort_order,
            };
            let page = ledger.list_orders(request).await?;
            print_json(&page)?;
        }

        Commands::Check => run_check_command(ledger).await?,

        Commands::Export { format, output } => {
            run_export_command(ledger, &format, output.as_deref()).await?
        }

        Commands::Import {
            input,
            dry_run,
            skip_existing,
        } => run_import_command(ledger, input.as_deref(), dry_run, skip_existing).await?,

        Commands::Invoke { function, args } => {
            let response = OrderContract::new(ledger).invoke(&function, &args).await?;
            println!("{}", response);
        }
    }

    Ok(())
}

/// Resolve a payload argument: literal JSON, "-" for stdin, or "@path" for a file.
fn read_payload(arg: &str) -> Result<String> {
    use std::io::Read;

    if arg == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read payload from stdin")?;
        return Ok(text);
    }

    if let Some(path) = arg.strip_prefix('@') {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file: {}", path));
    }

    Ok(arg.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_check_command(ledger: &OrderLedger) -> Result<()> {
    println!("Checking order ledger integrity...\n");

    let report = ledger.check_integrity().await?;

    println!("Orders: {}", report.order_count);
    println!();

    if !report.status_counts.is_empty() {
        println!("By status:");
        for (status, count) in &report.status_counts {
            println!("  {:<28} {:>6}", format!("{}:", status), count);
        }
        println!();
    }

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    ledger: &OrderLedger,
    format: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(ledger);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let count = match format {
        "json" => exporter.export_orders_json(writer).await?,
        "csv" => exporter.export_orders_csv(writer).await?,
        _ => {
            anyhow::bail!("Invalid export format '{}'. Valid formats: json, csv", format);
        }
    };

    if output.is_some() {
        eprintln!("Exported {} orders", count);
    }

    Ok(())
}

async fn run_import_command(
    ledger: &OrderLedger,
    input: Option<&str>,
    dry_run: bool,
    skip_existing: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{stdin, Read};

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let options = ImportOptions {
        dry_run,
        skip_existing,
    };
    let result = Importer::new(ledger)
        .import_orders_json(reader, options)
        .await?;

    if dry_run {
        println!("Validation successful");
    } else {
        println!("Import complete");
    }
    println!("  Imported: {}", result.imported);
    println!("  Skipped:  {}", result.skipped);
    println!("  Errors:   {}", result.errors.len());

    if !result.errors.is_empty() {
        println!("\nErrors:");
        for error in result.errors.iter().take(10) {
            println!(
                "  Entry {}{}: {}",
                error.index,
                error
                    .order_id
                    .as_ref()
                    .map(|id| format!(" ({})", id))
                    .unwrap_or_default(),
                error.error
            );
        }
        if result.errors.len() > 10 {
            println!("  ... and {} more errors", result.errors.len() - 10);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_list_arguments() {
        let cli = Cli::parse_from([
            "orderledger",
            "--database",
            "test.db",
            "list",
            "--page-size",
            "5",
            "--sort-field",
            "slotId",
            "--sort-order",
            "asc",
        ]);

        assert_eq!(cli.database, "test.db");
        match cli.command {
            Commands::List {
                page_size,
                sort_field,
                sort_order,
                bookmark,
            } => {
                assert_eq!(page_size, 5);
                assert_eq!(sort_field.as_deref(), Some("slotId"));
                assert_eq!(sort_order.as_deref(), Some("asc"));
                assert!(bookmark.is_empty());
            }
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn test_cli_flags_build_config() {
        let cli = Cli::parse_from([
            "orderledger",
            "--reject-duplicates",
            "--enforce-transitions",
            "--max-page-size",
            "50",
            "check",
        ]);
        let config = cli.config();

        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert!(config.enforce_transitions);
        assert_eq!(config.max_page_size, 50);
    }

    #[test]
    fn test_cli_invoke_passes_raw_args() {
        let cli = Cli::parse_from([
            "orderledger",
            "invoke",
            "getAllOrdersWithPagination",
            "10",
            "",
        ]);
        match cli.command {
            Commands::Invoke { function, args } => {
                assert_eq!(function, "getAllOrdersWithPagination");
                assert_eq!(args, vec!["10".to_string(), String::new()]);
            }
            _ => panic!("expected invoke command"),
        }
    }

    #[test]
    fn test_read_payload_literal() {
        assert_eq!(read_payload("{\"a\":1}").unwrap(), "{\"a\":1}");
    }
}
