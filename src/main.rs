//! portgate - static packet-filter decision engine
//!
//! # Usage
//!
//! ```bash
//! portgate check rules.csv test.csv            # One verdict per query line
//! portgate check rules.csv test.csv -f json    # Verdicts with reasons as JSON
//! portgate eval rules.csv inbound tcp 80 192.168.1.2
//! portgate inspect rules.csv                   # Bucket sizes and skipped lines
//! portgate encode 192.168.1.2                  # Numeric key of an address
//! portgate init-config                         # Write default config.json
//! ```

use clap::{ArgAction, Parser, Subcommand};
use portgate::config::{self, AppConfig, OutputFormat};
use portgate::core::address;
use portgate::core::firewall::RangeOrder;
use portgate::core::loader::{
    LoadOptions, LoadOutcome, evaluate_queries_from_path, load_rules_from_path,
};
use portgate::core::query::QueryRecord;
use portgate::core::rule::FieldMatching;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

shadow_rs::shadow!(build);

/// `eval` exits 1 for a rejected query; errors use a distinct code
const EXIT_REJECTED: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "portgate", version, long_version = build::CLAP_LONG_VERSION)]
#[command(about = "Static packet-filter decision engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read rule directions/protocols by substring ("xinbound" is inbound,
    /// anything without "tcp" is udp) instead of rejecting unknown values
    #[arg(long, global = true)]
    lenient: bool,

    /// Range scan order: widest or insertion
    #[arg(long, global = true, value_name = "ORDER")]
    range_order: Option<RangeOrder>,

    /// Config file to use instead of the XDG default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every query in a query file
    Check {
        /// Rule file, one rule per line
        rules: PathBuf,
        /// Query file, one `direction,protocol,port,ip` per line
        queries: PathBuf,
        /// Output format (text or json)
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },
    /// Evaluate a single query; exits 0 if accepted, 1 if rejected, 2 on error
    Eval {
        rules: PathBuf,
        direction: String,
        protocol: String,
        port: u16,
        ip: String,
    },
    /// Show per-bucket rule counts and skipped rule lines
    Inspect {
        rules: PathBuf,
        /// Output format (text or json)
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },
    /// Print the numeric key used for range comparisons
    Encode { address: String },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    init_logging(cli.verbose, &config);

    exit_code(run(cli, config))
}

fn exit_code(result: portgate::Result<ExitCode>) -> ExitCode {
    result.unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        ExitCode::from(EXIT_ERROR)
    })
}

fn init_logging(verbose: u8, config: &AppConfig) {
    let level = match verbose {
        0 => config.log_level.parse().unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn load_options(cli: &Cli, config: &AppConfig) -> LoadOptions {
    let mut options = config.load_options();
    if cli.lenient {
        options.matching = FieldMatching::Lenient;
    }
    if let Some(order) = cli.range_order {
        options.range_order = order;
    }
    options
}

fn run(cli: Cli, config: AppConfig) -> portgate::Result<ExitCode> {
    let options = load_options(&cli, &config);

    match cli.command {
        Commands::Check {
            rules,
            queries,
            format,
        } => {
            let LoadOutcome { index, .. } = load_rules_from_path(&rules, options)?;
            let outcomes = evaluate_queries_from_path(&index, &queries)?;
            match format.unwrap_or(config.output_format) {
                OutputFormat::Text => {
                    for outcome in &outcomes {
                        println!("> {}", outcome.line);
                        println!("{}", outcome.decision.accepted);
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&outcomes)?);
                }
            }
        }
        Commands::Eval {
            rules,
            direction,
            protocol,
            port,
            ip,
        } => {
            let LoadOutcome { index, .. } = load_rules_from_path(&rules, options)?;
            let query = QueryRecord {
                direction,
                protocol,
                port,
                source_ip: ip,
            };
            let decision = index.evaluate(&query);
            tracing::info!(%query, reason = %decision.reason, "Evaluated");
            println!("{}", decision.accepted);
            if !decision.accepted {
                return Ok(ExitCode::from(EXIT_REJECTED));
            }
        }
        Commands::Inspect { rules, format } => {
            let outcome = load_rules_from_path(&rules, options)?;
            print_inspection(&outcome, format.unwrap_or(config.output_format))?;
        }
        Commands::Encode { address } => {
            let key = address::encode(&address)?;
            println!("{}", key.value());
        }
        Commands::InitConfig { force } => {
            let existing = cli.config.clone().or_else(config::config_path);
            if !force && existing.as_ref().is_some_and(|p| p.exists()) {
                eprintln!("Config already exists (use --force to overwrite)");
                return Ok(ExitCode::from(EXIT_ERROR));
            }
            match cli.config {
                Some(path) => {
                    config::save_config_to(&AppConfig::default(), &path)?;
                    println!("Wrote {}", path.display());
                }
                None => match config::save_config(&AppConfig::default())? {
                    Some(path) => println!("Wrote {}", path.display()),
                    None => {
                        eprintln!("Could not determine config directory");
                        return Ok(ExitCode::from(EXIT_ERROR));
                    }
                },
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_inspection(outcome: &LoadOutcome, format: OutputFormat) -> portgate::Result<()> {
    let stats = outcome.index.stats();
    match format {
        OutputFormat::Text => {
            println!("Rules loaded: {}", outcome.loaded);
            println!("Range order: {}", stats.range_order);
            println!("{:<9} {:<5} {:>6} {:>9} {:>7}", "direction", "proto", "ports", "addresses", "ranges");
            for b in &stats.buckets {
                println!(
                    "{:<9} {:<5} {:>6} {:>9} {:>7}",
                    b.direction, b.protocol, b.ports, b.addresses, b.ranges
                );
            }
            if !outcome.diagnostics.is_empty() {
                println!("Skipped lines: {}", outcome.diagnostics.len());
                for d in &outcome.diagnostics {
                    println!("  line {}: {} ({})", d.line_number, d.error, d.line.trim());
                }
            }
        }
        OutputFormat::Json => {
            let skipped: Vec<serde_json::Value> = outcome
                .diagnostics
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "line_number": d.line_number,
                        "line": d.line.trim(),
                        "kind": d.error.kind(),
                        "message": d.error.to_string(),
                    })
                })
                .collect();
            let report = serde_json::json!({
                "loaded": outcome.loaded,
                "stats": stats,
                "skipped": skipped,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(rules: &std::path::Path, ip: &str) -> ExitCode {
        let rules = rules.to_string_lossy().into_owned();
        let cli = Cli::parse_from([
            "portgate",
            "eval",
            rules.as_str(),
            "inbound",
            "tcp",
            "80",
            ip,
        ]);
        exit_code(run(cli, AppConfig::default()))
    }

    #[test]
    fn test_eval_exit_codes_separate_rejection_from_errors() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.csv");
        std::fs::write(&rules, "inbound,tcp,80,10.0.0.0-10.0.0.255\n").unwrap();

        assert_eq!(eval(&rules, "10.0.0.7"), ExitCode::SUCCESS);
        assert_eq!(eval(&rules, "10.0.1.7"), ExitCode::from(EXIT_REJECTED));
        assert_eq!(
            eval(&dir.path().join("absent.csv"), "10.0.0.7"),
            ExitCode::from(EXIT_ERROR)
        );
        assert_ne!(EXIT_REJECTED, EXIT_ERROR);
    }
}
