//! Stress Test Data Generator for portgate
//!
//! Generates a rule file and a matching query file:
//! - All four (direction, protocol) buckets
//! - Single ports, port ranges, single addresses, address ranges, CIDR blocks
//! - Queries biased towards addresses near rule boundaries
//! - Optional malformed lines to exercise the skip-and-report path
//!
//! # Usage
//!
//! ```bash
//! # 1000 rules, 10000 queries
//! cargo run --features stress_gen --bin stress_gen -- -o /tmp/stress
//!
//! # Reproducible generation for bug reports
//! cargo run --features stress_gen --bin stress_gen -- --seed 12345 -o /tmp/repro
//!
//! # Load and evaluate the generated files, reporting timings
//! cargo run --release --features stress_gen --bin stress_gen -- --scenario large --verify -o /tmp/large
//! ```
//!
//! Writes `<output>.rules.csv` and `<output>.queries.csv`, each with a
//! `.sha256` checksum file alongside.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, ValueEnum};
use ipnetwork::Ipv4Network;
use portgate::core::firewall::{Direction, Protocol, RangeOrder};
use portgate::core::loader::{LoadOptions, evaluate_query_line, load_rules_from_str};
use portgate::core::rule::{AddressSpec, PortSpec, RuleRecord};
use portgate::validators::MAX_PORT;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

// ═══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "stress_gen")]
#[command(about = "Generate stress-test rule and query files for portgate")]
struct Args {
    /// Number of rules to generate (overridden by --scenario)
    #[arg(short, long, default_value = "1000")]
    rules: usize,

    /// Number of queries to generate (overridden by --scenario)
    #[arg(short, long, default_value = "10000")]
    queries: usize,

    /// Output path prefix
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Mix in malformed rule and query lines
    #[arg(long)]
    edge_cases: bool,

    /// Random seed for reproducible generation
    #[arg(long)]
    seed: Option<u64>,

    /// Use a predefined scenario (overrides --rules, --queries, --edge-cases)
    #[arg(long, value_enum)]
    scenario: Option<Scenario>,

    /// Load the generated rules and evaluate the queries, printing timings
    #[arg(long)]
    verify: bool,

    /// Preview generation without writing files
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    /// 20 rules, 100 queries
    Minimal,
    /// 1000 rules, 10000 queries
    Typical,
    /// 20000 rules, 200000 queries
    Large,
    /// 2000 rules, 20000 queries, 20% malformed lines
    Chaos,
}

impl Scenario {
    const fn sizes(self) -> (usize, usize) {
        match self {
            Scenario::Minimal => (20, 100),
            Scenario::Typical => (1_000, 10_000),
            Scenario::Large => (20_000, 200_000),
            Scenario::Chaos => (2_000, 20_000),
        }
    }

    const fn malformed_probability(self) -> f64 {
        match self {
            Scenario::Chaos => 0.20,
            _ => 0.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════════════════════════════════════

const MALFORMED_RULES: &[&str] = &[
    "inbound,tcp",
    "sideways,tcp,80,10.0.0.1",
    "inbound,icmp,80,10.0.0.1",
    "inbound,tcp,99999,10.0.0.1",
    "inbound,tcp,90-80,10.0.0.1",
    "outbound,udp,53,10.0.0.300",
    "outbound,udp,53,10.0.0.9-10.0.0.1",
    "outbound,udp,53,10.0.0.0/40",
    "inbound,tcp,80,1.2.3.4,extra",
];

const MALFORMED_QUERIES: &[&str] = &[
    "inbound,tcp,80",
    "inbound,tcp,http,10.0.0.1",
    "inbound,tcp,70000,10.0.0.1",
    "Inbound,tcp,80,10.0.0.1",
    "inbound,icmp,80,10.0.0.1",
    "inbound,tcp,80,10.0.0",
];

/// Addresses drawn from a handful of /16s so queries collide with rules
fn random_addr(rng: &mut StdRng) -> Ipv4Addr {
    const PREFIXES: &[[u8; 2]] = &[[10, 0], [10, 1], [172, 16], [192, 168], [52, 12]];
    let [a, b] = *PREFIXES.choose(rng).unwrap_or(&[10, 0]);
    Ipv4Addr::new(a, b, rng.random(), rng.random())
}

fn random_ports(rng: &mut StdRng) -> PortSpec {
    let start = rng.random_range(0..=MAX_PORT);
    if rng.random_bool(0.6) {
        PortSpec::single(start)
    } else {
        let end = start.saturating_add(rng.random_range(0..2048));
        PortSpec::Range { start, end }
    }
}

fn random_addresses(rng: &mut StdRng) -> AddressSpec {
    match rng.random_range(0..3) {
        0 => AddressSpec::Single(random_addr(rng).to_string()),
        1 => {
            let (a, b) = (random_addr(rng), random_addr(rng));
            AddressSpec::Range {
                low: a.min(b).to_string(),
                high: a.max(b).to_string(),
            }
        }
        _ => {
            let prefix = rng.random_range(16..=32);
            // Valid prefix and address, so construction cannot fail
            let net = Ipv4Network::new(random_addr(rng), prefix)
                .unwrap_or_else(|_| Ipv4Network::from(Ipv4Addr::UNSPECIFIED));
            AddressSpec::Network(net)
        }
    }
}

fn random_rule(rng: &mut StdRng) -> RuleRecord {
    RuleRecord {
        direction: *[Direction::Inbound, Direction::Outbound]
            .choose(rng)
            .unwrap_or(&Direction::Inbound),
        protocol: *[Protocol::Tcp, Protocol::Udp]
            .choose(rng)
            .unwrap_or(&Protocol::Tcp),
        ports: random_ports(rng),
        addresses: random_addresses(rng),
    }
}

fn generate_rules(rng: &mut StdRng, count: usize, malformed: f64) -> Vec<String> {
    (0..count)
        .map(|_| {
            if rng.random_bool(malformed) {
                (*MALFORMED_RULES.choose(rng).unwrap_or(&"")).to_string()
            } else {
                random_rule(rng).to_string()
            }
        })
        .collect()
}

/// Queries reuse rule ports and addresses half of the time so that a
/// meaningful share of them is accepted.
fn generate_queries(rng: &mut StdRng, rules: &[String], count: usize, malformed: f64) -> Vec<String> {
    (0..count)
        .map(|_| {
            if rng.random_bool(malformed) {
                return (*MALFORMED_QUERIES.choose(rng).unwrap_or(&"")).to_string();
            }
            let direction = if rng.random_bool(0.5) { "inbound" } else { "outbound" };
            let protocol = if rng.random_bool(0.5) { "tcp" } else { "udp" };
            let (port, addr) = match rules.choose(rng).map(|l| l.split(',').collect::<Vec<_>>()) {
                Some(fields) if fields.len() == 4 && rng.random_bool(0.5) => {
                    let port = fields[2]
                        .split('-')
                        .next()
                        .and_then(|p| p.parse().ok())
                        .unwrap_or(0u16);
                    let addr = fields[3]
                        .split(['-', '/'])
                        .next()
                        .and_then(|a| a.parse().ok())
                        .unwrap_or_else(|| random_addr(rng));
                    (port, addr)
                }
                _ => (rng.random_range(0..=MAX_PORT), random_addr(rng)),
            };
            format!("{direction},{protocol},{port},{addr}")
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Output
// ═══════════════════════════════════════════════════════════════════════════

fn write_with_checksum(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(path, &body)?;

    let digest = Sha256::digest(body.as_bytes());
    let name = path.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let mut checksum_path = path.as_os_str().to_owned();
    checksum_path.push(".sha256");
    std::fs::write(checksum_path, format!("{digest:x}  {name}\n"))
}

fn verify(rules: &[String], queries: &[String]) {
    for order in [RangeOrder::WidestFirst, RangeOrder::Insertion] {
        let started = Instant::now();
        let outcome = load_rules_from_str(
            &rules.join("\n"),
            LoadOptions {
                range_order: order,
                ..LoadOptions::default()
            },
        );
        let load_time = started.elapsed();

        let started = Instant::now();
        let accepted = queries
            .iter()
            .filter(|q| evaluate_query_line(&outcome.index, q).accepted)
            .count();
        let eval_time = started.elapsed();

        println!(
            "[{order}] loaded {} rules ({} skipped) in {:?}; {} / {} queries accepted in {:?}",
            outcome.loaded,
            outcome.diagnostics.len(),
            load_time,
            accepted,
            queries.len(),
            eval_time
        );
    }
}

fn main() {
    let args = Args::parse();

    let (rule_count, query_count, malformed) = match args.scenario {
        Some(scenario) => {
            let (r, q) = scenario.sizes();
            (r, q, scenario.malformed_probability())
        }
        None => (
            args.rules,
            args.queries,
            if args.edge_cases { 0.10 } else { 0.0 },
        ),
    };

    if !args.dry_run && args.output.is_none() {
        eprintln!("Error: --output is required (or use --dry-run)");
        std::process::exit(1);
    }

    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    println!("Using seed: {seed}");
    let mut rng = StdRng::seed_from_u64(seed);

    println!("Generating {rule_count} rules and {query_count} queries...");
    let rules = generate_rules(&mut rng, rule_count, malformed);
    let queries = generate_queries(&mut rng, &rules, query_count, malformed);

    if args.verify {
        verify(&rules, &queries);
    }

    if args.dry_run {
        for line in rules.iter().take(10) {
            println!("  {line}");
        }
        println!("(dry run, nothing written)");
        return;
    }

    if let Some(output) = args.output {
        let rules_path = output.with_extension("rules.csv");
        let queries_path = output.with_extension("queries.csv");
        for (path, lines) in [(&rules_path, &rules), (&queries_path, &queries)] {
            if let Err(e) = write_with_checksum(path, lines) {
                eprintln!("Error: failed to write {}: {e}", path.display());
                std::process::exit(1);
            }
            println!("Wrote {}", path.display());
        }
    }
}
