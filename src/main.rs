//! habitat-allocation CLI
//!
//! Allocate biodiversity credits from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Allocate a basket described in a JSON request
//! habitat-allocation allocate --input request.json
//!
//! # Output as JSON, greedy only
//! habitat-allocation allocate --input request.json --format json --greedy
//!
//! # Inspect the candidate options per demand line
//! habitat-allocation options --input request.json
//!
//! # Generate a random request for testing
//! habitat-allocation generate --banks 8 --lines 4
//! ```

use habitat_allocation::core::snapshot::AllocationRequest;
use habitat_allocation::optimization::allocator::{Allocator, AllocatorConfig};
use habitat_allocation::options::builder::OptionBuilder;
use habitat_allocation::simulation::stress_test::{generate_random_request, SnapshotConfig};
use std::fs;
use std::process;
use std::time::Duration;
use thiserror::Error;

fn print_usage() {
    eprintln!(
        r#"habitat-allocation — biodiversity credit allocation engine

USAGE:
    habitat-allocation <COMMAND> [OPTIONS]

COMMANDS:
    allocate    Allocate a demand basket at minimum cost
    options     List the legal, priced supply options per demand line
    generate    Generate a random allocation request (for testing)
    help        Show this message

OPTIONS (allocate):
    --input <FILE>       Path to JSON request file
    --format <FORMAT>    Output format: text (default) or json
    --max-banks <N>      Distinct bank cap (default: 2)
    --timeout-ms <N>     LP time budget before falling back (default: 30000)
    --greedy             Skip the LP and use the greedy heuristic

OPTIONS (options):
    --input <FILE>       Path to JSON request file

OPTIONS (generate):
    --banks <N>          Number of banks (default: 5)
    --lines <N>          Number of demand lines (default: 3)
    --seed <N>           RNG seed for a reproducible request
    --output <FILE>      Write to file instead of stdout

EXAMPLES:
    habitat-allocation allocate --input request.json
    habitat-allocation allocate --input request.json --format json --max-banks 1
    habitat-allocation options --input request.json
    habitat-allocation generate --banks 10 --lines 5 --seed 7 --output request.json"#
    );
}

#[derive(Debug, Error)]
enum SnapshotError {
    #[error("error reading file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("error parsing request JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

fn load_request(path: &str) -> Result<AllocationRequest, SnapshotError> {
    let content = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn load_or_exit(path: &str) -> AllocationRequest {
    load_request(path).unwrap_or_else(|e| {
        eprintln!("{}", e);
        if matches!(e, SnapshotError::Parse(_)) {
            eprintln!("Expected format:");
            eprintln!(
                r#"{{
  "demand": [{{ "habitat_name": "Lowland meadows", "units_required": 2.0 }}],
  "target": {{ "lpa_name": "Winchester", "nca_name": "South Downs",
              "lpa_neighbors": ["Test Valley"], "nca_neighbors": [] }},
  "contract_size": "small",
  "banks": [...], "catalog": [...], "stock": [...], "pricing": [...]
}}"#
            );
        }
        process::exit(1);
    })
}

fn required_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("{} requires {}", flag, what);
        process::exit(1);
    })
}

fn number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    args.get(i)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            eprintln!("{} requires a number", flag);
            process::exit(1);
        })
}

fn cmd_allocate(args: &[String]) {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut config = AllocatorConfig::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(required_value(args, i, "--input", "a file path"));
            }
            "--format" => {
                i += 1;
                format = required_value(args, i, "--format", "'text' or 'json'");
            }
            "--max-banks" => {
                i += 1;
                config.max_banks = number(args, i, "--max-banks");
            }
            "--timeout-ms" => {
                i += 1;
                config.solve_timeout = Some(Duration::from_millis(number(args, i, "--timeout-ms")));
            }
            "--greedy" => config.force_greedy = true,
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let (snapshot, target, basket, contract_size) = load_or_exit(&path).into_parts();
    let allocator = Allocator::new(config);
    let result = allocator
        .allocate(&snapshot, &target, &basket, &contract_size)
        .unwrap_or_else(|e| {
            eprintln!("Allocation failed: {}", e);
            process::exit(2);
        });

    if format == "json" {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing result: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", result);
        println!("\n--- Bank totals ---");
        for (bank, total) in result.bank_totals() {
            println!("  {:<16} £{}", bank.to_string(), total);
        }
    }
}

fn cmd_options(args: &[String]) {
    let mut input_path = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(required_value(args, i, "--input", "a file path"));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let (snapshot, target, basket, contract_size) = load_or_exit(&path).into_parts();
    let builder = OptionBuilder::new(&snapshot, &target, contract_size);
    let set = builder.build(&basket).unwrap_or_else(|e| {
        eprintln!("Option building failed: {}", e);
        process::exit(2);
    });

    for requirement in set.requirements() {
        println!(
            "Line {}: {} ({}, {} units)",
            requirement.line, requirement.habitat, requirement.ledger, requirement.units
        );
        for (_, option) in set.options_for_line(requirement.line) {
            println!(
                "  {:<12} {:<9} £{:<10} {:?} {}",
                option.bank_key.to_string(),
                option.tier.to_string(),
                option.unit_price.to_string(),
                option.kind,
                option.supply_label()
            );
        }
    }
    println!("\n{} options across {} banks", set.len(), set.banks().len());
}

fn cmd_generate(args: &[String]) {
    let mut config = SnapshotConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--banks" => {
                i += 1;
                config.bank_count = number(args, i, "--banks");
            }
            "--lines" => {
                i += 1;
                config.line_count = number(args, i, "--lines");
            }
            "--seed" => {
                i += 1;
                config.seed = Some(number(args, i, "--seed"));
            }
            "--output" => {
                i += 1;
                output_path = Some(required_value(args, i, "--output", "a file path"));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let request = generate_random_request(&config);
    let json = serde_json::to_string_pretty(&request).unwrap_or_else(|e| {
        eprintln!("Error serializing request: {}", e);
        process::exit(1);
    });

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} demand lines across {} banks → {}",
            request.demand.len(),
            config.bank_count,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "allocate" => cmd_allocate(rest),
        "options" => cmd_options(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
