// The entail CLI.
// You can evaluate a batch of generated encodings against gold labels, or
// judge a single encoding and print its verdicts.

use std::time::Duration;

use clap::{Parser, Subcommand};
use entail::batch::{self, DEFAULT_CONCURRENCY};
use entail::execute::{ExecutionOutcome, Executor};
use entail::response::extract_code;
use entail::score::{check_label, Label};
use entail::solver::SolverConfig;
use entail::theory::TheoryOptions;
use mimalloc::MiMalloc;
use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// One line of an evaluation file. Either the encoding itself or the raw
/// model response that contains it.
#[derive(Deserialize)]
struct Item {
    #[serde(default)]
    code: Option<String>,

    #[serde(default)]
    response: Option<String>,

    label: Label,
}

#[derive(Parser)]
#[clap(
    name = "entail",
    about = "Judges natural-language entailment claims by executing generated logical encodings against an SMT solver",
    version = env!("CARGO_PKG_VERSION")
)]
struct Args {
    /// Solver binary to run (z3 and cvc5 get the right flags automatically)
    #[clap(long, global = true, default_value = "z3", value_name = "PROGRAM")]
    solver: String,

    /// Wall-clock budget per item, in seconds
    #[clap(long, global = true, default_value = "60", value_name = "SECONDS")]
    timeout: f32,

    /// Skip the definitions group when building each theory
    #[clap(long, global = true)]
    no_definitions: bool,

    /// Skip the world-knowledge group when building each theory
    #[clap(long, global = true)]
    no_common_knowledge: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a labeled batch of encodings and print the counters
    Eval {
        /// JSONL file with one {"code": ..., "label": ...} item per line
        #[clap(value_name = "FILE")]
        file: String,

        /// How many items to run concurrently
        #[clap(long, default_value_t = DEFAULT_CONCURRENCY, value_name = "N")]
        jobs: usize,

        /// Run items one at a time, off the async runtime
        #[clap(long)]
        sync: bool,
    },

    /// Judge a single encoding and print one verdict per assertion
    Judge {
        /// File containing the encoding, or "-" for stdin
        #[clap(value_name = "FILE")]
        file: String,

        /// Print the verdict list as a JSON array instead of prose
        #[clap(long)]
        json: bool,
    },
}

fn read_source(file: &str) -> String {
    let result = if file == "-" {
        std::io::read_to_string(std::io::stdin())
    } else {
        std::fs::read_to_string(file)
    };
    match result {
        Ok(s) => s,
        Err(e) => {
            println!("Error reading {}: {}", file, e);
            std::process::exit(1);
        }
    }
}

fn load_items(file: &str) -> Vec<(String, Label)> {
    let contents = read_source(file);
    let mut items = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item: Item = match serde_json::from_str(line) {
            Ok(item) => item,
            Err(e) => {
                println!("Error on line {} of {}: {}", lineno + 1, file, e);
                std::process::exit(1);
            }
        };
        let code = match (item.code, item.response) {
            (Some(code), _) => code,
            (None, Some(response)) => match extract_code(&response) {
                Ok(code) => code,
                Err(e) => {
                    // A response with no code is a generation failure, not
                    // an input error; pass it through and let the executor
                    // count it.
                    tracing::error!(line = lineno + 1, %e, "no code in response");
                    String::new()
                }
            },
            (None, None) => {
                println!(
                    "Error on line {} of {}: need a \"code\" or \"response\" field",
                    lineno + 1,
                    file
                );
                std::process::exit(1);
            }
        };
        items.push((code, item.label));
    }
    items
}

#[tokio::main]
async fn main() {
    // Use RUST_LOG to control log levels, e.g.:
    //   RUST_LOG=entail=debug entail eval responses.jsonl
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let mut executor = Executor::new(SolverConfig::for_program(&args.solver));
    executor.timeout = Duration::from_secs_f32(args.timeout);
    executor.options = TheoryOptions {
        use_definitions: !args.no_definitions,
        use_common_knowledge: !args.no_common_knowledge,
    };

    match args.command {
        Command::Eval { file, jobs, sync } => {
            let items = load_items(&file);
            let codes: Vec<String> = items.iter().map(|(code, _)| code.clone()).collect();
            let labels: Vec<Label> = items.iter().map(|(_, label)| *label).collect();
            let score = |index: usize, verdicts: &[entail::judge::Verdict]| {
                check_label(index, verdicts, labels[index])
            };
            let metrics = if sync {
                batch::check_responses_sync(&executor, &codes, score)
            } else {
                batch::check_responses(&executor, &codes, score, jobs).await
            };
            metrics.print();
            if metrics.generation_failed > 0 {
                std::process::exit(1);
            }
        }

        Command::Judge { file, json } => {
            let source = read_source(&file);
            match executor.execute(&source).await {
                ExecutionOutcome::Success(verdicts) => {
                    if json {
                        match serde_json::to_string(&verdicts) {
                            Ok(line) => println!("{}", line),
                            Err(e) => {
                                println!("Error serializing verdicts: {}", e);
                                std::process::exit(1);
                            }
                        }
                    } else {
                        for (i, verdict) in verdicts.iter().enumerate() {
                            println!("assertion {}: {}", i + 1, verdict);
                        }
                    }
                }
                ExecutionOutcome::Timeout => {
                    println!("Timed out after {} seconds.", args.timeout);
                    std::process::exit(1);
                }
                ExecutionOutcome::GenerationFailure(cause) => {
                    println!("Error: {}", cause);
                    std::process::exit(1);
                }
            }
        }
    }
}
