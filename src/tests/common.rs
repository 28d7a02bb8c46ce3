use std::process::Command;
use std::time::Duration;

use crate::execute::{ExecutionOutcome, Executor};
use crate::judge::Verdict;
use crate::solver::SolverConfig;

/// Finds a real SMT solver on the PATH, preferring z3. End-to-end tests
/// skip themselves when none is installed.
pub fn find_solver() -> Option<SolverConfig> {
    for config in [SolverConfig::z3(), SolverConfig::cvc5()] {
        let found = Command::new(&config.program)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);
        if found {
            return Some(config);
        }
    }
    None
}

pub fn real_executor(config: SolverConfig) -> Executor {
    let mut executor = Executor::new(config);
    // These theories are tiny; anything near the default budget is a hang.
    executor.timeout = Duration::from_secs(30);
    executor
}

/// Judges one encoding against a real solver, panicking on any failure.
pub fn judge_source(config: SolverConfig, source: &str) -> Vec<Verdict> {
    match real_executor(config).execute_blocking(source) {
        ExecutionOutcome::Success(verdicts) => verdicts,
        other => panic!("execution failed: {}", other),
    }
}
