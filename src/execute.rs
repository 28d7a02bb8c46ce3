use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::judge::{Judgment, Verdict};
use crate::script;
use crate::solver::{PipedSolver, SolverConfig};
use crate::theory::TheoryOptions;

/// The uniformly-shaped result of running one generated item. Failure
/// classification is a data value here, not an exception type: the
/// orchestrator and scoring layers branch on it directly.
#[derive(Debug, PartialEq)]
pub enum ExecutionOutcome {
    /// The item executed and was judged; one verdict per assertion.
    Success(Vec<Verdict>),

    /// The generator produced code that failed: bad syntax, a missing
    /// function, undeclared symbols, a container invariant violation, or a
    /// solver-phase error.
    GenerationFailure(String),

    /// The wall-clock budget expired and the worker was killed.
    Timeout,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExecutionOutcome::Success(verdicts) => {
                write!(f, "success: ")?;
                for (i, verdict) in verdicts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", verdict)?;
                }
                Ok(())
            }
            ExecutionOutcome::GenerationFailure(cause) => {
                write!(f, "generation failure: {}", cause)
            }
            ExecutionOutcome::Timeout => write!(f, "timeout"),
        }
    }
}

/// Runs generated items in isolation: each item gets a fresh solver process,
/// and a watchdog thread kills that process when the wall-clock budget
/// expires. Nothing is shared between items, so a runaway or crashing item
/// cannot disturb its siblings.
#[derive(Clone)]
pub struct Executor {
    pub solver: SolverConfig,
    pub options: TheoryOptions,

    /// Hard wall-clock budget for one item, enacted by killing the worker.
    pub timeout: Duration,
}

impl Default for Executor {
    fn default() -> Self {
        Executor {
            solver: SolverConfig::default(),
            options: TheoryOptions::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl Executor {
    pub fn new(solver: SolverConfig) -> Executor {
        Executor {
            solver,
            ..Executor::default()
        }
    }

    /// Runs one item to completion or timeout, blocking the calling thread.
    /// This is also the strictly-sequential debugging path.
    ///
    /// Phase (a) parses and evaluates the generated function into a theory;
    /// any failure there is a generation failure and never touches a solver.
    /// Phase (b) spawns the solver child, arms the watchdog, and judges.
    pub fn execute_blocking(&self, source: &str) -> ExecutionOutcome {
        let theory = match script::run_script(source, self.options) {
            Ok(theory) => theory,
            Err(e) => {
                tracing::debug!(error = %e, "failed to import generated code");
                return ExecutionOutcome::GenerationFailure(e.to_string());
            }
        };

        let mut config = self.solver.clone();
        if config.soft_timeout.is_none() {
            // Give the solver a chance to answer unknown on its own just
            // inside the hard budget, so most over-budget items still come
            // back with a verdict instead of a killed pipe.
            config.soft_timeout = Some(self.timeout.mul_f32(0.9));
        }
        let solver = match PipedSolver::spawn(&config) {
            Ok(solver) => solver,
            Err(e) => return ExecutionOutcome::GenerationFailure(e.to_string()),
        };

        // The watchdog holds only a kill handle. When the budget expires it
        // terminates exactly this item's solver process; dropping the sender
        // disarms it.
        let fired = Arc::new(AtomicBool::new(false));
        let (disarm_tx, disarm_rx) = mpsc::channel::<()>();
        {
            let fired = Arc::clone(&fired);
            let kill = solver.kill_handle();
            let budget = self.timeout;
            thread::spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) = disarm_rx.recv_timeout(budget) {
                    fired.store(true, Ordering::SeqCst);
                    kill.kill();
                }
            });
        }

        let mut judgment = Judgment::new(solver);
        let result = judgment.judge(&theory);
        drop(disarm_tx);

        match result {
            Ok(verdicts) => ExecutionOutcome::Success(verdicts),
            Err(_) if fired.load(Ordering::SeqCst) => ExecutionOutcome::Timeout,
            Err(e) => ExecutionOutcome::GenerationFailure(format!("judgment failed: {}", e)),
        }
    }

    /// The async form: the same body on a blocking worker thread, so the
    /// orchestrator's event loop only suspends while awaiting the result.
    pub async fn execute(&self, source: &str) -> ExecutionOutcome {
        let executor = self.clone();
        let source = source.to_string();
        match tokio::task::spawn_blocking(move || executor.execute_blocking(&source)).await {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::GenerationFailure(format!("worker panicked: {}", e)),
        }
    }
}
