use futures::stream::{self, StreamExt};

use crate::execute::{ExecutionOutcome, Executor};
use crate::judge::Verdict;

/// How many items run at once by default. Kept small: each item is a whole
/// solver process, and upstream response files come from rate-limited APIs.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// What the dataset-specific scoring callback returns for one item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub correct: u32,
    pub wrong: u32,
    pub undetermined: u32,
    pub total: u32,
}

impl Tally {
    pub fn correct() -> Tally {
        Tally {
            correct: 1,
            total: 1,
            ..Tally::default()
        }
    }

    pub fn wrong() -> Tally {
        Tally {
            wrong: 1,
            total: 1,
            ..Tally::default()
        }
    }

    pub fn undetermined() -> Tally {
        Tally {
            undetermined: 1,
            total: 1,
            ..Tally::default()
        }
    }
}

/// Aggregate counters for a batch run. These are a commutative sum over
/// items, so they are invariant to execution and completion order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchMetrics {
    /// Items the scoring callback counted as correct.
    pub correct: u32,

    /// Items the scoring callback counted as wrong.
    pub wrong: u32,

    /// Items whose generated code failed to execute at all.
    pub generation_failed: u32,

    /// Items the solver could not settle, including timeouts.
    pub undetermined: u32,

    /// Everything. Equals the sum of the other four when the scoring
    /// callback honors its contract.
    pub total: u32,

    /// The number of items processed.
    pub items: u32,
}

impl BatchMetrics {
    /// Folds one item's outcome into the counters.
    ///
    /// A timeout is deliberately not a generation failure: the dominant
    /// cause is expensive quantifier instantiation on a meaningful encoding,
    /// so it scores as a single inconclusive verdict.
    fn record<F>(&mut self, index: usize, outcome: &ExecutionOutcome, score: &F)
    where
        F: Fn(usize, &[Verdict]) -> Tally,
    {
        self.items += 1;
        match outcome {
            ExecutionOutcome::Success(verdicts) => {
                let tally = score(index, verdicts);
                self.add(tally);
            }
            ExecutionOutcome::Timeout => {
                tracing::warn!(index, "timed out; scoring as indeterminate");
                let tally = score(index, &[Verdict::Indeterminate]);
                self.add(tally);
            }
            ExecutionOutcome::GenerationFailure(cause) => {
                tracing::error!(index, cause = %cause, "failed to execute");
                self.generation_failed += 1;
                self.total += 1;
            }
        }
    }

    fn add(&mut self, tally: Tally) {
        self.correct += tally.correct;
        self.wrong += tally.wrong;
        self.undetermined += tally.undetermined;
        self.total += tally.total;
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }

    pub fn print(&self) {
        println!();
        if self.generation_failed > 0 {
            println!("{} generation failures", self.generation_failed);
        }
        if self.undetermined > 0 {
            println!("{} undetermined by the solver", self.undetermined);
        }
        if self.wrong > 0 {
            println!("{} wrong", self.wrong);
        }
        println!("{}/{} correct", self.correct, self.total);
        println!("{:.2}% accuracy", 100.0 * self.accuracy());
    }
}

/// Drives every generated item through the executor with bounded
/// concurrency, scoring each result. Items are dispatched eagerly but
/// results are folded in dispatch order, so logs stay attributable even
/// though completion interleaves. One item's failure never aborts the batch.
pub async fn check_responses<C, F>(
    executor: &Executor,
    codes: &[C],
    score: F,
    concurrency: usize,
) -> BatchMetrics
where
    C: AsRef<str>,
    F: Fn(usize, &[Verdict]) -> Tally,
{
    let concurrency = concurrency.max(1);
    let mut metrics = BatchMetrics::default();
    let mut results = stream::iter(codes.iter().enumerate())
        .map(|(i, code)| async move { (i, executor.execute(code.as_ref()).await) })
        .buffered(concurrency);
    while let Some((i, outcome)) = results.next().await {
        metrics.record(i, &outcome, &score);
    }
    metrics
}

/// The strictly-sequential fallback, for debugging. Shares the single-item
/// path with the concurrent mode, so the two always agree on the counters.
pub fn check_responses_sync<C, F>(executor: &Executor, codes: &[C], score: F) -> BatchMetrics
where
    C: AsRef<str>,
    F: Fn(usize, &[Verdict]) -> Tally,
{
    let mut metrics = BatchMetrics::default();
    for (i, code) in codes.iter().enumerate() {
        let outcome = executor.execute_blocking(code.as_ref());
        metrics.record(i, &outcome, &score);
    }
    metrics
}
