use std::fmt;

use serde::Serialize;

use crate::solver::{SatResult, SmtSolver, SolverError};
use crate::theory::Theory;

/// The status of one target assertion relative to the premise set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// The assertion holds in every model of the premises.
    Entailed,

    /// The negation holds in every model; the assertion is false.
    Refuted,

    /// Both the assertion and its negation are consistent with the premises;
    /// the premises do not decide it.
    Underdetermined,

    /// The premises themselves are inconsistent. The encoding ran fine, but
    /// the logic it states is unsound.
    Contradictory,

    /// The solver could not resolve one of the probes.
    Indeterminate,
}

impl Verdict {
    /// Combines the two satisfiability probes for an assertion A:
    /// r1 answers "premises and A", r2 answers "premises and (not A)".
    pub fn from_probes(r1: SatResult, r2: SatResult) -> Verdict {
        match (r1, r2) {
            (SatResult::Sat, SatResult::Sat) => Verdict::Underdetermined,
            (SatResult::Sat, SatResult::Unsat) => Verdict::Entailed,
            (SatResult::Sat, SatResult::Unknown) => Verdict::Indeterminate,
            (SatResult::Unsat, SatResult::Sat) => Verdict::Refuted,
            (SatResult::Unsat, SatResult::Unsat) => Verdict::Contradictory,
            (SatResult::Unsat, SatResult::Unknown) => Verdict::Indeterminate,
            (SatResult::Unknown, _) => Verdict::Indeterminate,
        }
    }

    /// The pass/fail reading of a verdict: Entailed is true, Refuted is
    /// false, and everything else is inconclusive.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Verdict::Entailed => Some(true),
            Verdict::Refuted => Some(false),
            _ => None,
        }
    }

    pub fn is_conclusive(&self) -> bool {
        self.as_bool().is_some()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Verdict::Entailed => write!(f, "Entailed"),
            Verdict::Refuted => write!(f, "Refuted"),
            Verdict::Underdetermined => write!(f, "Underdetermined"),
            Verdict::Contradictory => write!(f, "Contradictory"),
            Verdict::Indeterminate => write!(f, "Indeterminate"),
        }
    }
}

/// Judges a theory's assertions against its premise set, two satisfiability
/// probes per assertion.
///
/// The judgment owns its solver backend; each theory gets a fresh backend, so
/// declaring the signature here takes the place of the cross-context formula
/// translation the ablation flag in older encodings controlled.
pub struct Judgment<S: SmtSolver> {
    solver: S,

    // Premises are added to the solving context exactly once, even if the
    // judgment runs repeatedly on the same theory.
    added: bool,
}

impl<S: SmtSolver> Judgment<S> {
    pub fn new(solver: S) -> Judgment<S> {
        Judgment {
            solver,
            added: false,
        }
    }

    /// Declares the signature and asserts the premise conjunction:
    /// definitions (when enabled), claims, and world knowledge (when
    /// enabled). Idempotent across calls.
    fn add_premises(&mut self, theory: &Theory) -> Result<(), SolverError> {
        if self.added {
            return Ok(());
        }
        for decl in theory.signature() {
            self.solver.declare(&decl.to_sexpr())?;
        }
        if theory.options.use_definitions {
            for formula in theory.definitions() {
                self.solver.assert(&formula.term)?;
            }
        }
        for formula in theory.claims() {
            self.solver.assert(&formula.term)?;
        }
        if theory.options.use_common_knowledge {
            for formula in theory.world_knowledge() {
                self.solver.assert(&formula.term)?;
            }
        }
        self.added = true;
        Ok(())
    }

    /// Runs the raw probe pair for every assertion, in assertion order.
    pub fn verify(&mut self, theory: &Theory) -> Result<Vec<(SatResult, SatResult)>, SolverError> {
        self.add_premises(theory)?;
        let mut probes = Vec::with_capacity(theory.assertions().len());
        for formula in theory.assertions() {
            let r1 = self.solver.check_assuming(&formula.term)?;
            let r2 = self.solver.check_assuming(&formula.term.negated())?;
            probes.push((r1, r2));
        }
        Ok(probes)
    }

    /// Judges every assertion. A premise set that is unsatisfiable on its own
    /// is a defect in the generated theory; it short-circuits every assertion
    /// to Contradictory without issuing probes.
    pub fn judge(&mut self, theory: &Theory) -> Result<Vec<Verdict>, SolverError> {
        self.add_premises(theory)?;

        if self.solver.check()? == SatResult::Unsat {
            tracing::warn!("premises are unsatisfiable on their own");
            return Ok(vec![Verdict::Contradictory; theory.assertions().len()]);
        }

        let verdicts = self
            .verify(theory)?
            .into_iter()
            .map(|(r1, r2)| Verdict::from_probes(r1, r2))
            .collect();
        Ok(verdicts)
    }
}
