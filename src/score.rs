use std::fmt;

use serde::{Deserialize, Serialize};

use crate::batch::Tally;
use crate::judge::Verdict;

/// The gold answer attached to an entailment item. This is the three-way
/// labeling used by FOLIO-style datasets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    True,
    False,
    Uncertain,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Label::True => write!(f, "True"),
            Label::False => write!(f, "False"),
            Label::Uncertain => write!(f, "Uncertain"),
        }
    }
}

impl Label {
    /// The verdict a perfect encoding would produce for this label.
    fn expected(&self) -> Verdict {
        match self {
            Label::True => Verdict::Entailed,
            Label::False => Verdict::Refuted,
            Label::Uncertain => Verdict::Underdetermined,
        }
    }
}

/// Scores a single-assertion item against its gold label.
///
/// An inconclusive verdict is never "wrong": the solver declined to commit,
/// so the item counts as undetermined rather than as a miss. Contradictory
/// premises likewise score as undetermined, since no assertion can be
/// meaningfully checked against them.
pub fn check_label(index: usize, verdicts: &[Verdict], label: Label) -> Tally {
    let verdict = match verdicts.first() {
        Some(v) => *v,
        None => {
            tracing::warn!(index, "no verdicts produced; scoring as undetermined");
            return Tally::undetermined();
        }
    };
    if verdicts.len() > 1 {
        tracing::warn!(
            index,
            count = verdicts.len(),
            "expected one assertion; scoring the first"
        );
    }
    match verdict {
        Verdict::Indeterminate | Verdict::Contradictory => Tally::undetermined(),
        v if v == label.expected() => Tally::correct(),
        v => {
            tracing::info!(index, verdict = %v, %label, "wrong answer");
            Tally::wrong()
        }
    }
}
