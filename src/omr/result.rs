//! Final scan result assembly

use super::config::LayoutConfig;
use super::grid::{CellDecision, CellOutcome};
use super::header::StudentInfo;
use super::rectify::Rectification;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sparse question -> option mapping. Unanswered questions are absent.
/// Serializes as a JSON object keyed by question number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswersMap(BTreeMap<u32, u8>);

impl AnswersMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question: u32) -> Option<u8> {
        self.0.get(&question).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in ascending question order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.0.iter().map(|(q, o)| (*q, *o))
    }

    /// Record an answer if it fits the layout; returns whether it was kept
    pub fn insert_checked(&mut self, question: u32, option: u8, layout: &LayoutConfig) -> bool {
        let in_range = question >= 1
            && question as usize <= layout.total_questions()
            && option >= 1
            && option as usize <= layout.choices;
        if in_range {
            self.0.insert(question, option);
        }
        in_range
    }
}

impl FromIterator<(u32, u8)> for AnswersMap {
    fn from_iter<I: IntoIterator<Item = (u32, u8)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A question where several bubbles were marked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowConfidence {
    pub question: u32,
    pub chosen: u8,
    pub marked_options: Vec<u8>,
}

/// Everything read from one sheet
#[derive(Debug, Clone, Serialize)]
pub struct SheetScan {
    pub student_info: StudentInfo,
    pub answers: AnswersMap,
    pub low_confidence: Vec<LowConfidence>,
    pub rectification: Rectification,
    pub rotation_degrees: u32,
    pub candidates: usize,
}

/// Collect per-cell decisions into the answers map and the audit list
pub fn assemble(
    outcomes: &[CellOutcome],
    layout: &LayoutConfig,
) -> (AnswersMap, Vec<LowConfidence>) {
    let mut answers = AnswersMap::new();
    let mut low_confidence = Vec::new();

    for outcome in outcomes {
        let Some(option) = outcome.decision.option() else {
            continue;
        };
        if !answers.insert_checked(outcome.question, option, layout) {
            tracing::warn!(
                question = outcome.question,
                option,
                "Answer outside the sheet layout dropped"
            );
            continue;
        }
        if let CellDecision::Ambiguous { marked_options, .. } = &outcome.decision {
            low_confidence.push(LowConfidence {
                question: outcome.question,
                chosen: option,
                marked_options: marked_options.clone(),
            });
        }
    }

    (answers, low_confidence)
}
