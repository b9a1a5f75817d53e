//! Versioned answer keys and grading
//!
//! A key is produced once from a scanned master sheet and never modified.
//! Publishing a new key swaps the shared pointer; graders take a snapshot
//! and are unaffected by later publications.

use crate::omr::AnswersMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerKey {
    pub version: u64,
    pub answers: AnswersMap,
}

/// Holder of the currently active key
#[derive(Debug, Default)]
pub struct AnswerKeyStore {
    current: RwLock<Option<Arc<AnswerKey>>>,
}

impl AnswerKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `answers` as the next key version and return it
    pub fn publish(&self, answers: AnswersMap) -> Arc<AnswerKey> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = current.as_ref().map_or(1, |key| key.version + 1);
        let key = Arc::new(AnswerKey { version, answers });
        *current = Some(Arc::clone(&key));
        tracing::info!(version, questions = key.answers.len(), "Answer key published");
        key
    }

    /// Snapshot of the active key
    pub fn current(&self) -> Option<Arc<AnswerKey>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Wrong,
    Unanswered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionGrade {
    pub question: u32,
    pub expected: u8,
    pub given: Option<u8>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeReport {
    pub key_version: u64,
    pub correct: usize,
    pub wrong: usize,
    pub unanswered: usize,
    /// Number of keyed questions
    pub total: usize,
    /// Correct over total, in percent, rounded to two decimals
    pub percentage: f64,
    pub questions: Vec<QuestionGrade>,
}

/// Compare a student's answers against `key`. Only keyed questions count.
pub fn grade(key: &AnswerKey, answers: &AnswersMap) -> GradeReport {
    let mut questions = Vec::with_capacity(key.answers.len());
    let (mut correct, mut wrong, mut unanswered) = (0, 0, 0);

    for (question, expected) in key.answers.iter() {
        let given = answers.get(question);
        let outcome = match given {
            None => {
                unanswered += 1;
                Outcome::Unanswered
            }
            Some(option) if option == expected => {
                correct += 1;
                Outcome::Correct
            }
            Some(_) => {
                wrong += 1;
                Outcome::Wrong
            }
        };
        questions.push(QuestionGrade {
            question,
            expected,
            given,
            outcome,
        });
    }

    let total = key.answers.len();
    let percentage = if total > 0 {
        (correct as f64 / total as f64 * 10000.0).round() / 100.0
    } else {
        0.0
    };

    GradeReport {
        key_version: key.version,
        correct,
        wrong,
        unanswered,
        total,
        percentage,
        questions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(entries: &[(u32, u8)]) -> AnswersMap {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_publish_increments_version() {
        let store = AnswerKeyStore::new();
        assert!(store.current().is_none());

        let first = store.publish(answers(&[(1, 2)]));
        let second = store.publish(answers(&[(1, 3)]));

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(store.current().unwrap().version, 2);
    }

    #[test]
    fn test_snapshot_survives_republish() {
        let store = AnswerKeyStore::new();
        store.publish(answers(&[(1, 2)]));
        let snapshot = store.current().unwrap();

        store.publish(answers(&[(1, 4)]));

        assert_eq!(snapshot.answers.get(1), Some(2));
        assert_eq!(store.current().unwrap().answers.get(1), Some(4));
    }

    #[test]
    fn test_grade_counts_outcomes() {
        let key = AnswerKey {
            version: 3,
            answers: answers(&[(1, 1), (2, 2), (3, 3)]),
        };
        // Question 9 is not keyed and must not count
        let student = answers(&[(1, 1), (2, 4), (9, 1)]);

        let report = grade(&key, &student);

        assert_eq!(report.key_version, 3);
        assert_eq!((report.correct, report.wrong, report.unanswered), (1, 1, 1));
        assert_eq!(report.total, 3);
        assert_eq!(report.percentage, 33.33);
        assert_eq!(report.questions[2].outcome, Outcome::Unanswered);
    }

    #[test]
    fn test_grade_empty_key() {
        let key = AnswerKey {
            version: 1,
            answers: AnswersMap::new(),
        };
        let report = grade(&key, &answers(&[(1, 1)]));
        assert_eq!(report.total, 0);
        assert_eq!(report.percentage, 0.0);
    }
}
