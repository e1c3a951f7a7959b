//! Majority-vote aggregation of chunk predictions.

use std::collections::HashMap;

use webwarden_core::{AggregateDecision, ChunkPrediction};

use crate::{AggregateError, InferenceError, LabelSpace};

/// Winning label index of a vote, before decoding to a category name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MajorityVote {
    pub label_index: usize,
    /// Mean confidence over the chunks that voted for `label_index`, rounded to 4 decimals.
    pub confidence: f64,
    pub chunk_count: usize,
}

impl MajorityVote {
    /// Resolve the winning index to its category name.
    pub fn decode(self, labels: &LabelSpace) -> Result<AggregateDecision, InferenceError> {
        Ok(AggregateDecision {
            category: labels.decode(self.label_index)?.to_string(),
            confidence: self.confidence,
            chunk_count: self.chunk_count,
        })
    }
}

/// Reduce chunk predictions to one label.
///
/// The label with the most votes wins; on equal counts the label that
/// appeared first in chunk order wins. Confidence is averaged only over the
/// winning chunks, so outlier chunks do not dilute it.
pub fn aggregate(predictions: &[ChunkPrediction]) -> Result<MajorityVote, AggregateError> {
    if predictions.is_empty() {
        return Err(AggregateError::EmptyInput);
    }

    let mut counts: HashMap<usize, usize> = HashMap::new();
    let mut first_seen = Vec::new();
    for p in predictions {
        let count = counts.entry(p.label_index).or_insert(0);
        if *count == 0 {
            first_seen.push(p.label_index);
        }
        *count += 1;
    }

    // Strict comparison keeps the earliest label on ties.
    let mut winner = first_seen[0];
    for &label in &first_seen[1..] {
        if counts[&label] > counts[&winner] {
            winner = label;
        }
    }

    let (sum, n) = predictions
        .iter()
        .filter(|p| p.label_index == winner)
        .fold((0.0f64, 0usize), |(sum, n), p| (sum + p.confidence, n + 1));

    Ok(MajorityVote {
        label_index: winner,
        confidence: round4(sum / n as f64),
        chunk_count: predictions.len(),
    })
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: usize = 0;
    const B: usize = 1;
    const C: usize = 2;

    fn preds(items: &[(usize, f64)]) -> Vec<ChunkPrediction> {
        items
            .iter()
            .map(|&(label, conf)| ChunkPrediction::new(label, conf))
            .collect()
    }

    #[test]
    fn empty_input_errors() {
        assert_eq!(aggregate(&[]), Err(AggregateError::EmptyInput));
    }

    #[test]
    fn single_prediction() {
        let vote = aggregate(&preds(&[(C, 0.91234)])).unwrap();
        assert_eq!(vote.label_index, C);
        assert_eq!(vote.confidence, 0.9123);
        assert_eq!(vote.chunk_count, 1);
    }

    #[test]
    fn majority_wins_and_confidence_excludes_dissent() {
        let vote = aggregate(&preds(&[(A, 0.9), (B, 0.8), (A, 0.7)])).unwrap();
        assert_eq!(vote.label_index, A);
        assert_eq!(vote.confidence, 0.8);
        assert_eq!(vote.chunk_count, 3);
    }

    #[test]
    fn tie_goes_to_first_seen() {
        for _ in 0..100 {
            let vote = aggregate(&preds(&[(A, 0.5), (B, 0.5)])).unwrap();
            assert_eq!(vote.label_index, A);
        }
        let vote = aggregate(&preds(&[(B, 0.4), (A, 0.9)])).unwrap();
        assert_eq!(vote.label_index, B);
        assert_eq!(vote.confidence, 0.4);
    }

    #[test]
    fn tie_with_later_majority_block() {
        // B and C both reach two votes; B appeared first.
        let vote = aggregate(&preds(&[(A, 0.9), (B, 0.6), (C, 0.7), (C, 0.7), (B, 0.8)])).unwrap();
        assert_eq!(vote.label_index, B);
        assert_eq!(vote.confidence, 0.7);
    }

    #[test]
    fn rounds_to_four_decimals() {
        let vote = aggregate(&preds(&[(A, 0.33333), (A, 0.33334), (A, 0.33335)])).unwrap();
        assert_eq!(vote.confidence, 0.3333);
    }

    #[test]
    fn order_of_distinct_majority_does_not_matter() {
        let forward = aggregate(&preds(&[(A, 0.9), (B, 0.2), (A, 0.7), (A, 0.5)])).unwrap();
        let reverse = aggregate(&preds(&[(A, 0.5), (A, 0.7), (B, 0.2), (A, 0.9)])).unwrap();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn decode_to_category() {
        let labels = LabelSpace::from_names(["Education", "Games"]);
        let decision = aggregate(&preds(&[(B, 0.75)])).unwrap().decode(&labels).unwrap();
        assert_eq!(decision.category, "Games");
        assert_eq!(decision.confidence, 0.75);
        assert_eq!(decision.chunk_count, 1);
    }

    #[test]
    fn decode_unknown_label_errors() {
        let labels = LabelSpace::from_names(["Education"]);
        let err = aggregate(&preds(&[(5, 0.75)])).unwrap().decode(&labels).unwrap_err();
        assert!(matches!(err, InferenceError::UnknownLabel { index: 5, size: 1 }));
    }
}
