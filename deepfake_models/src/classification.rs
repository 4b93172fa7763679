/// Per-class probabilities for a single input, indexed by class id.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities(Vec<f32>);

impl ClassProbabilities {
    pub fn new(probabilities: Vec<f32>) -> Self {
        Self(probabilities)
    }

    /// Numerically stable softmax over raw logits.
    pub fn from_logits(logits: &[f32]) -> Self {
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        Self(exps.into_iter().map(|e| e / sum).collect())
    }

    pub fn get(&self, class_id: usize) -> Option<f32> {
        self.0.get(class_id).copied()
    }

    /// Index and probability of the most likely class. Ties go to the lower
    /// class id.
    pub fn argmax(&self) -> Option<(usize, f32)> {
        self.0
            .iter()
            .copied()
            .enumerate()
            .reduce(|best, row| if row.1 > best.1 { row } else { best })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = ClassProbabilities::from_logits(&[2.0, -1.0]);
        let sum: f32 = probs.as_slice().iter().sum();

        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs.get(0).unwrap() > probs.get(1).unwrap());
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let probs = ClassProbabilities::from_logits(&[1000.0, 1000.0]);

        assert_eq!(probs.as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn test_argmax_prefers_first_on_tie() {
        let probs = ClassProbabilities::new(vec![0.5, 0.5]);

        assert_eq!(probs.argmax(), Some((0, 0.5)));
    }

    #[test]
    fn test_argmax_picks_most_likely_class() {
        let probs = ClassProbabilities::new(vec![0.1, 0.7, 0.2]);

        assert_eq!(probs.argmax(), Some((1, 0.7)));
        assert_eq!(ClassProbabilities::new(vec![]).argmax(), None);
    }
}
