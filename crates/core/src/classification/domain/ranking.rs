/// One ranked label from a classifier invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
}

/// Top-k selection over a probability vector.
///
/// Keeps entries with confidence at or above `threshold`, at most
/// `max_results` of them, sorted by descending confidence with ties
/// broken by ascending label index. Probabilities beyond the label
/// list are ignored, as are labels beyond the probability vector.
pub fn top_ranked(
    probabilities: &[f32],
    labels: &[String],
    max_results: usize,
    threshold: f32,
) -> Vec<ClassificationResult> {
    let mut candidates: Vec<(usize, f32)> = probabilities
        .iter()
        .copied()
        .enumerate()
        .take(labels.len())
        .filter(|&(_, confidence)| confidence >= threshold)
        .collect();

    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    candidates.truncate(max_results);

    candidates
        .into_iter()
        .map(|(index, confidence)| ClassificationResult {
            label: labels[index].clone(),
            confidence,
        })
        .collect()
}
