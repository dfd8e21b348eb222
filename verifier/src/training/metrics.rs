use candle_core::Tensor;

/// Class-weighted binary cross-entropy on logits, averaged over the batch.
///
/// Uses `max(x, 0) - x * y + ln(1 + exp(-|x|))` so large logits do not overflow.
pub fn bce_with_logits(
    logits: &Tensor,
    targets: &Tensor,
    weights: &Tensor,
) -> candle_core::Result<Tensor> {
    let positive = logits.relu()?;
    let cross = logits.mul(targets)?;
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    let per_sample = positive.sub(&cross)?.add(&softplus)?;
    per_sample.mul(weights)?.mean_all()
}

/// Fraction of probabilities on the correct side of 0.5
pub fn accuracy(probabilities: &[f32], labels: &[u8]) -> f32 {
    if probabilities.is_empty() {
        return 0.0;
    }
    let correct = probabilities
        .iter()
        .zip(labels)
        .filter(|&(&p, &label)| (p >= 0.5) == (label == 1))
        .count();
    correct as f32 / probabilities.len() as f32
}

/// Area under the ROC curve (Mann-Whitney rank statistic, ties averaged).
/// `None` when only one class is present.
pub fn roc_auc(probabilities: &[f32], labels: &[u8]) -> Option<f32> {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut positive_rank_sum = 0f64;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probabilities[order[j + 1]] == probabilities[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied scores share the average rank
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                positive_rank_sum += average_rank;
            }
        }
        i = j + 1;
    }

    let positives = positives as f64;
    let negatives = negatives as f64;
    let u = positive_rank_sum - positives * (positives + 1.0) / 2.0;
    Some((u / (positives * negatives)) as f32)
}
