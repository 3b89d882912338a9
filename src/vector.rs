//! Shared numeric helpers for unit-norm embeddings.
//!
//! Every embedding that leaves a feature mode, the cache, the classifier or the
//! clusterer is L2-normalized, so cosine similarity reduces to a dot product.

/// A unit-norm feature vector.
pub type Embedding = Vec<f32>;

/// Norms below this are treated as zero.
const NORM_EPSILON: f32 = 1e-12;

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// L2-normalize a vector. Returns `None` if the norm is zero (or not finite).
pub fn l2_normalize(v: &[f32]) -> Option<Embedding> {
    let norm = l2_norm(v);
    if norm > NORM_EPSILON && norm.is_finite() {
        Some(v.iter().map(|x| x / norm).collect())
    } else {
        None
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Element-wise mean of equal-length vectors, re-normalized.
///
/// Returns `None` for an empty input, mismatched lengths, or a zero mean.
pub fn mean_normalized<V: AsRef<[f32]>>(vectors: &[V]) -> Option<Embedding> {
    let first = vectors.first()?.as_ref();
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    for v in vectors {
        let v = v.as_ref();
        if v.len() != dim {
            return None;
        }
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    for x in &mut sum {
        *x /= n;
    }
    l2_normalize(&sum)
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let total: f32 = exps.iter().sum::<f32>() + NORM_EPSILON;
    exps.into_iter().map(|e| e / total).collect()
}

/// Population mean and standard deviation. `(0, 0)` for an empty slice.
pub fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n;
    (mean, var.sqrt())
}

/// Quantile with linear interpolation between closest ranks.
///
/// `q` is clamped to `[0, 1]`. Returns 0 for an empty slice.
pub fn quantile(values: &[f32], q: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Resample `values` to `bins` points by linear interpolation over evenly
/// spaced positions spanning the whole input.
pub fn linear_resample(values: &[f32], bins: usize) -> Vec<f32> {
    match values.len() {
        0 => vec![0.0; bins],
        1 => vec![values[0]; bins],
        len => {
            if bins == 1 {
                return vec![values[0]];
            }
            let last = (len - 1) as f32;
            (0..bins)
                .map(|i| {
                    let pos = last * i as f32 / (bins - 1) as f32;
                    let lo = pos.floor() as usize;
                    let hi = (lo + 1).min(len - 1);
                    let frac = pos - lo as f32;
                    values[lo] + (values[hi] - values[lo]) * frac
                })
                .collect()
        }
    }
}

/// Encode a vector as raw little-endian `f32` bytes.
pub fn to_le_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

/// Decode raw little-endian `f32` bytes. Returns `None` if the length is not a
/// multiple of four.
pub fn from_le_bytes(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let normalized = l2_normalize(&[3.0, 4.0]).unwrap();
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
        assert!((l2_norm(&normalized) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        assert!(l2_normalize(&[0.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn test_mean_normalized() {
        let mean = mean_normalized(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((mean[0] - expected).abs() < 1e-6);
        assert!((mean[1] - expected).abs() < 1e-6);

        let empty: [Vec<f32>; 0] = [];
        assert!(mean_normalized(&empty).is_none());
        assert!(mean_normalized(&[vec![1.0], vec![1.0, 2.0]]).is_none());
        assert!(mean_normalized(&[vec![1.0, 0.0], vec![-1.0, 0.0]]).is_none());
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[12.0, 0.0, -12.0]);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-6);
        assert!((quantile(&values, 0.25) - 1.75).abs() < 1e-6);
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-6);
        assert!((std - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_linear_resample() {
        assert_eq!(linear_resample(&[1.0, 3.0], 3), vec![1.0, 2.0, 3.0]);
        assert_eq!(linear_resample(&[5.0], 4), vec![5.0; 4]);
        assert_eq!(linear_resample(&[], 2), vec![0.0; 2]);
    }

    #[test]
    fn test_le_bytes_roundtrip_rejects_truncated() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(from_le_bytes(&to_le_bytes(&v)).unwrap(), v);
        assert!(from_le_bytes(&[0u8; 5]).is_none());
    }
}
