// src/vecmath.rs
// Pure vector math: similarity, normalization, distribution alignment

/// Cosine similarity between two vectors.
///
/// Mismatched lengths, empty inputs, or a zero-norm side all yield 0.0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Return a new vector scaled to unit L2 norm. A zero vector is returned
/// unchanged; the input is never mutated.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

/// Min-max rescale into [0, 1].
///
/// When all values are equal (including a single element) every output is
/// 0.5; empty input stays empty.
pub fn normalize_to_unit_range(xs: &[f32]) -> Vec<f32> {
    if xs.is_empty() {
        return Vec::new();
    }

    let min = xs.iter().copied().fold(f32::INFINITY, f32::min);
    let max = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if max == min {
        return vec![0.5; xs.len()];
    }

    xs.iter().map(|x| (x - min) / (max - min)).collect()
}

/// Rescale a score distribution to a target mean and standard deviation.
///
/// Z-scores each value then maps it onto (mean, stddev). Strict ordering of
/// the inputs is preserved. Degenerate inputs (length <= 1 or zero spread)
/// collapse to the target mean.
pub fn align_distribution(xs: &[f32], mean: f32, stddev: f32) -> Vec<f32> {
    if xs.is_empty() {
        return Vec::new();
    }
    if xs.len() == 1 {
        return vec![mean];
    }

    let n = xs.len() as f32;
    let mu: f32 = xs.iter().sum::<f32>() / n;
    let var: f32 = xs.iter().map(|x| (x - mu) * (x - mu)).sum::<f32>() / n;
    let sigma = var.sqrt();

    if sigma == 0.0 {
        return vec![mean; xs.len()];
    }

    xs.iter().map(|x| (x - mu) / sigma * stddev + mean).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_cosine_identical() {
        let v = [0.6, 0.8, 0.0];
        assert!(approx(cosine(&v, &v), 1.0));
    }

    #[test]
    fn test_cosine_opposite() {
        let v = [1.0, 2.0, 3.0];
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();
        assert!(approx(cosine(&v, &neg), -1.0));
    }

    #[test]
    fn test_cosine_zero_and_mismatched() {
        assert_eq!(cosine(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine(&[], &[]), 0.0);
    }

    #[test]
    fn test_cosine_known_value() {
        let got = cosine(&[0.6, 0.8, 0.0], &[0.8, 0.6, 0.0]);
        assert!(approx(got, 0.96));
    }

    #[test]
    fn test_l2_normalize() {
        assert_eq!(l2_normalize(&[3.0, 4.0, 0.0]), vec![0.6, 0.8, 0.0]);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_l2_normalize_does_not_mutate_input() {
        let v = vec![3.0, 4.0];
        let _ = l2_normalize(&v);
        assert_eq!(v, vec![3.0, 4.0]);
    }

    #[test]
    fn test_unit_range_endpoints() {
        let out = normalize_to_unit_range(&[2.0, 4.0, 6.0]);
        assert!(approx(out[0], 0.0));
        assert!(approx(out[1], 0.5));
        assert!(approx(out[2], 1.0));
    }

    #[test]
    fn test_unit_range_constant_input() {
        assert_eq!(normalize_to_unit_range(&[7.0, 7.0, 7.0]), vec![0.5, 0.5, 0.5]);
        assert_eq!(normalize_to_unit_range(&[42.0]), vec![0.5]);
        assert!(normalize_to_unit_range(&[]).is_empty());
    }

    #[test]
    fn test_align_preserves_order() {
        let xs = [0.1, 0.9, 0.4, 0.7];
        let out = align_distribution(&xs, 0.5, 0.2);
        for i in 0..xs.len() {
            for j in 0..xs.len() {
                if xs[i] < xs[j] {
                    assert!(out[i] < out[j]);
                }
            }
        }
    }

    #[test]
    fn test_align_hits_target_moments() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = align_distribution(&xs, 0.5, 0.2);

        let n = out.len() as f32;
        let mean = out.iter().sum::<f32>() / n;
        let var = out.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n;

        assert!(approx(mean, 0.5));
        assert!(approx(var.sqrt(), 0.2));
    }

    #[test]
    fn test_align_degenerate_inputs() {
        assert_eq!(align_distribution(&[3.0], 0.5, 0.2), vec![0.5]);
        assert_eq!(align_distribution(&[2.0, 2.0], 0.5, 0.2), vec![0.5, 0.5]);
        assert!(align_distribution(&[], 0.5, 0.2).is_empty());
    }
}
