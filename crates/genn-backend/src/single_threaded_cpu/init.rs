// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host implementations of the built-in initialisation snippets

use genn_model::{GennError, Result, SparseConnectivity};
use rand::rngs::StdRng;
use rand::Rng;

/// Uniform sample in (0, 1]
fn open_unit(rng: &mut StdRng) -> f64 {
    1.0 - rng.gen::<f64>()
}

/// Draw `count` initial values from a built-in variable initialiser
pub fn sample_var(snippet: &str, params: &[f64], count: usize, rng: &mut StdRng) -> Result<Vec<f64>> {
    let param = |i: usize| -> Result<f64> {
        params.get(i).copied().ok_or_else(|| {
            GennError::runtime(format!("Initialiser '{}' is missing parameter {}", snippet, i))
        })
    };

    let values = match snippet {
        "Constant" => vec![param(0)?; count],
        "Uniform" => {
            let (min, max) = (param(0)?, param(1)?);
            (0..count).map(|_| min + (max - min) * rng.gen::<f64>()).collect()
        }
        "Normal" => {
            let (mean, sd) = (param(0)?, param(1)?);
            (0..count)
                .map(|_| {
                    // Box-Muller
                    let u1 = open_unit(rng);
                    let u2 = rng.gen::<f64>();
                    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                    mean + sd * z
                })
                .collect()
        }
        "Exponential" => {
            let lambda = param(0)?;
            (0..count).map(|_| -open_unit(rng).ln() / lambda).collect()
        }
        other => {
            return Err(GennError::runtime(format!(
                "single_threaded_cpu cannot run variable initialiser '{}'",
                other
            )))
        }
    };
    Ok(values)
}

/// Build sparse connectivity from a built-in connectivity initialiser.
///
/// Rows are truncated to `max_row_length`.
pub fn build_connectivity(
    snippet: &str,
    params: &[f64],
    num_pre: usize,
    num_post: usize,
    max_row_length: usize,
    rng: &mut StdRng,
) -> Result<SparseConnectivity> {
    let prob = || {
        params.first().copied().ok_or_else(|| {
            GennError::runtime(format!("Connectivity '{}' is missing 'prob'", snippet))
        })
    };

    let mut rows: Vec<Vec<u32>> = match snippet {
        "OneToOne" => (0..num_pre)
            .map(|i| if i < num_post { vec![i as u32] } else { Vec::new() })
            .collect(),
        "FixedProbability" | "FixedProbabilityNoAutapse" => {
            let p = prob()?;
            let autapse = snippet == "FixedProbability";
            (0..num_pre)
                .map(|i| {
                    (0..num_post)
                        .filter(|&j| (autapse || i != j) && rng.gen::<f64>() < p)
                        .map(|j| j as u32)
                        .collect()
                })
                .collect()
        }
        "FixedNumberPostWithReplacement" => {
            let row_length = params.first().copied().ok_or_else(|| {
                GennError::runtime(format!("Connectivity '{}' is missing 'rowLength'", snippet))
            })? as usize;
            (0..num_pre)
                .map(|_| {
                    if num_post == 0 {
                        return Vec::new();
                    }
                    let mut row: Vec<u32> = (0..row_length)
                        .map(|_| rng.gen_range(0..num_post) as u32)
                        .collect();
                    row.sort_unstable();
                    row
                })
                .collect()
        }
        other => {
            return Err(GennError::runtime(format!(
                "single_threaded_cpu cannot run connectivity initialiser '{}'",
                other
            )))
        }
    };

    for row in &mut rows {
        row.truncate(max_row_length);
    }
    Ok(SparseConnectivity { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let values = sample_var("Uniform", &[-1.0, 1.0], 1000, &mut rng).unwrap();
        assert_eq!(values.len(), 1000);
        assert!(values.iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn test_normal_mean_close() {
        let mut rng = StdRng::seed_from_u64(11);
        let values = sample_var("Normal", &[5.0, 1.0], 20_000, &mut rng).unwrap();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((mean - 5.0).abs() < 0.05, "mean was {}", mean);
    }

    #[test]
    fn test_same_seed_same_values() {
        let a = sample_var("Exponential", &[2.0], 10, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = sample_var("Exponential", &[2.0], 10, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_one_to_one_rows() {
        let mut rng = StdRng::seed_from_u64(0);
        let conn = build_connectivity("OneToOne", &[], 3, 2, 1, &mut rng).unwrap();
        assert_eq!(conn.rows, vec![vec![0], vec![1], vec![]]);
    }

    #[test]
    fn test_no_autapse_skips_diagonal() {
        let mut rng = StdRng::seed_from_u64(1);
        let conn = build_connectivity("FixedProbabilityNoAutapse", &[1.0], 5, 5, 5, &mut rng).unwrap();
        for (i, row) in conn.rows.iter().enumerate() {
            assert_eq!(row.len(), 4);
            assert!(!row.contains(&(i as u32)));
        }
    }

    #[test]
    fn test_unknown_snippet_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(sample_var("Gamma", &[1.0], 1, &mut rng).is_err());
        assert!(build_connectivity("Conv2D", &[], 1, 1, 1, &mut rng).is_err());
    }
}
