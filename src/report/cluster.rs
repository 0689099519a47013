//! Seeded k-means clustering over note embeddings.
//!
//! Plain Lloyd's algorithm with k-means++ initialization, run `restarts`
//! times from one seeded RNG; the lowest-inertia run wins. Seeding makes
//! report generation reproducible for a fixed note set.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn squared_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum()
}

/// k-means++ seeding: the first centroid is uniform, each next one is drawn
/// proportionally to squared distance from the nearest chosen centroid.
fn init_centroids(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..points.len())].clone());

    while centroids.len() < k {
        let distances: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| squared_distance(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = distances.iter().sum();

        if total <= 0.0 {
            // All points coincide with a centroid; any choice is equivalent
            centroids.push(points[rng.random_range(0..points.len())].clone());
            continue;
        }

        let mut threshold = rng.random::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, d) in distances.iter().enumerate() {
            threshold -= d;
            if threshold <= 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(points[chosen].clone());
    }

    centroids
}

/// One Lloyd's run; returns `(labels, inertia)`.
fn run_once(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> (Vec<usize>, f64) {
    let dim = points[0].len();
    let mut centroids = init_centroids(points, k, rng);
    let mut labels = vec![0usize; points.len()];

    for _ in 0..100 {
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let (best, _) = centroids
                .iter()
                .enumerate()
                .map(|(j, c)| (j, squared_distance(point, c)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap_or((0, 0.0));
            if labels[i] != best {
                labels[i] = best;
                changed = true;
            }
        }

        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (point, &label) in points.iter().zip(&labels) {
            counts[label] += 1;
            for (s, v) in sums[label].iter_mut().zip(point) {
                *s += *v as f64;
            }
        }
        for (j, centroid) in centroids.iter_mut().enumerate() {
            if counts[j] == 0 {
                continue;
            }
            for (c, s) in centroid.iter_mut().zip(&sums[j]) {
                *c = (*s / counts[j] as f64) as f32;
            }
        }
    }

    let inertia: f64 = points
        .iter()
        .zip(&labels)
        .map(|(point, &label)| squared_distance(point, &centroids[label]))
        .sum();

    (labels, inertia)
}

/// Clusters `points` into at most `k` groups.
///
/// Returns one label per point. Labels are raw centroid indexes and may be
/// sparse when a centroid ends up empty; callers group by label.
pub(crate) fn kmeans(points: &[Vec<f32>], k: usize, seed: u64, restarts: usize) -> Vec<usize> {
    if points.is_empty() {
        return Vec::new();
    }
    let k = k.min(points.len()).max(1);
    if k == 1 {
        return vec![0; points.len()];
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<(Vec<usize>, f64)> = None;

    for _ in 0..restarts.max(1) {
        let (labels, inertia) = run_once(points, k, &mut rng);
        if best.as_ref().map_or(true, |(_, best_inertia)| inertia < *best_inertia) {
            best = Some((labels, inertia));
        }
    }

    best.map(|(labels, _)| labels).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(values: &[f32]) -> Vec<f32> {
        values.to_vec()
    }

    #[test]
    fn test_two_obvious_clusters() {
        let points = vec![
            point(&[0.0, 0.0]),
            point(&[0.1, 0.0]),
            point(&[0.0, 0.1]),
            point(&[10.0, 10.0]),
            point(&[10.1, 10.0]),
            point(&[10.0, 10.1]),
        ];

        let labels = kmeans(&points, 2, 42, 10);
        assert_eq!(labels.len(), 6);

        // First three together, last three together, groups distinct
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_single_cluster() {
        let points = vec![point(&[1.0]), point(&[2.0]), point(&[3.0])];
        let labels = kmeans(&points, 1, 42, 10);
        assert_eq!(labels, vec![0, 0, 0]);
    }

    #[test]
    fn test_k_capped_to_point_count() {
        let points = vec![point(&[1.0, 0.0]), point(&[0.0, 1.0])];
        let labels = kmeans(&points, 5, 42, 10);
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|&l| l < 2));
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let points: Vec<Vec<f32>> = (0..20)
            .map(|i| point(&[(i as f32 * 0.37).sin(), (i as f32 * 0.91).cos()]))
            .collect();

        let a = kmeans(&points, 3, 42, 10);
        let b = kmeans(&points, 3, 42, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_identical_points() {
        let points = vec![point(&[1.0, 1.0]); 5];
        let labels = kmeans(&points, 2, 42, 10);
        assert_eq!(labels.len(), 5);
    }

    #[test]
    fn test_empty_input() {
        assert!(kmeans(&[], 3, 42, 10).is_empty());
    }
}
