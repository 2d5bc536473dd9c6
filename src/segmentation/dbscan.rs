//! Density-based clustering over fixed-dimension points.
//!
//! Neighborhoods come from an R-tree, so each query is logarithmic in the
//! number of points instead of a full scan. Labels follow the usual DBSCAN
//! semantics: a point is core when its eps-neighborhood (itself included)
//! holds at least `min_samples` points, border points join the first cluster
//! that reaches them, everything else is noise (`None`).

use rstar::RTree;
use rstar::primitives::GeomWithData;

type IndexedPoint<const D: usize> = GeomWithData<[f64; D], usize>;

/// Cluster label per input point, `None` for noise.
///
/// Cluster ids are assigned in order of the first core point of each
/// cluster, starting at 0.
pub fn dbscan<const D: usize>(points: &[[f64; D]], eps: f64, min_samples: usize) -> Vec<Option<usize>>
where
    [f64; D]: rstar::Point<Scalar = f64>,
{
    let n = points.len();
    let mut labels: Vec<Option<usize>> = vec![None; n];
    if n == 0 {
        return labels;
    }

    let tree: RTree<IndexedPoint<D>> = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(*p, i))
            .collect(),
    );
    let eps_sq = eps * eps;
    let neighbors = |i: usize| -> Vec<usize> {
        tree.locate_within_distance(points[i], eps_sq)
            .map(|g| g.data)
            .collect()
    };

    let mut visited = vec![false; n];
    let mut next_cluster = 0usize;

    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let seeds = neighbors(start);
        if seeds.len() < min_samples {
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[start] = Some(cluster);

        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            if labels[j].is_none() {
                labels[j] = Some(cluster);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let around = neighbors(j);
            if around.len() >= min_samples {
                queue.extend(around.into_iter().filter(|k| !visited[*k] || labels[*k].is_none()));
            }
        }
    }
    labels
}

/// Number of distinct clusters in a label vector.
pub fn cluster_count(labels: &[Option<usize>]) -> usize {
    labels.iter().flatten().max().map_or(0, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_blobs_and_noise() {
        let points = vec![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [20.0, 20.0],
        ];
        let labels = dbscan(&points, 0.5, 3);
        assert_eq!(labels[0], Some(0));
        assert_eq!(labels[1], Some(0));
        assert_eq!(labels[2], Some(0));
        assert_eq!(labels[3], Some(1));
        assert_eq!(labels[5], Some(1));
        assert_eq!(labels[6], None);
        assert_eq!(cluster_count(&labels), 2);
    }

    #[test]
    fn test_border_point_joins_cluster() {
        // 1.0 is a border point of the core at 0.5
        let points = vec![[0.0, 0.0], [0.25, 0.0], [0.5, 0.0], [1.0, 0.0]];
        let labels = dbscan(&points, 0.6, 3);
        assert!(labels.iter().all(|l| *l == Some(0)));
    }

    #[test]
    fn test_empty_input() {
        let points: Vec<[f64; 3]> = Vec::new();
        assert!(dbscan(&points, 1.0, 2).is_empty());
    }
}
