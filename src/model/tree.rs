//! Least-squares regression tree

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Tree growth limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Binary regression tree stored as a node arena; node 0 is the root
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    /// Total squared-error reduction contributed by each feature
    importances: Vec<f64>,
}

impl RegressionTree {
    /// Grow a tree on `targets`. Candidate features at every node are visited
    /// in an order drawn from `rng`; the first strictly best split wins.
    pub fn fit(x: &[Vec<f64>], targets: &[f64], params: &TreeParams, rng: &mut StdRng) -> Self {
        let n_features = x.first().map(|row| row.len()).unwrap_or(0);
        let mut tree = RegressionTree {
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        let indices: Vec<usize> = (0..targets.len()).collect();
        tree.grow(x, targets, &indices, 0, params, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        let value = mean(indices.iter().map(|&i| targets[i]));
        self.nodes.push(Node::Leaf { value });

        let n = indices.len();
        if depth >= params.max_depth
            || n < params.min_samples_split
            || n < 2 * params.min_samples_leaf
        {
            return id;
        }

        let Some(split) = self.best_split(x, targets, indices, params, rng) else {
            return id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[i][split.feature] <= split.threshold);

        self.importances[split.feature] += split.gain;

        let left = self.grow(x, targets, &left_idx, depth + 1, params, rng);
        let right = self.grow(x, targets, &right_idx, depth + 1, params, rng);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(
        &self,
        x: &[Vec<f64>],
        targets: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let n_features = self.importances.len();

        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(rng);

        let total: f64 = indices.iter().map(|&i| targets[i]).sum();
        let parent_score = total * total / n as f64;

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for feature in features {
            sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left_sum = 0.0;
            for k in 1..n {
                left_sum += targets[sorted[k - 1]];

                let lo = x[sorted[k - 1]][feature];
                let hi = x[sorted[k]][feature];
                if lo == hi {
                    continue;
                }
                let n_left = k;
                let n_right = n - k;
                if n_left < params.min_samples_leaf || n_right < params.min_samples_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                // Reduction in summed squared error
                let gain = left_sum * left_sum / n_left as f64
                    + right_sum * right_sum / n_right as f64
                    - parent_score;

                let beats = match &best {
                    Some(b) => gain > b.gain,
                    None => gain > 1e-12,
                };
                if beats {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }

    pub fn predict_one(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_step_function_fit() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 3.0 }).collect();

        let mut rng = StdRng::seed_from_u64(42);
        let tree = RegressionTree::fit(&x, &y, &TreeParams::default(), &mut rng);

        assert_eq!(tree.predict_one(&[2.0, 0.0]), 1.0);
        assert_eq!(tree.predict_one(&[7.0, 0.0]), 3.0);
        assert_eq!(tree.n_leaves(), 2);
        // Constant feature never splits
        assert_eq!(tree.importances()[1], 0.0);
        assert!(tree.importances()[0] > 0.0);
    }

    #[test]
    fn test_depth_limit() {
        let x: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..32).map(|i| i as f64).collect();

        let params = TreeParams {
            max_depth: 2,
            ..TreeParams::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, &params, &mut rng);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let y = vec![0.0, 0.0, 0.0, 10.0];

        let params = TreeParams {
            max_depth: 1,
            min_samples_split: 2,
            min_samples_leaf: 2,
        };
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, &params, &mut rng);

        // The 3/1 split is not allowed, only 2/2
        assert_eq!(tree.predict_one(&[0.0]), 0.0);
        assert_eq!(tree.predict_one(&[3.0]), 5.0);
    }

    #[test]
    fn test_single_sample_is_leaf() {
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&[vec![1.0]], &[4.0], &TreeParams::default(), &mut rng);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_one(&[100.0]), 4.0);
    }
}
