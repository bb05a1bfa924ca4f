//! Random forest classifier.
//!
//! Each tree is grown on a bootstrap sample with its own seed, so the
//! fitted forest depends only on the data and the base seed, not on how
//! many threads did the work. Prediction averages the leaf distributions
//! of all trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeError, TreeParams};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ForestError {
    #[error("empty forest")]
    NoTrees,
    #[error("no training samples")]
    NoSamples,
    #[error("{samples} samples but {targets} targets")]
    LengthMismatch { samples: usize, targets: usize },
    #[error("tree {index} disagrees with the forest on columns or classes")]
    InconsistentTree { index: usize },
    #[error("tree {index} is malformed: {source}")]
    Tree {
        index: usize,
        #[source]
        source: TreeError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            min_samples_split: 2,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_columns: usize,
    n_classes: usize,
}

impl RandomForest {
    pub fn from_trees(
        trees: Vec<DecisionTree>,
        n_columns: usize,
        n_classes: usize,
    ) -> Result<Self, ForestError> {
        let forest = Self {
            trees,
            n_columns,
            n_classes,
        };
        forest.validate()?;
        Ok(forest)
    }

    pub fn validate(&self) -> Result<(), ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::NoTrees);
        }
        for (index, tree) in self.trees.iter().enumerate() {
            if tree.n_columns() != self.n_columns || tree.n_classes() != self.n_classes {
                return Err(ForestError::InconsistentTree { index });
            }
            tree.validate()
                .map_err(|source| ForestError::Tree { index, source })?;
        }
        Ok(())
    }

    /// Fit on one-hot samples (active column lists) and encoded targets.
    pub fn fit(
        samples: &[Vec<usize>],
        targets: &[usize],
        n_columns: usize,
        n_classes: usize,
        params: ForestParams,
    ) -> Result<Self, ForestError> {
        if params.n_trees == 0 {
            return Err(ForestError::NoTrees);
        }
        if samples.is_empty() {
            return Err(ForestError::NoSamples);
        }
        if samples.len() != targets.len() {
            return Err(ForestError::LengthMismatch {
                samples: samples.len(),
                targets: targets.len(),
            });
        }

        let tree_params = TreeParams {
            max_features: ((n_columns as f64).sqrt() as usize).max(1),
            min_samples_split: params.min_samples_split,
            max_depth: params.max_depth,
        };
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(params.n_trees);

        let fit_one = |t: usize| {
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
            let n = samples.len();
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
            DecisionTree::fit(
                samples,
                targets,
                bootstrap,
                n_columns,
                n_classes,
                tree_params,
                &mut rng,
            )
        };

        let mut fitted: Vec<(usize, DecisionTree)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    let fit_one = &fit_one;
                    scope.spawn(move || {
                        (w..params.n_trees)
                            .step_by(workers)
                            .map(|t| (t, fit_one(t)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        });
        fitted.sort_by_key(|(t, _)| *t);

        let trees = fitted.into_iter().map(|(_, tree)| tree).collect();
        Ok(Self {
            trees,
            n_columns,
            n_classes,
        })
    }

    /// Mean of the per-tree leaf distributions.
    pub fn predict_proba(&self, active: &[usize]) -> Vec<f64> {
        let mut sum = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.predict_proba(active)) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        sum.iter_mut().for_each(|p| *p /= n);
        sum
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub const fn n_columns(&self) -> usize {
        self.n_columns
    }

    pub const fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn total_nodes(&self) -> usize {
        self.trees.iter().map(DecisionTree::n_nodes).sum()
    }

    pub fn avg_depth(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: usize = self.trees.iter().map(DecisionTree::depth).sum();
        total as f64 / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::TreeNode;

    fn leaf(distribution: Vec<f64>) -> TreeNode {
        TreeNode::Leaf { distribution }
    }

    fn split_on(column: usize, left: Vec<f64>, right: Vec<f64>) -> DecisionTree {
        DecisionTree::from_nodes(
            vec![
                TreeNode::Split {
                    column,
                    left: 1,
                    right: 2,
                },
                leaf(left),
                leaf(right),
            ],
            2,
            2,
        )
        .unwrap()
    }

    #[test]
    fn averages_leaf_distributions() {
        let forest = RandomForest::from_trees(
            vec![
                split_on(0, vec![1.0, 0.0], vec![0.0, 1.0]),
                split_on(1, vec![1.0, 0.0], vec![0.5, 0.5]),
            ],
            2,
            2,
        )
        .unwrap();

        let p = forest.predict_proba(&[0, 1]);
        assert!((p[0] - 0.25).abs() < 1e-12);
        assert!((p[1] - 0.75).abs() < 1e-12);
        assert_eq!(forest.total_nodes(), 6);
    }

    #[test]
    fn rejects_empty_and_inconsistent() {
        assert_eq!(
            RandomForest::from_trees(vec![], 2, 2),
            Err(ForestError::NoTrees)
        );
        let three_classes = DecisionTree::from_nodes(vec![leaf(vec![1.0, 0.0, 0.0])], 2, 3).unwrap();
        assert_eq!(
            RandomForest::from_trees(vec![three_classes], 2, 2),
            Err(ForestError::InconsistentTree { index: 0 })
        );
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let samples: Vec<Vec<usize>> = (0..40).map(|i| vec![i % 4, 4 + i % 3]).collect();
        let targets: Vec<usize> = (0..40).map(|i| usize::from(i % 4 >= 2)).collect();
        let params = ForestParams {
            n_trees: 12,
            ..ForestParams::default()
        };

        let a = RandomForest::fit(&samples, &targets, 7, 2, params).unwrap();
        let b = RandomForest::fit(&samples, &targets, 7, 2, params).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 12);

        let p = a.predict_proba(&[3, 5]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(p[1] > p[0]);
    }

    #[test]
    fn fit_rejects_bad_input() {
        let params = ForestParams::default();
        assert_eq!(
            RandomForest::fit(&[], &[], 1, 1, params),
            Err(ForestError::NoSamples)
        );
        assert_eq!(
            RandomForest::fit(&[vec![0]], &[0, 0], 1, 1, params),
            Err(ForestError::LengthMismatch {
                samples: 1,
                targets: 2
            })
        );
    }
}
