//! Decision tree over one-hot encoded categorical columns.
//!
//! Every split asks a single question, "is column `c` active for this
//! sample?", which is what a threshold of 0.5 on a one-hot column reduces
//! to. Leaves store the class distribution of the training samples that
//! reached them, so a forest can average probabilities instead of votes.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Gains at or below this are treated as no improvement.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Samples with `column` active go right, the rest go left.
    Split {
        column: usize,
        left: usize,
        right: usize,
    },
    Leaf { distribution: Vec<f64> },
}

impl TreeNode {
    pub const fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TreeError {
    #[error("tree has no nodes")]
    Empty,
    #[error("node {node} points at child {child}, which is not a later node")]
    BadChild { node: usize, child: usize },
    #[error("node {node} splits on column {column} but the tree has {n_columns} columns")]
    ColumnOutOfRange {
        node: usize,
        column: usize,
        n_columns: usize,
    },
    #[error("leaf {node} has {got} class weights, expected {expected}")]
    LeafWidth {
        node: usize,
        got: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Candidate columns drawn at each split.
    pub max_features: usize,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_features: 1,
            min_samples_split: 2,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_columns: usize,
    n_classes: usize,
}

impl DecisionTree {
    /// Build a tree from explicit nodes; node 0 is the root.
    pub fn from_nodes(
        nodes: Vec<TreeNode>,
        n_columns: usize,
        n_classes: usize,
    ) -> Result<Self, TreeError> {
        let tree = Self {
            nodes,
            n_columns,
            n_classes,
        };
        tree.validate()?;
        Ok(tree)
    }

    /// Children always sit after their parent, which also rules out cycles.
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.nodes.is_empty() {
            return Err(TreeError::Empty);
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    column,
                    left,
                    right,
                } => {
                    if *column >= self.n_columns {
                        return Err(TreeError::ColumnOutOfRange {
                            node: idx,
                            column: *column,
                            n_columns: self.n_columns,
                        });
                    }
                    for &child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(TreeError::BadChild { node: idx, child });
                        }
                    }
                }
                TreeNode::Leaf { distribution } => {
                    if distribution.len() != self.n_classes {
                        return Err(TreeError::LeafWidth {
                            node: idx,
                            got: distribution.len(),
                            expected: self.n_classes,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Grow a tree on the samples named by `indices` (duplicates allowed,
    /// which is how bootstrap weights are expressed).
    pub fn fit<R: Rng>(
        samples: &[Vec<usize>],
        targets: &[usize],
        indices: Vec<usize>,
        n_columns: usize,
        n_classes: usize,
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut grower = Grower {
            samples,
            targets,
            n_classes,
            params,
            rng,
            nodes: Vec::new(),
        };
        grower.grow(indices, 0);
        Self {
            nodes: grower.nodes,
            n_columns,
            n_classes,
        }
    }

    /// Class distribution of the leaf this sample lands in.
    pub fn predict_proba(&self, active: &[usize]) -> &[f64] {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { distribution } => return distribution,
                TreeNode::Split {
                    column,
                    left,
                    right,
                } => {
                    idx = if active.contains(column) { *right } else { *left };
                }
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub const fn n_columns(&self) -> usize {
        self.n_columns
    }

    pub const fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        self.node_depth(0)
    }

    fn node_depth(&self, idx: usize) -> usize {
        match &self.nodes[idx] {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => {
                1 + self.node_depth(*left).max(self.node_depth(*right))
            }
        }
    }
}

struct Grower<'a, R> {
    samples: &'a [Vec<usize>],
    targets: &'a [usize],
    n_classes: usize,
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<TreeNode>,
}

impl<R: Rng> Grower<'_, R> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            distribution: Vec::new(),
        });

        let counts = self.class_counts(&indices);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let too_deep = self.params.max_depth.is_some_and(|max| depth >= max);

        if !pure && !too_deep && indices.len() >= self.params.min_samples_split {
            if let Some(column) = self.best_split(&indices, &counts) {
                let (right, left): (Vec<usize>, Vec<usize>) = indices
                    .into_iter()
                    .partition(|&i| self.samples[i].contains(&column));
                let left_id = self.grow(left, depth + 1);
                let right_id = self.grow(right, depth + 1);
                self.nodes[node_id] = TreeNode::Split {
                    column,
                    left: left_id,
                    right: right_id,
                };
                return node_id;
            }
        }

        let total: usize = counts.iter().sum();
        let distribution = counts
            .iter()
            .map(|&c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
            .collect();
        self.nodes[node_id] = TreeNode::Leaf { distribution };
        node_id
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.targets[i]] += 1;
        }
        counts
    }

    /// Best Gini split among a random draw of the non-constant columns.
    fn best_split(&mut self, indices: &[usize], counts: &[usize]) -> Option<usize> {
        let total = indices.len();
        let mut active_counts: HashMap<usize, Vec<usize>> = HashMap::new();
        for &i in indices {
            for &column in &self.samples[i] {
                active_counts
                    .entry(column)
                    .or_insert_with(|| vec![0; self.n_classes])[self.targets[i]] += 1;
            }
        }

        let mut candidates: Vec<usize> = active_counts
            .iter()
            .filter(|(_, hist)| hist.iter().sum::<usize>() < total)
            .map(|(&column, _)| column)
            .collect();
        // HashMap order is not stable across runs.
        candidates.sort_unstable();
        candidates.shuffle(&mut *self.rng);
        candidates.truncate(self.params.max_features.max(1));

        let parent = gini(counts, total);
        let mut best: Option<(usize, f64)> = None;

        for column in candidates {
            let right = &active_counts[&column];
            let n_right: usize = right.iter().sum();
            let n_left = total - n_right;
            let left: Vec<usize> = counts.iter().zip(right).map(|(c, r)| c - r).collect();

            let weighted = (n_left as f64 * gini(&left, n_left)
                + n_right as f64 * gini(right, n_right))
                / total as f64;
            let gain = parent - weighted;

            if gain > MIN_GAIN && best.is_none_or(|(_, g)| gain > g) {
                best = Some((column, gain));
            }
        }

        best.map(|(column, _)| column)
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn column_zero_tree() -> DecisionTree {
        // column 0 active → class 1, otherwise class 0
        DecisionTree::from_nodes(
            vec![
                TreeNode::Split {
                    column: 0,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf {
                    distribution: vec![1.0, 0.0],
                },
                TreeNode::Leaf {
                    distribution: vec![0.0, 1.0],
                },
            ],
            2,
            2,
        )
        .unwrap()
    }

    #[test]
    fn routes_on_active_column() {
        let tree = column_zero_tree();
        assert_eq!(tree.predict_proba(&[0]), &[0.0, 1.0]);
        assert_eq!(tree.predict_proba(&[1]), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[]), &[1.0, 0.0]);
    }

    #[test]
    fn structure() {
        let tree = column_zero_tree();
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn rejects_malformed_nodes() {
        let backwards = vec![
            TreeNode::Split {
                column: 0,
                left: 0,
                right: 1,
            },
            TreeNode::Leaf {
                distribution: vec![1.0],
            },
        ];
        assert_eq!(
            DecisionTree::from_nodes(backwards, 1, 1),
            Err(TreeError::BadChild { node: 0, child: 0 })
        );

        let narrow = vec![TreeNode::Leaf {
            distribution: vec![1.0],
        }];
        assert!(matches!(
            DecisionTree::from_nodes(narrow, 1, 3),
            Err(TreeError::LeafWidth { .. })
        ));

        assert_eq!(DecisionTree::from_nodes(vec![], 1, 1), Err(TreeError::Empty));
    }

    #[test]
    fn fit_separates_classes_by_column() {
        // columns 0/1 mark region, class follows region exactly
        let samples = vec![vec![0], vec![0], vec![1], vec![1]];
        let targets = vec![0, 0, 1, 1];
        let mut rng = StdRng::seed_from_u64(7);
        let params = TreeParams {
            max_features: 2,
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(&samples, &targets, vec![0, 1, 2, 3], 2, 2, params, &mut rng);

        tree.validate().unwrap();
        assert_eq!(tree.predict_proba(&[0]), &[1.0, 0.0]);
        assert_eq!(tree.predict_proba(&[1]), &[0.0, 1.0]);
    }

    #[test]
    fn fit_keeps_mixed_leaf_when_no_split_helps() {
        let samples = vec![vec![0], vec![0], vec![0]];
        let targets = vec![0, 1, 1];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(
            &samples,
            &targets,
            vec![0, 1, 2],
            1,
            2,
            TreeParams::default(),
            &mut rng,
        );

        assert_eq!(tree.n_nodes(), 1);
        let dist = tree.predict_proba(&[0]);
        assert!((dist[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((dist[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn gini_of_pure_and_even_sets() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert_eq!(gini(&[0, 0], 0), 0.0);
    }
}
