use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub stratified: bool,
}

/// Seeded train/test split over encoded targets.
///
/// With `stratify` set, each class contributes `round(count * test_fraction)`
/// rows to the test side, clamped so both sides keep at least one row of it.
/// Stratification is only possible when every class has two or more rows;
/// otherwise the split is drawn over all rows at once and `stratified` is
/// false.
pub fn train_test_split(
    targets: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
    stratify: bool,
) -> TrainTestSplit {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &t) in targets.iter().enumerate() {
        if let Some(bucket) = by_class.get_mut(t) {
            bucket.push(i);
        }
    }
    let can_stratify = stratify && by_class.iter().all(|c| c.is_empty() || c.len() >= 2);

    let (mut train, mut test) = if can_stratify {
        let mut train = Vec::new();
        let mut test = Vec::new();
        for mut rows in by_class.into_iter().filter(|c| !c.is_empty()) {
            rows.shuffle(&mut rng);
            let n_test = ((rows.len() as f64 * test_fraction).round() as usize).clamp(1, rows.len() - 1);
            test.extend_from_slice(&rows[..n_test]);
            train.extend_from_slice(&rows[n_test..]);
        }
        (train, test)
    } else {
        let n = targets.len();
        let mut rows: Vec<usize> = (0..n).collect();
        rows.shuffle(&mut rng);
        let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n.saturating_sub(1));
        let train = rows.split_off(n_test);
        (train, rows)
    };

    train.sort_unstable();
    test.sort_unstable();
    TrainTestSplit {
        train,
        test,
        stratified: can_stratify,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn stratified_keeps_every_class_on_both_sides() {
        let targets = vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 2, 2, 2];
        let split = train_test_split(&targets, 3, 0.3, 42, true);
        assert!(split.stratified);

        for class in 0..3 {
            assert!(split.train.iter().any(|&i| targets[i] == class));
            assert!(split.test.iter().any(|&i| targets[i] == class));
        }
        assert_eq!(split.test.iter().filter(|&&i| targets[i] == 0).count(), 3);
        assert_eq!(split.train.len() + split.test.len(), targets.len());
    }

    #[test]
    fn singleton_class_falls_back_to_plain_split() {
        let targets = vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let split = train_test_split(&targets, 2, 0.3, 42, true);
        assert!(!split.stratified);
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 7);

        let all: HashSet<usize> = split.train.iter().chain(&split.test).copied().collect();
        assert_eq!(all.len(), targets.len());
    }

    #[test]
    fn same_seed_same_split() {
        let targets: Vec<usize> = (0..40).map(|i| i % 4).collect();
        let a = train_test_split(&targets, 4, 0.3, 7, true);
        let b = train_test_split(&targets, 4, 0.3, 7, true);
        assert_eq!(a, b);
    }
}
