use rand::seq::SliceRandom;

use crate::{OrderingPolicy, Replica};

/// Builds the attempt order for one send from the caller-supplied replicas.
pub fn order_candidates(mut replicas: Vec<Replica>, policy: OrderingPolicy) -> Vec<Replica> {
    if policy == OrderingPolicy::Random {
        replicas.shuffle(&mut rand::thread_rng());
    }
    replicas
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::order_candidates;
    use crate::{NodeId, OrderingPolicy, Replica};

    fn replicas(n: u64) -> Vec<Replica> {
        (0..n)
            .map(|i| Replica::new(NodeId(i), format!("10.0.0.{i}:26257")))
            .collect()
    }

    #[test]
    fn stable_keeps_caller_order() {
        let input = replicas(6);
        assert_eq!(order_candidates(input.clone(), OrderingPolicy::Stable), input);
    }

    #[test]
    fn random_is_a_permutation() {
        let input = replicas(8);
        let ordered = order_candidates(input.clone(), OrderingPolicy::Random);
        assert_eq!(ordered.len(), input.len());
        let expected: HashSet<_> = input.into_iter().collect();
        let actual: HashSet<_> = ordered.into_iter().collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn random_eventually_reorders() {
        let input = replicas(8);
        let reordered = (0..64)
            .any(|_| order_candidates(input.clone(), OrderingPolicy::Random) != input);
        assert!(reordered);
    }

    #[test]
    fn empty_input_yields_empty_sequence() {
        assert!(order_candidates(Vec::new(), OrderingPolicy::Random).is_empty());
        assert!(order_candidates(Vec::new(), OrderingPolicy::Stable).is_empty());
    }
}
