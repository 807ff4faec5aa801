//! Graph traversal over a neighbor function.
//!
//! Nothing here knows about the file format: callers pass a closure that
//! yields `(neighbor, weight)` pairs for a node, e.g. `|n| causenet.effects(n)`.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::hash::Hash;

use ahash::AHashMap;

/// Node identifiers usable by the traversal routines.
pub trait NodeId: Copy + Eq + Ord + Hash {
    fn index(self) -> usize;
    fn from_index(index: usize) -> Self;
}

impl NodeId for u32 {
    fn index(self) -> usize {
        self as usize
    }

    fn from_index(index: usize) -> Self {
        index as u32
    }
}

impl NodeId for usize {
    fn index(self) -> usize {
        self
    }

    fn from_index(index: usize) -> Self {
        index
    }
}

/// Cheapest path from `start` to `target`, both inclusive.
///
/// Weights are non-negative integers. Ties between equal distances are broken
/// by the smaller node id. The search stops as soon as `target` is settled.
/// Returns an empty vector when `target` is unreachable.
pub fn shortest_path<N, F, I, W>(start: N, target: N, mut neighbors: F) -> Vec<N>
where
    N: NodeId,
    F: FnMut(N) -> I,
    I: IntoIterator<Item = (N, W)>,
    W: Into<u64>,
{
    let mut dist: AHashMap<N, u64> = AHashMap::new();
    let mut previous: AHashMap<N, N> = AHashMap::new();
    let mut frontier = BinaryHeap::new();
    dist.insert(start, 0);
    frontier.push(Reverse((0u64, start)));

    while let Some(Reverse((d, node))) = frontier.pop() {
        if node == target {
            return unwind(&previous, start, target);
        }
        if dist.get(&node).is_some_and(|&best| d > best) {
            continue;
        }
        for (next, weight) in neighbors(node) {
            let candidate = d.saturating_add(weight.into());
            let improved = dist.get(&next).map_or(true, |&best| candidate < best);
            if improved {
                dist.insert(next, candidate);
                previous.insert(next, node);
                frontier.push(Reverse((candidate, next)));
            }
        }
    }
    Vec::new()
}

fn unwind<N: NodeId>(previous: &AHashMap<N, N>, start: N, target: N) -> Vec<N> {
    let mut path = vec![target];
    let mut node = target;
    while node != start {
        node = previous[&node];
        path.push(node);
    }
    path.reverse();
    path
}

/// Label every node `0..node_count` with a 1-based component number.
///
/// Labels are assigned in increasing order of the lowest unlabeled node and
/// flood-filled breadth-first through `neighbors`, ignoring weights. The
/// neighbor relation must be symmetric on the reachable sets: reaching a node
/// that already carries another component's label panics.
pub fn connected_components<N, F, I, W>(node_count: usize, mut neighbors: F) -> Vec<u32>
where
    N: NodeId,
    F: FnMut(N) -> I,
    I: IntoIterator<Item = (N, W)>,
{
    const UNASSIGNED: u32 = 0;
    let mut labels = vec![UNASSIGNED; node_count];
    let mut label = UNASSIGNED;
    let mut queue = VecDeque::new();

    for seed in 0..node_count {
        if labels[seed] != UNASSIGNED {
            continue;
        }
        label += 1;
        labels[seed] = label;
        queue.push_back(seed);

        while let Some(idx) = queue.pop_front() {
            for (neighbor, _) in neighbors(N::from_index(idx)) {
                let n = neighbor.index();
                assert!(
                    labels[n] == UNASSIGNED || labels[n] == label,
                    "node {n} reached from component {label} already belongs to component {}",
                    labels[n]
                );
                if labels[n] == UNASSIGNED {
                    labels[n] = label;
                    queue.push_back(n);
                }
            }
        }
    }
    labels
}

/// Number of nodes per component label, indexed by `label - 1`.
pub fn component_sizes(labels: &[u32]) -> Vec<usize> {
    let count = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut sizes = vec![0usize; count];
    for &label in labels {
        if label > 0 {
            sizes[label as usize - 1] += 1;
        }
    }
    sizes
}
