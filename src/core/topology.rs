//! Breadth-first discovery over the node adjacency graph.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::util::serde::NodeId;

/// Every node reachable from `start`, including `start`, in visit order.
pub fn discover_all<F>(start: &str, mut neighbors: F) -> Vec<NodeId>
where
    F: FnMut(&str) -> Vec<NodeId>,
{
    let mut visited: HashSet<NodeId> = HashSet::from([start.to_string()]);
    let mut order = vec![start.to_string()];
    let mut frontier = VecDeque::from([start.to_string()]);

    while let Some(node) = frontier.pop_front() {
        for next in neighbors(&node) {
            if visited.insert(next.clone()) {
                order.push(next.clone());
                frontier.push_back(next);
            }
        }
    }
    order
}

/// Shortest hop path from `start` to `goal`, both ends included.
///
/// `None` when `goal` is unreachable.
pub fn find_route<F>(start: &str, goal: &str, mut neighbors: F) -> Option<Vec<NodeId>>
where
    F: FnMut(&str) -> Vec<NodeId>,
{
    if start == goal {
        return Some(vec![start.to_string()]);
    }

    let mut parents: HashMap<NodeId, NodeId> = HashMap::new();
    let mut visited: HashSet<NodeId> = HashSet::from([start.to_string()]);
    let mut frontier = VecDeque::from([start.to_string()]);

    while let Some(node) = frontier.pop_front() {
        for next in neighbors(&node) {
            if !visited.insert(next.clone()) {
                continue;
            }
            parents.insert(next.clone(), node.clone());
            if next == goal {
                let mut route = vec![next];
                while let Some(parent) = route.last().and_then(|n| parents.get(n)) {
                    route.push(parent.clone());
                }
                route.reverse();
                return Some(route);
            }
            frontier.push_back(next);
        }
    }
    None
}
