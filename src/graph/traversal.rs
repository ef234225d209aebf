//! Chain walking and graph queries.

use crate::graph::{ChainGraph, ChainNode};
use crate::types::{Direction, NodeId, Payload};
use std::collections::{BTreeSet, VecDeque};

/// Lazy walk along the primary chain, excluding the start node.
///
/// Holds a cursor and the fixed start identity: the walk ends when the
/// pointers run out or when it arrives back at the exact start node.
/// That single-revisit guard makes a full circle terminate; it is not a
/// general cycle detector (see
/// [`has_circular_link`](ChainGraph::has_circular_link) for that).
pub struct ChainIter<'a, T> {
    graph: &'a ChainGraph<T>,
    start: NodeId,
    cursor: Option<NodeId>,
    direction: Direction,
}

impl<T: Payload> Iterator for ChainIter<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.cursor?;
        if current == self.start {
            return None;
        }
        self.cursor = self.graph.get(current).and_then(|node| step(node, self.direction));
        Some(current)
    }
}

fn step<T: Payload>(node: &ChainNode<T>, direction: Direction) -> Option<NodeId> {
    match direction {
        Direction::Forward => node.next(),
        Direction::Backward => node.previous(),
    }
}

impl<T: Payload> ChainGraph<T> {
    /// Walk the primary chain from `start` in the given direction.
    pub fn iter_from(&self, start: NodeId, direction: Direction) -> ChainIter<'_, T> {
        let cursor = self.get(start).and_then(|node| step(node, direction));
        ChainIter {
            graph: self,
            start,
            cursor,
            direction,
        }
    }

    /// All nodes reachable by following `next`, nearest first.
    pub fn progeny_path(&self, id: NodeId) -> Vec<NodeId> {
        self.iter_from(id, Direction::Forward).collect()
    }

    /// All nodes reachable by following `previous`, nearest first.
    pub fn ancestor_path(&self, id: NodeId) -> Vec<NodeId> {
        self.iter_from(id, Direction::Backward).collect()
    }

    /// First node matching `predicate`: the node itself, then the forward
    /// chain, then the backward chain. Searches the primary chain only,
    /// not the full relationship graph. `None` when nothing matches.
    pub fn find<F>(&self, id: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&ChainNode<T>) -> bool,
    {
        if predicate(self.get(id)?) {
            return Some(id);
        }
        for direction in [Direction::Forward, Direction::Backward] {
            for candidate in self.iter_from(id, direction) {
                if self.get(candidate).is_some_and(&predicate) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// Floyd tortoise/hare over the `next` chain: true iff a cycle is
    /// reachable from `id`.
    pub fn has_circular_link(&self, id: NodeId) -> bool {
        let advance = |id: NodeId| self.get(id).and_then(|node| node.next());

        let mut tortoise = advance(id);
        let mut hare = tortoise.and_then(advance);
        while let (Some(slow), Some(fast)) = (tortoise, hare) {
            if slow == fast {
                return true;
            }
            tortoise = advance(slow);
            hare = advance(fast).and_then(advance);
        }
        false
    }

    /// Every node reachable over the union of ancestor and progeny sets:
    /// the true graph component, start included. Breadth-first.
    pub fn connected_links(&self, id: NodeId) -> BTreeSet<NodeId> {
        let mut component = BTreeSet::new();
        if self.get(id).is_none() {
            return component;
        }
        component.insert(id);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            let node = match self.get(current) {
                Some(node) => node,
                None => continue,
            };
            for neighbor in node.ancestors().iter().chain(node.progeny().iter()) {
                if component.insert(*neighbor) {
                    queue.push_back(*neighbor);
                }
            }
        }
        component
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeConfig;
    use serde_json::{json, Value};

    fn chain(graph: &mut ChainGraph<Value>, len: u64) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for i in 0..len {
            let id = graph
                .create(NodeConfig::new().data(json!({"seq": i})))
                .unwrap();
            if let Some(prev) = ids.last().copied() {
                graph.set_next(prev, Some(id), false).unwrap();
                graph.set_previous(id, Some(prev), false).unwrap();
            }
            ids.push(id);
        }
        ids
    }

    #[test]
    fn test_paths_are_nearest_first() {
        let mut graph = ChainGraph::new();
        let ids = chain(&mut graph, 4);

        assert_eq!(graph.progeny_path(ids[0]), vec![ids[1], ids[2], ids[3]]);
        assert_eq!(graph.ancestor_path(ids[3]), vec![ids[2], ids[1], ids[0]]);
        assert_eq!(graph.progeny_path(ids[3]), Vec::<NodeId>::new());
    }

    #[test]
    fn test_iterate_terminates_on_full_circle() {
        let mut graph = ChainGraph::new();
        let ids = chain(&mut graph, 3);
        graph.set_next(ids[2], Some(ids[0]), false).unwrap();

        let walked = graph.progeny_path(ids[0]);
        assert_eq!(walked, vec![ids[1], ids[2]]);
    }

    #[test]
    fn test_find_checks_self_first() {
        let mut graph = ChainGraph::new();
        let ids = chain(&mut graph, 3);

        let hit = graph.find(ids[1], |n| n.data().is_some());
        assert_eq!(hit, Some(ids[1]));
    }

    #[test]
    fn test_find_prefers_forward_over_backward() {
        let mut graph = ChainGraph::new();
        let ids = chain(&mut graph, 5);
        // Matches exist on both sides of ids[2]; forward wins.
        let hit = graph.find(ids[2], |n| {
            let seq = n.data().and_then(|d| d.get("seq")).and_then(Value::as_u64);
            seq == Some(0) || seq == Some(3)
        });
        assert_eq!(hit, Some(ids[3]));
    }

    #[test]
    fn test_find_falls_back_to_backward() {
        let mut graph = ChainGraph::new();
        let ids = chain(&mut graph, 3);

        let hit = graph.find(ids[2], |n| {
            n.data().and_then(|d| d.get("seq")) == Some(&json!(0))
        });
        assert_eq!(hit, Some(ids[0]));
    }

    #[test]
    fn test_find_no_match_is_none() {
        let mut graph = ChainGraph::new();
        let ids = chain(&mut graph, 3);
        assert_eq!(graph.find(ids[0], |_| false), None);
    }

    #[test]
    fn test_circular_link_detected() {
        let mut graph = ChainGraph::new();
        let ids = chain(&mut graph, 3);
        graph.set_next(ids[2], Some(ids[0]), true).unwrap();

        assert!(graph.has_circular_link(ids[0]));
        assert!(graph.has_circular_link(ids[1]));
    }

    #[test]
    fn test_linear_chain_has_no_cycle() {
        let mut graph = ChainGraph::new();
        let ids = chain(&mut graph, 50);
        assert!(!graph.has_circular_link(ids[0]));
    }

    #[test]
    fn test_self_cycle_detected() {
        let mut graph = ChainGraph::new();
        let a = graph.create(NodeConfig::new()).unwrap();
        graph.set_next(a, Some(a), false).unwrap();
        assert!(graph.has_circular_link(a));
    }

    #[test]
    fn test_connected_links_covers_component() {
        let mut graph = ChainGraph::new();
        let ids = chain(&mut graph, 3);
        // An extra node attached only through add_link, plus one stranger.
        let extra = graph.create(NodeConfig::new()).unwrap();
        graph.add_link(ids[0], extra).unwrap();
        let stranger = graph.create(NodeConfig::new()).unwrap();

        let component = graph.connected_links(ids[2]);
        assert_eq!(
            component,
            BTreeSet::from([ids[0], ids[1], ids[2], extra])
        );
        assert!(!component.contains(&stranger));
    }
}
