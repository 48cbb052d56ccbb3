//! Directed acyclic graphs of logical nodes and of chunks.
//!
//! Both graphs are built backwards from their result nodes and keep their
//! nodes in topological order: every node comes after all of its inputs.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use tessel_core::{ChunkKey, OpKey, TileableKey};

use crate::node::{ChunkRef, TileableRef};
use crate::operand::OperandRef;

// ============================================================================
// Traversal
// ============================================================================

/// Post-order DFS from `roots`, deduplicated by key.
fn topological<N, K, KF, IF>(roots: &[Arc<N>], key_of: KF, inputs_of: IF) -> Vec<Arc<N>>
where
    K: Copy + Eq + Hash,
    KF: Fn(&N) -> K,
    IF: Fn(&N) -> Vec<Arc<N>>,
{
    let mut order = Vec::new();
    let mut visited: HashSet<K> = HashSet::new();
    // (node, inputs expanded)
    let mut stack: Vec<(Arc<N>, bool)> = roots.iter().rev().map(|r| (r.clone(), false)).collect();

    while let Some((node, expanded)) = stack.pop() {
        let key = key_of(node.as_ref());
        if expanded {
            if visited.insert(key) {
                order.push(node);
            }
            continue;
        }
        if visited.contains(&key) {
            continue;
        }
        let inputs = inputs_of(node.as_ref());
        stack.push((node, true));
        for input in inputs.into_iter().rev() {
            if !visited.contains(&key_of(input.as_ref())) {
                stack.push((input, false));
            }
        }
    }
    order
}

/// Group nodes by producing operand, keeping first-appearance order.
fn group_by_op<N>(
    nodes: &[Arc<N>],
    op_of: impl Fn(&N) -> &OperandRef,
) -> Vec<(OperandRef, Vec<Arc<N>>)> {
    let mut position: HashMap<OpKey, usize> = HashMap::new();
    let mut groups: Vec<(OperandRef, Vec<Arc<N>>)> = Vec::new();
    for node in nodes {
        let op = op_of(node.as_ref());
        match position.get(&op.key()) {
            Some(&i) => groups[i].1.push(node.clone()),
            None => {
                position.insert(op.key(), groups.len());
                groups.push((op.clone(), vec![node.clone()]));
            }
        }
    }
    groups
}

// ============================================================================
// Tileable Graph
// ============================================================================

/// The logical graph reachable from a set of result nodes.
#[derive(Debug, Clone)]
pub struct TileableGraph {
    nodes: Vec<TileableRef>,
    positions: HashMap<TileableKey, usize>,
    successors: HashMap<TileableKey, Vec<TileableKey>>,
    results: Vec<TileableKey>,
}

impl TileableGraph {
    /// Build the graph of everything `results` depend on.
    pub fn from_results(results: &[TileableRef]) -> Self {
        let nodes = topological(results, |t| t.key(), |t| t.op().inputs().to_vec());
        let positions = nodes.iter().enumerate().map(|(i, n)| (n.key(), i)).collect();

        let mut successors: HashMap<TileableKey, Vec<TileableKey>> = HashMap::new();
        for node in &nodes {
            for input in node.op().inputs() {
                let entry = successors.entry(input.key()).or_default();
                if !entry.contains(&node.key()) {
                    entry.push(node.key());
                }
            }
        }

        Self {
            nodes,
            positions,
            successors,
            results: results.iter().map(|r| r.key()).collect(),
        }
    }

    /// Nodes in topological order.
    pub fn nodes(&self) -> &[TileableRef] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by key.
    pub fn get(&self, key: TileableKey) -> Option<&TileableRef> {
        self.positions.get(&key).map(|&i| &self.nodes[i])
    }

    /// Nodes consuming `key`.
    pub fn successors(&self, key: TileableKey) -> &[TileableKey] {
        self.successors.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Keys of the result nodes, in the order given.
    pub fn results(&self) -> &[TileableKey] {
        &self.results
    }

    /// Operands in topological order, each with its outputs present in the
    /// graph, ordered by output position.
    pub fn ops_in_order(&self) -> Vec<(OperandRef, Vec<TileableRef>)> {
        let mut groups = group_by_op(&self.nodes, |t| t.op());
        for (_, outputs) in &mut groups {
            outputs.sort_by_key(|t| t.output_index());
        }
        groups
    }
}

// ============================================================================
// Chunk Graph
// ============================================================================

/// The chunk graph reachable from a set of chunks.
#[derive(Debug, Clone)]
pub struct ChunkGraph {
    chunks: Vec<ChunkRef>,
    positions: HashMap<ChunkKey, usize>,
}

impl ChunkGraph {
    /// Build the graph of everything `chunks` depend on.
    pub fn from_chunks(chunks: &[ChunkRef]) -> Self {
        let chunks = topological(chunks, |c| c.key(), |c| c.op().chunk_inputs().to_vec());
        let positions = chunks.iter().enumerate().map(|(i, c)| (c.key(), i)).collect();
        Self { chunks, positions }
    }

    /// Chunks in topological order.
    pub fn chunks(&self) -> &[ChunkRef] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.positions.contains_key(&key)
    }

    /// Chunk operands in topological order with their chunks in the graph.
    pub fn ops_in_order(&self) -> Vec<(OperandRef, Vec<ChunkRef>)> {
        group_by_op(&self.chunks, |c| c.op())
    }
}

#[cfg(test)]
mod tests {
    use tessel_core::Value;

    use super::*;
    use crate::ops::DataSource;
    use crate::tile::{TileContext, TileStep};

    #[test]
    fn test_tileable_graph_topological() {
        let a = DataSource::object(Value::from(1));
        let b = DataSource::object(Value::from(2));

        let graph = TileableGraph::from_results(&[b.clone(), a.clone(), b.clone()]);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.results(), &[b.key(), a.key(), b.key()]);
        assert!(graph.get(a.key()).is_some());
        assert!(graph.successors(a.key()).is_empty());
        assert_eq!(graph.ops_in_order().len(), 2);
    }

    #[test]
    fn test_chunk_graph_from_tiled_source() {
        let source = DataSource::object(Value::from(1));
        let mut task = source.op().tile(&[source.clone()]).unwrap();
        let tiled = match task.resume(&TileContext::new()).unwrap() {
            TileStep::Done(tiled) => tiled,
            step => panic!("unexpected step {step:?}"),
        };
        let graph = ChunkGraph::from_chunks(tiled[0].chunks());
        assert_eq!(graph.len(), 1);
        assert!(graph.contains(tiled[0].chunks()[0].key()));
        assert_eq!(graph.ops_in_order().len(), 1);
    }
}
