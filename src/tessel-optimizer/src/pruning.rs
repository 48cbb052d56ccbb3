//! Column requirements of every node in a logical graph.
//!
//! A node's requirement is what its consumers read from it: the union of
//! their selections, or every column once any consumer's selection is
//! unknown. Result nodes are fetched whole and keep all their columns, even
//! when other nodes consume them too.

use std::collections::{BTreeSet, HashMap, HashSet};

use common_error::TesselResult;
use log::debug;
use tessel_core::TileableKey;
use tessel_graph::{TileableData, TileableGraph};

use crate::selector::SelectorRegistry;

/// Columns of a node read downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRequirement {
    /// Every column may be read.
    All,
    /// Only these columns are read.
    Columns(BTreeSet<String>),
}

impl ColumnRequirement {
    fn merge(&mut self, selection: BTreeSet<String>) {
        match self {
            Self::All => {}
            Self::Columns(_) if selection.is_empty() => *self = Self::All,
            Self::Columns(columns) => columns.extend(selection),
        }
    }

    /// Whether `column` is read downstream.
    pub fn contains(&self, column: &str) -> bool {
        match self {
            Self::All => true,
            Self::Columns(columns) => columns.contains(column),
        }
    }
}

/// Per-node column requirements.
#[derive(Debug, Clone, Default)]
pub struct ColumnRequirements {
    required: HashMap<TileableKey, ColumnRequirement>,
}

static ALL: ColumnRequirement = ColumnRequirement::All;

impl ColumnRequirements {
    /// Select columns for every node of `graph` and attribute each selection
    /// to the node's inputs.
    pub fn analyze(graph: &TileableGraph, registry: &SelectorRegistry) -> TesselResult<Self> {
        let mut selections: HashMap<TileableKey, BTreeSet<String>> = HashMap::new();
        for node in graph.nodes() {
            if !node.op().inputs().is_empty() {
                selections.insert(node.key(), registry.select(node)?);
            }
        }

        let results: HashSet<TileableKey> = graph.results().iter().copied().collect();
        let mut required = HashMap::with_capacity(graph.len());
        for node in graph.nodes() {
            let consumers = graph.successors(node.key());
            if results.contains(&node.key()) || consumers.is_empty() {
                required.insert(node.key(), ColumnRequirement::All);
                continue;
            }
            let mut requirement = ColumnRequirement::Columns(BTreeSet::new());
            for consumer in consumers {
                requirement.merge(selections.get(consumer).cloned().unwrap_or_default());
            }
            required.insert(node.key(), requirement);
        }
        debug!(
            "Column requirements for {} nodes, {} results",
            graph.len(),
            results.len()
        );
        Ok(Self { required })
    }

    /// Requirement of the node under `key`.
    pub fn get(&self, key: TileableKey) -> &ColumnRequirement {
        self.required.get(&key).unwrap_or(&ALL)
    }

    /// Known columns of `node` nothing downstream reads.
    pub fn prunable(&self, node: &TileableData) -> Vec<String> {
        let requirement = self.get(node.key());
        node.columns()
            .iter()
            .filter(|c| !requirement.contains(c))
            .cloned()
            .collect()
    }
}
