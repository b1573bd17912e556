//! Per-element outcome accumulator for session-end graph writes.

use innerworld_types::element::ElementType;

/// What happened when one element was written to the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Node and temporal edge both created.
    Written { node_id: String },
    /// Node created, edge failed.
    EdgeFailed { node_id: String, error: String },
    /// Node creation failed; no edge was attempted.
    NodeFailed { error: String },
}

#[derive(Debug, Clone)]
pub struct ElementWrite {
    pub index: usize,
    pub element_type: ElementType,
    pub outcome: WriteOutcome,
}

/// Ordered record of every element write attempted for a session.
#[derive(Debug, Default)]
pub struct GraphWriteLedger {
    writes: Vec<ElementWrite>,
}

impl GraphWriteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, index: usize, element_type: ElementType, outcome: WriteOutcome) {
        self.writes.push(ElementWrite {
            index,
            element_type,
            outcome,
        });
    }

    pub fn writes(&self) -> &[ElementWrite] {
        &self.writes
    }

    pub fn nodes_created(&self) -> u32 {
        self.writes
            .iter()
            .filter(|w| !matches!(w.outcome, WriteOutcome::NodeFailed { .. }))
            .count() as u32
    }

    pub fn edges_created(&self) -> u32 {
        self.writes
            .iter()
            .filter(|w| matches!(w.outcome, WriteOutcome::Written { .. }))
            .count() as u32
    }

    /// One human-readable line per failed write.
    pub fn warnings(&self) -> Vec<String> {
        self.writes
            .iter()
            .filter_map(|w| match &w.outcome {
                WriteOutcome::Written { .. } => None,
                WriteOutcome::NodeFailed { error } => Some(format!(
                    "element {} ({}): node creation failed: {error}",
                    w.index, w.element_type
                )),
                WriteOutcome::EdgeFailed { node_id, error } => Some(format!(
                    "element {} ({}): edge for node {node_id} failed: {error}",
                    w.index, w.element_type
                )),
            })
            .collect()
    }
}
