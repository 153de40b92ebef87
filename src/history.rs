//! Step records kept by the cluster engines
//!
//! Every iteration of an engine records its decisions in a [`StepDescriptor`].
//! The [`StepHistory`] of a run is used to detect deadlocks and loops, which is
//! what guarantees termination when the size cap is never reached.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use itertools::Itertools;

use crate::definition::GainDescriptor;
use crate::graph::{Node, NodeIndex};

/// Default number of earlier steps compared against the last one
pub const DEFAULT_LOOP_LOOKBACK: usize = 2;

/// Decisions made during one iteration of a cluster engine.
#[derive(Debug, Clone, Default)]
pub struct StepDescriptor {
    added: BTreeMap<NodeIndex, GainDescriptor>,
    not_added: BTreeMap<NodeIndex, GainDescriptor>,
    removed: BTreeMap<NodeIndex, GainDescriptor>,
    not_removed: BTreeMap<NodeIndex, GainDescriptor>,
}

impl StepDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the inclusion decisions of an expansion phase.
    pub fn record_expansion_result(&mut self, descriptors: impl IntoIterator<Item = GainDescriptor>) {
        for descriptor in descriptors {
            let key = descriptor.node().index();
            if descriptor.result() {
                self.added.insert(key, descriptor);
            } else {
                self.not_added.insert(key, descriptor);
            }
        }
    }

    /// Record the exclusion decisions of a reduction phase.
    pub fn record_reduction_result(&mut self, descriptors: impl IntoIterator<Item = GainDescriptor>) {
        for descriptor in descriptors {
            let key = descriptor.node().index();
            if descriptor.result() {
                self.removed.insert(key, descriptor);
            } else {
                self.not_removed.insert(key, descriptor);
            }
        }
    }

    pub fn added_gain_descriptors(&self) -> impl Iterator<Item = &GainDescriptor> + '_ {
        self.added.values()
    }

    pub fn not_added_gain_descriptors(&self) -> impl Iterator<Item = &GainDescriptor> + '_ {
        self.not_added.values()
    }

    pub fn removed_gain_descriptors(&self) -> impl Iterator<Item = &GainDescriptor> + '_ {
        self.removed.values()
    }

    pub fn not_removed_gain_descriptors(&self) -> impl Iterator<Item = &GainDescriptor> + '_ {
        self.not_removed.values()
    }

    pub fn added_nodes(&self) -> Vec<Node> {
        self.added.values().map(|d| d.node().clone()).collect()
    }

    pub fn removed_nodes(&self) -> Vec<Node> {
        self.removed.values().map(|d| d.node().clone()).collect()
    }

    pub fn number_of_added_nodes(&self) -> usize {
        self.added.len()
    }

    pub fn number_of_removed_nodes(&self) -> usize {
        self.removed.len()
    }

    /// Whether the nodes added in this step are exactly the nodes removed in it.
    ///
    /// A step that neither added nor removed anything is a deadlock too.
    pub fn is_deadlock(&self) -> bool {
        self.added.len() == self.removed.len() && self.added.keys().all(|key| self.removed.contains_key(key))
    }

    /// Whether both steps added and removed the same nodes.
    ///
    /// Nodes that were evaluated but left alone are not compared.
    pub fn is_equivalent_to(&self, other: &StepDescriptor) -> bool {
        self.added.keys().eq(other.added.keys()) && self.removed.keys().eq(other.removed.keys())
    }

    /// The decision recorded for `node` in this step, if any.
    ///
    /// A node can be recorded by both an expansion and a reduction phase; the
    /// "left alone" decisions take precedence.
    pub fn gain_descriptor_for_node(&self, node: &Node) -> Option<&GainDescriptor> {
        let key = node.index();
        self.not_removed
            .get(&key)
            .or_else(|| self.not_added.get(&key))
            .or_else(|| self.added.get(&key))
            .or_else(|| self.removed.get(&key))
    }
}

impl fmt::Display for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buckets = [
            ("Added", &self.added),
            ("Not added", &self.not_added),
            ("Removed", &self.removed),
            ("Not removed", &self.not_removed),
        ];

        let lines = buckets.iter().flat_map(|(label, bucket)| {
            bucket
                .values()
                .map(|d| d.node().name())
                .sorted()
                .map(move |name| format!("{}: {}", label, name))
        });

        write!(f, "{}", lines.format("\n"))
    }
}

/// Ordered record of every step an engine took during one run.
#[derive(Debug, Clone)]
pub struct StepHistory {
    steps: Vec<StepDescriptor>,
    source_nodes: Vec<Node>,
    source_nodes_in_result: bool,
}

impl StepHistory {
    pub fn new(source_nodes: Vec<Node>, source_nodes_in_result: bool) -> Self {
        Self {
            steps: Vec::new(),
            source_nodes,
            source_nodes_in_result,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepDescriptor> {
        self.steps.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepDescriptor> {
        self.steps.iter()
    }

    pub fn last_step(&self) -> Option<&StepDescriptor> {
        self.steps.last()
    }

    /// The nodes the run was seeded with
    pub fn source_nodes(&self) -> &[Node] {
        &self.source_nodes
    }

    /// Whether the seeds must remain in the result
    pub fn source_nodes_in_result(&self) -> bool {
        self.source_nodes_in_result
    }

    /// Append a new, empty step and return it for recording.
    pub fn step(&mut self) -> &mut StepDescriptor {
        self.steps.push(StepDescriptor::new());
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    /// Look for a repeated step sequence at the end of the history.
    ///
    /// Returns the steps that form the loop: the last step alone if it is a
    /// deadlock, otherwise everything from the earliest of the previous
    /// `lookback` steps that is equivalent to the last one. The engines are
    /// deterministic, so an equivalent step means the same steps would follow.
    pub fn find_loop(&self, lookback: usize) -> Option<&[StepDescriptor]> {
        let last = self.steps.last()?;
        let length = self.steps.len();

        if last.is_deadlock() {
            return Some(&self.steps[length - 1..]);
        }

        let start = (length - 1).saturating_sub(lookback);
        (start..length - 1)
            .find(|&index| last.is_equivalent_to(&self.steps[index]))
            .map(|index| &self.steps[index..])
    }
}

impl Index<usize> for StepHistory {
    type Output = StepDescriptor;

    fn index(&self, index: usize) -> &Self::Output {
        &self.steps[index]
    }
}

impl<'a> IntoIterator for &'a StepHistory {
    type Item = &'a StepDescriptor;
    type IntoIter = std::slice::Iter<'a, StepDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for StepHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let blocks = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("STEP {}\n{}", i, step));
        write!(f, "{}", blocks.format("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::GainPayload;

    fn decision(index: NodeIndex, result: bool) -> GainDescriptor {
        GainDescriptor::new(Node::new(index, format!("n{}", index)), result, GainPayload::None)
    }

    /// Step that added `added` and removed `removed`, everything else left alone.
    fn record(history: &mut StepHistory, added: &[NodeIndex], removed: &[NodeIndex]) {
        let step = history.step();
        step.record_expansion_result(added.iter().map(|&i| decision(i, true)));
        step.record_expansion_result([decision(90, false)]);
        step.record_reduction_result(removed.iter().map(|&i| decision(i, true)));
    }

    #[test]
    fn decisions_are_bucketed() {
        let mut step = StepDescriptor::new();
        step.record_expansion_result([decision(1, true), decision(2, false)]);
        step.record_reduction_result([decision(3, true), decision(1, false)]);

        assert_eq!(step.number_of_added_nodes(), 1);
        assert_eq!(step.number_of_removed_nodes(), 1);
        assert_eq!(step.not_added_gain_descriptors().count(), 1);
        assert_eq!(step.removed_nodes()[0].index(), 3);

        // Node 1 was added and then kept: the "kept" decision is reported.
        let node = Node::new(1, "n1");
        assert!(!step.gain_descriptor_for_node(&node).unwrap().result());
        assert!(step.gain_descriptor_for_node(&Node::new(7, "n7")).is_none());
    }

    #[test]
    fn empty_and_balanced_steps_are_deadlocks() {
        assert!(StepDescriptor::new().is_deadlock());

        let mut step = StepDescriptor::new();
        step.record_expansion_result([decision(4, true)]);
        assert!(!step.is_deadlock());
        step.record_reduction_result([decision(4, true)]);
        assert!(step.is_deadlock());

        let mut other = StepDescriptor::new();
        other.record_expansion_result([decision(4, true)]);
        other.record_reduction_result([decision(5, true)]);
        assert!(!other.is_deadlock());
    }

    #[test]
    fn deadlock_is_a_loop_of_one_step() {
        let mut history = StepHistory::new(Vec::new(), true);
        assert!(history.find_loop(DEFAULT_LOOP_LOOKBACK).is_none());

        record(&mut history, &[1, 2], &[]);
        assert!(history.find_loop(DEFAULT_LOOP_LOOKBACK).is_none());

        record(&mut history, &[], &[]);
        assert_eq!(history.find_loop(DEFAULT_LOOP_LOOKBACK).unwrap().len(), 1);
    }

    #[test]
    fn repeated_steps_form_a_loop() {
        let mut history = StepHistory::new(Vec::new(), true);
        record(&mut history, &[1], &[]);
        record(&mut history, &[2], &[1]);
        record(&mut history, &[1], &[2]);
        assert!(history.find_loop(DEFAULT_LOOP_LOOKBACK).is_none());

        record(&mut history, &[2], &[1]);
        let cycle = history.find_loop(DEFAULT_LOOP_LOOKBACK).unwrap();
        assert_eq!(cycle.len(), 3);
        assert!(cycle[0].is_equivalent_to(&history[1]));
    }

    #[test]
    fn lookback_window_bounds_the_search() {
        let mut history = StepHistory::new(Vec::new(), true);
        record(&mut history, &[1], &[2]);
        record(&mut history, &[3], &[]);
        record(&mut history, &[4], &[]);
        record(&mut history, &[1], &[2]);

        assert!(history.find_loop(2).is_none());
        assert_eq!(history.find_loop(3).unwrap().len(), 4);
    }

    #[test]
    fn equivalence_ignores_untouched_nodes() {
        let mut a = StepDescriptor::new();
        a.record_expansion_result([decision(1, true), decision(8, false)]);
        let mut b = StepDescriptor::new();
        b.record_expansion_result([decision(1, true)]);
        b.record_reduction_result([decision(9, false)]);

        assert!(a.is_equivalent_to(&b));
        b.record_reduction_result([decision(1, true)]);
        assert!(!a.is_equivalent_to(&b));
    }

    #[test]
    fn display_lists_buckets_by_name() {
        let mut history = StepHistory::new(vec![Node::new(0, "n0")], false);
        let step = history.step();
        step.record_expansion_result([decision(2, true), decision(1, true), decision(3, false)]);
        step.record_reduction_result([decision(1, false)]);

        assert_eq!(
            history.to_string(),
            "STEP 0\nAdded: n1\nAdded: n2\nNot added: n3\nNot removed: n1"
        );
        assert!(!history.source_nodes_in_result());
        assert_eq!(history.source_nodes()[0].name(), "n0");
    }
}
