//! Flattening compiler
//!
//! Turns an [`AuthoredGraph`] into a [`FlatStateTable`]:
//!
//! 1. Depth-first walk assigning global leaf indices in visitation order and
//!    exit group indices to groups in pre-order.
//! 2. Entry chains of every group are followed down to a leaf, with cycle detection.
//! 3. Exit nodes are stamped with their group's exit group index.
//! 4. Transitions are compiled, group destinations rewritten to entry leaves.
//!
//! Every problem found is collected; if any is an error no table is produced.
//! The compiler is a pure function of its input, so the same graph always
//! yields the same table.

use crate::condition::Condition;
use crate::config::CompilerConfig;
use crate::diagnostics::{CompileFailure, Diagnostic, DiagnosticKind, Severity};
use crate::graph::{AuthoredGraph, AuthoredGroup, AuthoredLeaf, AuthoredNode, AuthoredTransition};
use crate::parameters::{ParameterIndex, ParameterTable};
use crate::table::{ExitGroupIndex, ExitTransitionGroup, FlatStateTable, LeafState, StateIndex, Transition};
use crate::Result;
use std::collections::{HashMap, HashSet, VecDeque};

/// A successfully compiled table plus any non-fatal diagnostics
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub table: FlatStateTable,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }
}

/// Compile an authored graph into a flat state table
pub fn compile(graph: &AuthoredGraph, config: &CompilerConfig) -> Result<CompileOutput> {
    config.validate()?;
    log::info!(
        "Compiling state graph: {} root nodes, {} parameters",
        graph.nodes.len(),
        graph.parameters.len()
    );

    let mut compiler = Compiler::new(config);
    compiler.declare_parameters(graph);
    compiler.collect(&graph.nodes, 0);
    compiler.resolve_entries();
    compiler.stamp_exit_nodes();
    let default_state = compiler.resolve_default(graph);
    let leaf_states = compiler.build_leaves();
    let any_state_transitions = compiler.build_transitions("any state", &graph.any_state_transitions);
    let exit_groups = compiler.build_exit_groups();

    let default_state = match default_state {
        Some(default_state) if !compiler.has_errors() => default_state,
        _ => {
            return Err(CompileFailure {
                diagnostics: compiler.diagnostics,
            }
            .into())
        }
    };

    let table = FlatStateTable::new(
        leaf_states,
        any_state_transitions,
        exit_groups,
        compiler.parameters,
        default_state,
    );
    let mut diagnostics = compiler.diagnostics;
    if config.report_unreachable {
        diagnostics.extend(unreachable_states(&table));
    }

    for diagnostic in &diagnostics {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{}", diagnostic),
            _ => log::debug!("{}", diagnostic),
        }
    }
    log::info!(
        "State graph compiled: {} states, {} exit groups, {} any-state transitions",
        table.state_count(),
        table.exit_groups().len(),
        table.any_state_transitions().len()
    );

    Ok(CompileOutput { table, diagnostics })
}

#[derive(Debug, Copy, Clone)]
enum NodeRef {
    Leaf(StateIndex),
    Group(usize),
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum EntryState {
    Unresolved,
    Resolved(StateIndex),
    Failed,
}

struct GroupSlot<'g> {
    group: &'g AuthoredGroup,
    exit_group: Option<ExitGroupIndex>,
    entry: EntryState,
}

struct Compiler<'g> {
    config: &'g CompilerConfig,
    parameters: ParameterTable,
    nodes: HashMap<&'g str, NodeRef>,
    leaves: Vec<&'g AuthoredLeaf>,
    leaf_exit_groups: Vec<Option<ExitGroupIndex>>,
    groups: Vec<GroupSlot<'g>>,
    exit_group_count: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'g> Compiler<'g> {
    fn new(config: &'g CompilerConfig) -> Self {
        Self {
            config,
            parameters: ParameterTable::new(),
            nodes: HashMap::new(),
            leaves: Vec::new(),
            leaf_exit_groups: Vec::new(),
            groups: Vec::new(),
            exit_group_count: 0,
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, kind: DiagnosticKind) {
        self.diagnostics.push(kind.into());
    }

    fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    fn declare_parameters(&mut self, graph: &'g AuthoredGraph) {
        let mut declared = HashSet::new();
        for decl in &graph.parameters {
            if !declared.insert(decl.name.as_str()) {
                self.report(DiagnosticKind::DuplicateParameter(decl.name.clone()));
                continue;
            }
            if decl.default.kind() != decl.kind {
                self.report(DiagnosticKind::ParameterDefaultMismatch {
                    parameter: decl.name.clone(),
                    declared: decl.kind,
                    default: decl.default.kind(),
                });
            }
            if self.parameters.push(decl.clone()).is_none() {
                self.report(DiagnosticKind::TooManyParameters {
                    declared: graph.parameters.len(),
                    max: ParameterIndex::MAX_COUNT,
                });
                return;
            }
        }
    }

    fn collect(&mut self, nodes: &'g [AuthoredNode], depth: usize) {
        for node in nodes {
            let id = node.id();
            if self.nodes.contains_key(id) {
                self.report(DiagnosticKind::DuplicateNode(id.to_string()));
                continue;
            }

            match node {
                AuthoredNode::Leaf(leaf) => {
                    if !leaf.motion.is_valid() {
                        self.report(DiagnosticKind::InvalidMotion(leaf.id.clone()));
                    }
                    let index = StateIndex(self.leaves.len() as u32);
                    self.nodes.insert(id, NodeRef::Leaf(index));
                    self.leaves.push(leaf);
                    self.leaf_exit_groups.push(None);
                }
                AuthoredNode::Group(group) => {
                    let depth = depth + 1;
                    let exit_group = if group.exit_nodes.is_empty() && group.exit_transitions.is_empty() {
                        None
                    } else {
                        let index = ExitGroupIndex(self.exit_group_count);
                        self.exit_group_count += 1;
                        Some(index)
                    };

                    self.nodes.insert(id, NodeRef::Group(self.groups.len()));
                    self.groups.push(GroupSlot {
                        group,
                        exit_group,
                        entry: EntryState::Unresolved,
                    });

                    if depth > self.config.max_depth {
                        self.report(DiagnosticKind::DepthExceeded {
                            group: group.id.clone(),
                            depth,
                            max: self.config.max_depth,
                        });
                        // Children were never collected; don't report their absence again.
                        if let Some(slot) = self.groups.last_mut() {
                            slot.entry = EntryState::Failed;
                        }
                        continue;
                    }

                    log::debug!("Flattening group '{}' at depth {}", group.id, depth);
                    self.collect(&group.nodes, depth);
                }
            }
        }
    }

    fn resolve_entries(&mut self) {
        for slot in 0..self.groups.len() {
            self.resolve_entry(slot);
        }
    }

    /// Follow a group's entry chain to a leaf. Every group on the chain
    /// shares the outcome, so each group is walked at most once.
    fn resolve_entry(&mut self, start: usize) -> Option<StateIndex> {
        let mut chain: Vec<usize> = Vec::new();
        let mut current = start;

        let outcome = loop {
            match self.groups[current].entry {
                EntryState::Resolved(leaf) => break Some(leaf),
                EntryState::Failed => break None,
                EntryState::Unresolved => {}
            }

            if let Some(position) = chain.iter().position(|&slot| slot == current) {
                let mut cycle: Vec<String> = chain[position..]
                    .iter()
                    .map(|&slot| self.groups[slot].group.id.clone())
                    .collect();
                cycle.push(self.groups[current].group.id.clone());
                self.report(DiagnosticKind::CyclicEntry(cycle));
                break None;
            }
            chain.push(current);

            let group = self.groups[current].group;
            match self.nodes.get(group.entry.as_str()).copied() {
                Some(NodeRef::Leaf(leaf)) => break Some(leaf),
                Some(NodeRef::Group(next)) => current = next,
                None => {
                    self.report(DiagnosticKind::UnknownEntry {
                        group: group.id.clone(),
                        entry: group.entry.clone(),
                    });
                    break None;
                }
            }
        };

        let state = outcome.map_or(EntryState::Failed, EntryState::Resolved);
        for slot in chain {
            self.groups[slot].entry = state;
            if let Some(leaf) = outcome {
                log::debug!(
                    "Group '{}' enters at '{}'",
                    self.groups[slot].group.id,
                    self.leaves[leaf.get()].id
                );
            }
        }
        outcome
    }

    fn stamp_exit_nodes(&mut self) {
        for slot in 0..self.groups.len() {
            let group = self.groups[slot].group;
            let Some(exit_group) = self.groups[slot].exit_group else {
                continue;
            };

            if group.exit_transitions.is_empty() {
                self.report(DiagnosticKind::DeadExitGroup(group.id.clone()));
            }
            if group.exit_nodes.is_empty() {
                self.report(DiagnosticKind::UnusedExitTransitions(group.id.clone()));
            }

            for node in &group.exit_nodes {
                if !group.nodes.iter().any(|child| child.id() == node) {
                    self.report(DiagnosticKind::ExitNodeNotInGroup {
                        group: group.id.clone(),
                        node: node.clone(),
                    });
                    continue;
                }
                match self.nodes.get(node.as_str()).copied() {
                    Some(NodeRef::Leaf(leaf)) => self.leaf_exit_groups[leaf.get()] = Some(exit_group),
                    Some(NodeRef::Group(_)) => self.report(DiagnosticKind::ExitNodeNotLeaf {
                        group: group.id.clone(),
                        node: node.clone(),
                    }),
                    // Child of a group cut off by the depth limit
                    None => {}
                }
            }
        }
    }

    fn resolve_default(&mut self, graph: &AuthoredGraph) -> Option<StateIndex> {
        if graph.nodes.is_empty() {
            self.report(DiagnosticKind::EmptyGraph);
            return None;
        }
        let id = graph.default_state_id()?;
        match self.nodes.get(id).copied() {
            Some(NodeRef::Leaf(leaf)) => Some(leaf),
            Some(NodeRef::Group(slot)) => self.entry_leaf(slot),
            None => {
                self.report(DiagnosticKind::UnknownDefaultState(id.to_string()));
                None
            }
        }
    }

    fn entry_leaf(&self, slot: usize) -> Option<StateIndex> {
        match self.groups[slot].entry {
            EntryState::Resolved(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Resolve a destination id to a leaf. Groups resolve to their entry
    /// leaf; a failed entry chain was already reported.
    fn destination(&mut self, origin: &str, id: &str) -> Option<StateIndex> {
        match self.nodes.get(id).copied() {
            Some(NodeRef::Leaf(leaf)) => Some(leaf),
            Some(NodeRef::Group(slot)) => self.entry_leaf(slot),
            None => {
                self.report(DiagnosticKind::UnknownDestination {
                    origin: origin.to_string(),
                    destination: id.to_string(),
                });
                None
            }
        }
    }

    fn build_transition(&mut self, origin: &str, authored: &AuthoredTransition) -> Option<Transition> {
        let destination = self.destination(origin, &authored.destination);

        let mut valid = true;
        let mut conditions = Vec::with_capacity(authored.conditions.len());
        for condition in &authored.conditions {
            let Some(index) = self.parameters.index_of(&condition.parameter) else {
                self.report(DiagnosticKind::UnknownParameter {
                    origin: origin.to_string(),
                    parameter: condition.parameter.clone(),
                });
                valid = false;
                continue;
            };
            let declared = self.parameters.get(index).map(|decl| decl.kind);
            let used = condition.comparison.kind();
            if let Some(declared) = declared.filter(|&declared| declared != used) {
                self.report(DiagnosticKind::ParameterKindMismatch {
                    origin: origin.to_string(),
                    parameter: condition.parameter.clone(),
                    declared,
                    used,
                });
                valid = false;
                continue;
            }
            conditions.push(Condition::new(index, condition.comparison));
        }

        let timing_valid = authored.blend_duration.is_finite()
            && authored.blend_duration >= 0.0
            && authored.start_offset.is_finite()
            && authored.end_time_gate.map_or(true, f32::is_finite);
        if !timing_valid {
            self.report(DiagnosticKind::InvalidTiming {
                origin: origin.to_string(),
            });
            valid = false;
        }

        let destination = destination.filter(|_| valid)?;
        Some(Transition {
            destination,
            blend_duration: authored.blend_duration,
            fixed_duration: authored.fixed_duration,
            start_offset: authored.start_offset,
            end_time_gate: authored.end_time_gate,
            conditions,
        })
    }

    fn build_transitions(&mut self, origin: &str, authored: &[AuthoredTransition]) -> Vec<Transition> {
        authored
            .iter()
            .filter_map(|transition| self.build_transition(origin, transition))
            .collect()
    }

    fn build_leaves(&mut self) -> Vec<LeafState> {
        (0..self.leaves.len())
            .map(|i| {
                let leaf = self.leaves[i];
                let transitions = self.build_transitions(&leaf.id, &leaf.transitions);
                LeafState {
                    index: StateIndex(i as u32),
                    name: leaf.id.clone(),
                    motion: leaf.motion,
                    transitions,
                    exit_group: self.leaf_exit_groups[i],
                }
            })
            .collect()
    }

    /// Exit groups come out in pre-order, matching the indices handed out in `collect`
    fn build_exit_groups(&mut self) -> Vec<ExitTransitionGroup> {
        let mut exit_groups = Vec::with_capacity(self.exit_group_count as usize);
        for slot in 0..self.groups.len() {
            let group = self.groups[slot].group;
            if let Some(index) = self.groups[slot].exit_group {
                debug_assert_eq!(index.get(), exit_groups.len());
                let transitions = self.build_transitions(&group.id, &group.exit_transitions);
                exit_groups.push(ExitTransitionGroup {
                    group_id: group.id.clone(),
                    transitions,
                });
            }
        }
        exit_groups
    }
}

/// Leaves no sequence of local, exit or any-state transitions reaches from the default state
fn unreachable_states(table: &FlatStateTable) -> Vec<Diagnostic> {
    let mut seen = vec![false; table.state_count()];
    let mut queue = VecDeque::new();

    let roots = std::iter::once(table.default_state())
        .chain(table.any_state_transitions().iter().map(|t| t.destination));
    for state in roots {
        if !seen[state.get()] {
            seen[state.get()] = true;
            queue.push_back(state);
        }
    }

    while let Some(state) = queue.pop_front() {
        let leaf = table.state(state);
        let exits = leaf
            .exit_group
            .into_iter()
            .flat_map(|group| table.exit_group(group).transitions.iter());
        for transition in leaf.transitions.iter().chain(exits) {
            let next = transition.destination;
            if !seen[next.get()] {
                seen[next.get()] = true;
                queue.push_back(next);
            }
        }
    }

    table
        .leaf_states()
        .iter()
        .filter(|leaf| !seen[leaf.index.get()])
        .map(|leaf| DiagnosticKind::UnreachableState(leaf.name.clone()).into())
        .collect()
}
