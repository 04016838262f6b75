//! Compiled flat state table
//!
//! Built once by the compiler and shared read-only by every instance. Leaves,
//! exit groups and parameters are addressed by small integer indices; there
//! is no group hierarchy left at runtime.

use crate::condition::Condition;
use crate::motion::Motion;
use crate::parameters::{ParameterIndex, ParameterTable};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Global index of a leaf state
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateIndex(pub u32);

impl StateIndex {
    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

/// Index of an [`ExitTransitionGroup`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExitGroupIndex(pub u32);

impl ExitGroupIndex {
    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Always a leaf; group destinations were resolved to their entry leaf
    pub destination: StateIndex,
    pub blend_duration: f32,
    pub fixed_duration: bool,
    pub start_offset: f32,
    pub end_time_gate: Option<f32>,
    pub conditions: Vec<Condition>,
}

impl Transition {
    /// Whether the source state has progressed far enough for this transition
    #[inline]
    pub fn gate_open(&self, progress: f32) -> bool {
        self.end_time_gate.map_or(true, |gate| progress >= gate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafState {
    pub index: StateIndex,
    /// Authored node id
    pub name: String,
    pub motion: Motion,
    pub transitions: Vec<Transition>,
    /// Set only when the leaf is an exit node of its enclosing group
    pub exit_group: Option<ExitGroupIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitTransitionGroup {
    /// Authored id of the group that owns these transitions
    pub group_id: String,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatStateTable {
    leaf_states: Vec<LeafState>,
    any_state_transitions: Vec<Transition>,
    exit_groups: Vec<ExitTransitionGroup>,
    parameters: ParameterTable,
    default_state: StateIndex,
}

impl FlatStateTable {
    pub(crate) fn new(
        leaf_states: Vec<LeafState>,
        any_state_transitions: Vec<Transition>,
        exit_groups: Vec<ExitTransitionGroup>,
        parameters: ParameterTable,
        default_state: StateIndex,
    ) -> Self {
        Self {
            leaf_states,
            any_state_transitions,
            exit_groups,
            parameters,
            default_state,
        }
    }

    pub fn leaf_states(&self) -> &[LeafState] {
        &self.leaf_states
    }

    #[inline]
    pub fn state(&self, index: StateIndex) -> &LeafState {
        &self.leaf_states[index.get()]
    }

    pub fn state_count(&self) -> usize {
        self.leaf_states.len()
    }

    /// Look up a leaf by its authored id
    pub fn state_index(&self, name: &str) -> Option<StateIndex> {
        self.leaf_states
            .iter()
            .find(|leaf| leaf.name == name)
            .map(|leaf| leaf.index)
    }

    pub fn any_state_transitions(&self) -> &[Transition] {
        &self.any_state_transitions
    }

    pub fn exit_groups(&self) -> &[ExitTransitionGroup] {
        &self.exit_groups
    }

    #[inline]
    pub fn exit_group(&self, index: ExitGroupIndex) -> &ExitTransitionGroup {
        &self.exit_groups[index.get()]
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    pub fn default_state(&self) -> StateIndex {
        self.default_state
    }

    /// Every transition in the table, in a fixed order: any-state, then
    /// per-leaf local, then per-group exit transitions
    pub fn all_transitions(&self) -> impl Iterator<Item = &Transition> {
        self.any_state_transitions
            .iter()
            .chain(self.leaf_states.iter().flat_map(|leaf| leaf.transitions.iter()))
            .chain(self.exit_groups.iter().flat_map(|group| group.transitions.iter()))
    }

    /// Check the index invariants: every destination, exit group, parameter
    /// reference and the default state resolve inside this table. Parameter
    /// names are unique and every default matches its declared kind.
    pub fn validate(&self) -> Result<()> {
        let states = self.leaf_states.len();
        if self.default_state.get() >= states {
            return Err(Error::InvalidTable(format!(
                "default state {} out of range ({} states)",
                self.default_state.0, states
            )));
        }

        if self.parameters.len() > ParameterIndex::MAX_COUNT {
            return Err(Error::InvalidTable(format!(
                "{} parameters, at most {} are addressable",
                self.parameters.len(),
                ParameterIndex::MAX_COUNT
            )));
        }
        let mut names = HashSet::new();
        for (_, decl) in self.parameters.iter() {
            if !names.insert(decl.name.as_str()) {
                return Err(Error::InvalidTable(format!("parameter '{}' is declared more than once", decl.name)));
            }
            if decl.default.kind() != decl.kind {
                return Err(Error::InvalidTable(format!(
                    "parameter '{}' is {:?} but its default is {:?}",
                    decl.name,
                    decl.kind,
                    decl.default.kind()
                )));
            }
        }

        for (i, leaf) in self.leaf_states.iter().enumerate() {
            if leaf.index.get() != i {
                return Err(Error::InvalidTable(format!(
                    "state '{}' stored at {} claims index {}",
                    leaf.name, i, leaf.index.0
                )));
            }
            if !leaf.motion.is_valid() {
                return Err(Error::InvalidTable(format!("state '{}' has an invalid motion", leaf.name)));
            }
            if let Some(group) = leaf.exit_group {
                if group.get() >= self.exit_groups.len() {
                    return Err(Error::InvalidTable(format!(
                        "state '{}' references exit group {} ({} groups)",
                        leaf.name,
                        group.0,
                        self.exit_groups.len()
                    )));
                }
            }
        }

        for transition in self.all_transitions() {
            if transition.destination.get() >= states {
                return Err(Error::InvalidTable(format!(
                    "transition destination {} out of range ({} states)",
                    transition.destination.0, states
                )));
            }
            for condition in &transition.conditions {
                let decl = self.parameters.get(condition.parameter).ok_or_else(|| {
                    Error::InvalidTable(format!("condition parameter {} out of range", condition.parameter.0))
                })?;
                if decl.kind != condition.kind() {
                    return Err(Error::InvalidTable(format!(
                        "condition on '{}' compares as {:?}, parameter is {:?}",
                        decl.name,
                        condition.kind(),
                        decl.kind
                    )));
                }
            }
        }

        Ok(())
    }

    /// Canonical encoding of the table. Identical tables encode to identical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode and validate a table produced by [`FlatStateTable::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let table: Self = serde_json::from_slice(bytes)?;
        table.validate()?;
        Ok(table)
    }
}
