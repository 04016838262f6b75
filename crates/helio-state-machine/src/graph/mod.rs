//! Authored state graph
//!
//! This is the editor-facing shape: leaves and groups nested arbitrarily,
//! transitions referring to nodes by id. Node ids are unique across the whole
//! graph, so a transition may point at any node regardless of nesting.
//! The compiler turns this into a [`FlatStateTable`](crate::FlatStateTable).

mod builder;

pub use builder::GraphBuilder;

use crate::condition::Comparison;
use crate::motion::Motion;
use crate::parameters::ParameterDecl;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Complete authored state machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthoredGraph {
    #[serde(default)]
    pub parameters: Vec<ParameterDecl>,
    pub nodes: Vec<AuthoredNode>,
    /// Node the machine starts in; the first root node when unset
    #[serde(default)]
    pub default_state: Option<String>,
    #[serde(default)]
    pub any_state_transitions: Vec<AuthoredTransition>,
}

impl AuthoredGraph {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Id of the node instances start in
    pub fn default_state_id(&self) -> Option<&str> {
        self.default_state
            .as_deref()
            .or_else(|| self.nodes.first().map(AuthoredNode::id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthoredNode {
    Leaf(AuthoredLeaf),
    Group(AuthoredGroup),
}

impl AuthoredNode {
    pub fn id(&self) -> &str {
        match self {
            AuthoredNode::Leaf(leaf) => &leaf.id,
            AuthoredNode::Group(group) => &group.id,
        }
    }
}

impl From<AuthoredLeaf> for AuthoredNode {
    fn from(leaf: AuthoredLeaf) -> Self {
        AuthoredNode::Leaf(leaf)
    }
}

impl From<AuthoredGroup> for AuthoredNode {
    fn from(group: AuthoredGroup) -> Self {
        AuthoredNode::Group(group)
    }
}

/// Animation-bearing state with outgoing transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoredLeaf {
    pub id: String,
    pub motion: Motion,
    #[serde(default)]
    pub transitions: Vec<AuthoredTransition>,
}

impl AuthoredLeaf {
    pub fn new(id: impl Into<String>, motion: Motion) -> Self {
        Self {
            id: id.into(),
            motion,
            transitions: Vec::new(),
        }
    }

    pub fn clip(id: impl Into<String>, clip: u32, duration: f32) -> Self {
        Self::new(id, Motion::clip(clip, duration))
    }

    pub fn blend_tree(id: impl Into<String>, tree: u32, duration: f32) -> Self {
        Self::new(id, Motion::blend_tree(tree, duration))
    }

    pub fn with_transition(mut self, transition: AuthoredTransition) -> Self {
        self.transitions.push(transition);
        self
    }
}

/// Named container of a nested graph
///
/// Entering the group lands on `entry` (followed through nested groups until a
/// leaf). `exit_transitions` are evaluated only while one of `exit_nodes` is
/// the current leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoredGroup {
    pub id: String,
    pub entry: String,
    pub nodes: Vec<AuthoredNode>,
    #[serde(default)]
    pub exit_nodes: Vec<String>,
    #[serde(default)]
    pub exit_transitions: Vec<AuthoredTransition>,
}

impl AuthoredGroup {
    pub fn new(id: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entry: entry.into(),
            nodes: Vec::new(),
            exit_nodes: Vec::new(),
            exit_transitions: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: impl Into<AuthoredNode>) -> Self {
        self.nodes.push(node.into());
        self
    }

    pub fn exit_node(mut self, id: impl Into<String>) -> Self {
        self.exit_nodes.push(id.into());
        self
    }

    pub fn exit_transition(mut self, transition: AuthoredTransition) -> Self {
        self.exit_transitions.push(transition);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoredCondition {
    pub parameter: String,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoredTransition {
    /// Leaf or group id
    pub destination: String,
    #[serde(default)]
    pub blend_duration: f32,
    /// Seconds when true, fraction of the source state's duration otherwise
    #[serde(default = "default_fixed_duration")]
    pub fixed_duration: bool,
    #[serde(default)]
    pub start_offset: f32,
    /// Minimum normalized progress of the source state
    #[serde(default)]
    pub end_time_gate: Option<f32>,
    #[serde(default)]
    pub conditions: Vec<AuthoredCondition>,
}

fn default_fixed_duration() -> bool {
    true
}

impl AuthoredTransition {
    pub fn to(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            blend_duration: 0.0,
            fixed_duration: true,
            start_offset: 0.0,
            end_time_gate: None,
            conditions: Vec::new(),
        }
    }

    pub fn when(mut self, parameter: impl Into<String>, comparison: Comparison) -> Self {
        self.conditions.push(AuthoredCondition {
            parameter: parameter.into(),
            comparison,
        });
        self
    }

    pub fn when_bool(self, parameter: impl Into<String>, value: bool) -> Self {
        self.when(parameter, Comparison::BoolEquals(value))
    }

    pub fn when_trigger(self, parameter: impl Into<String>) -> Self {
        self.when(parameter, Comparison::TriggerSet)
    }

    /// Crossfade over a fixed number of seconds
    pub fn blend(mut self, seconds: f32) -> Self {
        self.blend_duration = seconds;
        self.fixed_duration = true;
        self
    }

    /// Crossfade over a fraction of the source state's duration
    pub fn proportional_blend(mut self, fraction: f32) -> Self {
        self.blend_duration = fraction;
        self.fixed_duration = false;
        self
    }

    pub fn start_at(mut self, offset: f32) -> Self {
        self.start_offset = offset;
        self
    }

    /// Only eligible once the source state's normalized progress reaches `progress`
    pub fn after(mut self, progress: f32) -> Self {
        self.end_time_gate = Some(progress);
        self
    }
}
