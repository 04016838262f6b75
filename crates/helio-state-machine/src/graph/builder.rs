//! Graph builder

use super::{AuthoredGraph, AuthoredNode, AuthoredTransition};
use crate::parameters::ParameterDecl;

/// Fluent builder for an [`AuthoredGraph`]
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: AuthoredGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, decl: ParameterDecl) -> Self {
        self.graph.parameters.push(decl);
        self
    }

    pub fn bool_parameter(self, name: impl Into<String>, default: bool) -> Self {
        self.parameter(ParameterDecl::bool(name, default))
    }

    pub fn int_parameter(self, name: impl Into<String>, default: i32) -> Self {
        self.parameter(ParameterDecl::int(name, default))
    }

    pub fn float_parameter(self, name: impl Into<String>, default: f32) -> Self {
        self.parameter(ParameterDecl::float(name, default))
    }

    pub fn trigger(self, name: impl Into<String>) -> Self {
        self.parameter(ParameterDecl::trigger(name))
    }

    /// Add a root-level leaf or group
    pub fn node(mut self, node: impl Into<AuthoredNode>) -> Self {
        self.graph.nodes.push(node.into());
        self
    }

    pub fn default_state(mut self, id: impl Into<String>) -> Self {
        self.graph.default_state = Some(id.into());
        self
    }

    pub fn any_state(mut self, transition: AuthoredTransition) -> Self {
        self.graph.any_state_transitions.push(transition);
        self
    }

    pub fn build(self) -> AuthoredGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AuthoredGroup, AuthoredLeaf};

    #[test]
    fn builds_nested_graph() {
        let graph = GraphBuilder::new()
            .bool_parameter("died", false)
            .trigger("attack")
            .node(AuthoredLeaf::clip("idle", 0, 1.0).with_transition(AuthoredTransition::to("combat").when_trigger("attack")))
            .node(
                AuthoredGroup::new("combat", "swing")
                    .with_node(AuthoredLeaf::clip("swing", 1, 0.6))
                    .exit_node("swing")
                    .exit_transition(AuthoredTransition::to("idle").after(1.0)),
            )
            .any_state(AuthoredTransition::to("idle").when_bool("died", true))
            .default_state("idle")
            .build();

        assert_eq!(graph.parameters.len(), 2);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.nodes[1].id(), "combat");
        assert_eq!(graph.any_state_transitions.len(), 1);
        assert_eq!(graph.default_state_id(), Some("idle"));
    }
}
