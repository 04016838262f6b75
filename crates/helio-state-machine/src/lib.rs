//! Helio State Machine - animation state graph compiler and per-tick evaluator
//!
//! Authored graphs of leaf states and nested groups are flattened once into an
//! immutable [`FlatStateTable`]. Every live instance then evaluates that shared
//! table once per tick against its own [`InstanceContext`]:
//!
//! - any-state transitions preempt everything else
//! - local transitions of the current leaf come next
//! - group exit transitions only apply to leaves flagged as exit points
//!
//! Trigger parameters are consumed in a dedicated pass after every instance
//! has been evaluated, so all candidates within a tick observe the same value.

pub mod parameters;
pub mod condition;
pub mod motion;
pub mod graph;
pub mod diagnostics;
pub mod compiler;
pub mod table;
pub mod evaluator;
pub mod gate;
pub mod instance;
pub mod config;

mod state_machine;

pub use parameters::{
    ParameterBuffer, ParameterDecl, ParameterIndex, ParameterKind, ParameterTable, ParameterValue,
    TriggerMarks,
};
pub use condition::{Comparison, Condition};
pub use motion::{Motion, MotionKind};
pub use graph::{AuthoredCondition, AuthoredGraph, AuthoredGroup, AuthoredLeaf, AuthoredNode, AuthoredTransition, GraphBuilder};
pub use diagnostics::{CompileFailure, Diagnostic, DiagnosticKind, Severity};
pub use compiler::{compile, CompileOutput};
pub use table::{ExitGroupIndex, ExitTransitionGroup, FlatStateTable, LeafState, StateIndex, Transition};
pub use evaluator::{evaluate, Evaluation, MatchedTransition, TransitionSource};
pub use gate::PendingBlend;
pub use instance::InstanceContext;
pub use config::{CompilerConfig, RuntimeConfig};
pub use state_machine::{finish_tick, step, InstanceId, StateMachineRuntime, StepOutcome, TableHandle, TickReport};

/// Result type for state machine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling, loading or driving a state machine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileFailure),

    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error("Invalid state table: {0}")]
    InvalidTable(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
