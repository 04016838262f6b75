//! Compile diagnostics

use crate::parameters::ParameterKind;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Everything the compiler can report about an authored graph
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiagnosticKind {
    #[error("graph has no nodes")]
    EmptyGraph,

    #[error("default state '{0}' does not exist")]
    UnknownDefaultState(String),

    #[error("node id '{0}' is declared more than once")]
    DuplicateNode(String),

    #[error("parameter '{0}' is declared more than once")]
    DuplicateParameter(String),

    #[error("{declared} parameters declared, at most {max} are addressable")]
    TooManyParameters { declared: usize, max: usize },

    #[error("parameter '{parameter}' is declared {declared:?} but its default is {default:?}")]
    ParameterDefaultMismatch {
        parameter: String,
        declared: ParameterKind,
        default: ParameterKind,
    },

    #[error("transition from '{origin}' references unknown parameter '{parameter}'")]
    UnknownParameter { origin: String, parameter: String },

    #[error("transition from '{origin}' compares {declared:?} parameter '{parameter}' as {used:?}")]
    ParameterKindMismatch {
        origin: String,
        parameter: String,
        declared: ParameterKind,
        used: ParameterKind,
    },

    #[error("transition from '{origin}' targets unknown node '{destination}'")]
    UnknownDestination { origin: String, destination: String },

    #[error("transition from '{origin}' has a non-finite timing value")]
    InvalidTiming { origin: String },

    #[error("state '{0}' has a non-positive duration or a negative or non-finite speed")]
    InvalidMotion(String),

    #[error("group '{group}' entry '{entry}' does not exist")]
    UnknownEntry { group: String, entry: String },

    #[error("cyclic group entry chain: {}", .0.join(" -> "))]
    CyclicEntry(Vec<String>),

    #[error("group '{group}' is nested {depth} levels deep (maximum {max})")]
    DepthExceeded { group: String, depth: usize, max: usize },

    #[error("group '{group}' marks '{node}' as exit but it is not a direct child")]
    ExitNodeNotInGroup { group: String, node: String },

    #[error("group '{group}' marks '{node}' as exit but it is a group, not a leaf")]
    ExitNodeNotLeaf { group: String, node: String },

    #[error("group '{0}' has exit nodes but no exit transitions")]
    DeadExitGroup(String),

    #[error("group '{0}' has exit transitions but no exit nodes; they can never fire")]
    UnusedExitTransitions(String),

    #[error("state '{0}' is unreachable from the default state")]
    UnreachableState(String),
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::DeadExitGroup(_) | DiagnosticKind::UnusedExitTransitions(_) => {
                Severity::Warning
            }
            DiagnosticKind::UnreachableState(_) => Severity::Info,
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<DiagnosticKind> for Diagnostic {
    fn from(kind: DiagnosticKind) -> Self {
        Self {
            severity: kind.severity(),
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}", label, self.kind)
    }
}

/// A failed compile: every diagnostic gathered, errors and warnings alike
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", summary(.diagnostics))]
pub struct CompileFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileFailure {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn has(&self, predicate: impl Fn(&DiagnosticKind) -> bool) -> bool {
        self.diagnostics.iter().any(|d| predicate(&d.kind))
    }
}

fn summary(diagnostics: &[Diagnostic]) -> String {
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    let mut text = format!("State graph compile failed with {} error(s)", errors);
    for diagnostic in diagnostics {
        text.push_str(&format!("\n  {}", diagnostic));
    }
    text
}
