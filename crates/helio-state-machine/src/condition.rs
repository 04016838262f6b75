//! Typed comparison predicates over parameter indices

use crate::parameters::{ParameterBuffer, ParameterIndex, ParameterKind, ParameterValue, TriggerMarks};
use serde::{Deserialize, Serialize};

/// Comparison operator together with its operand
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Comparison {
    BoolEquals(bool),
    IntEquals(i32),
    IntNotEquals(i32),
    IntGreater(i32),
    IntLess(i32),
    FloatGreater(f32),
    FloatLess(f32),
    /// Trigger is set; reading it as set marks it for the end-of-tick reset
    TriggerSet,
}

impl Comparison {
    /// Parameter kind this comparison applies to
    pub fn kind(&self) -> ParameterKind {
        match self {
            Comparison::BoolEquals(_) => ParameterKind::Bool,
            Comparison::IntEquals(_)
            | Comparison::IntNotEquals(_)
            | Comparison::IntGreater(_)
            | Comparison::IntLess(_) => ParameterKind::Int,
            Comparison::FloatGreater(_) | Comparison::FloatLess(_) => ParameterKind::Float,
            Comparison::TriggerSet => ParameterKind::Trigger,
        }
    }

    fn test(&self, value: ParameterValue) -> bool {
        match (*self, value) {
            (Comparison::BoolEquals(expected), ParameterValue::Bool(v)) => v == expected,
            (Comparison::IntEquals(operand), ParameterValue::Int(v)) => v == operand,
            (Comparison::IntNotEquals(operand), ParameterValue::Int(v)) => v != operand,
            (Comparison::IntGreater(operand), ParameterValue::Int(v)) => v > operand,
            (Comparison::IntLess(operand), ParameterValue::Int(v)) => v < operand,
            (Comparison::FloatGreater(operand), ParameterValue::Float(v)) => v > operand,
            (Comparison::FloatLess(operand), ParameterValue::Float(v)) => v < operand,
            (Comparison::TriggerSet, ParameterValue::Trigger(v)) => v,
            (comparison, value) => {
                debug_assert!(
                    false,
                    "comparison {:?} applied to {:?}; kinds are checked at compile time",
                    comparison, value
                );
                false
            }
        }
    }
}

/// A compiled condition: one comparison against one parameter
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub parameter: ParameterIndex,
    pub comparison: Comparison,
}

impl Condition {
    pub fn new(parameter: ParameterIndex, comparison: Comparison) -> Self {
        Self { parameter, comparison }
    }

    pub fn kind(&self) -> ParameterKind {
        self.comparison.kind()
    }

    /// Test the condition against a buffer.
    ///
    /// Never writes the buffer. A trigger read as set is recorded in `marks`.
    #[inline]
    pub fn evaluate(&self, buffer: &ParameterBuffer, marks: &mut TriggerMarks) -> bool {
        let holds = self.comparison.test(buffer.get(self.parameter));
        if holds && self.comparison == Comparison::TriggerSet {
            marks.mark(self.parameter);
        }
        holds
    }
}

/// AND over an ordered condition list, short-circuiting on the first failure.
/// An empty list always holds.
#[inline]
pub fn all_hold(conditions: &[Condition], buffer: &ParameterBuffer, marks: &mut TriggerMarks) -> bool {
    conditions.iter().all(|condition| condition.evaluate(buffer, marks))
}
