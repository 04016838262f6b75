//! Per-tick transition evaluator
//!
//! Candidates are scanned in a fixed priority order, first match wins:
//!
//! 1. any-state transitions
//! 2. local transitions of the current leaf
//! 3. exit transitions of the current leaf's exit group, if it has one
//!
//! A transition matches when its end-time gate is open for the current leaf's
//! progress and all of its conditions hold. Gates are checked before
//! conditions, so a gated transition never consumes a trigger.

use crate::condition::all_hold;
use crate::instance::InstanceContext;
use crate::parameters::{ParameterBuffer, TriggerMarks};
use crate::table::{ExitGroupIndex, FlatStateTable, StateIndex, Transition};

/// Which candidate list a match came from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransitionSource {
    AnyState,
    Local(StateIndex),
    Exit(ExitGroupIndex),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MatchedTransition<'t> {
    pub source: TransitionSource,
    /// Position within the source list
    pub index: usize,
    pub transition: &'t Transition,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Evaluation<'t> {
    NoMatch,
    Matched(MatchedTransition<'t>),
}

impl<'t> Evaluation<'t> {
    pub fn matched(&self) -> Option<&MatchedTransition<'t>> {
        match self {
            Evaluation::Matched(matched) => Some(matched),
            Evaluation::NoMatch => None,
        }
    }
}

/// Evaluate one instance against the shared table.
///
/// Only the instance's trigger marks are written; parameters, state and
/// progress are left for the gate to update.
pub fn evaluate<'t>(table: &'t FlatStateTable, ctx: &mut InstanceContext) -> Evaluation<'t> {
    let InstanceContext {
        current_state,
        elapsed,
        ref parameters,
        ref mut consumed_triggers,
        ..
    } = *ctx;
    evaluate_state(table, current_state, elapsed, parameters, consumed_triggers)
}

/// Evaluation over explicit inputs, for callers that keep instance data in their own layout
pub fn evaluate_state<'t>(
    table: &'t FlatStateTable,
    current: StateIndex,
    progress: f32,
    parameters: &ParameterBuffer,
    marks: &mut TriggerMarks,
) -> Evaluation<'t> {
    let candidate = |source, transitions: &'t [Transition], marks: &mut TriggerMarks| {
        first_match(transitions, progress, parameters, marks).map(|(index, transition)| {
            MatchedTransition {
                source,
                index,
                transition,
            }
        })
    };

    if let Some(matched) = candidate(TransitionSource::AnyState, table.any_state_transitions(), marks) {
        return Evaluation::Matched(matched);
    }

    let leaf = table.state(current);
    if let Some(matched) = candidate(TransitionSource::Local(current), &leaf.transitions, marks) {
        return Evaluation::Matched(matched);
    }

    if let Some(group) = leaf.exit_group {
        let transitions = &table.exit_group(group).transitions;
        if let Some(matched) = candidate(TransitionSource::Exit(group), transitions, marks) {
            return Evaluation::Matched(matched);
        }
    }

    Evaluation::NoMatch
}

#[inline]
fn first_match<'t>(
    transitions: &'t [Transition],
    progress: f32,
    parameters: &ParameterBuffer,
    marks: &mut TriggerMarks,
) -> Option<(usize, &'t Transition)> {
    transitions.iter().enumerate().find(|(_, transition)| {
        transition.gate_open(progress) && all_hold(&transition.conditions, parameters, marks)
    })
}
