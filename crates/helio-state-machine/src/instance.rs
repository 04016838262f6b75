//! Per-instance mutable playback context

use crate::gate::PendingBlend;
use crate::parameters::{ParameterBuffer, TriggerMarks};
use crate::table::{FlatStateTable, StateIndex};

/// Everything one running instance owns. Never shared between instances.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceContext {
    pub current_state: StateIndex,
    /// Normalized progress through the current state; grows past 1.0 for looping playback
    pub elapsed: f32,
    pub parameters: ParameterBuffer,
    pub pending_blend: Option<PendingBlend>,
    pub(crate) consumed_triggers: TriggerMarks,
}

impl InstanceContext {
    /// Fresh instance in the table's default state with default parameters
    pub fn new(table: &FlatStateTable) -> Self {
        Self {
            current_state: table.default_state(),
            elapsed: 0.0,
            parameters: ParameterBuffer::new(table.parameters()),
            pending_blend: None,
            consumed_triggers: TriggerMarks::with_parameter_count(table.parameters().len()),
        }
    }

    /// Triggers read as set so far this tick
    pub fn consumed_triggers(&self) -> &TriggerMarks {
        &self.consumed_triggers
    }

    /// Move this instance onto a rebuilt table. The current state is looked up
    /// by name and playback continues if it still exists; otherwise the
    /// instance restarts in the new default state. In-flight blends are dropped
    /// because their indices belong to the old table.
    pub(crate) fn rebind(&mut self, old: &FlatStateTable, new: &FlatStateTable) {
        let name = &old.state(self.current_state).name;
        match new.state_index(name) {
            Some(state) => self.current_state = state,
            None => {
                self.current_state = new.default_state();
                self.elapsed = 0.0;
            }
        }
        self.parameters = self.parameters.rebind(old.parameters(), new.parameters());
        self.pending_blend = None;
        self.consumed_triggers = TriggerMarks::with_parameter_count(new.parameters().len());
    }
}
