//! Transition execution gate
//!
//! Applies a matched transition to an instance, advances playback on ticks
//! without a match and runs the end-of-tick trigger reset.

use crate::instance::InstanceContext;
use crate::table::{FlatStateTable, StateIndex, Transition};

/// Crossfade bookkeeping handed to the pose sampler
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PendingBlend {
    pub from: StateIndex,
    pub to: StateIndex,
    /// Seconds since the transition fired
    pub elapsed: f32,
    /// Seconds
    pub duration: f32,
}

impl PendingBlend {
    /// Weight of the destination state, 0 at the start of the blend and 1 once complete
    pub fn weight(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Blend length in seconds. Proportional durations scale with the source state's length.
pub fn blend_seconds(table: &FlatStateTable, transition: &Transition, source: StateIndex) -> f32 {
    if transition.fixed_duration {
        transition.blend_duration
    } else {
        transition.blend_duration * table.state(source).motion.duration
    }
}

/// Fire a transition: start the blend, move to the destination and restart
/// progress at the transition's start offset. A self-transition goes through
/// the same path and so restarts the current state.
pub fn apply(table: &FlatStateTable, transition: &Transition, ctx: &mut InstanceContext) {
    let from = ctx.current_state;
    let to = transition.destination;
    ctx.pending_blend = Some(PendingBlend {
        from,
        to,
        elapsed: 0.0,
        duration: blend_seconds(table, transition, from),
    });
    ctx.current_state = to;
    ctx.elapsed = transition.start_offset;
}

/// Advance playback by `dt` seconds on a tick where nothing matched
pub fn advance(table: &FlatStateTable, ctx: &mut InstanceContext, dt: f32) {
    let motion = &table.state(ctx.current_state).motion;
    ctx.elapsed += dt * motion.normalized_rate();

    if let Some(blend) = ctx.pending_blend.as_mut() {
        blend.elapsed += dt;
    }
    if ctx.pending_blend.is_some_and(|blend| blend.is_complete()) {
        ctx.pending_blend = None;
    }
}

/// End-of-tick pass: clear every trigger read as set during the tick, once.
/// Returns how many triggers were reset.
pub fn reset_triggers(ctx: &mut InstanceContext) -> usize {
    let InstanceContext {
        ref mut parameters,
        ref mut consumed_triggers,
        ..
    } = *ctx;
    consumed_triggers.reset(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::config::CompilerConfig;
    use crate::graph::{AuthoredLeaf, AuthoredTransition, GraphBuilder};

    fn table() -> FlatStateTable {
        let graph = GraphBuilder::new()
            .trigger("jump")
            .node(
                AuthoredLeaf::clip("a", 0, 2.0)
                    .with_transition(AuthoredTransition::to("b").blend(0.5).start_at(0.25))
                    .with_transition(AuthoredTransition::to("b").proportional_blend(0.25))
                    .with_transition(AuthoredTransition::to("a").blend(0.2)),
            )
            .node(AuthoredLeaf::new("b", crate::Motion::clip(1, 1.0).with_speed(2.0)))
            .build();
        compile(&graph, &CompilerConfig::default()).unwrap().table
    }

    #[test]
    fn apply_moves_and_starts_blend() {
        let table = table();
        let mut ctx = InstanceContext::new(&table);
        ctx.elapsed = 0.8;
        let transition = &table.state(StateIndex(0)).transitions[0];

        apply(&table, transition, &mut ctx);
        assert_eq!(ctx.current_state, StateIndex(1));
        assert_eq!(ctx.elapsed, 0.25);
        assert_eq!(
            ctx.pending_blend,
            Some(PendingBlend {
                from: StateIndex(0),
                to: StateIndex(1),
                elapsed: 0.0,
                duration: 0.5,
            })
        );
    }

    #[test]
    fn proportional_blend_uses_source_duration() {
        let table = table();
        let transition = &table.state(StateIndex(0)).transitions[1];
        assert_eq!(blend_seconds(&table, transition, StateIndex(0)), 0.5);
    }

    #[test]
    fn self_transition_restarts() {
        let table = table();
        let mut ctx = InstanceContext::new(&table);
        ctx.elapsed = 0.9;
        let transition = &table.state(StateIndex(0)).transitions[2];

        apply(&table, transition, &mut ctx);
        assert_eq!(ctx.current_state, StateIndex(0));
        assert_eq!(ctx.elapsed, 0.0);
        let blend = ctx.pending_blend.unwrap();
        assert_eq!((blend.from, blend.to, blend.duration), (StateIndex(0), StateIndex(0), 0.2));
    }

    #[test]
    fn advance_scales_progress_and_finishes_blend() {
        let table = table();
        let mut ctx = InstanceContext::new(&table);
        ctx.current_state = StateIndex(1);
        ctx.pending_blend = Some(PendingBlend {
            from: StateIndex(0),
            to: StateIndex(1),
            elapsed: 0.0,
            duration: 0.5,
        });

        advance(&table, &mut ctx, 0.25);
        assert_eq!(ctx.elapsed, 0.5);
        assert_eq!(ctx.pending_blend.unwrap().weight(), 0.5);

        advance(&table, &mut ctx, 0.25);
        assert_eq!(ctx.elapsed, 1.0);
        assert_eq!(ctx.pending_blend, None);
    }

    #[test]
    fn zero_length_blend_has_full_weight() {
        let blend = PendingBlend {
            from: StateIndex(0),
            to: StateIndex(1),
            elapsed: 0.0,
            duration: 0.0,
        };
        assert_eq!(blend.weight(), 1.0);
        assert!(blend.is_complete());
    }

    #[test]
    fn reset_clears_only_consumed_triggers() {
        let table = table();
        let mut ctx = InstanceContext::new(&table);
        let jump = table.parameters().index_of("jump").unwrap();
        ctx.parameters.set_trigger(jump).unwrap();

        assert_eq!(reset_triggers(&mut ctx), 0);
        assert!(ctx.parameters.is_trigger_set(jump));

        ctx.consumed_triggers.mark(jump);
        ctx.consumed_triggers.mark(jump);
        assert_eq!(reset_triggers(&mut ctx), 1);
        assert!(!ctx.parameters.is_trigger_set(jump));
    }
}
