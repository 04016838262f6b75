//! Runtime driving many state machine instances over one shared table

use crate::config::RuntimeConfig;
use crate::evaluator::{evaluate, Evaluation, TransitionSource};
use crate::gate;
use crate::instance::InstanceContext;
use crate::parameters::{ParameterBuffer, ParameterValue};
use crate::table::{FlatStateTable, StateIndex};
use crate::{Error, Result};
use log::{info, trace};
use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;

/// Shared, swappable reference to the current compiled table.
///
/// Readers snapshot the inner `Arc` once per tick; publishing a rebuilt table
/// never disturbs a tick already in flight.
#[derive(Debug, Clone)]
pub struct TableHandle {
    current: Arc<RwLock<Arc<FlatStateTable>>>,
}

impl TableHandle {
    pub fn new(table: FlatStateTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    pub fn load(&self) -> Arc<FlatStateTable> {
        self.current.read().clone()
    }

    pub fn publish(&self, table: FlatStateTable) {
        info!(
            "Publishing state table: {} leaf states, {} exit groups",
            table.state_count(),
            table.exit_groups().len()
        );
        *self.current.write() = Arc::new(table);
    }
}

/// Generational handle to a spawned instance
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId {
    index: u32,
    generation: u32,
}

/// Result of stepping one instance for one tick
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StepOutcome {
    Stayed,
    Transitioned {
        source: TransitionSource,
        from: StateIndex,
        to: StateIndex,
    },
}

impl StepOutcome {
    pub fn is_transition(&self) -> bool {
        matches!(self, StepOutcome::Transitioned { .. })
    }
}

/// Summary of one runtime tick
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub evaluated: usize,
    pub transitions_taken: usize,
    pub triggers_reset: usize,
}

/// Evaluate and gate one instance.
///
/// Triggers read during the step stay set until [`finish_tick`] runs, so a
/// caller with its own scheduler must step every instance sharing the
/// parameter buffer before finishing the tick.
pub fn step(table: &FlatStateTable, ctx: &mut InstanceContext, dt: f32) -> StepOutcome {
    let from = ctx.current_state;
    match evaluate(table, ctx) {
        Evaluation::Matched(matched) => {
            gate::apply(table, matched.transition, ctx);
            trace!(
                "{} -> {} via {:?}",
                table.state(from).name,
                table.state(ctx.current_state).name,
                matched.source
            );
            StepOutcome::Transitioned {
                source: matched.source,
                from,
                to: matched.transition.destination,
            }
        }
        Evaluation::NoMatch => {
            gate::advance(table, ctx, dt);
            StepOutcome::Stayed
        }
    }
}

/// Trigger-reset pass, run after every instance has been stepped
pub fn finish_tick(ctx: &mut InstanceContext) -> usize {
    gate::reset_triggers(ctx)
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    context: Option<InstanceContext>,
}

/// Owns a set of instances and ticks them against the published table
pub struct StateMachineRuntime {
    handle: TableHandle,
    bound: Arc<FlatStateTable>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    pool: Option<rayon::ThreadPool>,
    config: RuntimeConfig,
    tick_count: u64,
}

impl StateMachineRuntime {
    pub fn new(handle: TableHandle, config: RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let pool = match config.worker_threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("helio-state-machine-{}", i))
                    .build()
                    .map_err(|e| Error::Config(format!("failed to build worker pool: {}", e)))?,
            ),
            None => None,
        };

        let bound = handle.load();
        info!(
            "State machine runtime ready: {} leaf states, parallel threshold {}, {} workers",
            bound.state_count(),
            config.parallel_threshold,
            config
                .worker_threads
                .map_or_else(|| "global".to_string(), |n| n.to_string())
        );

        Ok(Self {
            handle,
            bound,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            pool,
            config,
            tick_count: 0,
        })
    }

    pub fn with_table(table: FlatStateTable, config: RuntimeConfig) -> Result<Self> {
        Self::new(TableHandle::new(table), config)
    }

    pub fn handle(&self) -> &TableHandle {
        &self.handle
    }

    /// Table the instances are currently bound to
    pub fn table(&self) -> &Arc<FlatStateTable> {
        &self.bound
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn spawn(&mut self) -> InstanceId {
        let context = InstanceContext::new(&self.bound);
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.context = Some(context);
            return InstanceId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            context: Some(context),
        });
        InstanceId { index, generation: 0 }
    }

    /// Remove an instance, returning its final context. Stale ids return `None`.
    pub fn despawn(&mut self, id: InstanceId) -> Option<InstanceContext> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let context = slot.context.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(context)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&InstanceContext> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.context.as_ref())
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut InstanceContext> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.context.as_mut())
    }

    pub fn parameters_mut(&mut self, id: InstanceId) -> Option<&mut ParameterBuffer> {
        self.instance_mut(id).map(|ctx| &mut ctx.parameters)
    }

    /// Write a parameter by name, resolved through the bound table
    pub fn set_parameter(&mut self, id: InstanceId, name: &str, value: ParameterValue) -> Result<()> {
        let Self {
            ref bound,
            ref mut slots,
            ..
        } = *self;
        let ctx = slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.context.as_mut())
            .ok_or_else(|| Error::Parameter(format!("no live instance {:?}", id)))?;
        ctx.parameters.set_named(bound.parameters(), name, value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &InstanceContext)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.context.as_ref().map(|ctx| {
                (
                    InstanceId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    ctx,
                )
            })
        })
    }

    /// Publish a rebuilt table and rebind every live instance to it now
    pub fn swap_table(&mut self, table: FlatStateTable) {
        self.handle.publish(table);
        self.sync_table();
    }

    /// Advance every live instance by `dt` seconds.
    ///
    /// All instances are evaluated against one table snapshot. Trigger resets
    /// run only after every instance has been stepped.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        self.sync_table();
        self.tick_count += 1;

        let Self {
            ref bound,
            ref mut slots,
            ref pool,
            ref config,
            live,
            tick_count,
            ..
        } = *self;
        let table: &FlatStateTable = bound;
        let parallel = live >= config.parallel_threshold.max(1);

        let transitions_taken = match pool {
            Some(pool) if parallel => pool.install(|| step_all(table, &mut slots[..], dt, true)),
            _ => step_all(table, slots, dt, parallel),
        };

        let triggers_reset = slots
            .iter_mut()
            .filter_map(|slot| slot.context.as_mut())
            .map(finish_tick)
            .sum();

        let report = TickReport {
            tick: tick_count,
            evaluated: live,
            transitions_taken,
            triggers_reset,
        };
        trace!(
            "Tick {}: {} instances, {} transitions, {} triggers reset",
            report.tick,
            report.evaluated,
            report.transitions_taken,
            report.triggers_reset
        );
        report
    }

    fn sync_table(&mut self) {
        let latest = self.handle.load();
        if Arc::ptr_eq(&latest, &self.bound) {
            return;
        }

        let old = std::mem::replace(&mut self.bound, latest);
        for ctx in self.slots.iter_mut().filter_map(|slot| slot.context.as_mut()) {
            ctx.rebind(&old, &self.bound);
        }
        info!("Rebound {} instances to the new state table", self.live);
    }
}

fn step_all(table: &FlatStateTable, slots: &mut [Slot], dt: f32, parallel: bool) -> usize {
    if parallel {
        slots
            .par_iter_mut()
            .filter_map(|slot| slot.context.as_mut())
            .map(|ctx| step(table, ctx, dt))
            .filter(StepOutcome::is_transition)
            .count()
    } else {
        slots
            .iter_mut()
            .filter_map(|slot| slot.context.as_mut())
            .map(|ctx| step(table, ctx, dt))
            .filter(StepOutcome::is_transition)
            .count()
    }
}
