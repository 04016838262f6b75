//! State machine demo
//!
//! Compiles a small locomotion graph with a nested combat group, spawns a
//! crowd of instances and ticks them on the worker pool, poking parameters
//! along the way. Run with `RUST_LOG=trace` to see every transition.

use helio_state_machine::{
    compile, AuthoredGroup, AuthoredLeaf, AuthoredTransition, Comparison, CompilerConfig, GraphBuilder,
    ParameterValue, RuntimeConfig, StateMachineRuntime,
};
use std::collections::BTreeMap;

const INSTANCES: usize = 512;
const FRAME: f32 = 1.0 / 60.0;

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> helio_state_machine::Result<()> {
    let graph = GraphBuilder::new()
        .float_parameter("speed", 0.0)
        .bool_parameter("armed", false)
        .bool_parameter("died", false)
        .int_parameter("combo", 0)
        .trigger("attack")
        .node(
            AuthoredLeaf::clip("idle", 0, 2.0)
                .with_transition(AuthoredTransition::to("run").when("speed", Comparison::FloatGreater(0.5)).blend(0.2))
                .with_transition(AuthoredTransition::to("combat").when_bool("armed", true).proportional_blend(0.1)),
        )
        .node(
            AuthoredLeaf::blend_tree("run", 0, 0.8)
                .with_transition(AuthoredTransition::to("idle").when("speed", Comparison::FloatLess(0.5)).blend(0.2)),
        )
        .node(
            AuthoredGroup::new("combat", "guard")
                .with_node(
                    AuthoredLeaf::clip("guard", 1, 1.0)
                        .with_transition(AuthoredTransition::to("slash").when_trigger("attack").blend(0.05)),
                )
                .with_node(
                    AuthoredLeaf::clip("slash", 2, 0.6)
                        .with_transition(
                            AuthoredTransition::to("finisher")
                                .when_trigger("attack")
                                .when("combo", Comparison::IntEquals(2))
                                .after(0.5),
                        )
                        .with_transition(AuthoredTransition::to("guard").after(1.0).blend(0.1)),
                )
                .with_node(AuthoredLeaf::clip("finisher", 3, 1.2).with_transition(AuthoredTransition::to("guard").after(1.0)))
                .exit_node("guard")
                .exit_transition(AuthoredTransition::to("idle").when_bool("armed", false).blend(0.3)),
        )
        .node(AuthoredLeaf::clip("death", 4, 3.0))
        .any_state(AuthoredTransition::to("death").when_bool("died", true).blend(0.1))
        .default_state("idle")
        .build();

    let output = compile(&graph, &CompilerConfig::default())?;
    for diagnostic in &output.diagnostics {
        log::info!("{}", diagnostic);
    }

    let config = RuntimeConfig {
        worker_threads: Some(4),
        ..RuntimeConfig::default()
    };
    let mut runtime = StateMachineRuntime::with_table(output.table, config)?;
    let ids: Vec<_> = (0..INSTANCES).map(|_| runtime.spawn()).collect();

    for frame in 0..600usize {
        for (i, id) in ids.iter().enumerate() {
            let phase = (frame + i * 7) % 240;
            runtime.set_parameter(*id, "speed", ParameterValue::Float(if phase < 120 { 1.0 } else { 0.0 }))?;
            runtime.set_parameter(*id, "armed", ParameterValue::Bool(i % 3 == 0 && phase >= 120))?;
            runtime.set_parameter(*id, "combo", ParameterValue::Int((phase / 20 % 3) as i32))?;
            if phase % 15 == 0 {
                runtime.set_parameter(*id, "attack", ParameterValue::Trigger(true))?;
            }
            if frame == 500 && i % 64 == 0 {
                runtime.set_parameter(*id, "died", ParameterValue::Bool(true))?;
            }
        }

        let report = runtime.tick(FRAME);
        if frame % 120 == 0 {
            log::info!(
                "frame {}: {} transitions, {} triggers reset",
                frame,
                report.transitions_taken,
                report.triggers_reset
            );
        }
    }

    let table = runtime.table().clone();
    let mut census = BTreeMap::new();
    for (_, ctx) in runtime.iter() {
        *census.entry(table.state(ctx.current_state).name.as_str()).or_insert(0usize) += 1;
    }
    for (state, count) in census {
        log::info!("{:>10}: {}", state, count);
    }

    Ok(())
}
