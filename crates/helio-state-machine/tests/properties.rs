use helio_state_machine::condition::all_hold;
use helio_state_machine::{
    compile, evaluate, finish_tick, step, AuthoredGraph, AuthoredGroup, AuthoredLeaf, AuthoredTransition, Comparison,
    CompilerConfig, FlatStateTable, GraphBuilder, InstanceContext, ParameterValue, StateIndex, TransitionSource,
    TriggerMarks,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Shape {
    roots: usize,
    members: usize,
    exit_mask: Vec<bool>,
    edges: Vec<(usize, usize, u8, Option<f32>)>,
    exit_transitions: Vec<(usize, u8)>,
    any_state: Vec<(usize, u8)>,
}

impl Shape {
    fn leaf_name(&self, i: usize) -> String {
        if i < self.roots {
            format!("r{}", i)
        } else {
            format!("m{}", i - self.roots)
        }
    }

    fn target_name(&self, i: usize) -> String {
        if i == self.roots + self.members {
            "group".to_string()
        } else {
            self.leaf_name(i)
        }
    }

    fn transition(&self, to: usize, condition: u8, gate: Option<f32>) -> AuthoredTransition {
        let transition = AuthoredTransition::to(self.target_name(to)).blend(0.1);
        let transition = match condition {
            1 => transition.when_bool("flag", true),
            2 => transition.when_trigger("fire"),
            3 => transition.when("level", Comparison::IntEquals(0)),
            _ => transition,
        };
        match gate {
            Some(progress) => transition.after(progress),
            None => transition,
        }
    }

    fn leaf(&self, i: usize) -> AuthoredLeaf {
        self.edges
            .iter()
            .filter(|(from, ..)| *from == i)
            .fold(AuthoredLeaf::clip(self.leaf_name(i), i as u32, 1.0), |leaf, &(_, to, condition, gate)| {
                leaf.with_transition(self.transition(to, condition, gate))
            })
    }

    fn graph(&self) -> AuthoredGraph {
        let mut group = AuthoredGroup::new("group", self.leaf_name(self.roots));
        for i in self.roots..self.roots + self.members {
            group = group.with_node(self.leaf(i));
            if self.exit_mask[i - self.roots] {
                group = group.exit_node(self.leaf_name(i));
            }
        }
        for &(to, condition) in &self.exit_transitions {
            group = group.exit_transition(self.transition(to, condition, None));
        }

        let mut builder = GraphBuilder::new()
            .bool_parameter("flag", false)
            .int_parameter("level", 1)
            .trigger("fire");
        for i in 0..self.roots {
            builder = builder.node(self.leaf(i));
        }
        builder = builder.node(group);
        for &(to, condition) in &self.any_state {
            builder = builder.any_state(self.transition(to, condition, None));
        }
        builder.build()
    }
}

fn shape() -> impl Strategy<Value = Shape> {
    (2usize..6, 1usize..4)
        .prop_flat_map(|(roots, members)| {
            let leaves = roots + members;
            let targets = leaves + 1;
            let edge = (0..leaves, 0..targets, 0u8..4, proptest::option::of(0.0f32..1.0));
            (
                Just(roots),
                Just(members),
                proptest::collection::vec(any::<bool>(), members),
                proptest::collection::vec(edge, 0..12),
                proptest::collection::vec((0..targets, 0u8..4), 0..3),
                proptest::collection::vec((0..targets, 1u8..4), 0..3),
            )
        })
        .prop_map(|(roots, members, exit_mask, edges, exit_transitions, any_state)| Shape {
            roots,
            members,
            exit_mask,
            edges,
            exit_transitions,
            any_state,
        })
}

fn inputs() -> impl Strategy<Value = (usize, f32, bool, i32, bool)> {
    (0usize..16, 0.0f32..1.2, any::<bool>(), 0i32..2, any::<bool>())
}

fn compiled(shape: &Shape) -> FlatStateTable {
    compile(&shape.graph(), &CompilerConfig::default()).unwrap().table
}

fn context(table: &FlatStateTable, (state, progress, flag, level, fire): (usize, f32, bool, i32, bool)) -> InstanceContext {
    let mut ctx = InstanceContext::new(table);
    ctx.current_state = StateIndex((state % table.state_count()) as u32);
    ctx.elapsed = progress;
    let parameters = table.parameters();
    ctx.parameters.set_named(parameters, "flag", ParameterValue::Bool(flag)).unwrap();
    ctx.parameters.set_named(parameters, "level", ParameterValue::Int(level)).unwrap();
    ctx.parameters.set_named(parameters, "fire", ParameterValue::Trigger(fire)).unwrap();
    ctx
}

mod property_tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_compile_is_deterministic(shape in shape()) {
            let graph = shape.graph();
            let first = compile(&graph, &CompilerConfig::default()).unwrap().table;
            let second = compile(&graph, &CompilerConfig::default()).unwrap().table;
            prop_assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
        }

        #[test]
        fn prop_indices_resolve(shape in shape()) {
            let table = compiled(&shape);
            prop_assert!(table.validate().is_ok());
            prop_assert_eq!(table.state_count(), shape.roots + shape.members);
            for transition in table.all_transitions() {
                prop_assert!(transition.destination.get() < table.state_count());
            }
            for leaf in table.leaf_states() {
                if let Some(group) = leaf.exit_group {
                    prop_assert!(group.get() < table.exit_groups().len());
                }
            }
        }

        #[test]
        fn prop_exit_transitions_only_from_exit_leaves(shape in shape(), input in inputs()) {
            let table = compiled(&shape);
            let mut ctx = context(&table, input);
            let current = ctx.current_state;
            if let Some(matched) = evaluate(&table, &mut ctx).matched() {
                if let TransitionSource::Exit(group) = matched.source {
                    prop_assert_eq!(table.state(current).exit_group, Some(group));
                }
            }
        }

        #[test]
        fn prop_non_exit_member_ignores_group_exits(shape in shape(), member in 0usize..4, progress in 0.0f32..1.2) {
            let mut shape = shape;
            let member = member % shape.members;
            shape.exit_mask[member] = false;
            shape.exit_transitions.push((0, 3));
            let table = compiled(&shape);

            let current = table.state_index(&shape.leaf_name(shape.roots + member)).unwrap();
            let mut ctx = context(&table, (current.get(), progress, true, 0, true));
            prop_assert_eq!(ctx.current_state, current);
            prop_assert_eq!(table.state(current).exit_group, None);

            let source = evaluate(&table, &mut ctx).matched().map(|matched| matched.source);
            prop_assert!(!matches!(source, Some(TransitionSource::Exit(_))));
        }

        #[test]
        fn prop_exit_member_always_leaves(shape in shape(), member in 0usize..4, progress in 0.0f32..1.2) {
            let mut shape = shape;
            let member = member % shape.members;
            shape.exit_mask[member] = true;
            shape.exit_transitions.push((0, 3));
            let table = compiled(&shape);

            let current = table.state_index(&shape.leaf_name(shape.roots + member)).unwrap();
            let mut ctx = context(&table, (current.get(), progress, true, 0, true));
            prop_assert!(table.state(current).exit_group.is_some());
            prop_assert!(evaluate(&table, &mut ctx).matched().is_some());
        }

        #[test]
        fn prop_any_state_has_priority(shape in shape(), input in inputs()) {
            let table = compiled(&shape);
            let mut ctx = context(&table, input);
            let any_matches = table.any_state_transitions().iter().any(|transition| {
                let mut marks = TriggerMarks::new();
                transition.gate_open(ctx.elapsed) && all_hold(&transition.conditions, &ctx.parameters, &mut marks)
            });

            let evaluation = evaluate(&table, &mut ctx);
            let source = evaluation.matched().map(|matched| matched.source);
            if any_matches {
                prop_assert_eq!(source, Some(TransitionSource::AnyState));
            } else {
                prop_assert_ne!(source, Some(TransitionSource::AnyState));
            }
        }

        #[test]
        fn prop_trigger_resets_once(shape in shape(), input in inputs()) {
            let table = compiled(&shape);
            let mut ctx = context(&table, input);
            let fire = table.parameters().index_of("fire").unwrap();

            step(&table, &mut ctx, 0.016);
            let consumed = ctx.consumed_triggers().is_marked(fire);
            prop_assert!(!consumed || ctx.parameters.is_trigger_set(fire));

            let reset = finish_tick(&mut ctx);
            prop_assert_eq!(reset, consumed as usize);
            prop_assert_eq!(ctx.parameters.is_trigger_set(fire), input.4 && !consumed);
            prop_assert_eq!(finish_tick(&mut ctx), 0);
        }

        #[test]
        fn prop_gate_never_opens_early(shape in shape(), input in inputs()) {
            let table = compiled(&shape);
            let mut ctx = context(&table, input);
            let progress = ctx.elapsed;
            if let Some(matched) = evaluate(&table, &mut ctx).matched() {
                if let Some(gate) = matched.transition.end_time_gate {
                    prop_assert!(progress >= gate);
                }
            }
        }

        #[test]
        fn prop_playback_is_deterministic(shape in shape(), input in inputs(), ticks in 1usize..20) {
            let table = compiled(&shape);
            let mut a = context(&table, input);
            let mut b = context(&table, input);
            for _ in 0..ticks {
                let left = step(&table, &mut a, 0.05);
                let right = step(&table, &mut b, 0.05);
                prop_assert_eq!(left, right);
                finish_tick(&mut a);
                finish_tick(&mut b);
            }
            prop_assert_eq!(a, b);
        }
    }
}
