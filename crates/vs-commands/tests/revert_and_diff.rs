//! Reverting through history and merging divergent histories.

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use vs_commands::command::{
    CreateArea, CreateBindingConstraint, CreateLink, RemoveArea, RemoveBindingConstraint,
    ReplaceMatrix, UpdateBindingConstraint, UpdateComments, UpdateConfig, UpdateScenarioBuilder,
};
use vs_commands::{
    BindingConstraintOperator, Command, CommandContext, CommandError, TimeStep, diff,
};
use vs_matrix::MatrixService;
use vs_study::{FileStudy, layout};

fn update_config(target: &str, data: serde_json::Value) -> Command {
    Command::UpdateConfig(UpdateConfig {
        target: target.to_string(),
        data,
    })
}

fn binding_update(coeffs: &[(&str, f64)]) -> Command {
    let coeffs: BTreeMap<String, Vec<f64>> = coeffs
        .iter()
        .map(|(term, value)| (term.to_string(), vec![*value]))
        .collect();
    Command::UpdateBindingConstraint(UpdateBindingConstraint {
        id: "cap".into(),
        enabled: true,
        time_step: TimeStep::Hourly,
        operator: BindingConstraintOperator::Less,
        coeffs,
        values: None,
        comments: None,
        filter_year_by_year: None,
        filter_synthesis: None,
    })
}

#[test]
fn history_takes_precedence_over_the_base_study() {
    let (ctx, _) = CommandContext::in_memory(24).unwrap();
    let base = FileStudy::empty(820, "base");
    let target = "settings/generaldata/general/nbyears";
    let history = vec![update_config(target, json!(2)), update_config(target, json!(7))];

    let undo = history[1].revert(&history[..1], &base, &ctx).unwrap();
    assert_eq!(undo, vec![update_config(target, json!(2))]);

    let from_base = history[0].revert(&[], &base, &ctx).unwrap();
    assert_eq!(from_base, vec![update_config(target, json!(1))]);
}

#[test]
fn same_target_updates_diff_to_the_later_one() {
    let first = binding_update(&[("a%b", 1.0)]);
    let second = binding_update(&[("a%b", 2.0), ("a%c", -1.0)]);
    assert_eq!(first.create_diff(&second), vec![second.clone()]);
}

#[test]
fn superseded_matrix_is_collected() {
    let (ctx, store) = CommandContext::in_memory(24).unwrap();
    let base_study = FileStudy::empty(820, "base");
    let old = ctx.matrix_service.create(&vec![vec![1.0, 2.0]]).unwrap();
    let new = ctx.matrix_service.create(&vec![vec![3.0, 4.0]]).unwrap();
    let target = "input/load/series/load_a";
    let variant = vec![
        Command::ReplaceMatrix(ReplaceMatrix {
            target: target.into(),
            matrix: old.clone(),
        }),
        Command::ReplaceMatrix(ReplaceMatrix {
            target: target.into(),
            matrix: new.clone(),
        }),
    ];

    let scratch = store.snapshot();
    let outcome = diff(&[], &variant, &base_study, &ctx, &scratch).unwrap();

    assert_eq!(outcome.commands, vec![variant[1].clone()]);
    assert_eq!(outcome.collected_matrices, vec![old.clone()]);
    assert!(
        outcome
            .commands
            .iter()
            .all(|c| !c.get_inner_matrices().contains(&old))
    );
    assert!(!scratch.exists(&old).unwrap());
    assert!(scratch.exists(&new).unwrap());
    // the live store is untouched
    assert!(store.exists(&old).unwrap());
}

#[test]
fn base_only_targets_are_undone_newest_first() {
    let (ctx, store) = CommandContext::in_memory(24).unwrap();
    let base_study = FileStudy::empty(820, "base");
    let base = vec![
        Command::CreateArea(CreateArea::new("a")),
        Command::CreateArea(CreateArea::new("b")),
        update_config("settings/generaldata/general/nbyears", json!(4)),
    ];
    let variant = vec![Command::CreateArea(CreateArea::new("a"))];

    let outcome = diff(&base, &variant, &base_study, &ctx, &store.snapshot()).unwrap();
    assert_eq!(
        outcome.commands,
        vec![
            update_config("settings/generaldata/general/nbyears", json!(1)),
            Command::RemoveArea(RemoveArea::new("b")),
        ]
    );
}

#[test]
fn shared_binding_constraint_becomes_an_update() {
    let (ctx, store) = CommandContext::in_memory(24).unwrap();
    let base_study = FileStudy::empty(820, "base");
    let mut create = CreateBindingConstraint::new(
        "cap",
        TimeStep::Hourly,
        BindingConstraintOperator::Less,
        BTreeMap::from([("a%b".to_string(), vec![1.0])]),
    );
    create.values = Some(ctx.constants.binding_hourly.clone());
    let mut changed = create.clone();
    changed.operator = BindingConstraintOperator::Greater;

    let outcome = diff(
        &[Command::CreateBindingConstraint(create)],
        &[Command::CreateBindingConstraint(changed)],
        &base_study,
        &ctx,
        &store.snapshot(),
    )
    .unwrap();
    assert_eq!(outcome.commands.len(), 1);
    let Command::UpdateBindingConstraint(update) = &outcome.commands[0] else {
        panic!("expected an update, got {:?}", outcome.commands);
    };
    assert_eq!(update.operator, BindingConstraintOperator::Greater);
    assert_eq!(update.values, None);
}

#[test]
fn removal_in_base_only_cannot_be_diffed() {
    let (ctx, store) = CommandContext::in_memory(24).unwrap();
    let base_study = FileStudy::empty(820, "base");
    let base = vec![Command::RemoveArea(RemoveArea::new("x"))];
    let err = diff(&base, &[], &base_study, &ctx, &store.snapshot()).unwrap_err();
    assert!(matches!(err, CommandError::RevertUnsupported { .. }));
}

const NB_YEARS: &str = "settings/generaldata/general/nbyears";
const SIMULATION_END: &str = "settings/generaldata/general/simulation.end";

fn replay(start: &FileStudy, commands: &[Command], ctx: &CommandContext) -> FileStudy {
    let mut study = start.clone();
    for command in commands {
        let out = command.apply(&mut study, ctx);
        assert!(out.status, "{}: {}", command.name(), out.message);
    }
    study
}

fn constraint(name: &str, values: Option<String>) -> Command {
    let mut create = CreateBindingConstraint::new(
        name,
        TimeStep::Hourly,
        BindingConstraintOperator::Less,
        BTreeMap::from([("a%b".to_string(), vec![1.0])]),
    );
    create.values = values;
    Command::CreateBindingConstraint(create)
}

fn constraint_update(id: &str, operator: BindingConstraintOperator, values: Option<String>) -> Command {
    Command::UpdateBindingConstraint(UpdateBindingConstraint {
        id: id.into(),
        enabled: true,
        time_step: TimeStep::Hourly,
        operator,
        coeffs: BTreeMap::from([("a%b".to_string(), vec![1.0])]),
        values,
        comments: None,
        filter_year_by_year: None,
        filter_synthesis: None,
    })
}

fn rule(key: &str, value: Option<u8>) -> Command {
    let mut rules = Map::new();
    rules.insert(key.to_string(), value.map_or(Value::Null, |v| json!(v)));
    let mut data = Map::new();
    data.insert("Default Ruleset".to_string(), Value::Object(rules));
    Command::UpdateScenarioBuilder(UpdateScenarioBuilder { data })
}

/// Two linked areas and a constraint `bc` on the link.
struct Fixture {
    ctx: CommandContext,
    store: vs_matrix::InMemoryMatrixStore,
    study: FileStudy,
    matrices: Vec<String>,
}

impl Fixture {
    fn new() -> Self {
        let (ctx, store) = CommandContext::in_memory(24).unwrap();
        let matrices: Vec<String> = (0..4)
            .map(|k| ctx.matrix_service.create(&vec![vec![k as f64; 3]; 24]).unwrap())
            .collect();
        let setup = vec![
            Command::CreateArea(CreateArea::new("a")),
            Command::CreateArea(CreateArea::new("b")),
            Command::CreateLink(CreateLink::new("a", "b")),
            constraint("bc", Some(matrices[0].clone())),
        ];
        let study = replay(&FileStudy::empty(820, "base"), &setup, &ctx);
        Self {
            ctx,
            store,
            study,
            matrices,
        }
    }

    /// Fingerprints of the variant applied to the base study, and of the diff
    /// applied to the base result.
    fn outcomes(&self, base: &[Command], variant: &[Command]) -> (String, String, Vec<Command>) {
        let expected = replay(&self.study, variant, &self.ctx);
        let base_result = replay(&self.study, base, &self.ctx);
        let outcome = diff(base, variant, &self.study, &self.ctx, &self.store.snapshot()).unwrap();
        let merged = replay(&base_result, &outcome.commands, &self.ctx);
        (expected.fingerprint(), merged.fingerprint(), outcome.commands)
    }
}

#[test]
fn scenario_builder_patches_survive_the_diff() {
    let fixture = Fixture::new();
    let variant = vec![rule("l,a,0", Some(1)), rule("l,b,0", Some(2))];
    let (expected, merged, commands) = fixture.outcomes(&[], &variant);
    assert_eq!(commands, variant);
    assert_eq!(merged, expected);
}

#[test]
fn recreated_constraint_keeps_its_new_series() {
    let fixture = Fixture::new();
    let m = &fixture.matrices;
    let variant = vec![
        constraint("peak", Some(m[1].clone())),
        constraint_update("peak", BindingConstraintOperator::Less, Some(m[2].clone())),
        Command::RemoveBindingConstraint(RemoveBindingConstraint { id: "peak".into() }),
        constraint("peak", Some(m[1].clone())),
        constraint_update("peak", BindingConstraintOperator::Greater, None),
    ];
    let (expected, merged, commands) = fixture.outcomes(&[], &variant);
    let Some(Command::UpdateBindingConstraint(last)) = commands.last() else {
        panic!("expected a trailing update, got {:?}", commands);
    };
    assert_eq!(last.values, None);
    assert_eq!(merged, expected);
}

#[test]
fn target_rewritten_back_to_the_base_value_is_replayed() {
    let fixture = Fixture::new();
    let base = vec![update_config(NB_YEARS, json!(5))];
    let variant = vec![update_config(NB_YEARS, json!(7)), update_config(NB_YEARS, json!(5))];
    let (expected, merged, commands) = fixture.outcomes(&base, &variant);
    assert_eq!(commands, vec![update_config(NB_YEARS, json!(5))]);
    assert_eq!(merged, expected);
}

#[derive(Debug, Clone)]
enum Edit {
    Years(u8),
    SimulationEnd(u16),
    LinkSeries(usize),
    ConstraintSeries(usize),
    Comments(u8),
    Rule(u8, Option<u8>),
    Operator(bool),
}

impl Edit {
    fn command(&self, matrices: &[String]) -> Command {
        match self {
            Edit::Years(n) => update_config(NB_YEARS, json!(n)),
            Edit::SimulationEnd(n) => update_config(SIMULATION_END, json!(n)),
            Edit::LinkSeries(i) => Command::ReplaceMatrix(ReplaceMatrix {
                target: layout::link_series("a", "b"),
                matrix: matrices[*i].clone(),
            }),
            Edit::ConstraintSeries(i) => Command::ReplaceMatrix(ReplaceMatrix {
                target: layout::binding_constraint_series("bc"),
                matrix: matrices[*i].clone(),
            }),
            Edit::Comments(k) => Command::UpdateComments(UpdateComments {
                comments: format!("revision {}", k),
            }),
            Edit::Rule(k, value) => rule(&format!("l,a,{}", k), *value),
            Edit::Operator(greater) => {
                let operator = if *greater {
                    BindingConstraintOperator::Greater
                } else {
                    BindingConstraintOperator::Less
                };
                constraint_update("bc", operator, None)
            }
        }
    }
}

fn shared_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (1u8..4).prop_map(Edit::Years),
        (300u16..303).prop_map(Edit::SimulationEnd),
        (0usize..4).prop_map(Edit::LinkSeries),
        (0usize..4).prop_map(Edit::ConstraintSeries),
        (0u8..3).prop_map(Edit::Comments),
    ]
}

fn variant_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => shared_edit(),
        1 => (0u8..3, prop::option::of(1u8..3)).prop_map(|(k, v)| Edit::Rule(k, v)),
        1 => any::<bool>().prop_map(Edit::Operator),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn diff_turns_the_base_result_into_the_variant_result(
        base_edits in prop::collection::vec(shared_edit(), 0..8),
        variant_edits in prop::collection::vec(variant_edit(), 0..8),
        rebuild_at in prop::option::of(0usize..9),
    ) {
        let fixture = Fixture::new();
        let m = &fixture.matrices;
        let base: Vec<Command> = base_edits.iter().map(|e| e.command(m)).collect();
        let mut variant: Vec<Command> = variant_edits.iter().map(|e| e.command(m)).collect();
        if let Some(at) = rebuild_at {
            let run = [
                constraint("peak", Some(m[1].clone())),
                constraint_update("peak", BindingConstraintOperator::Less, Some(m[2].clone())),
                Command::RemoveBindingConstraint(RemoveBindingConstraint { id: "peak".into() }),
                constraint("peak", Some(m[3].clone())),
                constraint_update("peak", BindingConstraintOperator::Greater, None),
            ];
            let at = at.min(variant.len());
            variant.splice(at..at, run);
        }

        let (expected, merged, _) = fixture.outcomes(&base, &variant);
        prop_assert_eq!(merged, expected);
    }
}
