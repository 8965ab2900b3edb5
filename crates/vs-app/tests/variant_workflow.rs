//! Variant lifecycle through the service layer.

use serde_json::json;
use std::sync::Arc;
use vs_app::{AppConfig, AppError, GenerationEvent, VariantService};
use vs_commands::{CommandDTO, CommandName};
use vs_matrix::{InMemoryMatrixStore, MatrixService};
use vs_study::{FileStudy, FileTree, StudyConfig, parse_path};

fn service(dir: &tempfile::TempDir) -> VariantService {
    let config = AppConfig {
        storage_root: dir.path().join("variants"),
        matrix_dir: dir.path().join("matrices"),
        hourly_rows: 24,
        ..AppConfig::default()
    };
    VariantService::new(config, Arc::new(InMemoryMatrixStore::new())).unwrap()
}

fn dtos(value: serde_json::Value) -> Vec<CommandDTO> {
    serde_json::from_value(value).unwrap()
}

fn grid() -> Vec<CommandDTO> {
    dtos(json!([
        {"action": "create_area", "args": [{"area_name": "A"}, {"area_name": "B"}, {"area_name": "C"}]},
        {"action": "create_link", "args": {"area1": "A", "area2": "B", "series": [[0.0]]}},
        {"action": "create_cluster", "args": {"area_id": "a", "cluster_name": "ccgt"}},
        {"action": "update_config", "args": {"target": "settings/generaldata/general/nbyears", "data": 10}}
    ]))
}

fn variant(service: &VariantService) -> String {
    let base = service.register_base(&FileStudy::empty(820, "base")).unwrap();
    service.create_variant(&base, "v").unwrap()
}

#[test]
fn generation_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(&dir);
    let base = service.register_base(&FileStudy::empty(820, "base")).unwrap();
    let first = service.create_variant(&base, "one").unwrap();
    let second = service.create_variant(&base, "two").unwrap();
    service.append_commands(&first, &grid()).unwrap();
    service.append_commands(&second, &grid()).unwrap();

    assert!(service.generate(&first, None).unwrap().success);
    assert!(service.generate(&second, None).unwrap().success);
    let (a, b) = (
        service.snapshot(&first).unwrap(),
        service.snapshot(&second).unwrap(),
    );
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(StudyConfig::from_tree(&a.tree).unwrap(), a.config);
}

#[test]
fn incremental_generation_matches_a_full_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(&dir);
    let id = variant(&service);
    service.append_commands(&id, &grid()).unwrap();
    assert!(service.generate(&id, None).unwrap().success);

    service
        .append_commands(
            &id,
            &dtos(json!([
                {"action": "create_link", "args": {"area1": "b", "area2": "c"}},
                {"action": "remove_cluster", "args": {"area_id": "a", "cluster_id": "ccgt"}}
            ])),
        )
        .unwrap();
    let incremental = service.generate(&id, None).unwrap();
    assert!(incremental.success);
    assert_eq!(incremental.details.len(), 2);
    let incremental = service.snapshot(&id).unwrap().fingerprint();

    let full = service.regenerate(&id, None).unwrap();
    assert_eq!(full.details.len(), 8);
    assert_eq!(service.snapshot(&id).unwrap().fingerprint(), incremental);
}

#[test]
fn editing_history_forces_a_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(&dir);
    let id = variant(&service);
    let ids = service.append_commands(&id, &grid()).unwrap();
    assert!(service.generate(&id, None).unwrap().success);

    service.remove_command(&id, &ids[4]).unwrap();
    let result = service.generate(&id, None).unwrap();
    assert_eq!(result.details.len(), 5);
    let study = service.snapshot(&id).unwrap();
    assert!(study.config.areas["a"].thermals.is_empty());
}

#[test]
fn one_variant_never_generates_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(&dir);
    let id = variant(&service);
    service.append_commands(&id, &grid()).unwrap();

    let log = parking_lot::Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for worker in 0..2 {
            let (service, id, log) = (&service, &id, &log);
            scope.spawn(move || {
                let mut record = |_: GenerationEvent| log.lock().push(worker);
                let result = service.regenerate(id, Some(&mut record)).unwrap();
                assert!(result.success);
            });
        }
    });

    let log = log.into_inner();
    assert_eq!(log.len(), 12);
    assert!(log[..6].iter().all(|w| *w == log[0]));
    assert!(log[6..].iter().all(|w| *w == log[6]));
    assert_ne!(log[0], log[6]);
}

#[test]
fn cached_snapshot_never_lags_behind_a_finished_generation() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(&dir);
    let id = variant(&service);
    service.append_commands(&id, &grid()).unwrap();
    assert!(service.generate(&id, None).unwrap().success);

    let nbyears = "settings/generaldata/general/nbyears";
    std::thread::scope(|scope| {
        let (service, id) = (&service, &id);
        scope.spawn(move || {
            for years in 11..19 {
                let update = dtos(json!([
                    {"action": "update_config", "args": {"target": nbyears, "data": years}}
                ]));
                service.append_commands(id, &update).unwrap();
                assert!(service.generate(id, None).unwrap().success);
            }
        });
        for _ in 0..2 {
            scope.spawn(move || {
                for _ in 0..32 {
                    service.snapshot(id).unwrap();
                }
            });
        }
    });

    let (on_disk, _) = service.store().load_snapshot(&id).unwrap().unwrap();
    let served = service.snapshot(&id).unwrap();
    assert_eq!(served.fingerprint(), on_disk.fingerprint());
    assert_eq!(served.tree.get_json(&parse_path(nbyears)).unwrap(), json!(18));
}

#[test]
fn parallel_generation_of_different_variants_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(&dir);
    let base = service.register_base(&FileStudy::empty(820, "base")).unwrap();
    let ids: Vec<String> = (0..4)
        .map(|i| service.create_variant(&base, &format!("v{}", i)).unwrap())
        .collect();
    for id in &ids {
        service.append_commands(id, &grid()).unwrap();
    }

    let results = service.generate_many(&ids);
    assert_eq!(results.len(), 4);
    for (_, result) in &results {
        assert!(result.as_ref().unwrap().success);
    }
    let parallel: Vec<String> = ids
        .iter()
        .map(|id| service.snapshot(id).unwrap().fingerprint())
        .collect();

    for id in &ids {
        assert!(service.regenerate(id, None).unwrap().success);
    }
    let sequential: Vec<String> = ids
        .iter()
        .map(|id| service.snapshot(id).unwrap().fingerprint())
        .collect();
    assert_eq!(parallel, sequential);
}

#[test]
fn failing_generation_reports_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(&dir);
    let id = variant(&service);
    service
        .append_commands(
            &id,
            &dtos(json!([
                {"action": "create_area", "args": {"area_name": "A"}},
                {"action": "create_link", "args": {"area1": "A", "area2": "B"}}
            ])),
        )
        .unwrap();
    let result = service.generate(&id, None).unwrap();
    assert!(!result.success);
    let failure = result.failure().unwrap();
    assert_eq!(failure.name, CommandName::CreateLink);
    assert!(service.store().load_snapshot(&id).unwrap().is_none());
    assert!(matches!(service.snapshot(&id), Err(AppError::Command(_))));

    let outputs = service.dry_run(&id).unwrap();
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].status && !outputs[1].status);
}

#[test]
fn revert_uses_the_log_before_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(&dir);
    let id = variant(&service);
    let ids = service.append_commands(&id, &grid()).unwrap();
    let later = service
        .append_commands(
            &id,
            &dtos(json!([
                {"action": "update_config", "args": {"target": "settings/generaldata/general/nbyears", "data": 20}}
            ])),
        )
        .unwrap();

    let undo = service.revert_command(&id, &later[0]).unwrap();
    assert_eq!(
        undo,
        dtos(json!([
            {"action": "update_config", "args": {"target": "settings/generaldata/general/nbyears", "data": 10}}
        ]))
    );

    let undo_area = service.revert_command(&id, &ids[1]).unwrap();
    assert_eq!(undo_area[0].action, "remove_area");

    let err = service.revert_command(&id, "missing").unwrap_err();
    assert!(matches!(err, AppError::CommandNotFound(_)));
}

#[test]
fn diff_between_sibling_variants() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(&dir);
    let base = service.register_base(&FileStudy::empty(820, "base")).unwrap();
    let left = service.create_variant(&base, "left").unwrap();
    let right = service.create_variant(&base, "right").unwrap();
    service.append_commands(&left, &grid()).unwrap();
    let mut changed = grid();
    changed.pop();
    changed.extend(dtos(json!([
        {"action": "update_config", "args": {"target": "settings/generaldata/general/nbyears", "data": 3}}
    ])));
    service.append_commands(&right, &changed).unwrap();

    let outcome = service.diff_variants(&left, &right).unwrap();
    assert_eq!(outcome.commands.len(), 1);
    assert_eq!(outcome.commands[0].name(), CommandName::UpdateConfig);
}

#[test]
fn diff_collection_leaves_the_shared_store_alone() {
    let dir = tempfile::tempdir().unwrap();
    let matrices = InMemoryMatrixStore::new();
    let config = AppConfig {
        storage_root: dir.path().join("variants"),
        hourly_rows: 24,
        ..AppConfig::default()
    };
    let service = VariantService::new(config, Arc::new(matrices.clone())).unwrap();
    let base = service.register_base(&FileStudy::empty(820, "base")).unwrap();
    let left = service.create_variant(&base, "left").unwrap();
    let right = service.create_variant(&base, "right").unwrap();
    let area = dtos(json!([{"action": "create_area", "args": [{"area_name": "A"}, {"area_name": "B"}]}]));
    service.append_commands(&left, &area).unwrap();
    service.append_commands(&right, &area).unwrap();
    service
        .append_commands(
            &right,
            &dtos(json!([
                {"action": "create_link", "args": {"area1": "A", "area2": "B", "series": [[7.0]]}},
                {"action": "replace_matrix", "args": {"target": "input/links/a/b", "matrix": [[8.0]]}},
                {"action": "replace_matrix", "args": {"target": "input/links/a/b", "matrix": [[9.0]]}}
            ])),
        )
        .unwrap();

    let outcome = service.diff_variants(&left, &right).unwrap();
    assert_eq!(outcome.collected_matrices.len(), 1);
    let collected = &outcome.collected_matrices[0];
    assert!(matrices.exists(collected).unwrap());
    assert!(
        outcome
            .commands
            .iter()
            .all(|c| !c.get_inner_matrices().contains(collected))
    );
}
