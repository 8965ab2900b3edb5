//! Opening the service from a YAML config file.

use vs_app::{AppConfig, VariantService};
use vs_study::FileStudy;

#[test]
fn service_opens_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vs.yaml");
    let yaml = format!(
        "storage_root: {}\nmatrix_dir: {}\nhourly_rows: 48\n",
        dir.path().join("store").display(),
        dir.path().join("matrices").display()
    );
    std::fs::write(&path, yaml).unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert!(config.delete_on_failure);
    let service = VariantService::open(config).unwrap();
    assert!(dir.path().join("matrices").exists());

    let base = service.register_base(&FileStudy::empty(820, "cfg")).unwrap();
    let id = service.create_variant(&base, "v").unwrap();
    assert!(service.generate(&id, None).unwrap().success);
    assert_eq!(service.store().list_variants().unwrap().len(), 1);
}
