use forecast_property::data::{DataLoader, PropertyRecord};
use forecast_property::error::ForecastError;
use forecast_property::growth::GrowthRateTable;
use forecast_property::store::ModelStore;
use forecast_property::training;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_transactions(dir: &Path) -> PathBuf {
    let path = dir.join("transactions.csv");
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "Size,No_of_BHK,City_name,Property_type,Price").unwrap();
    for i in 0..20 {
        let size = 500 + 100 * i;
        let city = if i % 2 == 0 { "Mumbai" } else { "Delhi" };
        let price = size * 5_000 + if i % 2 == 0 { 1_000_000 } else { 0 };
        writeln!(file, "{},2,{},Apartment,{}", size, city, price).unwrap();
    }
    path
}

fn sample_growth() -> GrowthRateTable {
    let mut rates = BTreeMap::new();
    rates.insert("Mumbai".to_string(), 0.1);
    GrowthRateTable::from_parts(rates, Some(0.05))
}

fn trained_bundle(dir: &Path) -> forecast_property::store::ModelBundle {
    let data = DataLoader::from_csv(write_transactions(dir)).unwrap();
    training::train(&data, &sample_growth()).unwrap()
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(dir.path().join("models"));
    let bundle = trained_bundle(dir.path());

    assert!(!store.exists());
    store.save(&bundle).unwrap();
    assert!(store.exists());

    let loaded = store.load().unwrap();

    // Functionally equivalent artifacts: identical predictions on a probe
    let probe = PropertyRecord::new("Apartment", 1234.0, "Mumbai", 2).unwrap();
    assert_eq!(
        bundle.pipeline.predict(&probe).unwrap(),
        loaded.pipeline.predict(&probe).unwrap()
    );
    assert_eq!(bundle.knn, loaded.knn);
    assert_eq!(bundle.knn_features, loaded.knn_features);
    assert_eq!(bundle.growth, loaded.growth);
    assert_eq!(
        bundle.training_data.prices().unwrap(),
        loaded.training_data.prices().unwrap()
    );
}

#[test]
fn test_load_from_empty_store_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(dir.path().join("models"));

    let err = store.load().unwrap_err();
    match err {
        ForecastError::ModelNotFound(msg) => assert!(msg.contains("price_pipeline.json")),
        other => panic!("expected ModelNotFound, got {:?}", other),
    }
}

#[test]
fn test_partial_bundle_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(dir.path().join("models"));
    let bundle = trained_bundle(dir.path());
    store.save(&bundle).unwrap();

    fs::remove_file(store.dir().join("knn_model.json")).unwrap();

    assert!(!store.exists());
    let err = store.load().unwrap_err();
    match err {
        ForecastError::ModelNotFound(msg) => assert!(msg.contains("knn_model.json")),
        other => panic!("expected ModelNotFound, got {:?}", other),
    }
}

#[test]
fn test_garbage_artifact_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(dir.path().join("models"));
    let bundle = trained_bundle(dir.path());
    store.save(&bundle).unwrap();

    fs::write(store.dir().join("price_pipeline.json"), b"not json at all").unwrap();

    let err = store.load().unwrap_err();
    assert!(matches!(err, ForecastError::ModelCorrupt(_)));
}

#[test]
fn test_schema_version_mismatch_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(dir.path().join("models"));
    let bundle = trained_bundle(dir.path());
    store.save(&bundle).unwrap();

    // Rewrite the pipeline artifact as if an older build had written it
    let path = store.dir().join("price_pipeline.json");
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    value["schema_version"] = serde_json::json!(0);
    fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

    let err = store.load().unwrap_err();
    match err {
        ForecastError::ModelCorrupt(msg) => assert!(msg.contains("schema version")),
        other => panic!("expected ModelCorrupt, got {:?}", other),
    }
}

#[test]
fn test_save_overwrites_wholesale() {
    let dir = TempDir::new().unwrap();
    let store = ModelStore::new(dir.path().join("models"));
    let bundle = trained_bundle(dir.path());

    store.save(&bundle).unwrap();
    store.save(&bundle).unwrap();

    assert!(store.exists());
    store.load().unwrap();

    // No stray temp files left behind
    let leftovers: Vec<_> = fs::read_dir(store.dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
