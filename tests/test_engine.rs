use assert_approx_eq::assert_approx_eq;
use forecast_property::data::{PropertyRecord, LAND_PARCEL_TYPE};
use forecast_property::engine::{blend, ForecastEngine, ForecastRequest};
use forecast_property::error::ForecastError;
use forecast_property::growth::RateSource;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_transactions(dir: &Path) -> PathBuf {
    let path = dir.join("transactions.csv");
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "Size,No_of_BHK,City_name,Property_type,Price").unwrap();
    for i in 0..24 {
        let size = 500 + 100 * i;
        let (city, premium) = if i % 2 == 0 {
            ("Mumbai", 1_000_000)
        } else {
            ("Delhi", 0)
        };
        let property_type = if i % 6 == 5 {
            LAND_PARCEL_TYPE
        } else {
            "Apartment"
        };
        let bhk = if property_type == LAND_PARCEL_TYPE { 0 } else { 2 };
        writeln!(
            file,
            "{},{},{},{},{}",
            size,
            bhk,
            city,
            property_type,
            size * 5_000 + premium
        )
        .unwrap();
    }
    path
}

fn write_growth_index(dir: &Path) -> PathBuf {
    let path = dir.join("EC-20240829-IN-01.csv");
    let mut file = fs::File::create(&path).unwrap();
    // 5% national growth per quarter, 10% for Mumbai
    writeln!(file, "HPI,All India,Mumbai").unwrap();
    writeln!(file, "2023-Q1,100.0,100.0").unwrap();
    writeln!(file, "2023-Q2,105.0,110.0").unwrap();
    writeln!(file, "2023-Q3,110.25,121.0").unwrap();
    path
}

fn engine_in(dir: &Path) -> ForecastEngine {
    ForecastEngine::new(
        write_transactions(dir),
        write_growth_index(dir),
        dir.join("models"),
    )
}

#[test]
fn test_forecast_compounds_over_four_quarters() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(dir.path());

    let record = PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2).unwrap();
    let forecast = engine.forecast(record).unwrap();

    assert!(forecast.current_price > 0.0);
    assert_eq!(forecast.future_projections.len(), 4);

    let rate = forecast.quarterly_growth_rate / 100.0;
    assert_approx_eq!(rate, 0.1, 1e-9);

    // Compounding, not additive: q4/q1 == (1+rate)^3
    let ratio = forecast.projections.q4 / forecast.projections.q1;
    assert_approx_eq!(ratio, (1.0 + rate).powi(3), 1e-9);

    assert_approx_eq!(forecast.projections.q1, forecast.future_projections[0]);
    assert_approx_eq!(forecast.projections.q4, forecast.future_projections[3]);

    // Over exactly four compounding quarters the two ROI figures coincide
    assert_approx_eq!(
        forecast.roi.annualized_roi,
        ((1.0 + rate).powi(4) - 1.0) * 100.0,
        1e-9
    );
    assert_approx_eq!(forecast.roi.total_growth, forecast.roi.annualized_roi, 1e-6);
    assert_approx_eq!(forecast.roi.quarterly_growth, forecast.quarterly_growth_rate);
}

#[test]
fn test_growth_rate_source_provenance() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(dir.path());

    let mumbai = engine
        .forecast(PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2).unwrap())
        .unwrap();
    assert_eq!(mumbai.growth_rate_source, RateSource::CitySpecific);
    assert_approx_eq!(mumbai.quarterly_growth_rate, 10.0, 1e-6);

    let unseen = engine
        .forecast(PropertyRecord::new("Apartment", 1200.0, "Atlantis", 2).unwrap())
        .unwrap();
    assert_eq!(unseen.growth_rate_source, RateSource::National);
    assert_approx_eq!(unseen.quarterly_growth_rate, 5.0, 1e-6);
}

#[test]
fn test_missing_bundle_triggers_one_training_run() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(dir.path());
    assert!(!engine.store().exists());

    let record = PropertyRecord::new("Apartment", 1000.0, "Delhi", 1).unwrap();
    let forecast = engine.forecast(record).unwrap();

    assert!(engine.store().exists());
    assert!(forecast.current_price > 0.0);
}

#[test]
fn test_stale_pipeline_schema_recovers_by_one_retrain() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(dir.path());

    // First call trains and persists the bundle
    engine
        .forecast(PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2).unwrap())
        .unwrap();

    // Widen the persisted encoder schema so it no longer matches the
    // fitted forest, the shape a code change to the encoding leaves behind
    let path = engine.store().dir().join("price_pipeline.json");
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    value["schema"]["columns"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!("City_name_Nowhere"));
    fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

    // The prediction fails against the stale schema; a single retrain
    // inside the same call recovers it
    let forecast = engine
        .forecast(PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2).unwrap())
        .unwrap();
    assert!(forecast.current_price > 0.0);

    // The rewritten bundle is consistent again
    let reloaded = engine.store().load().unwrap();
    let probe = PropertyRecord::new("Apartment", 1000.0, "Delhi", 1).unwrap();
    assert!(reloaded.pipeline.predict(&probe).unwrap() > 0.0);
}

#[test]
fn test_corrupt_bundle_recovers_by_one_retrain() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(dir.path());

    engine
        .forecast(PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2).unwrap())
        .unwrap();

    // A garbage artifact makes the load fail with a corrupt condition,
    // not a missing one; the engine still retrains once and reloads
    fs::write(engine.store().dir().join("knn_model.json"), b"not json at all").unwrap();

    let forecast = engine
        .forecast(PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2).unwrap())
        .unwrap();
    assert!(forecast.current_price > 0.0);
    assert_eq!(forecast.growth_rate_source, RateSource::CitySpecific);

    // The store holds a readable bundle again
    engine.store().load().unwrap();
}

#[test]
fn test_land_parcel_bedrooms_are_ignored() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(dir.path());

    let with_bedrooms = engine
        .forecast(PropertyRecord::new(LAND_PARCEL_TYPE, 2400.0, "Mumbai", 3).unwrap())
        .unwrap();
    let without = engine
        .forecast(PropertyRecord::new(LAND_PARCEL_TYPE, 2400.0, "Mumbai", 0).unwrap())
        .unwrap();

    assert_eq!(with_bedrooms, without);
}

#[test]
fn test_missing_growth_index_falls_back_to_default_rate() {
    let dir = TempDir::new().unwrap();
    let engine = ForecastEngine::new(
        write_transactions(dir.path()),
        dir.path().join("no_such_index.csv"),
        dir.path().join("models"),
    );

    let forecast = engine
        .forecast(PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2).unwrap())
        .unwrap();

    assert_eq!(forecast.growth_rate_source, RateSource::National);
    assert_approx_eq!(forecast.quarterly_growth_rate, 2.0, 1e-9);
}

#[test]
fn test_missing_transactions_is_data_unavailable() {
    let dir = TempDir::new().unwrap();
    let engine = ForecastEngine::new(
        dir.path().join("no_such_transactions.csv"),
        write_growth_index(dir.path()),
        dir.path().join("models"),
    );

    let err = engine
        .forecast(PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2).unwrap())
        .unwrap_err();
    assert!(matches!(err, ForecastError::DataUnavailable(_)));
}

#[test]
fn test_blend_is_seventy_thirty() {
    assert_approx_eq!(blend(100.0, 200.0), 130.0);
}

#[test]
fn test_result_payload_shape() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(dir.path());

    let forecast = engine
        .forecast(PropertyRecord::new("Apartment", 1200.0, "Mumbai", 2).unwrap())
        .unwrap();

    let value = serde_json::to_value(&forecast).unwrap();
    assert!(value["currentPrice"].is_number());
    assert_eq!(value["futureProjections"].as_array().unwrap().len(), 4);
    assert_eq!(value["growthRateSource"], "City-specific");
    assert!(value["quarterlyGrowthRate"].is_number());
    assert!(value["roi"]["totalGrowth"].is_number());
    assert!(value["roi"]["annualizedROI"].is_number());
    assert!(value["roi"]["quarterlyGrowth"].is_number());
    assert!(value["projections"]["q1"].is_number());
    assert!(value["projections"]["q4"].is_number());
}

#[test]
fn test_request_missing_fields_are_named() {
    let err = ForecastRequest::from_json(
        r#"{"propertyType":"Apartment","sqft":1200,"bhk":2,"dataPath":"data.csv"}"#,
    )
    .unwrap_err();

    match err {
        ForecastError::Validation(msg) => assert!(msg.contains("city")),
        other => panic!("expected Validation, got {:?}", other),
    }

    let err = ForecastRequest::from_json(r#"{"propertyType":"Apartment"}"#).unwrap_err();
    match err {
        ForecastError::Validation(msg) => {
            assert!(msg.contains("sqft"));
            assert!(msg.contains("city"));
            assert!(msg.contains("bhk"));
            assert!(msg.contains("dataPath"));
        }
        other => panic!("expected Validation, got {:?}", other),
    }
}

#[test]
fn test_request_parses_a_full_payload() {
    let request = ForecastRequest::from_json(
        r#"{"propertyType":"Apartment","sqft":"1200","city":"Mumbai","bhk":"2","dataPath":"data.csv"}"#,
    )
    .unwrap();

    assert_eq!(request.property_type, "Apartment");
    assert_eq!(request.size, 1200.0);
    assert_eq!(request.city, "Mumbai");
    assert_eq!(request.bedroom_count, 2);
    assert_eq!(request.data_path, PathBuf::from("data.csv"));
}

#[test]
fn test_request_coerces_a_numeric_city() {
    let request = ForecastRequest::from_json(
        r#"{"propertyType":"Apartment","sqft":1200,"city":"400001","bhk":2,"dataPath":"data.csv"}"#,
    )
    .unwrap();
    assert_eq!(request.city, "Unknown City");

    let request = ForecastRequest::from_json(
        r#"{"propertyType":"Apartment","sqft":1200,"city":400001,"bhk":2,"dataPath":"data.csv"}"#,
    )
    .unwrap();
    assert_eq!(request.city, "Unknown City");
}

#[test]
fn test_request_rejects_bad_numbers() {
    let err = ForecastRequest::from_json(
        r#"{"propertyType":"Apartment","sqft":-5,"city":"Mumbai","bhk":2,"dataPath":"data.csv"}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ForecastError::Validation(_)));

    let err = ForecastRequest::from_json(
        r#"{"propertyType":"Apartment","sqft":1200,"city":"Mumbai","bhk":2.5,"dataPath":"data.csv"}"#,
    )
    .unwrap_err();
    assert!(matches!(err, ForecastError::Validation(_)));
}
