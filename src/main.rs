//! Single-JSON-argument invocation mode: reads one payload from argv,
//! emits exactly one line of JSON on stdout, and exits non-zero on error

use forecast_property::engine::{ForecastEngine, ForecastRequest, GROWTH_INDEX_FILE};
use forecast_property::error::{ForecastError, Result};
use forecast_property::store::DEFAULT_MODEL_DIR;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(line) => {
            println!("{}", line);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<String> {
    let raw = std::env::args().nth(1).ok_or_else(|| {
        ForecastError::Validation(
            "Expected a single JSON argument: {propertyType, sqft, city, bhk, dataPath}"
                .to_string(),
        )
    })?;

    let request = ForecastRequest::from_json(&raw)?;

    // The growth index lives next to the transaction dataset
    let growth_index_path = request
        .data_path
        .parent()
        .map(|dir| dir.join(GROWTH_INDEX_FILE))
        .unwrap_or_else(|| PathBuf::from(GROWTH_INDEX_FILE));

    let engine = ForecastEngine::new(&request.data_path, growth_index_path, DEFAULT_MODEL_DIR);
    let forecast = engine.forecast(request.record()?)?;

    Ok(serde_json::to_string(&forecast)?)
}
