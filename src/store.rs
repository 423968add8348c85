//! Persistence for the trained model bundle

use crate::data::{DataLoader, TransactionData};
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::growth::GrowthRateTable;
use crate::models::{NearestNeighbors, PricePipeline};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Version of the persisted bundle layout. Bumped whenever the feature
/// encoding or artifact format changes; a mismatch on load fails fast
/// instead of surfacing later as a prediction error.
pub const BUNDLE_SCHEMA_VERSION: u32 = 1;

/// Default storage location for the bundle
pub const DEFAULT_MODEL_DIR: &str = "models";

const PIPELINE_FILE: &str = "price_pipeline.json";
const KNN_MODEL_FILE: &str = "knn_model.json";
const KNN_DATA_FILE: &str = "knn_data.json";
const CITY_RATES_FILE: &str = "city_growth_rates.json";
const NATIONAL_RATE_FILE: &str = "all_india_rate.json";
const TRAINING_DATA_FILE: &str = "training_data.csv";

const ALL_FILES: [&str; 6] = [
    PIPELINE_FILE,
    KNN_MODEL_FILE,
    KNN_DATA_FILE,
    CITY_RATES_FILE,
    NATIONAL_RATE_FILE,
    TRAINING_DATA_FILE,
];

/// The full set of trained artifacts, treated as one atomic unit
#[derive(Debug, Clone)]
pub struct ModelBundle {
    /// Fitted regression pipeline
    pub pipeline: PricePipeline,
    /// Fitted nearest-neighbor index
    pub knn: NearestNeighbors,
    /// Encoded similarity feature table, row-aligned with the training data
    pub knn_features: FeatureTable,
    /// Growth rates the bundle was trained against
    pub growth: GrowthRateTable,
    /// The full transaction table used for training
    pub training_data: TransactionData,
}

/// Stores and restores model bundles under a fixed directory.
/// No locking; a single writer at a time is assumed.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// A store rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True iff every artifact file of the bundle is present
    pub fn exists(&self) -> bool {
        ALL_FILES.iter().all(|name| self.dir.join(name).is_file())
    }

    /// Write all artifacts. Each file is written to a temporary sibling
    /// first and renamed into place only after every write succeeded, so
    /// a reader never observes a half-overwritten bundle.
    pub fn save(&self, bundle: &ModelBundle) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let staged = [
            self.write_json_tmp(PIPELINE_FILE, &bundle.pipeline)?,
            self.write_json_tmp(KNN_MODEL_FILE, &bundle.knn)?,
            self.write_json_tmp(KNN_DATA_FILE, &bundle.knn_features)?,
            self.write_json_tmp(CITY_RATES_FILE, bundle.growth.city_rates())?,
            self.write_json_tmp(NATIONAL_RATE_FILE, &bundle.growth.national_rate())?,
            {
                let tmp = self.tmp_path(TRAINING_DATA_FILE);
                bundle.training_data.write_csv(&tmp)?;
                tmp
            },
        ];

        for (tmp, name) in staged.iter().zip(ALL_FILES.iter()) {
            fs::rename(tmp, self.dir.join(name))?;
        }

        log::info!("Model bundle saved under {}", self.dir.display());
        Ok(())
    }

    /// Read all artifacts back. A missing file yields `ModelNotFound`;
    /// a file that fails to deserialize, or a schema-version mismatch,
    /// yields `ModelCorrupt`.
    pub fn load(&self) -> Result<ModelBundle> {
        let missing: Vec<&str> = ALL_FILES
            .iter()
            .filter(|name| !self.dir.join(name).is_file())
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::ModelNotFound(format!(
                "Missing bundle artifacts under {}: {}",
                self.dir.display(),
                missing.join(", ")
            )));
        }

        let pipeline: PricePipeline = self.read_json(PIPELINE_FILE)?;
        let knn: NearestNeighbors = self.read_json(KNN_MODEL_FILE)?;
        let knn_features: FeatureTable = self.read_json(KNN_DATA_FILE)?;
        let city_rates: BTreeMap<String, f64> = self.read_json(CITY_RATES_FILE)?;
        let national_rate: Option<f64> = self.read_json(NATIONAL_RATE_FILE)?;

        if pipeline.schema_version != BUNDLE_SCHEMA_VERSION
            || knn_features.schema_version != BUNDLE_SCHEMA_VERSION
        {
            return Err(ForecastError::ModelCorrupt(format!(
                "Bundle schema version {} does not match this build ({})",
                pipeline.schema_version.min(knn_features.schema_version),
                BUNDLE_SCHEMA_VERSION
            )));
        }

        let training_data = DataLoader::from_csv(self.dir.join(TRAINING_DATA_FILE))
            .map_err(|e| ForecastError::ModelCorrupt(format!("{}: {}", TRAINING_DATA_FILE, e)))?;

        Ok(ModelBundle {
            pipeline,
            knn,
            knn_features,
            growth: GrowthRateTable::from_parts(city_rates, national_rate),
            training_data,
        })
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.tmp", name))
    }

    fn write_json_tmp<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let tmp = self.tmp_path(name);
        let file = File::create(&tmp)?;
        serde_json::to_writer(BufWriter::new(file), value)?;
        Ok(tmp)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let file = File::open(&path).map_err(|e| {
            ForecastError::ModelNotFound(format!("{}: {}", path.display(), e))
        })?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ForecastError::ModelCorrupt(format!("{}: {}", path.display(), e)))
    }
}
