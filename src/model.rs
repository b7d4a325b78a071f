//! Random-forest regression used to learn the score formulas.
//!
//! Each output gets its own `smartcore` forest over the same inputs. The
//! fitted model is persisted as a single JSON artifact.

use std::fmt;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{Result, ScoringError};

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows every tree until its leaves are pure.
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

impl ForestParams {
    fn regressor_parameters(&self, n_features: usize) -> RandomForestRegressorParameters {
        let parameters = RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees.max(1))
            .with_min_samples_split(self.min_samples_split.max(2))
            .with_m(n_features)
            .with_seed(self.seed);
        match self.max_depth {
            Some(depth) => parameters.with_max_depth(depth),
            None => parameters,
        }
    }
}

/// One forest per named output, all sharing the same named inputs.
#[derive(Serialize, Deserialize)]
pub struct MultiOutputForest {
    pub feature_names: Vec<String>,
    pub target_names: Vec<String>,
    forests: Vec<Forest>,
}

impl fmt::Debug for MultiOutputForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiOutputForest")
            .field("feature_names", &self.feature_names)
            .field("target_names", &self.target_names)
            .field("forests", &self.forests.len())
            .finish()
    }
}

fn matrix(rows: &[Vec<f64>]) -> DenseMatrix<f64> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
}

/// Runs a forest over `x`. A forest deserialized from a damaged artifact can
/// panic inside the tree walk; that is reported as a model error.
fn run_forest(forest: &Forest, x: &DenseMatrix<f64>) -> Result<Vec<f64>> {
    match panic::catch_unwind(AssertUnwindSafe(|| forest.predict(x))) {
        Ok(Ok(values)) => Ok(values),
        Ok(Err(err)) => Err(ScoringError::Model(format!("prediction failed: {err}"))),
        Err(_) => Err(ScoringError::Model(
            "model artifact is corrupt (tree walk failed)".into(),
        )),
    }
}

impl MultiOutputForest {
    /// `targets[j][i]` is output `j` for row `i`.
    pub fn fit(
        feature_names: &[&str],
        target_names: &[&str],
        x: &[Vec<f64>],
        targets: &[Vec<f64>],
        params: &ForestParams,
    ) -> Result<Self> {
        if x.is_empty() {
            return Err(ScoringError::Model("cannot fit on an empty dataset".into()));
        }
        if let Some(row) = x.iter().find(|row| row.len() != feature_names.len()) {
            return Err(ScoringError::Model(format!(
                "expected {} features per row, found {}",
                feature_names.len(),
                row.len()
            )));
        }
        if targets.len() != target_names.len() || targets.iter().any(|t| t.len() != x.len()) {
            return Err(ScoringError::Model(
                "target columns do not match the feature rows".into(),
            ));
        }

        let x = matrix(x);
        let parameters = params.regressor_parameters(feature_names.len());
        let forests = targets
            .iter()
            .zip(target_names)
            .map(|(y, name)| {
                Forest::fit(&x, y, parameters.clone())
                    .map_err(|err| ScoringError::Model(format!("failed to fit {name}: {err}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MultiOutputForest {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            target_names: target_names.iter().map(|s| s.to_string()).collect(),
            forests,
        })
    }

    /// Predicts every output for each row. `result[j][i]` is output `j` for
    /// row `i`.
    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if let Some(row) = rows.iter().find(|row| row.len() != self.feature_names.len()) {
            return Err(ScoringError::Model(format!(
                "model expects {} features, got {}",
                self.feature_names.len(),
                row.len()
            )));
        }
        if rows.is_empty() {
            return Ok(vec![Vec::new(); self.forests.len()]);
        }

        let x = matrix(rows);
        self.forests
            .iter()
            .map(|forest| run_forest(forest, &x))
            .collect()
    }

    pub fn predict(&self, row: &[f64]) -> Result<Vec<f64>> {
        let columns = self.predict_rows(&[row.to_vec()])?;
        columns
            .into_iter()
            .map(|column| {
                column
                    .first()
                    .copied()
                    .ok_or_else(|| ScoringError::Model("forest returned no prediction".into()))
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        tracing::info!(path = %path.display(), outputs = self.forests.len(), "saved model");
        Ok(())
    }

    /// Loads and checks an artifact: the forest count must match the output
    /// names and a zero row must predict cleanly.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScoringError::ModelNotFound(path.to_path_buf()));
        }
        let file = fs::File::open(path)?;
        let model: MultiOutputForest = serde_json::from_reader(BufReader::new(file))?;

        if model.feature_names.is_empty() {
            return Err(ScoringError::Model("model artifact names no features".into()));
        }
        if model.forests.len() != model.target_names.len() {
            return Err(ScoringError::Model(format!(
                "model artifact has {} forests for {} outputs",
                model.forests.len(),
                model.target_names.len()
            )));
        }
        let zero_row = model.predict(&vec![0.0; model.feature_names.len()])?;
        if zero_row.iter().any(|value| value.is_nan()) {
            return Err(ScoringError::Model(
                "model artifact produced NaN for a zero row".into(),
            ));
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 1.0]).collect();
        let y = (0..20).map(|i| if i < 10 { 10.0 } else { 30.0 }).collect();
        (x, y)
    }

    fn small() -> ForestParams {
        ForestParams {
            n_trees: 10,
            ..ForestParams::default()
        }
    }

    #[test]
    fn defaults_grow_two_hundred_full_depth_trees() {
        let params = ForestParams::default();
        assert_eq!(params.n_trees, 200);
        assert_eq!(params.max_depth, None);
        assert_eq!(params.seed, 42);
    }

    #[test]
    fn forest_learns_a_step() {
        let (x, y) = step_data();
        let model = MultiOutputForest::fit(&["a", "b"], &["out"], &x, &[y], &small()).unwrap();
        let low = model.predict(&[2.0, 1.0]).unwrap()[0];
        let high = model.predict(&[17.0, 1.0]).unwrap()[0];
        assert!((low - 10.0).abs() < 5.0, "low side predicted {low}");
        assert!((high - 30.0).abs() < 5.0, "high side predicted {high}");
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let (x, y) = step_data();
        let a = MultiOutputForest::fit(&["a", "b"], &["out"], &x, &[y.clone()], &small()).unwrap();
        let b = MultiOutputForest::fit(&["a", "b"], &["out"], &x, &[y], &small()).unwrap();
        assert_eq!(a.predict_rows(&x).unwrap(), b.predict_rows(&x).unwrap());
    }

    #[test]
    fn predictions_stay_within_label_range() {
        let (x, y) = step_data();
        let model = MultiOutputForest::fit(&["a", "b"], &["out"], &x, &[y], &small()).unwrap();
        for value in &model.predict_rows(&x).unwrap()[0] {
            assert!((10.0..=30.0).contains(value), "{value}");
        }
        assert!(model.predict(&[1.0]).is_err());
    }

    #[test]
    fn fit_rejects_bad_shapes() {
        let (x, y) = step_data();
        let params = small();
        assert!(MultiOutputForest::fit(&["a"], &["out"], &x, &[y.clone()], &params).is_err());
        assert!(MultiOutputForest::fit(&["a", "b"], &["o1", "o2"], &x, &[y], &params).is_err());
        assert!(MultiOutputForest::fit(&["a", "b"], &["out"], &[], &[vec![]], &params).is_err());
    }

    #[test]
    fn save_and_load_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");
        let (x, y) = step_data();
        let model = MultiOutputForest::fit(
            &["a", "b"],
            &["out"],
            &x,
            &[y],
            &ForestParams {
                n_trees: 3,
                ..ForestParams::default()
            },
        )
        .unwrap();
        model.save(&path).unwrap();
        let loaded = MultiOutputForest::load(&path).unwrap();
        assert_eq!(loaded.feature_names, model.feature_names);
        assert_eq!(loaded.predict_rows(&x).unwrap(), model.predict_rows(&x).unwrap());
    }

    #[test]
    fn missing_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = MultiOutputForest::load(&dir.path().join("model.json")).unwrap_err();
        assert_eq!(err.kind(), "model_not_found");
    }

    #[test]
    fn malformed_artifact_is_a_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, r#"{"forests":[{"trees":[{"nodes":[]}]}]}"#).unwrap();
        let err = MultiOutputForest::load(&path).unwrap_err();
        assert_eq!(err.kind(), "model");
    }

    #[test]
    fn forest_count_must_match_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let (x, y) = step_data();
        MultiOutputForest::fit(&["a", "b"], &["out"], &x, &[y], &small())
            .unwrap()
            .save(&path)
            .unwrap();

        let mut artifact: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        artifact["target_names"] = serde_json::json!(["out", "extra"]);
        fs::write(&path, artifact.to_string()).unwrap();

        let err = MultiOutputForest::load(&path).unwrap_err();
        assert_eq!(err.kind(), "model");
        assert!(err.to_string().contains("1 forests for 2 outputs"));
    }
}
