use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::error::Result;
use crate::features::{self, CommentPolicy, BASELINE_FEATURES};
use crate::model::{ForestParams, MultiOutputForest};
use crate::models::Dataset;
use crate::scoring::{self, Competency};

/// Below this many students the held-out split would be degenerate, so the
/// model is evaluated on its own training rows.
pub const MIN_SPLIT_SAMPLES: usize = 5;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub params: ForestParams,
    pub test_fraction: f64,
    pub comment_policy: CommentPolicy,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            params: ForestParams::default(),
            test_fraction: 0.2,
            comment_policy: CommentPolicy::default(),
        }
    }
}

/// Baseline features and formula labels for every student.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    pub student_ids: Vec<i64>,
    pub x: Vec<Vec<f64>>,
    /// `targets[j][i]` is competency `j` for student `i`.
    pub targets: Vec<Vec<f64>>,
}

impl LabelTable {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn select(&self, rows: &[usize]) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let x = rows.iter().map(|&i| self.x[i].clone()).collect();
        let targets = self
            .targets
            .iter()
            .map(|column| rows.iter().map(|&i| column[i]).collect())
            .collect();
        (x, targets)
    }
}

/// Applies the unblended score formulas to every student. Stored feedback
/// and engagement scores, when a student row has them, replace the formula
/// label for that output.
pub fn build_label_table(dataset: &Dataset, policy: CommentPolicy) -> LabelTable {
    let cohort = features::aggregate_cohort(dataset, policy);
    let mut table = LabelTable {
        targets: vec![Vec::with_capacity(cohort.len()); Competency::ALL.len()],
        ..LabelTable::default()
    };

    for (student, (student_id, features)) in dataset.students.iter().zip(cohort) {
        let mut labels = scoring::formula_scores(&features).to_array();
        if let Some(stored) = student.feedback_sentiment_score {
            labels[Competency::FeedbackSentiment as usize] = stored;
        }
        if let Some(stored) = student.professional_engagement_score {
            labels[Competency::ProfessionalEngagement as usize] = stored;
        }

        table.student_ids.push(student_id);
        table.x.push(features.baseline().to_vec());
        for (column, label) in table.targets.iter_mut().zip(labels) {
            column.push(label);
        }
    }

    table
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub held_out: bool,
}

/// Shuffled train/test split. Small datasets train and evaluate on every
/// row.
pub fn split_rows(n: usize, test_fraction: f64, seed: u64) -> Split {
    let all: Vec<usize> = (0..n).collect();
    if n < MIN_SPLIT_SAMPLES {
        return Split {
            train: all.clone(),
            test: all,
            held_out: false,
        };
    }

    let mut shuffled = all;
    shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
    let train = shuffled.split_off(n_test);
    Split {
        train,
        test: shuffled,
        held_out: true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputMetrics {
    pub output: String,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let total: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    total / actual.len() as f64
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let total: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    (total / actual.len() as f64).sqrt()
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[derive(Debug)]
pub struct TrainingRun {
    pub model: MultiOutputForest,
    pub metrics: Vec<OutputMetrics>,
    pub samples: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub held_out: bool,
}

pub fn train(dataset: &Dataset, options: &TrainOptions) -> Result<TrainingRun> {
    let table = build_label_table(dataset, options.comment_policy);
    tracing::info!(rows = table.len(), features = BASELINE_FEATURES.len(), "built training table");

    let split = split_rows(table.len(), options.test_fraction, options.params.seed);
    if !split.held_out {
        tracing::warn!(
            samples = table.len(),
            minimum = MIN_SPLIT_SAMPLES,
            "too few students for a held-out split; evaluating on the training set"
        );
    }

    let target_names: Vec<&str> = Competency::ALL.iter().map(|c| c.as_str()).collect();
    let (train_x, train_y) = table.select(&split.train);
    tracing::info!(
        rows = train_x.len(),
        trees = options.params.n_trees,
        max_depth = ?options.params.max_depth,
        "training model"
    );
    let model = MultiOutputForest::fit(
        &BASELINE_FEATURES,
        &target_names,
        &train_x,
        &train_y,
        &options.params,
    )?;

    let (test_x, test_y) = table.select(&split.test);
    let predictions = model.predict_rows(&test_x)?;

    let metrics = target_names
        .iter()
        .zip(test_y.iter().zip(&predictions))
        .map(|(name, (actual, predicted))| OutputMetrics {
            output: name.to_string(),
            mae: round4(mean_absolute_error(actual, predicted)),
            rmse: round4(root_mean_squared_error(actual, predicted)),
            r2: round4(r2_score(actual, predicted)),
        })
        .collect();

    Ok(TrainingRun {
        model,
        metrics,
        samples: table.len(),
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        held_out: split.held_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{self, GeneratorConfig};
    use crate::models::{CourseRecord, StudentRecord};
    use chrono::{TimeZone, Utc};

    fn student(id: i64) -> StudentRecord {
        StudentRecord {
            id,
            name: format!("Student {id}"),
            gender: None,
            dob: None,
            image_url: None,
            description: None,
            analysis: None,
            level: None,
            program: None,
            created_at: None,
            cgpa: None,
            feedback_sentiment_score: None,
            professional_engagement_score: None,
        }
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 10,
            max_depth: Some(6),
            ..ForestParams::default()
        }
    }

    #[test]
    fn metrics_match_hand_computation() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [1.0, 2.0, 5.0];
        assert!((mean_absolute_error(&actual, &predicted) - 2.0 / 3.0).abs() < 1e-12);
        assert!((root_mean_squared_error(&actual, &predicted) - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((r2_score(&actual, &predicted) - (1.0 - 4.0 / 2.0)).abs() < 1e-12);
    }

    #[test]
    fn r2_of_constant_target() {
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 4.0]), 0.0);
    }

    #[test]
    fn small_datasets_skip_the_split() {
        let split = split_rows(4, 0.2, 42);
        assert!(!split.held_out);
        assert_eq!(split.train, vec![0, 1, 2, 3]);
        assert_eq!(split.test, split.train);
    }

    #[test]
    fn split_holds_out_a_fifth() {
        let split = split_rows(50, 0.2, 42);
        assert!(split.held_out);
        assert_eq!(split.test.len(), 10);
        assert_eq!(split.train.len(), 40);
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
        assert_eq!(split, split_rows(50, 0.2, 42));
    }

    #[test]
    fn labels_follow_formulas_and_stored_scores() {
        let mut with_scores = student(2);
        with_scores.feedback_sentiment_score = Some(81.5);
        with_scores.professional_engagement_score = Some(12.0);
        let dataset = Dataset {
            students: vec![student(1), with_scores],
            courses: vec![CourseRecord {
                id: 1,
                student_id: 1,
                course_name: "OBJECT ORIENTED PROGRAMMING".into(),
                course_code: "EC2306".into(),
                course_description: None,
                grade: Some("A".into()),
                credit_hour: 3.0,
                score: None,
                created_at: None,
            }],
            ..Dataset::default()
        };

        let table = build_label_table(&dataset, CommentPolicy::default());
        assert_eq!(table.student_ids, vec![1, 2]);
        assert_eq!(table.x[0], vec![3.0, 4.0, 1.0, 0.0]);
        assert_eq!(table.x[1], vec![0.0; 4]);
        assert_eq!(table.targets[Competency::Programming as usize][0], 102.5);
        assert_eq!(table.targets[Competency::FeedbackSentiment as usize][1], 81.5);
        assert_eq!(table.targets[Competency::ProfessionalEngagement as usize][1], 12.0);
        assert_eq!(table.targets[Competency::CoCurricular as usize][1], 0.0);
    }

    #[test]
    fn trains_on_tiny_cohort_without_split() {
        let dataset = Dataset {
            students: vec![student(1), student(2)],
            ..Dataset::default()
        };
        let run = train(
            &dataset,
            &TrainOptions {
                params: small_params(),
                ..TrainOptions::default()
            },
        )
        .unwrap();
        assert!(!run.held_out);
        assert_eq!(run.samples, 2);
        assert_eq!(run.metrics.len(), 6);
        for metric in &run.metrics {
            assert_eq!(metric.mae, 0.0);
            assert_eq!(metric.r2, 1.0);
        }
    }

    #[test]
    fn trains_on_generated_cohort() {
        let dataset = generator::generate(&GeneratorConfig {
            students: 40,
            seed: 7,
            max_comments: 2,
            generated_at: Utc.with_ymd_and_hms(2025, 11, 1, 8, 0, 0).unwrap(),
        })
        .unwrap();
        let run = train(
            &dataset,
            &TrainOptions {
                params: small_params(),
                ..TrainOptions::default()
            },
        )
        .unwrap();
        assert!(run.held_out);
        assert_eq!(run.train_rows + run.test_rows, 40);
        assert_eq!(run.test_rows, 8);
        let names: Vec<&str> = run.metrics.iter().map(|m| m.output.as_str()).collect();
        assert_eq!(names[0], "programming_score");
        assert_eq!(names[5], "professional_engagement_score");
        assert!(run.metrics.iter().all(|m| m.mae.is_finite() && m.rmse >= 0.0));
    }

    #[test]
    fn empty_dataset_cannot_train() {
        let err = train(&Dataset::default(), &TrainOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "model");
    }
}
