use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;

use crate::db;
use crate::error::{Result, ScoringError};
use crate::features::{self, CommentPolicy, FeatureVector};
use crate::model::MultiOutputForest;
use crate::models::{Dataset, StudentData};
use crate::scoring::{self, Competency, ScoreVector};

/// Where a student's course and comment rows come from.
#[async_trait]
pub trait StudentSource {
    async fn student_data(&self, student_id: i64) -> Result<StudentData>;
}

#[async_trait]
impl StudentSource for PgPool {
    async fn student_data(&self, student_id: i64) -> Result<StudentData> {
        db::fetch_student_data(self, student_id)
            .await
            .map_err(|err| match err.downcast::<sqlx::Error>() {
                Ok(db_err) => ScoringError::Database(db_err),
                Err(other) => ScoringError::Other(other),
            })
    }
}

#[async_trait]
impl StudentSource for Dataset {
    async fn student_data(&self, student_id: i64) -> Result<StudentData> {
        Ok(self.for_student(student_id))
    }
}

/// Diagnostic echo of the features behind a prediction.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeatureEcho {
    pub total_units: f64,
    pub avg_grade_point: f64,
    pub num_courses: u64,
    pub comments_total_len: u64,
    pub programming_courses: u64,
    pub design_courses: u64,
    pub infrastructure_courses: u64,
    pub degree_gpa: f64,
}

impl From<&FeatureVector> for FeatureEcho {
    fn from(features: &FeatureVector) -> Self {
        Self {
            total_units: features.total_units,
            avg_grade_point: features.avg_grade_point,
            num_courses: features.num_courses as u64,
            comments_total_len: features.comments_total_len as u64,
            programming_courses: features.programming.courses as u64,
            design_courses: features.design.courses as u64,
            infrastructure_courses: features.infrastructure.courses as u64,
            degree_gpa: features.degree.gpa,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Prediction {
    Success {
        success: bool,
        student_id: i64,
        scores: ScoreVector,
        features: FeatureEcho,
    },
    Failure {
        success: bool,
        error_kind: String,
        error: String,
    },
}

impl Prediction {
    pub fn failure(err: &ScoringError) -> Self {
        Prediction::Failure {
            success: false,
            error_kind: err.kind().to_string(),
            error: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Prediction::Success { .. })
    }
}

pub fn parse_student_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ScoringError::InvalidStudentId(raw.to_string()))
}

async fn try_predict<S>(
    source: &S,
    raw_student_id: &str,
    model_path: &Path,
    policy: CommentPolicy,
) -> Result<Prediction>
where
    S: StudentSource + Sync + ?Sized,
{
    let student_id = parse_student_id(raw_student_id)?;
    let model = MultiOutputForest::load(model_path)?;
    let data = source.student_data(student_id).await?;

    let features = features::aggregate(&data.courses, &data.comments, policy);
    let raw = model.predict(&features.baseline())?;
    let prediction: [f64; 6] = raw.try_into().map_err(|raw: Vec<f64>| {
        ScoringError::Model(format!(
            "model produced {} outputs, expected {}",
            raw.len(),
            Competency::ALL.len()
        ))
    })?;
    let scores = scoring::score(&features, Some(&prediction));

    tracing::info!(
        student_id,
        courses = data.courses.len(),
        comments = data.comments.len(),
        "scored student"
    );

    Ok(Prediction::Success {
        success: true,
        student_id,
        scores,
        features: FeatureEcho::from(&features),
    })
}

/// Computes the six scores for one student. Never returns an error: any
/// failure becomes a [`Prediction::Failure`] carrying its category and
/// message.
pub async fn predict_scores<S>(
    source: &S,
    raw_student_id: &str,
    model_path: &Path,
    policy: CommentPolicy,
) -> Prediction
where
    S: StudentSource + Sync + ?Sized,
{
    match try_predict(source, raw_student_id, model_path, policy).await {
        Ok(prediction) => prediction,
        Err(err) => {
            tracing::error!(kind = err.kind(), error = %err, "prediction failed");
            Prediction::failure(&err)
        }
    }
}
