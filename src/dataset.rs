use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, ScoringError};
use crate::models::Dataset;

pub const STUDENTS_FILE: &str = "students.csv";
pub const COURSES_FILE: &str = "courses.csv";
pub const COMMENTS_FILE: &str = "student_comments.csv";
pub const ACTIVITIES_FILE: &str = "cocurricular_activities.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Missing {
    Fail,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BadRows {
    Fail,
    Skip,
}

fn read_table<T: DeserializeOwned>(path: &Path, missing: Missing, bad_rows: BadRows) -> Result<Vec<T>> {
    if !path.exists() {
        return match missing {
            Missing::Fail => Err(ScoringError::Data(format!(
                "required table {} does not exist",
                path.display()
            ))),
            Missing::Empty => {
                tracing::warn!(path = %path.display(), "table not found, using an empty one");
                Ok(Vec::new())
            }
        };
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(bad_rows == BadRows::Skip)
        .from_path(path)?;
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for result in reader.deserialize::<T>() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) if bad_rows == BadRows::Skip => {
                tracing::debug!(path = %path.display(), error = %err, "skipping malformed row");
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "skipped malformed rows");
    }
    Ok(rows)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = rows.len(), "saved table");
    Ok(())
}

/// Loads the tables from a directory of CSV files. Students and courses are
/// required. Malformed comment rows are skipped.
pub fn load_dir(dir: &Path) -> Result<Dataset> {
    Ok(Dataset {
        students: read_table(&dir.join(STUDENTS_FILE), Missing::Fail, BadRows::Fail)?,
        courses: read_table(&dir.join(COURSES_FILE), Missing::Fail, BadRows::Fail)?,
        comments: read_table(&dir.join(COMMENTS_FILE), Missing::Empty, BadRows::Skip)?,
        activities: read_table(&dir.join(ACTIVITIES_FILE), Missing::Empty, BadRows::Skip)?,
    })
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "removed stale table");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Writes every table to `dir`, creating it first. Empty comment and activity
/// tables are not written, and any older copy of them is removed so a later
/// load sees the same data.
pub fn save_dir(dataset: &Dataset, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join(STUDENTS_FILE);
    write_table(&path, &dataset.students)?;
    written.push(path);

    let path = dir.join(COURSES_FILE);
    write_table(&path, &dataset.courses)?;
    written.push(path);

    let path = dir.join(COMMENTS_FILE);
    if dataset.comments.is_empty() {
        tracing::warn!("no comments to save");
        remove_stale(&path)?;
    } else {
        write_table(&path, &dataset.comments)?;
        written.push(path);
    }

    let path = dir.join(ACTIVITIES_FILE);
    if dataset.activities.is_empty() {
        remove_stale(&path)?;
    } else {
        write_table(&path, &dataset.activities)?;
        written.push(path);
    }

    Ok(written)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub students: usize,
    pub courses: usize,
    pub comments: usize,
    pub activities: usize,
    pub with_feedback_score: usize,
    pub with_engagement_score: usize,
    pub avg_feedback_score: Option<f64>,
}

pub fn summarize(dataset: &Dataset) -> DatasetSummary {
    let feedback: Vec<f64> = dataset
        .students
        .iter()
        .filter_map(|s| s.feedback_sentiment_score)
        .collect();
    let with_engagement_score = dataset
        .students
        .iter()
        .filter(|s| s.professional_engagement_score.is_some())
        .count();

    DatasetSummary {
        students: dataset.students.len(),
        courses: dataset.courses.len(),
        comments: dataset.comments.len(),
        activities: dataset.activities.len(),
        with_feedback_score: feedback.len(),
        with_engagement_score,
        avg_feedback_score: if feedback.is_empty() {
            None
        } else {
            Some(feedback.iter().sum::<f64>() / feedback.len() as f64)
        },
    }
}
