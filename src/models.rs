use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content written in place of a comment that a lecturer removed.
pub const DELETED_COMMENT: &str = "[Comment deleted]";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub analysis: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cgpa: Option<f64>,
    #[serde(default)]
    pub feedback_sentiment_score: Option<f64>,
    #[serde(default)]
    pub professional_engagement_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourseRecord {
    pub id: i64,
    pub student_id: i64,
    pub course_name: String,
    pub course_code: String,
    #[serde(default)]
    pub course_description: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    pub credit_hour: f64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentRecord {
    pub id: i64,
    pub student_id: i64,
    #[serde(default)]
    pub commenter_id: Option<Uuid>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl CommentRecord {
    pub fn is_deleted(&self) -> bool {
        self.content.as_deref() == Some(DELETED_COMMENT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    pub id: i64,
    pub student_id: i64,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub ai_impact_score: Option<f64>,
    #[serde(default)]
    pub ai_leadership_score: Option<f64>,
    #[serde(default)]
    pub ai_relevance_score: Option<f64>,
}

/// Everything the pipeline reads for a single student.
#[derive(Debug, Clone, Default)]
pub struct StudentData {
    pub courses: Vec<CourseRecord>,
    pub comments: Vec<CommentRecord>,
}

/// The four tables the tooling moves between Postgres and CSV.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub students: Vec<StudentRecord>,
    pub courses: Vec<CourseRecord>,
    pub comments: Vec<CommentRecord>,
    pub activities: Vec<ActivityRecord>,
}

impl Dataset {
    pub fn for_student(&self, student_id: i64) -> StudentData {
        StudentData {
            courses: self
                .courses
                .iter()
                .filter(|course| course.student_id == student_id)
                .cloned()
                .collect(),
            comments: self
                .comments
                .iter()
                .filter(|comment| comment.student_id == student_id)
                .cloned()
                .collect(),
        }
    }
}
