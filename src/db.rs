use std::collections::HashMap;

use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::models::{
    ActivityRecord, CommentRecord, CourseRecord, Dataset, StudentData, StudentRecord,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn student_from_row(row: &PgRow) -> StudentRecord {
    StudentRecord {
        id: row.get("id"),
        name: row.get("name"),
        gender: row.get("gender"),
        dob: row.get("dob"),
        image_url: row.get("image_url"),
        description: row.get("description"),
        analysis: row.get("analysis"),
        level: row.get("level"),
        program: row.get("program"),
        created_at: row.get("created_at"),
        cgpa: row.get("cgpa"),
        feedback_sentiment_score: row.get("feedback_sentiment_score"),
        professional_engagement_score: row.get("professional_engagement_score"),
    }
}

fn course_from_row(row: &PgRow) -> CourseRecord {
    CourseRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        course_name: row.get("course_name"),
        course_code: row.get("course_code"),
        course_description: row.get("course_description"),
        grade: row.get("grade"),
        credit_hour: row.get("credit_hour"),
        score: row.get("score"),
        created_at: row.get("created_at"),
    }
}

fn comment_from_row(row: &PgRow) -> CommentRecord {
    CommentRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        commenter_id: row.get("commenter_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

fn activity_from_row(row: &PgRow) -> ActivityRecord {
    ActivityRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        activity_name: row.get("activity_name"),
        ai_impact_score: row.get("ai_impact_score"),
        ai_leadership_score: row.get("ai_leadership_score"),
        ai_relevance_score: row.get("ai_relevance_score"),
    }
}

pub async fn fetch_student_data(pool: &PgPool, student_id: i64) -> anyhow::Result<StudentData> {
    let courses = sqlx::query("SELECT * FROM courses WHERE student_id = $1 ORDER BY id")
        .bind(student_id)
        .fetch_all(pool)
        .await
        .context("failed to fetch courses")?;

    let comments = sqlx::query("SELECT * FROM student_comments WHERE student_id = $1 ORDER BY id")
        .bind(student_id)
        .fetch_all(pool)
        .await
        .context("failed to fetch comments")?;

    Ok(StudentData {
        courses: courses.iter().map(course_from_row).collect(),
        comments: comments.iter().map(comment_from_row).collect(),
    })
}

/// Reads every table in full.
pub async fn fetch_dataset(pool: &PgPool) -> anyhow::Result<Dataset> {
    let students = sqlx::query("SELECT * FROM students ORDER BY id")
        .fetch_all(pool)
        .await
        .context("failed to export students")?;
    tracing::info!(count = students.len(), "exported students");

    let courses = sqlx::query("SELECT * FROM courses ORDER BY id")
        .fetch_all(pool)
        .await
        .context("failed to export courses")?;
    tracing::info!(count = courses.len(), "exported courses");

    let comments = sqlx::query("SELECT * FROM student_comments ORDER BY id")
        .fetch_all(pool)
        .await
        .context("failed to export comments")?;
    tracing::info!(count = comments.len(), "exported comments");

    let activities = sqlx::query("SELECT * FROM cocurricular_activities ORDER BY id")
        .fetch_all(pool)
        .await
        .context("failed to export co-curricular activities")?;
    tracing::info!(count = activities.len(), "exported co-curricular activities");

    Ok(Dataset {
        students: students.iter().map(student_from_row).collect(),
        courses: courses.iter().map(course_from_row).collect(),
        comments: comments.iter().map(comment_from_row).collect(),
        activities: activities.iter().map(activity_from_row).collect(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub students: usize,
    pub courses: usize,
    pub comments: usize,
    pub skipped: usize,
}

/// Inserts a dataset, letting Postgres assign ids. Course and comment rows are
/// remapped to the new student ids; rows whose student was not inserted are
/// skipped.
pub async fn upload_dataset(pool: &PgPool, dataset: &Dataset) -> anyhow::Result<UploadSummary> {
    let mut summary = UploadSummary::default();
    let mut id_map: HashMap<i64, i64> = HashMap::new();

    for student in &dataset.students {
        let new_id: i64 = sqlx::query(
            r#"
            INSERT INTO students
            (name, gender, dob, image_url, description, analysis, level, program,
             created_at, cgpa, feedback_sentiment_score, professional_engagement_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, COALESCE($9, now()), $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&student.name)
        .bind(&student.gender)
        .bind(student.dob)
        .bind(&student.image_url)
        .bind(&student.description)
        .bind(&student.analysis)
        .bind(&student.level)
        .bind(&student.program)
        .bind(student.created_at)
        .bind(student.cgpa)
        .bind(student.feedback_sentiment_score)
        .bind(student.professional_engagement_score)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to insert student {}", student.id))?
        .get("id");

        id_map.insert(student.id, new_id);
        summary.students += 1;
    }
    tracing::info!(count = summary.students, "inserted students");

    for course in &dataset.courses {
        let Some(&student_id) = id_map.get(&course.student_id) else {
            summary.skipped += 1;
            continue;
        };

        sqlx::query(
            r#"
            INSERT INTO courses
            (student_id, course_name, course_code, course_description, grade,
             credit_hour, score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, now()))
            "#,
        )
        .bind(student_id)
        .bind(&course.course_name)
        .bind(&course.course_code)
        .bind(&course.course_description)
        .bind(&course.grade)
        .bind(course.credit_hour)
        .bind(course.score)
        .bind(course.created_at)
        .execute(pool)
        .await
        .with_context(|| format!("failed to insert course {}", course.id))?;
        summary.courses += 1;
    }
    tracing::info!(count = summary.courses, "inserted courses");

    for comment in &dataset.comments {
        let Some(&student_id) = id_map.get(&comment.student_id) else {
            summary.skipped += 1;
            continue;
        };

        sqlx::query(
            r#"
            INSERT INTO student_comments (student_id, commenter_id, content, created_at)
            VALUES ($1, $2, $3, COALESCE($4, now()))
            "#,
        )
        .bind(student_id)
        .bind(comment.commenter_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(pool)
        .await
        .with_context(|| format!("failed to insert comment {}", comment.id))?;
        summary.comments += 1;
    }
    tracing::info!(count = summary.comments, "inserted comments");

    if summary.skipped > 0 {
        tracing::warn!(skipped = summary.skipped, "rows referenced unknown students");
    }

    Ok(summary)
}
