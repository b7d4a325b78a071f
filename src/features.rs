use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::{self, CourseLevel, Domain};
use crate::grades;
use crate::models::{CommentRecord, CourseRecord, Dataset};

/// Which comments count toward the engagement length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentPolicy {
    #[default]
    ExcludeDeleted,
    IncludeAll,
}

impl FromStr for CommentPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "exclude-deleted" => Ok(CommentPolicy::ExcludeDeleted),
            "include-all" => Ok(CommentPolicy::IncludeAll),
            other => Err(format!(
                "unknown comment policy {other:?} (expected exclude-deleted or include-all)"
            )),
        }
    }
}

impl fmt::Display for CommentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentPolicy::ExcludeDeleted => f.write_str("exclude-deleted"),
            CommentPolicy::IncludeAll => f.write_str("include-all"),
        }
    }
}

/// Per-domain course statistics over graded courses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DomainStats {
    pub gpa: f64,
    pub courses: f64,
}

/// Named numeric features for one student. Every field is zero when no
/// qualifying course or comment exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeatureVector {
    pub total_units: f64,
    pub avg_grade_point: f64,
    pub num_courses: f64,
    pub graded_courses: f64,
    pub comments_count: f64,
    pub comments_total_len: f64,
    pub programming: DomainStats,
    pub design: DomainStats,
    pub infrastructure: DomainStats,
    pub soft_skills: DomainStats,
    pub theory: DomainStats,
    pub diploma: DomainStats,
    pub degree: DomainStats,
}

/// Names of the model inputs, in the order of [`FeatureVector::baseline`].
pub const BASELINE_FEATURES: [&str; 4] = [
    "total_units",
    "avg_grade_point",
    "num_courses",
    "comments_total_len",
];

impl FeatureVector {
    pub fn domain(&self, domain: Domain) -> DomainStats {
        match domain {
            Domain::Programming => self.programming,
            Domain::Design => self.design,
            Domain::Infrastructure => self.infrastructure,
            Domain::SoftSkills => self.soft_skills,
            Domain::Theory => self.theory,
        }
    }

    fn domain_mut(&mut self, domain: Domain) -> &mut DomainStats {
        match domain {
            Domain::Programming => &mut self.programming,
            Domain::Design => &mut self.design,
            Domain::Infrastructure => &mut self.infrastructure,
            Domain::SoftSkills => &mut self.soft_skills,
            Domain::Theory => &mut self.theory,
        }
    }

    /// GPA used by the fallback terms: degree-level first, then diploma-level,
    /// then overall.
    pub fn effective_gpa(&self) -> f64 {
        if self.degree.courses > 0.0 {
            self.degree.gpa
        } else if self.diploma.courses > 0.0 {
            self.diploma.gpa
        } else {
            self.avg_grade_point
        }
    }

    /// The four inputs the regression model is trained on.
    pub fn baseline(&self) -> [f64; 4] {
        [
            self.total_units,
            self.avg_grade_point,
            self.num_courses,
            self.comments_total_len,
        ]
    }
}

#[derive(Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn stats(&self) -> DomainStats {
        if self.count == 0 {
            return DomainStats::default();
        }
        DomainStats {
            gpa: self.sum / self.count as f64,
            courses: self.count as f64,
        }
    }
}

/// Reduces one student's course and comment rows into a feature vector.
pub fn aggregate<'a, C, M>(courses: C, comments: M, policy: CommentPolicy) -> FeatureVector
where
    C: IntoIterator<Item = &'a CourseRecord>,
    M: IntoIterator<Item = &'a CommentRecord>,
{
    let mut features = FeatureVector::default();
    let mut overall = Accumulator::default();
    let mut by_domain: [Accumulator; 5] = Default::default();
    let mut diploma = Accumulator::default();
    let mut degree = Accumulator::default();
    let mut num_courses = 0usize;

    for course in courses {
        num_courses += 1;
        features.total_units += course.credit_hour;

        let Some(point) = course.grade.as_deref().and_then(grades::grade_point) else {
            continue;
        };
        let category = catalog::categorize(&course.course_code, &course.course_name);

        overall.push(point);
        for domain in category.domains.iter() {
            by_domain[domain as usize].push(point);
        }
        match category.level {
            CourseLevel::Diploma => diploma.push(point),
            CourseLevel::Degree => degree.push(point),
            CourseLevel::Other(_) => {}
        }
    }

    features.num_courses = num_courses as f64;
    let overall = overall.stats();
    features.avg_grade_point = overall.gpa;
    features.graded_courses = overall.courses;
    for domain in Domain::ALL {
        *features.domain_mut(domain) = by_domain[domain as usize].stats();
    }
    features.diploma = diploma.stats();
    features.degree = degree.stats();

    let mut comments_count = 0usize;
    let mut comments_len = 0usize;
    for comment in comments {
        if policy == CommentPolicy::ExcludeDeleted && comment.is_deleted() {
            continue;
        }
        comments_count += 1;
        comments_len += comment.content.as_deref().map_or(0, |c| c.chars().count());
    }
    features.comments_count = comments_count as f64;
    features.comments_total_len = comments_len as f64;

    features
}

/// Aggregates every student in the dataset, in student-table order. Students
/// without rows get zero vectors.
pub fn aggregate_cohort(dataset: &Dataset, policy: CommentPolicy) -> Vec<(i64, FeatureVector)> {
    let mut courses: HashMap<i64, Vec<&CourseRecord>> = HashMap::new();
    for course in &dataset.courses {
        courses.entry(course.student_id).or_default().push(course);
    }

    let mut comments: HashMap<i64, Vec<&CommentRecord>> = HashMap::new();
    for comment in &dataset.comments {
        comments.entry(comment.student_id).or_default().push(comment);
    }

    dataset
        .students
        .iter()
        .map(|student| {
            let student_courses = courses.get(&student.id).map(Vec::as_slice).unwrap_or_default();
            let student_comments = comments.get(&student.id).map(Vec::as_slice).unwrap_or_default();
            let features = aggregate(
                student_courses.iter().copied(),
                student_comments.iter().copied(),
                policy,
            );
            (student.id, features)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StudentRecord, DELETED_COMMENT};
    use proptest::prelude::*;

    fn course(code: &str, name: &str, grade: &str, credit_hour: f64) -> CourseRecord {
        CourseRecord {
            id: 1,
            student_id: 1,
            course_name: name.to_string(),
            course_code: code.to_string(),
            course_description: None,
            grade: Some(grade.to_string()),
            credit_hour,
            score: None,
            created_at: None,
        }
    }

    fn comment(student_id: i64, content: &str) -> CommentRecord {
        CommentRecord {
            id: 1,
            student_id,
            commenter_id: None,
            content: Some(content.to_string()),
            created_at: None,
        }
    }

    #[test]
    fn empty_input_yields_zero_vector() {
        let features = aggregate([], [], CommentPolicy::default());
        assert_eq!(features, FeatureVector::default());
        assert_eq!(features.effective_gpa(), 0.0);
    }

    #[test]
    fn single_programming_course() {
        let courses = [course("EC2306", "OBJECT ORIENTED PROGRAMMING", "A", 3.0)];
        let features = aggregate(&courses, [], CommentPolicy::default());
        assert_eq!(features.total_units, 3.0);
        assert_eq!(features.avg_grade_point, 4.0);
        assert_eq!(features.num_courses, 1.0);
        assert_eq!(features.programming, DomainStats { gpa: 4.0, courses: 1.0 });
        assert_eq!(features.design, DomainStats::default());
        assert_eq!(features.diploma, DomainStats { gpa: 4.0, courses: 1.0 });
    }

    #[test]
    fn ungraded_courses_count_units_but_not_gpa() {
        let courses = [
            course("EC2104", "STRUCTURED PROGRAMMING", "B", 3.0),
            course("BM2001", "BASIC BUSINESS ADMINISTRATION", "CR", 3.0),
            course("EC3329", "SE PROJECT II", "EX", 4.0),
        ];
        let features = aggregate(&courses, [], CommentPolicy::default());
        assert_eq!(features.total_units, 10.0);
        assert_eq!(features.num_courses, 3.0);
        assert_eq!(features.graded_courses, 1.0);
        assert_eq!(features.avg_grade_point, 3.0);
        assert_eq!(features.soft_skills, DomainStats::default());
        assert_eq!(features.degree, DomainStats::default());
    }

    #[test]
    fn levels_are_partitioned() {
        let courses = [
            course("EC2310", "DATABASE DEVELOPMENT", "C", 3.0),
            course("EC3310", "DATABASE DEVELOPMENT", "A", 3.0),
            course("EC3312", "OPERATING SYSTEMS", "B", 3.0),
        ];
        let features = aggregate(&courses, [], CommentPolicy::default());
        assert_eq!(features.diploma, DomainStats { gpa: 2.0, courses: 1.0 });
        assert_eq!(features.degree, DomainStats { gpa: 3.5, courses: 2.0 });
        assert_eq!(features.effective_gpa(), 3.5);
        assert_eq!(features.infrastructure.courses, 3.0);
    }

    #[test]
    fn deleted_comments_follow_policy() {
        let comments = [comment(1, "Solid lab work"), comment(1, DELETED_COMMENT)];
        let excluded = aggregate([], &comments, CommentPolicy::ExcludeDeleted);
        assert_eq!(excluded.comments_count, 1.0);
        assert_eq!(excluded.comments_total_len, 14.0);

        let included = aggregate([], &comments, CommentPolicy::IncludeAll);
        assert_eq!(included.comments_count, 2.0);
        assert_eq!(included.comments_total_len, 14.0 + DELETED_COMMENT.len() as f64);
    }

    #[test]
    fn comment_length_counts_characters() {
        let comments = [comment(1, "très bien")];
        let features = aggregate([], &comments, CommentPolicy::default());
        assert_eq!(features.comments_total_len, 9.0);
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!("include-all".parse(), Ok(CommentPolicy::IncludeAll));
        assert_eq!(" Exclude-Deleted ".parse(), Ok(CommentPolicy::ExcludeDeleted));
        assert!("everything".parse::<CommentPolicy>().is_err());
    }

    #[test]
    fn cohort_covers_students_without_rows() {
        let student = |id: i64| StudentRecord {
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
        };
        let dataset = Dataset {
            students: vec![student(1), student(2)],
            courses: vec![course("EC2106", "WEB DEVELOPMENT", "B+", 3.0)],
            comments: vec![comment(2, "Engaged")],
            activities: Vec::new(),
        };

        let cohort = aggregate_cohort(&dataset, CommentPolicy::default());
        assert_eq!(cohort.len(), 2);
        assert_eq!(cohort[0].0, 1);
        assert_eq!(cohort[0].1.programming.gpa, 3.33);
        assert_eq!(cohort[0].1.comments_count, 0.0);
        assert_eq!(cohort[1].1.num_courses, 0.0);
        assert_eq!(cohort[1].1.comments_total_len, 7.0);
    }

    proptest! {
        #[test]
        fn aggregation_is_deterministic(
            rows in proptest::collection::vec(
                ("[A-Z]{2}[0-9]{4}", "[A-Z ]{0,30}", "(A\\+|A|A-|B\\+|B|B-|C\\+|C|D\\+|D|F|CR|SC|EX)", 1.0f64..6.0),
                0..20,
            ),
            texts in proptest::collection::vec(".{0,40}", 0..5),
        ) {
            let courses: Vec<CourseRecord> = rows
                .iter()
                .map(|(code, name, grade, credit)| course(code, name, grade, *credit))
                .collect();
            let comments: Vec<CommentRecord> = texts.iter().map(|t| comment(1, t)).collect();

            let first = aggregate(&courses, &comments, CommentPolicy::default());
            let second = aggregate(&courses, &comments, CommentPolicy::default());
            prop_assert_eq!(format!("{first:?}"), format!("{second:?}"));
            prop_assert!(first.avg_grade_point.is_finite());
            prop_assert!(first.avg_grade_point >= 0.0 && first.avg_grade_point <= 4.0);
        }
    }
}
