use chrono::{DateTime, Duration, Utc};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::error::{Result, ScoringError};
use crate::models::{CommentRecord, CourseRecord, Dataset, StudentRecord, DELETED_COMMENT};

const PROGRAMS: [&str; 9] = [
    "Bachelor in Computer Science (Honours) (Artificial Intelligence)",
    "Bachelor in Information Technology (Cybersecurity) (Honours)",
    "Bachelor of Software Engineering (Honours) (Application Development) ODL",
    "Bachelor of Computer Science (Honours) (Data Science)",
    "Bachelor of Information Technology (Hons)",
    "Bachelor of Information Technology (Hons) (Internet Engineering and Cloud Computing)",
    "Bachelor in Software Engineering (Honours)",
    "Diploma in Computer Science",
    "Diploma in Information Technology",
];

struct BaseCourse {
    code: &'static str,
    name: &'static str,
    credit_hour: f64,
}

const fn base(code: &'static str, name: &'static str, credit_hour: f64) -> BaseCourse {
    BaseCourse {
        code,
        name,
        credit_hour,
    }
}

const BASE_COURSES: [BaseCourse; 19] = [
    base("BM2001", "BASIC BUSINESS ADMINISTRATION", 3.0),
    base("BM2002", "PRINCIPLES OF MICROECONOMICS", 3.0),
    base("BM2003", "PRINCIPLES OF MACROECONOMICS", 3.0),
    base("EC2100", "UNDERSTANDING COMPUTING", 3.0),
    base("EC2103", "COMPUTER ORGANISATION", 3.0),
    base("EC2104", "STRUCTURED PROGRAMMING", 3.0),
    base("EC2106", "WEB DEVELOPMENT", 3.0),
    base("EC2107", "CALCULUS AND ALGEBRA", 3.0),
    base("EC2306", "OBJECT ORIENTED PROGRAMMING", 3.0),
    base("EC2310", "DATABASE DEVELOPMENT", 3.0),
    base("EC2312", "OPERATING SYSTEMS", 3.0),
    base("EC2314", "INFORMATION SYSTEMS", 3.0),
    base("EC2320", "SUMMATIVE (COMPUTING PROJECT)", 4.0),
    base("EC2321", "DATA COMM AND NETWORKING", 3.0),
    base("EC3328", "SE PROJECT I", 2.0),
    base("EC3329", "SE PROJECT II", 4.0),
    base("EC3357", "MACHINE LEARNING", 3.0),
    base("EC3374", "BACK-END WEB DEVELOPMENT", 3.0),
    base("MPU3112", "PHILOSOPHY & CURRENT ISSUES", 2.0),
];

const GRADES: [&str; 14] = [
    "A+", "A", "A-", "B+", "B", "B-", "C+", "C", "D+", "D", "F", "CR", "SC", "EX",
];
const GRADE_WEIGHTS: [f64; 14] = [
    0.06, 0.08, 0.07, 0.12, 0.20, 0.12, 0.10, 0.08, 0.06, 0.05, 0.03, 0.02, 0.01, 0.00,
];

const FIRST_NAMES: [&str; 13] = [
    "Ahmad", "Aisha", "Lim", "Chun", "Siti", "John", "Mary", "Ali", "Nur", "Hassan", "Wei",
    "Sofia", "Ibrahim",
];
const LAST_NAMES: [&str; 10] = [
    "Bin", "Binti", "Tan", "Lim", "Kumar", "Smith", "Lee", "Wong", "Ng", "Hussein",
];

const COMMENT_TEMPLATES: [&str; 8] = [
    "Consistently submits lab work on time and asks thoughtful questions.",
    "Needs to participate more during tutorials.",
    "Strong grasp of programming fundamentals; helped peers debug their projects.",
    "Presentation skills have improved noticeably this semester.",
    "Struggled with the networking assignment but sought help early.",
    "Shows initiative in group projects and communicates clearly with the team.",
    "Attendance has been irregular; follow up recommended.",
    "Excellent final project with a well-documented design.",
];

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub students: usize,
    pub seed: u64,
    /// Upper bound on lecturer comments per student; zero disables them.
    pub max_comments: usize,
    pub generated_at: DateTime<Utc>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            students: 500,
            seed: 42,
            max_comments: 0,
            generated_at: Utc::now(),
        }
    }
}

struct GeneratedCourse {
    code: String,
    name: &'static str,
    grade: &'static str,
    credit_hour: f64,
}

/// Produces a synthetic cohort. The same seed always yields the same
/// students, course histories and comments.
pub fn generate(config: &GeneratorConfig) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let grade_dist = WeightedIndex::new(GRADE_WEIGHTS)
        .map_err(|err| ScoringError::Data(format!("invalid grade weights: {err}")))?;
    let mut dataset = Dataset::default();

    for index in 1..=config.students {
        let id = index as i64;
        let program = *PROGRAMS.choose(&mut rng).unwrap_or(&PROGRAMS[0]);
        let is_diploma = program.to_lowercase().starts_with("diploma");
        let age_days = rng.gen_range(18..=28) * 365 + rng.gen_range(0..=365);

        dataset.students.push(StudentRecord {
            id,
            name: random_name(&mut rng, index),
            gender: ["Male", "Female", "Other"].choose(&mut rng).map(|g| g.to_string()),
            dob: Some((config.generated_at - Duration::days(age_days)).date_naive()),
            image_url: Some(format!("https://api.example.com/avatar/{index}.jpg")),
            description: None,
            analysis: Some("{}".to_string()),
            level: Some(if is_diploma { "Diploma" } else { "Degree" }.to_string()),
            program: Some(program.to_string()),
            created_at: Some(config.generated_at),
            cgpa: None,
            feedback_sentiment_score: None,
            professional_engagement_score: None,
        });

        for course in pick_courses(&mut rng, &grade_dist, is_diploma) {
            dataset.courses.push(CourseRecord {
                id: dataset.courses.len() as i64 + 1,
                student_id: id,
                course_name: course.name.to_string(),
                course_code: course.code,
                course_description: None,
                grade: Some(course.grade.to_string()),
                credit_hour: course.credit_hour,
                score: None,
                created_at: Some(config.generated_at),
            });
        }

        if config.max_comments > 0 {
            for _ in 0..rng.gen_range(0..=config.max_comments) {
                let content = if rng.gen_bool(0.05) {
                    DELETED_COMMENT
                } else {
                    *COMMENT_TEMPLATES.choose(&mut rng).unwrap_or(&COMMENT_TEMPLATES[0])
                };
                dataset.comments.push(CommentRecord {
                    id: dataset.comments.len() as i64 + 1,
                    student_id: id,
                    commenter_id: Some(uuid::Builder::from_random_bytes(rng.gen()).into_uuid()),
                    content: Some(content.to_string()),
                    created_at: Some(config.generated_at),
                });
            }
        }
    }

    tracing::info!(
        students = dataset.students.len(),
        courses = dataset.courses.len(),
        comments = dataset.comments.len(),
        seed = config.seed,
        "generated synthetic dataset"
    );
    Ok(dataset)
}

fn random_name(rng: &mut StdRng, index: usize) -> String {
    let first = FIRST_NAMES.choose(rng).unwrap_or(&FIRST_NAMES[0]);
    let last = LAST_NAMES.choose(rng).unwrap_or(&LAST_NAMES[0]);
    format!("{first} {last}_{index}")
}

fn pick_courses(
    rng: &mut StdRng,
    grade_dist: &WeightedIndex<f64>,
    is_diploma: bool,
) -> Vec<GeneratedCourse> {
    let years = if is_diploma {
        rng.gen_range(2..=3)
    } else {
        rng.gen_range(3..=4)
    };
    // two long semesters and one short semester per year
    let semesters = years * 3;
    let mut courses = Vec::new();

    for semester in 1..=semesters {
        let count = if semester % 3 == 0 {
            rng.gen_range(3..=4)
        } else if is_diploma {
            rng.gen_range(4..=6)
        } else {
            rng.gen_range(5..=6)
        };

        for _ in 0..count {
            let base = &BASE_COURSES[rng.gen_range(0..BASE_COURSES.len())];
            let code = if is_diploma {
                if base.code.starts_with("EC3") {
                    base.code.replacen('3', "2", 1)
                } else {
                    base.code.to_string()
                }
            } else if base.code.starts_with("EC2") && rng.gen_bool(0.5) {
                base.code.replacen('2', "3", 1)
            } else {
                base.code.to_string()
            };

            let mut grade = GRADES[grade_dist.sample(rng)];
            // degree students often carry diploma-level credit over
            let transferable = ["BM", "EC2", "MPU"].iter().any(|p| code.starts_with(p));
            if !is_diploma && transferable && rng.gen_bool(0.25) {
                grade = "CR";
            }

            courses.push(GeneratedCourse {
                code,
                name: base.name,
                grade,
                credit_hour: base.credit_hour,
            });
        }
    }

    courses
}
