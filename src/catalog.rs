use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    Programming,
    Design,
    Infrastructure,
    SoftSkills,
    Theory,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Programming,
        Domain::Design,
        Domain::Infrastructure,
        Domain::SoftSkills,
        Domain::Theory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Programming => "programming",
            Domain::Design => "design",
            Domain::Infrastructure => "infrastructure",
            Domain::SoftSkills => "soft_skills",
            Domain::Theory => "theory",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Domain::Programming => &[
                "PROGRAMMING",
                "CODING",
                "PYTHON",
                "C PROG",
                "OBJECT ORIENTED",
                "WEB DEVELOPMENT",
                "MOBILE APP",
                "SOFTWARE DEV",
                "BACK-END",
                "FRONT-END",
                "DATA STRUCT",
                "ALGORITHM",
                "SOFTWARE DESIGN PATTERN",
            ],
            Domain::Design => &[
                "DESIGN",
                "HCI",
                "HUMAN COMPUTER",
                "INTERACTION",
                "USER EXPERIENCE",
                "SOFTWARE ARCHITECT",
                "MODELING",
                "ANALYSIS",
                "UML",
                "UI",
            ],
            Domain::Infrastructure => &[
                "NETWORK",
                "OPERATING SYSTEM",
                "SECURITY",
                "DATABASE",
                "CLOUD",
                "DATA COMM",
                "COMPUTER ORG",
                "ARCHITECTURE",
                "INFRASTRUCTURE",
                "SYSTEM ADMIN",
                "SERVER",
            ],
            Domain::SoftSkills => &[
                "MPU",
                "SPEAKING",
                "COMMUNICATION",
                "MANAGEMENT",
                "ENTREPRENEUR",
                "BUSINESS",
                "PROJECT MANAGE",
                "PROFESSIONAL",
                "ETHICS",
                "PHILOSOPHY",
                "CRITICAL THINKING",
                "PRESENTATION",
            ],
            Domain::Theory => &[
                "CALCULUS",
                "MATHEMATICS",
                "DISCRETE",
                "ALGORITHM",
                "THEORY",
                "ARTIFICIAL INT",
                "MACHINE LEARNING",
                "DATA MINING",
                "STATISTICS",
            ],
        }
    }

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-exclusive set of domain tags for one course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainSet(u8);

impl DomainSet {
    pub fn insert(&mut self, domain: Domain) {
        self.0 |= domain.bit();
    }

    pub fn contains(self, domain: Domain) -> bool {
        self.0 & domain.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_subset(self, other: DomainSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Domain> {
        Domain::ALL.into_iter().filter(move |domain| self.contains(*domain))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CourseLevel {
    /// 2000-series courses.
    Diploma,
    /// 3000-series courses.
    Degree,
    Other(u8),
}

impl CourseLevel {
    fn from_digit(digit: u8) -> Self {
        match digit {
            2 => CourseLevel::Diploma,
            3 => CourseLevel::Degree,
            other => CourseLevel::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseCategory {
    pub domains: DomainSet,
    pub level: CourseLevel,
}

static LEVEL_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\D*(\d)").expect("level pattern is valid"));

/// Reads the level from the first digit of a course code, skipping the letter
/// prefix and any separators. Codes without a digit are treated as diploma
/// courses.
pub fn course_level(course_code: &str) -> CourseLevel {
    LEVEL_DIGIT
        .captures(course_code)
        .and_then(|caps| caps.get(1))
        .and_then(|digit| digit.as_str().parse::<u8>().ok())
        .map(CourseLevel::from_digit)
        .unwrap_or(CourseLevel::Diploma)
}

pub fn categorize(course_code: &str, course_name: &str) -> CourseCategory {
    let combined = format!("{course_code} {course_name}").to_uppercase();
    let mut domains = DomainSet::default();

    for domain in Domain::ALL {
        if domain
            .keywords()
            .iter()
            .any(|keyword| combined.contains(keyword))
        {
            domains.insert(domain);
        }
    }

    CourseCategory {
        domains,
        level: course_level(course_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tags_programming_courses() {
        let category = categorize("EC2306", "OBJECT ORIENTED PROGRAMMING");
        assert!(category.domains.contains(Domain::Programming));
        assert!(!category.domains.contains(Domain::Infrastructure));
        assert_eq!(category.level, CourseLevel::Diploma);
    }

    #[test]
    fn tags_can_overlap() {
        let category = categorize("EC3101", "DATA STRUCTURES AND ALGORITHMS");
        assert!(category.domains.contains(Domain::Programming));
        assert!(category.domains.contains(Domain::Theory));
        assert_eq!(category.level, CourseLevel::Degree);
    }

    #[test]
    fn matching_ignores_case() {
        let category = categorize("ec2321", "data comm and networking");
        assert!(category.domains.contains(Domain::Infrastructure));
    }

    #[test]
    fn course_code_prefix_can_tag() {
        let category = categorize("MPU3112", "PHILOSOPHY & CURRENT ISSUES");
        assert!(category.domains.contains(Domain::SoftSkills));
        assert_eq!(category.level, CourseLevel::Degree);
    }

    #[test]
    fn unmatched_course_has_no_tags() {
        let category = categorize("BM2002", "PRINCIPLES OF MICROECONOMICS");
        assert!(category.domains.is_empty());
    }

    #[test]
    fn level_defaults_to_diploma() {
        assert_eq!(course_level(""), CourseLevel::Diploma);
        assert_eq!(course_level("PROJECT"), CourseLevel::Diploma);
        assert_eq!(course_level("EC3357"), CourseLevel::Degree);
        assert_eq!(course_level("BM2001"), CourseLevel::Diploma);
        assert_eq!(course_level("CS4001"), CourseLevel::Other(4));
    }

    #[test]
    fn level_skips_separators() {
        assert_eq!(course_level("EC-3357"), CourseLevel::Degree);
        assert_eq!(course_level("ec_2104"), CourseLevel::Diploma);
        assert_eq!(course_level("MPU 3112"), CourseLevel::Degree);
        assert_eq!(course_level("EC/4001"), CourseLevel::Other(4));
    }

    proptest! {
        #[test]
        fn adding_a_keyword_never_removes_tags(
            name in "[A-Za-z ]{0,40}",
            domain_index in 0usize..5,
            keyword_index in any::<proptest::sample::Index>(),
        ) {
            let domain = Domain::ALL[domain_index];
            let keyword = *keyword_index.get(domain.keywords());

            let before = categorize("EC2000", &name);
            let after = categorize("EC2000", &format!("{name} {keyword}"));

            prop_assert!(before.domains.is_subset(after.domains));
            prop_assert!(after.domains.contains(domain));
        }
    }
}
