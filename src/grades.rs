use std::str::FromStr;

/// Letter grades that can appear on a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LetterGrade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    DPlus,
    D,
    F,
    /// Credit transferred from a previous qualification.
    CreditTransfer,
    /// Special code used for internships.
    Special,
    Exempt,
}

impl LetterGrade {
    pub const ALL: [LetterGrade; 14] = [
        LetterGrade::APlus,
        LetterGrade::A,
        LetterGrade::AMinus,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::BMinus,
        LetterGrade::CPlus,
        LetterGrade::C,
        LetterGrade::DPlus,
        LetterGrade::D,
        LetterGrade::F,
        LetterGrade::CreditTransfer,
        LetterGrade::Special,
        LetterGrade::Exempt,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::AMinus => "A-",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::BMinus => "B-",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::DPlus => "D+",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
            LetterGrade::CreditTransfer => "CR",
            LetterGrade::Special => "SC",
            LetterGrade::Exempt => "EX",
        }
    }

    /// Grade point on the 4.0 scale, or `None` for codes that carry credit
    /// without a grade.
    pub fn grade_point(self) -> Option<f64> {
        match self {
            LetterGrade::APlus | LetterGrade::A => Some(4.0),
            LetterGrade::AMinus => Some(3.67),
            LetterGrade::BPlus => Some(3.33),
            LetterGrade::B => Some(3.0),
            LetterGrade::BMinus => Some(2.67),
            LetterGrade::CPlus => Some(2.33),
            LetterGrade::C => Some(2.0),
            LetterGrade::DPlus => Some(1.33),
            LetterGrade::D => Some(1.0),
            LetterGrade::F => Some(0.0),
            LetterGrade::CreditTransfer | LetterGrade::Special | LetterGrade::Exempt => None,
        }
    }
}

impl FromStr for LetterGrade {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_uppercase();
        LetterGrade::ALL
            .into_iter()
            .find(|grade| grade.symbol() == normalized)
            .ok_or_else(|| format!("unrecognised grade {raw:?}"))
    }
}

/// Maps a free-text grade to its grade point. Unknown and non-gradable codes
/// come back as `None`, never as zero.
pub fn grade_point(raw: &str) -> Option<f64> {
    raw.parse::<LetterGrade>().ok().and_then(LetterGrade::grade_point)
}
