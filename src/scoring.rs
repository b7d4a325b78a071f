use serde::Serialize;

use crate::features::FeatureVector;

/// The six assessed skill dimensions, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Competency {
    Programming,
    Design,
    ItInfrastructure,
    CoCurricular,
    FeedbackSentiment,
    ProfessionalEngagement,
}

impl Competency {
    pub const ALL: [Competency; 6] = [
        Competency::Programming,
        Competency::Design,
        Competency::ItInfrastructure,
        Competency::CoCurricular,
        Competency::FeedbackSentiment,
        Competency::ProfessionalEngagement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Competency::Programming => "programming_score",
            Competency::Design => "design_score",
            Competency::ItInfrastructure => "it_infrastructure_score",
            Competency::CoCurricular => "co_curricular_points",
            Competency::FeedbackSentiment => "feedback_sentiment_score",
            Competency::ProfessionalEngagement => "professional_engagement_score",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreVector {
    pub programming_score: f64,
    pub design_score: f64,
    pub it_infrastructure_score: f64,
    pub co_curricular_points: f64,
    pub feedback_sentiment_score: f64,
    pub professional_engagement_score: f64,
}

impl ScoreVector {
    pub fn get(&self, competency: Competency) -> f64 {
        match competency {
            Competency::Programming => self.programming_score,
            Competency::Design => self.design_score,
            Competency::ItInfrastructure => self.it_infrastructure_score,
            Competency::CoCurricular => self.co_curricular_points,
            Competency::FeedbackSentiment => self.feedback_sentiment_score,
            Competency::ProfessionalEngagement => self.professional_engagement_score,
        }
    }

    fn get_mut(&mut self, competency: Competency) -> &mut f64 {
        match competency {
            Competency::Programming => &mut self.programming_score,
            Competency::Design => &mut self.design_score,
            Competency::ItInfrastructure => &mut self.it_infrastructure_score,
            Competency::CoCurricular => &mut self.co_curricular_points,
            Competency::FeedbackSentiment => &mut self.feedback_sentiment_score,
            Competency::ProfessionalEngagement => &mut self.professional_engagement_score,
        }
    }

    pub fn to_array(&self) -> [f64; 6] {
        Competency::ALL.map(|competency| self.get(competency))
    }

    fn map(mut self, f: impl Fn(Competency, f64) -> f64) -> Self {
        for competency in Competency::ALL {
            let slot = self.get_mut(competency);
            *slot = f(competency, *slot);
        }
        self
    }
}

/// Unbounded formula values, before blending and clamping. These are also the
/// training labels.
pub fn formula_scores(features: &FeatureVector) -> ScoreVector {
    let fallback = features.effective_gpa();

    let programming_score = if features.programming.courses > 0.0 {
        features.programming.gpa * 25.0 + features.programming.courses * 2.5
    } else {
        fallback * 20.0
    };

    let design_score = if features.design.courses > 0.0 {
        features.design.gpa * 25.0 + features.soft_skills.gpa * 15.0 + features.design.courses * 5.0
    } else {
        fallback * 20.0
    };

    let it_infrastructure_score = if features.infrastructure.courses > 0.0 {
        features.infrastructure.gpa * 25.0
            + features.theory.gpa * 15.0
            + features.infrastructure.courses * 3.0
    } else {
        fallback * 20.0
    };

    let co_curricular_points = features.soft_skills.courses * 8.0
        + features.soft_skills.gpa * 15.0
        + features.total_units * 0.3;

    let feedback_sentiment_score = if features.comments_count > 0.0 {
        (50.0 + features.comments_total_len * 0.05).min(100.0)
    } else {
        fallback * 15.0
    };

    // Stays on comment volume until portfolio and social-profile signals exist.
    let professional_engagement_score =
        features.comments_total_len * 0.1 + features.avg_grade_point * 10.0;

    ScoreVector {
        programming_score,
        design_score,
        it_infrastructure_score,
        co_curricular_points,
        feedback_sentiment_score,
        professional_engagement_score,
    }
}

/// Weight given to the closed-form formula when a model prediction is blended
/// in. Domain scores lean on the formula only when the student has courses in
/// that domain.
pub fn formula_weight(competency: Competency, features: &FeatureVector) -> f64 {
    let domain_weight = |courses: f64, weight: f64| if courses > 0.0 { weight } else { 0.3 };
    match competency {
        Competency::Programming => domain_weight(features.programming.courses, 0.7),
        Competency::Design => domain_weight(features.design.courses, 0.6),
        Competency::ItInfrastructure => domain_weight(features.infrastructure.courses, 0.65),
        Competency::CoCurricular
        | Competency::FeedbackSentiment
        | Competency::ProfessionalEngagement => 0.5,
    }
}

/// Clamps to [0, 100] and rounds to two decimals. NaN maps to zero.
pub fn bound(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let clamped = value.clamp(0.0, 100.0);
    (clamped * 100.0).round() / 100.0
}

/// Scores a student. `prediction` is the model output for the baseline
/// features, one value per [`Competency`] in `Competency::ALL` order.
pub fn score(features: &FeatureVector, prediction: Option<&[f64; 6]>) -> ScoreVector {
    let formulas = formula_scores(features);
    let blended = match prediction {
        Some(predicted) => formulas.map(|competency, formula| {
            let weight = formula_weight(competency, features);
            let model = predicted[competency as usize];
            weight * formula + (1.0 - weight) * model
        }),
        None => formulas,
    };
    blended.map(|_, value| bound(value))
}
