use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::dataset::DatasetSummary;
use crate::training::{OutputMetrics, TrainingRun, MIN_SPLIT_SAMPLES};

pub fn best_and_worst(metrics: &[OutputMetrics]) -> Option<(&OutputMetrics, &OutputMetrics)> {
    let best = metrics
        .iter()
        .max_by(|a, b| a.r2.partial_cmp(&b.r2).unwrap_or(std::cmp::Ordering::Equal))?;
    let worst = metrics
        .iter()
        .min_by(|a, b| a.r2.partial_cmp(&b.r2).unwrap_or(std::cmp::Ordering::Equal))?;
    Some((best, worst))
}

pub fn build_report(
    generated_at: DateTime<Utc>,
    summary: &DatasetSummary,
    run: &TrainingRun,
    model_path: &str,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Competency Model Training Report");
    let _ = writeln!(
        output,
        "Generated {} (model written to `{}`)",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        model_path
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Dataset");
    let _ = writeln!(output, "- Students: {}", summary.students);
    let _ = writeln!(output, "- Courses: {}", summary.courses);
    let _ = writeln!(output, "- Comments: {}", summary.comments);
    let _ = writeln!(
        output,
        "- Stored feedback sentiment scores: {}",
        summary.with_feedback_score
    );
    let _ = writeln!(
        output,
        "- Stored professional engagement scores: {}",
        summary.with_engagement_score
    );
    if let Some(avg) = summary.avg_feedback_score {
        let _ = writeln!(output, "- Average stored feedback sentiment: {avg:.2}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Split");
    if run.held_out {
        let _ = writeln!(
            output,
            "Trained on {} students, evaluated on {} held out.",
            run.train_rows, run.test_rows
        );
    } else {
        let _ = writeln!(
            output,
            "Only {} students (fewer than {}); trained and evaluated on the full set.",
            run.samples, MIN_SPLIT_SAMPLES
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Evaluation");

    if run.metrics.is_empty() {
        let _ = writeln!(output, "No outputs were evaluated.");
    } else {
        let _ = writeln!(output, "| Output | MAE | RMSE | R2 |");
        let _ = writeln!(output, "|---|---|---|---|");
        for metric in &run.metrics {
            let _ = writeln!(
                output,
                "| {} | {:.4} | {:.4} | {:.4} |",
                metric.output, metric.mae, metric.rmse, metric.r2
            );
        }
    }

    if let Some((best, worst)) = best_and_worst(&run.metrics) {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Highlights");
        let _ = writeln!(output, "- Best fit: {} (R2 {:.4})", best.output, best.r2);
        let _ = writeln!(output, "- Weakest fit: {} (R2 {:.4})", worst.output, worst.r2);
    }

    output
}
