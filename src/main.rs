use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

mod catalog;
mod config;
mod dataset;
mod db;
mod error;
mod features;
mod generator;
mod grades;
mod model;
mod models;
mod predict;
mod report;
mod scoring;
mod training;

use crate::config::Settings;
use crate::error::ScoringError;
use crate::features::CommentPolicy;
use crate::predict::Prediction;

#[derive(Parser)]
#[command(name = "competency-scorer")]
#[command(about = "Student competency scoring: dataset tooling, model training and prediction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Generate a synthetic cohort as CSV tables
    Generate {
        #[arg(long, default_value_t = 500)]
        num: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Maximum lecturer comments per student (0 skips comments)
        #[arg(long, default_value_t = 0)]
        max_comments: usize,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also insert the generated rows into Postgres
        #[arg(long)]
        upload: bool,
    },
    /// Export every table from Postgres to CSV
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Train the score model from CSV tables
    Train {
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long, default_value_t = 200)]
        trees: usize,
        /// Limit tree depth (unbounded by default)
        #[arg(long)]
        max_depth: Option<u16>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long)]
        comment_policy: Option<CommentPolicy>,
        /// Write a markdown training report
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Predict the six competency scores for one student (JSON on stdout)
    Predict {
        student_id: String,
        #[arg(long)]
        model: Option<PathBuf>,
        /// Read student rows from a CSV directory instead of Postgres
        #[arg(long)]
        from_csv: Option<PathBuf>,
        #[arg(long)]
        comment_policy: Option<CommentPolicy>,
    },
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    let database_url = settings.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Resolves the student source for `predict` and runs it. Every failure is
/// folded into the returned payload.
async fn run_prediction(
    settings: &Settings,
    student_id: &str,
    model: Option<PathBuf>,
    from_csv: Option<PathBuf>,
    comment_policy: Option<CommentPolicy>,
) -> Prediction {
    let model_path = model.unwrap_or_else(|| settings.model_path.clone());
    let policy = comment_policy.unwrap_or(settings.comment_policy);

    match from_csv {
        Some(dir) => match dataset::load_dir(&dir) {
            Ok(dataset) => {
                predict::predict_scores(&dataset, student_id, &model_path, policy).await
            }
            Err(err) => Prediction::failure(&err),
        },
        None => match settings.require_database_url().and_then(|url| {
            PgPoolOptions::new()
                .max_connections(5)
                .connect_lazy(url)
                .context("invalid DATABASE_URL")
        }) {
            Ok(pool) => {
                predict::predict_scores(&pool, student_id, &model_path, policy).await
            }
            Err(err) => Prediction::failure(&ScoringError::Other(err)),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("competency_scorer=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load();

    match cli.command {
        Commands::InitDb => {
            let settings = settings?;
            let pool = connect(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Generate {
            num,
            seed,
            max_comments,
            out,
            upload,
        } => {
            let settings = settings?;
            let out = out.unwrap_or_else(|| settings.output_dir.clone());
            let dataset = generator::generate(&generator::GeneratorConfig {
                students: num,
                seed,
                max_comments,
                generated_at: Utc::now(),
            })?;
            let written = dataset::save_dir(&dataset, &out)?;
            for path in &written {
                println!("Saved: {}", path.display());
            }

            if upload {
                let pool = connect(&settings).await?;
                let summary = db::upload_dataset(&pool, &dataset).await?;
                println!(
                    "Uploaded {} students, {} courses and {} comments.",
                    summary.students, summary.courses, summary.comments
                );
            }
        }
        Commands::Export { out } => {
            let settings = settings?;
            let out = out.unwrap_or_else(|| settings.output_dir.clone());
            let pool = connect(&settings).await?;
            let dataset = db::fetch_dataset(&pool).await?;
            dataset::save_dir(&dataset, &out)?;

            let summary = dataset::summarize(&dataset);
            println!("Total students: {}", summary.students);
            println!("Total courses: {}", summary.courses);
            println!("Total comments: {}", summary.comments);
            println!("Total co-curricular activities: {}", summary.activities);
            println!(
                "Stored scores: {} feedback sentiment, {} professional engagement",
                summary.with_feedback_score, summary.with_engagement_score
            );
            if let Some(avg) = summary.avg_feedback_score {
                println!("Average feedback sentiment: {avg:.2}");
            }
            println!("Export written to {}.", out.display());
        }
        Commands::Train {
            data_dir,
            model,
            trees,
            max_depth,
            seed,
            comment_policy,
            report,
        } => {
            let settings = settings?;
            let data_dir = data_dir.unwrap_or_else(|| settings.output_dir.clone());
            let model_path = model.unwrap_or_else(|| settings.model_path.clone());
            let dataset = dataset::load_dir(&data_dir)
                .with_context(|| format!("failed to load tables from {}", data_dir.display()))?;

            let options = training::TrainOptions {
                params: model::ForestParams {
                    n_trees: trees,
                    max_depth,
                    seed,
                    ..model::ForestParams::default()
                },
                comment_policy: comment_policy.unwrap_or(settings.comment_policy),
                ..training::TrainOptions::default()
            };
            let run = training::train(&dataset, &options)?;
            run.model.save(&model_path)?;
            println!("Model saved: {}", model_path.display());

            for metric in &run.metrics {
                println!(
                    "- {}: MAE {:.4}, RMSE {:.4}, R2 {:.4}",
                    metric.output, metric.mae, metric.rmse, metric.r2
                );
            }

            if let Some(out) = report {
                let text = report::build_report(
                    Utc::now(),
                    &dataset::summarize(&dataset),
                    &run,
                    &model_path.display().to_string(),
                );
                std::fs::write(&out, text)?;
                println!("Report written to {}.", out.display());
            }
        }
        Commands::Predict {
            student_id,
            model,
            from_csv,
            comment_policy,
        } => {
            let prediction = match settings {
                Ok(settings) => {
                    run_prediction(&settings, &student_id, model, from_csv, comment_policy).await
                }
                Err(err) => Prediction::failure(&ScoringError::Other(err)),
            };

            println!("{}", serde_json::to_string(&prediction)?);
            if !prediction.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
