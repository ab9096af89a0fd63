//! Decision CLI Module
//!
//! Command-line interface for training model artifacts, scoring and
//! explaining single instances, and checking a model directory.

use clap::{Parser, Subcommand};
use colored::*;
use ndarray::Array1;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::explainability::{prediction_fn, ContributionExplainer, ExplainBudget, PerturbationExplainer};
use crate::features::{FeatureExtractor, FeatureMap, RawFeatures};
use crate::inference::{EngineConfig, HealthStatus, PredictionEngine};
use crate::models::{Model, ModelKind, PredictiveModel, TaskType};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(235, 110, 100) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<20} {}", muted(key), val.white());
}

fn bar(value: f64, scale: f64) -> String {
    let width = if scale > 0.0 { ((value.abs() / scale) * 24.0).round() as usize } else { 0 };
    let glyphs = "█".repeat(width.min(24));
    if value >= 0.0 {
        ok(&glyphs).to_string()
    } else {
        bad(&glyphs).to_string()
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "decision")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, score and explain tabular decision models")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model on a CSV file and save the artifact
    Train {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Model family (decision_tree, random_forest, neural_network, qda)
        #[arg(short, long, default_value = "random_forest")]
        model: String,

        /// Task type (classification, regression)
        #[arg(long, default_value = "classification")]
        task: String,

        /// Held-out share of the rows
        #[arg(long, default_value = "0.2")]
        validation_split: f64,

        /// Output artifact (defaults to models/<model>.bin)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score one instance with a saved model
    Predict {
        /// Model artifact
        #[arg(short, long)]
        model: PathBuf,

        /// Features as a JSON object, or @file.json
        #[arg(short, long)]
        features: String,

        /// Run the payload through the feature extractor first
        #[arg(long)]
        extract: bool,
    },

    /// Explain one prediction of a saved model
    Explain {
        /// Model artifact
        #[arg(short, long)]
        model: PathBuf,

        /// Features as a JSON object, or @file.json
        #[arg(short, long)]
        features: String,

        /// contribution (shap) or perturbation (lime)
        #[arg(long, default_value = "contribution")]
        method: String,

        /// Run the payload through the feature extractor first
        #[arg(long)]
        extract: bool,

        /// Attributions to show
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Show a saved model's summary
    Info {
        /// Model artifact
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Load a model directory and run the health check
    Health {
        /// Directory of model artifacts
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

// ─── Input loading ─────────────────────────────────────────────────────────────

pub fn load_csv(path: &Path) -> anyhow::Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Split `target` off `df` as a float vector
pub fn split_target(df: &DataFrame, target: &str) -> anyhow::Result<(DataFrame, Array1<f64>)> {
    let column = df.column(target)?.cast(&DataType::Float64)?;
    let values: Vec<Option<f64>> = column.f64()?.into_iter().collect();
    if values.iter().any(|v| v.is_none()) {
        anyhow::bail!("Target column '{}' has missing or non-numeric values", target);
    }
    let y: Array1<f64> = values.into_iter().flatten().collect();
    Ok((df.drop(target)?, y))
}

/// Parse a JSON object given inline or as `@path`
pub fn parse_raw(arg: &str) -> anyhow::Result<RawFeatures> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => arg.to_string(),
    };
    match serde_json::from_str::<serde_json::Value>(&text)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => anyhow::bail!("Features must be a JSON object"),
    }
}

fn feature_map(raw: RawFeatures, extract: bool) -> anyhow::Result<FeatureMap> {
    if extract {
        return Ok(FeatureExtractor::new().transform(&raw).to_feature_map());
    }
    Ok(serde_json::from_value(serde_json::Value::Object(raw))?)
}

fn parse_task(task: &str) -> anyhow::Result<TaskType> {
    match task {
        "classification" => Ok(TaskType::Classification),
        "regression" => Ok(TaskType::Regression),
        _ => anyhow::bail!("Invalid task type: {}", task),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    target: &str,
    model: &str,
    task: &str,
    validation_split: f64,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let df = load_csv(data_path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    let kind: ModelKind = model.parse()?;
    let task = parse_task(task)?;
    let (x, y) = split_target(&df, target)?;

    step_run(&format!("Training {}", kind.as_str().cyan()));
    let start = Instant::now();
    let mut model = Model::with_task(kind, task);
    let report = model.train(&x, &y, validation_split);
    if !report.is_success() {
        println!("{}", bad("failed"));
        anyhow::bail!("Training failed: {}", report.message.unwrap_or_default());
    }
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    for (name, value) in &report.metrics {
        kv(name, &format!("{:.4}", value));
    }
    if !report.cv_scores.is_empty() {
        let mean = report.cv_scores.iter().sum::<f64>() / report.cv_scores.len() as f64;
        kv("cv_mean", &format!("{:.4} ({} folds)", mean, report.cv_scores.len()));
    }

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("models").join(format!("{}.bin", kind)));
    step_run(&format!("Saving → {}", path.display()));
    model.save(&path)?;
    step_done("");
    println!();
    Ok(())
}

pub fn cmd_predict(model_path: &Path, features: &str, extract: bool) -> anyhow::Result<()> {
    section("Predict");
    let model = Model::load(model_path)?;
    let features = feature_map(parse_raw(features)?, extract)?;

    let prediction = model.predict(&features)?;
    kv("model", &format!("{} v{}", model.name(), model.version()));
    kv("prediction", &prediction.to_string());
    if let Some(confidence) = model.predict_proba(&features)? {
        kv("confidence", &format!("{:.4}", confidence));
    }
    if let Some(probabilities) = model.class_probabilities(&features)? {
        for (class, p) in probabilities {
            kv(&format!("  class {}", class), &format!("{:.4}", p));
        }
    }
    println!();
    Ok(())
}

pub fn cmd_explain(model_path: &Path, features: &str, method: &str, extract: bool, top: usize) -> anyhow::Result<()> {
    section("Explain");
    let model = Arc::new(Model::load(model_path)?);
    let features = feature_map(parse_raw(features)?, extract)?;
    let instance = model.encode(&features)?;
    let names = model.feature_names().to_vec();
    let name = model.name().to_string();

    let (attributions, baseline, label) = match method.to_lowercase().as_str() {
        "contribution" | "shap" => {
            let explainer = ContributionExplainer::new(true);
            if !explainer.create(&name, Arc::clone(&model), None) {
                anyhow::bail!("Could not build a contribution explainer for {}", name);
            }
            let explanation = explainer.explain(&name, &instance, Some(&names))?;
            let ranked: Vec<(String, f64)> = explanation
                .importance_ranking
                .iter()
                .map(|&i| (names[i].clone(), explanation.values[i]))
                .collect();
            (ranked, explanation.expected_value, explanation.strategy.to_string())
        }
        "perturbation" | "lime" => {
            let explainer = PerturbationExplainer::new(true);
            let background = model
                .background()
                .ok_or_else(|| anyhow::anyhow!("Model artifact carries no background rows"))?;
            let class_names = (model.task() == TaskType::Classification)
                .then(|| model.classes().iter().map(|c| c.to_string()).collect());
            explainer.create_explainer(background, &names, class_names, &name);
            let predict = prediction_fn(Arc::clone(&model));
            let explanation = explainer.explain_prediction(
                &name,
                &instance,
                &*predict,
                top,
                1000,
                &ExplainBudget::unbounded(),
            )?;
            let label = format!("surrogate r² {:.3}", explanation.score);
            (explanation.explanation_list, explanation.intercept, label)
        }
        other => anyhow::bail!("Unknown explanation method: {}", other),
    };

    kv("model", &format!("{} v{}", name, model.version()));
    kv("method", &label);
    kv("baseline", &format!("{:.4}", baseline));
    println!();

    let scale = attributions.iter().map(|(_, v)| v.abs()).fold(0.0, f64::max);
    for (feature, value) in attributions.iter().take(top) {
        println!("  {:<32} {:>+10.4} {}", feature, value, bar(*value, scale));
    }
    println!();
    Ok(())
}

pub fn cmd_info(model_path: &Path) -> anyhow::Result<()> {
    section("Model");
    let model = Model::load(model_path)?;
    let summary = model.summary();

    kv("name", &summary.name);
    kv("type", summary.kind.as_str());
    kv("version", &summary.version);
    kv("trained", &summary.is_trained.to_string());
    if let Some(date) = summary.training_date {
        kv("trained at", &date.to_rfc3339());
    }
    kv("features", &summary.feature_count.to_string());
    for (name, value) in &summary.performance_metrics {
        kv(name, &format!("{:.4}", value));
    }

    section("Top features");
    for (name, score) in model.ranked_feature_importance().iter().take(10) {
        println!("  {:<32} {:.4}", name, score);
    }
    println!();
    Ok(())
}

pub async fn cmd_health(dir: Option<&Path>) -> anyhow::Result<()> {
    section("Health");
    let mut config = EngineConfig::default();
    if let Some(dir) = dir {
        config = config.with_models_dir(dir);
    }
    let engine = PredictionEngine::new(config);
    let loaded = engine.load_models_from_dir()?;
    kv("artifacts loaded", &loaded.to_string());

    let report = engine.health_check().await;
    let status = match report.status {
        HealthStatus::Healthy => ok("healthy"),
        HealthStatus::Degraded => bad("degraded"),
    };
    println!("  {:<20} {}", muted("status"), status);
    println!();
    for (name, state) in &report.model_status {
        let marker = if state == "healthy" { ok("✓") } else { bad("✗") };
        println!("  {} {:<20} {}", marker, name, dim(state));
    }
    println!();
    Ok(())
}
