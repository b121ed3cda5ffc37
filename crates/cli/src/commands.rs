use crate::config::AppConfig;
use crate::dataset::{read_records, write_records};
use actionplan_categorize::{train_classifier, train_clusterer, ClassifierModel};
use actionplan_fewshot::{HttpGenerator, Pipeline};
use actionplan_protocol::generation_result_schema;
use actionplan_vector_store::build_embedder;
use anyhow::{bail, Context as AnyhowContext, Result};
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// Cluster the dataset, write it back with `category` filled, summarize the groups.
pub async fn cluster(config: &AppConfig, dataset: &Path, output: &Path) -> Result<Value> {
    let records = read_records(dataset)?;
    let embedder = build_embedder(&config.embedding)?;

    let assignment = train_clusterer(embedder.as_ref(), &records, &config.cluster)
        .await
        .context("Clustering failed")?;
    let labeled = assignment.apply(&records);
    write_records(output, &labeled)?;

    Ok(json!({
        "records": labeled.len(),
        "clusters": assignment.clusters(),
        "counts": assignment.counts(),
        "output": output.display().to_string(),
    }))
}

/// Fit the category classifier and save it as JSON.
pub async fn train(config: &AppConfig, dataset: &Path, output: &Path) -> Result<Value> {
    let records = read_records(dataset)?;
    let embedder = build_embedder(&config.embedding)?;

    let model = train_classifier(embedder.as_ref(), &records, &config.classifier)
        .await
        .context("Training failed")?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, model.to_json()?)
        .with_context(|| format!("Failed to write model {}", output.display()))?;
    log::info!("Saved classifier with {} pairs to {}", model.len(), output.display());

    Ok(json!({
        "records": records.len(),
        "trained_on": model.len(),
        "labels": model.labels(),
        "embedder": model.embedder_id(),
        "output": output.display().to_string(),
    }))
}

pub struct RunOptions<'a> {
    pub dataset: &'a Path,
    pub model: &'a Path,
    pub text: &'a str,
    pub explain: bool,
    pub dry_run: bool,
}

/// Answer one request. Prints the result, or the whole trace with `explain`/`dry_run`.
pub async fn run(config: &AppConfig, options: RunOptions<'_>) -> Result<Value> {
    let text = read_request(options.text)?;
    let records = read_records(options.dataset)?;
    let model = load_model(options.model)?;

    let embedder = build_embedder(&config.embedding)?;
    let generator = Arc::new(HttpGenerator::new(&config.generation)?);
    let pipeline = Pipeline::new(embedder, generator, config.pipeline.clone());

    if options.dry_run {
        let trace = pipeline.prepare(&text, &records, &model).await?;
        return Ok(serde_json::to_value(trace)?);
    }

    let trace = pipeline.run_traced(&text, &records, &model).await?;
    if options.explain {
        Ok(serde_json::to_value(trace)?)
    } else {
        Ok(serde_json::to_value(trace.result)?)
    }
}

pub fn schema() -> Value {
    generation_result_schema()
}

fn load_model(path: &Path) -> Result<ClassifierModel> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model {}", path.display()))?;
    let model = ClassifierModel::from_json(&raw)
        .with_context(|| format!("Invalid model {}", path.display()))?;
    log::info!(
        "Loaded classifier ({} pairs, embedder {}) from {}",
        model.len(),
        model.embedder_id(),
        path.display()
    );
    Ok(model)
}

/// `-` reads the request from stdin.
fn read_request(text: &str) -> Result<String> {
    let text = if text == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        text.to_string()
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        bail!("request text is empty");
    }
    Ok(text)
}
