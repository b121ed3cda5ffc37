use actionplan_categorize::{ClassifierConfig, ClusterConfig};
use actionplan_fewshot::{GenerationConfig, PipelineConfig};
use actionplan_vector_store::{EmbeddingBackendConfig, HttpEmbeddingConfig, OnnxConfig};
use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "actionplan.toml";

pub const ENV_EMBEDDING_MODE: &str = "ACTIONPLAN_EMBEDDING_MODE";
pub const ENV_MODEL_DIR: &str = "ACTIONPLAN_MODEL_DIR";
pub const ENV_GENERATION_URL: &str = "ACTIONPLAN_GENERATION_URL";
pub const ENV_GENERATION_MODEL: &str = "ACTIONPLAN_GENERATION_MODEL";

/// Everything the binary can be configured with, one section per component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub embedding: EmbeddingBackendConfig,
    pub cluster: ClusterConfig,
    pub classifier: ClassifierConfig,
    pub pipeline: PipelineConfig,
    pub generation: GenerationConfig,
}

impl AppConfig {
    /// Read `path`, or `actionplan.toml` in the working directory when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    log::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(mode) = lookup(ENV_EMBEDDING_MODE) {
            self.set_embedding_mode(&mode)
                .with_context(|| format!("Invalid {ENV_EMBEDDING_MODE}"))?;
        }
        if let Some(dir) = lookup(ENV_MODEL_DIR) {
            self.set_model_dir(PathBuf::from(dir));
        }
        if let Some(url) = lookup(ENV_GENERATION_URL) {
            self.generation.base_url = url;
        }
        if let Some(model) = lookup(ENV_GENERATION_MODEL) {
            self.generation.model = model;
        }
        Ok(())
    }

    /// Switch embedding backend, keeping the current settings if the mode is unchanged.
    pub fn set_embedding_mode(&mut self, mode: &str) -> Result<()> {
        let mode = mode.trim().to_ascii_lowercase();
        if self.embedding.mode() == mode {
            return Ok(());
        }
        self.embedding = match mode.as_str() {
            "stub" => EmbeddingBackendConfig::stub(),
            "onnx" => EmbeddingBackendConfig::Onnx(OnnxConfig::default()),
            "http" => EmbeddingBackendConfig::Http(HttpEmbeddingConfig::default()),
            other => bail!("unknown embedding mode '{other}' (expected stub, onnx or http)"),
        };
        Ok(())
    }

    pub fn set_cluster_label(&mut self, id: usize, name: String) {
        let labels = &mut self.cluster.labels;
        if labels.len() <= id {
            labels.resize(id + 1, String::new());
        }
        labels[id] = name;
    }

    pub fn set_model_dir(&mut self, dir: PathBuf) {
        match &mut self.embedding {
            EmbeddingBackendConfig::Onnx(onnx) => onnx.model_dir = dir,
            other => log::debug!(
                "Ignoring model dir {} for {} embeddings",
                dir.display(),
                other.mode()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [embedding]
            mode = "stub"
            dimension = 32

            [cluster]
            clusters = 4

            [pipeline]
            deadline_ms = 5000

            [pipeline.retrieval]
            examples = 5

            [generation]
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding, EmbeddingBackendConfig::Stub { dimension: 32 });
        assert_eq!(config.cluster.clusters, 4);
        assert_eq!(config.cluster.seed, 42);
        assert_eq!(config.classifier.neighbors, 3);
        assert_eq!(config.pipeline.deadline_ms, Some(5000));
        assert_eq!(config.pipeline.retrieval.examples, 5);
        assert_eq!(config.pipeline.retrieval.max_user_chars, 400);
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.generation.timeout_secs, 120);
    }

    #[test]
    fn cluster_labels_from_file_and_flags() {
        let mut config =
            AppConfig::from_toml("[cluster]\nclusters = 3\nlabels = [\"billing\"]\n").unwrap();
        config.set_cluster_label(2, "account".to_string());
        assert_eq!(
            config.cluster.labels,
            vec!["billing".to_string(), String::new(), "account".to_string()]
        );
        config.set_cluster_label(0, "payments".to_string());
        assert_eq!(config.cluster.labels[0], "payments");
    }

    #[test]
    fn unknown_mode_in_file_is_rejected() {
        assert!(AppConfig::from_toml("[embedding]\nmode = \"quantum\"\n").is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_EMBEDDING_MODE, "onnx"),
            (ENV_MODEL_DIR, "/opt/models/minilm"),
            (ENV_GENERATION_URL, "http://localhost:8080/v1"),
            (ENV_GENERATION_MODEL, "local-model"),
        ]);
        let mut config = AppConfig::from_toml("[embedding]\nmode = \"stub\"\n").unwrap();
        config
            .apply_overrides(|name| env.get(name).map(ToString::to_string))
            .unwrap();

        match &config.embedding {
            EmbeddingBackendConfig::Onnx(onnx) => {
                assert_eq!(onnx.model_dir, PathBuf::from("/opt/models/minilm"));
            }
            other => panic!("expected onnx, got {other:?}"),
        }
        assert_eq!(config.generation.base_url, "http://localhost:8080/v1");
        assert_eq!(config.generation.model, "local-model");
    }

    #[test]
    fn same_mode_keeps_settings() {
        let mut config = AppConfig::from_toml("[embedding]\nmode = \"stub\"\ndimension = 8\n").unwrap();
        config.set_embedding_mode("STUB").unwrap();
        assert_eq!(config.embedding, EmbeddingBackendConfig::Stub { dimension: 8 });
        assert!(config.set_embedding_mode("gpu").is_err());
    }
}
