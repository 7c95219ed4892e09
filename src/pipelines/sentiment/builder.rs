use super::pipeline::{ModelHandle, SentimentPipeline};
use crate::compare::LabelVocabularies;
use crate::error::{LoadError, PipelineError, Result};
use crate::loaders::ClassifierFiles;
use crate::models::load_sequence_classifier;
use crate::pipelines::cache::ModelCache;
use crate::pipelines::utils::{build_cache_key, DeviceRequest};

/// Maximum number of tokens per input, after truncation and padding.
pub const DEFAULT_MAX_LENGTH: usize = 64;

/// Number of output labels every classifier must have.
pub const DEFAULT_NUM_LABELS: usize = 3;

/// Builder for [`ModelHandle`]s loaded from the Hugging Face Hub.
///
/// # Examples
///
/// ```rust,no_run
/// # use sentiment_lens::sentiment::SentimentPipelineBuilder;
/// # fn main() -> Result<(), sentiment_lens::error::LoadError> {
/// let pipeline = SentimentPipelineBuilder::new("mrm8488/distilroberta-finetuned-financial-news-sentiment-analysis")
///     .max_length(64)
///     .cpu()
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SentimentPipelineBuilder {
    model_id: String,
    max_length: usize,
    num_labels: usize,
    device_request: DeviceRequest,
    vocabularies: Option<LabelVocabularies>,
}

impl SentimentPipelineBuilder {
    /// Start from a Hub repository identifier such as `"ElKulako/cryptobert"`.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            max_length: DEFAULT_MAX_LENGTH,
            num_labels: DEFAULT_NUM_LABELS,
            device_request: DeviceRequest::Cpu,
            vocabularies: None,
        }
    }

    /// Truncate and pad every input to this many tokens (default 64).
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Required size of the checkpoint's label set (default 3).
    pub fn num_labels(mut self, num_labels: usize) -> Self {
        self.num_labels = num_labels;
        self
    }

    /// Use CPU for inference (default).
    pub fn cpu(mut self) -> Self {
        self.device_request = DeviceRequest::Cpu;
        self
    }

    /// Use a specific CUDA GPU for inference.
    pub fn cuda(mut self, index: usize) -> Self {
        self.device_request = DeviceRequest::Cuda(index);
        self
    }

    /// Device selection as a value.
    pub fn device(mut self, device_request: DeviceRequest) -> Self {
        self.device_request = device_request;
        self
    }

    /// Name generic `LABEL_n` outputs from the `id2label` of this model's vocabulary entry.
    pub fn vocabularies(mut self, vocabularies: LabelVocabularies) -> Self {
        self.vocabularies = Some(vocabularies);
        self
    }

    /// Loads the pipeline without sharing weights with any other handle.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the identifier cannot be resolved, the architecture or
    /// label count is unsupported, or device initialization fails.
    pub fn build(self) -> std::result::Result<ModelHandle, LoadError> {
        self.build_with_cache(&ModelCache::new())
    }

    /// Loads the pipeline, reusing weights already held by `cache`.
    pub fn build_with_cache(
        self,
        cache: &ModelCache,
    ) -> std::result::Result<ModelHandle, LoadError> {
        let model_id = self.model_id.trim().to_string();
        tracing::info!(model_id = %model_id, device = %self.device_request.cache_tag(), "loading classifier");

        match self.try_build(&model_id, cache) {
            Ok(handle) => {
                tracing::info!(model_id = %model_id, labels = ?handle.labels(), "classifier ready");
                Ok(handle)
            }
            Err(source) => {
                tracing::warn!(model_id = %model_id, error = %source, "classifier failed to load");
                Err(LoadError::new(model_id, source))
            }
        }
    }

    fn try_build(&self, model_id: &str, cache: &ModelCache) -> Result<ModelHandle> {
        if model_id.is_empty() {
            return Err(PipelineError::Download(
                "model identifier is empty".to_string(),
            ));
        }

        let device = self.device_request.resolve()?;
        let files = ClassifierFiles::fetch(model_id)?;

        let found = files.probe.num_labels();
        if found != self.num_labels {
            return Err(PipelineError::UnsupportedModel(format!(
                "'{model_id}' has {found} output labels, expected {}",
                self.num_labels
            )));
        }

        let labels = self.label_names(model_id, files.probe.labels());
        let tokenizer = files.tokenizer.load()?;

        let key = build_cache_key(model_id, self.device_request, self.max_length, &labels);
        let model = cache.get_or_create(&key, || {
            load_sequence_classifier(&files, labels, &device)
        })?;

        SentimentPipeline::from_parts(model_id, model, tokenizer, self.max_length)
    }

    fn label_names(&self, model_id: &str, labels: Vec<String>) -> Vec<String> {
        let generic = labels
            .iter()
            .enumerate()
            .all(|(i, label)| label.eq_ignore_ascii_case(&format!("LABEL_{i}")));
        if !generic {
            return labels;
        }

        match self
            .vocabularies
            .as_ref()
            .and_then(|v| v.lookup(model_id))
            .and_then(|entry| entry.id2label.as_ref())
            .filter(|names| names.len() == labels.len())
        {
            Some(names) => {
                tracing::debug!(model_id, labels = ?names, "naming generic labels from vocabulary");
                names.clone()
            }
            None => labels,
        }
    }
}

/// Load a classifier with the default policy: 64 tokens, truncation on, padding to 64,
/// exactly 3 labels, CPU.
///
/// Nothing is shared between calls, so a failed load leaves no state behind.
pub fn load(model_id: &str) -> std::result::Result<ModelHandle, LoadError> {
    SentimentPipelineBuilder::new(model_id).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_fixed_policy() {
        let builder = SentimentPipelineBuilder::new("ElKulako/cryptobert");
        assert_eq!(builder.max_length, 64);
        assert_eq!(builder.num_labels, 3);
        assert_eq!(builder.device_request, DeviceRequest::Cpu);
    }

    fn generic() -> Vec<String> {
        vec!["LABEL_0".into(), "LABEL_1".into(), "LABEL_2".into()]
    }

    #[test]
    fn generic_labels_are_named_by_output_index() {
        // Display order puts Bullish first; the head's index 0 is Bearish.
        let vocabularies = LabelVocabularies::from_json_str(
            r#"[{"model": "ElKulako/cryptobert",
                 "labels": ["Bullish", "Neutral", "Bearish"],
                 "id2label": ["Bearish", "Neutral", "Bullish"]}]"#,
        )
        .unwrap();
        let builder = SentimentPipelineBuilder::new("ElKulako/cryptobert").vocabularies(vocabularies);
        let names = builder.label_names("ElKulako/cryptobert", generic());
        assert_eq!(names, vec!["Bearish", "Neutral", "Bullish"]);
    }

    #[test]
    fn display_order_never_renames_outputs() {
        let builder = SentimentPipelineBuilder::new("ElKulako/cryptobert")
            .vocabularies(LabelVocabularies::default());
        let names = builder.label_names("ElKulako/cryptobert", generic());
        assert_eq!(names, generic());
    }

    #[test]
    fn real_labels_are_kept() {
        let builder = SentimentPipelineBuilder::new("ElKulako/cryptobert")
            .vocabularies(LabelVocabularies::default());
        let names = builder.label_names(
            "ElKulako/cryptobert",
            vec!["Bearish".into(), "Neutral".into(), "Bullish".into()],
        );
        assert_eq!(names, vec!["Bearish", "Neutral", "Bullish"]);
    }

    #[test]
    fn empty_identifier_fails_without_network() {
        let err = SentimentPipelineBuilder::new("   ").build().unwrap_err();
        assert_eq!(err.model_id, "");
        assert!(matches!(err.source, PipelineError::Download(_)));
    }
}
