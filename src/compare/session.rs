use super::report::{ComparisonReport, ModelAnalysis, ModelReport, Slot, UnavailableModel};
use super::vocab::LabelVocabularies;
use crate::error::{LoadError, Result};
use crate::explain::Explainer;
use crate::pipelines::cache::ModelCache;
use crate::sentiment::{DeviceRequest, ModelHandle, SentimentPipelineBuilder, DEFAULT_MAX_LENGTH};

/// State of one comparison position.
#[derive(Debug, Default)]
pub enum ModelSlot {
    /// Nothing selected.
    #[default]
    Empty,
    /// A model ready for analysis.
    Loaded(ModelHandle),
    /// The selected identifier could not be loaded.
    Failed(LoadError),
}

impl ModelSlot {
    /// The loaded handle, if any.
    pub fn handle(&self) -> Option<&ModelHandle> {
        match self {
            ModelSlot::Loaded(handle) => Some(handle),
            _ => None,
        }
    }

    /// Identifier of the selected model, loaded or failed.
    pub fn model_id(&self) -> Option<&str> {
        match self {
            ModelSlot::Empty => None,
            ModelSlot::Loaded(handle) => Some(handle.model_id()),
            ModelSlot::Failed(err) => Some(&err.model_id),
        }
    }
}

/// One user's comparison state: two model slots plus the settings they are run with.
///
/// Loaded weights are shared through a cache owned by the session, so selecting the
/// same model twice loads it once. Dropping the session releases everything.
///
/// ```rust,no_run
/// use sentiment_lens::compare::{Session, Slot};
///
/// let mut session = Session::new();
/// session.select(Slot::First, "nlptown/bert-base-multilingual-uncased-sentiment");
/// session.select(Slot::Second, "ElKulako/cryptobert");
///
/// if let Some(report) = session.compare("to the moon!") {
///     for row in &report.rows {
///         println!("{}", row.label);
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Session {
    slots: [ModelSlot; 2],
    cache: ModelCache,
    explainer: Explainer,
    vocabularies: LabelVocabularies,
    max_length: usize,
    device: DeviceRequest,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Empty slots, built-in vocabularies, default explainer, CPU.
    pub fn new() -> Self {
        Self {
            slots: [ModelSlot::Empty, ModelSlot::Empty],
            cache: ModelCache::new(),
            explainer: Explainer::default(),
            vocabularies: LabelVocabularies::default(),
            max_length: DEFAULT_MAX_LENGTH,
            device: DeviceRequest::Cpu,
        }
    }

    /// Attribution settings for [`Self::compare`].
    pub fn with_explainer(mut self, explainer: Explainer) -> Self {
        self.explainer = explainer;
        self
    }

    /// Replace the label vocabulary table.
    pub fn with_vocabularies(mut self, vocabularies: LabelVocabularies) -> Self {
        self.vocabularies = vocabularies;
        self
    }

    /// Token limit for models loaded from now on.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Device for models loaded from now on.
    pub fn with_device(mut self, device: DeviceRequest) -> Self {
        self.device = device;
        self
    }

    /// Load `model_id` into `slot`, replacing whatever was there.
    ///
    /// A blank identifier empties the slot. A failed load is kept in the slot so it can
    /// be reported; the other slot is unaffected.
    pub fn select(&mut self, slot: Slot, model_id: &str) -> &ModelSlot {
        let model_id = model_id.trim();
        // Drop the old handle first so its weights can leave the cache.
        self.slots[slot.index()] = ModelSlot::Empty;

        if !model_id.is_empty() {
            let loaded = SentimentPipelineBuilder::new(model_id)
                .max_length(self.max_length)
                .device(self.device)
                .vocabularies(self.vocabularies.clone())
                .build_with_cache(&self.cache);
            self.slots[slot.index()] = match loaded {
                Ok(handle) => ModelSlot::Loaded(handle),
                Err(err) => ModelSlot::Failed(err),
            };
        }

        &self.slots[slot.index()]
    }

    /// Put an already-built handle into `slot`.
    pub fn insert(&mut self, slot: Slot, handle: ModelHandle) {
        self.slots[slot.index()] = ModelSlot::Loaded(handle);
    }

    /// Empty `slot`.
    pub fn clear(&mut self, slot: Slot) {
        self.slots[slot.index()] = ModelSlot::Empty;
    }

    /// Current state of `slot`.
    pub fn slot(&self, slot: Slot) -> &ModelSlot {
        &self.slots[slot.index()]
    }

    /// The label vocabulary table in use.
    pub fn vocabularies(&self) -> &LabelVocabularies {
        &self.vocabularies
    }

    /// Classify and explain `text` with every loaded model.
    ///
    /// Returns `None` without running anything when `text` is empty or whitespace. A
    /// model that fails is recorded in its own report entry and does not affect the
    /// other one.
    pub fn compare(&self, text: &str) -> Option<ComparisonReport> {
        if text.trim().is_empty() {
            tracing::debug!("empty input, nothing to compare");
            return None;
        }

        let mut models = Vec::new();
        let mut unavailable = Vec::new();

        for slot in Slot::ALL {
            match self.slot(slot) {
                ModelSlot::Empty => {}
                ModelSlot::Failed(err) => unavailable.push(UnavailableModel {
                    slot,
                    model_id: err.model_id.clone(),
                    reason: err.source.to_string(),
                }),
                ModelSlot::Loaded(handle) => {
                    let outcome = self.analyze(handle, text);
                    if let Err(e) = &outcome {
                        tracing::warn!(%slot, model_id = %handle.model_id(), error = %e, "analysis failed");
                    }
                    models.push(ModelReport {
                        slot,
                        model_id: handle.model_id().to_string(),
                        outcome,
                    });
                }
            }
        }

        Some(ComparisonReport::assemble(
            text,
            models,
            unavailable,
            &self.vocabularies,
        ))
    }

    fn analyze(&self, handle: &ModelHandle, text: &str) -> Result<ModelAnalysis> {
        let prediction = handle.classify(text)?;
        let explanation = self.explainer.explain(handle, text)?;
        tracing::info!(
            model_id = %handle.model_id(),
            label = %prediction.label,
            score = prediction.score,
            tokens = explanation.token_count(),
            evaluations = explanation.stats.model_evaluations,
            "analysis complete"
        );
        Ok(ModelAnalysis {
            prediction,
            explanation,
        })
    }
}
