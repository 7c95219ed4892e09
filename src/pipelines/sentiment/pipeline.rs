use super::model::{EncodedBatch, SequenceClassificationModel};
use crate::error::{PipelineError, Result};
use crate::pipelines::explain::{Explainer, Explanation};
use crate::pipelines::stats::PipelineStats;
use crate::pipelines::utils::{apply_fixed_length_policy, SpecialIds};
use std::sync::Arc;
use tokenizers::{Encoding, Tokenizer};

// ============ Output types ============

/// One label and its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    /// Label name as the model reports it.
    pub label: String,
    /// Probability (0.0 to 1.0).
    pub score: f32,
}

/// A sentiment prediction: the top label plus the full distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The most probable label.
    pub label: String,
    /// Probability of [`Self::label`].
    pub score: f32,
    /// Every label with its probability, in the model's label order. Sums to 1.
    pub scores: Vec<LabelScore>,
}

impl Prediction {
    pub(crate) fn from_probabilities(labels: &[String], probs: &[f32]) -> Result<Self> {
        if labels.len() != probs.len() {
            return Err(PipelineError::Unexpected(format!(
                "Model returned {} scores for {} labels",
                probs.len(),
                labels.len()
            )));
        }
        if let Some(bad) = probs.iter().find(|p| !p.is_finite()) {
            return Err(PipelineError::Unexpected(format!(
                "Model returned a non-finite probability ({bad})"
            )));
        }

        let (best, &score) = probs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .ok_or_else(|| PipelineError::Unexpected("Model has no labels".into()))?;

        Ok(Prediction {
            label: labels[best].clone(),
            score,
            scores: labels
                .iter()
                .zip(probs)
                .map(|(label, &score)| LabelScore {
                    label: label.clone(),
                    score,
                })
                .collect(),
        })
    }

    /// Probability of a label by name, if the model has it.
    pub fn score_of(&self, label: &str) -> Option<f32> {
        self.scores
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.score)
    }
}

/// Single-text output from `run()`.
#[derive(Debug)]
pub struct Output {
    /// Sentiment prediction.
    pub prediction: Prediction,
    /// Execution statistics.
    pub stats: PipelineStats,
}

/// Single result in batch output.
#[derive(Debug)]
pub struct BatchResult {
    /// Input text.
    pub text: String,
    /// Prediction or error for this input.
    pub prediction: Result<Prediction>,
}

/// Batch output from `run()`.
#[derive(Debug)]
pub struct BatchOutput {
    /// Results for each input.
    pub results: Vec<BatchResult>,
    /// Execution statistics.
    pub stats: PipelineStats,
}

// ============ Input trait for type-based dispatch ============

#[doc(hidden)]
pub trait SentimentInput<'a> {
    /// Output type for `.run()`.
    type Output;

    #[doc(hidden)]
    fn into_texts(self) -> Vec<&'a str>;
    #[doc(hidden)]
    fn convert_output(
        texts: Vec<&'a str>,
        predictions: Vec<Result<Prediction>>,
        stats: PipelineStats,
    ) -> Result<Self::Output>;
}

impl<'a> SentimentInput<'a> for &'a str {
    type Output = Output;

    fn into_texts(self) -> Vec<&'a str> {
        vec![self]
    }

    fn convert_output(
        _texts: Vec<&'a str>,
        mut predictions: Vec<Result<Prediction>>,
        stats: PipelineStats,
    ) -> Result<Self::Output> {
        let prediction = predictions
            .pop()
            .ok_or_else(|| PipelineError::Unexpected("No predictions returned".into()))??;
        Ok(Output { prediction, stats })
    }
}

fn batch_output<'a>(
    texts: Vec<&'a str>,
    predictions: Vec<Result<Prediction>>,
    stats: PipelineStats,
) -> BatchOutput {
    let results = texts
        .into_iter()
        .zip(predictions)
        .map(|(text, prediction)| BatchResult {
            text: text.to_string(),
            prediction,
        })
        .collect();
    BatchOutput { results, stats }
}

impl<'a> SentimentInput<'a> for &'a [&'a str] {
    type Output = BatchOutput;

    fn into_texts(self) -> Vec<&'a str> {
        self.to_vec()
    }

    fn convert_output(
        texts: Vec<&'a str>,
        predictions: Vec<Result<Prediction>>,
        stats: PipelineStats,
    ) -> Result<Self::Output> {
        Ok(batch_output(texts, predictions, stats))
    }
}

impl<'a, const N: usize> SentimentInput<'a> for &'a [&'a str; N] {
    type Output = BatchOutput;

    fn into_texts(self) -> Vec<&'a str> {
        self.as_slice().to_vec()
    }

    fn convert_output(
        texts: Vec<&'a str>,
        predictions: Vec<Result<Prediction>>,
        stats: PipelineStats,
    ) -> Result<Self::Output> {
        Ok(batch_output(texts, predictions, stats))
    }
}

// ============ Pipeline ============

/// A loaded classifier: model, tokenizer and the fixed-length tokenization policy.
///
/// Build one from the Hub with [`SentimentPipelineBuilder`](super::SentimentPipelineBuilder)
/// or [`load`](super::load), or wrap your own model with [`Self::from_parts`].
///
/// # Examples
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = sentiment_lens::sentiment::load("ElKulako/cryptobert")?;
///
/// let output = pipeline.run("to the moon!")?;
/// println!("{}: {:.2}", output.prediction.label, output.prediction.score);
///
/// let explanation = pipeline.explain("to the moon!")?;
/// for label in explanation.labels() {
///     for token in &label.tokens {
///         println!("{} {:>8} {:+.3}", label.label, token.span, token.contribution);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct SentimentPipeline<M: SequenceClassificationModel> {
    pub(crate) model_id: String,
    pub(crate) model: M,
    pub(crate) tokenizer: Tokenizer,
    pub(crate) max_length: usize,
    pub(crate) special_ids: SpecialIds,
}

/// A classifier whose concrete architecture was chosen at load time.
pub type ModelHandle = SentimentPipeline<Arc<dyn SequenceClassificationModel>>;

impl<M: SequenceClassificationModel> SentimentPipeline<M> {
    /// Wrap a model and its tokenizer. The tokenizer is reconfigured to truncate and pad
    /// every input to exactly `max_length` tokens.
    pub fn from_parts(
        model_id: impl Into<String>,
        model: M,
        mut tokenizer: Tokenizer,
        max_length: usize,
    ) -> Result<Self> {
        let special_ids = apply_fixed_length_policy(&mut tokenizer, max_length)?;
        let model_id = model_id.into();
        tracing::debug!(
            model_id = %model_id,
            max_length,
            pad_id = special_ids.pad_id,
            mask_id = special_ids.mask_id,
            "tokenizer configured"
        );
        Ok(Self {
            model_id,
            model,
            tokenizer,
            max_length,
            special_ids,
        })
    }

    /// Classify text.
    ///
    /// Single input → [`Output`], batch → [`BatchOutput`]. An empty string is classified
    /// as the special-tokens-only input, which gives the same degenerate prediction on
    /// every call.
    pub fn run<'a, I: SentimentInput<'a>>(&self, input: I) -> Result<I::Output> {
        let mut stats_builder = PipelineStats::start();
        let texts = input.into_texts();
        let item_count = texts.len();

        let mut predictions: Vec<Option<Result<Prediction>>> =
            (0..item_count).map(|_| None).collect();
        let mut batch = EncodedBatch::new(self.max_length);
        let mut rows = Vec::with_capacity(item_count);

        for (i, text) in texts.iter().enumerate() {
            match self
                .encode(text)
                .and_then(|e| batch.push(e.get_ids(), e.get_attention_mask(), e.get_type_ids()))
            {
                Ok(()) => rows.push(i),
                Err(e) => predictions[i] = Some(Err(e)),
            }
        }

        if !batch.is_empty() {
            let probs = self.predict_encoded(&batch)?;
            stats_builder.record_evaluations(batch.len());
            for (row, &i) in rows.iter().enumerate() {
                predictions[i] = Some(Prediction::from_probabilities(self.labels(), &probs[row]));
            }
        }

        let predictions = predictions
            .into_iter()
            .map(|p| {
                p.unwrap_or_else(|| {
                    Err(PipelineError::Unexpected(
                        "Model returned no predictions".to_string(),
                    ))
                })
            })
            .collect();

        I::convert_output(texts, predictions, stats_builder.finish(item_count))
    }

    /// Classify one text and return only the prediction.
    pub fn classify(&self, text: &str) -> Result<Prediction> {
        Ok(self.run(text)?.prediction)
    }

    /// Per-token, per-label attributions with the default [`Explainer`] settings.
    pub fn explain(&self, text: &str) -> Result<Explanation> {
        Explainer::default().explain(self, text)
    }

    /// The identifier this pipeline was loaded from.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Label names in the model's output order.
    pub fn labels(&self) -> &[String] {
        self.model.labels()
    }

    /// Every input is truncated and padded to this many tokens.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// The configured tokenizer.
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Returns the device (CPU/GPU) the model is running on.
    pub fn device(&self) -> candle_core::Device {
        self.model.device()
    }

    pub(crate) fn encode(&self, text: &str) -> Result<Encoding> {
        let encoding = self.tokenizer.encode(text, true).map_err(|e| {
            PipelineError::Tokenization(format!(
                "Tokenization failed on '{}': {}",
                &text.chars().take(50).collect::<String>(),
                e
            ))
        })?;
        if encoding.len() != self.max_length {
            return Err(PipelineError::Tokenization(format!(
                "Tokenizer produced {} tokens, expected exactly {}",
                encoding.len(),
                self.max_length
            )));
        }
        Ok(encoding)
    }

    /// Forward pass with shape checks on what the model hands back.
    pub(crate) fn predict_encoded(&self, batch: &EncodedBatch) -> Result<Vec<Vec<f32>>> {
        let probs = self.model.predict_proba(batch)?;
        let num_labels = self.labels().len();
        if probs.len() != batch.len() || probs.iter().any(|row| row.len() != num_labels) {
            return Err(PipelineError::Unexpected(format!(
                "Model returned {} rows for a batch of {} with {} labels",
                probs.len(),
                batch.len(),
                num_labels
            )));
        }
        Ok(probs)
    }
}

impl<M: SequenceClassificationModel> std::fmt::Debug for SentimentPipeline<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentPipeline")
            .field("model_id", &self.model_id)
            .field("labels", &self.labels())
            .field("max_length", &self.max_length)
            .finish()
    }
}
