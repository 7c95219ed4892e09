//! Offline fixtures: a word-level tokenizer and bag-of-words classifiers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use sentiment_lens::sentiment::{
    EncodedBatch, ModelHandle, SentimentPipeline, SequenceClassificationModel,
};
use sentiment_lens::PipelineError;
use tokenizers::Tokenizer;

pub const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "to", "the", "moon", "!", "good", "bad",
    "great", "terrible", "stock", "market", "crash", "rally", "not", "very", "is",
];

pub const CLS: u32 = 2;
pub const SEP: u32 = 3;
pub const MASK: u32 = 4;

/// `[CLS] $A [SEP]` word-level tokenizer over [`VOCAB`], lowercasing, whitespace split.
pub fn tokenizer() -> Tokenizer {
    tokenizer_with_unk("[UNK]")
}

/// Like [`tokenizer`], but unknown words map to `unk`. An `unk` outside [`VOCAB`] makes
/// out-of-vocabulary input a tokenizer error.
pub fn tokenizer_with_unk(unk: &str) -> Tokenizer {
    let vocab = VOCAB
        .iter()
        .enumerate()
        .map(|(i, w)| format!("\"{w}\": {i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let added = VOCAB[..5]
        .iter()
        .enumerate()
        .map(|(i, w)| {
            format!(
                r#"{{"id": {i}, "content": "{w}", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}}"#
            )
        })
        .collect::<Vec<_>>()
        .join(", ");

    let json = format!(
        r#"{{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [{added}],
  "normalizer": {{"type": "Lowercase"}},
  "pre_tokenizer": {{"type": "Whitespace"}},
  "post_processor": {{
    "type": "TemplateProcessing",
    "single": [
      {{"SpecialToken": {{"id": "[CLS]", "type_id": 0}}}},
      {{"Sequence": {{"id": "A", "type_id": 0}}}},
      {{"SpecialToken": {{"id": "[SEP]", "type_id": 0}}}}
    ],
    "pair": [
      {{"SpecialToken": {{"id": "[CLS]", "type_id": 0}}}},
      {{"Sequence": {{"id": "A", "type_id": 0}}}},
      {{"SpecialToken": {{"id": "[SEP]", "type_id": 0}}}},
      {{"Sequence": {{"id": "B", "type_id": 1}}}},
      {{"SpecialToken": {{"id": "[SEP]", "type_id": 1}}}}
    ],
    "special_tokens": {{
      "[CLS]": {{"id": "[CLS]", "ids": [2], "tokens": ["[CLS]"]}},
      "[SEP]": {{"id": "[SEP]", "ids": [3], "tokens": ["[SEP]"]}}
    }}
  }},
  "decoder": null,
  "model": {{"type": "WordLevel", "vocab": {{{vocab}}}, "unk_token": "{unk}"}}
}}"#
    );

    Tokenizer::from_str(&json).expect("fixture tokenizer parses")
}

fn id(word: &str) -> u32 {
    VOCAB.iter().position(|w| *w == word).expect("word in fixture vocab") as u32
}

/// Sums per-token logit vectors over attended positions and applies softmax.
pub struct BagOfWords {
    labels: Vec<String>,
    bias: Vec<f32>,
    weights: HashMap<u32, Vec<f32>>,
}

impl BagOfWords {
    /// Labels `negative, neutral, positive`.
    pub fn sentiment() -> Self {
        let mut weights = HashMap::new();
        for (word, w) in [
            ("good", [-1.0, 0.0, 1.5]),
            ("great", [-1.5, 0.0, 2.0]),
            ("bad", [1.5, 0.0, -1.0]),
            ("terrible", [2.0, 0.0, -1.5]),
            ("crash", [1.2, 0.2, -0.8]),
            ("rally", [-0.8, 0.1, 1.1]),
            ("moon", [-0.2, -0.3, 0.9]),
            ("!", [0.0, -0.4, 0.3]),
            ("not", [0.3, 0.2, -0.3]),
            ("very", [0.1, -0.2, 0.1]),
        ] {
            weights.insert(id(word), w.to_vec());
        }
        Self {
            labels: vec!["negative".into(), "neutral".into(), "positive".into()],
            bias: vec![0.0, 0.5, 0.0],
            weights,
        }
    }

    /// Labels `Bullish, Neutral, Bearish`, reacting to different words.
    pub fn crypto() -> Self {
        let mut weights = HashMap::new();
        for (word, w) in [
            ("moon", [2.5, -0.5, -1.0]),
            ("rally", [1.5, 0.0, -1.0]),
            ("crash", [-1.5, 0.0, 2.0]),
            ("to", [0.2, 0.0, 0.0]),
            ("!", [0.4, -0.2, 0.0]),
        ] {
            weights.insert(id(word), w.to_vec());
        }
        Self {
            labels: vec!["Bullish".into(), "Neutral".into(), "Bearish".into()],
            bias: vec![0.0, 0.8, 0.0],
            weights,
        }
    }
}

impl SequenceClassificationModel for BagOfWords {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict_proba(&self, batch: &EncodedBatch) -> sentiment_lens::Result<Vec<Vec<f32>>> {
        Ok((0..batch.len())
            .map(|row| {
                let mut logits = self.bias.clone();
                let ids = batch.row_ids(row).expect("row in batch");
                let mask = batch.row_mask(row).expect("row in batch");
                for (&token, &attend) in ids.iter().zip(mask) {
                    if attend == 0 {
                        continue;
                    }
                    if let Some(w) = self.weights.get(&token) {
                        for (l, x) in logits.iter_mut().zip(w) {
                            *l += x;
                        }
                    }
                }
                softmax(&logits)
            })
            .collect())
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Returns NaN for every row.
pub struct Broken;

impl SequenceClassificationModel for Broken {
    fn labels(&self) -> &[String] {
        static LABELS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        LABELS.get_or_init(|| vec!["a".into(), "b".into(), "c".into()])
    }

    fn predict_proba(&self, batch: &EncodedBatch) -> sentiment_lens::Result<Vec<Vec<f32>>> {
        Ok(vec![vec![f32::NAN; 3]; batch.len()])
    }
}

/// Always fails, as if inference blew up.
pub struct Failing;

impl SequenceClassificationModel for Failing {
    fn labels(&self) -> &[String] {
        static LABELS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        LABELS.get_or_init(|| vec!["a".into(), "b".into(), "c".into()])
    }

    fn predict_proba(&self, _batch: &EncodedBatch) -> sentiment_lens::Result<Vec<Vec<f32>>> {
        Err(PipelineError::Unexpected("forward pass failed".into()))
    }
}

pub fn handle(model_id: &str, model: impl SequenceClassificationModel + 'static) -> ModelHandle {
    handle_with_length(model_id, model, 64)
}

pub fn handle_with_length(
    model_id: &str,
    model: impl SequenceClassificationModel + 'static,
    max_length: usize,
) -> ModelHandle {
    handle_with_tokenizer(model_id, model, tokenizer(), max_length)
}

pub fn handle_with_tokenizer(
    model_id: &str,
    model: impl SequenceClassificationModel + 'static,
    tokenizer: Tokenizer,
    max_length: usize,
) -> ModelHandle {
    let model: Arc<dyn SequenceClassificationModel> = Arc::new(model);
    SentimentPipeline::from_parts(model_id, model, tokenizer, max_length)
        .expect("fixture pipeline builds")
}
