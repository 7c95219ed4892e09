use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Display order and legend for one model family's labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelVocabulary {
    /// Exact Hub identifier, or a prefix ending in `*` (`"ElKulako/*"`).
    pub model: String,
    /// Labels in display order, spelled as the model spells them.
    pub labels: Vec<String>,
    /// One-line description of what the labels mean.
    #[serde(default)]
    pub legend: String,
    /// Names by output index, for checkpoints whose config only carries `LABEL_0`,
    /// `LABEL_1`, ... Independent of the display order in [`Self::labels`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id2label: Option<Vec<String>>,
}

impl LabelVocabulary {
    fn matches(&self, model_id: &str) -> Option<usize> {
        match self.model.strip_suffix('*') {
            Some(prefix) if model_id.starts_with(prefix) => Some(prefix.len()),
            Some(_) => None,
            None if self.model == model_id => Some(usize::MAX),
            None => None,
        }
    }
}

const SENTIMENT_LEGEND: &str =
    "Negative: Negative sentiment, Neutral: Neutral sentiment, Positive: Positive sentiment";

/// Ordered lookup table from model identifier to [`LabelVocabulary`].
///
/// `Default` holds the three built-in sentiment models. Entries added later win over
/// earlier ones with the same specificity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelVocabularies {
    entries: Vec<LabelVocabulary>,
}

impl Default for LabelVocabularies {
    fn default() -> Self {
        let entry = |model: &str, labels: [&str; 3], legend: &str| LabelVocabulary {
            model: model.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            legend: legend.to_string(),
            id2label: None,
        };

        Self {
            entries: vec![
                entry(
                    "nlptown/bert-base-multilingual-uncased-sentiment",
                    ["Negative", "Neutral", "Positive"],
                    SENTIMENT_LEGEND,
                ),
                entry(
                    "mrm8488/distilroberta-finetuned-financial-news-sentiment-analysis",
                    ["negative", "neutral", "positive"],
                    SENTIMENT_LEGEND,
                ),
                entry(
                    "ElKulako/cryptobert",
                    ["Bullish", "Neutral", "Bearish"],
                    "Bullish: Positive sentiment, Neutral: Neutral sentiment, Bearish: Negative sentiment",
                ),
            ],
        }
    }
}

impl LabelVocabularies {
    /// A table with no entries.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Parse a JSON array of `{ "model", "labels", "legend", "id2label" }` objects.
    /// `legend` and `id2label` are optional.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON table from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let table = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        tracing::debug!(path = %path.display(), entries = table.entries.len(), "loaded label vocabularies");
        Ok(table)
    }

    /// Append `other`'s entries so they take precedence over the current ones.
    pub fn extend(&mut self, other: LabelVocabularies) {
        self.entries.extend(other.entries);
    }

    /// Add one entry with precedence over the existing ones.
    pub fn push(&mut self, entry: LabelVocabulary) {
        self.entries.push(entry);
    }

    /// The entry for `model_id`: an exact match, otherwise the longest matching prefix.
    pub fn lookup(&self, model_id: &str) -> Option<&LabelVocabulary> {
        let model_id = model_id.trim();
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.matches(model_id).map(|score| (score, i, e)))
            .max_by_key(|(score, i, _)| (*score, *i))
            .map(|(_, _, e)| e)
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> &[LabelVocabulary] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
