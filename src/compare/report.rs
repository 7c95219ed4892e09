use std::fmt;

use super::vocab::LabelVocabularies;
use crate::error::Result;
use crate::explain::{Explanation, LabelAttribution};
use crate::sentiment::Prediction;

/// One of the two comparison positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The primary model. Its label order drives the report.
    First,
    /// The model compared against the primary one.
    Second,
}

impl Slot {
    /// Both slots in display order.
    pub const ALL: [Slot; 2] = [Slot::First, Slot::Second];

    pub(crate) fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::First => write!(f, "Model 1"),
            Slot::Second => write!(f, "Model 2"),
        }
    }
}

/// Prediction and explanation of one model for the compared text.
#[derive(Debug, Clone)]
pub struct ModelAnalysis {
    /// Top label and full distribution.
    pub prediction: Prediction,
    /// Per-label token attributions.
    pub explanation: Explanation,
}

/// What one loaded model produced for the compared text.
#[derive(Debug)]
pub struct ModelReport {
    /// Where the model sits in the session.
    pub slot: Slot,
    /// Model identifier.
    pub model_id: String,
    /// The analysis, or why this model alone failed.
    pub outcome: Result<ModelAnalysis>,
}

impl ModelReport {
    /// The analysis if this model succeeded.
    pub fn analysis(&self) -> Option<&ModelAnalysis> {
        self.outcome.as_ref().ok()
    }
}

/// A slot that was selected but has no working model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableModel {
    /// Where the model was selected.
    pub slot: Slot,
    /// Identifier that failed to load.
    pub model_id: String,
    /// The load error, rendered.
    pub reason: String,
}

/// One display row: a label and, per model report, the matching attribution.
#[derive(Debug, Clone)]
pub struct LabelRow {
    /// Row heading, spelled as the model that contributed the row spells it.
    pub label: String,
    /// Parallel to [`ComparisonReport::models`]. `None` when that model has no label
    /// matching [`Self::label`] or did not produce an analysis.
    pub cells: Vec<Option<LabelAttribution>>,
}

/// Side-by-side result of running every loaded model on one text.
#[derive(Debug)]
pub struct ComparisonReport {
    /// The compared text.
    pub text: String,
    /// One entry per loaded slot, in slot order.
    pub models: Vec<ModelReport>,
    /// Slots whose model failed to load.
    pub unavailable: Vec<UnavailableModel>,
    /// Label rows in display order.
    pub rows: Vec<LabelRow>,
    /// Legend of the primary model's vocabulary, if it has one.
    pub legend: Option<String>,
}

impl ComparisonReport {
    /// Align the model reports by label.
    ///
    /// The primary model is the first report with an analysis. Rows follow its vocabulary
    /// entry when there is one, otherwise its prediction's label order. Labels of the
    /// other model that match no row (ignoring case) are appended at the end.
    pub fn assemble(
        text: impl Into<String>,
        models: Vec<ModelReport>,
        unavailable: Vec<UnavailableModel>,
        vocabularies: &LabelVocabularies,
    ) -> Self {
        let primary = models.iter().find_map(|m| m.analysis().map(|a| (m, a)));

        let mut headings: Vec<String> = Vec::new();
        let mut legend = None;

        if let Some((report, analysis)) = primary {
            if let Some(entry) = vocabularies.lookup(&report.model_id) {
                headings.extend(entry.labels.iter().cloned());
                legend = Some(entry.legend.clone()).filter(|l| !l.is_empty());
            }
            for score in &analysis.prediction.scores {
                push_unique(&mut headings, &score.label);
            }
        }
        for analysis in models.iter().filter_map(ModelReport::analysis) {
            for score in &analysis.prediction.scores {
                push_unique(&mut headings, &score.label);
            }
        }

        let rows = headings
            .into_iter()
            .map(|label| {
                let cells = models
                    .iter()
                    .map(|m| {
                        m.analysis()
                            .and_then(|a| a.explanation.get(&label))
                            .cloned()
                    })
                    .collect();
                LabelRow { label, cells }
            })
            .filter(|row| row.cells.iter().any(Option::is_some))
            .collect();

        Self {
            text: text.into(),
            models,
            unavailable,
            rows,
            legend,
        }
    }

    /// The report of a given slot, if that slot had a loaded model.
    pub fn model(&self, slot: Slot) -> Option<&ModelReport> {
        self.models.iter().find(|m| m.slot == slot)
    }
}

fn push_unique(headings: &mut Vec<String>, label: &str) {
    if !headings.iter().any(|h| h.eq_ignore_ascii_case(label)) {
        headings.push(label.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::explain::AttributionMethod;
    use crate::pipelines::stats::PipelineStats;

    fn analysis(labels: &[&str]) -> ModelAnalysis {
        let probs = vec![1.0 / labels.len() as f32; labels.len()];
        let names: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        let explanation = Explanation {
            model_id: "m".into(),
            text: "t".into(),
            method: AttributionMethod::Exact,
            labels: names
                .iter()
                .map(|l| LabelAttribution {
                    label: l.clone(),
                    base_value: 0.0,
                    output_value: 0.0,
                    tokens: vec![],
                })
                .collect(),
            stats: PipelineStats::start().finish(1),
        };
        ModelAnalysis {
            prediction: Prediction::from_probabilities(&names, &probs).unwrap(),
            explanation,
        }
    }

    fn report(slot: Slot, model_id: &str, labels: &[&str]) -> ModelReport {
        ModelReport {
            slot,
            model_id: model_id.into(),
            outcome: Ok(analysis(labels)),
        }
    }

    fn headings(report: &ComparisonReport) -> Vec<&str> {
        report.rows.iter().map(|r| r.label.as_str()).collect()
    }

    #[test]
    fn vocabulary_drives_primary_order() {
        let report = ComparisonReport::assemble(
            "to the moon!",
            vec![
                report(Slot::First, "ElKulako/cryptobert", &["Bearish", "Neutral", "Bullish"]),
                report(Slot::Second, "x/y", &["negative", "neutral", "positive"]),
            ],
            vec![],
            &LabelVocabularies::default(),
        );

        assert_eq!(
            headings(&report),
            vec!["Bullish", "Neutral", "Bearish", "negative", "positive"]
        );
        let neutral = &report.rows[1];
        assert_eq!(neutral.cells[0].as_ref().unwrap().label, "Neutral");
        assert_eq!(neutral.cells[1].as_ref().unwrap().label, "neutral");
        assert!(report.rows[0].cells[1].is_none());
        assert!(report.rows[3].cells[0].is_none());
        assert!(report.legend.as_deref().unwrap().starts_with("Bullish"));
    }

    #[test]
    fn raw_label_order_without_vocabulary() {
        let report = ComparisonReport::assemble(
            "t",
            vec![report(Slot::First, "x/y", &["pos", "neg", "neu"])],
            vec![],
            &LabelVocabularies::default(),
        );
        assert_eq!(headings(&report), vec!["pos", "neg", "neu"]);
        assert!(report.legend.is_none());
    }

    #[test]
    fn failed_first_model_hands_primary_to_second() {
        let failed = ModelReport {
            slot: Slot::First,
            model_id: "ElKulako/cryptobert".into(),
            outcome: Err(PipelineError::Attribution("nan".into())),
        };
        let report = ComparisonReport::assemble(
            "t",
            vec![failed, report(Slot::Second, "x/y", &["a", "b", "c"])],
            vec![],
            &LabelVocabularies::default(),
        );
        assert_eq!(headings(&report), vec!["a", "b", "c"]);
        assert!(report.rows.iter().all(|r| r.cells[0].is_none()));
        assert!(report.model(Slot::First).unwrap().analysis().is_none());
    }
}
