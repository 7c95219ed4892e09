use std::fmt;

use super::coalition::{CoalitionEvaluator, TokenMasker};
use super::shapley::{self, Attributions, EXACT_PLAYER_LIMIT};
use crate::error::{PipelineError, Result};
use crate::pipelines::sentiment::model::SequenceClassificationModel;
use crate::pipelines::sentiment::SentimentPipeline;
use crate::pipelines::stats::PipelineStats;

/// Token count up to which [`AttributionMethod::Auto`] computes exact Shapley values.
pub const AUTO_EXACT_MAX_TOKENS: usize = 10;
/// Antithetic permutation pairs sampled by default.
pub const DEFAULT_PERMUTATIONS: usize = 8;
/// Rows per model forward pass while explaining.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// How token contributions are estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributionMethod {
    /// Exact for short inputs, seeded permutation sampling for long ones.
    #[default]
    Auto,
    /// Exact Shapley values over every coalition. Inputs above 16 tokens fall back to
    /// sampling.
    Exact,
    /// Monte-Carlo Shapley values from `permutations` forward/reverse pairs.
    Permutation {
        /// Number of antithetic pairs.
        permutations: usize,
        /// Seed for the permutation sampler.
        seed: u64,
    },
    /// Leave-one-out occlusion. Contributions do not sum to the output difference.
    Ablation,
}

impl AttributionMethod {
    /// Default sampling settings.
    pub fn permutation() -> Self {
        AttributionMethod::Permutation {
            permutations: DEFAULT_PERMUTATIONS,
            seed: 0,
        }
    }

    /// The concrete method used for an input with `players` attributed tokens.
    pub fn resolve(self, players: usize) -> Self {
        match self {
            AttributionMethod::Auto if players <= AUTO_EXACT_MAX_TOKENS => AttributionMethod::Exact,
            AttributionMethod::Auto => Self::permutation(),
            AttributionMethod::Exact if players > EXACT_PLAYER_LIMIT => {
                tracing::warn!(
                    tokens = players,
                    limit = EXACT_PLAYER_LIMIT,
                    "too many tokens for exact attribution, sampling permutations instead"
                );
                Self::permutation()
            }
            other => other,
        }
    }

    /// Whether contributions add up to `output_value - base_value`.
    pub fn is_additive(self) -> bool {
        !matches!(self, AttributionMethod::Ablation)
    }
}

impl fmt::Display for AttributionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributionMethod::Auto => write!(f, "auto"),
            AttributionMethod::Exact => write!(f, "exact"),
            AttributionMethod::Permutation { permutations, seed } => {
                write!(f, "permutation (pairs={permutations}, seed={seed})")
            }
            AttributionMethod::Ablation => write!(f, "ablation"),
        }
    }
}

/// One attributed token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAttribution {
    /// Token as the tokenizer spells it (`##ing`, `Ġmoon`, ...).
    pub token: String,
    /// The slice of the input text this token covers.
    pub span: String,
    /// Byte offsets of [`Self::span`] in the input text.
    pub offsets: (usize, usize),
    /// Position in the fixed-length encoding.
    pub position: usize,
    /// Change in the label's probability this token accounts for.
    pub contribution: f32,
}

/// Attributions of one label for one text.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelAttribution {
    /// Label name in the model's vocabulary.
    pub label: String,
    /// Probability of the label with every text token masked.
    pub base_value: f32,
    /// Probability of the label for the unmodified text.
    pub output_value: f32,
    /// Every attributed token, in text order.
    pub tokens: Vec<TokenAttribution>,
}

impl LabelAttribution {
    /// Sum of all token contributions.
    pub fn total(&self) -> f32 {
        self.tokens.iter().map(|t| t.contribution).sum()
    }
}

/// Per-label attributions for one (model, text) pair.
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Model that was explained.
    pub model_id: String,
    /// The input text.
    pub text: String,
    /// Method actually used, after resolving [`AttributionMethod::Auto`].
    pub method: AttributionMethod,
    pub(crate) labels: Vec<LabelAttribution>,
    /// Execution statistics.
    pub stats: PipelineStats,
}

impl Explanation {
    /// Attributions in the model's label order.
    pub fn labels(&self) -> &[LabelAttribution] {
        &self.labels
    }

    /// Attribution for a label, matched exactly first and then ignoring case.
    pub fn get(&self, label: &str) -> Option<&LabelAttribution> {
        self.labels
            .iter()
            .find(|l| l.label == label)
            .or_else(|| self.labels.iter().find(|l| l.label.eq_ignore_ascii_case(label)))
    }

    /// Number of attributed tokens (the same for every label).
    pub fn token_count(&self) -> usize {
        self.labels.first().map_or(0, |l| l.tokens.len())
    }

    /// `true` when no token was attributed.
    pub fn is_empty(&self) -> bool {
        self.token_count() == 0
    }
}

/// Attribution settings.
///
/// ```rust,no_run
/// # use sentiment_lens::explain::{AttributionMethod, Explainer};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let pipeline = sentiment_lens::sentiment::load("ElKulako/cryptobert")?;
/// let explainer = Explainer::new()
///     .method(AttributionMethod::Permutation { permutations: 16, seed: 7 })
///     .batch_size(16);
/// let explanation = explainer.explain(&pipeline, "to the moon!")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Explainer {
    method: AttributionMethod,
    batch_size: usize,
}

impl Default for Explainer {
    fn default() -> Self {
        Self {
            method: AttributionMethod::Auto,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Explainer {
    /// [`AttributionMethod::Auto`] with batches of 32.
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimation method.
    pub fn method(mut self, method: AttributionMethod) -> Self {
        self.method = method;
        self
    }

    /// Rows per forward pass (minimum 1).
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The configured method.
    pub fn configured_method(&self) -> AttributionMethod {
        self.method
    }

    /// Explain every label of `pipeline`'s prediction for `text`.
    ///
    /// Empty or whitespace-only text is explained as the special-tokens-only input and
    /// has no attributed tokens. If the tokenizer rejects the text the explanation is
    /// also empty, with zero base and output values.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Attribution`] if the model produces non-finite values, or any
    /// inference error from the model.
    pub fn explain<M: SequenceClassificationModel>(
        &self,
        pipeline: &SentimentPipeline<M>,
        text: &str,
    ) -> Result<Explanation> {
        let mut stats_builder = PipelineStats::start();
        let input = if text.trim().is_empty() { "" } else { text };

        let encoding = match pipeline.encode(input) {
            Ok(encoding) => encoding,
            Err(e) => {
                tracing::warn!(model_id = %pipeline.model_id(), error = %e, "tokenization failed, returning an empty explanation");
                let labels = pipeline
                    .labels()
                    .iter()
                    .map(|label| LabelAttribution {
                        label: label.clone(),
                        base_value: 0.0,
                        output_value: 0.0,
                        tokens: Vec::new(),
                    })
                    .collect();
                return Ok(Explanation {
                    model_id: pipeline.model_id().to_string(),
                    text: text.to_string(),
                    method: self.method.resolve(0),
                    labels,
                    stats: stats_builder.finish(1),
                });
            }
        };

        let masker = TokenMasker::new(&encoding, pipeline.special_ids.mask_id);
        let players = masker.players();
        let method = self.method.resolve(players);
        tracing::debug!(model_id = %pipeline.model_id(), tokens = players, %method, "explaining");

        let mut evaluator = CoalitionEvaluator::new(pipeline, &masker, self.batch_size);
        let attributions = match method {
            AttributionMethod::Exact => shapley::exact(players, &mut evaluator)?,
            AttributionMethod::Permutation { permutations, seed } => {
                shapley::permutation(players, permutations, seed, &mut evaluator)?
            }
            AttributionMethod::Ablation => shapley::ablation(players, &mut evaluator)?,
            AttributionMethod::Auto => {
                return Err(PipelineError::Unexpected(
                    "attribution method was not resolved".to_string(),
                ))
            }
        };
        stats_builder.record_evaluations(evaluator.evaluations());

        let labels = label_attributions(pipeline.labels(), text, &encoding, &masker, &attributions)?;

        Ok(Explanation {
            model_id: pipeline.model_id().to_string(),
            text: text.to_string(),
            method,
            labels,
            stats: stats_builder.finish(1),
        })
    }
}

fn label_attributions(
    labels: &[String],
    text: &str,
    encoding: &tokenizers::Encoding,
    masker: &TokenMasker,
    attributions: &Attributions,
) -> Result<Vec<LabelAttribution>> {
    let tokens = encoding.get_tokens();
    let offsets = encoding.get_offsets();

    labels
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let tokens = masker
                .positions()
                .iter()
                .zip(&attributions.phi)
                .map(|(&position, phi)| {
                    let contribution = phi[index];
                    if !contribution.is_finite() {
                        return Err(PipelineError::Attribution(format!(
                            "Non-finite contribution for token {position} of label '{label}'"
                        )));
                    }
                    let (start, end) = offsets[position];
                    Ok(TokenAttribution {
                        token: tokens[position].clone(),
                        span: text
                            .get(start..end)
                            .map(str::to_string)
                            .unwrap_or_else(|| tokens[position].clone()),
                        offsets: (start, end),
                        position,
                        contribution: contribution as f32,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(LabelAttribution {
                label: label.clone(),
                base_value: attributions.base[index] as f32,
                output_value: attributions.full[index] as f32,
                tokens,
            })
        })
        .collect()
}
