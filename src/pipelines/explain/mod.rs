//! Token attributions for sentiment predictions.
//!
//! Every text token is a player in a coalition game whose value is the model's
//! probability vector. Tokens outside a coalition are replaced by the tokenizer's mask
//! token; special tokens and padding are never touched. One set of model evaluations
//! serves all labels.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = sentiment_lens::sentiment::load("ElKulako/cryptobert")?;
//! let explanation = pipeline.explain("to the moon!")?;
//!
//! for label in explanation.labels() {
//!     println!("{} base={:.3} output={:.3}", label.label, label.base_value, label.output_value);
//!     for t in &label.tokens {
//!         println!("  {:<10} {:+.4}", t.span, t.contribution);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Methods
//!
//! | Method | Evaluations | Additive |
//! |--------|-------------|----------|
//! | [`AttributionMethod::Exact`] | `2^n` | yes |
//! | [`AttributionMethod::Permutation`] | up to `2 * pairs * n + 2` | yes |
//! | [`AttributionMethod::Ablation`] | `n + 2` | no |
//!
//! [`AttributionMethod::Auto`] (default) is exact up to 10 tokens and samples 8
//! seeded pairs beyond that, so repeated calls return identical results.

pub(crate) mod coalition;
pub(crate) mod explainer;
pub(crate) mod shapley;

pub use explainer::{
    AttributionMethod, Explainer, Explanation, LabelAttribution, TokenAttribution,
    AUTO_EXACT_MAX_TOKENS, DEFAULT_BATCH_SIZE, DEFAULT_PERMUTATIONS,
};
