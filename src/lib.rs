//! # sentiment-lens
//!
//! Compare pretrained sentiment classifiers from the Hugging Face Hub and see which
//! tokens drove each label.
//!
//! - [`sentiment`] loads a 3-label sequence classifier and predicts label distributions.
//! - [`explain`] attributes every label's probability to the input tokens with
//!   Shapley values over masked coalitions.
//! - [`compare`] runs one or two models on the same text and lines their labels up.
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = sentiment_lens::sentiment::load("ElKulako/cryptobert")?;
//! let prediction = model.classify("to the moon!")?;
//! let explanation = model.explain("to the moon!")?;
//!
//! println!("{} ({:.2})", prediction.label, prediction.score);
//! for token in &explanation.get("Bullish").map(|l| l.tokens.clone()).unwrap_or_default() {
//!     println!("{:>8} {:+.3}", token.span, token.contribution);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod compare;
pub mod error;
pub(crate) mod loaders;
pub(crate) mod models;
pub(crate) mod pipelines;

pub use error::{LoadError, PipelineError, Result};
pub use pipelines::{explain, sentiment};
