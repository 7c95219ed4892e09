//! Side-by-side comparison of up to two sentiment models.
//!
//! A [`Session`] holds two model slots. [`Session::compare`] classifies and explains the
//! same text with each loaded model and aligns the results by label. Each model keeps its
//! own label names; the [`LabelVocabularies`] table only decides row order and legend.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sentiment_lens::compare::{render, RenderOptions, Session, Slot};
//!
//! # fn main() -> std::io::Result<()> {
//! let mut session = Session::new();
//! session.select(Slot::First, "nlptown/bert-base-multilingual-uncased-sentiment");
//! session.select(Slot::Second, "ElKulako/cryptobert");
//!
//! if let Some(report) = session.compare("to the moon!") {
//!     render(&mut std::io::stdout(), &report, RenderOptions::default())?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Vocabulary files
//!
//! ```json
//! [
//!   { "model": "acme/sentiment-*", "labels": ["neg", "neu", "pos"], "legend": "neg: Negative sentiment" }
//! ]
//! ```
//!
//! `labels` is the display order. A checkpoint whose config only names its outputs
//! `LABEL_0`, `LABEL_1`, ... is renamed from an optional `id2label` array, in output
//! index order.

mod render;
mod report;
mod session;
mod vocab;

pub use render::{render, RenderOptions};
pub use report::{ComparisonReport, LabelRow, ModelAnalysis, ModelReport, Slot, UnavailableModel};
pub use session::{ModelSlot, Session};
pub use vocab::{LabelVocabularies, LabelVocabulary};
