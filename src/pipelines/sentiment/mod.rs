//! Sentiment classification pipeline.
//!
//! Load any 3-way sequence classifier from the Hugging Face Hub and get the predicted
//! label, its confidence, and the full label distribution.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = sentiment_lens::sentiment::load("ElKulako/cryptobert")?;
//!
//! // Single text - direct access
//! let output = pipeline.run("to the moon!")?;
//! println!("sentiment: {} (confidence: {:.2})", output.prediction.label, output.prediction.score);
//!
//! for s in &output.prediction.scores {
//!     println!("  {}: {:.3}", s.label, s.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Batch Inference
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let pipeline = sentiment_lens::sentiment::load("ElKulako/cryptobert")?;
//! let output = pipeline.run(&["Best purchase ever!", "Rug pull, sold everything."])?;
//! for r in output.results {
//!     let p = r.prediction?;
//!     println!("{}: {} ({:.2})", r.text, p.label, p.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Supported Architectures
//!
//! | `model_type` | Head |
//! |--------------|------|
//! | `bert` | tanh pooler + linear |
//! | `roberta`, `xlm-roberta`, `camembert` | dense + out_proj |
//! | `distilbert` | ReLU pre-classifier + linear |
//! | `modernbert` | candle's ModernBERT classifier |

// ============ Internal API ============

pub(crate) mod builder;
pub(crate) mod model;
pub(crate) mod pipeline;

// ============ Public API ============

pub use crate::pipelines::cache::ModelCache;
pub use crate::pipelines::stats::PipelineStats;
pub use crate::pipelines::utils::DeviceRequest;
pub use builder::{load, SentimentPipelineBuilder, DEFAULT_MAX_LENGTH, DEFAULT_NUM_LABELS};
pub use model::{EncodedBatch, SequenceClassificationModel};
pub use pipeline::{
    BatchOutput, BatchResult, LabelScore, ModelHandle, Output, Prediction, SentimentPipeline,
};

#[doc(hidden)]
pub use pipeline::SentimentInput;
