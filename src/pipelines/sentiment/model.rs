use crate::error::{PipelineError, Result};
use std::sync::Arc;

/// Fixed-width token rows ready for a forward pass, stored row-major.
#[derive(Debug, Clone, Default)]
pub struct EncodedBatch {
    input_ids: Vec<u32>,
    attention_mask: Vec<u32>,
    type_ids: Vec<u32>,
    seq_len: usize,
    rows: usize,
}

impl EncodedBatch {
    /// An empty batch whose rows will all be `seq_len` tokens long.
    pub fn new(seq_len: usize) -> Self {
        Self {
            seq_len,
            ..Default::default()
        }
    }

    /// Append one row. All three slices must be exactly `seq_len` long.
    pub fn push(&mut self, input_ids: &[u32], attention_mask: &[u32], type_ids: &[u32]) -> Result<()> {
        if input_ids.len() != self.seq_len
            || attention_mask.len() != self.seq_len
            || type_ids.len() != self.seq_len
        {
            return Err(PipelineError::Tokenization(format!(
                "Encoded row has {} ids / {} mask / {} type ids, expected {}",
                input_ids.len(),
                attention_mask.len(),
                type_ids.len(),
                self.seq_len
            )));
        }
        self.input_ids.extend_from_slice(input_ids);
        self.attention_mask.extend_from_slice(attention_mask);
        self.type_ids.extend_from_slice(type_ids);
        self.rows += 1;
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Tokens per row.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// All input ids, row-major.
    pub fn input_ids(&self) -> &[u32] {
        &self.input_ids
    }

    /// All attention mask values, row-major.
    pub fn attention_mask(&self) -> &[u32] {
        &self.attention_mask
    }

    /// All token type ids, row-major.
    pub fn type_ids(&self) -> &[u32] {
        &self.type_ids
    }

    /// Input ids of a single row, `None` past the last row.
    pub fn row_ids(&self, row: usize) -> Option<&[u32]> {
        self.row(&self.input_ids, row)
    }

    /// Attention mask of a single row, `None` past the last row.
    pub fn row_mask(&self, row: usize) -> Option<&[u32]> {
        self.row(&self.attention_mask, row)
    }

    fn row<'a>(&self, values: &'a [u32], row: usize) -> Option<&'a [u32]> {
        if row >= self.rows {
            return None;
        }
        values.get(row * self.seq_len..(row + 1) * self.seq_len)
    }
}

/// A text classifier over a fixed label set.
///
/// Implemented by the bundled candle backends; implement it yourself to explain any other
/// model with [`SentimentPipeline::from_parts`](super::SentimentPipeline::from_parts).
pub trait SequenceClassificationModel: Send + Sync {
    /// Label names in output-index order.
    fn labels(&self) -> &[String];

    /// Class probabilities for every row of `batch`, each row in [`Self::labels`] order.
    fn predict_proba(&self, batch: &EncodedBatch) -> Result<Vec<Vec<f32>>>;

    /// The device the model runs on.
    fn device(&self) -> candle_core::Device {
        candle_core::Device::Cpu
    }
}

impl<T: SequenceClassificationModel + ?Sized> SequenceClassificationModel for Arc<T> {
    fn labels(&self) -> &[String] {
        (**self).labels()
    }

    fn predict_proba(&self, batch: &EncodedBatch) -> Result<Vec<Vec<f32>>> {
        (**self).predict_proba(batch)
    }

    fn device(&self) -> candle_core::Device {
        (**self).device()
    }
}
