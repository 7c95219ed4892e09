use candle_core::{Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::distilbert::{Config, DistilBertModel};

use super::{probabilities, BatchTensors};
use crate::error::Result;
use crate::pipelines::sentiment::model::{EncodedBatch, SequenceClassificationModel};

const DEFAULT_DIM: usize = 768;

/// `DistilBertForSequenceClassification`: encoder, ReLU pre-classifier over `[CLS]`, head.
pub struct DistilBertSentimentModel {
    model: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    labels: Vec<String>,
    device: Device,
}

impl DistilBertSentimentModel {
    /// `dim` comes from the raw config since candle keeps the field private.
    pub fn load(
        config_json: &str,
        dim: Option<usize>,
        vb: VarBuilder<'static>,
        labels: Vec<String>,
        device: Device,
    ) -> Result<Self> {
        let config: Config = serde_json::from_str(config_json)?;
        let dim = dim.unwrap_or(DEFAULT_DIM);

        let model = DistilBertModel::load(vb.pp("distilbert"), &config)?;
        let pre_classifier = candle_nn::linear(dim, dim, vb.pp("pre_classifier"))?;
        let classifier = candle_nn::linear(dim, labels.len(), vb.pp("classifier"))?;

        Ok(Self {
            model,
            pre_classifier,
            classifier,
            labels,
            device,
        })
    }
}

impl SequenceClassificationModel for DistilBertSentimentModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict_proba(&self, batch: &EncodedBatch) -> Result<Vec<Vec<f32>>> {
        let inputs = BatchTensors::new(batch, &self.device)?;

        // candle's DistilBERT masks positions where the mask is 1, the opposite of HF.
        // Shaped to broadcast over (batch, heads, query, key) scores.
        let inverted: Vec<u8> = batch
            .attention_mask()
            .iter()
            .map(|&m| u8::from(m == 0))
            .collect();
        let mask = Tensor::from_vec(
            inverted,
            (batch.len(), 1, 1, batch.seq_len()),
            &self.device,
        )?;

        let hidden = self.model.forward(&inputs.input_ids, &mask)?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&cls)?.relu()?;
        let logits = self.classifier.forward(&pooled)?;

        probabilities(&logits)
    }

    fn device(&self) -> Device {
        self.device.clone()
    }
}
