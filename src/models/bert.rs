use candle_core::{Device, IndexOp};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};

use super::{probabilities, BatchTensors};
use crate::error::Result;
use crate::pipelines::sentiment::model::{EncodedBatch, SequenceClassificationModel};

/// `BertForSequenceClassification`: encoder, tanh pooler over `[CLS]`, linear head.
pub struct BertSentimentModel {
    model: BertModel,
    pooler: Linear,
    classifier: Linear,
    labels: Vec<String>,
    device: Device,
}

impl BertSentimentModel {
    pub fn load(
        config_json: &str,
        vb: VarBuilder<'static>,
        labels: Vec<String>,
        device: Device,
    ) -> Result<Self> {
        let config: Config = serde_json::from_str(config_json)?;

        let model = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = candle_nn::linear(
            config.hidden_size,
            config.hidden_size,
            vb.pp("bert.pooler.dense"),
        )?;
        let classifier = candle_nn::linear(config.hidden_size, labels.len(), vb.pp("classifier"))?;

        Ok(Self {
            model,
            pooler,
            classifier,
            labels,
            device,
        })
    }
}

impl SequenceClassificationModel for BertSentimentModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict_proba(&self, batch: &EncodedBatch) -> Result<Vec<Vec<f32>>> {
        let inputs = BatchTensors::new(batch, &self.device)?;

        let hidden = self.model.forward(
            &inputs.input_ids,
            &inputs.type_ids,
            Some(&inputs.attention_mask),
        )?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;

        probabilities(&logits)
    }

    fn device(&self) -> Device {
        self.device.clone()
    }
}
