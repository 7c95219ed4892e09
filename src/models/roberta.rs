use candle_core::Device;
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config, XLMRobertaForSequenceClassification};

use super::{probabilities, BatchTensors};
use crate::error::Result;
use crate::pipelines::sentiment::model::{EncodedBatch, SequenceClassificationModel};

/// RoBERTa-family classifier (`roberta`, `xlm-roberta`, `camembert` checkpoints).
///
/// These share the XLM-R layout: `roberta.*` encoder with padding-offset positions and a
/// `classifier.dense` / `classifier.out_proj` head over `<s>`.
pub struct RobertaSentimentModel {
    model: XLMRobertaForSequenceClassification,
    labels: Vec<String>,
    device: Device,
}

impl RobertaSentimentModel {
    pub fn load(
        config_json: &str,
        vb: VarBuilder<'static>,
        labels: Vec<String>,
        device: Device,
    ) -> Result<Self> {
        let config: Config = serde_json::from_str(config_json)?;
        let model = XLMRobertaForSequenceClassification::new(labels.len(), &config, vb)?;

        Ok(Self {
            model,
            labels,
            device,
        })
    }
}

impl SequenceClassificationModel for RobertaSentimentModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict_proba(&self, batch: &EncodedBatch) -> Result<Vec<Vec<f32>>> {
        let inputs = BatchTensors::new(batch, &self.device)?;
        let logits = self.model.forward(
            &inputs.input_ids,
            &inputs.attention_mask,
            &inputs.type_ids,
        )?;
        probabilities(&logits)
    }

    fn device(&self) -> Device {
        self.device.clone()
    }
}
