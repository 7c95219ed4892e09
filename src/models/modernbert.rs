use candle_core::Device;
use candle_nn::VarBuilder;
use candle_transformers::models::modernbert::{
    ClassifierConfig, ClassifierPooling, Config,
    ModernBertForSequenceClassification as CandleModernBertForSequenceClassification,
};
use std::collections::HashMap;

use super::{probabilities, BatchTensors};
use crate::error::Result;
use crate::pipelines::sentiment::model::{EncodedBatch, SequenceClassificationModel};

pub struct SentimentModernBertModel {
    model: CandleModernBertForSequenceClassification,
    labels: Vec<String>,
    device: Device,
}

impl SentimentModernBertModel {
    pub fn load(
        config_json: &str,
        vb: VarBuilder<'static>,
        labels: Vec<String>,
        device: Device,
    ) -> Result<Self> {
        let mut config: Config = serde_json::from_str(config_json)?;
        patch_config_labels(&mut config, &labels);

        let model = CandleModernBertForSequenceClassification::load(vb, &config)?;

        Ok(Self {
            model,
            labels,
            device,
        })
    }
}

impl SequenceClassificationModel for SentimentModernBertModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict_proba(&self, batch: &EncodedBatch) -> Result<Vec<Vec<f32>>> {
        let inputs = BatchTensors::new(batch, &self.device)?;
        let logits = self
            .model
            .forward(&inputs.input_ids, &inputs.attention_mask)?;
        probabilities(&logits)
    }

    fn device(&self) -> Device {
        self.device.clone()
    }
}

/// candle sizes the head from `classifier_config.id2label`, so it must match our labels.
fn patch_config_labels(config: &mut Config, labels: &[String]) {
    let pooling = config
        .classifier_config
        .as_ref()
        .map(|c| c.classifier_pooling.clone())
        .unwrap_or_else(ClassifierPooling::default);

    let id2label: HashMap<String, String> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (i.to_string(), label.clone()))
        .collect();
    let label2id: HashMap<String, String> = id2label
        .iter()
        .map(|(k, v)| (v.clone(), k.clone()))
        .collect();

    config.classifier_config = Some(ClassifierConfig {
        id2label,
        label2id,
        classifier_pooling: pooling,
    });
}
