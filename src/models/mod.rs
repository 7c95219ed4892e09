// ============ Sequence classification backends ============

pub(crate) mod bert;
pub(crate) mod distilbert;
pub(crate) mod modernbert;
pub(crate) mod roberta;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{ops::softmax, VarBuilder};
use std::path::Path;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::loaders::ClassifierFiles;
use crate::pipelines::sentiment::model::{EncodedBatch, SequenceClassificationModel};

/// Encoder families we know how to put a classification head on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Architecture {
    Bert,
    Roberta,
    DistilBert,
    ModernBert,
}

impl Architecture {
    pub fn from_model_type(model_type: &str) -> Result<Self> {
        match model_type {
            "bert" => Ok(Self::Bert),
            "roberta" | "xlm-roberta" | "camembert" => Ok(Self::Roberta),
            "distilbert" => Ok(Self::DistilBert),
            "modernbert" => Ok(Self::ModernBert),
            "" => Err(PipelineError::UnsupportedModel(
                "config.json has no model_type; cannot pick an architecture".to_string(),
            )),
            other => Err(PipelineError::UnsupportedModel(format!(
                "Unsupported architecture '{other}'. Supported: bert, roberta, xlm-roberta, camembert, distilbert, modernbert"
            ))),
        }
    }
}

/// Build a classifier for an already fetched checkpoint.
pub(crate) fn load_sequence_classifier(
    files: &ClassifierFiles,
    labels: Vec<String>,
    device: &Device,
) -> Result<Arc<dyn SequenceClassificationModel>> {
    let architecture = Architecture::from_model_type(&files.probe.model_type)?;
    let weights = files.weights()?;
    let vb = var_builder(&weights, device)?;

    tracing::debug!(
        ?architecture,
        weights = %weights.display(),
        num_labels = labels.len(),
        "loading classifier weights"
    );

    let model: Arc<dyn SequenceClassificationModel> = match architecture {
        Architecture::Bert => Arc::new(bert::BertSentimentModel::load(
            &files.config_json,
            vb,
            labels,
            device.clone(),
        )?),
        Architecture::Roberta => Arc::new(roberta::RobertaSentimentModel::load(
            &files.config_json,
            vb,
            labels,
            device.clone(),
        )?),
        Architecture::DistilBert => Arc::new(distilbert::DistilBertSentimentModel::load(
            &files.config_json,
            files.probe.dim.or(files.probe.hidden_size),
            vb,
            labels,
            device.clone(),
        )?),
        Architecture::ModernBert => Arc::new(modernbert::SentimentModernBertModel::load(
            &files.config_json,
            vb,
            labels,
            device.clone(),
        )?),
    };

    Ok(model)
}

fn var_builder(weights_path: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let vb = if weights_path.extension().is_some_and(|e| e == "safetensors") {
        unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? }
    } else {
        VarBuilder::from_pth(weights_path, DType::F32, device)?
    };
    Ok(vb)
}

/// Input tensors for one forward pass, each shaped `(batch, seq_len)`.
pub(crate) struct BatchTensors {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub type_ids: Tensor,
}

impl BatchTensors {
    pub fn new(batch: &EncodedBatch, device: &Device) -> Result<Self> {
        let shape = (batch.len(), batch.seq_len());
        Ok(Self {
            input_ids: Tensor::from_slice(batch.input_ids(), shape, device)?,
            attention_mask: Tensor::from_slice(batch.attention_mask(), shape, device)?,
            type_ids: Tensor::from_slice(batch.type_ids(), shape, device)?,
        })
    }
}

/// Softmax over `(batch, num_labels)` logits, one probability row per input.
pub(crate) fn probabilities(logits: &Tensor) -> Result<Vec<Vec<f32>>> {
    let probs = softmax(&logits.to_dtype(DType::F32)?, D::Minus1)?;
    Ok(probs.to_vec2::<f32>()?)
}
