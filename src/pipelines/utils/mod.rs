use crate::error::{PipelineError, Result};
use candle_core::Device;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Where the classifier should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceRequest {
    /// Run on the CPU (default).
    #[default]
    Cpu,
    /// Run on the CUDA GPU with this ordinal. Needs the `cuda` feature.
    Cuda(usize),
}

impl DeviceRequest {
    pub(crate) fn resolve(self) -> Result<Device> {
        match self {
            DeviceRequest::Cpu => Ok(Device::Cpu),
            DeviceRequest::Cuda(i) => Device::new_cuda(i).map_err(|e| {
                PipelineError::Device(format!(
                    "Failed to init CUDA device {i}: {e}. Try CPU as fallback."
                ))
            }),
        }
    }

    pub(crate) fn cache_tag(self) -> String {
        match self {
            DeviceRequest::Cpu => "cpu".to_string(),
            DeviceRequest::Cuda(i) => format!("cuda:{i}"),
        }
    }
}

/// Token ids the pipeline needs besides the vocabulary itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpecialIds {
    pub pad_id: u32,
    /// Replacement for hidden tokens during attribution. Falls back to `pad_id`.
    pub mask_id: u32,
}

/// Truncate to `max_length` and pad every encoding to exactly `max_length`.
pub(crate) fn apply_fixed_length_policy(
    tokenizer: &mut Tokenizer,
    max_length: usize,
) -> Result<SpecialIds> {
    if max_length == 0 {
        return Err(PipelineError::Tokenization(
            "max_length must be at least 1".to_string(),
        ));
    }

    let existing = tokenizer.get_padding().cloned();
    let pad_id = existing
        .as_ref()
        .map(|p| p.pad_id)
        .or_else(|| tokenizer.token_to_id("<pad>"))
        .or_else(|| tokenizer.token_to_id("[PAD]"))
        .unwrap_or(0);
    let pad_token = existing
        .as_ref()
        .map(|p| p.pad_token.clone())
        .or_else(|| tokenizer.id_to_token(pad_id))
        .unwrap_or_else(|| "[PAD]".to_string());
    let mask_id = tokenizer
        .token_to_id("[MASK]")
        .or_else(|| tokenizer.token_to_id("<mask>"))
        .unwrap_or(pad_id);

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| {
            PipelineError::Tokenization(format!(
                "Failed to enable truncation at {max_length} tokens: {e}"
            ))
        })?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::Fixed(max_length),
        pad_id,
        pad_token,
        pad_type_id: 0,
        pad_to_multiple_of: None,
        ..existing.unwrap_or_default()
    }));

    Ok(SpecialIds { pad_id, mask_id })
}

/// Cache key for one loaded classifier configuration. Label names are part of the
/// loaded model, so they are part of the key.
pub(crate) fn build_cache_key(
    model_id: &str,
    device: DeviceRequest,
    max_length: usize,
    labels: &[String],
) -> String {
    format!(
        "{model_id}-{}-len{max_length}-labels[{}]",
        device.cache_tag(),
        labels.join("|")
    )
}
