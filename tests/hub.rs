//! Integration tests against real Hub checkpoints
//! Run with: cargo test --features integration

#![cfg(feature = "integration")]

use sentiment_lens::compare::{ModelSlot, Session, Slot};
use sentiment_lens::sentiment::{self, ModelCache, SentimentPipelineBuilder};
use sentiment_lens::PipelineError;

const FINANCE: &str = "mrm8488/distilroberta-finetuned-financial-news-sentiment-analysis";
const CRYPTO: &str = "ElKulako/cryptobert";
const NLPTOWN: &str = "nlptown/bert-base-multilingual-uncased-sentiment";

#[test]
fn unknown_model_fails_then_valid_model_loads() -> anyhow::Result<()> {
    let err = sentiment::load("nonexistent-model-id-xyz").unwrap_err();
    assert_eq!(err.model_id, "nonexistent-model-id-xyz");

    let pipeline = sentiment::load(FINANCE)?;
    let p = pipeline.classify("Shares plunged after the earnings miss.")?;
    assert_eq!(pipeline.labels().len(), 3);
    let total: f32 = p.scores.iter().map(|s| s.score).sum();
    assert!((total - 1.0).abs() < 1e-3);
    Ok(())
}

#[test]
fn five_label_checkpoint_is_rejected() {
    let err = sentiment::load(NLPTOWN).unwrap_err();
    assert!(matches!(err.source, PipelineError::UnsupportedModel(_)));
}

#[test]
fn crypto_model_explains_every_label() -> anyhow::Result<()> {
    let pipeline = sentiment::load(CRYPTO)?;
    let explanation = pipeline.explain("to the moon!")?;

    assert_eq!(explanation.labels().len(), 3);
    let expected = pipeline.tokenizer().encode("to the moon!", true).map_err(anyhow::Error::msg)?;
    let observed = expected
        .get_attention_mask()
        .iter()
        .zip(expected.get_special_tokens_mask())
        .filter(|(a, s)| **a == 1 && **s == 0)
        .count();
    assert_eq!(explanation.token_count(), observed);

    for label in explanation.labels() {
        assert!((label.total() - (label.output_value - label.base_value)).abs() < 1e-4);
    }
    assert_eq!(explanation.labels(), pipeline.explain("to the moon!")?.labels());
    Ok(())
}

#[test]
fn comparison_keeps_models_independent() -> anyhow::Result<()> {
    let mut session = Session::new();
    session.select(Slot::First, NLPTOWN);
    session.select(Slot::Second, CRYPTO);

    // The 5-label head cannot be served at 3 labels; the other slot is unaffected.
    assert!(matches!(session.slot(Slot::First), ModelSlot::Failed(_)));
    assert!(matches!(session.slot(Slot::Second), ModelSlot::Loaded(_)));

    let report = session.compare("to the moon!").expect("non-empty text");
    assert_eq!(report.unavailable.len(), 1);
    let crypto = report.model(Slot::Second).and_then(|m| m.analysis()).expect("analysis");
    let crypto_labels: Vec<String> = crypto.prediction.scores.iter().map(|s| s.label.clone()).collect();
    assert_eq!(crypto.explanation.labels().len(), crypto_labels.len());
    Ok(())
}

#[test]
fn same_model_twice_shares_weights() -> anyhow::Result<()> {
    let cache = ModelCache::new();
    let a = SentimentPipelineBuilder::new(FINANCE).build_with_cache(&cache)?;
    let b = SentimentPipelineBuilder::new(FINANCE).build_with_cache(&cache)?;
    assert_eq!(cache.len(), 1);

    drop(a);
    drop(b);
    assert!(cache.is_empty());
    Ok(())
}
