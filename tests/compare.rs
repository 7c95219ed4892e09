//! Two-model sessions with offline models.

mod common;

use common::{handle, BagOfWords, Failing};
use sentiment_lens::compare::{render, RenderOptions, Session, Slot};

fn session() -> Session {
    let mut session = Session::new();
    session.insert(Slot::First, handle("ElKulako/cryptobert", BagOfWords::crypto()));
    session.insert(Slot::Second, handle("toy/sentiment", BagOfWords::sentiment()));
    session
}

#[test]
fn each_model_keeps_its_own_labels() -> anyhow::Result<()> {
    let session = session();
    let report = session.compare("to the moon!").expect("non-empty text");

    assert_eq!(report.models.len(), 2);
    let first = report.model(Slot::First).and_then(|m| m.analysis()).expect("analysis");
    let second = report.model(Slot::Second).and_then(|m| m.analysis()).expect("analysis");

    let first_labels: Vec<&str> = first.explanation.labels().iter().map(|l| l.label.as_str()).collect();
    let second_labels: Vec<&str> = second.explanation.labels().iter().map(|l| l.label.as_str()).collect();
    assert_eq!(first_labels, vec!["Bullish", "Neutral", "Bearish"]);
    assert_eq!(second_labels, vec!["negative", "neutral", "positive"]);
    assert_eq!(first.prediction.label, "Bullish");
    Ok(())
}

#[test]
fn results_match_running_each_model_alone() -> anyhow::Result<()> {
    let report = session().compare("to the moon!").expect("non-empty text");

    let alone = handle("toy/sentiment", BagOfWords::sentiment());
    let expected = alone.explain("to the moon!")?;
    let second = report.model(Slot::Second).and_then(|m| m.analysis()).expect("analysis");

    assert_eq!(second.explanation.labels(), expected.labels());
    assert_eq!(second.prediction, alone.classify("to the moon!")?);
    Ok(())
}

#[test]
fn rows_follow_the_primary_vocabulary() {
    let report = session().compare("rally to the moon!").expect("non-empty text");

    let headings: Vec<&str> = report.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(
        headings,
        vec!["Bullish", "Neutral", "Bearish", "negative", "positive"]
    );

    let neutral = &report.rows[1];
    assert_eq!(neutral.cells[0].as_ref().map(|c| c.label.as_str()), Some("Neutral"));
    assert_eq!(neutral.cells[1].as_ref().map(|c| c.label.as_str()), Some("neutral"));
    assert!(report.rows[0].cells[1].is_none());
    assert!(report.legend.as_deref().unwrap_or_default().contains("Bullish: Positive sentiment"));
}

#[test]
fn empty_text_is_skipped() {
    let session = session();
    assert!(session.compare("").is_none());
    assert!(session.compare("   ").is_none());
}

#[test]
fn one_failing_model_does_not_affect_the_other() {
    let mut session = session();
    session.insert(Slot::First, handle("toy/failing", Failing));

    let report = session.compare("good").expect("non-empty text");
    assert!(report.model(Slot::First).expect("slot").outcome.is_err());
    let second = report.model(Slot::Second).and_then(|m| m.analysis()).expect("analysis");
    assert_eq!(second.prediction.label, "positive");

    // The second model becomes primary for row order.
    assert_eq!(report.rows[0].label, "negative");
}

#[test]
fn single_model_session() {
    let mut session = session();
    session.clear(Slot::Second);

    let report = session.compare("crash").expect("non-empty text");
    assert_eq!(report.models.len(), 1);
    assert!(report.rows.iter().all(|r| r.cells.len() == 1));
    assert_eq!(
        report.model(Slot::First).and_then(|m| m.analysis()).map(|a| a.prediction.label.as_str()),
        Some("Bearish")
    );
}

#[test]
fn plain_rendering_shows_numbers_per_token() -> anyhow::Result<()> {
    let report = session().compare("to the moon!").expect("non-empty text");

    let mut out = Vec::new();
    render(&mut out, &report, RenderOptions { color: false })?;
    let text = String::from_utf8(out)?;

    assert!(text.contains("Model 1: ElKulako/cryptobert"));
    assert!(text.contains("Model 2: toy/sentiment"));
    assert!(text.contains("moon["));
    assert!(text.contains("Bullish"));
    assert!(!text.contains('\u{1b}'));
    Ok(())
}
