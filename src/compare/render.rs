use std::io::{self, Write};

use crossterm::style::{Color, Stylize};

use super::report::{ComparisonReport, LabelRow};
use crate::explain::LabelAttribution;

/// How [`render`] draws attributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Highlight tokens with background colours. When off, contributions are printed
    /// inline as `span[+0.123]`.
    pub color: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Write a comparison report for a terminal.
///
/// Positive contributions are shaded red, negative ones blue, scaled by the largest
/// magnitude in that row so both models share one scale.
pub fn render<W: Write>(
    out: &mut W,
    report: &ComparisonReport,
    options: RenderOptions,
) -> io::Result<()> {
    writeln!(out, "Text: {}", report.text)?;

    for missing in &report.unavailable {
        writeln!(
            out,
            "{}: {} could not be loaded: {}",
            missing.slot, missing.model_id, missing.reason
        )?;
    }

    for model in &report.models {
        writeln!(out)?;
        writeln!(out, "{}: {}", model.slot, model.model_id)?;
        match &model.outcome {
            Ok(analysis) => {
                let p = &analysis.prediction;
                writeln!(out, "  prediction: {} ({:.3})", p.label, p.score)?;
                for s in &p.scores {
                    writeln!(out, "    {:<12} {:.3}", s.label, s.score)?;
                }
                writeln!(
                    out,
                    "  attribution: {}, {} tokens, {} model evaluations",
                    analysis.explanation.method,
                    analysis.explanation.token_count(),
                    analysis.explanation.stats.model_evaluations
                )?;
            }
            Err(e) => writeln!(out, "  failed: {e}")?,
        }
    }

    if report.rows.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    if let Some(legend) = &report.legend {
        writeln!(out, "{legend}")?;
    }

    for row in &report.rows {
        render_row(out, report, row, options)?;
    }
    Ok(())
}

fn render_row<W: Write>(
    out: &mut W,
    report: &ComparisonReport,
    row: &LabelRow,
    options: RenderOptions,
) -> io::Result<()> {
    writeln!(out, "{}", row.label)?;

    let scale = row
        .cells
        .iter()
        .flatten()
        .flat_map(|cell| cell.tokens.iter().map(|t| t.contribution.abs()))
        .fold(0f32, f32::max);

    for (model, cell) in report.models.iter().zip(&row.cells) {
        write!(out, "  [{}] ", model.slot)?;
        match cell {
            Some(attribution) => render_cell(out, attribution, scale, options)?,
            None => write!(out, "(no such label)")?,
        }
        writeln!(out)?;
    }
    Ok(())
}

fn render_cell<W: Write>(
    out: &mut W,
    attribution: &LabelAttribution,
    scale: f32,
    options: RenderOptions,
) -> io::Result<()> {
    write!(
        out,
        "base {:.3} -> {:.3} | ",
        attribution.base_value, attribution.output_value
    )?;
    if attribution.tokens.is_empty() {
        return write!(out, "(no tokens)");
    }

    let mut previous_end = None;
    for token in &attribution.tokens {
        // Adjacent sub-word pieces are drawn without a gap.
        if previous_end.is_some_and(|end| end < token.offsets.0) {
            write!(out, " ")?;
        }
        previous_end = Some(token.offsets.1);

        if options.color {
            let content = token.span.as_str().with(Color::Black).on(shade(token.contribution, scale));
            write!(out, "{content}")?;
        } else {
            write!(out, "{}[{:+.3}]", token.span, token.contribution)?;
        }
    }
    Ok(())
}

/// White fading to red for positive values and to blue for negative ones.
fn shade(contribution: f32, scale: f32) -> Color {
    let strength = if scale > 0.0 {
        (contribution.abs() / scale).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let fade = (255.0 * (1.0 - 0.8 * strength)).round() as u8;
    if contribution >= 0.0 {
        Color::Rgb {
            r: 255,
            g: fade,
            b: fade,
        }
    } else {
        Color::Rgb {
            r: fade,
            g: fade,
            b: 255,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shade_saturates_at_the_row_maximum() {
        assert_eq!(shade(0.0, 0.0), Color::Rgb { r: 255, g: 255, b: 255 });
        assert_eq!(shade(0.5, 0.5), Color::Rgb { r: 255, g: 51, b: 51 });
        assert_eq!(shade(-0.5, 0.5), Color::Rgb { r: 51, g: 51, b: 255 });
        assert_eq!(shade(2.0, 0.5), shade(0.5, 0.5));
    }
}
