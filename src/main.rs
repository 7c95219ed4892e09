//! sentiment-lens: compare sentiment classifiers and their token attributions in a
//! terminal.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use sentiment_lens::compare::{render, LabelVocabularies, ModelSlot, RenderOptions, Session, Slot};
use sentiment_lens::explain::{AttributionMethod, Explainer, DEFAULT_BATCH_SIZE, DEFAULT_PERMUTATIONS};
use sentiment_lens::sentiment::{DeviceRequest, DEFAULT_MAX_LENGTH};

/// Compare one or two Hugging Face sentiment models on the same text
#[derive(Parser, Debug)]
#[command(name = "sentiment-lens", version, about, long_about = None)]
struct Cli {
    /// Model identifier; pass twice to compare two models
    #[arg(short, long = "model", required = true, num_args = 1)]
    models: Vec<String>,

    /// Text to analyze (reads one text per stdin line if omitted)
    #[arg(short, long)]
    text: Option<String>,

    /// JSON file with extra label vocabularies
    #[arg(long)]
    vocabularies: Option<PathBuf>,

    /// Attribution method
    #[arg(long, value_enum, default_value_t = Method::Auto)]
    method: Method,

    /// Antithetic permutation pairs for sampled attribution
    #[arg(long, default_value_t = DEFAULT_PERMUTATIONS)]
    permutations: usize,

    /// Seed for sampled attribution
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Rows per forward pass while explaining
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Truncate and pad inputs to this many tokens
    #[arg(long, default_value_t = DEFAULT_MAX_LENGTH)]
    max_length: usize,

    /// Run on this CUDA device instead of the CPU
    #[arg(long)]
    cuda: Option<usize>,

    /// Print contributions as numbers instead of colours
    #[arg(long)]
    plain: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    Auto,
    Exact,
    Permutation,
    Ablation,
}

impl Cli {
    fn attribution_method(&self) -> AttributionMethod {
        match self.method {
            Method::Auto => AttributionMethod::Auto,
            Method::Exact => AttributionMethod::Exact,
            Method::Permutation => AttributionMethod::Permutation {
                permutations: self.permutations,
                seed: self.seed,
            },
            Method::Ablation => AttributionMethod::Ablation,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .init();

    if cli.models.len() > 2 {
        anyhow::bail!("at most two models can be compared, got {}", cli.models.len());
    }

    let mut vocabularies = LabelVocabularies::default();
    if let Some(path) = &cli.vocabularies {
        let extra = LabelVocabularies::from_path(path)
            .with_context(|| format!("reading vocabularies from {}", path.display()))?;
        vocabularies.extend(extra);
    }

    let device = cli.cuda.map_or(DeviceRequest::Cpu, DeviceRequest::Cuda);
    let mut session = Session::new()
        .with_vocabularies(vocabularies)
        .with_max_length(cli.max_length)
        .with_device(device)
        .with_explainer(
            Explainer::new()
                .method(cli.attribution_method())
                .batch_size(cli.batch_size),
        );

    for (slot, model_id) in Slot::ALL.into_iter().zip(&cli.models) {
        eprintln!("{slot}: loading {model_id}...");
        if let ModelSlot::Failed(err) = session.select(slot, model_id) {
            eprintln!("{slot}: {err}");
        }
    }

    let options = RenderOptions {
        color: !cli.plain && io::stdout().is_terminal(),
    };
    let mut stdout = io::stdout().lock();

    match &cli.text {
        Some(text) => analyze(&session, text, &mut stdout, options)?,
        None => {
            for line in io::stdin().lock().lines() {
                let line = line.context("reading stdin")?;
                analyze(&session, &line, &mut stdout, options)?;
            }
        }
    }

    Ok(())
}

fn analyze<W: Write>(
    session: &Session,
    text: &str,
    out: &mut W,
    options: RenderOptions,
) -> anyhow::Result<()> {
    let Some(report) = session.compare(text) else {
        return Ok(());
    };
    render(out, &report, options)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
