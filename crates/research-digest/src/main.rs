use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use digest_core::{
    briefing_stem, get_default_output_dir, Aggregator, AnthropicSynthesizer, ArxivConnector,
    BriefingRenderer, ConfiguredSource, ContextBuilder, Credentials, DeliveryChannel,
    DigestConfig, DryRunChannel, GeminiSynthesizer, NewsApiConnector, Pipeline, ResendChannel,
    RunError, SourceConnector, SourceKind, SynthesisInvoker, SynthesisProvider,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "research-digest")]
#[command(about = "Fetch new papers and news, summarize them with an LLM, and e-mail the briefing")]
struct Args {
    /// Path to digest.toml (defaults to ~/.config/research-digest/digest.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the briefing to disk instead of e-mailing it
    #[arg(long)]
    dry_run: bool,

    /// Output directory for --dry-run
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn build_sources(config: &DigestConfig, creds: &Credentials) -> Result<Vec<ConfiguredSource>> {
    let timeout = config.per_source_timeout();
    let mut sources = Vec::with_capacity(config.sources.len());

    for spec in &config.sources {
        let connector: Box<dyn SourceConnector> = match spec.kind {
            SourceKind::Paper => Box::new(ArxivConnector::new(timeout)?),
            SourceKind::News => {
                Box::new(NewsApiConnector::new(creds.require_news()?, timeout)?)
            }
        };
        sources.push(ConfiguredSource::new(connector, spec.query.clone(), spec.limit));
    }

    Ok(sources)
}

fn build_synthesizer(
    config: &DigestConfig,
    creds: &Credentials,
) -> Result<Box<dyn SynthesisInvoker>> {
    let settings = &config.synthesis;
    let timeout = Duration::from_secs(settings.timeout_secs);

    let model = settings.model.clone();

    let synthesizer: Box<dyn SynthesisInvoker> = match settings.provider {
        SynthesisProvider::Anthropic => Box::new(
            AnthropicSynthesizer::new(creds.require_anthropic()?, model, timeout)?
                .with_limits(settings.max_tokens, settings.max_attempts),
        ),
        SynthesisProvider::Gemini => Box::new(
            GeminiSynthesizer::new(creds.require_google()?, model, timeout)?
                .with_limits(settings.max_tokens, settings.max_attempts),
        ),
    };

    Ok(synthesizer)
}

fn build_channel(
    args: &Args,
    config: &DigestConfig,
    creds: &Credentials,
    now: chrono::DateTime<Utc>,
) -> Result<Box<dyn DeliveryChannel>> {
    if args.dry_run {
        let dir = match &args.output {
            Some(dir) => dir.clone(),
            None => get_default_output_dir()?,
        };
        return Ok(Box::new(DryRunChannel::new(dir, briefing_stem(now))));
    }

    let delivery = &config.delivery;
    let channel = ResendChannel::new(
        creds.require_resend()?,
        delivery.from.clone(),
        delivery.to.clone(),
    )?;
    Ok(Box::new(channel))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json);

    let config = DigestConfig::load(args.config.as_deref())?;
    let creds = Credentials::from_env();
    let now = Utc::now();
    tracing::debug!(
        sources = config.sources.len(),
        provider = ?config.synthesis.provider,
        "config loaded"
    );

    // Build every collaborator up front so credential problems surface before any fetch
    let sources = build_sources(&config, &creds)?;
    let synthesizer = build_synthesizer(&config, &creds)?;
    let channel = build_channel(&args, &config, &creds, now)?;

    let aggregator = Aggregator::new(sources)
        .with_section_order(config.resolved_section_order())
        .with_timeouts(config.per_source_timeout(), config.run_deadline())
        .with_body_max_chars(config.body_max_chars);

    let pipeline = Pipeline::new(
        aggregator,
        ContextBuilder::new(config.context_budget_chars),
        synthesizer,
        config.prompt_template.clone(),
    );
    let renderer = BriefingRenderer::new(config.delivery.subject.clone());

    println!("\n📚 Gathering papers and news...");
    match pipeline.run_and_deliver(&renderer, channel.as_ref(), now).await {
        Ok(report) => {
            for (kind, err) in &report.source_failures {
                println!("⚠ Skipped {} section: {}", kind.label(), err);
            }
            if let Some(warning) = &report.warning {
                println!("⚠ {}", warning);
            }
            println!(
                "\n✅ Briefing with {} sections and {} sources {}",
                report.briefing.sections.len(),
                report.briefing.item_count(),
                if args.dry_run { "written to disk" } else { "sent" }
            );
            Ok(())
        }
        Err(RunError::AllSourcesFailed(failures)) => {
            for (kind, err) in &failures {
                println!("  ✗ {}: {}", kind.label(), err);
            }
            anyhow::bail!("Every source failed; no briefing was sent")
        }
        Err(e) => Err(e).context("Run failed; no briefing was sent"),
    }
}
