//! One run of the digest: aggregate, build context, synthesize, assemble,
//! and optionally deliver.
//!
//! The run fails when every source failed, when nothing fits the context
//! budget, or when synthesis failed. Nothing is delivered in those cases.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::aggregator::Aggregator;
use crate::assembler::BriefingAssembler;
use crate::context::ContextBuilder;
use crate::delivery::DeliveryChannel;
use crate::error::{AssemblyWarning, RunError, SourceError};
use crate::models::{Briefing, SourceKind};
use crate::prompt::prepare_template;
use crate::render::BriefingRenderer;
use crate::synthesis::SynthesisInvoker;

/// What a successful run produced
#[derive(Debug)]
pub struct RunReport {
    pub briefing: Briefing,
    /// Sources that failed without sinking the run
    pub source_failures: BTreeMap<SourceKind, SourceError>,
    pub warning: Option<AssemblyWarning>,
}

pub struct Pipeline {
    aggregator: Aggregator,
    context_builder: ContextBuilder,
    synthesizer: Box<dyn SynthesisInvoker>,
    prompt_template: String,
}

impl Pipeline {
    pub fn new(
        aggregator: Aggregator,
        context_builder: ContextBuilder,
        synthesizer: Box<dyn SynthesisInvoker>,
        prompt_template: impl Into<String>,
    ) -> Self {
        Self {
            aggregator,
            context_builder,
            synthesizer,
            prompt_template: prompt_template.into(),
        }
    }

    /// Produce a briefing, or a run-level error if there is nothing to send
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, RunError> {
        tracing::info!(sources = self.aggregator.source_count(), "fetching sources");
        let bundle = self.aggregator.aggregate().await;

        if bundle.is_total_failure() || bundle.items.is_empty() {
            tracing::error!(
                failures = bundle.source_failures.len(),
                "every source failed; skipping synthesis and delivery"
            );
            return Err(RunError::AllSourcesFailed(bundle.source_failures));
        }

        let context = self.context_builder.build(&bundle);
        if context.sections.is_empty() {
            tracing::error!(
                budget = self.context_builder.budget_chars(),
                "context is empty; skipping synthesis and delivery"
            );
            return Err(RunError::EmptyContext {
                budget: self.context_builder.budget_chars(),
            });
        }
        tracing::info!(
            items = bundle.items.len(),
            chars = context.text.chars().count(),
            "context ready"
        );

        let template = prepare_template(&self.prompt_template, &context.sections, now);
        let text = match self.synthesizer.synthesize(&template, &context.text).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(kind = %err.kind, cause = %err.cause, "synthesis failed");
                return Err(err.into());
            }
        };

        let (briefing, warning) = BriefingAssembler::assemble(&text, &context.sections, &bundle);
        tracing::info!(
            sections = briefing.sections.len(),
            items = briefing.item_count(),
            "briefing assembled"
        );

        Ok(RunReport {
            briefing,
            source_failures: bundle.source_failures,
            warning,
        })
    }

    /// Run, render, and hand the briefing to `channel`. Delivery is only
    /// attempted after a successful run.
    pub async fn run_and_deliver(
        &self,
        renderer: &BriefingRenderer,
        channel: &dyn DeliveryChannel,
        now: DateTime<Utc>,
    ) -> Result<RunReport, RunError> {
        let report = self.run(now).await?;
        let rendered = renderer.render(&report.briefing, now);
        channel.deliver(&rendered, &report.briefing).await?;
        tracing::info!(subject = %rendered.subject, "briefing delivered");
        Ok(report)
    }
}
