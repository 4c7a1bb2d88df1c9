//! Recognize command implementation.
//!
//! Runs the real orchestrator against the deterministic demo recognizers,
//! with priority and quota state persisted in the data directory.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use sightline_core::mock::{
    MockAiService, MockClassifier, MockCloudApi, MockEnhancer, StaticNetwork,
};
use sightline_core::{
    Orchestrator, OrchestratorConfig, ProgressEvent, QuotaLimits, QuotaTracker,
    RecognitionOutcome, Recognizers, Stage,
};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::utils::{format_confidence, load_image, open_store};

pub struct RecognizeOptions {
    pub offline: bool,
    pub sources: Vec<String>,
    pub user_ai: bool,
    pub json: bool,
    pub quiet: bool,
}

/// Execute the recognize command.
pub async fn execute(data_dir: &Path, file: &Path, options: RecognizeOptions) -> Result<()> {
    let image = load_image(file)?;
    let store = open_store(data_dir)?;

    let quota = Arc::new(QuotaTracker::load(store.clone()).context("Failed to load quota records")?);
    let limits = QuotaLimits::from_env();
    for source in &options.sources {
        quota
            .register(source, limits)
            .with_context(|| format!("Failed to register quota source {source}"))?;
    }

    let recognizers = Recognizers {
        offline: Arc::new(MockClassifier::default_test()),
        cloud: Arc::new(MockCloudApi::new(quota.clone(), options.sources.clone())),
        user_ai: Arc::new(MockAiService::new(options.user_ai)),
        enhancer: Arc::new(MockEnhancer::new()),
        network: Arc::new(StaticNetwork::new(!options.offline)),
    };
    let orchestrator = Orchestrator::builder(recognizers)
        .with_config(OrchestratorConfig::from_env())
        .with_store(store)
        .with_quota(quota)
        .build()
        .context("Failed to start orchestrator")?;

    let printer = (!options.quiet && !options.json).then(|| {
        let mut rx = orchestrator.subscribe_progress();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        print_progress(&event);
                        if event.is_terminal() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Progress printer lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let result = orchestrator.recognize_with_cancel(&image, &cancel).await;
    // Closing the progress channel ends the printer even without a terminal event
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    let outcome = result.context("Recognition failed")?;

    info!(
        name = %outcome.name,
        method = %outcome.method,
        confidence = outcome.confidence,
        "Recognized"
    );

    if options.json {
        let report = serde_json::json!({
            "outcome": outcome,
            "quality": outcome.quality(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_outcome(&outcome, options.quiet);
    }

    Ok(())
}

fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::StageEntered { stage, .. } => {
            let label = match stage {
                Stage::CacheLookup => "Checking recent results".to_string(),
                Stage::Preparing => "Preparing".to_string(),
                Stage::Attempting(method) => format!("Trying {method}"),
                Stage::KnowledgeEnhancement => "Adding background knowledge".to_string(),
            };
            eprintln!("{} {label}", "→".cyan());
        }
        ProgressEvent::MethodSkipped { method, reason } => {
            eprintln!("{} Skipped {method} ({reason:?})", "·".dimmed());
        }
        ProgressEvent::MethodFinished { method, confidence } => match confidence {
            Some(c) => eprintln!("{} {method}: {}", "·".dimmed(), format_confidence(*c)),
            None => eprintln!("{} {method}: no result", "·".dimmed()),
        },
        ProgressEvent::Completed { elapsed_ms, .. } => {
            eprintln!("{} Done in {elapsed_ms} ms", "✓".green());
        }
        ProgressEvent::Failed { message, .. } => {
            eprintln!("{} {message}", "✗".red());
        }
    }
}

fn print_outcome(outcome: &RecognitionOutcome, quiet: bool) {
    let quality = outcome.quality();

    if quiet {
        println!(
            "{}\t{}\t{}",
            outcome.name,
            format_confidence(outcome.confidence),
            outcome.method
        );
        return;
    }

    println!();
    println!("{}", outcome.name.bold());
    println!("   {} {}", "Category:".dimmed(), outcome.category);
    println!(
        "   {} {} ({})",
        "Confidence:".dimmed(),
        format_confidence(outcome.confidence),
        quality.tier
    );
    println!("   {} {}", "Method:".dimmed(), outcome.method);
    if !outcome.aliases.is_empty() {
        println!("   {} {}", "Also known as:".dimmed(), outcome.aliases.join(", "));
    }
    if !outcome.origin.is_empty() {
        println!("   {} {}", "Origin:".dimmed(), outcome.origin);
    }
    if !outcome.usage.is_empty() {
        println!("   {} {}", "Usage:".dimmed(), outcome.usage);
    }
    if let Some(enrichment) = &outcome.enrichment {
        println!("   {} {}", "Summary:".dimmed(), enrichment.summary);
        for fact in &enrichment.facts {
            println!("     - {fact}");
        }
    }
    for advice in &quality.advisories {
        println!("   {} {advice}", "Tip:".yellow());
    }
}
