//! Human-readable output for decisions, classifications, and the ledger.
//!
//! Decisions render as a short vertical card; ledger listings go through
//! Arrow's pretty table so timestamps and nulls format consistently.

use arrow::util::pretty::pretty_format_batches;
use webwarden_core::schema::ledger;
use webwarden_core::{AggregateDecision, BlockedDomainEntry, DecisionResult};

const LABEL_WIDTH: usize = 12;

/// Print a policy decision as a card.
pub fn print_decision(result: &DecisionResult) {
    let verdict = if result.blocked { "BLOCKED" } else { "ALLOWED" };
    println!("=== {verdict} ===");
    for (label, value) in decision_fields(result) {
        println!("  {label:<LABEL_WIDTH$} {value}");
    }
}

/// Print a model-only classification.
pub fn print_classification(decision: &AggregateDecision) {
    println!("=== {} ===", decision.category);
    println!("  {:<LABEL_WIDTH$} {:.4}", "confidence", decision.confidence);
    println!("  {:<LABEL_WIDTH$} {}", "chunks", decision.chunk_count);
}

/// Print ledger entries as a table.
pub fn print_ledger(entries: &[BlockedDomainEntry]) -> anyhow::Result<()> {
    if entries.is_empty() {
        println!("(no blocked domains)");
        return Ok(());
    }
    let batch = ledger::blocked_domains_batch(entries)?;
    println!("{}", pretty_format_batches(&[batch])?);
    println!("{} domain(s)", entries.len());
    Ok(())
}

fn decision_fields(result: &DecisionResult) -> Vec<(&'static str, String)> {
    let mut fields = Vec::new();
    if let Some(domain) = &result.domain {
        fields.push(("domain", domain.clone()));
    }
    if let Some(reason) = result.reason {
        fields.push(("reason", reason.as_str().to_string()));
    }
    if let Some(category) = &result.category {
        fields.push(("category", category.clone()));
    }
    if let Some(confidence) = result.confidence {
        fields.push(("confidence", format!("{confidence:.4}")));
    }
    if let Some(chunks) = result.chunks {
        fields.push(("chunks", chunks.to_string()));
    }
    fields
}
