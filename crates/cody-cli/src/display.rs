//! Plain-text rendering of documents, codebooks and annotations.

use cody_core::{Annotation, Document, Provenance};
use cody_session::{SessionFlags, Workspace};
use cody_store::MergeOutcome;

const MAX_LIST_ITEMS: usize = 10;

// ── Public API ──

pub fn print_documents<'a>(docs: impl Iterator<Item = &'a Document>) {
    println!("  {:>6}  {:<32} {:<10} {}", "id", "name", "type", "modified");
    for doc in docs {
        let modified = doc
            .last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:>6}  {:<32} {:<10} {}",
            doc.id,
            truncate(&doc.name, 32),
            input_type(doc),
            modified
        );
    }
}

/// Print the selected document as a card: identity, codebook, suggestion
/// counts and the first few annotations.
pub fn print_session_card(ws: &Workspace, flags: &SessionFlags) {
    let title = ws
        .current_document()
        .map(|d| d.name.clone())
        .or_else(|| ws.target().map(|id| format!("document {id}")))
        .unwrap_or_else(|| "no document".into());
    println!("=== {title} ===");
    println!();

    if let Some(doc) = ws.current_document() {
        println!("Document");
        println!("  {:<26} {}", "id", doc.id);
        println!("  {:<26} {}", "input type", input_type(doc));
        if let Some(uoa) = &doc.unit_of_analysis {
            println!("  {:<26} {}", "unit of analysis", uoa);
        }
        println!("  {:<26} {}", "sections", ws.content().sections.len());
        println!();
    }

    print_labels(ws);

    let anns = ws.annotations();
    println!("Annotations");
    println!("  {:<26} {}", "total", anns.len());
    println!("  {:<26} {}", "manual", anns.count(Provenance::Manual));
    println!("  {:<26} {}", "rule suggestions", anns.count(Provenance::RuleSuggested));
    println!("  {:<26} {}", "model suggestions", anns.count(Provenance::ModelSuggested));
    if let Some(notice) = ws.notice() {
        println!("  {:<26} {}", "notice", notice);
    }
    println!();

    print_annotations(anns.iter());
    print_flags(flags);
}

pub fn print_labels(ws: &Workspace) {
    println!("Codebook");
    for label in ws.labels().iter() {
        match ws.labels().rule(&label.text) {
            Some(rule) => println!("  {:<26} {}  rule: {}", label.text, label.color, truncate(rule, 40)),
            None => println!("  {:<26} {}", label.text, label.color),
        }
    }
    println!();
}

pub fn print_annotations<'a>(anns: impl Iterator<Item = &'a Annotation>) {
    let anns: Vec<_> = anns.collect();
    for ann in anns.iter().take(MAX_LIST_ITEMS) {
        let confidence = ann
            .confidence
            .map(|c| format!("{c:.2}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<12} {:<20} {:<6} {:>5}+{:<4} {}/{}",
            truncate(&ann.annotation_id, 12),
            truncate(&ann.label, 20),
            ann.provenance().as_str(),
            ann.span_start,
            ann.span_length,
            ann.conversation_ref,
            ann.attribute_ref,
        );
        if ann.provenance().is_suggested() {
            println!("  {:<12} confidence {}", "", confidence);
        }
    }
    if anns.len() > MAX_LIST_ITEMS {
        println!("  ... and {} more", anns.len() - MAX_LIST_ITEMS);
    }
    println!();
}

pub fn print_merge(source: &str, outcome: &MergeOutcome) {
    println!("{source}");
    println!("  {:<26} {}", "added", outcome.added);
    println!("  {:<26} {}", "replaced", outcome.replaced);
    println!("  {:<26} {}", "retained", outcome.retained);
    if outcome.collisions > 0 {
        println!("  {:<26} {}", "collisions", outcome.collisions);
    }
    if outcome.malformed > 0 {
        println!("  {:<26} {}", "malformed", outcome.malformed);
    }
}

pub fn print_flags(flags: &SessionFlags) {
    if flags.connectivity_degraded {
        println!("! connection to the server is degraded");
    }
}

// ── Helpers ──

fn input_type(doc: &Document) -> String {
    use cody_core::InputType;
    match doc.input_type {
        InputType::Text => "text".into(),
        InputType::Csv => "csv".into(),
        InputType::LadderBot => "ladderbot".into(),
        InputType::Unknown(code) => format!("type {code}"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
