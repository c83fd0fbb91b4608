//! Highlight merging: which highlights are new, and how they render

use crate::models::{Block, Highlight};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

pub const NOTE_EMOJI: &str = "💭";

/// Characters of normalized text that make up a fingerprint
const FINGERPRINT_CHARS: usize = 1000;

/// Outcome of comparing a fetched highlight list with the recorded count
#[derive(Debug, PartialEq)]
pub enum MergePlan<'a> {
    /// Highlights beyond the recorded count, oldest first
    Append(&'a [Highlight]),
    /// The list has exactly the recorded number of entries
    NothingNew,
    /// The list is shorter than the recorded count
    Regressed { fetched: usize, recorded: usize },
}

/// Split an ordered highlight list at the recorded count.
///
/// Highlights already on the page are never re-rendered or reordered; only
/// the tail past position `recorded` is new.
pub fn plan_merge(highlights: &[Highlight], recorded: u32) -> MergePlan<'_> {
    let recorded = recorded as usize;
    match highlights.len() {
        n if n > recorded => MergePlan::Append(&highlights[recorded..]),
        n if n == recorded => MergePlan::NothingNew,
        n => MergePlan::Regressed {
            fetched: n,
            recorded,
        },
    }
}

/// One quote block per highlight, with the note nested underneath
pub fn render_highlight(highlight: &Highlight) -> Block {
    let children = highlight
        .note()
        .map(|note| {
            vec![Block::Callout {
                text: format!("Note: {}", note),
                emoji: NOTE_EMOJI.to_string(),
            }]
        })
        .unwrap_or_default();

    Block::Quote {
        text: highlight.text.clone(),
        children,
    }
}

pub fn render_highlights(highlights: &[Highlight]) -> Vec<Block> {
    highlights.iter().map(render_highlight).collect()
}

fn markup() -> Option<&'static Regex> {
    static MARKUP: OnceLock<Option<Regex>> = OnceLock::new();
    MARKUP.get_or_init(|| Regex::new(r"[*_]+").ok()).as_ref()
}

/// Lower-cased text with emphasis markers removed and whitespace collapsed
pub fn normalize_text(text: &str) -> String {
    let stripped = match markup() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable fingerprint of a quote's leading text
pub fn fingerprint(text: &str) -> String {
    let normalized: String = normalize_text(text).chars().take(FINGERPRINT_CHARS).collect();
    blake3::hash(normalized.as_bytes()).to_hex().to_string()
}

/// Drop highlights whose text already appears among `existing` quote texts
pub fn drop_already_present(new: &[Highlight], existing: &[String]) -> Vec<Highlight> {
    let seen: HashSet<String> = existing.iter().map(|t| fingerprint(t)).collect();
    new.iter()
        .filter(|h| !seen.contains(&fingerprint(&h.text)))
        .cloned()
        .collect()
}
