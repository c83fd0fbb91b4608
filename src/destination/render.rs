//! Notion JSON shapes for properties, blocks and query results

use crate::config::PropertyNames;
use crate::models::{Block, DestinationPageRef, PageFields};
use chrono::SecondsFormat;
use serde_json::{json, Map, Value};
use unicode_segmentation::UnicodeSegmentation;

/// Maximum characters in one rich-text run
pub const MAX_TEXT_LEN: usize = 2000;

/// Maximum blocks per create/append request
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// Split text into runs of at most [`MAX_TEXT_LEN`] characters without
/// breaking a grapheme cluster.
pub fn split_text(text: &str) -> Vec<String> {
    if text.chars().count() <= MAX_TEXT_LEN {
        return vec![text.to_string()];
    }

    let mut runs = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for grapheme in text.graphemes(true) {
        let len = grapheme.chars().count();
        if current_len + len > MAX_TEXT_LEN && !current.is_empty() {
            runs.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(grapheme);
        current_len += len;
    }

    if !current.is_empty() {
        runs.push(current);
    }

    runs
}

/// Rich-text array for a piece of text
pub fn rich_text(text: &str) -> Value {
    Value::Array(
        split_text(text)
            .into_iter()
            .map(|run| json!({"type": "text", "text": {"content": run}}))
            .collect(),
    )
}

/// Property payload for a page create or update.
///
/// Only fields that are set are emitted; absent fields leave the page untouched.
pub fn properties(fields: &PageFields, names: &PropertyNames) -> Value {
    let mut props = Map::new();

    if let Some(title) = &fields.title {
        props.insert(names.title.clone(), json!({"title": rich_text(title)}));
    }
    if let Some(author) = &fields.author {
        props.insert(names.author.clone(), json!({"rich_text": rich_text(author)}));
    }
    if let Some(category) = &fields.category {
        props.insert(names.category.clone(), json!({"select": {"name": category}}));
    }
    if let Some(count) = fields.highlight_count {
        props.insert(names.highlights.clone(), json!({"number": count}));
    }
    if let Some(status) = &fields.status {
        props.insert(names.status.clone(), json!({"status": {"name": status}}));
    }
    if let Some(at) = fields.last_synced {
        props.insert(
            names.last_synced.clone(),
            json!({"date": {"start": at.to_rfc3339_opts(SecondsFormat::Secs, true)}}),
        );
    }
    if let Some(at) = fields.last_highlighted {
        props.insert(
            names.last_highlighted.clone(),
            json!({"date": {"start": at.to_rfc3339_opts(SecondsFormat::Secs, true)}}),
        );
    }
    if let Some(url) = &fields.view_url {
        props.insert(names.url.clone(), json!({"url": url}));
    }
    if let Some(id) = &fields.external_id {
        props.insert(names.external_id.clone(), json!({"rich_text": rich_text(id)}));
    }

    Value::Object(props)
}

/// Page-level icon and cover, both pointing at the item's image
pub fn apply_cover(body: &mut Map<String, Value>, fields: &PageFields) {
    if let Some(url) = &fields.cover_url {
        let external = json!({"type": "external", "external": {"url": url}});
        body.insert("icon".to_string(), external.clone());
        body.insert("cover".to_string(), external);
    }
}

pub fn block(block: &Block) -> Value {
    match block {
        Block::Quote { text, children } => {
            let mut quote = Map::new();
            quote.insert("rich_text".to_string(), rich_text(text));
            if !children.is_empty() {
                quote.insert(
                    "children".to_string(),
                    Value::Array(children.iter().map(self::block).collect()),
                );
            }
            json!({"object": "block", "type": "quote", "quote": quote})
        }
        Block::Callout { text, emoji } => json!({
            "object": "block",
            "type": "callout",
            "callout": {
                "rich_text": rich_text(text),
                "icon": {"type": "emoji", "emoji": emoji}
            }
        }),
    }
}

/// Concatenated plain text of a rich-text array
fn plain_text(runs: &Value) -> String {
    runs.as_array()
        .map(|runs| {
            runs.iter()
                .filter_map(|run| {
                    run.get("plain_text")
                        .or_else(|| run.get("text").and_then(|t| t.get("content")))
                        .and_then(Value::as_str)
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Text of a property value, whatever its type
fn property_text(property: &Value) -> Option<String> {
    let kind = property.get("type").and_then(Value::as_str)?;
    let text = match kind {
        "rich_text" | "title" => plain_text(property.get(kind)?),
        "number" => property.get("number")?.as_f64().map(|n| format!("{}", n as i64))?,
        "url" => property.get("url")?.as_str()?.to_string(),
        _ => return None,
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Item id embedded in a `…/bookreview/{id}` URL
pub fn id_from_view_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/bookreview/")?;
    let id: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    (!id.is_empty()).then_some(id)
}

/// Read a page from a database query result.
///
/// Returns `None` when no external id can be resolved.
pub fn page_ref(page: &Value, names: &PropertyNames) -> Option<DestinationPageRef> {
    let page_id = page.get("id").and_then(Value::as_str)?.to_string();
    let props = page.get("properties");
    let prop = |name: &str| props.and_then(|p| p.get(name));

    let external_id = prop(&names.external_id)
        .and_then(property_text)
        .or_else(|| {
            prop(&names.url)
                .and_then(property_text)
                .and_then(|url| id_from_view_url(&url))
        })?;

    let highlight_count = prop(&names.highlights)
        .and_then(|p| p.get("number"))
        .and_then(Value::as_f64)
        .map(|n| n.max(0.0) as u32)
        .unwrap_or(0);

    let flag = |key: &str| page.get(key).and_then(Value::as_bool).unwrap_or(false);

    Some(DestinationPageRef {
        external_id,
        page_id,
        highlight_count,
        archived: flag("archived") || flag("in_trash"),
    })
}

/// Text of a quote block, `None` for any other block type
pub fn quote_text(block: &Value) -> Option<String> {
    if block.get("type").and_then(Value::as_str) != Some("quote") {
        return None;
    }
    block.get("quote").and_then(|q| q.get("rich_text")).map(plain_text)
}
