//! Parsing lookup responses into enriched fields.
//!
//! The service answers in whatever shape it likes: a clean JSON object, JSON
//! wrapped in prose or code fences, labelled lines, or plain prose. Parsing
//! tries those in order and falls back to keeping the raw text.
use crate::record::WinningBook;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Structured fields recovered from a lookup response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_submission_date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub winning_books: Vec<WinningBook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub competitors: Vec<String>,
}

/// What one lookup produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EnrichmentPayload {
    Structured(EnrichedFields),
    /// No structure could be located; stored as the record description.
    RawText(String),
}

/// Parse response content. Returns `None` for blank content.
pub fn parse_response(content: &str) -> Option<EnrichmentPayload> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned = strip_code_fences(trimmed);
    let object = serde_json::from_str::<Value>(&cleaned)
        .ok()
        .filter(Value::is_object)
        .or_else(|| extract_json_object(&cleaned));
    if let Some(fields) = object.as_ref().and_then(fields_from_json) {
        return Some(EnrichmentPayload::Structured(fields));
    }
    if let Some(fields) = fields_from_labels(trimmed) {
        return Some(EnrichmentPayload::Structured(fields));
    }
    Some(EnrichmentPayload::RawText(trimmed.to_string()))
}

fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines
        .first()
        .is_some_and(|first| first.trim_start().starts_with("```"))
    {
        lines.remove(0);
    }
    if lines
        .last()
        .is_some_and(|last| last.trim_start().starts_with("```"))
    {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

fn extract_json_object(raw: &str) -> Option<Value> {
    for (idx, ch) in raw.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(&raw[idx..]);
        if let Ok(value) = Value::deserialize(&mut deserializer) {
            if value.is_object() {
                return Some(value);
            }
        }
    }
    None
}

fn fields_from_json(value: &Value) -> Option<EnrichedFields> {
    let map = value.as_object()?;
    let fields = EnrichedFields {
        description: text_field(map, &["description", "summary"]),
        organization: text_field(map, &["organization", "organizer", "organisation"]),
        registration_url: text_field(map, &["registration_url", "registrationUrl", "url"]),
        latest_submission_date: text_field(
            map,
            &[
                "latest_submission_date",
                "latestDateOfSubmission",
                "submission_deadline",
            ],
        ),
        categories: first_present(map, &["categories"])
            .map(string_list)
            .unwrap_or_default(),
        winning_books: first_present(map, &["winning_books", "lastWinningBooks", "winners"])
            .map(book_list)
            .unwrap_or_default(),
        competitors: first_present(
            map,
            &[
                "competitors",
                "possibleStrongestCompetitionThisYear",
                "competition",
            ],
        )
        .map(competitor_list)
        .unwrap_or_default(),
    };
    if fields == EnrichedFields::default() {
        None
    } else {
        Some(fields)
    }
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key))
}

fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_present(map, keys).and_then(scalar_text)
}

/// Render a scalar as text, dropping blanks and "Not Available" filler.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    if text.is_empty() || text.eq_ignore_ascii_case("not available") {
        None
    } else {
        Some(text)
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(text) => split_list(text),
        _ => Vec::new(),
    }
}

fn book_list(value: &Value) -> Vec<WinningBook> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|book| WinningBook {
            author: text_field(book, &["author"]).unwrap_or_default(),
            title: text_field(book, &["title"]).unwrap_or_default(),
            year: text_field(book, &["year", "publishingYear", "publishing_year"])
                .unwrap_or_default(),
            publisher: text_field(book, &["publisher"]).unwrap_or_default(),
            identifier: text_field(book, &["identifier", "isbn", "ISBN"]).unwrap_or_default(),
            link: text_field(book, &["link", "url"]).unwrap_or_default(),
        })
        .filter(|book| !book.is_placeholder())
        .collect()
}

fn competitor_list(value: &Value) -> Vec<String> {
    let Value::Array(items) = value else {
        return string_list(value);
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(entry) => {
                let title = text_field(entry, &["title", "name"]);
                let author = text_field(entry, &["author"]);
                match (title, author) {
                    (Some(title), Some(author)) => Some(format!("{title} ({author})")),
                    (Some(only), None) | (None, Some(only)) => Some(only),
                    (None, None) => None,
                }
            }
            other => scalar_text(other),
        })
        .collect()
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

static LABEL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?mi)^[\s>*-]*\**(description|organi[sz]ation|organizer|registration url|latest submission date|submission deadline|categories)\**\s*:\s*\**\s*(.+?)\s*$",
    )
    .expect("label regex compiles")
});

/// Best-effort extraction from prose with `Label: value` lines.
fn fields_from_labels(text: &str) -> Option<EnrichedFields> {
    let mut fields = EnrichedFields::default();
    let mut found = false;
    for caps in LABEL_LINE.captures_iter(text) {
        let value = caps[2].trim().to_string();
        if value.is_empty() || value.eq_ignore_ascii_case("not available") {
            continue;
        }
        found = true;
        match caps[1].to_lowercase().as_str() {
            "description" => fields.description = Some(value),
            "registration url" => fields.registration_url = Some(value),
            "latest submission date" | "submission deadline" => {
                fields.latest_submission_date = Some(value)
            }
            "categories" => fields.categories = split_list(&value),
            _ => fields.organization = Some(value),
        }
    }
    if !found {
        return None;
    }
    if fields.description.is_none() {
        fields.description = Some(text.to_string());
    }
    Some(fields)
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
