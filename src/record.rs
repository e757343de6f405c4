//! Award record model and identity keys.
//!
//! Records are the unit every pipeline stage reads and writes. The identity
//! key is derived from the award name and never changes once a record exists.
use crate::enrich::{EnrichedFields, EnrichmentPayload};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized award name used to deduplicate records across sources.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Normalize a raw name: trim, collapse whitespace runs, lowercase.
    ///
    /// Returns `None` when nothing but whitespace remains.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Enriched,
    #[default]
    NotEnriched,
}

/// One winning book as reported by the lookup service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningBook {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub publisher: String,
    /// ISBN or other catalog identifier.
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub link: String,
}

impl WinningBook {
    /// True when every field is blank or the service's "Not Available" filler.
    pub fn is_placeholder(&self) -> bool {
        [
            &self.author,
            &self.title,
            &self.year,
            &self.publisher,
            &self.identifier,
            &self.link,
        ]
        .iter()
        .all(|value| {
            let value = value.trim();
            value.is_empty() || value.eq_ignore_ascii_case("not available")
        })
    }
}

/// One award.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "award_name", alias = "name")]
    pub name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub registration_url: String,
    #[serde(default)]
    pub status: EnrichmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub winning_books: Vec<WinningBook>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_submission_date: Option<String>,
    /// Row id in the collaborative store, when the record came from there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl Record {
    /// Identity-only record, as produced by the remote reader.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn identity_key(&self) -> Option<IdentityKey> {
        IdentityKey::from_name(&self.name)
    }

    pub fn is_enriched(&self) -> bool {
        self.status == EnrichmentStatus::Enriched
    }

    /// Fill enriched fields from a lookup payload and mark the record enriched.
    ///
    /// Curated core fields (organization, URL, categories) are only filled
    /// when empty; descriptive fields are replaced wholesale.
    pub fn apply_payload(&mut self, payload: &EnrichmentPayload) {
        match payload {
            EnrichmentPayload::Structured(fields) => self.apply_fields(fields),
            EnrichmentPayload::RawText(text) => {
                self.description = Some(text.clone());
            }
        }
        self.status = EnrichmentStatus::Enriched;
    }

    fn apply_fields(&mut self, fields: &EnrichedFields) {
        if let Some(description) = non_empty(fields.description.as_deref()) {
            self.description = Some(description.to_string());
        }
        if !fields.winning_books.is_empty() {
            self.winning_books = fields.winning_books.clone();
        }
        if !fields.competitors.is_empty() {
            self.competitors = fields.competitors.clone();
        }
        if let Some(date) = non_empty(fields.latest_submission_date.as_deref()) {
            self.latest_submission_date = Some(date.to_string());
        }
        if self.categories.is_empty() {
            self.categories = fields.categories.clone();
        }
        if self.organization.trim().is_empty() {
            if let Some(org) = non_empty(fields.organization.as_deref()) {
                self.organization = org.to_string();
            }
        }
        if self.registration_url.trim().is_empty() {
            if let Some(url) = non_empty(fields.registration_url.as_deref()) {
                self.registration_url = url.to_string();
            }
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// A collection entry: either a full record or a bare award name.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum RecordEntry {
    Name(String),
    Full(Box<Record>),
}

impl From<RecordEntry> for Record {
    fn from(entry: RecordEntry) -> Self {
        match entry {
            RecordEntry::Name(name) => Record::named(name),
            RecordEntry::Full(record) => *record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_ignores_case_and_whitespace() {
        let a = IdentityKey::from_name("  Hugo   Award ").expect("key");
        let b = IdentityKey::from_name("hugo award").expect("key");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "hugo award");
    }

    #[test]
    fn identity_key_rejects_blank_names() {
        assert!(IdentityKey::from_name("").is_none());
        assert!(IdentityKey::from_name(" \t\n").is_none());
    }

    #[test]
    fn raw_text_payload_lands_in_description() {
        let mut record = Record::named("Nebula Award");
        record.apply_payload(&EnrichmentPayload::RawText("free text".to_string()));
        assert!(record.is_enriched());
        assert_eq!(record.description.as_deref(), Some("free text"));
    }

    #[test]
    fn structured_payload_keeps_curated_core_fields() {
        let mut record = Record::named("Hugo Award");
        record.organization = "WSFS".to_string();
        record.categories = vec!["Novel".to_string()];
        let fields = EnrichedFields {
            organization: Some("Someone Else".to_string()),
            registration_url: Some("https://example.org".to_string()),
            categories: vec!["Short Story".to_string()],
            competitors: vec!["A Book".to_string()],
            ..EnrichedFields::default()
        };
        record.apply_payload(&EnrichmentPayload::Structured(fields));
        assert_eq!(record.organization, "WSFS");
        assert_eq!(record.registration_url, "https://example.org");
        assert_eq!(record.categories, vec!["Novel".to_string()]);
        assert_eq!(record.competitors, vec!["A Book".to_string()]);
    }

    #[test]
    fn deserializes_legacy_and_bare_entries() {
        let raw = r#"["Booker Prize", {"award_name": "Hugo Award", "organization": "WSFS"}]"#;
        let entries: Vec<RecordEntry> = serde_json::from_str(raw).expect("parse");
        let records: Vec<Record> = entries.into_iter().map(Record::from).collect();
        assert_eq!(records[0].name, "Booker Prize");
        assert_eq!(records[1].organization, "WSFS");
        assert_eq!(records[1].status, EnrichmentStatus::NotEnriched);
    }

    #[test]
    fn placeholder_books_are_detected() {
        let book = WinningBook {
            author: "Not Available".to_string(),
            title: "not available".to_string(),
            ..WinningBook::default()
        };
        assert!(book.is_placeholder());
    }
}
