//! Website changelog entries and date chips

use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

use super::{optional_millis, optional_str, required_str, RemoteRecord, SchemaError};
use crate::db::mongo::IntoIndexes;
use crate::db::store::{StoredDocument, CREATED_AT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogEntry {
    pub id: String,
    pub title: String,
    pub items: Vec<String>,
    pub note: Option<String>,
    /// Display date in millis; entries without one fall back to `createdAt`
    pub date: i64,
}

impl RemoteRecord for ChangelogEntry {
    fn from_document(doc: &StoredDocument) -> Result<Self, SchemaError> {
        let items = match doc.get("items") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or(SchemaError::InvalidField("items"))?,
            Some(_) => return Err(SchemaError::InvalidField("items")),
        };
        let date = match optional_millis(doc, "date")? {
            Some(d) => d,
            None => optional_millis(doc, CREATED_AT)?.unwrap_or(0),
        };

        Ok(Self {
            id: doc.id.clone(),
            title: required_str(doc, "title")?,
            items,
            note: optional_str(doc, "note")?,
            date,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl IntoIndexes for ChangelogEntry {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "date": -1 },
            Some(IndexOptions::builder().name("date_desc".to_string()).build()),
        )]
    }
}

fn numbering_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s*").ok()).as_ref()
}

/// Split editor text into items: one per line, trimmed, leading `N. `
/// numbering removed, blank lines dropped.
pub fn parse_items(changes: &str) -> Vec<String> {
    changes
        .lines()
        .map(|line| {
            let line = line.trim();
            match numbering_re() {
                Some(re) => re.replace(line, "").into_owned(),
                None => line.to_string(),
            }
        })
        .filter(|item| !item.is_empty())
        .collect()
}

/// `YYYY.MM.DD` in UTC
pub fn date_chip(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|d| d.format("%Y.%m.%d").to_string())
        .unwrap_or_default()
}

/// Distinct date chips in entry order.
pub fn date_chips(entries: &[ChangelogEntry]) -> Vec<String> {
    let mut chips: Vec<String> = Vec::new();
    for entry in entries {
        let chip = date_chip(entry.date);
        if !chips.contains(&chip) {
            chips.push(chip);
        }
    }
    chips
}

/// Which entries the changelog page shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateKey {
    /// Only the newest entry
    Latest,
    /// Every entry on one `YYYY.MM.DD` day
    Day(String),
}

impl DateKey {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "latest" => Self::Latest,
            day => Self::Day(day.to_string()),
        }
    }
}

/// Entries for `key`; `entries` must already be newest first.
pub fn select_entries(entries: &[ChangelogEntry], key: &DateKey) -> Vec<ChangelogEntry> {
    match key {
        DateKey::Latest => entries.iter().take(1).cloned().collect(),
        DateKey::Day(day) => entries
            .iter()
            .filter(|e| date_chip(e.date) == *day)
            .cloned()
            .collect(),
    }
}
