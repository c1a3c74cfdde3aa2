//! Community question record and its answer workflow

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{optional_millis, optional_str, required_str, RemoteRecord, SchemaError};
use crate::db::mongo::IntoIndexes;
use crate::db::store::{server_timestamp, StoredDocument, CREATED_AT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Open,
    Answered,
    /// Hidden from everyone but admins
    Hidden,
}

impl QuestionStatus {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "answered" => Some(Self::Answered),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Answered => "answered",
            Self::Hidden => "hidden",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub created_at: i64,
    pub status: QuestionStatus,
    pub answer: Option<String>,
    pub answered_by: Option<String>,
    pub answered_at: Option<i64>,
}

impl RemoteRecord for Question {
    fn from_document(doc: &StoredDocument) -> Result<Self, SchemaError> {
        let answer = optional_str(doc, "answer")?;
        // Unknown or missing status falls back to what the answer implies
        let status = optional_str(doc, "status")?
            .and_then(|s| QuestionStatus::parse(&s))
            .unwrap_or(if answer.is_some() {
                QuestionStatus::Answered
            } else {
                QuestionStatus::Open
            });

        Ok(Self {
            id: doc.id.clone(),
            text: required_str(doc, "text")?,
            user_id: optional_str(doc, "userId")?.unwrap_or_default(),
            user_name: optional_str(doc, "userName")?.unwrap_or_else(|| "anonymous".to_string()),
            user_avatar: optional_str(doc, "userAvatar")?,
            created_at: optional_millis(doc, CREATED_AT)?.unwrap_or(0),
            status,
            answer,
            answered_by: optional_str(doc, "answeredBy")?,
            answered_at: optional_millis(doc, "answeredAt")?,
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Question {
    /// Case-insensitive match over the question, its answer and the asker's name.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [Some(&self.text), self.answer.as_ref(), Some(&self.user_name)]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Patch that records (or clears) an answer.
    ///
    /// An empty answer reopens the question.
    pub fn answer_patch(answer: &str, answered_by: &str) -> Map<String, Value> {
        let answer = answer.trim();
        let mut patch = Map::new();
        if answer.is_empty() {
            patch.insert("answer".into(), Value::Null);
            patch.insert("status".into(), Value::from(QuestionStatus::Open.as_str()));
        } else {
            patch.insert("answer".into(), Value::from(answer));
            patch.insert("status".into(), Value::from(QuestionStatus::Answered.as_str()));
        }
        patch.insert("answeredBy".into(), Value::from(answered_by));
        patch.insert("answeredAt".into(), Value::from(server_timestamp()));
        patch
    }
}

/// Listing filter on the questions page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuestionFilter {
    #[default]
    All,
    Open,
    Answered,
}

impl QuestionFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "all" => Some(Self::All),
            "open" => Some(Self::Open),
            "answered" => Some(Self::Answered),
            _ => None,
        }
    }

    /// Whether `question` is listed. Hidden questions are only listed for admins.
    pub fn admits(&self, question: &Question, is_admin: bool) -> bool {
        if question.status == QuestionStatus::Hidden {
            return is_admin && *self == Self::All;
        }
        match self {
            Self::All => true,
            Self::Open => question.status == QuestionStatus::Open,
            Self::Answered => question.status == QuestionStatus::Answered,
        }
    }
}

impl IntoIndexes for Question {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "createdAt": -1 },
            Some(IndexOptions::builder().name("created_at_desc".to_string()).build()),
        )]
    }
}
