//! Syllabus structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RecordId;

/// Syllabus document attached to a subject.
///
/// The `*_name` fields are not sent by the backend; they are filled in after
/// fetch from the reference lookups and stay `None` until those are loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Syllabus {
    pub id: RecordId,
    pub program_id: Option<RecordId>,
    pub course_id: Option<RecordId>,
    pub subject_id: Option<RecordId>,
    pub title: String,
    pub description: Option<String>,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
}
