//! Syllabus API DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::common::RecordId;

/// Create syllabus request
///
/// Used for POST /api/syllabuses and as the text fields of
/// POST /api/syllabuses/upload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSyllabusRequest {
    pub program_id: RecordId,
    pub course_id: RecordId,
    pub subject_id: RecordId,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// Update syllabus request
///
/// Used for PUT /api/syllabuses/{id}
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateSyllabusRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<RecordId>,
}
