//! Material and subject API DTOs
//!
//! Request bodies for the study material endpoints
//! (`/api/branch-study-materials/materials`) and the legacy subject endpoints
//! (`/api/branch-subjects/subjects`).

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::common::{MaterialType, RecordId, RecordStatus};

// ============================================================================
// Study Material DTOs
// ============================================================================

/// Create material request
///
/// Used for POST /api/branch-study-materials/materials (metadata only) and as
/// the text fields of the multipart upload form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMaterialRequest {
    #[validate(length(min = 1, max = 255))]
    pub material_name: String,
    pub material_type: MaterialType,
    pub program_id: RecordId,
    pub course_id: RecordId,
    pub subject_id: RecordId,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(url)]
    pub external_link: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub access_level: String,
    pub status: RecordStatus,
}

/// Update material request
///
/// Used for PUT /api/branch-study-materials/materials/{id}; absent fields are
/// left untouched by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateMaterialRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255))]
    pub material_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material_type: Option<MaterialType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub external_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
}

// ============================================================================
// Legacy Subject DTOs
// ============================================================================

/// Create subject request
///
/// Used for POST /api/branch-subjects/subjects
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSubjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub subject_name: String,
    pub program_id: RecordId,
    pub course_id: RecordId,
    pub status: RecordStatus,
}

/// Update subject request
///
/// Used for PUT /api/branch-subjects/subjects/{id}
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateSubjectRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255))]
    pub subject_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
}
