//! Study material structures
//!
//! Materials come from two backend collections: the dedicated study material
//! store and the legacy subject store. Both are normalized into [`Material`]
//! with [`MaterialSource`] recording where each row came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::RecordId;

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialType {
    Document,
    Video,
    Link,
    PaperSet,
    QuestionPaper,
}

impl MaterialType {
    pub const ALL: [MaterialType; 5] = [
        MaterialType::Document,
        MaterialType::Video,
        MaterialType::Link,
        MaterialType::PaperSet,
        MaterialType::QuestionPaper,
    ];

    /// Lenient parse of the type names seen on the wire
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "document" | "doc" | "pdf" | "notes" => Some(Self::Document),
            "video" | "video_class" | "videos" => Some(Self::Video),
            "link" | "url" | "external_link" => Some(Self::Link),
            "paper_set" | "paperset" => Some(Self::PaperSet),
            "question_paper" | "questionpaper" => Some(Self::QuestionPaper),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Video => "video",
            Self::Link => "link",
            Self::PaperSet => "paper_set",
            Self::QuestionPaper => "question_paper",
        }
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status shared by materials, subjects and reference data.
/// Deletion on the backend is a status flip, never a hard delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
    Deleted,
    Removed,
}

impl RecordStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "deleted" => Some(Self::Deleted),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }

    /// Hidden records must never reach a rendered list
    pub fn is_hidden(&self) -> bool {
        !matches!(self, Self::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Deleted => "deleted",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend collection a material row was read from; deletes target it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialSource {
    StudyMaterials,
    Subjects,
}

impl MaterialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StudyMaterials => "study_materials",
            Self::Subjects => "subjects",
        }
    }
}

impl fmt::Display for MaterialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Material Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: RecordId,
    pub material_name: String,
    pub material_type: MaterialType,
    pub program_id: Option<RecordId>,
    pub course_id: Option<RecordId>,
    pub subject_id: Option<RecordId>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub external_link: Option<String>,
    pub file_size: Option<u64>,
    pub access_level: String,
    pub status: RecordStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub source: MaterialSource,
}

impl Material {
    pub fn is_video(&self) -> bool {
        self.material_type == MaterialType::Video
    }
}
