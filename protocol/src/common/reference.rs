//! Reference data: the Program -> Course -> Subject hierarchy

use serde::{Deserialize, Serialize};

use super::{RecordId, RecordStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
}

/// Course scoped to a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
    pub program_id: Option<RecordId>,
}

/// Subject as reference data, scoped to a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSubject {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub status: RecordStatus,
    pub course_id: Option<RecordId>,
}
