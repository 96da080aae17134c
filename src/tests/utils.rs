//! Test utilities and helpers for unit tests
//!
//! Record builders and temp-file helpers shared by the module tests.

#[cfg(test)]
pub mod test_helpers {
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tempfile::TempDir;

    use branchdesk_protocol::common::{
        Material, MaterialSource, MaterialType, RecordId, RecordStatus,
    };

    /// Create a temporary directory for testing
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    /// Create a temporary file with content
    pub fn create_temp_file_with_content(dir: &TempDir, filename: &str, content: &[u8]) -> PathBuf {
        let file_path = dir.path().join(filename);
        std::fs::write(&file_path, content).expect("Failed to write temp file");
        file_path
    }

    /// A visible material with only the fields the tests care about
    pub fn material(id: &str, material_type: MaterialType, source: MaterialSource) -> Material {
        Material {
            id: RecordId::new(id),
            material_name: format!("Material {}", id),
            material_type,
            program_id: Some(RecordId::new("1")),
            course_id: Some(RecordId::new("101")),
            subject_id: None,
            description: None,
            file_url: None,
            external_link: None,
            file_size: None,
            access_level: "public".to_string(),
            status: RecordStatus::Active,
            created_at: None,
            source,
        }
    }

    /// Raw row as the study materials endpoint returns it
    pub fn material_row(id: Value, name: &str, material_type: &str, status: &str) -> Value {
        json!({
            "id": id,
            "material_name": name,
            "material_type": material_type,
            "program_id": 1,
            "course_id": 101,
            "subject_id": 5001,
            "access_level": "public",
            "status": status,
            "created_at": "2024-02-01 09:00:00"
        })
    }

    /// Raw row as the subjects endpoint returns it
    pub fn subject_row(id: Value, name: &str, status: &str) -> Value {
        json!({
            "id": id,
            "subject_name": name,
            "program_id": 1,
            "course_id": 101,
            "status": status
        })
    }
}
