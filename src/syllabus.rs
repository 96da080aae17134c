//! Syllabus records, their files, and name enrichment
//!
//! Syllabus rows only carry hierarchy IDs. Names are filled in from the
//! reference data once it is available; [`SyllabusCatalog`] re-runs the
//! enrichment when the lookups arrive after the rows.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

use branchdesk_protocol::api::{CreateSyllabusRequest, UpdateSyllabusRequest};
use branchdesk_protocol::common::{Course, Program, RecordId, ReferenceSubject, Syllabus};

use crate::client::{ApiClient, ApiRequest, FilePart, MultipartForm};
use crate::envelope::{self, RawRow, SYLLABUSES};
use crate::error::{DeskError, Result};
use crate::listing::Searchable;
use crate::record::RawRecord;
use crate::reference::ReferenceService;

pub const SYLLABUSES_PATH: &str = "/api/syllabuses";
pub const SYLLABUS_UPLOAD_PATH: &str = "/api/syllabuses/upload";

pub fn download_path(id: &RecordId) -> String {
    format!("{}/{}/download", SYLLABUSES_PATH, id)
}

pub fn normalize_syllabus(row: &RawRow) -> Option<Syllabus> {
    let raw = RawRecord::new(row);
    let id = raw.id(&["id", "_id", "syllabus_id"])?;
    if raw.flag(&["is_deleted", "deleted"]) {
        return None;
    }
    let file_name = raw.text(&["file_name", "original_name", "filename"]);

    Some(Syllabus {
        title: raw
            .text(&["title", "syllabus_title", "name"])
            .or_else(|| file_name.clone())
            .unwrap_or_else(|| format!("Syllabus {}", id)),
        program_id: raw.id(&["program_id"]).or_else(|| raw.nested_id("program")),
        course_id: raw.id(&["course_id"]).or_else(|| raw.nested_id("course")),
        subject_id: raw.id(&["subject_id"]).or_else(|| raw.nested_id("subject")),
        description: raw.text(&["description"]),
        file_name,
        file_path: raw.text(&["file_path", "file_url", "path"]),
        created_at: raw.timestamp(&["created_at", "createdAt", "uploaded_at"]),
        program_name: raw.text(&["program_name"]),
        course_name: raw.text(&["course_name"]),
        subject_name: raw.text(&["subject_name"]),
        id,
    })
}

impl Searchable for Syllabus {
    fn search_text(&self) -> Vec<&str> {
        [
            Some(self.title.as_str()),
            self.description.as_deref(),
            self.file_name.as_deref(),
            self.program_name.as_deref(),
            self.course_name.as_deref(),
            self.subject_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// ID -> display name maps for the three reference levels
#[derive(Debug, Clone, Default)]
pub struct ReferenceLookups {
    programs: HashMap<RecordId, String>,
    courses: HashMap<RecordId, String>,
    subjects: HashMap<RecordId, String>,
}

impl ReferenceLookups {
    pub fn new(programs: &[Program], courses: &[Course], subjects: &[ReferenceSubject]) -> Self {
        Self {
            programs: programs.iter().map(|p| (p.id.clone(), p.name.clone())).collect(),
            courses: courses.iter().map(|c| (c.id.clone(), c.name.clone())).collect(),
            subjects: subjects.iter().map(|s| (s.id.clone(), s.name.clone())).collect(),
        }
    }

    /// Load every level through the reference cache
    pub async fn load<C: ApiClient>(reference: &mut ReferenceService<C>) -> Result<Self> {
        let programs = reference.programs().await?;
        let courses = reference.all_courses().await?;
        let subjects = reference.all_subjects().await?;
        Ok(Self::new(&programs, &courses, &subjects))
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty() && self.courses.is_empty() && self.subjects.is_empty()
    }

    /// Fill missing names; names the backend already sent are kept
    pub fn enrich(&self, syllabus: &mut Syllabus) {
        fn fill(slot: &mut Option<String>, id: &Option<RecordId>, names: &HashMap<RecordId, String>) {
            if slot.is_none() {
                *slot = id.as_ref().and_then(|id| names.get(id)).cloned();
            }
        }

        fill(&mut syllabus.program_name, &syllabus.program_id, &self.programs);
        fill(&mut syllabus.course_name, &syllabus.course_id, &self.courses);
        fill(&mut syllabus.subject_name, &syllabus.subject_id, &self.subjects);
    }
}

/// Syllabus rows plus whatever lookups have arrived so far
#[derive(Debug, Clone, Default)]
pub struct SyllabusCatalog {
    syllabuses: Vec<Syllabus>,
    lookups: Option<ReferenceLookups>,
}

impl SyllabusCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn syllabuses(&self) -> &[Syllabus] {
        &self.syllabuses
    }

    pub fn into_syllabuses(self) -> Vec<Syllabus> {
        self.syllabuses
    }

    pub fn set_syllabuses(&mut self, mut syllabuses: Vec<Syllabus>) {
        if let Some(lookups) = &self.lookups {
            syllabuses.iter_mut().for_each(|s| lookups.enrich(s));
        }
        self.syllabuses = syllabuses;
    }

    /// Late lookups enrich the rows already held
    pub fn set_lookups(&mut self, lookups: ReferenceLookups) {
        self.syllabuses.iter_mut().for_each(|s| lookups.enrich(s));
        self.lookups = Some(lookups);
    }

    pub fn is_enriched(&self) -> bool {
        self.lookups.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyllabusFilter {
    pub program_id: Option<RecordId>,
    pub course_id: Option<RecordId>,
    pub subject_id: Option<RecordId>,
}

fn validate_create(request: &CreateSyllabusRequest) -> Result<()> {
    if request.title.trim().is_empty() {
        return Err(DeskError::validation_field("Title is required", "title"));
    }
    for (id, field) in [
        (&request.program_id, "program_id"),
        (&request.course_id, "course_id"),
        (&request.subject_id, "subject_id"),
    ] {
        if !id.is_valid() {
            return Err(DeskError::validation_field(format!("{} is required", field), field));
        }
    }
    request.validate()?;
    Ok(())
}

pub struct SyllabusService<C: ApiClient> {
    client: Arc<C>,
}

impl<C: ApiClient> SyllabusService<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &SyllabusFilter) -> Result<Vec<Syllabus>> {
        let request = ApiRequest::get(SYLLABUSES_PATH)
            .query_opt("program_id", filter.program_id.as_ref())
            .query_opt("course_id", filter.course_id.as_ref())
            .query_opt("subject_id", filter.subject_id.as_ref());
        let rows = SYLLABUSES.rows(self.client.send(request).await?)?;

        let syllabuses: Vec<Syllabus> = rows.iter().filter_map(normalize_syllabus).collect();
        tracing::info!("Listed {} syllabuses", syllabuses.len());
        Ok(syllabuses)
    }

    pub async fn get(&self, id: &RecordId) -> Result<Syllabus> {
        let path = format!("{}/{}", SYLLABUSES_PATH, id);
        let row = envelope::single(self.client.send(ApiRequest::get(path)).await?, "syllabus")?;
        normalize_syllabus(&row).ok_or_else(|| DeskError::not_found(format!("syllabus {}", id)))
    }

    pub async fn create(&self, request: &CreateSyllabusRequest) -> Result<Option<Syllabus>> {
        validate_create(request)?;
        let body = self
            .client
            .send(ApiRequest::post(SYLLABUSES_PATH).json(request)?)
            .await?;
        tracing::info!("Created syllabus '{}'", request.title);
        Ok(echoed(body))
    }

    pub async fn upload(&self, request: &CreateSyllabusRequest, file: &Path) -> Result<Option<Syllabus>> {
        validate_create(request)?;
        if !file.is_file() {
            return Err(DeskError::validation_field(
                format!("File not found: {}", file.display()),
                "file",
            ));
        }

        let form = MultipartForm::new()
            .fields_from(request)?
            .file(FilePart::from_path("file", file).await?);
        let body = self
            .client
            .send(ApiRequest::post(SYLLABUS_UPLOAD_PATH).multipart(form))
            .await?;
        tracing::info!("Uploaded syllabus '{}' from {}", request.title, file.display());
        Ok(echoed(body))
    }

    pub async fn update(&self, id: &RecordId, request: &UpdateSyllabusRequest) -> Result<Option<Syllabus>> {
        if !id.is_valid() {
            return Err(DeskError::invalid_input("Syllabus ID is required"));
        }
        request.validate()?;

        let path = format!("{}/{}", SYLLABUSES_PATH, id);
        let body = self.client.send(ApiRequest::put(path).json(request)?).await?;
        tracing::info!("Updated syllabus {}", id);
        Ok(echoed(body))
    }

    pub async fn delete(&self, id: &RecordId) -> Result<()> {
        if !id.is_valid() {
            return Err(DeskError::invalid_input("Syllabus ID is required"));
        }
        let path = format!("{}/{}", SYLLABUSES_PATH, id);
        self.client.send(ApiRequest::delete(path)).await?;
        tracing::info!("Deleted syllabus {}", id);
        Ok(())
    }

    /// Fetch the syllabus file and write it to `destination`
    pub async fn download(&self, id: &RecordId, destination: &Path) -> Result<u64> {
        if !id.is_valid() {
            return Err(DeskError::invalid_input("Syllabus ID is required"));
        }
        let bytes = self.client.download(&download_path(id)).await?;
        if bytes.is_empty() {
            return Err(DeskError::invalid_response(format!("Syllabus {} has no file", id)));
        }

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DeskError::io_from_error(format!("Failed to create {}", parent.display()), e)
            })?;
        }
        tokio::fs::write(destination, &bytes).await.map_err(|e| {
            DeskError::io_from_error(format!("Failed to write {}", destination.display()), e)
        })?;

        tracing::info!("Saved syllabus {} to {}", id, destination.display());
        Ok(bytes.len() as u64)
    }
}

fn echoed(body: serde_json::Value) -> Option<Syllabus> {
    envelope::single(body, "syllabus")
        .ok()
        .and_then(|row| normalize_syllabus(&row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataSourceMode;
    use crate::reference::{COURSES_PATH, PROGRAMS_PATH, SUBJECTS_PATH};
    use crate::tests::mocks::MockApiClient;
    use crate::tests::utils::test_helpers::*;
    use branchdesk_protocol::common::RecordStatus;
    use reqwest::Method;
    use serde_json::json;

    fn request() -> CreateSyllabusRequest {
        CreateSyllabusRequest {
            program_id: "1".into(),
            course_id: "101".into(),
            subject_id: "5001".into(),
            title: "Semester 1".to_string(),
            description: None,
        }
    }

    fn lookups() -> ReferenceLookups {
        ReferenceLookups::new(
            &[Program {
                id: "1".into(),
                name: "UNIVERSITY COURSES".to_string(),
                status: RecordStatus::Active,
            }],
            &[Course {
                id: "101".into(),
                name: "B.Sc Computer Science".to_string(),
                status: RecordStatus::Active,
                program_id: Some("1".into()),
            }],
            &[],
        )
    }

    fn syllabus_rows() -> serde_json::Value {
        json!({"syllabuses": [
            {"id": 1, "title": "Semester 1", "program_id": 1, "course_id": 101, "subject_id": 5001,
             "file_name": "sem1.pdf", "created_at": "2024-03-01T10:00:00Z"},
            {"id": 2, "program_id": 1, "course_id": 999, "file_name": "orphan.pdf"},
            {"id": 3, "title": "Removed", "is_deleted": true}
        ]})
    }

    #[tokio::test]
    async fn list_normalizes_and_skips_deleted_rows() {
        let mock = MockApiClient::new();
        mock.respond(Method::GET, SYLLABUSES_PATH, syllabus_rows());

        let filter = SyllabusFilter {
            course_id: Some("101".into()),
            ..Default::default()
        };
        let rows = SyllabusService::new(Arc::new(mock.clone())).list(&filter).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].title, "orphan.pdf");
        assert_eq!(
            mock.requests_to(Method::GET, SYLLABUSES_PATH)[0].query_value("course_id"),
            Some("101")
        );
    }

    #[tokio::test]
    async fn enrichment_reruns_when_lookups_arrive_late() {
        let mock = MockApiClient::new();
        mock.respond(Method::GET, SYLLABUSES_PATH, syllabus_rows());
        let rows = SyllabusService::new(Arc::new(mock))
            .list(&SyllabusFilter::default())
            .await
            .unwrap();

        let mut catalog = SyllabusCatalog::new();
        catalog.set_syllabuses(rows.clone());
        assert!(catalog.syllabuses()[0].program_name.is_none());

        catalog.set_lookups(lookups());
        let first = &catalog.syllabuses()[0];
        assert_eq!(first.program_name.as_deref(), Some("UNIVERSITY COURSES"));
        assert_eq!(first.course_name.as_deref(), Some("B.Sc Computer Science"));
        assert_eq!(first.subject_name, None);
        assert_eq!(catalog.syllabuses()[1].course_name, None);

        // Rows fetched after the lookups are enriched on arrival
        catalog.set_syllabuses(rows);
        assert!(catalog.syllabuses()[0].program_name.is_some());
    }

    #[test]
    fn backend_supplied_names_are_kept() {
        let row = json!({"id": 4, "title": "T", "program_id": 1, "program_name": "Custom"});
        let mut syllabus = normalize_syllabus(row.as_object().unwrap()).unwrap();
        lookups().enrich(&mut syllabus);
        assert_eq!(syllabus.program_name.as_deref(), Some("Custom"));
    }

    #[tokio::test]
    async fn lookups_load_through_the_reference_cache() {
        let mock = MockApiClient::new();
        mock.respond(Method::GET, PROGRAMS_PATH, json!([{"id": 1, "name": "UNIVERSITY COURSES"}]));
        mock.respond(Method::GET, COURSES_PATH, json!([{"id": 101, "name": "B.Sc", "program_id": 1}]));
        mock.respond(Method::GET, SUBJECTS_PATH, json!([{"id": 5001, "name": "DSA", "course_id": 101}]));
        let mut reference = ReferenceService::new(Arc::new(mock.clone()), DataSourceMode::Live);

        let lookups = ReferenceLookups::load(&mut reference).await.unwrap();
        assert!(!lookups.is_empty());
        ReferenceLookups::load(&mut reference).await.unwrap();
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn create_validates_before_sending() {
        let mock = MockApiClient::new();
        let service = SyllabusService::new(Arc::new(mock.clone()));

        let mut missing_subject = request();
        missing_subject.subject_id = "undefined".into();
        let err = service.create(&missing_subject).await.unwrap_err();
        assert!(matches!(err, DeskError::Validation { field: Some(ref f), .. } if f == "subject_id"));

        let mut blank = request();
        blank.title = "  ".to_string();
        assert!(service.create(&blank).await.is_err());
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn upload_sends_a_multipart_form() {
        let dir = create_temp_dir();
        let file = create_temp_file_with_content(&dir, "sem1.pdf", b"%PDF-1.7");
        let mock = MockApiClient::new();
        mock.respond(
            Method::POST,
            SYLLABUS_UPLOAD_PATH,
            json!({"success": true, "syllabus": {"id": 12, "title": "Semester 1", "file_name": "sem1.pdf"}}),
        );

        let created = SyllabusService::new(Arc::new(mock.clone()))
            .upload(&request(), &file)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.id.as_str(), "12");

        let sent = &mock.requests_to(Method::POST, SYLLABUS_UPLOAD_PATH)[0];
        assert_eq!(sent.file_names, vec!["sem1.pdf".to_string()]);
        assert!(sent.multipart_fields.iter().any(|(k, v)| k == "title" && v == "Semester 1"));
        assert!(!sent.tenant_scoped);
    }

    #[tokio::test]
    async fn download_writes_the_file() {
        let dir = create_temp_dir();
        let destination = dir.path().join("out").join("sem1.pdf");
        let mock = MockApiClient::new();
        mock.serve_file(&download_path(&"12".into()), b"%PDF-1.7 body");

        let written = SyllabusService::new(Arc::new(mock))
            .download(&"12".into(), &destination)
            .await
            .unwrap();
        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn update_and_delete_hit_the_record_path() {
        let mock = MockApiClient::new();
        let path = format!("{}/12", SYLLABUSES_PATH);
        mock.respond(Method::PUT, &path, json!({"success": true}));
        mock.respond(Method::DELETE, &path, json!(null));
        let service = SyllabusService::new(Arc::new(mock.clone()));

        let update = UpdateSyllabusRequest {
            title: Some("Semester 1 (revised)".to_string()),
            ..Default::default()
        };
        assert!(service.update(&"12".into(), &update).await.unwrap().is_none());
        service.delete(&"12".into()).await.unwrap();

        assert_eq!(
            mock.requests_to(Method::PUT, &path)[0].body,
            Some(json!({"title": "Semester 1 (revised)"}))
        );
        assert_eq!(mock.requests_to(Method::DELETE, &path).len(), 1);
    }
}
