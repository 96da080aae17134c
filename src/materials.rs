//! Study materials: listing reconciled from two collections, plus CRUD
//!
//! Materials live in the study materials collection, but older branches kept
//! them as subjects. A listing fetches both, normalizes each row to
//! [`Material`], drops hidden or invalid rows and concatenates primary then
//! secondary. A failing primary source degrades to the secondary alone.

use reqwest::Method;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use validator::Validate;

use branchdesk_protocol::api::{
    CreateMaterialRequest, CreateSubjectRequest, UpdateMaterialRequest, UpdateSubjectRequest,
};
use branchdesk_protocol::common::{
    Material, MaterialSource, MaterialType, RecordId, RecordStatus,
};

use crate::client::{ApiClient, ApiRequest, FilePart, MultipartForm};
use crate::envelope::{self, RawRow, MATERIALS, SUBJECTS};
use crate::error::{DeskError, Result};
use crate::listing::Searchable;
use crate::record::RawRecord;
use crate::shadow::DeletedShadow;

pub const MATERIALS_PATH: &str = "/api/branch-study-materials/materials";
pub const MATERIALS_UPLOAD_PATH: &str = "/api/branch-study-materials/materials/upload";
pub const SUBJECTS_PATH: &str = "/api/branch-subjects/subjects";

/// Which material types a listing wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MaterialKind {
    #[default]
    NonVideo,
    Video,
    All,
}

impl MaterialKind {
    pub fn admits(&self, material_type: MaterialType) -> bool {
        match self {
            Self::NonVideo => material_type != MaterialType::Video,
            Self::Video => material_type == MaterialType::Video,
            Self::All => true,
        }
    }

    pub fn includes_videos(&self) -> bool {
        !matches!(self, Self::NonVideo)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaterialQuery {
    pub kind: MaterialKind,
    pub program_id: Option<RecordId>,
    pub course_id: Option<RecordId>,
    pub subject_id: Option<RecordId>,
    pub search: Option<String>,
}

impl MaterialQuery {
    pub fn videos() -> Self {
        Self {
            kind: MaterialKind::Video,
            ..Self::default()
        }
    }

    /// No hierarchy filter and no search term
    pub fn is_unscoped(&self) -> bool {
        self.program_id.is_none()
            && self.course_id.is_none()
            && self.subject_id.is_none()
            && self.search.as_deref().map_or(true, |s| s.trim().is_empty())
    }

    /// Client-side scope check; the backend does not always honour the
    /// query parameters
    fn matches(&self, material: &Material) -> bool {
        fn same(filter: &Option<RecordId>, value: &Option<RecordId>) -> bool {
            match (filter, value) {
                (Some(f), Some(v)) => f == v,
                _ => true,
            }
        }

        self.kind.admits(material.material_type)
            && same(&self.program_id, &material.program_id)
            && same(&self.course_id, &material.course_id)
            && same(&self.subject_id, &material.subject_id)
            && self
                .search
                .as_deref()
                .map_or(true, |term| material.matches_search(term))
    }

    fn apply_to(&self, request: ApiRequest) -> ApiRequest {
        request
            .query_opt("program_id", self.program_id.as_ref())
            .query_opt("course_id", self.course_id.as_ref())
            .query_opt("subject_id", self.subject_id.as_ref())
            .query_opt("search", self.search.as_deref())
    }
}

impl Searchable for Material {
    fn search_text(&self) -> Vec<&str> {
        let mut fields = vec![self.material_name.as_str(), self.material_type.as_str()];
        if let Some(description) = &self.description {
            fields.push(description);
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingState {
    Populated,
    /// Nothing to show yet; informational, not a failure
    Empty,
}

#[derive(Debug, Clone)]
pub struct MaterialListing {
    pub materials: Vec<Material>,
    /// Set when the primary collection failed and only subjects were used
    pub primary_error: Option<String>,
    /// Set when the subjects collection failed and only primary rows were used
    pub secondary_error: Option<String>,
    pub state: ListingState,
}

impl MaterialListing {
    fn new(
        materials: Vec<Material>,
        primary_error: Option<String>,
        secondary_error: Option<String>,
    ) -> Self {
        let state = if materials.is_empty() {
            ListingState::Empty
        } else {
            ListingState::Populated
        };
        Self {
            materials,
            primary_error,
            secondary_error,
            state,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.primary_error.is_some() || self.secondary_error.is_some()
    }
}

fn hierarchy_id(raw: &RawRecord<'_>, key: &str, nested: &str) -> Option<RecordId> {
    raw.id(&[key]).or_else(|| raw.nested_id(nested))
}

fn status_of(raw: &RawRecord<'_>) -> RecordStatus {
    raw.text(&["status"])
        .and_then(|s| RecordStatus::parse(&s))
        .unwrap_or_default()
}

/// Normalize a study materials row. `None` for rows without a valid ID or
/// with a hidden status.
pub fn normalize_material(row: &RawRow) -> Option<Material> {
    let raw = RawRecord::new(row);
    let id = raw.id(&["id", "_id", "material_id"])?;

    let status = status_of(&raw);
    if status.is_hidden() {
        return None;
    }

    let material_type = raw
        .text(&["material_type", "type"])
        .and_then(|t| MaterialType::parse(&t))
        .unwrap_or(MaterialType::Document);

    Some(Material {
        material_name: raw
            .text(&["material_name", "title", "name"])
            .unwrap_or_else(|| format!("Material {}", id)),
        material_type,
        program_id: hierarchy_id(&raw, "program_id", "program"),
        course_id: hierarchy_id(&raw, "course_id", "course"),
        subject_id: hierarchy_id(&raw, "subject_id", "subject"),
        description: raw.text(&["description"]),
        file_url: raw.text(&["file_url", "file_path", "url"]),
        external_link: raw.text(&["external_link", "link"]),
        file_size: raw.unsigned(&["file_size", "size"]),
        access_level: raw
            .text(&["access_level"])
            .unwrap_or_else(|| "public".to_string()),
        status,
        created_at: raw.timestamp(&["created_at", "createdAt", "uploaded_at"]),
        source: MaterialSource::StudyMaterials,
        id,
    })
}

/// Normalize a subjects row into a material. Rows need a valid ID and a
/// name, must not carry a hidden status and must not be flagged deleted.
pub fn subject_to_material(row: &RawRow) -> Option<Material> {
    let raw = RawRecord::new(row);
    let id = raw.id(&["id", "_id", "subject_id"])?;
    let name = raw.text(&["subject_name", "name"])?;

    let status = status_of(&raw);
    if status.is_hidden() || raw.flag(&["is_deleted", "deleted"]) {
        return None;
    }

    // Videos stored as subjects may only carry a `video_url`
    let video_url = raw.text(&["video_url"]);
    let material_type = raw
        .text(&["material_type", "type"])
        .and_then(|t| MaterialType::parse(&t))
        .unwrap_or(if video_url.is_some() {
            MaterialType::Video
        } else {
            MaterialType::Document
        });

    Some(Material {
        material_name: name,
        material_type,
        program_id: hierarchy_id(&raw, "program_id", "program"),
        course_id: hierarchy_id(&raw, "course_id", "course"),
        subject_id: Some(id.clone()),
        description: raw.text(&["description"]),
        file_url: video_url.or_else(|| raw.text(&["syllabus_file", "file_url", "file_path"])),
        external_link: raw.text(&["external_link"]),
        file_size: raw.unsigned(&["file_size"]),
        access_level: raw
            .text(&["access_level"])
            .unwrap_or_else(|| "public".to_string()),
        status,
        created_at: raw.timestamp(&["created_at", "createdAt"]),
        source: MaterialSource::Subjects,
        id,
    })
}

fn normalize_rows(
    rows: &[RawRow],
    normalize: fn(&RawRow) -> Option<Material>,
    source: MaterialSource,
) -> Vec<Material> {
    let materials: Vec<Material> = rows.iter().filter_map(normalize).collect();
    if materials.len() < rows.len() {
        tracing::debug!(
            "Skipped {} hidden or invalid rows from {}",
            rows.len() - materials.len(),
            source
        );
    }
    materials
}

/// Checks that must pass before any request is sent
fn check_hierarchy(program: &RecordId, course: &RecordId, subject: Option<&RecordId>) -> Result<()> {
    if !program.is_valid() {
        return Err(DeskError::validation_field("Program is required", "program_id"));
    }
    if !course.is_valid() {
        return Err(DeskError::validation_field("Course is required", "course_id"));
    }
    if let Some(subject) = subject {
        if !subject.is_valid() {
            return Err(DeskError::validation_field("Subject is required", "subject_id"));
        }
    }
    Ok(())
}

pub fn validate_material(request: &CreateMaterialRequest) -> Result<()> {
    if request.material_name.trim().is_empty() {
        return Err(DeskError::validation_field(
            "Material name is required",
            "material_name",
        ));
    }
    check_hierarchy(
        &request.program_id,
        &request.course_id,
        Some(&request.subject_id),
    )?;
    if request.material_type == MaterialType::Link
        && request.external_link.as_deref().map_or(true, |l| l.trim().is_empty())
    {
        return Err(DeskError::validation_field(
            "Link materials need an external link",
            "external_link",
        ));
    }
    request.validate()?;
    Ok(())
}

pub struct MaterialService<C: ApiClient> {
    client: Arc<C>,
    shadow: DeletedShadow,
}

impl<C: ApiClient + 'static> MaterialService<C> {
    pub fn new(client: Arc<C>, shadow: DeletedShadow) -> Self {
        Self { client, shadow }
    }

    pub fn shadow(&self) -> &DeletedShadow {
        &self.shadow
    }

    /// Reconciled listing over both collections
    pub async fn list(&self, query: &MaterialQuery) -> Result<MaterialListing> {
        let (primary, secondary) =
            tokio::join!(self.fetch_primary(query), self.fetch_secondary(query));

        let primary = match primary {
            Err(e) if e.is_auth_error() => return Err(e),
            other => other,
        };
        let secondary = match secondary {
            Err(e) if e.is_auth_error() => return Err(e),
            other => other,
        };

        let (primary_rows, primary_error) = match primary {
            Ok(rows) => (rows, None),
            Err(e) => {
                tracing::warn!("Study materials unavailable, using subjects only: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };
        let (secondary_rows, secondary_error) = match secondary {
            Ok(rows) => (rows, None),
            Err(e) if primary_error.is_some() => return Err(e),
            Err(e) => {
                tracing::warn!("Subjects unavailable, using study materials only: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let mut materials = primary_rows;
        materials.extend(secondary_rows);

        let complete = primary_error.is_none() && secondary_error.is_none();
        if query.kind.includes_videos() {
            if complete && query.is_unscoped() {
                let served: HashSet<RecordId> = materials
                    .iter()
                    .filter(|m| m.is_video())
                    .map(|m| m.id.clone())
                    .collect();
                self.shadow.reconcile(&served)?;
            }
            materials = self.shadow.apply(materials)?;
        }

        let materials: Vec<Material> = materials.into_iter().filter(|m| query.matches(m)).collect();
        tracing::info!("Listed {} materials", materials.len());

        Ok(MaterialListing::new(materials, primary_error, secondary_error))
    }

    async fn fetch_primary(&self, query: &MaterialQuery) -> Result<Vec<Material>> {
        let request = query.apply_to(ApiRequest::get(MATERIALS_PATH).tenant_scoped());
        let rows = MATERIALS.rows(self.client.send(request).await?)?;
        Ok(normalize_rows(&rows, normalize_material, MaterialSource::StudyMaterials))
    }

    async fn fetch_secondary(&self, query: &MaterialQuery) -> Result<Vec<Material>> {
        let request = ApiRequest::get(SUBJECTS_PATH)
            .tenant_scoped()
            .query_opt("program_id", query.program_id.as_ref())
            .query_opt("course_id", query.course_id.as_ref());
        let rows = SUBJECTS.rows(self.client.send(request).await?)?;
        let mut materials = normalize_rows(&rows, subject_to_material, MaterialSource::Subjects);
        if let Some(subject_id) = &query.subject_id {
            materials.retain(|m| &m.id == subject_id);
        }
        Ok(materials)
    }

    pub async fn get(&self, id: &RecordId) -> Result<Material> {
        let path = format!("{}/{}", MATERIALS_PATH, id);
        let body = self.client.send(ApiRequest::get(path).tenant_scoped()).await?;
        let row = envelope::single(body, "material")?;
        normalize_material(&row).ok_or_else(|| DeskError::not_found(format!("material {}", id)))
    }

    /// Create a metadata-only material (links, or files hosted elsewhere)
    pub async fn create(&self, request: &CreateMaterialRequest) -> Result<Option<Material>> {
        validate_material(request)?;

        let api_request = ApiRequest::post(MATERIALS_PATH)
            .tenant_scoped()
            .json(request)?;
        let body = self.client.send(api_request).await?;
        tracing::info!("Created material '{}'", request.material_name);
        Ok(record_in(body, "material", normalize_material))
    }

    pub async fn upload(&self, request: &CreateMaterialRequest, file: &Path) -> Result<Option<Material>> {
        validate_material(request)?;
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
            .send(ApiRequest::post(MATERIALS_UPLOAD_PATH).tenant_scoped().multipart(form))
            .await?;
        tracing::info!("Uploaded material '{}' from {}", request.material_name, file.display());
        Ok(record_in(body, "material", normalize_material))
    }

    pub async fn update(&self, id: &RecordId, request: &UpdateMaterialRequest) -> Result<Option<Material>> {
        if !id.is_valid() {
            return Err(DeskError::invalid_input("Material ID is required"));
        }
        request.validate()?;

        let path = format!("{}/{}", MATERIALS_PATH, id);
        let body = self
            .client
            .send(ApiRequest::put(path).tenant_scoped().json(request)?)
            .await?;
        tracing::info!("Updated material {}", id);
        Ok(record_in(body, "material", normalize_material))
    }

    /// Delete from the collection the material was listed from
    pub async fn delete(&self, material: &Material) -> Result<()> {
        self.delete_from(&material.id, material.source).await
    }

    pub async fn delete_from(&self, id: &RecordId, source: MaterialSource) -> Result<()> {
        if !id.is_valid() {
            return Err(DeskError::invalid_input("Material ID is required"));
        }
        self.client.send(delete_request(id, source)).await?;
        tracing::info!("Deleted {} from {}", id, source);
        Ok(())
    }

    /// Delete a video: drop it from `visible` now, remember it in the
    /// shadow, then fire deletes at both collections in the background.
    /// The returned handles may be awaited by short-lived callers.
    pub fn delete_video(
        &self,
        visible: &mut Vec<Material>,
        id: &RecordId,
    ) -> Result<Vec<JoinHandle<()>>> {
        if !id.is_valid() {
            return Err(DeskError::invalid_input("Video ID is required"));
        }

        visible.retain(|m| &m.id != id);
        self.shadow.record(id.clone())?;

        let handles = [MaterialSource::StudyMaterials, MaterialSource::Subjects]
            .into_iter()
            .map(|source| {
                let client = Arc::clone(&self.client);
                let request = delete_request(id, source);
                let id = id.clone();
                tokio::spawn(async move {
                    match client.send(request).await {
                        Ok(_) => tracing::debug!("Backend delete of video {} in {} succeeded", id, source),
                        Err(e) => tracing::debug!("Backend delete of video {} in {} failed: {}", id, source, e),
                    }
                })
            })
            .collect();

        Ok(handles)
    }

    /// Subjects collection on its own, as the legacy materials view shows it
    pub async fn list_subjects(&self, query: &MaterialQuery) -> Result<Vec<Material>> {
        let query = MaterialQuery {
            kind: MaterialKind::All,
            ..query.clone()
        };
        let materials = self.fetch_secondary(&query).await?;
        Ok(materials.into_iter().filter(|m| query.matches(m)).collect())
    }

    pub async fn create_subject(&self, request: &CreateSubjectRequest) -> Result<Option<Material>> {
        if request.subject_name.trim().is_empty() {
            return Err(DeskError::validation_field("Subject name is required", "subject_name"));
        }
        check_hierarchy(&request.program_id, &request.course_id, None)?;
        request.validate()?;

        let body = self
            .client
            .send(ApiRequest::post(SUBJECTS_PATH).tenant_scoped().json(request)?)
            .await?;
        tracing::info!("Created subject '{}'", request.subject_name);
        Ok(record_in(body, "subject", subject_to_material))
    }

    pub async fn update_subject(&self, id: &RecordId, request: &UpdateSubjectRequest) -> Result<Option<Material>> {
        if !id.is_valid() {
            return Err(DeskError::invalid_input("Subject ID is required"));
        }
        request.validate()?;

        let path = format!("{}/{}", SUBJECTS_PATH, id);
        let body = self
            .client
            .send(ApiRequest::put(path).tenant_scoped().json(request)?)
            .await?;
        tracing::info!("Updated subject {}", id);
        Ok(record_in(body, "subject", subject_to_material))
    }

    pub async fn delete_subject(&self, id: &RecordId) -> Result<()> {
        self.delete_from(id, MaterialSource::Subjects).await
    }
}

fn delete_request(id: &RecordId, source: MaterialSource) -> ApiRequest {
    let collection = match source {
        MaterialSource::StudyMaterials => MATERIALS_PATH,
        MaterialSource::Subjects => SUBJECTS_PATH,
    };
    ApiRequest::delete(format!("{}/{}", collection, id)).tenant_scoped()
}

/// The record echoed back by a write, when the backend sends one
fn record_in(
    body: serde_json::Value,
    key: &str,
    normalize: fn(&RawRow) -> Option<Material>,
) -> Option<Material> {
    envelope::single(body, key)
        .ok()
        .and_then(|row| normalize(&row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{self, SessionStore};
    use crate::tests::mocks::MockApiClient;
    use crate::tests::utils::test_helpers::*;
    use chrono::Duration;
    use serde_json::json;

    fn service(mock: &MockApiClient) -> MaterialService<MockApiClient> {
        let shadow = DeletedShadow::new(
            session::shared(SessionStore::in_memory()),
            Duration::days(30),
        );
        MaterialService::new(Arc::new(mock.clone()), shadow)
    }

    fn link_request() -> CreateMaterialRequest {
        CreateMaterialRequest {
            material_name: "Reading list".to_string(),
            material_type: MaterialType::Link,
            program_id: "1".into(),
            course_id: "101".into(),
            subject_id: "5001".into(),
            description: None,
            external_link: Some("https://example.com/list".to_string()),
            access_level: "public".to_string(),
            status: RecordStatus::Active,
        }
    }

    #[tokio::test]
    async fn deleted_materials_are_filtered_out() {
        let mock = MockApiClient::new();
        mock.respond(
            Method::GET,
            MATERIALS_PATH,
            json!({"materials": [
                material_row(json!(1), "Old notes", "document", "deleted"),
                material_row(json!(2), "Current notes", "document", "active"),
            ]}),
        );
        mock.respond(Method::GET, SUBJECTS_PATH, json!([]));

        let listing = service(&mock).list(&MaterialQuery::default()).await.unwrap();
        assert_eq!(listing.materials.len(), 1);
        assert_eq!(listing.materials[0].id.as_str(), "2");
        assert_eq!(listing.state, ListingState::Populated);
    }

    #[tokio::test]
    async fn failing_primary_falls_back_to_subjects() {
        let mock = MockApiClient::new();
        mock.fail(Method::GET, MATERIALS_PATH, DeskError::server(500, "boom"));
        mock.respond(
            Method::GET,
            SUBJECTS_PATH,
            json!({"data": [
                subject_row(json!(10), "Algebra", "active"),
                subject_row(json!(11), "Geometry", "active"),
                subject_row(json!(12), "", "active"),
                subject_row(json!(13), "Archived", "removed"),
                {"id": 14, "subject_name": "Flagged", "is_deleted": true},
                {"id": "undefined", "subject_name": "Ghost"},
            ]}),
        );

        let listing = service(&mock).list(&MaterialQuery::default()).await.unwrap();
        assert_eq!(listing.materials.len(), 2);
        assert!(listing
            .materials
            .iter()
            .all(|m| m.source == MaterialSource::Subjects));
        assert!(listing.primary_error.is_some());
    }

    #[tokio::test]
    async fn sources_are_concatenated_primary_first() {
        let mock = MockApiClient::new();
        mock.respond(
            Method::GET,
            MATERIALS_PATH,
            json!([material_row(json!(7), "Notes", "pdf", "active")]),
        );
        mock.respond(
            Method::GET,
            SUBJECTS_PATH,
            json!([subject_row(json!(7), "Physics", "active")]),
        );

        let listing = service(&mock).list(&MaterialQuery::default()).await.unwrap();
        let sources: Vec<MaterialSource> = listing.materials.iter().map(|m| m.source).collect();
        assert_eq!(sources, vec![MaterialSource::StudyMaterials, MaterialSource::Subjects]);
    }

    #[tokio::test]
    async fn empty_sources_give_an_informational_state() {
        let mock = MockApiClient::new();
        mock.fail(Method::GET, MATERIALS_PATH, DeskError::network("refused"));
        mock.respond(Method::GET, SUBJECTS_PATH, json!({"subjects": []}));

        let listing = service(&mock).list(&MaterialQuery::default()).await.unwrap();
        assert_eq!(listing.state, ListingState::Empty);
    }

    #[tokio::test]
    async fn both_sources_failing_surfaces_the_subjects_error() {
        let mock = MockApiClient::new();
        mock.fail(Method::GET, MATERIALS_PATH, DeskError::network("refused"));
        mock.fail(Method::GET, SUBJECTS_PATH, DeskError::server(502, "bad gateway"));

        let err = service(&mock).list(&MaterialQuery::default()).await.unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    async fn auth_failures_always_propagate() {
        let mock = MockApiClient::new();
        mock.respond(Method::GET, MATERIALS_PATH, json!([]));
        mock.fail(Method::GET, SUBJECTS_PATH, DeskError::authentication("expired"));

        let err = service(&mock).list(&MaterialQuery::default()).await.unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn kind_filter_separates_videos() {
        let mock = MockApiClient::new();
        mock.respond(
            Method::GET,
            MATERIALS_PATH,
            json!([
                material_row(json!("v1"), "Lecture 1", "video", "active"),
                material_row(json!("d1"), "Handout", "document", "active"),
            ]),
        );
        mock.respond(Method::GET, SUBJECTS_PATH, json!([]));
        let service = service(&mock);

        let videos = service.list(&MaterialQuery::videos()).await.unwrap();
        assert_eq!(videos.materials.len(), 1);
        assert!(videos.materials[0].is_video());

        let documents = service.list(&MaterialQuery::default()).await.unwrap();
        assert_eq!(documents.materials[0].id.as_str(), "d1");
    }

    #[tokio::test]
    async fn subject_scope_filters_primary_rows() {
        let mock = MockApiClient::new();
        let mut other_subject = material_row(json!(1), "Stray handout", "document", "active");
        other_subject["subject_id"] = json!(9999);
        mock.respond(
            Method::GET,
            MATERIALS_PATH,
            json!([other_subject, material_row(json!(2), "Notes", "document", "active")]),
        );
        mock.respond(Method::GET, SUBJECTS_PATH, json!([]));

        let query = MaterialQuery {
            subject_id: Some("5001".into()),
            ..MaterialQuery::default()
        };
        let listing = service(&mock).list(&query).await.unwrap();

        let ids: Vec<&str> = listing.materials.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["2"]);
    }

    #[tokio::test]
    async fn videos_stored_as_subjects_are_listed_as_videos() {
        let mock = MockApiClient::new();
        mock.respond(Method::GET, MATERIALS_PATH, json!([]));
        let mut by_url = subject_row(json!(41), "Recorded lecture", "active");
        by_url["video_url"] = json!("https://cdn.example.com/v/41.mp4");
        let mut by_type = subject_row(json!(42), "Lab walkthrough", "active");
        by_type["material_type"] = json!("video");
        mock.respond(
            Method::GET,
            SUBJECTS_PATH,
            json!([by_url, by_type, subject_row(json!(43), "Algebra", "active")]),
        );
        let service = service(&mock);

        let videos = service.list(&MaterialQuery::videos()).await.unwrap();
        let ids: Vec<&str> = videos.materials.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["41", "42"]);
        assert!(videos.materials.iter().all(|m| m.source == MaterialSource::Subjects));
        assert_eq!(
            videos.materials[0].file_url.as_deref(),
            Some("https://cdn.example.com/v/41.mp4")
        );

        let documents = service.list(&MaterialQuery::default()).await.unwrap();
        assert_eq!(documents.materials.len(), 1);
        assert_eq!(documents.materials[0].id.as_str(), "43");
    }

    #[tokio::test]
    async fn deleted_video_stays_hidden_after_reload() {
        let mock = MockApiClient::new();
        mock.respond(
            Method::GET,
            MATERIALS_PATH,
            json!([
                material_row(json!("v123"), "Lecture 1", "video", "active"),
                material_row(json!("v124"), "Lecture 2", "video", "active"),
            ]),
        );
        mock.respond(Method::GET, SUBJECTS_PATH, json!([]));
        mock.fail(
            Method::DELETE,
            &format!("{}/v123", MATERIALS_PATH),
            DeskError::server(500, "legacy collection"),
        );
        mock.respond(Method::DELETE, &format!("{}/v123", SUBJECTS_PATH), json!({"success": true}));

        let service = service(&mock);
        let mut visible = service.list(&MaterialQuery::videos()).await.unwrap().materials;

        let handles = service.delete_video(&mut visible, &"v123".into()).unwrap();
        assert!(visible.iter().all(|m| m.id.as_str() != "v123"));
        for handle in handles {
            handle.await.unwrap();
        }

        let reloaded = service.list(&MaterialQuery::videos()).await.unwrap();
        assert_eq!(reloaded.materials.len(), 1);
        assert_eq!(reloaded.materials[0].id.as_str(), "v124");
        assert_eq!(mock.requests_to(Method::DELETE, &format!("{}/v123", SUBJECTS_PATH)).len(), 1);
    }

    #[tokio::test]
    async fn shadow_is_reconciled_once_the_backend_catches_up() {
        let mock = MockApiClient::new();
        mock.respond(Method::GET, MATERIALS_PATH, json!([]));
        mock.respond(Method::GET, SUBJECTS_PATH, json!([]));
        let service = service(&mock);
        service.shadow().record("v9".into()).unwrap();

        service.list(&MaterialQuery::videos()).await.unwrap();
        assert!(service.shadow().load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scoped_listing_does_not_reconcile_the_shadow() {
        let mock = MockApiClient::new();
        mock.respond(Method::GET, MATERIALS_PATH, json!([]));
        mock.respond(Method::GET, SUBJECTS_PATH, json!([]));
        let service = service(&mock);
        service.shadow().record("v9".into()).unwrap();

        let query = MaterialQuery {
            course_id: Some("101".into()),
            ..MaterialQuery::videos()
        };
        service.list(&query).await.unwrap();
        assert_eq!(service.shadow().load().unwrap().len(), 1);

        let sent = mock.requests_to(Method::GET, MATERIALS_PATH);
        assert_eq!(sent[0].query_value("course_id"), Some("101"));
    }

    #[tokio::test]
    async fn validation_runs_before_any_request() {
        let mock = MockApiClient::new();
        let service = service(&mock);

        let mut request = link_request();
        request.external_link = None;
        let err = service.create(&request).await.unwrap_err();
        assert!(matches!(err, DeskError::Validation { .. }));

        let mut request = link_request();
        request.course_id = "".into();
        assert!(service.create(&request).await.is_err());

        let err = service
            .upload(&link_request(), Path::new("/definitely/missing.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::Validation { .. }));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn create_posts_json_and_reads_the_echo() {
        let mock = MockApiClient::new();
        mock.respond(
            Method::POST,
            MATERIALS_PATH,
            json!({"success": true, "data": material_row(json!(55), "Reading list", "link", "active")}),
        );

        let created = service(&mock).create(&link_request()).await.unwrap().unwrap();
        assert_eq!(created.id.as_str(), "55");

        let sent = mock.requests_to(Method::POST, MATERIALS_PATH);
        assert!(sent[0].tenant_scoped);
        assert_eq!(sent[0].body.as_ref().unwrap()["material_name"], json!("Reading list"));
    }

    #[tokio::test]
    async fn upload_sends_metadata_and_file() {
        let dir = create_temp_dir();
        let file = create_temp_file_with_content(&dir, "notes.pdf", b"%PDF-1.4");
        let mock = MockApiClient::new();
        mock.respond(Method::POST, MATERIALS_UPLOAD_PATH, json!({"success": true}));

        let mut request = link_request();
        request.material_type = MaterialType::Document;
        let echoed = service(&mock).upload(&request, &file).await.unwrap();
        assert!(echoed.is_none());

        let sent = mock.requests_to(Method::POST, MATERIALS_UPLOAD_PATH);
        assert_eq!(sent[0].file_names, vec!["notes.pdf".to_string()]);
        assert!(sent[0]
            .multipart_fields
            .iter()
            .any(|(k, v)| k == "material_type" && v == "document"));
    }

    #[tokio::test]
    async fn delete_targets_the_source_collection() {
        let mock = MockApiClient::new();
        mock.respond(Method::DELETE, &format!("{}/8", SUBJECTS_PATH), json!(null));

        let row = material("8", MaterialType::Document, MaterialSource::Subjects);
        service(&mock).delete(&row).await.unwrap();
        assert_eq!(mock.requests_to(Method::DELETE, &format!("{}/8", SUBJECTS_PATH)).len(), 1);
        assert!(mock.requests_to(Method::DELETE, &format!("{}/8", MATERIALS_PATH)).is_empty());
    }

    #[test]
    fn normalizer_reads_nested_and_numeric_fields() {
        let row = json!({
            "_id": 31,
            "title": "Lab manual",
            "type": "Question Paper",
            "program": {"id": 2, "name": "School"},
            "course_id": "201",
            "file_size": "2048",
            "status": null
        });
        let material = normalize_material(row.as_object().unwrap()).unwrap();
        assert_eq!(material.id.as_str(), "31");
        assert_eq!(material.material_type, MaterialType::QuestionPaper);
        assert_eq!(material.program_id, Some("2".into()));
        assert_eq!(material.file_size, Some(2048));
        assert_eq!(material.status, RecordStatus::Active);
    }
}
