//! Program -> Course -> Subject reference data
//!
//! [`ReferenceService`] loads each level once per parent key and serves
//! repeats from its cache. [`Cascade`] is the selection state a filter or
//! form keeps on top of it: choosing a parent reloads the child options and
//! clears everything below.

use std::collections::HashMap;
use std::sync::Arc;

use branchdesk_protocol::common::{Course, Program, RecordId, RecordStatus, ReferenceSubject};

use crate::client::{ApiClient, ApiRequest};
use crate::config::DataSourceMode;
use crate::envelope::{RawRow, COURSES, PROGRAMS, SUBJECTS};
use crate::error::{DeskError, Result};
use crate::fixtures;
use crate::record::RawRecord;

pub const PROGRAMS_PATH: &str = "/api/branch-programs/programs";
pub const COURSES_PATH: &str = "/api/branch-courses/courses";
pub const SUBJECTS_PATH: &str = "/api/branch-subjects/subjects";

fn visible_status(raw: &RawRecord<'_>) -> Option<RecordStatus> {
    let status = raw
        .text(&["status"])
        .and_then(|s| RecordStatus::parse(&s))
        .unwrap_or_default();
    if status.is_hidden() || raw.flag(&["is_deleted", "deleted"]) {
        None
    } else {
        Some(status)
    }
}

pub fn normalize_program(row: &RawRow) -> Option<Program> {
    let raw = RawRecord::new(row);
    Some(Program {
        id: raw.id(&["id", "_id", "program_id"])?,
        name: raw.text(&["program_name", "name", "title"])?,
        status: visible_status(&raw)?,
    })
}

pub fn normalize_course(row: &RawRow) -> Option<Course> {
    let raw = RawRecord::new(row);
    Some(Course {
        id: raw.id(&["id", "_id", "course_id"])?,
        name: raw.text(&["course_name", "name", "title"])?,
        status: visible_status(&raw)?,
        program_id: raw.id(&["program_id"]).or_else(|| raw.nested_id("program")),
    })
}

pub fn normalize_subject(row: &RawRow) -> Option<ReferenceSubject> {
    let raw = RawRecord::new(row);
    Some(ReferenceSubject {
        id: raw.id(&["id", "_id", "subject_id"])?,
        name: raw.text(&["subject_name", "name", "title"])?,
        status: visible_status(&raw)?,
        course_id: raw.id(&["course_id"]).or_else(|| raw.nested_id("course")),
    })
}

/// Reference data loader with a per-key session cache. Fixture fallbacks
/// are returned but never cached, so a later call retries the backend.
pub struct ReferenceService<C: ApiClient> {
    client: Arc<C>,
    mode: DataSourceMode,
    programs: Option<Vec<Program>>,
    courses: HashMap<RecordId, Vec<Course>>,
    subjects: HashMap<RecordId, Vec<ReferenceSubject>>,
    all_courses: Option<Vec<Course>>,
    all_subjects: Option<Vec<ReferenceSubject>>,
}

impl<C: ApiClient> ReferenceService<C> {
    pub fn new(client: Arc<C>, mode: DataSourceMode) -> Self {
        Self {
            client,
            mode,
            programs: None,
            courses: HashMap::new(),
            subjects: HashMap::new(),
            all_courses: None,
            all_subjects: None,
        }
    }

    pub async fn programs(&mut self) -> Result<Vec<Program>> {
        if let Some(programs) = &self.programs {
            return Ok(programs.clone());
        }
        if self.mode == DataSourceMode::Fixture {
            return Ok(fixtures::programs());
        }

        match self.fetch_programs().await {
            Ok(programs) => {
                self.programs = Some(programs.clone());
                Ok(programs)
            }
            Err(e) if self.mode == DataSourceMode::Fallback && e.is_fallback_eligible() => {
                tracing::warn!("Programs unavailable, showing fixture data: {}", e);
                Ok(fixtures::programs())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_programs(&self) -> Result<Vec<Program>> {
        let body = self
            .client
            .send(ApiRequest::get(PROGRAMS_PATH).tenant_scoped())
            .await?;
        let programs: Vec<Program> = PROGRAMS
            .rows(body)?
            .iter()
            .filter_map(normalize_program)
            .collect();
        tracing::debug!("Loaded {} programs", programs.len());
        Ok(programs)
    }

    /// Courses of one program; cached per program
    pub async fn courses(&mut self, program_id: &RecordId) -> Result<Vec<Course>> {
        if let Some(courses) = self.courses.get(program_id) {
            tracing::debug!("Courses for program {} served from cache", program_id);
            return Ok(courses.clone());
        }
        if self.mode == DataSourceMode::Fixture {
            return Ok(fixtures::courses(program_id));
        }

        match self.fetch_courses(Some(program_id)).await {
            Ok(courses) => {
                self.courses.insert(program_id.clone(), courses.clone());
                Ok(courses)
            }
            Err(e) if self.mode == DataSourceMode::Fallback && e.is_fallback_eligible() => {
                tracing::warn!("Courses unavailable, showing fixture data: {}", e);
                Ok(fixtures::courses(program_id))
            }
            Err(e) => Err(e),
        }
    }

    /// Every course the branch can see, for name lookups
    pub async fn all_courses(&mut self) -> Result<Vec<Course>> {
        if let Some(courses) = &self.all_courses {
            return Ok(courses.clone());
        }
        let courses = self.fetch_courses(None).await?;
        self.all_courses = Some(courses.clone());
        Ok(courses)
    }

    async fn fetch_courses(&self, program_id: Option<&RecordId>) -> Result<Vec<Course>> {
        let request = ApiRequest::get(COURSES_PATH)
            .tenant_scoped()
            .query_opt("program_id", program_id);
        let body = self.client.send(request).await?;

        let courses: Vec<Course> = COURSES
            .rows(body)?
            .iter()
            .filter_map(normalize_course)
            .filter(|course| match (program_id, &course.program_id) {
                (Some(wanted), Some(actual)) => wanted == actual,
                _ => true,
            })
            .collect();
        Ok(courses)
    }

    /// Subjects of one course; cached per course
    pub async fn subjects(&mut self, course_id: &RecordId) -> Result<Vec<ReferenceSubject>> {
        if let Some(subjects) = self.subjects.get(course_id) {
            tracing::debug!("Subjects for course {} served from cache", course_id);
            return Ok(subjects.clone());
        }
        let subjects = self.fetch_subjects(Some(course_id)).await?;
        self.subjects.insert(course_id.clone(), subjects.clone());
        Ok(subjects)
    }

    pub async fn all_subjects(&mut self) -> Result<Vec<ReferenceSubject>> {
        if let Some(subjects) = &self.all_subjects {
            return Ok(subjects.clone());
        }
        let subjects = self.fetch_subjects(None).await?;
        self.all_subjects = Some(subjects.clone());
        Ok(subjects)
    }

    async fn fetch_subjects(&self, course_id: Option<&RecordId>) -> Result<Vec<ReferenceSubject>> {
        let request = ApiRequest::get(SUBJECTS_PATH)
            .tenant_scoped()
            .query_opt("course_id", course_id);
        let body = self.client.send(request).await?;

        Ok(SUBJECTS
            .rows(body)?
            .iter()
            .filter_map(normalize_subject)
            .filter(|subject| match (course_id, &subject.course_id) {
                (Some(wanted), Some(actual)) => wanted == actual,
                _ => true,
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeState {
    Unselected,
    ProgramSelected { program: RecordId },
    CourseSelected { program: RecordId, course: RecordId },
}

/// Selection state of one Program/Course/Subject control group
#[derive(Debug, Clone, Default)]
pub struct Cascade {
    programs: Vec<Program>,
    courses: Vec<Course>,
    subjects: Vec<ReferenceSubject>,
    program: Option<RecordId>,
    course: Option<RecordId>,
    subject: Option<RecordId>,
}

impl Cascade {
    /// Start with the program options loaded and nothing selected
    pub async fn load<C: ApiClient>(loader: &mut ReferenceService<C>) -> Result<Self> {
        Ok(Self {
            programs: loader.programs().await?,
            ..Self::default()
        })
    }

    pub fn state(&self) -> CascadeState {
        match (&self.program, &self.course) {
            (Some(program), Some(course)) => CascadeState::CourseSelected {
                program: program.clone(),
                course: course.clone(),
            },
            (Some(program), None) => CascadeState::ProgramSelected {
                program: program.clone(),
            },
            _ => CascadeState::Unselected,
        }
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn subjects(&self) -> &[ReferenceSubject] {
        &self.subjects
    }

    pub fn selected_program(&self) -> Option<&RecordId> {
        self.program.as_ref()
    }

    pub fn selected_course(&self) -> Option<&RecordId> {
        self.course.as_ref()
    }

    pub fn selected_subject(&self) -> Option<&RecordId> {
        self.subject.as_ref()
    }

    /// Case-insensitive lookup among the loaded programs
    pub fn program_named(&self, name: &str) -> Option<&Program> {
        self.programs
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    pub async fn select_program<C: ApiClient>(
        &mut self,
        loader: &mut ReferenceService<C>,
        program_id: &RecordId,
    ) -> Result<()> {
        if !self.programs.iter().any(|p| &p.id == program_id) {
            return Err(DeskError::invalid_input(format!("Unknown program {}", program_id)));
        }

        self.clear_program();
        self.courses = loader.courses(program_id).await?;
        self.program = Some(program_id.clone());
        Ok(())
    }

    pub async fn select_course<C: ApiClient>(
        &mut self,
        loader: &mut ReferenceService<C>,
        course_id: &RecordId,
    ) -> Result<()> {
        if self.program.is_none() {
            return Err(DeskError::invalid_input("Select a program first"));
        }
        if !self.courses.iter().any(|c| &c.id == course_id) {
            return Err(DeskError::invalid_input(format!("Unknown course {}", course_id)));
        }

        self.clear_course();
        self.subjects = loader.subjects(course_id).await?;
        self.course = Some(course_id.clone());
        Ok(())
    }

    pub fn select_subject(&mut self, subject_id: &RecordId) -> Result<()> {
        if !self.subjects.iter().any(|s| &s.id == subject_id) {
            return Err(DeskError::invalid_input(format!("Unknown subject {}", subject_id)));
        }
        self.subject = Some(subject_id.clone());
        Ok(())
    }

    /// Clear the program and every level below it
    pub fn clear_program(&mut self) {
        self.program = None;
        self.courses.clear();
        self.clear_course();
    }

    /// Clear the course and the subject level
    pub fn clear_course(&mut self) {
        self.course = None;
        self.subjects.clear();
        self.subject = None;
    }
}
