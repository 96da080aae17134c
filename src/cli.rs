use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use branchdesk_protocol::api::{
    CreateMaterialRequest, CreateSubjectRequest, CreateSyllabusRequest, UpdateMaterialRequest,
    UpdateSubjectRequest, UpdateSyllabusRequest, UpdateTransactionRequest,
};
use branchdesk_protocol::common::{Material, RecordId, RecordStatus, Syllabus, Transaction};

use crate::client::{ApiClient, ApiRequest, HttpClient};
use crate::config::{ConfigService, DataSourceMode, DeskConfig};
use crate::error::{DeskError, Result};
use crate::listing::{Debouncer, LatestOnly, ListView, Page, RequestSequencer, Ticket};
use crate::materials::{ListingState, MaterialKind, MaterialListing, MaterialQuery, MaterialService};
use crate::payments::PaymentService;
use crate::reference::{Cascade, ReferenceService, PROGRAMS_PATH};
use crate::session::{self, SessionStore, SharedSession};
use crate::shadow::DeletedShadow;
use crate::syllabus::{ReferenceLookups, SyllabusCatalog, SyllabusFilter, SyllabusService};
use crate::ui::{self, UI};
use crate::version::format_version_info;
use crate::{
    BrowseArgs, CatalogCommand, Commands, ConfigArgs, LoginArgs, MaterialCreateArgs,
    MaterialUpdateArgs, MaterialsCommand, PageArgs, PaymentsCommand, ScopeArgs, SubjectsCommand,
    SyllabusCommand, SyllabusCreateArgs, VideosCommand,
};

/// Everything a command needs to talk to the portal
struct Workspace {
    config: DeskConfig,
    session: SharedSession,
    client: Arc<HttpClient>,
}

impl Workspace {
    fn require_login(&self) -> Result<()> {
        if session::lock(&self.session)?.is_authenticated() {
            Ok(())
        } else {
            Err(DeskError::not_logged_in())
        }
    }

    /// Fixture mode works offline; everything else needs a token
    fn require_login_unless_fixture(&self) -> Result<()> {
        if self.config.data_source == DataSourceMode::Fixture {
            Ok(())
        } else {
            self.require_login()
        }
    }

    fn materials(&self) -> MaterialService<HttpClient> {
        let shadow = DeletedShadow::new(self.session.clone(), self.config.shadow_ttl());
        MaterialService::new(Arc::clone(&self.client), shadow)
    }

    fn reference(&self) -> ReferenceService<HttpClient> {
        ReferenceService::new(Arc::clone(&self.client), self.config.data_source)
    }

    fn page_size(&self, args: &PageArgs) -> usize {
        args.page_size.unwrap_or(self.config.page_size).max(1)
    }
}

fn record_id(raw: &str) -> Result<RecordId> {
    let id = RecordId::new(raw);
    if id.is_valid() {
        Ok(id)
    } else {
        Err(DeskError::invalid_input(format!("'{}' is not a valid ID", raw)))
    }
}

fn optional_id(raw: &Option<String>) -> Option<RecordId> {
    raw.as_deref().map(|s| RecordId::new(s)).filter(RecordId::is_valid)
}

fn date(value: Option<chrono::DateTime<chrono::Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn id_text(value: &Option<RecordId>) -> String {
    value
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn material_query(kind: MaterialKind, scope: &ScopeArgs, search: &Option<String>) -> MaterialQuery {
    MaterialQuery {
        kind,
        program_id: optional_id(&scope.program),
        course_id: optional_id(&scope.course),
        subject_id: optional_id(&scope.subject),
        search: search.clone().filter(|s| !s.trim().is_empty()),
    }
}

fn material_request(args: &MaterialCreateArgs) -> CreateMaterialRequest {
    CreateMaterialRequest {
        material_name: args.name.trim().to_string(),
        material_type: args.material_type,
        program_id: RecordId::new(args.program.as_str()),
        course_id: RecordId::new(args.course.as_str()),
        subject_id: RecordId::new(args.subject.as_str()),
        description: args.description.clone(),
        external_link: args.link.clone(),
        access_level: args.access_level.clone(),
        status: RecordStatus::Active,
    }
}

fn syllabus_request(args: &SyllabusCreateArgs) -> CreateSyllabusRequest {
    CreateSyllabusRequest {
        program_id: RecordId::new(args.program.as_str()),
        course_id: RecordId::new(args.course.as_str()),
        subject_id: RecordId::new(args.subject.as_str()),
        title: args.title.trim().to_string(),
        description: args.description.clone(),
    }
}

/// CLI handler for processing commands
pub struct CliHandler {
    config_path: Option<PathBuf>,
    data_source: Option<DataSourceMode>,
    ui: UI,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>, data_source: Option<DataSourceMode>) -> Self {
        Self {
            config_path,
            data_source,
            ui: UI::new(),
        }
    }

    /// Load configuration, applying the per-run data source override
    async fn load_config(&self) -> Result<DeskConfig> {
        let mut config = if let Some(path) = &self.config_path {
            DeskConfig::load_from(path).await?
        } else {
            DeskConfig::load().await?
        };
        if let Some(mode) = self.data_source {
            config.data_source = mode;
        }
        Ok(config)
    }

    async fn workspace(&self) -> Result<Workspace> {
        let config = self.load_config().await?;
        let session = session::shared(SessionStore::open(config.session_path())?);
        let client = HttpClient::new(config.to_client_config()?, session.clone())?;
        Ok(Workspace {
            config,
            session,
            client: Arc::new(client),
        })
    }

    /// Execute a CLI command
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login(args) => self.handle_login(args).await,
            Commands::Logout => self.handle_logout().await,
            Commands::Status => self.handle_status().await,
            Commands::Materials(args) => self.handle_materials(args.command).await,
            Commands::Videos(args) => self.handle_videos(args.command).await,
            Commands::Subjects(args) => self.handle_subjects(args.command).await,
            Commands::Syllabus(args) => self.handle_syllabus(args.command).await,
            Commands::Payments(args) => self.handle_payments(args.command).await,
            Commands::Catalog(args) => self.handle_catalog(args.command).await,
            Commands::Browse(args) => self.handle_browse(args).await,
            Commands::Config(args) => self.handle_config(args).await,
        }
    }

    fn confirm(&self, prompt: &str, force: bool) -> Result<bool> {
        if force {
            return Ok(true);
        }
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        if !proceed {
            self.ui.info("Cancelled");
        }
        Ok(proceed)
    }

    /// Handle login command
    async fn handle_login(&mut self, args: LoginArgs) -> Result<()> {
        let ws = self.workspace().await?;

        let token = match args.token {
            Some(token) => token,
            None => Password::with_theme(&ColorfulTheme::default())
                .with_prompt("Portal token")
                .interact()?,
        };
        session::lock(&ws.session)?.set_credentials(token, args.branch_code, args.franchise_code)?;

        match ws
            .client
            .send(ApiRequest::get(PROGRAMS_PATH).tenant_scoped())
            .await
        {
            Ok(_) => self.ui.success("Logged in"),
            Err(e) if e.is_auth_error() => return Err(e),
            Err(e) => self.ui.warning(&format!(
                "Token stored, but it could not be verified: {}",
                e
            )),
        }
        Ok(())
    }

    /// Handle logout command
    async fn handle_logout(&mut self) -> Result<()> {
        let ws = self.workspace().await?;
        session::lock(&ws.session)?.clear_auth()?;
        self.ui.success("Logged out");
        Ok(())
    }

    /// Handle status command. The probe runs first since a 401 drops the token.
    async fn handle_status(&mut self) -> Result<()> {
        let ws = self.workspace().await?;
        let server = match ws
            .client
            .send(ApiRequest::get(PROGRAMS_PATH).tenant_scoped())
            .await
        {
            Ok(_) => self.ui.format_server_status(true),
            Err(e) if e.is_network_error() => {
                format!("{} ({})", self.ui.format_server_status(false), e)
            }
            Err(e) => format!(
                "{} (HTTP {})",
                self.ui.format_server_status(true),
                e.status().map_or_else(|| "error".to_string(), |s| s.to_string())
            ),
        };

        let (authenticated, branch, franchise, hidden) = {
            let store = session::lock(&ws.session)?;
            (
                store.is_authenticated(),
                store.branch_code().map(str::to_string),
                store.franchise_code().map(str::to_string),
                store.shadow_entries().len(),
            )
        };

        self.ui.card(
            "Status",
            vec![
                ("Version", format_version_info()),
                ("Endpoint", ws.config.endpoint.clone()),
                ("Data source", ws.config.data_source.as_str().to_string()),
                ("Authentication", self.ui.format_auth_status(authenticated)),
                ("Branch code", self.ui.format_field(branch.as_deref())),
                ("Franchise code", self.ui.format_field(franchise.as_deref())),
                ("Hidden videos", hidden.to_string()),
                ("Server", server),
            ],
        );
        Ok(())
    }

    // ==================== Materials ====================

    fn report_listing(&self, listing: &MaterialListing) -> bool {
        if listing.is_degraded() {
            if let Some(e) = &listing.primary_error {
                tracing::debug!("Primary collection failed: {}", e);
                self.ui
                    .warning("Study materials collection unavailable; showing subjects only");
            }
            if let Some(e) = &listing.secondary_error {
                tracing::debug!("Subjects collection failed: {}", e);
                self.ui
                    .warning("Subjects collection unavailable; showing study materials only");
            }
        }
        if listing.state == ListingState::Empty {
            self.ui.info("No materials yet");
            return false;
        }
        true
    }

    fn render_materials(&self, page: &Page<Material>) {
        let rows: Vec<Vec<String>> = page
            .items
            .iter()
            .map(|m| {
                vec![
                    m.id.to_string(),
                    m.material_name.clone(),
                    m.material_type.to_string(),
                    m.source.to_string(),
                    m.access_level.clone(),
                    m.file_size.map(ui::format_bytes).unwrap_or_else(|| "-".to_string()),
                    date(m.created_at),
                ]
            })
            .collect();
        self.ui.table(
            &["ID", "Name", "Type", "Source", "Access", "Size", "Created"],
            &rows,
        );
        self.ui.pagination_footer(page);
    }

    fn material_card(&self, material: &Material) {
        self.ui.card(
            &material.material_name,
            vec![
                ("ID", material.id.to_string()),
                ("Type", material.material_type.to_string()),
                ("Source", material.source.to_string()),
                ("Status", material.status.to_string()),
                ("Program", id_text(&material.program_id)),
                ("Course", id_text(&material.course_id)),
                ("Subject", id_text(&material.subject_id)),
                ("Access", material.access_level.clone()),
                ("File", self.ui.format_field(material.file_url.as_deref())),
                ("Link", self.ui.format_field(material.external_link.as_deref())),
                (
                    "Size",
                    material
                        .file_size
                        .map(ui::format_size_colored)
                        .unwrap_or_else(|| "-".to_string()),
                ),
                ("Created", date(material.created_at)),
                ("Description", self.ui.format_field(material.description.as_deref())),
            ],
        );
    }

    fn saved_material(&self, saved: Option<Material>, message: &str) {
        self.ui.success(message);
        if let Some(material) = saved {
            self.material_card(&material);
        }
    }

    async fn list_materials(&self, ws: &Workspace, query: MaterialQuery, page: &PageArgs) -> Result<()> {
        let listing = ws.materials().list(&query).await?;
        if !self.report_listing(&listing) {
            return Ok(());
        }

        let mut view = ListView::new(listing.materials, ws.page_size(page));
        view.goto(page.page);
        self.render_materials(&view.current_page());
        Ok(())
    }

    async fn handle_materials(&mut self, command: MaterialsCommand) -> Result<()> {
        let ws = self.workspace().await?;
        ws.require_login()?;
        let service = ws.materials();

        match command {
            MaterialsCommand::List { kind, scope, page } => {
                let query = material_query(kind, &scope, &page.search);
                self.list_materials(&ws, query, &page).await
            }
            MaterialsCommand::Show { id } => {
                let material = service.get(&record_id(&id)?).await?;
                self.material_card(&material);
                Ok(())
            }
            MaterialsCommand::Create(args) => {
                let saved = service.create(&material_request(&args)).await?;
                self.saved_material(saved, "Material created");
                Ok(())
            }
            MaterialsCommand::Upload { file, material } => {
                let spinner = ui::create_spinner(&format!("Uploading {}", file.display()));
                let result = service.upload(&material_request(&material), &file).await;
                spinner.finish_and_clear();
                self.saved_material(result?, "Material uploaded");
                Ok(())
            }
            MaterialsCommand::Update(args) => self.update_material(&service, args).await,
            MaterialsCommand::Delete { id, source, force } => {
                let id = record_id(&id)?;
                if !self.confirm(&format!("Delete material {} from {}?", id, source), force)? {
                    return Ok(());
                }
                service.delete_from(&id, source).await?;
                self.ui.success(&format!("Material {} deleted", id));
                Ok(())
            }
        }
    }

    async fn update_material(
        &self,
        service: &MaterialService<HttpClient>,
        args: MaterialUpdateArgs,
    ) -> Result<()> {
        let request = UpdateMaterialRequest {
            material_name: args.name,
            material_type: args.material_type,
            description: args.description,
            external_link: args.link,
            access_level: args.access_level,
            status: args.status,
        };
        let nothing = request.material_name.is_none()
            && request.material_type.is_none()
            && request.description.is_none()
            && request.external_link.is_none()
            && request.access_level.is_none()
            && request.status.is_none();
        if nothing {
            return Err(DeskError::validation("Nothing to update"));
        }

        let saved = service.update(&record_id(&args.id)?, &request).await?;
        self.saved_material(saved, "Material updated");
        Ok(())
    }

    async fn handle_videos(&mut self, command: VideosCommand) -> Result<()> {
        let ws = self.workspace().await?;
        ws.require_login()?;

        match command {
            VideosCommand::List { scope, page } => {
                let query = material_query(MaterialKind::Video, &scope, &page.search);
                self.list_materials(&ws, query, &page).await
            }
            VideosCommand::Delete { id, force } => {
                let id = record_id(&id)?;
                let service = ws.materials();
                let mut visible = service.list(&MaterialQuery::videos()).await?.materials;

                let title = visible
                    .iter()
                    .find(|m| m.id == id)
                    .map(|m| m.material_name.clone());
                if title.is_none() {
                    self.ui
                        .warning(&format!("Video {} is not in the current listing", id));
                }
                let prompt = format!("Delete video {}?", title.as_deref().unwrap_or(id.as_str()));
                if !self.confirm(&prompt, force)? {
                    return Ok(());
                }

                let handles = service.delete_video(&mut visible, &id)?;
                self.ui.success(&format!(
                    "Video {} hidden; {} video(s) remain visible",
                    id,
                    visible.len()
                ));

                let spinner = ui::create_spinner("Asking the backend to delete it");
                for handle in handles {
                    if let Err(e) = handle.await {
                        tracing::debug!("Background delete task failed: {}", e);
                    }
                }
                spinner.finish_and_clear();
                Ok(())
            }
        }
    }

    async fn handle_subjects(&mut self, command: SubjectsCommand) -> Result<()> {
        let ws = self.workspace().await?;
        ws.require_login()?;
        let service = ws.materials();

        match command {
            SubjectsCommand::List { scope, page } => {
                let query = material_query(MaterialKind::All, &scope, &page.search);
                let subjects = service.list_subjects(&query).await?;
                if subjects.is_empty() {
                    self.ui.info("No subjects yet");
                    return Ok(());
                }
                let mut view = ListView::new(subjects, ws.page_size(&page));
                view.goto(page.page);
                self.render_materials(&view.current_page());
                Ok(())
            }
            SubjectsCommand::Create {
                name,
                program,
                course,
                status,
            } => {
                let request = CreateSubjectRequest {
                    subject_name: name.trim().to_string(),
                    program_id: RecordId::new(program),
                    course_id: RecordId::new(course),
                    status,
                };
                let saved = service.create_subject(&request).await?;
                self.saved_material(saved, "Subject created");
                Ok(())
            }
            SubjectsCommand::Update { id, name, status } => {
                if name.is_none() && status.is_none() {
                    return Err(DeskError::validation("Nothing to update"));
                }
                let request = UpdateSubjectRequest {
                    subject_name: name,
                    status,
                };
                let saved = service.update_subject(&record_id(&id)?, &request).await?;
                self.saved_material(saved, "Subject updated");
                Ok(())
            }
            SubjectsCommand::Delete { id, force } => {
                let id = record_id(&id)?;
                if !self.confirm(&format!("Delete subject {}?", id), force)? {
                    return Ok(());
                }
                service.delete_subject(&id).await?;
                self.ui.success(&format!("Subject {} deleted", id));
                Ok(())
            }
        }
    }

    // ==================== Syllabus ====================

    fn render_syllabuses(&self, page: &Page<Syllabus>) {
        let name = |name: &Option<String>, id: &Option<RecordId>| {
            name.clone().unwrap_or_else(|| id_text(id))
        };
        let rows: Vec<Vec<String>> = page
            .items
            .iter()
            .map(|s| {
                vec![
                    s.id.to_string(),
                    s.title.clone(),
                    name(&s.program_name, &s.program_id),
                    name(&s.course_name, &s.course_id),
                    name(&s.subject_name, &s.subject_id),
                    self.ui.format_field(s.file_name.as_deref()),
                    date(s.created_at),
                ]
            })
            .collect();
        self.ui.table(
            &["ID", "Title", "Program", "Course", "Subject", "File", "Created"],
            &rows,
        );
        self.ui.pagination_footer(page);
    }

    fn syllabus_card(&self, syllabus: &Syllabus) {
        let name = |name: &Option<String>, id: &Option<RecordId>| match (name, id) {
            (Some(name), Some(id)) => format!("{} ({})", name, id),
            (None, id) => id_text(id),
            (Some(name), None) => name.clone(),
        };
        self.ui.card(
            &syllabus.title,
            vec![
                ("ID", syllabus.id.to_string()),
                ("Program", name(&syllabus.program_name, &syllabus.program_id)),
                ("Course", name(&syllabus.course_name, &syllabus.course_id)),
                ("Subject", name(&syllabus.subject_name, &syllabus.subject_id)),
                ("File", self.ui.format_field(syllabus.file_name.as_deref())),
                ("Path", self.ui.format_field(syllabus.file_path.as_deref())),
                ("Created", date(syllabus.created_at)),
                ("Description", self.ui.format_field(syllabus.description.as_deref())),
            ],
        );
    }

    fn saved_syllabus(&self, saved: Option<Syllabus>, message: &str) {
        self.ui.success(message);
        if let Some(syllabus) = saved {
            self.syllabus_card(&syllabus);
        }
    }

    /// Name lookups are best-effort; rows render with IDs without them
    async fn lookups(&self, ws: &Workspace) -> Option<ReferenceLookups> {
        let mut reference = ws.reference();
        match ReferenceLookups::load(&mut reference).await {
            Ok(lookups) => Some(lookups),
            Err(e) => {
                tracing::debug!("Reference lookups unavailable: {}", e);
                None
            }
        }
    }

    async fn handle_syllabus(&mut self, command: SyllabusCommand) -> Result<()> {
        let ws = self.workspace().await?;
        ws.require_login()?;
        let service = SyllabusService::new(Arc::clone(&ws.client));

        match command {
            SyllabusCommand::List { scope, page } => {
                let filter = SyllabusFilter {
                    program_id: optional_id(&scope.program),
                    course_id: optional_id(&scope.course),
                    subject_id: optional_id(&scope.subject),
                };
                let (rows, lookups) = tokio::join!(service.list(&filter), self.lookups(&ws));

                let mut catalog = SyllabusCatalog::new();
                catalog.set_syllabuses(rows?);
                if let Some(lookups) = lookups {
                    catalog.set_lookups(lookups);
                }
                if !catalog.is_enriched() {
                    self.ui
                        .warning("Program, course and subject names unavailable; showing IDs");
                }
                if catalog.syllabuses().is_empty() {
                    self.ui.info("No syllabuses yet");
                    return Ok(());
                }

                let mut view = ListView::new(catalog.into_syllabuses(), ws.page_size(&page));
                view.set_search(page.search.clone().unwrap_or_default());
                view.goto(page.page);
                self.render_syllabuses(&view.current_page());
                Ok(())
            }
            SyllabusCommand::Show { id } => {
                let mut syllabus = service.get(&record_id(&id)?).await?;
                if let Some(lookups) = self.lookups(&ws).await {
                    lookups.enrich(&mut syllabus);
                }
                self.syllabus_card(&syllabus);
                Ok(())
            }
            SyllabusCommand::Create(args) => {
                let saved = service.create(&syllabus_request(&args)).await?;
                self.saved_syllabus(saved, "Syllabus created");
                Ok(())
            }
            SyllabusCommand::Upload { file, syllabus } => {
                let spinner = ui::create_spinner(&format!("Uploading {}", file.display()));
                let result = service.upload(&syllabus_request(&syllabus), &file).await;
                spinner.finish_and_clear();
                self.saved_syllabus(result?, "Syllabus uploaded");
                Ok(())
            }
            SyllabusCommand::Update {
                id,
                title,
                description,
                scope,
            } => {
                let request = UpdateSyllabusRequest {
                    title,
                    description,
                    program_id: optional_id(&scope.program),
                    course_id: optional_id(&scope.course),
                    subject_id: optional_id(&scope.subject),
                };
                let nothing = request.title.is_none()
                    && request.description.is_none()
                    && request.program_id.is_none()
                    && request.course_id.is_none()
                    && request.subject_id.is_none();
                if nothing {
                    return Err(DeskError::validation("Nothing to update"));
                }
                let saved = service.update(&record_id(&id)?, &request).await?;
                self.saved_syllabus(saved, "Syllabus updated");
                Ok(())
            }
            SyllabusCommand::Delete { id, force } => {
                let id = record_id(&id)?;
                if !self.confirm(&format!("Delete syllabus {}?", id), force)? {
                    return Ok(());
                }
                service.delete(&id).await?;
                self.ui.success(&format!("Syllabus {} deleted", id));
                Ok(())
            }
            SyllabusCommand::Download { id, output } => {
                let id = record_id(&id)?;
                let destination = match output {
                    Some(path) => path,
                    None => {
                        let syllabus = service.get(&id).await?;
                        PathBuf::from(
                            syllabus
                                .file_name
                                .unwrap_or_else(|| format!("syllabus-{}.pdf", id)),
                        )
                    }
                };

                let spinner = ui::create_spinner(&format!("Downloading syllabus {}", id));
                let result = service.download(&id, &destination).await;
                spinner.finish_and_clear();
                let bytes = result?;
                self.ui.success(&format!(
                    "Saved {} ({})",
                    destination.display(),
                    ui::format_bytes(bytes)
                ));
                Ok(())
            }
        }
    }

    // ==================== Payments ====================

    fn render_transactions(&self, page: &Page<Transaction>) {
        let rows: Vec<Vec<String>> = page
            .items
            .iter()
            .map(|t| {
                vec![
                    t.id.to_string(),
                    t.user_name.clone(),
                    t.user_email.clone(),
                    t.course_title.clone(),
                    t.amount.to_string(),
                    self.ui.format_transaction_status(&t.status),
                    date(t.created_at),
                ]
            })
            .collect();
        self.ui.table(
            &["ID", "Student", "Email", "Course", "Amount", "Status", "Date"],
            &rows,
        );
        self.ui.pagination_footer(page);
    }

    fn transaction_card(&self, transaction: &Transaction) {
        self.ui.card(
            &format!("Transaction {}", transaction.id),
            vec![
                ("Student", transaction.user_name.clone()),
                ("Email", self.ui.format_field(Some(transaction.user_email.as_str()).filter(|e| !e.is_empty()))),
                ("Course", transaction.course_title.clone()),
                ("Amount", transaction.amount.to_string()),
                ("Status", self.ui.format_transaction_status(&transaction.status)),
                ("Date", date(transaction.created_at)),
            ],
        );
    }

    async fn handle_payments(&mut self, command: PaymentsCommand) -> Result<()> {
        let ws = self.workspace().await?;
        let service = PaymentService::new(Arc::clone(&ws.client), ws.config.data_source);

        match command {
            PaymentsCommand::Stats { page } => {
                ws.require_login_unless_fixture()?;
                let dashboard = service.get_payment_stats().await?;
                let stats = &dashboard.stats;

                self.ui.card(
                    "Payments",
                    vec![
                        ("Data", self.ui.format_origin(dashboard.origin)),
                        ("Transactions", stats.total_transactions.to_string()),
                        ("Revenue", stats.total_revenue.to_string()),
                        ("Completed", stats.completed_transactions.to_string()),
                        ("Pending", stats.pending_transactions.to_string()),
                        ("Failed", stats.failed_transactions.to_string()),
                        ("Average value", stats.average_transaction_value.to_string()),
                    ],
                );

                if dashboard.transactions.is_empty() {
                    self.ui.info("No transactions yet");
                    return Ok(());
                }
                let mut view = ListView::new(dashboard.transactions, ws.page_size(&page));
                view.set_search(page.search.clone().unwrap_or_default());
                view.goto(page.page);
                self.render_transactions(&view.current_page());
                Ok(())
            }
            PaymentsCommand::Show { id } => {
                ws.require_login_unless_fixture()?;
                let transaction = service.get_transaction(&record_id(&id)?).await?;
                self.transaction_card(&transaction);
                Ok(())
            }
            PaymentsCommand::Update {
                id,
                status,
                amount_paid,
                remarks,
            } => {
                ws.require_login()?;
                let request = UpdateTransactionRequest {
                    status,
                    amount_paid,
                    remarks,
                };
                let id = record_id(&id)?;
                match service.update_transaction(&id, &request).await? {
                    Some(transaction) => {
                        self.ui.success("Transaction updated");
                        self.transaction_card(&transaction);
                    }
                    None => self.ui.success(&format!("Transaction {} updated", id)),
                }
                Ok(())
            }
        }
    }

    // ==================== Catalog ====================

    /// Resolve a program given by ID or by name
    fn resolve_program(cascade: &Cascade, raw: &str) -> Result<RecordId> {
        if let Some(program) = cascade.programs().iter().find(|p| p.id.as_str() == raw.trim()) {
            return Ok(program.id.clone());
        }
        cascade
            .program_named(raw)
            .map(|p| p.id.clone())
            .ok_or_else(|| DeskError::not_found(format!("program '{}'", raw)))
    }

    async fn handle_catalog(&mut self, command: CatalogCommand) -> Result<()> {
        let ws = self.workspace().await?;
        ws.require_login_unless_fixture()?;
        let mut loader = ws.reference();
        let mut cascade = Cascade::load(&mut loader).await?;

        match command {
            CatalogCommand::Programs => {
                let rows: Vec<Vec<String>> = cascade
                    .programs()
                    .iter()
                    .map(|p| vec![p.id.to_string(), p.name.clone(), p.status.to_string()])
                    .collect();
                self.ui.table(&["ID", "Program", "Status"], &rows);
            }
            CatalogCommand::Courses { program } => {
                let program = Self::resolve_program(&cascade, &program)?;
                cascade.select_program(&mut loader, &program).await?;
                let rows: Vec<Vec<String>> = cascade
                    .courses()
                    .iter()
                    .map(|c| vec![c.id.to_string(), c.name.clone(), c.status.to_string()])
                    .collect();
                self.ui.table(&["ID", "Course", "Status"], &rows);
            }
            CatalogCommand::Subjects { program, course } => {
                let program = Self::resolve_program(&cascade, &program)?;
                cascade.select_program(&mut loader, &program).await?;
                cascade.select_course(&mut loader, &record_id(&course)?).await?;
                let rows: Vec<Vec<String>> = cascade
                    .subjects()
                    .iter()
                    .map(|s| vec![s.id.to_string(), s.name.clone(), s.status.to_string()])
                    .collect();
                self.ui.table(&["ID", "Subject", "Status"], &rows);
            }
            CatalogCommand::Tree { program } => {
                let programs: Vec<RecordId> = match program {
                    Some(raw) => vec![Self::resolve_program(&cascade, &raw)?],
                    None => cascade.programs().iter().map(|p| p.id.clone()).collect(),
                };
                self.print_tree(&mut loader, &mut cascade, &programs).await?;
            }
        }
        Ok(())
    }

    async fn print_tree(
        &self,
        loader: &mut ReferenceService<HttpClient>,
        cascade: &mut Cascade,
        programs: &[RecordId],
    ) -> Result<()> {
        for program_id in programs {
            cascade.select_program(loader, program_id).await?;
            let name = cascade
                .programs()
                .iter()
                .find(|p| &p.id == program_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| program_id.to_string());
            self.ui.header(&name);

            let courses = cascade.courses().to_vec();
            for course in &courses {
                println!("  {} [{}]", course.name, course.id);
                match cascade.select_course(loader, &course.id).await {
                    Ok(()) => {
                        for subject in cascade.subjects() {
                            println!("      {} [{}]", subject.name, subject.id);
                        }
                    }
                    Err(e) if e.is_auth_error() => return Err(e),
                    Err(e) => self.ui.warning(&format!("    subjects unavailable: {}", e)),
                }
            }
            if courses.is_empty() {
                println!("  (no courses)");
            }
        }
        cascade.clear_program();
        Ok(())
    }

    // ==================== Browse ====================

    /// Interactive search: each input line is a search term, debounced;
    /// responses to superseded terms are dropped
    async fn handle_browse(&mut self, args: BrowseArgs) -> Result<()> {
        let ws = self.workspace().await?;
        ws.require_login()?;

        let service = Arc::new(ws.materials());
        let debouncer = Debouncer::new(ws.config.debounce());
        let mut view: ListView<Material> = ListView::new(Vec::new(), ws.config.page_size);

        self.ui
            .info("Type a search term and press Enter. ':n' / ':p' page, ':q' quits.");

        let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
        let (command_tx, mut command_rx) = mpsc::channel::<String>(8);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let target = if line.trim_start().starts_with(':') {
                    &command_tx
                } else {
                    &line_tx
                };
                if target.send(line).await.is_err() {
                    break;
                }
            }
        });

        let (settled_tx, mut settled_rx) = mpsc::channel::<String>(8);
        tokio::spawn(async move {
            while let Some(term) = debouncer.next(&mut line_rx).await {
                if settled_tx.send(term).await.is_err() {
                    break;
                }
            }
        });

        let sequencer = RequestSequencer::new();
        let mut gate = LatestOnly::new(sequencer.clone());
        let (result_tx, mut result_rx) =
            mpsc::channel::<(Ticket, String, Result<MaterialListing>)>(8);

        let search = |term: String| {
            let ticket = sequencer.issue();
            let query = MaterialQuery {
                kind: args.kind,
                search: Some(term.trim().to_string()).filter(|t| !t.is_empty()),
                ..MaterialQuery::default()
            };
            let service = Arc::clone(&service);
            let tx = result_tx.clone();
            tracing::debug!("Search #{} for '{}'", ticket.value(), term);
            tokio::spawn(async move {
                let result = service.list(&query).await;
                let _ = tx.send((ticket, term, result)).await;
            });
        };

        search(String::new());
        let mut in_flight = 1usize;
        let mut terms_open = true;
        let mut commands_open = true;

        loop {
            tokio::select! {
                term = settled_rx.recv(), if terms_open => match term {
                    Some(term) => {
                        search(term);
                        in_flight += 1;
                    }
                    None => terms_open = false,
                },
                command = command_rx.recv(), if commands_open => match command.as_deref().map(str::trim) {
                    Some(":q") => break,
                    Some(":n") if view.current_page().has_next() => {
                        view.next_page();
                        self.render_materials(&view.current_page());
                    }
                    Some(":p") if view.current_page().has_previous() => {
                        view.previous_page();
                        self.render_materials(&view.current_page());
                    }
                    Some(":n") | Some(":p") => self.ui.info("No more pages that way"),
                    Some(other) => self.ui.warning(&format!("Unknown command {}", other)),
                    None => commands_open = false,
                },
                Some((ticket, term, result)) = result_rx.recv(), if in_flight > 0 => {
                    in_flight -= 1;
                    match gate.accept(ticket, result) {
                        Some(Ok(listing)) => {
                            self.report_listing(&listing);
                            view.set_items(listing.materials);
                            view.set_search(term);
                            self.render_materials(&view.current_page());
                        }
                        Some(Err(e)) if e.is_auth_error() => return Err(e),
                        Some(Err(e)) if e.is_retryable() => {
                            self.ui.error(&format!("Search failed: {}. Enter the term again to retry.", e))
                        }
                        Some(Err(e)) => self.ui.error(&format!("Search failed: {}", e)),
                        None => {}
                    }
                },
                else => break,
            }

            if !terms_open && in_flight == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Handle config command
    async fn handle_config(&mut self, args: ConfigArgs) -> Result<()> {
        let config = self.load_config().await?;
        let mut service = if let Some(path) = self.config_path.clone() {
            ConfigService::with_config_path(config, path)
        } else {
            ConfigService::new(config)
        };
        service.handle_config(args.command).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_ids_are_rejected_up_front() {
        assert!(record_id("  ").is_err());
        assert_eq!(record_id("42").unwrap().as_str(), "42");
        assert_eq!(optional_id(&Some(String::new())), None);
        assert_eq!(optional_id(&None), None);
    }

    #[test]
    fn material_query_drops_blank_search() {
        let scope = ScopeArgs {
            program: Some("1".to_string()),
            course: None,
            subject: Some(" ".to_string()),
        };
        let query = material_query(MaterialKind::Video, &scope, &Some("   ".to_string()));

        assert_eq!(query.kind, MaterialKind::Video);
        assert_eq!(query.program_id, Some(RecordId::new("1")));
        assert_eq!(query.subject_id, None);
        assert_eq!(query.search, None);
    }

    #[test]
    fn create_args_become_active_requests() {
        let args = MaterialCreateArgs {
            name: "  Algebra notes ".to_string(),
            material_type: branchdesk_protocol::common::MaterialType::Document,
            program: "1".to_string(),
            course: "101".to_string(),
            subject: "7".to_string(),
            description: None,
            link: None,
            access_level: "public".to_string(),
        };
        let request = material_request(&args);

        assert_eq!(request.material_name, "Algebra notes");
        assert_eq!(request.status, RecordStatus::Active);
        assert_eq!(request.course_id, RecordId::new("101"));
    }

    #[test]
    fn missing_dates_render_as_dash() {
        assert_eq!(date(None), "-");
        assert_eq!(id_text(&None), "-");
    }
}
