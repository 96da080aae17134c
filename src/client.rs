//! HTTP transport for the branch portal API

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{DeskError, Result};
use crate::session::{self, SharedSession};

pub const BRANCH_CODE_HEADER: &str = "X-Branch-Code";
pub const FRANCHISE_CODE_HEADER: &str = "X-Franchise-Code";

/// One file in a multipart form
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub async fn from_path(field: &str, path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DeskError::io_from_error(format!("Failed to read {}", path.display()), e))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();

        Ok(Self {
            field: field.to_string(),
            mime: guess_mime(&file_name).to_string(),
            file_name,
            bytes,
        })
    }
}

/// Multipart body description, turned into a reqwest form at send time so
/// requests stay inspectable in tests
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    /// Add every scalar field of a serializable request as a text part
    pub fn fields_from<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        if let Value::Object(map) = serde_json::to_value(payload)? {
            for (key, value) in map {
                match value {
                    Value::Null => {}
                    Value::String(s) => self.fields.push((key, s)),
                    other => self.fields.push((key, other.to_string())),
                }
            }
        }
        Ok(self)
    }

    fn into_reqwest(self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for file in self.files {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.mime)
                .map_err(|e| DeskError::upload(format!("Invalid MIME type: {}", e)))?;
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartForm),
}

/// A request against the portal API, relative to the configured base URL
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Send the branch/franchise headers (the `branch-*` endpoints)
    pub tenant_scoped: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            tenant_scoped: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter only when `value` is present and non-blank
    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value.map(|v| v.to_string()) {
            Some(v) if !v.trim().is_empty() => self.query(key, v),
            _ => self,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn json<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.body = Some(RequestBody::Json(serde_json::to_value(payload)?));
        Ok(self)
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    pub fn tenant_scoped(mut self) -> Self {
        self.tenant_scoped = true;
        self
    }
}

/// Transport seam: services talk to this, tests substitute a mock
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Send a request and return the parsed JSON body (`null` when empty)
    async fn send(&self, request: ApiRequest) -> Result<Value>;

    /// GET a binary resource
    async fn download(&self, path: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed client with the session injected at construction
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
    session: SharedSession,
}

impl HttpClient {
    pub fn new(config: ClientConfig, session: SharedSession) -> Result<Self> {
        config.validate()?;

        let mut client_builder = Client::builder().timeout(Duration::from_secs(config.timeout));

        if !config.use_proxy {
            client_builder = client_builder.no_proxy();
        }

        let client = client_builder.build()?;

        Ok(Self {
            client,
            config,
            session,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    fn build(&self, request: ApiRequest) -> Result<reqwest::RequestBuilder> {
        let url = self.config.endpoint_url(&request.path);
        let mut builder = self.client.request(request.method, &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        {
            let store = session::lock(&self.session)?;
            if let Some(token) = store.token() {
                builder = builder.bearer_auth(token);
            }
            if request.tenant_scoped {
                if let Some(code) = store.branch_code() {
                    builder = builder.header(BRANCH_CODE_HEADER, code);
                }
                if let Some(code) = store.franchise_code() {
                    builder = builder.header(FRANCHISE_CODE_HEADER, code);
                }
            }
        }

        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            // The multipart encoder sets Content-Type with its boundary
            Some(RequestBody::Multipart(form)) => builder.multipart(form.into_reqwest()?),
            None => builder,
        };

        Ok(builder)
    }

    /// Turn a non-2xx answer into a classified error. A 401 also drops the
    /// stored token so the next command asks for a fresh login.
    fn classify_failure(&self, status: u16, body: &str) -> DeskError {
        let message = error_message(body).unwrap_or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Request failed")
                .to_string()
        });

        match status {
            401 => {
                match session::lock(&self.session).and_then(|mut s| s.clear_auth()) {
                    Ok(()) => tracing::info!("Cleared stored token after 401"),
                    Err(e) => tracing::warn!("Failed to clear stored token: {}", e),
                }
                DeskError::authentication(format!(
                    "{}. Session expired, run `branchdesk login` again.",
                    message
                ))
            }
            403 => DeskError::authorization(message),
            500..=599 => DeskError::server(status, message),
            _ => DeskError::api(status, message),
        }
    }
}

#[async_trait]
impl ApiClient for HttpClient {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        tracing::debug!("{} {}", request.method, request.path);

        let response = self.build(request)?.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(self.classify_failure(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|_| {
            DeskError::invalid_response(format!(
                "Expected JSON from the server, got: {}",
                truncate(&text, 120)
            ))
        })
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        tracing::debug!("GET {} (download)", path);

        let response = self.build(ApiRequest::get(path))?.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status.as_u16(), &text));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Pull a human-readable message out of an error body
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["detail", "message", "error"]
        .iter()
        .find_map(|key| match value.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max).collect::<String>())
    }
}

fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
