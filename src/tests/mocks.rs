//! Mock implementations for testing

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::client::{ApiClient, ApiRequest, RequestBody};
use crate::error::{DeskError, Result};

/// What the mock saw for one request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub multipart_fields: Vec<(String, String)>,
    pub file_names: Vec<String>,
    pub tenant_scoped: bool,
}

impl RecordedRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted API client. Replies are queued per `METHOD path`; the last
/// successful reply for a route keeps replaying, errors are consumed once.
#[derive(Debug, Clone, Default)]
pub struct MockApiClient {
    replies: Arc<Mutex<HashMap<String, VecDeque<Result<Value>>>>>,
    downloads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn route(method: &Method, path: &str) -> String {
    format!("{} {}", method, path)
}

impl MockApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, path: &str, body: Value) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(route(&method, path))
            .or_default()
            .push_back(Ok(body));
        self
    }

    pub fn fail(&self, method: Method, path: &str, error: DeskError) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(route(&method, path))
            .or_default()
            .push_back(Err(error));
        self
    }

    pub fn serve_file(&self, path: &str, bytes: &[u8]) -> &Self {
        self.downloads
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn record(&self, request: &ApiRequest) {
        let (body, multipart_fields, file_names) = match &request.body {
            Some(RequestBody::Json(value)) => (Some(value.clone()), Vec::new(), Vec::new()),
            Some(RequestBody::Multipart(form)) => (
                None,
                form.fields.clone(),
                form.files.iter().map(|f| f.file_name.clone()).collect(),
            ),
            None => (None, Vec::new(), Vec::new()),
        };

        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            query: request.query.clone(),
            body,
            multipart_fields,
            file_names,
            tenant_scoped: request.tenant_scoped,
        });
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        self.record(&request);

        let key = route(&request.method, &request.path);
        let mut replies = self.replies.lock().unwrap();
        let queue = match replies.get_mut(&key) {
            Some(queue) if !queue.is_empty() => queue,
            _ => return Err(DeskError::api(404, format!("no mock reply for {}", key))),
        };

        if queue.len() == 1 {
            if let Some(Ok(body)) = queue.front() {
                return Ok(body.clone());
            }
        }
        queue
            .pop_front()
            .unwrap_or_else(|| Err(DeskError::internal("mock queue drained")))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.record(&ApiRequest::get(path));
        self.downloads
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| DeskError::not_found(path.to_string()))
    }
}
