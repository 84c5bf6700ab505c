//! Local mirror of the server's cruise-config and the fetch/upload protocol.
//!
//! # Protocol
//!
//! 1. `needs_fetch` starts `true`.
//! 2. [`ConfigClient::fetch`] (only when `needs_fetch`) GETs the XML, keeps a
//!    SHA-256 of its serialised form as the upload baseline and the
//!    `X-Cruise-Config-MD5` header as the concurrency token.
//! 3. Every non-GET/HEAD [`ConfigClient::request`] sets `needs_fetch` before
//!    the call goes out.
//! 4. [`ConfigClient::upload_full_document`] posts the document back only if
//!    its digest differs from the baseline, and refuses while `needs_fetch`
//!    is set.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use gocdpb_core::{
    insert_pipeline, ConcurrencyToken, ConfigDocument, EnvironmentPlacement, PipelineDefinition,
    ServerSettings, TEST_SECTIONS,
};

use crate::error::ServerError;
use crate::observer::{CreatedPipeline, ObserverId, PipelineObserver};
use crate::transport::{HttpRequest, HttpResponse, Method, RequestBody, Transport, UreqTransport};

pub const CONFIG_XML_GET_PATH: &str = "/admin/restful/configuration/file/GET/xml";
pub const CONFIG_XML_POST_PATH: &str = "/admin/restful/configuration/file/POST/xml";
pub const CONFIG_MD5_HEADER: &str = "X-Cruise-Config-MD5";

pub struct ConfigClient {
    transport: Box<dyn Transport>,
    base_url: String,
    authorization: Option<String>,
    document: Option<ConfigDocument>,
    baseline: Option<String>,
    token: Option<ConcurrencyToken>,
    needs_fetch: bool,
    observers: Vec<(ObserverId, Box<dyn PipelineObserver>)>,
    next_observer: u64,
}

impl ConfigClient {
    pub fn new(settings: &ServerSettings, transport: Box<dyn Transport>) -> Self {
        let authorization = settings.credentials.as_ref().map(|credentials| {
            let pair = format!("{}:{}", credentials.username, credentials.password);
            format!("Basic {}", STANDARD.encode(pair))
        });
        Self {
            transport,
            base_url: settings.base_url.clone(),
            authorization,
            document: None,
            baseline: None,
            token: None,
            needs_fetch: true,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Client over a real HTTP agent honouring the configured timeout.
    pub fn connect(settings: &ServerSettings) -> Self {
        Self::new(settings, Box::new(UreqTransport::new(settings.timeout)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn add_observer(&mut self, observer: Box<dyn PipelineObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    /// Stop notifying the observer registered as `id`. Returns whether it
    /// was still registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub(crate) fn notify_created(&mut self, pipeline: &CreatedPipeline) {
        debug!(pipeline = %pipeline.name, stages = ?pipeline.stages, "pipeline created");
        for (_, observer) in &mut self.observers {
            observer.pipeline_created(pipeline);
        }
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    pub fn needs_fetch(&self) -> bool {
        self.needs_fetch
    }

    /// Force the next [`ConfigClient::fetch`] to hit the server.
    pub fn invalidate(&mut self) {
        self.needs_fetch = true;
    }

    pub fn document(&self) -> Option<&ConfigDocument> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Result<&mut ConfigDocument, ServerError> {
        self.document.as_mut().ok_or(ServerError::NoDocument)
    }

    pub fn token(&self) -> Option<&ConcurrencyToken> {
        self.token.as_ref()
    }

    /// Serialised form of the current document.
    pub fn cruise_xml(&self) -> Result<String, ServerError> {
        self.document
            .as_ref()
            .map(ConfigDocument::serialize)
            .ok_or(ServerError::NoDocument)
    }

    /// The `pipelines`/`templates`/`environments` subset of the document.
    pub fn cruise_xml_subset(&self) -> Result<String, ServerError> {
        self.document
            .as_ref()
            .map(ConfigDocument::subset_for_testing)
            .ok_or(ServerError::NoDocument)
    }

    /// `true` when the document differs from what was fetched.
    pub fn needs_upload(&self) -> bool {
        match (&self.document, &self.baseline) {
            (Some(document), Some(baseline)) => digest(&document.serialize()) != *baseline,
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Send one request. Non-200 answers are logged and returned, not raised.
    pub fn request(
        &mut self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: RequestBody,
    ) -> Result<HttpResponse, ServerError> {
        if !method.is_read_only() {
            self.needs_fetch = true;
        }

        let url = format!("{}{}", self.base_url, path);
        let mut all_headers: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        if let Some(authorization) = &self.authorization {
            all_headers.push(("Authorization".to_string(), authorization.clone()));
        }

        debug!(%method, %url, "request");
        let response = self.transport.send(&HttpRequest {
            method,
            url: url.clone(),
            headers: all_headers,
            body,
        })?;
        if !response.is_ok() {
            error!(%method, %url, status = response.status, body = %response.body, "request failed");
        }
        Ok(response)
    }

    /// Like [`ConfigClient::request`], but a non-200 answer is an error.
    pub(crate) fn request_ok(
        &mut self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: RequestBody,
    ) -> Result<HttpResponse, ServerError> {
        let response = self.request(method, path, headers, body)?;
        if response.is_ok() {
            Ok(response)
        } else {
            Err(remote(method, path, response))
        }
    }

    // -----------------------------------------------------------------------
    // Fetch / upload
    // -----------------------------------------------------------------------

    /// Fetch the configuration if the local copy may be stale.
    pub fn fetch(&mut self) -> Result<(), ServerError> {
        if !self.needs_fetch {
            return Ok(());
        }
        let response = self.request_ok(Method::Get, CONFIG_XML_GET_PATH, &[], RequestBody::Empty)?;
        let token = response
            .header(CONFIG_MD5_HEADER)
            .ok_or(ServerError::MissingHeader {
                header: CONFIG_MD5_HEADER,
                path: CONFIG_XML_GET_PATH.to_string(),
            })?
            .to_string();
        let document = ConfigDocument::parse(&response.body)?;

        self.baseline = Some(digest(&document.serialize()));
        self.document = Some(document);
        self.token = Some(ConcurrencyToken(token));
        self.needs_fetch = false;
        debug!("configuration fetched");
        Ok(())
    }

    /// Fetch unconditionally, tolerating a non-200 answer: a fresh server may
    /// not have a configuration yet. `needs_fetch` stays set after such an
    /// answer, so the next [`ConfigClient::fetch`] tries again.
    pub fn refresh(&mut self) -> Result<(), ServerError> {
        self.needs_fetch = true;
        match self.fetch() {
            Err(e) if e.is_remote() => {
                warn!("could not fetch configuration, it might not exist yet: {e}");
                Ok(())
            }
            other => other,
        }
    }

    /// Post the whole document back. Returns `false` when there was nothing
    /// to upload.
    pub fn upload_full_document(&mut self) -> Result<bool, ServerError> {
        if !self.needs_upload() {
            info!("no changes done, not uploading config");
            return Ok(false);
        }
        if self.needs_fetch {
            return Err(ServerError::StaleDocument);
        }
        let token = self.token.clone().ok_or(ServerError::NoDocument)?;
        let xml = self.cruise_xml()?;

        let response = self.request(
            Method::Post,
            CONFIG_XML_POST_PATH,
            &[("Confirm", "true")],
            RequestBody::Form(vec![
                ("xmlFile".to_string(), xml),
                ("md5".to_string(), token.0),
            ]),
        )?;
        if !response.is_ok() {
            match parse_json(CONFIG_XML_POST_PATH, &response.body) {
                Ok(details) => {
                    error!(result = %details["result"], "configuration upload rejected");
                    error!("originalContent:\n{}", details["originalContent"]);
                }
                Err(e) => error!("could not parse upload error body: {e}"),
            }
            return Err(remote(Method::Post, CONFIG_XML_POST_PATH, response));
        }
        info!("configuration uploaded");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Document edits
    // -----------------------------------------------------------------------

    /// Build `definition` into the document, upload, and notify observers.
    pub fn insert_pipeline(
        &mut self,
        definition: &PipelineDefinition,
    ) -> Result<EnvironmentPlacement, ServerError> {
        self.fetch()?;
        let placement = insert_pipeline(self.document_mut()?, definition)?;
        self.upload_full_document()?;
        self.notify_created(&CreatedPipeline {
            name: definition.name().to_string(),
            stages: definition.stage_names(),
        });
        Ok(placement)
    }

    /// Replace the test sections with those of `xml` and upload.
    pub fn apply_test_config(&mut self, xml: &str) -> Result<bool, ServerError> {
        self.fetch()?;
        self.document_mut()?.replace_sections(xml, &TEST_SECTIONS)?;
        self.upload_full_document()
    }
}

fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn remote(method: Method, path: &str, response: HttpResponse) -> ServerError {
    ServerError::Remote {
        method,
        path: path.to_string(),
        status: response.status,
        body: response.body,
    }
}

/// The server escapes single quotes as `\'`, which is not valid JSON.
pub(crate) fn parse_json(path: &str, body: &str) -> Result<Value, ServerError> {
    serde_json::from_str(&body.replace("\\'", "'")).map_err(|source| ServerError::Json {
        path: path.to_string(),
        source,
    })
}
