//! Scripted transport shared by the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use gocdpb_core::{Credentials, ServerSettings};
use gocdpb_server::{ConfigClient, HttpRequest, HttpResponse, Method, RequestBody, ServerError, Transport};
use serde_json::Value;

pub const BASE: &str = "http://ci:8153/go";
pub const XML_PATH_GET: &str = "/admin/restful/configuration/file/GET/xml";
pub const XML_PATH_POST: &str = "/admin/restful/configuration/file/POST/xml";

#[derive(Default)]
struct ScriptState {
    expected: VecDeque<(Method, String, HttpResponse)>,
    sent: Vec<HttpRequest>,
}

/// Answers requests from a queue of `(method, path, response)` and records
/// what was sent. Clones share the same queue.
#[derive(Clone, Default)]
pub struct Script {
    state: Rc<RefCell<ScriptState>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(&self, method: Method, path: &str, response: HttpResponse) -> &Self {
        self.state
            .borrow_mut()
            .expected
            .push_back((method, path.to_string(), response));
        self
    }

    pub fn expect_config(&self, xml: &str, md5: &str) -> &Self {
        self.expect(
            Method::Get,
            XML_PATH_GET,
            HttpResponse::new(200, xml).with_header("X-Cruise-Config-MD5", md5),
        )
    }

    pub fn expect_upload(&self) -> &Self {
        self.expect(Method::Post, XML_PATH_POST, HttpResponse::new(200, ""))
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.state.borrow().sent.clone()
    }

    pub fn remaining(&self) -> usize {
        self.state.borrow().expected.len()
    }

    /// Client authenticating as `me:secret` against [`BASE`].
    pub fn client(&self) -> ConfigClient {
        let settings = ServerSettings {
            base_url: BASE.to_string(),
            credentials: Some(Credentials {
                username: "me".to_string(),
                password: "secret".to_string(),
            }),
            timeout: None,
        };
        ConfigClient::new(&settings, Box::new(self.clone()))
    }
}

impl Transport for Script {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ServerError> {
        let mut state = self.state.borrow_mut();
        state.sent.push(request.clone());
        let Some((method, path, response)) = state.expected.pop_front() else {
            panic!("unexpected request {} {}", request.method, request.url);
        };
        assert_eq!(request.method, method, "method of {}", request.url);
        assert_eq!(request.url, format!("{BASE}{path}"));
        Ok(response)
    }
}

pub fn json_response(value: &Value) -> HttpResponse {
    HttpResponse::new(200, value.to_string())
}

/// Value of a form field of an upload request.
pub fn form_field<'a>(request: &'a HttpRequest, name: &str) -> &'a str {
    match &request.body {
        RequestBody::Form(fields) => fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .unwrap_or_else(|| panic!("no form field {name}")),
        other => panic!("expected a form body, got {other:?}"),
    }
}

pub fn json_body(request: &HttpRequest) -> Value {
    match &request.body {
        RequestBody::Json(text) => serde_json::from_str(text).expect("json body"),
        other => panic!("expected a JSON body, got {other:?}"),
    }
}

pub const CRUISE: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
<cruise schemaVersion=\"75\">\n\
  <server />\n\
  <pipelines group=\"x\">\n\
    <pipeline name=\"p\" />\n\
  </pipelines>\n\
  <pipelines group=\"y\" />\n\
  <environments>\n\
    <environment name=\"dev\" />\n\
  </environments>\n\
  <agents />\n\
</cruise>\n";
