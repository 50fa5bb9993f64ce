// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request/response model and the role translators.
//!
//! An [`ApiRequest`] is what the HTTP front end hands over: method, path,
//! query pairs, content type, host and an optional JSON body. A
//! [`Translator`] turns it into either a direct [`ApiResponse`], a
//! [`StoreRequest`] or a [`HeartbeatRequest`]; for store requests it later
//! turns the [`StoreOutcome`] into the final response.

use crate::error::{ApiError, StoreError};
use crate::model::{is_valid_uuid, ApiVersion, ResourceType, Role};
use crate::store::{CreateRequest, Created, Deleted, QueryPage, ReadResult};
use serde_json::Value;
use std::fmt;

pub mod node;
pub mod query;
pub mod registration;

pub use node::NodeApi;
pub use query::QueryApi;
pub use registration::RegistrationApi;

/// Path prefix of every registry URL.
pub const PATH_PREFIX: &str = "x-nmos";

/// HTTP method of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Other,
}

impl Method {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "OPTIONS" => Self::Options,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Segments of a `/x-nmos/<api>/<version>/...` path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPath {
    pub api: Option<String>,
    pub version: Option<String>,
    /// Everything after the version segment.
    pub segments: Vec<String>,
}

impl RequestPath {
    /// Split a URL path. Returns `None` for paths outside `/x-nmos`.
    /// Empty segments (doubled or trailing slashes) are dropped.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut parts = path.split('/').filter(|s| !s.is_empty());
        if parts.next() != Some(PATH_PREFIX) {
            return None;
        }
        Some(Self {
            api: parts.next().map(str::to_string),
            version: parts.next().map(str::to_string),
            segments: parts.map(str::to_string).collect(),
        })
    }
}

/// An inbound API request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// URL path as received, reported as the debug context of errors.
    pub path: String,
    pub route: Option<RequestPath>,
    pub query: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub host: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method,
            route: RequestPath::parse(&path),
            path,
            query: Vec::new(),
            content_type: None,
            host: None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// A POST carrying a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_json(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.content_type = Some("application/json".to_string());
        self.body = Some(body);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = pairs;
        self
    }

    pub fn query_pair(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::Get
    }

    /// Whether the declared content type is JSON (parameters ignored).
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map_or(false, |ct| ct.trim().eq_ignore_ascii_case("application/json"))
    }

    pub fn segments(&self) -> &[String] {
        match &self.route {
            Some(route) => &route.segments,
            None => &[],
        }
    }
}

/// A response ready for the HTTP front end.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// `None` for bodiless responses such as 204.
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// 200 with a JSON array of path names.
    pub fn listing<S: AsRef<str>>(items: &[S]) -> Self {
        Self::ok(Value::Array(
            items
                .iter()
                .map(|s| Value::String(s.as_ref().to_string()))
                .collect(),
        ))
    }

    pub fn no_content() -> Self {
        Self {
            status: 204,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Error response with the standard `{code, error, debug}` body.
    pub fn error(status: u16, error: impl Into<String>, debug: impl Into<String>) -> Self {
        let body = ApiError::new(status, error, debug);
        Self::json(status, serde_json::to_value(body).unwrap_or(Value::Null))
    }

    /// Error response for a store failure, with the failure's own status.
    pub fn store_error(err: &StoreError, debug: impl Into<String>) -> Self {
        Self::error(err.status(), err.to_string(), debug)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Operations on the resource store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    Create(CreateRequest),
    Read {
        resource_type: ResourceType,
        id: String,
    },
    Delete {
        resource_type: ResourceType,
        id: String,
        api_version: ApiVersion,
    },
    /// List request with the raw query pairs; the store validates them.
    Query {
        resource_type: ResourceType,
        params: Vec<(String, String)>,
    },
    /// Remove a node and everything it owns.
    GarbageCollect { node_id: String },
}

/// Successful store outcomes, one per request kind.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreSuccess {
    Created(Created),
    Read(ReadResult),
    Deleted(Deleted),
    Page(QueryPage),
    Collected(Vec<Deleted>),
}

pub type StoreOutcome = Result<StoreSuccess, StoreError>;

/// What a heartbeat request asks of the liveness monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// POST: refresh last-seen.
    Renew,
    /// GET: report last-seen.
    Inspect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    pub action: HeartbeatAction,
    pub node_id: String,
}

/// Result of translating an inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Respond(ApiResponse),
    Store(StoreRequest),
    Heartbeat(HeartbeatRequest),
}

/// Maps inbound requests of one role onto store operations and responses.
pub trait Translator: Send + Sync {
    fn role(&self) -> Role;

    fn translate(&self, request: &ApiRequest) -> Translation;

    /// Turn the outcome of a store request issued by [`Translator::translate`]
    /// into the final response.
    fn complete(&self, request: &ApiRequest, _outcome: StoreOutcome) -> ApiResponse {
        ApiResponse::error(
            500,
            format!("The {} API does not issue store requests.", self.role()),
            request.path.clone(),
        )
    }
}

/// Version and remaining path segments of a request that passed the
/// shared checks.
#[derive(Debug)]
pub(crate) struct Scope<'a> {
    pub version: ApiVersion,
    pub segments: &'a [String],
}

/// Shared checks: version present and supported, resource segment present.
/// GETs on the version level or the API base get listings; anything else
/// there is a 400.
pub(crate) fn resolve<'a>(
    request: &'a ApiRequest,
    versions: &[ApiVersion],
    base_listing: &[&str],
) -> Result<Scope<'a>, ApiResponse> {
    let method = request.method;
    let debug = || request.path.clone();
    let Some(route) = request.route.as_ref() else {
        return Err(ApiResponse::error(404, "Path is not a registry resource.", debug()));
    };

    let Some(raw_version) = route.version.as_deref() else {
        return Err(if request.is_get() {
            let listed: Vec<String> = versions.iter().map(|v| format!("{}/", v)).collect();
            ApiResponse::listing(listed.as_slice())
        } else {
            ApiResponse::error(
                400,
                format!("Received {} request with no version specified in the path.", method),
                debug(),
            )
        });
    };
    let version = raw_version
        .parse::<ApiVersion>()
        .ok()
        .filter(|v| versions.contains(v))
        .ok_or_else(|| {
            ApiResponse::error(
                400,
                format!("Specified version number '{}' is not supported.", raw_version),
                debug(),
            )
        })?;

    if route.segments.is_empty() {
        return Err(if request.is_get() {
            ApiResponse::listing(base_listing)
        } else {
            ApiResponse::error(
                400,
                format!("Received {} request with no resource specified in the path.", method),
                debug(),
            )
        });
    }

    Ok(Scope {
        version,
        segments: &route.segments,
    })
}

/// Identifier from the segments following a resource name.
///
/// Extra segments are kept in the id so that they fail UUID validation.
pub(crate) fn parse_id(
    request: &ApiRequest,
    resource: &str,
    rest: &[String],
) -> Result<Option<String>, ApiResponse> {
    if rest.is_empty() {
        return Ok(None);
    }
    let id = rest.join("/");
    if !is_valid_uuid(&id) {
        return Err(ApiResponse::error(
            400,
            format!(
                "Attempt to make a {} request to resource {} with a malformed UUID.",
                request.method, resource
            ),
            request.path.clone(),
        ));
    }
    Ok(Some(id))
}
