// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Registration API: resource creation, read-back, deletion and heartbeats.

use super::{
    parse_id, resolve, ApiRequest, ApiResponse, HeartbeatAction, HeartbeatRequest, Method, StoreOutcome,
    StoreRequest, StoreSuccess, Translation, Translator,
};
use crate::model::{is_valid_uuid, ApiVersion, ResourceType, Role};
use crate::store::CreateRequest;
use serde_json::Value;

const BASE_LISTING: [&str; 2] = ["resource/", "health/"];
const HEALTH_LISTING: [&str; 1] = ["nodes/"];

/// Registration API translator.
#[derive(Debug, Clone)]
pub struct RegistrationApi {
    versions: Vec<ApiVersion>,
}

impl RegistrationApi {
    pub fn new(max_api_version: ApiVersion) -> Self {
        Self {
            versions: ApiVersion::up_to(max_api_version),
        }
    }

    /// `Location` of a registered resource.
    pub fn location(version: ApiVersion, resource_type: ResourceType, id: &str) -> String {
        format!(
            "/x-nmos/registration/{}/resource/{}/{}",
            version,
            resource_type.plural(),
            id
        )
    }

    fn route(&self, request: &ApiRequest) -> Result<Translation, ApiResponse> {
        let scope = resolve(request, &self.versions, &BASE_LISTING)?;
        let (head, rest) = match scope.segments.split_first() {
            Some(split) => split,
            None => return Ok(Translation::Respond(ApiResponse::listing(&BASE_LISTING))),
        };
        match head.as_str() {
            "resource" if rest.is_empty() => self.create(request, scope.version),
            "resource" => self.resource(request, scope.version, rest),
            "health" => self.health(request, rest),
            _ => Err(unsupported(request)),
        }
    }

    fn create(&self, request: &ApiRequest, version: ApiVersion) -> Result<Translation, ApiResponse> {
        let bad = |msg: String| ApiResponse::error(400, msg, request.path.clone());
        if request.method != Method::Post {
            return Err(bad(
                "Received non-POST request at Registration API 'resource' path.".into(),
            ));
        }
        if !request.is_json() {
            return Err(bad(format!(
                "Registration requests require content type application/json, got '{}'.",
                request.content_type.as_deref().unwrap_or("none")
            )));
        }
        let Some(body) = request.body.as_ref().and_then(Value::as_object) else {
            return Err(bad("Registration request body must be a JSON object.".into()));
        };

        let resource_type = match body.get("type") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(ResourceType::from_singular(name).ok_or_else(|| {
                bad(format!("Attempt to register a resource of unsupported type '{}'.", name))
            })?),
            Some(other) => {
                return Err(bad(format!("Registration type field '{}' is not a string.", other)));
            }
        };
        let data = body.get("data").filter(|d| !d.is_null()).cloned();

        Ok(Translation::Store(StoreRequest::Create(CreateRequest {
            resource_type,
            api_version: version,
            data,
        })))
    }

    fn resource(
        &self,
        request: &ApiRequest,
        version: ApiVersion,
        rest: &[String],
    ) -> Result<Translation, ApiResponse> {
        let (plural, tail) = rest.split_first().ok_or_else(|| unsupported(request))?;
        let resource_type = ResourceType::from_plural(plural).ok_or_else(|| unsupported(request))?;
        let id = parse_id(request, plural, tail)?.ok_or_else(|| {
            ApiResponse::error(
                400,
                format!("Attempt to make a {} request without a resource identifier.", request.method),
                request.path.clone(),
            )
        })?;

        match request.method {
            Method::Get => Ok(Translation::Store(StoreRequest::Read { resource_type, id })),
            Method::Delete => Ok(Translation::Store(StoreRequest::Delete {
                resource_type,
                id,
                api_version: version,
            })),
            method => Err(ApiResponse::error(
                400,
                format!("Received {} request for a registered resource; use GET or DELETE.", method),
                request.path.clone(),
            )),
        }
    }

    fn health(&self, request: &ApiRequest, rest: &[String]) -> Result<Translation, ApiResponse> {
        let method = request.method;
        let bad = |msg: String| ApiResponse::error(400, msg, request.path.clone());
        let Some((collection, tail)) = rest.split_first() else {
            return if request.is_get() {
                Ok(Translation::Respond(ApiResponse::listing(&HEALTH_LISTING)))
            } else {
                Err(bad(format!("Received {} request to the health service base path.", method)))
            };
        };
        if collection != "nodes" {
            return Err(unsupported(request));
        }
        if tail.is_empty() {
            return Err(bad(format!(
                "Received {} request to health service with no identifier.",
                method
            )));
        }
        let node_id = tail.join("/");
        if !is_valid_uuid(&node_id) {
            return Err(bad(format!(
                "Received {} request to health service with malformed UUID.",
                method
            )));
        }

        let action = match method {
            Method::Post => HeartbeatAction::Renew,
            Method::Get => HeartbeatAction::Inspect,
            other => {
                return Err(bad(format!("Received {} request to health service.", other)));
            }
        };
        Ok(Translation::Heartbeat(HeartbeatRequest { action, node_id }))
    }
}

fn unsupported(request: &ApiRequest) -> ApiResponse {
    ApiResponse::error(
        400,
        format!("Attempt to make a {} request to an unsupported resource type.", request.method),
        request.path.clone(),
    )
}

impl Translator for RegistrationApi {
    fn role(&self) -> Role {
        Role::Registration
    }

    fn translate(&self, request: &ApiRequest) -> Translation {
        self.route(request).unwrap_or_else(Translation::Respond)
    }

    fn complete(&self, request: &ApiRequest, outcome: StoreOutcome) -> ApiResponse {
        match outcome {
            Ok(StoreSuccess::Created(created)) => {
                let status = if created.update { 200 } else { 201 };
                let location = Self::location(
                    created.pointer.api_version,
                    created.key.resource_type,
                    &created.key.id,
                );
                ApiResponse::json(status, created.payload).with_header("Location", location)
            }
            Ok(StoreSuccess::Read(read)) => ApiResponse::ok(read.payload),
            Ok(StoreSuccess::Deleted(_)) => ApiResponse::no_content(),
            Ok(_) => ApiResponse::error(
                500,
                "Unexpected store outcome for a registration request.",
                request.path.clone(),
            ),
            Err(err) => ApiResponse::store_error(&err, request.path.clone()),
        }
    }
}
