// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node API: read-only view of the locally hosted node.

use super::{parse_id, resolve, ApiRequest, ApiResponse, Translation, Translator};
use crate::model::{ApiVersion, ResourceType, Role};
use crate::node::LocalNode;
use serde_json::Value;

const BASE_LISTING: [&str; 6] = [
    "self/",
    "sources/",
    "flows/",
    "devices/",
    "senders/",
    "receivers/",
];

/// Node API translator. Answers from the [`LocalNode`], never the store.
#[derive(Debug)]
pub struct NodeApi {
    versions: Vec<ApiVersion>,
    local: LocalNode,
}

impl NodeApi {
    pub fn new(max_api_version: ApiVersion, local: LocalNode) -> Self {
        Self {
            versions: ApiVersion::up_to(max_api_version),
            local,
        }
    }

    pub fn local(&self) -> &LocalNode {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut LocalNode {
        &mut self.local
    }

    fn route(&self, request: &ApiRequest) -> Result<ApiResponse, ApiResponse> {
        let scope = resolve(request, &self.versions, &BASE_LISTING)?;
        let Some((head, rest)) = scope.segments.split_first() else {
            return Ok(ApiResponse::listing(&BASE_LISTING));
        };
        let not_found = |what: String| ApiResponse::error(404, what, request.path.clone());

        let resource_type = match head.as_str() {
            "self" if rest.is_empty() => None,
            "self" => return Err(not_found(format!("Path {} is not served by the Node API.", request.path))),
            plural => match ResourceType::from_plural(plural) {
                Some(t) if t != ResourceType::Node => Some(t),
                _ => return Err(not_found(format!("Received request for unknown resource type {}.", plural))),
            },
        };
        if !request.is_get() {
            return Err(ApiResponse::error(
                400,
                format!("The Node API does not accept {} requests.", request.method),
                request.path.clone(),
            ));
        }

        let Some(resource_type) = resource_type else {
            return self
                .local
                .self_resource()
                .cloned()
                .map(ApiResponse::ok)
                .ok_or_else(|| not_found("The local node is not available.".into()));
        };
        match parse_id(request, head, rest)? {
            None if !request.query.is_empty() => Err(ApiResponse::error(
                501,
                "Query parameters are not implemented on the Node API.",
                request.path.clone(),
            )),
            None => Ok(ApiResponse::ok(Value::Array(self.local.list(resource_type)))),
            Some(id) => self
                .local
                .get(resource_type, &id)
                .cloned()
                .map(ApiResponse::ok)
                .ok_or_else(|| not_found(format!("Resource {}/{} is not hosted by this node.", head, id))),
        }
    }
}

impl Translator for NodeApi {
    fn role(&self) -> Role {
        Role::Node
    }

    fn translate(&self, request: &ApiRequest) -> Translation {
        Translation::Respond(self.route(request).unwrap_or_else(|resp| resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::NodeConfig;
    use crate::protocol::{Method, StoreSuccess};
    use serde_json::json;
    use std::sync::Arc;

    fn api() -> NodeApi {
        let config = NodeConfig {
            devices: 1,
            senders: 2,
            ..Default::default()
        };
        let local = LocalNode::new(&config, ApiVersion::V1_2, Arc::new(ManualClock::new(10)));
        NodeApi::new(ApiVersion::V1_2, local)
    }

    fn respond(api: &NodeApi, req: ApiRequest) -> ApiResponse {
        match api.translate(&req) {
            Translation::Respond(resp) => resp,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_self_and_listing() {
        let api = api();
        let resp = respond(&api, ApiRequest::get("/x-nmos/node/v1.2/self"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body.unwrap()["id"], api.local().id());

        let resp = respond(&api, ApiRequest::get("/x-nmos/node/v1.2/"));
        assert_eq!(
            resp.body,
            Some(json!(["self/", "sources/", "flows/", "devices/", "senders/", "receivers/"]))
        );

        let resp = respond(&api, ApiRequest::get("/x-nmos/node/v1.2/senders"));
        assert_eq!(resp.body.unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_single_resource() {
        let api = api();
        let device = api.local().list(ResourceType::Device)[0].clone();
        let id = device["id"].as_str().unwrap();
        let resp = respond(&api, ApiRequest::get(format!("/x-nmos/node/v1.2/devices/{}", id)));
        assert_eq!(resp.body, Some(device.clone()));

        let other = "3b8be755-08ff-452b-b217-c9151eb21193";
        let resp = respond(&api, ApiRequest::get(format!("/x-nmos/node/v1.2/devices/{}", other)));
        assert_eq!(resp.status, 404);

        let resp = respond(&api, ApiRequest::get("/x-nmos/node/v1.2/devices/xyz"));
        assert_eq!(resp.status, 400);
    }

    #[test]
    fn test_rejections() {
        let api = api();
        let query = ApiRequest::get("/x-nmos/node/v1.2/flows").query_pair("label", "x");
        assert_eq!(respond(&api, query).status, 501);

        assert_eq!(respond(&api, ApiRequest::get("/x-nmos/node/v1.2/nodes")).status, 404);
        assert_eq!(respond(&api, ApiRequest::get("/x-nmos/node/v1.2/widgets")).status, 404);
        assert_eq!(
            respond(&api, ApiRequest::new(Method::Put, "/x-nmos/node/v1.2/self")).status,
            400
        );
    }

    #[test]
    fn test_complete_is_unused() {
        let api = api();
        let req = ApiRequest::get("/x-nmos/node/v1.2/self");
        let resp = api.complete(&req, Ok(StoreSuccess::Collected(Vec::new())));
        assert_eq!(resp.status, 500);
    }
}
