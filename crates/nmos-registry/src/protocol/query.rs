// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Query API: paged listings and single-resource reads.

use super::{
    parse_id, resolve, ApiRequest, ApiResponse, StoreOutcome, StoreRequest, StoreSuccess, Translation,
    Translator,
};
use crate::model::{ApiVersion, ResourceType, Role};
use serde_json::Value;

const BASE_LISTING: [&str; 6] = [
    "flows/",
    "sources/",
    "nodes/",
    "devices/",
    "senders/",
    "receivers/",
];

/// Host used in pagination links when the request carries none.
const DEFAULT_HOST: &str = "localhost";

/// Query API translator.
#[derive(Debug, Clone)]
pub struct QueryApi {
    versions: Vec<ApiVersion>,
}

impl QueryApi {
    pub fn new(max_api_version: ApiVersion) -> Self {
        Self {
            versions: ApiVersion::up_to(max_api_version),
        }
    }

    fn route(&self, request: &ApiRequest) -> Result<Translation, ApiResponse> {
        let scope = resolve(request, &self.versions, &BASE_LISTING)?;
        let Some((head, rest)) = scope.segments.split_first() else {
            return Ok(Translation::Respond(ApiResponse::listing(&BASE_LISTING)));
        };
        let resource_type = ResourceType::from_plural(head).ok_or_else(|| {
            ApiResponse::error(
                404,
                format!("Received request for unknown resource type {}.", head),
                request.path.clone(),
            )
        })?;
        if !request.is_get() {
            return Err(ApiResponse::error(
                400,
                format!("The Query API does not accept {} requests on {}.", request.method, head),
                request.path.clone(),
            ));
        }

        Ok(Translation::Store(match parse_id(request, head, rest)? {
            Some(id) => StoreRequest::Read { resource_type, id },
            None => StoreRequest::Query {
                resource_type,
                params: request.query.clone(),
            },
        }))
    }

    /// Collection URL that pagination links point at.
    fn collection_url(request: &ApiRequest, resource_type: ResourceType) -> String {
        let version = request
            .route
            .as_ref()
            .and_then(|r| r.version.as_deref())
            .unwrap_or(ApiVersion::default().as_str());
        format!(
            "http://{}/x-nmos/query/{}/{}/",
            request.host.as_deref().unwrap_or(DEFAULT_HOST),
            version,
            resource_type.plural()
        )
    }
}

impl Translator for QueryApi {
    fn role(&self) -> Role {
        Role::Query
    }

    fn translate(&self, request: &ApiRequest) -> Translation {
        self.route(request).unwrap_or_else(Translation::Respond)
    }

    fn complete(&self, request: &ApiRequest, outcome: StoreOutcome) -> ApiResponse {
        match outcome {
            Ok(StoreSuccess::Read(read)) => ApiResponse::ok(read.payload),
            Ok(StoreSuccess::Page(page)) => {
                let resource_type = request
                    .segments()
                    .first()
                    .and_then(|s| ResourceType::from_plural(s))
                    .unwrap_or(ResourceType::Node);
                let headers = page.headers(&Self::collection_url(request, resource_type));
                ApiResponse {
                    status: 200,
                    headers,
                    body: Some(Value::Array(page.items)),
                }
            }
            Ok(_) => ApiResponse::error(
                500,
                "Unexpected store outcome for a query request.",
                request.path.clone(),
            ),
            Err(err) => ApiResponse::store_error(&err, request.path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{QueryPage, ReadResult, StoreKey};
    use serde_json::json;

    const ID: &str = "3b8be755-08ff-452b-b217-c9151eb21193";

    fn api() -> QueryApi {
        QueryApi::new(ApiVersion::V1_2)
    }

    #[test]
    fn test_listings_and_unknown_resource() {
        match api().translate(&ApiRequest::get("/x-nmos/query/v1.2")) {
            Translation::Respond(resp) => assert_eq!(resp.body.unwrap().as_array().unwrap().len(), 6),
            other => panic!("unexpected {:?}", other),
        }
        match api().translate(&ApiRequest::get("/x-nmos/query/v1.2/widgets")) {
            Translation::Respond(resp) => assert_eq!(resp.status, 404),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_list_and_read_translation() {
        let req = ApiRequest::get("/x-nmos/query/v1.2/flows").query_pair("paging.limit", "5");
        assert_eq!(
            api().translate(&req),
            Translation::Store(StoreRequest::Query {
                resource_type: ResourceType::Flow,
                params: vec![("paging.limit".into(), "5".into())],
            })
        );

        let req = ApiRequest::get(format!("/x-nmos/query/v1.2/flows/{}", ID));
        assert!(matches!(api().translate(&req), Translation::Store(StoreRequest::Read { .. })));

        let req = ApiRequest::get("/x-nmos/query/v1.2/flows/not-a-uuid");
        assert!(matches!(api().translate(&req), Translation::Respond(ApiResponse { status: 400, .. })));
    }

    #[test]
    fn test_complete_outcomes() {
        let req = ApiRequest::get(format!("/x-nmos/query/v1.2/nodes/{}", ID));
        let read = ReadResult {
            key: StoreKey::new(ResourceType::Node, ID, "1:0".parse().unwrap()),
            api_version: ApiVersion::V1_2,
            payload: json!({ "id": ID }),
        };
        assert_eq!(api().complete(&req, Ok(StoreSuccess::Read(read))).status, 200);

        let missing = StoreError::NotFound {
            resource_type: ResourceType::Node,
            id: ID.into(),
        };
        assert_eq!(api().complete(&req, Err(missing)).status, 404);

        let list = ApiRequest::get("/x-nmos/query/v1.1/nodes").with_host("registry:8080");
        let page = QueryPage {
            items: vec![],
            limit: 10,
            anchors: None,
        };
        let resp = api().complete(&list, Ok(StoreSuccess::Page(page)));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, Some(json!([])));
        assert_eq!(resp.header("X-Paging-Limit"), Some("10"));
        assert!(resp.header("Link").is_none());

        assert_eq!(
            QueryApi::collection_url(&list, ResourceType::Node),
            "http://registry:8080/x-nmos/query/v1.1/nodes/"
        );

        let rql = StoreError::NotImplemented {
            name: "query.rql".into(),
        };
        assert_eq!(api().complete(&list, Err(rql)).status, 501);
    }
}
