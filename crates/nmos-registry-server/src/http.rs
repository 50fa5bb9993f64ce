// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP front end: converts wire requests to [`ApiRequest`] and
//! [`ApiResponse`] back to wire responses.

use crate::server::RegistryServer;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method as HttpMethod, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use nmos_registry::{ApiRequest, ApiResponse, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Router sending every request to the registry.
pub fn router(server: RegistryServer) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

async fn dispatch(
    State(server): State<RegistryServer>,
    method: HttpMethod,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let response = match to_api_request(&method, &uri, &headers, &body) {
        Ok(request) => server.handle(&request).await,
        Err(rejected) => rejected,
    };
    to_http_response(response)
}

/// Build an [`ApiRequest`]. A malformed query string or JSON body is
/// answered directly with a 400.
pub fn to_api_request(
    method: &HttpMethod,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<ApiRequest, ApiResponse> {
    let path = uri.path();
    let header_str = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).map_err(|e| {
        ApiResponse::error(400, format!("Malformed query string: {}", e.body_text()), path)
    })?;
    let mut request = ApiRequest::new(Method::from_name(method.as_str()), path).with_query(pairs);
    if let Some(content_type) = header_str(header::CONTENT_TYPE) {
        request = request.with_content_type(content_type);
    }
    if let Some(host) = header_str(header::HOST) {
        request = request.with_host(host);
    }

    if !body.is_empty() && request.is_json() {
        let value = serde_json::from_slice(body).map_err(|e| {
            ApiResponse::error(400, format!("Request body is not valid JSON: {}", e), path)
        })?;
        request.body = Some(value);
    }
    Ok(request)
}

/// Convert an [`ApiResponse`] to a wire response.
pub fn to_http_response(response: ApiResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut http = match response.body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    };
    for (name, value) in &response.headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                http.headers_mut().append(name, value);
            }
            _ => tracing::warn!(header = %name, "dropping header that is not valid HTTP"),
        }
    }
    http
}
