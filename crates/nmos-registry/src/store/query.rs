// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Query parameters, basic filters and cursor pagination.
//!
//! A page holds at most `limit` items whose version lies in the window
//! `(since, until]`. Items are ordered newest first by the chosen timestamp
//! and the page is cut from the tail of that order, so a page always holds
//! the oldest items of its window.

use crate::error::StoreError;
use crate::model::{is_valid_uuid, ResourceType, VersionStamp};
use crate::store::entry::Timestamp;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Timestamp used to order query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagingOrder {
    Create,
    #[default]
    Update,
}

/// Query-language parameters that are recognized but not served.
const UNIMPLEMENTED: [&str; 4] = [
    "query.rql",
    "query.ancestry_id",
    "query.ancestry_type",
    "query.ancestry_generations",
];

fn api_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^v\d+\.\d+$").expect("api version pattern compiles"))
}

fn is_unsigned(v: &str) -> bool {
    !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit())
}

/// Checks applied to recognized parameters, in reporting order.
const PARAM_TESTS: [(&str, fn(&str) -> bool); 9] = [
    ("paging.since", VersionStamp::is_valid),
    ("paging.until", VersionStamp::is_valid),
    ("paging.limit", |v| is_unsigned(v) && v.parse::<usize>().map_or(false, |n| n > 0)),
    ("paging.order", |v| v == "create" || v == "update"),
    ("query.downgrade", |v| api_version_pattern().is_match(v)),
    ("query.rql", |v| !v.is_empty()),
    ("query.ancestry_id", is_valid_uuid),
    ("query.ancestry_type", |v| v == "parents" || v == "children"),
    ("query.ancestry_generations", is_unsigned),
];

/// One equality filter: a dotted payload path and the expected value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicFilter {
    pub path: Vec<String>,
    pub value: String,
}

impl BasicFilter {
    /// A filter applies only when the payload has its top-level field.
    pub fn matches(&self, payload: &Value) -> bool {
        let Some(head) = self.path.first() else {
            return true;
        };
        if payload.get(head).is_none() {
            return true;
        }
        let mut current = payload;
        for segment in &self.path {
            match current.get(segment) {
                Some(next) => current = next,
                None => return false,
            }
        }
        match current {
            Value::String(s) => *s == self.value,
            other => other.to_string() == self.value,
        }
    }
}

/// Validated query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub since: Option<VersionStamp>,
    pub until: Option<VersionStamp>,
    pub limit: Option<usize>,
    pub order: PagingOrder,
    pub filters: Vec<BasicFilter>,
}

impl QueryParams {
    /// Validate raw `(name, value)` pairs. The first occurrence of a
    /// repeated name wins.
    ///
    /// Reports the first invalid recognized parameter as a bad parameter,
    /// then any recognized but unsupported query-language parameter as not
    /// implemented. Other `paging.*`/`query.*` names are ignored; all
    /// remaining names become basic filters.
    pub fn parse(resource_type: ResourceType, pairs: &[(String, String)]) -> Result<Self, StoreError> {
        let lookup = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        for (name, test) in PARAM_TESTS {
            if let Some(value) = lookup(name) {
                if !test(value) {
                    return Err(StoreError::BadParameter {
                        resource_type,
                        name: name.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
        if let Some(name) = UNIMPLEMENTED.into_iter().find(|n| lookup(n).is_some()) {
            return Err(StoreError::NotImplemented {
                name: name.to_string(),
            });
        }

        let stamp = |name| lookup(name).and_then(|v| v.parse::<VersionStamp>().ok());
        let mut filters: Vec<BasicFilter> = Vec::new();
        for (key, value) in pairs {
            if key.starts_with("paging.") || key.starts_with("query.") || key.is_empty() {
                continue;
            }
            let path: Vec<String> = key.split('.').map(str::to_string).collect();
            if filters.iter().any(|f| f.path == path) {
                continue;
            }
            filters.push(BasicFilter {
                path,
                value: value.clone(),
            });
        }

        Ok(Self {
            since: stamp("paging.since"),
            until: stamp("paging.until"),
            limit: lookup("paging.limit").and_then(|v| v.parse().ok()),
            order: match lookup("paging.order") {
                Some("create") => PagingOrder::Create,
                _ => PagingOrder::Update,
            },
            filters,
        })
    }

    pub fn matches(&self, payload: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(payload))
    }
}

/// A live entry offered to the paginator.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub version: VersionStamp,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub payload: Value,
}

/// Cursor boundaries of a non-empty result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingAnchors {
    /// Oldest version of the unwindowed set.
    pub first: VersionStamp,
    /// Newest version of the unwindowed set.
    pub last: VersionStamp,
    /// One unit below the oldest item on the page.
    pub since: Option<VersionStamp>,
    /// Newest item on the page.
    pub until: Option<VersionStamp>,
    /// Window bounds as requested, used when the page is empty.
    pub requested_since: Option<VersionStamp>,
    pub requested_until: Option<VersionStamp>,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Value>,
    pub limit: usize,
    pub anchors: Option<PagingAnchors>,
}

impl QueryPage {
    /// Pagination headers. `base` is the collection URL the links point at,
    /// e.g. `http://host/x-nmos/query/v1.2/nodes/`.
    pub fn headers(&self, base: &str) -> Vec<(String, String)> {
        let limit = self.limit;
        let Some(anchors) = self.anchors else {
            return vec![("X-Paging-Limit".to_string(), limit.to_string())];
        };
        let link = |param: &str, at: VersionStamp, rel: &str| {
            format!("<{base}?{param}={at}&paging.limit={limit}>; rel=\"{rel}\"")
        };

        let mut rels = Vec::with_capacity(4);
        if let Some(since) = anchors.since {
            rels.push(link("paging.until", since, "prev"));
        }
        if let Some(until) = anchors.until {
            rels.push(link("paging.since", until, "next"));
        }
        rels.push(link("paging.since", anchors.first.decrement(), "first"));
        rels.push(link("paging.until", anchors.last, "last"));

        let since = anchors
            .since
            .or(anchors.requested_since)
            .unwrap_or(VersionStamp::ZERO);
        let until = anchors
            .until
            .or(anchors.requested_until)
            .unwrap_or(anchors.last);
        vec![
            ("Link".to_string(), rels.join(", ")),
            ("X-Paging-Limit".to_string(), limit.to_string()),
            ("X-Paging-Since".to_string(), since.to_string()),
            ("X-Paging-Until".to_string(), until.to_string()),
        ]
    }
}

/// Filter, order, window and cut `candidates` into one page.
pub fn paginate(mut candidates: Vec<Candidate>, params: &QueryParams, default_limit: usize) -> QueryPage {
    let limit = params.limit.unwrap_or(default_limit);

    candidates.retain(|c| params.matches(&c.payload));
    match params.order {
        PagingOrder::Create => candidates.sort_by(|l, r| r.created.cmp(&l.created)),
        PagingOrder::Update => candidates.sort_by(|l, r| r.updated.cmp(&l.updated)),
    }

    let bounds = match (candidates.last(), candidates.first()) {
        (Some(oldest), Some(newest)) => Some((oldest.version, newest.version)),
        _ => None,
    };

    let since = params.since.unwrap_or(VersionStamp::ZERO);
    let until = params.until.unwrap_or(VersionStamp::MAX);
    candidates.retain(|c| since < c.version && c.version <= until);
    let cut = candidates.len().saturating_sub(limit);
    let page: Vec<Candidate> = candidates.split_off(cut);

    let anchors = bounds.map(|(first, last)| PagingAnchors {
        first,
        last,
        since: page.last().map(|c| c.version.decrement()),
        until: page.first().map(|c| c.version),
        requested_since: params.since,
        requested_until: params.until,
    });

    QueryPage {
        items: page.into_iter().map(|c| c.payload).collect(),
        limit,
        anchors,
    }
}
