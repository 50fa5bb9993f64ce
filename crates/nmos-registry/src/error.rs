// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy and the serialized error body.

use crate::model::{ResourceType, VersionStamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error classes, each mapped to one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed path, UUID, content type, body or query parameter.
    Validation,
    /// Unknown id or resource.
    NotFound,
    /// Duplicate create, stale version, previously deleted id.
    Conflict,
    /// Recognized but unsupported query feature.
    NotImplemented,
}

impl ErrorKind {
    pub fn status(self) -> u16 {
        match self {
            Self::Validation | Self::Conflict => 400,
            Self::NotFound => 404,
            Self::NotImplemented => 501,
        }
    }
}

/// Failures reported synchronously by the resource store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("On resource creation, type field is missing.")]
    MissingType,

    #[error("On resource creation for type {0}, data field is missing.")]
    MissingData(ResourceType),

    #[error("On resource creation for type {resource_type}, {field} is missing.")]
    MissingField {
        resource_type: ResourceType,
        field: &'static str,
    },

    #[error("On resource creation for type {resource_type}, version '{version}' is not a valid version stamp.")]
    MalformedVersion {
        resource_type: ResourceType,
        version: String,
    },

    #[error("On resource creation for type {resource_type}, new version {version} is not newer than existing version {existing}.")]
    StaleVersion {
        resource_type: ResourceType,
        version: VersionStamp,
        existing: VersionStamp,
    },

    #[error("Collection {resource_type} already has an item with ID {id} and version {version}.")]
    Duplicate {
        resource_type: ResourceType,
        id: String,
        version: VersionStamp,
    },

    #[error("Collection {resource_type} previously had an item with ID {id} and version {version}, now marked as deleted.")]
    PreviouslyDeleted {
        resource_type: ResourceType,
        id: String,
        version: VersionStamp,
    },

    #[error("Request for a resource from the {resource_type} with id '{id}' that does not exist.")]
    NotFound {
        resource_type: ResourceType,
        id: String,
    },

    #[error("Request for a resource from the {resource_type} with id '{id}' that is marked as deleted.")]
    Deleted {
        resource_type: ResourceType,
        id: String,
    },

    #[error("On a query of the {resource_type}, query parameter '{name}' with value '{value}' is not valid.")]
    BadParameter {
        resource_type: ResourceType,
        name: String,
        value: String,
    },

    #[error("The query parameter {name} is not implemented.")]
    NotImplemented { name: String },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingType
            | Self::MissingData(_)
            | Self::MissingField { .. }
            | Self::MalformedVersion { .. }
            | Self::BadParameter { .. } => ErrorKind::Validation,
            Self::StaleVersion { .. } | Self::Duplicate { .. } | Self::PreviouslyDeleted { .. } => {
                ErrorKind::Conflict
            }
            Self::NotFound { .. } | Self::Deleted { .. } => ErrorKind::NotFound,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
        }
    }

    pub fn status(&self) -> u16 {
        self.kind().status()
    }
}

/// Error response body: `{ "code": 404, "error": "...", "debug": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub error: String,
    pub debug: String,
}

impl ApiError {
    pub fn new(code: u16, error: impl Into<String>, debug: impl Into<String>) -> Self {
        Self {
            code,
            error: error.into(),
            debug: debug.into(),
        }
    }
}
