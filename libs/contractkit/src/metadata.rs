//! Route metadata and the contract/operation merge rules
//!
//! Scalars resolve by override (operation wins when it declares a value),
//! collections by append (contract items first). The logging and timeout
//! records are replaced as a whole.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Smallest contract-level `order` that counts as declared.
pub const GROUP_ORDER_MIN: i32 = 0;
/// Smallest operation-level `order` that counts as declared. Lower than
/// [`GROUP_ORDER_MIN`], so an operation can sort ahead of every contract.
pub const OPERATION_ORDER_MIN: i32 = -1;

bitflags::bitflags! {
    /// Parts of a request/response exchange the host should log for a route.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct HttpLoggingFields: u32 {
        const REQUEST_PATH = 1 << 0;
        const REQUEST_QUERY = 1 << 1;
        const REQUEST_PROTOCOL = 1 << 2;
        const REQUEST_METHOD = 1 << 3;
        const REQUEST_SCHEME = 1 << 4;
        const RESPONSE_STATUS_CODE = 1 << 5;
        const REQUEST_HEADERS = 1 << 6;
        const RESPONSE_HEADERS = 1 << 7;
        const REQUEST_BODY = 1 << 10;
        const RESPONSE_BODY = 1 << 11;
        const DURATION = 1 << 12;

        const REQUEST_PROPERTIES = Self::REQUEST_PATH.bits()
            | Self::REQUEST_QUERY.bits()
            | Self::REQUEST_PROTOCOL.bits()
            | Self::REQUEST_METHOD.bits()
            | Self::REQUEST_SCHEME.bits();
        const REQUEST_PROPERTIES_AND_HEADERS =
            Self::REQUEST_PROPERTIES.bits() | Self::REQUEST_HEADERS.bits();
        const RESPONSE_PROPERTIES_AND_HEADERS =
            Self::RESPONSE_STATUS_CODE.bits() | Self::RESPONSE_HEADERS.bits();
        const REQUEST = Self::REQUEST_PROPERTIES_AND_HEADERS.bits() | Self::REQUEST_BODY.bits();
        const RESPONSE = Self::RESPONSE_PROPERTIES_AND_HEADERS.bits() | Self::RESPONSE_BODY.bits();
        const ALL = Self::REQUEST.bits() | Self::RESPONSE.bits() | Self::DURATION.bits();
    }
}

/// Per-route HTTP logging record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpLogging {
    pub fields: HttpLoggingFields,
    /// `None` or `-1` falls back to the host default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body_limit: Option<i32>,
    /// `None` or `-1` falls back to the host default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body_limit: Option<i32>,
}

impl HttpLogging {
    pub fn new(fields: HttpLoggingFields) -> Self {
        Self {
            fields,
            request_body_limit: None,
            response_body_limit: None,
        }
    }

    pub fn with_request_body_limit(mut self, limit: i32) -> Self {
        self.request_body_limit = Some(limit);
        self
    }

    pub fn with_response_body_limit(mut self, limit: i32) -> Self {
        self.response_body_limit = Some(limit);
        self
    }

    pub fn request_limit_or(&self, default: usize) -> usize {
        body_limit_or(self.request_body_limit, default)
    }

    pub fn response_limit_or(&self, default: usize) -> usize {
        body_limit_or(self.response_body_limit, default)
    }
}

fn body_limit_or(limit: Option<i32>, default: usize) -> usize {
    match limit {
        Some(n) if n >= 0 => n as usize,
        _ => default,
    }
}

/// Inline timeout policy carried by a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Status answered on expiry; the host picks its default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl TimeoutPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Request timeout selection. Exactly one variant applies to a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestTimeout {
    Disabled,
    Policy(TimeoutPolicy),
    Named {
        name: String,
    },
    Fixed {
        #[serde(with = "humantime_serde")]
        duration: Duration,
    },
}

impl RequestTimeout {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named { name: name.into() }
    }

    pub fn fixed(duration: Duration) -> Self {
        Self::Fixed { duration }
    }
}

/// Metadata as declared on a contract or on a single operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub description: Option<String>,
    pub group_name: Option<String>,
    pub summary: Option<String>,
    pub order: Option<i32>,
    pub tags: Vec<String>,
    pub items: Vec<Value>,
    pub http_logging: Option<HttpLogging>,
    pub timeout: Option<RequestTimeout>,
}

/// Metadata in effect for one route after merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectiveMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    pub tags: Vec<String>,
    pub items: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_logging: Option<HttpLogging>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<RequestTimeout>,
}

/// Merge contract-level (`group`) and operation-level metadata.
pub fn merge_metadata(group: &Metadata, operation: &Metadata) -> EffectiveMetadata {
    EffectiveMetadata {
        description: pick_text(&group.description, &operation.description),
        group_name: pick_text(&group.group_name, &operation.group_name),
        summary: pick_text(&group.summary, &operation.summary),
        order: operation
            .order
            .filter(|o| *o >= OPERATION_ORDER_MIN)
            .or_else(|| group.order.filter(|o| *o >= GROUP_ORDER_MIN)),
        tags: group.tags.iter().chain(&operation.tags).cloned().collect(),
        items: group.items.iter().chain(&operation.items).cloned().collect(),
        http_logging: operation
            .http_logging
            .clone()
            .or_else(|| group.http_logging.clone()),
        timeout: operation.timeout.clone().or_else(|| group.timeout.clone()),
    }
}

/// Empty strings count as not declared.
fn declared_text(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|s| !s.is_empty())
}

fn pick_text(group: &Option<String>, operation: &Option<String>) -> Option<String> {
    declared_text(operation).or(declared_text(group)).cloned()
}
