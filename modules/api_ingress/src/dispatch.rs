//! Per-request pipeline for a mounted route.
//!
//! identity → authorization → argument binding → invocation (under the route
//! deadline) → rendering → HTTP exchange logging.

use axum::{
    body::Bytes,
    extract::{
        rejection::{QueryRejection, RawPathParamsRejection},
        Query, RawPathParams, State,
    },
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
};
use contractkit::{
    BindingSource, HttpLoggingFields, OperationArgs, ParamBinding, Problem, Reply, RequestTimeout,
    RouteEntry, APPLICATION_PROBLEM_JSON,
};
use serde_json::{Map, Value};
use std::{sync::Arc, time::Duration, time::Instant};

use crate::auth::{denial_problem, AuthDecision, Authorizer, Identity};
use crate::config::ApiIngressConfig;
use crate::error::IngressError;

pub const HTTP_LOGGING_TARGET: &str = "api_ingress::http_logging";

const REDACTED_HEADERS: [&str; 3] = ["authorization", "cookie", "set-cookie"];

/// Time budget of a route and the status answered when it runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub after: Duration,
    pub status: StatusCode,
}

/// Effective timeout of `entry`. Named policies are looked up here so an
/// unknown name fails at startup, not on the first request.
pub fn resolve_deadline(
    entry: &RouteEntry,
    cfg: &ApiIngressConfig,
) -> Result<Option<Deadline>, IngressError> {
    let status = |code: u16| {
        StatusCode::from_u16(code).map_err(|_| IngressError::InvalidTimeoutStatus {
            verb: entry.verb,
            path: entry.path.clone(),
            status: code,
        })
    };

    let deadline = match &entry.metadata.timeout {
        None => cfg.default_timeout.map(|after| (after, cfg.timeout_status)),
        Some(RequestTimeout::Disabled) => None,
        Some(RequestTimeout::Fixed { duration }) => Some((*duration, cfg.timeout_status)),
        Some(RequestTimeout::Policy(p)) => {
            Some((p.timeout, p.status.unwrap_or(cfg.timeout_status)))
        }
        Some(RequestTimeout::Named { name }) => {
            let p = cfg.timeout_policies.get(name).ok_or_else(|| {
                IngressError::UnknownTimeoutPolicy {
                    verb: entry.verb,
                    path: entry.path.clone(),
                    name: name.clone(),
                }
            })?;
            Some((p.timeout, p.status.unwrap_or(cfg.timeout_status)))
        }
    };

    match deadline {
        None => Ok(None),
        Some((after, code)) => Ok(Some(Deadline {
            after,
            status: status(code)?,
        })),
    }
}

/// What to log for a route, with body limits already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingPlan {
    pub fields: HttpLoggingFields,
    pub request_limit: usize,
    pub response_limit: usize,
}

impl LoggingPlan {
    pub fn for_entry(entry: &RouteEntry, default_limit: usize) -> Option<Self> {
        let logging = entry.metadata.http_logging.as_ref()?;
        if logging.fields.is_empty() {
            return None;
        }
        Some(Self {
            fields: logging.fields,
            request_limit: logging.request_limit_or(default_limit),
            response_limit: logging.response_limit_or(default_limit),
        })
    }
}

/// Everything a mounted route needs at request time, resolved once.
pub struct RouteContext {
    pub entry: RouteEntry,
    pub authorizer: Arc<dyn Authorizer>,
    pub grants_header: HeaderName,
    pub deadline: Option<Deadline>,
    pub logging: Option<LoggingPlan>,
}

/// Response body kept as bytes so the exchange can be logged.
struct Rendered {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: Bytes,
}

impl Rendered {
    fn reply(reply: Reply) -> Self {
        match reply {
            Reply::Empty => Self {
                status: StatusCode::OK,
                content_type: None,
                body: Bytes::new(),
            },
            Reply::Json(value) => match serde_json::to_vec(&value) {
                Ok(body) => Self {
                    status: StatusCode::OK,
                    content_type: Some("application/json"),
                    body: body.into(),
                },
                Err(e) => Self::problem(Problem::from_status(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.to_string(),
                )),
            },
        }
    }

    fn problem(problem: Problem) -> Self {
        let status = problem.status_code();
        let body = serde_json::to_vec(&problem).unwrap_or_default();
        Self {
            status,
            content_type: Some(APPLICATION_PROBLEM_JSON),
            body: body.into(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ct) = self.content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        headers
    }

    fn into_response(self) -> Response {
        (self.status, self.headers(), self.body).into_response()
    }
}

/// The axum handler every mounted route points at.
#[allow(clippy::too_many_arguments)]
pub async fn dispatch(
    State(ctx): State<Arc<RouteContext>>,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    path: Result<RawPathParams, RawPathParamsRejection>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = headers
        .get(crate::request_id::header())
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let outcome = run(&ctx, &headers, path, query, &body).await;
    if let Err(problem) = &outcome {
        tracing::debug!(
            contract = %ctx.entry.contract,
            operation = %ctx.entry.operation,
            status = problem.status,
            "request failed"
        );
    }

    let rendered = match outcome {
        Ok(reply) => Rendered::reply(reply),
        Err(problem) => {
            let problem = problem.with_instance(uri.path());
            Rendered::problem(match &request_id {
                Some(id) => problem.with_request_id(id.clone()),
                None => problem,
            })
        }
    };

    if let Some(plan) = &ctx.logging {
        let exchange = Exchange {
            method: &method,
            uri: &uri,
            version,
            headers: &headers,
            body: &body,
        };
        let record = Value::Object(exchange_record(plan, &exchange, &rendered, started.elapsed()));
        tracing::info!(
            target: HTTP_LOGGING_TARGET,
            contract = %ctx.entry.contract,
            operation = %ctx.entry.operation,
            request_id = request_id.as_deref().unwrap_or("n/a"),
            record = %record,
            "http exchange"
        );
    }

    rendered.into_response()
}

async fn run(
    ctx: &RouteContext,
    headers: &HeaderMap,
    path: Result<RawPathParams, RawPathParamsRejection>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    body: &Bytes,
) -> Result<Reply, Problem> {
    let entry = &ctx.entry;

    if !entry.policies.is_empty() {
        let identity = Identity::from_headers(headers, &ctx.grants_header);
        let decision = ctx
            .authorizer
            .authorize(&entry.policies, identity.as_ref())
            .await;
        if let AuthDecision::Deny { reason } = decision {
            tracing::info!(
                contract = %entry.contract,
                operation = %entry.operation,
                policies = ?entry.policies.as_slice(),
                "request denied"
            );
            return Err(denial_problem(identity.as_ref(), reason));
        }
    }

    let path: Vec<(String, String)> = match path {
        Ok(params) => params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect(),
        // Routes without placeholders
        Err(RawPathParamsRejection::MissingPathParams(_)) => Vec::new(),
        Err(e) => return Err(Problem::from_status(e.status(), e.body_text())),
    };
    let Query(query) = query.map_err(|e| {
        Problem::from_status(StatusCode::BAD_REQUEST, e.body_text())
    })?;

    let args = bind_args(&entry.bindings, &path, &query, body)?;

    match ctx.deadline {
        None => entry.invoke(args).await,
        Some(deadline) => match tokio::time::timeout(deadline.after, entry.invoke(args)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    contract = %entry.contract,
                    operation = %entry.operation,
                    timeout = ?deadline.after,
                    "request timed out"
                );
                Err(Problem::from_status(deadline.status, "Request timed out"))
            }
        },
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Collect the values of `bindings` from the request. Absent values stay
/// absent; handlers decide whether they are required.
pub fn bind_args(
    bindings: &[ParamBinding],
    path: &[(String, String)],
    query: &[(String, String)],
    body: &[u8],
) -> Result<OperationArgs, Problem> {
    let mut args = OperationArgs::new();

    for binding in bindings {
        match binding.source {
            BindingSource::Path => {
                if let Some(v) = lookup(path, &binding.name) {
                    args = args.with_text(&binding.name, v);
                }
            }
            BindingSource::Query => {
                if let Some(v) = lookup(query, &binding.name) {
                    args = args.with_text(&binding.name, v);
                }
            }
            BindingSource::Body => {
                if body.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let value: Value = serde_json::from_slice(body).map_err(|e| {
                    Problem::from_status(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}"))
                })?;
                args = args.with_json(&binding.name, value);
            }
        }
    }

    Ok(args)
}

struct Exchange<'a> {
    method: &'a Method,
    uri: &'a Uri,
    version: Version,
    headers: &'a HeaderMap,
    body: &'a [u8],
}

fn exchange_record(
    plan: &LoggingPlan,
    req: &Exchange<'_>,
    resp: &Rendered,
    elapsed: Duration,
) -> Map<String, Value> {
    let f = plan.fields;
    let mut rec = Map::new();

    if f.contains(HttpLoggingFields::REQUEST_METHOD) {
        rec.insert("method".into(), req.method.as_str().into());
    }
    if f.contains(HttpLoggingFields::REQUEST_SCHEME) {
        rec.insert("scheme".into(), req.uri.scheme_str().unwrap_or("http").into());
    }
    if f.contains(HttpLoggingFields::REQUEST_PATH) {
        rec.insert("path".into(), req.uri.path().into());
    }
    if f.contains(HttpLoggingFields::REQUEST_QUERY) {
        rec.insert("query".into(), req.uri.query().unwrap_or_default().into());
    }
    if f.contains(HttpLoggingFields::REQUEST_PROTOCOL) {
        rec.insert("protocol".into(), format!("{:?}", req.version).into());
    }
    if f.contains(HttpLoggingFields::REQUEST_HEADERS) {
        rec.insert("request_headers".into(), headers_value(req.headers));
    }
    if f.contains(HttpLoggingFields::REQUEST_BODY) {
        rec.insert(
            "request_body".into(),
            truncate_body(req.body, plan.request_limit).into(),
        );
    }
    if f.contains(HttpLoggingFields::RESPONSE_STATUS_CODE) {
        rec.insert("status".into(), resp.status.as_u16().into());
    }
    if f.contains(HttpLoggingFields::RESPONSE_HEADERS) {
        rec.insert("response_headers".into(), headers_value(&resp.headers()));
    }
    if f.contains(HttpLoggingFields::RESPONSE_BODY) {
        rec.insert(
            "response_body".into(),
            truncate_body(&resp.body, plan.response_limit).into(),
        );
    }
    if f.contains(HttpLoggingFields::DURATION) {
        rec.insert(
            "duration_ms".into(),
            (elapsed.as_secs_f64() * 1000.0).into(),
        );
    }

    rec
}

fn headers_value(headers: &HeaderMap) -> Value {
    let map = headers
        .iter()
        .map(|(name, value)| {
            let shown = if REDACTED_HEADERS.contains(&name.as_str()) {
                "[redacted]".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_owned(), Value::String(shown))
        })
        .collect();
    Value::Object(map)
}

/// At most `limit` bytes of `body`, lossily decoded.
fn truncate_body(body: &[u8], limit: usize) -> String {
    let end = body.len().min(limit);
    String::from_utf8_lossy(&body[..end]).into_owned()
}
