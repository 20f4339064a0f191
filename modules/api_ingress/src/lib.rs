//! HTTP host for contract routing tables.
//!
//! Routing tables produced by `contractkit` are mounted during startup, then
//! published once as an axum [`Router`] with authorization, timeouts, HTTP
//! exchange logging and request ids wired in.

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderMap, HeaderName, Method, StatusCode, Uri},
    middleware::from_fn,
    routing::{get, on, MethodFilter, MethodRouter},
    Router,
};
use contractkit::{
    not_found, parse_template, Problem, ProblemResponse, RouteEntry, RoutingTable, Verb,
};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashSet},
    net::SocketAddr,
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
};

pub mod auth;
mod config;
pub mod dispatch;
pub mod error;
pub mod request_id;
pub mod web;

pub use auth::{AuthDecision, Authorizer, GrantAuthorizer, Identity};
pub use config::{ApiIngressConfig, AuthConfig, HttpLoggingConfig};
pub use error::IngressError;

use dispatch::{resolve_deadline, LoggingPlan, RouteContext};
use web::RouteInfo;

pub const HEALTH_PATH: &str = "/health";
pub const ROUTES_PATH: &str = "/routes";

/// Collects routing tables and publishes them as one router.
pub struct ApiIngress {
    config: ApiIngressConfig,
    authorizer: Arc<dyn Authorizer>,
    // `None` once the router has been built
    pending: Mutex<Option<Vec<RoutingTable>>>,
}

impl ApiIngress {
    /// Host with the grant-based authorizer configured by `config.auth`.
    pub fn new(config: ApiIngressConfig) -> Self {
        let authorizer = Arc::new(GrantAuthorizer::new(&config.auth.policies));
        Self {
            config,
            authorizer,
            pending: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn config(&self) -> &ApiIngressConfig {
        &self.config
    }

    /// Queue a routing table for the router. Only valid before `build_router`.
    pub fn mount(&self, table: RoutingTable) -> Result<(), IngressError> {
        let mut pending = self.pending.lock();
        let Some(tables) = pending.as_mut() else {
            return Err(IngressError::MountAfterBuild {
                contract: table.contract,
            });
        };
        tracing::info!(contract = %table.contract, routes = table.len(), "routing table mounted");
        tables.push(table);
        Ok(())
    }

    /// Publish the router. Can be called once; later mounts are rejected.
    ///
    /// A (verb, path) pair already taken by an earlier table, or by the host's
    /// own endpoints, is skipped with an error log.
    pub fn build_router(&self) -> Result<Router, IngressError> {
        let tables = self.pending.lock().take().ok_or(IngressError::AlreadyBuilt)?;
        let cfg = &self.config;

        let grants_header = HeaderName::from_bytes(cfg.auth.grants_header.as_bytes())
            .map_err(|_| IngressError::InvalidHeaderName(cfg.auth.grants_header.clone()))?;

        let mut taken: HashSet<(Verb, String)> = HashSet::new();
        let mut mounted: Vec<String> = Vec::new();
        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();

        taken.insert((Verb::Get, HEALTH_PATH.to_string()));
        mounted.push(HEALTH_PATH.to_string());
        by_path.insert(HEALTH_PATH.to_string(), get(web::health_check));
        if cfg.enable_docs {
            taken.insert((Verb::Get, ROUTES_PATH.to_string()));
        }

        let mut catalogue = Vec::new();

        for entry in tables.into_iter().flat_map(RoutingTable::into_entries) {
            if let Err(reason) = check_path(&entry.path) {
                tracing::error!(
                    contract = %entry.contract,
                    operation = %entry.operation,
                    path = %entry.path,
                    %reason,
                    "route skipped: path cannot be mounted"
                );
                continue;
            }
            if let Some(existing) = mounted
                .iter()
                .find(|m| placeholders_conflict(m, &entry.path))
            {
                tracing::error!(
                    contract = %entry.contract,
                    operation = %entry.operation,
                    path = %entry.path,
                    conflicts_with = %existing,
                    "route skipped: placeholders conflict with a mounted path"
                );
                continue;
            }
            if !taken.insert((entry.verb, entry.path.clone())) {
                tracing::error!(
                    contract = %entry.contract,
                    operation = %entry.operation,
                    verb = %entry.verb,
                    path = %entry.path,
                    "route skipped: verb and path already mounted"
                );
                continue;
            }
            if !mounted.contains(&entry.path) {
                mounted.push(entry.path.clone());
            }

            catalogue.push(RouteInfo::from(&entry));
            let path = entry.path.clone();
            let method_router = self.method_router(entry, &grants_header)?;
            let merged = match by_path.remove(&path) {
                Some(existing) => existing.merge(method_router),
                None => method_router,
            };
            by_path.insert(path, merged);
        }

        let mut router = Router::new();
        for (path, method_router) in by_path {
            router = router.route(&path, method_router);
        }

        if cfg.enable_docs {
            web::sort_catalogue(&mut catalogue);
            router = router.route(
                ROUTES_PATH,
                get(web::list_routes).with_state(Arc::new(catalogue)),
            );
        }

        router = router
            .method_not_allowed_fallback(method_not_allowed)
            .fallback(route_not_found);

        // Innermost first: body limits, CORS, request id extension, trace,
        // then request id propagation and generation as the outermost layers.
        router = router
            .layer(DefaultBodyLimit::max(cfg.body_limit_bytes))
            .layer(RequestBodyLimitLayer::new(cfg.body_limit_bytes));
        if cfg.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }
        let x_request_id = request_id::header();
        router = router
            .layer(from_fn(request_id::push_req_id_to_extensions))
            .layer(request_id::create_trace_layer())
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, request_id::MakeReqId));

        tracing::info!(paths = mounted.len(), "router built");
        Ok(router)
    }

    fn method_router(
        &self,
        entry: RouteEntry,
        grants_header: &HeaderName,
    ) -> Result<MethodRouter, IngressError> {
        let deadline = resolve_deadline(&entry, &self.config)?;
        let logging =
            LoggingPlan::for_entry(&entry, self.config.http_logging.default_body_limit);

        tracing::debug!(
            contract = %entry.contract,
            operation = %entry.operation,
            verb = %entry.verb,
            path = %entry.path,
            deadline = ?deadline.map(|d| d.after),
            logging = logging.is_some(),
            "route mounted"
        );

        let filter = method_filter(entry.verb);
        let ctx = Arc::new(RouteContext {
            entry,
            authorizer: self.authorizer.clone(),
            grants_header: grants_header.clone(),
            deadline,
            logging,
        });
        Ok(on(filter, dispatch::dispatch).with_state(ctx))
    }

    /// Serve `router` on the configured address until `cancel` fires.
    pub async fn serve(&self, router: Router, cancel: CancellationToken) -> Result<(), IngressError> {
        let addr: SocketAddr =
            self.config
                .bind_addr
                .parse()
                .map_err(|source| IngressError::InvalidBindAddr {
                    addr: self.config.bind_addr.clone(),
                    source,
                })?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| IngressError::Bind { addr, source })?;
        let local = listener.local_addr().unwrap_or(addr);
        tracing::info!("HTTP server bound on {}", local);

        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(IngressError::Serve)
    }
}

fn method_filter(verb: Verb) -> MethodFilter {
    match verb {
        Verb::Get => MethodFilter::GET,
        Verb::Post => MethodFilter::POST,
        Verb::Put => MethodFilter::PUT,
        Verb::Delete => MethodFilter::DELETE,
        Verb::Patch => MethodFilter::PATCH,
    }
}

async fn route_not_found(uri: Uri, headers: HeaderMap) -> ProblemResponse {
    let problem = not_found(format!("No route matches '{}'", uri.path())).0;
    host_problem(problem, &uri, &headers)
}

async fn method_not_allowed(method: Method, uri: Uri, headers: HeaderMap) -> ProblemResponse {
    let problem = Problem::from_status(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("Method {method} is not allowed on '{}'", uri.path()),
    );
    host_problem(problem, &uri, &headers)
}

/// Problem for requests answered by the host itself, tagged with the path
/// and request id.
fn host_problem(problem: Problem, uri: &Uri, headers: &HeaderMap) -> ProblemResponse {
    let mut problem = problem.with_instance(uri.path());
    if let Some(id) = headers
        .get(request_id::header())
        .and_then(|v| v.to_str().ok())
    {
        problem = problem.with_request_id(id);
    }
    ProblemResponse(problem)
}

/// Whether two paths cannot live in one router: after a common prefix, both
/// have a placeholder at the same position that differs in name or kind.
fn placeholders_conflict(a: &str, b: &str) -> bool {
    for (x, y) in a.split('/').zip(b.split('/')) {
        match (placeholder(x), placeholder(y)) {
            (Some(px), Some(py)) if px != py => return true,
            (Some(_), Some(_)) => {}
            (None, None) if x == y => {}
            _ => return false,
        }
    }
    false
}

/// Inner text of a `{name}` or `{*name}` segment.
fn placeholder(segment: &str) -> Option<&str> {
    segment.strip_prefix('{').and_then(|s| s.strip_suffix('}'))
}

/// Reject paths the router cannot insert: legacy `:x`/`*x` segments and
/// malformed placeholders.
fn check_path(path: &str) -> Result<(), String> {
    if path
        .split('/')
        .any(|seg| seg.starts_with(':') || seg.starts_with('*'))
    {
        return Err("segments starting with ':' or '*' must use {name} placeholders".to_string());
    }
    parse_template(path).map(drop).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_conflicts() {
        assert!(placeholders_conflict("/people/{id}", "/people/{personId}"));
        assert!(placeholders_conflict("/a/{id}", "/a/{*rest}"));
        assert!(placeholders_conflict("/a/{id}", "/a/{*id}"));
        assert!(placeholders_conflict("/a/{id}/x", "/a/{key}/y"));

        assert!(!placeholders_conflict("/people/{id}", "/people/{id}"));
        assert!(!placeholders_conflict("/people/{id}", "/people/{id}/friends"));
        assert!(!placeholders_conflict("/people/search", "/people/{id}"));
        assert!(!placeholders_conflict("/a/{id}", "/b/{key}"));
        assert!(!placeholders_conflict("/health", "/people"));
    }

    #[test]
    fn legacy_wildcards_are_rejected() {
        assert!(check_path("/people/{id}").is_ok());
        assert!(check_path("/people/:id").is_err());
        assert!(check_path("/files/*rest").is_err());
    }

    #[test]
    fn unroutable_templates_are_rejected() {
        for path in ["/a/{x}{y}", "/a/{id}.json", "/a/{*rest}/b"] {
            assert!(check_path(path).is_err(), "{path}");
        }
        assert!(check_path("/a/{*rest}").is_ok());
    }

    #[test]
    fn router_is_built_once() {
        let host = ApiIngress::new(ApiIngressConfig::default());
        host.build_router().unwrap();

        assert!(matches!(
            host.build_router(),
            Err(IngressError::AlreadyBuilt)
        ));
    }
}
