use axum::{extract::State, response::Json};
use contractkit::{EffectiveMetadata, PolicySet, RouteEntry, Verb};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// One row of the route catalogue served at `/routes`.
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub verb: Verb,
    pub path: String,
    pub contract: String,
    pub operation: String,
    pub policies: PolicySet,
    pub metadata: EffectiveMetadata,
}

impl From<&RouteEntry> for RouteInfo {
    fn from(entry: &RouteEntry) -> Self {
        Self {
            verb: entry.verb,
            path: entry.path.clone(),
            contract: entry.contract.clone(),
            operation: entry.operation.clone(),
            policies: entry.policies.clone(),
            metadata: (*entry.metadata).clone(),
        }
    }
}

/// Catalogue order: effective `order` ascending (routes without one last),
/// then path, then verb.
pub fn sort_catalogue(routes: &mut [RouteInfo]) {
    routes.sort_by(|a, b| {
        let key = |r: &RouteInfo| (r.metadata.order.is_none(), r.metadata.order);
        key(a)
            .cmp(&key(b))
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.verb.cmp(&b.verb))
    });
}

pub async fn list_routes(State(routes): State<Arc<Vec<RouteInfo>>>) -> Json<Vec<RouteInfo>> {
    Json(routes.as_ref().clone())
}
