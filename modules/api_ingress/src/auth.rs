//! Policy authorization for mounted routes.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use contractkit::{PolicySet, Problem};
use std::collections::HashMap;

/// Caller identity as presented on the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub grants: Vec<String>,
}

impl Identity {
    /// `None` when the grants header is absent; an empty header is an
    /// identity without grants.
    pub fn from_headers(headers: &HeaderMap, grants_header: &HeaderName) -> Option<Self> {
        let raw = headers.get(grants_header)?.to_str().ok()?;
        let grants = raw
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_owned)
            .collect();
        Some(Self { grants })
    }

    pub fn has_grant(&self, grant: &str) -> bool {
        self.grants.iter().any(|g| g.eq_ignore_ascii_case(grant))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny { reason: Option<String> },
}

impl AuthDecision {
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether a caller satisfies every policy of a route.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, policies: &PolicySet, identity: Option<&Identity>) -> AuthDecision;
}

/// Grant-based authorizer.
///
/// A policy is satisfied by any of the grants configured for it. A policy
/// without a configured rule is satisfied by the grant of the same name.
/// Names compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct GrantAuthorizer {
    rules: HashMap<String, Vec<String>>,
}

impl GrantAuthorizer {
    pub fn new(rules: &HashMap<String, Vec<String>>) -> Self {
        let rules = rules
            .iter()
            .map(|(policy, grants)| (policy.to_ascii_lowercase(), grants.clone()))
            .collect();
        Self { rules }
    }

    fn satisfies(&self, policy: &str, identity: &Identity) -> bool {
        match self.rules.get(&policy.to_ascii_lowercase()) {
            Some(grants) => grants.iter().any(|g| identity.has_grant(g)),
            None => identity.has_grant(policy),
        }
    }
}

#[async_trait]
impl Authorizer for GrantAuthorizer {
    async fn authorize(&self, policies: &PolicySet, identity: Option<&Identity>) -> AuthDecision {
        let Some(identity) = identity else {
            return AuthDecision::deny("Authentication required");
        };

        match policies.iter().find(|p| !self.satisfies(p, identity)) {
            Some(policy) => AuthDecision::deny(format!("Policy '{policy}' is not satisfied")),
            None => AuthDecision::Allow,
        }
    }
}

/// Problem for a denied request: 401 without identity, 403 otherwise.
pub fn denial_problem(identity: Option<&Identity>, reason: Option<String>) -> Problem {
    match identity {
        None => Problem::from_status(
            StatusCode::UNAUTHORIZED,
            reason.unwrap_or_else(|| "Authentication required".to_string()),
        ),
        Some(_) => Problem::from_status(
            StatusCode::FORBIDDEN,
            reason.unwrap_or_else(|| "Access denied".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn grants(list: &[&str]) -> Identity {
        Identity {
            grants: list.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn identity_parsing() {
        let name = HeaderName::from_static("x-grants");
        let mut headers = HeaderMap::new();
        assert_eq!(Identity::from_headers(&headers, &name), None);

        headers.insert(&name, HeaderValue::from_static(" user, ,Admin "));
        let id = Identity::from_headers(&headers, &name).unwrap();
        assert_eq!(id.grants, vec!["user", "Admin"]);
        assert!(id.has_grant("admin"));

        headers.insert(&name, HeaderValue::from_static(""));
        assert_eq!(
            Identity::from_headers(&headers, &name),
            Some(Identity::default())
        );
    }

    #[tokio::test]
    async fn same_name_grant_satisfies_unconfigured_policy() {
        let auth = GrantAuthorizer::default();
        let policies: PolicySet = ["User"].into_iter().collect();

        assert_eq!(
            auth.authorize(&policies, Some(&grants(&["user"]))).await,
            AuthDecision::Allow
        );
        assert!(matches!(
            auth.authorize(&policies, Some(&grants(&["guest"]))).await,
            AuthDecision::Deny { .. }
        ));
    }

    #[tokio::test]
    async fn configured_rule_replaces_same_name_match() {
        let mut rules = HashMap::new();
        rules.insert("User".to_string(), vec!["reader".to_string()]);
        let auth = GrantAuthorizer::new(&rules);
        let policies: PolicySet = ["user"].into_iter().collect();

        assert_eq!(
            auth.authorize(&policies, Some(&grants(&["READER"]))).await,
            AuthDecision::Allow
        );
        assert!(matches!(
            auth.authorize(&policies, Some(&grants(&["user"]))).await,
            AuthDecision::Deny { .. }
        ));
    }

    #[tokio::test]
    async fn every_policy_must_pass() {
        let auth = GrantAuthorizer::default();
        let policies: PolicySet = ["user", "admin"].into_iter().collect();

        let decision = auth.authorize(&policies, Some(&grants(&["user"]))).await;
        assert_eq!(
            decision,
            AuthDecision::deny("Policy 'admin' is not satisfied")
        );
        assert_eq!(
            auth.authorize(&policies, Some(&grants(&["admin", "user"])))
                .await,
            AuthDecision::Allow
        );
    }

    #[tokio::test]
    async fn missing_identity_is_denied() {
        let auth = GrantAuthorizer::default();
        let policies: PolicySet = ["user"].into_iter().collect();
        assert!(matches!(
            auth.authorize(&policies, None).await,
            AuthDecision::Deny { .. }
        ));
    }

    #[test]
    fn denial_status_depends_on_identity() {
        assert_eq!(denial_problem(None, None).status, 401);
        let p = denial_problem(Some(&Identity::default()), Some("nope".into()));
        assert_eq!(p.status, 403);
        assert_eq!(p.detail, "nope");
    }
}
