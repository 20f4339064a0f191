//! Contract declaration surface and descriptor extraction
//!
//! A contract describes itself with [`ContractDecl`] / [`OperationDecl`]
//! builders. [`extract`] turns that declaration into a [`ContractDescriptor`]:
//! paths are normalised, parameter bindings are completed from the path
//! templates, and ignored operations are marked excluded.
//!
//! Nothing here fails. Malformed templates and unsupported verbs are carried
//! through unchanged and rejected later by the route binder.

use http::Method;
use serde::Serialize;
use serde_json::Value;

use crate::handler::HandlerRegistry;
use crate::metadata::{HttpLogging, Metadata, RequestTimeout};

/// A service contract that can be registered as a set of HTTP routes.
///
/// Usually implemented for the contract's trait object:
///
/// ```rust,ignore
/// impl Contract for dyn PeopleApi {
///     const NAME: &'static str = "PeopleApi";
///     fn declare() -> ContractDecl { ... }
///     fn handlers() -> HandlerRegistry<Self> { ... }
/// }
/// ```
pub trait Contract: Send + Sync + 'static {
    /// Name used in diagnostics and registration errors.
    const NAME: &'static str;

    /// Declarative description of the contract and its operations.
    fn declare() -> ContractDecl;

    /// Handlers for the declared operations, keyed by operation name.
    fn handlers() -> HandlerRegistry<Self>;
}

/// Where a parameter value is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingSource {
    Path,
    Query,
    Body,
}

/// A parameter as declared; `source: None` means "infer from the path".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub source: Option<BindingSource>,
}

/// A parameter with its binding source resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamBinding {
    pub name: String,
    pub source: BindingSource,
}

/// One verb/path pair an operation is exposed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecl {
    pub method: Method,
    pub path: String,
}

macro_rules! metadata_builders {
    () => {
        pub fn description(mut self, text: impl Into<String>) -> Self {
            self.metadata.description = Some(text.into());
            self
        }

        pub fn group_name(mut self, name: impl Into<String>) -> Self {
            self.metadata.group_name = Some(name.into());
            self
        }

        pub fn summary(mut self, text: impl Into<String>) -> Self {
            self.metadata.summary = Some(text.into());
            self
        }

        pub fn order(mut self, order: i32) -> Self {
            self.metadata.order = Some(order);
            self
        }

        pub fn tag(mut self, tag: impl Into<String>) -> Self {
            self.metadata.tags.push(tag.into());
            self
        }

        pub fn tags<I, S>(mut self, tags: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.metadata.tags.extend(tags.into_iter().map(Into::into));
            self
        }

        /// Attach an opaque metadata item.
        pub fn item(mut self, item: Value) -> Self {
            self.metadata.items.push(item);
            self
        }

        pub fn http_logging(mut self, logging: HttpLogging) -> Self {
            self.metadata.http_logging = Some(logging);
            self
        }

        pub fn timeout(mut self, timeout: RequestTimeout) -> Self {
            self.metadata.timeout = Some(timeout);
            self
        }

        pub fn disable_timeout(self) -> Self {
            self.timeout(RequestTimeout::Disabled)
        }

        /// Require the named authorization policy. May be called repeatedly.
        pub fn require_authorization(mut self, policy: impl Into<String>) -> Self {
            self.policies.push(policy.into());
            self
        }
    };
}

/// Declaration of a whole contract: group-level metadata, policies and operations.
#[derive(Debug, Clone, Default)]
pub struct ContractDecl {
    name: String,
    metadata: Metadata,
    policies: Vec<String>,
    operations: Vec<OperationDecl>,
}

impl ContractDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn operation(mut self, operation: OperationDecl) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[OperationDecl] {
        &self.operations
    }

    metadata_builders!();
}

/// Declaration of one operation.
#[derive(Debug, Clone, Default)]
pub struct OperationDecl {
    name: String,
    routes: Vec<RouteDecl>,
    params: Vec<ParamDecl>,
    metadata: Metadata,
    policies: Vec<String>,
    ignored: bool,
}

impl OperationDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Expose the operation under `method` + `path`. Any method is accepted
    /// here; unsupported ones fail at binding time.
    pub fn route(mut self, method: Method, path: impl Into<String>) -> Self {
        self.routes.push(RouteDecl {
            method,
            path: path.into(),
        });
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.route(Method::GET, path)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.route(Method::POST, path)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.route(Method::PUT, path)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.route(Method::DELETE, path)
    }

    pub fn patch(self, path: impl Into<String>) -> Self {
        self.route(Method::PATCH, path)
    }

    pub fn path_param(self, name: impl Into<String>) -> Self {
        self.push_param(name, Some(BindingSource::Path))
    }

    pub fn query_param(self, name: impl Into<String>) -> Self {
        self.push_param(name, Some(BindingSource::Query))
    }

    pub fn body_param(self, name: impl Into<String>) -> Self {
        self.push_param(name, Some(BindingSource::Body))
    }

    /// Parameter whose source is inferred: path if a placeholder has the
    /// same name, query otherwise.
    pub fn param(self, name: impl Into<String>) -> Self {
        self.push_param(name, None)
    }

    fn push_param(mut self, name: impl Into<String>, source: Option<BindingSource>) -> Self {
        self.params.push(ParamDecl {
            name: name.into(),
            source,
        });
        self
    }

    /// Keep the operation out of the routing table.
    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    metadata_builders!();
}

/// Extracted, immutable description of a contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDescriptor {
    pub name: String,
    pub metadata: Metadata,
    pub policies: Vec<String>,
    pub operations: Vec<OperationDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub name: String,
    pub routes: Vec<RouteDecl>,
    pub bindings: Vec<ParamBinding>,
    pub metadata: Metadata,
    pub policies: Vec<String>,
    pub excluded: bool,
}

/// Build the descriptor for a declared contract, preserving operation order.
pub fn extract(decl: &ContractDecl) -> ContractDescriptor {
    let operations = decl
        .operations
        .iter()
        .map(|op| {
            if op.ignored {
                tracing::debug!(
                    contract = %decl.name,
                    operation = %op.name,
                    "operation is ignored"
                );
                return OperationDescriptor {
                    name: op.name.clone(),
                    routes: Vec::new(),
                    bindings: Vec::new(),
                    metadata: Metadata::default(),
                    policies: Vec::new(),
                    excluded: true,
                };
            }

            let routes: Vec<RouteDecl> = op
                .routes
                .iter()
                .map(|r| RouteDecl {
                    method: r.method.clone(),
                    path: normalize_path(&r.path),
                })
                .collect();

            OperationDescriptor {
                name: op.name.clone(),
                bindings: resolve_bindings(&op.params, &routes),
                routes,
                metadata: op.metadata.clone(),
                policies: op.policies.clone(),
                excluded: false,
            }
        })
        .collect();

    ContractDescriptor {
        name: decl.name.clone(),
        metadata: decl.metadata.clone(),
        policies: decl.policies.clone(),
        operations,
    }
}

/// Prefix a missing leading `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// A malformed path template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed placeholder in path template '{0}'")]
    Unclosed(String),
    #[error("unexpected '}}' in path template '{0}'")]
    UnexpectedClose(String),
    #[error("empty placeholder in path template '{0}'")]
    Empty(String),
    #[error("placeholder must span a whole segment in path template '{0}'")]
    MixedSegment(String),
    #[error("catch-all placeholder must be the last segment in path template '{0}'")]
    CatchAllNotLast(String),
}

/// Placeholder names of a path template, in order. `{*rest}` yields `rest`.
///
/// A placeholder fills its whole segment, and a catch-all may only appear as
/// the final segment.
pub fn parse_template(path: &str) -> Result<Vec<String>, TemplateError> {
    let malformed = |make: fn(String) -> TemplateError| make(path.to_string());
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut names = Vec::new();

    for (i, seg) in segments.iter().enumerate() {
        let Some(open) = seg.find(['{', '}']) else {
            continue;
        };
        if seg[open..].starts_with('}') {
            return Err(malformed(TemplateError::UnexpectedClose));
        }
        let after = &seg[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| malformed(TemplateError::Unclosed))?;
        let inner = &after[..close];
        if inner.contains('{') {
            return Err(malformed(TemplateError::Unclosed));
        }
        if open != 0 || close + 1 != after.len() {
            return Err(malformed(TemplateError::MixedSegment));
        }
        let (catch_all, name) = match inner.strip_prefix('*') {
            Some(name) => (true, name),
            None => (false, inner),
        };
        if name.is_empty() {
            return Err(malformed(TemplateError::Empty));
        }
        if catch_all && i != last {
            return Err(malformed(TemplateError::CatchAllNotLast));
        }
        names.push(name.to_string());
    }

    Ok(names)
}

/// Resolve every parameter's source and add implicit path bindings for
/// placeholders no parameter mentions.
fn resolve_bindings(params: &[ParamDecl], routes: &[RouteDecl]) -> Vec<ParamBinding> {
    let mut placeholders: Vec<String> = Vec::new();
    for route in routes {
        // Malformed templates are reported by the binder.
        for name in parse_template(&route.path).unwrap_or_default() {
            if !placeholders.iter().any(|p| p.eq_ignore_ascii_case(&name)) {
                placeholders.push(name);
            }
        }
    }

    let mut bindings: Vec<ParamBinding> = params
        .iter()
        .map(|p| {
            let source = p.source.unwrap_or_else(|| {
                if placeholders.iter().any(|ph| ph.eq_ignore_ascii_case(&p.name)) {
                    BindingSource::Path
                } else {
                    BindingSource::Query
                }
            });
            ParamBinding {
                name: p.name.clone(),
                source,
            }
        })
        .collect();

    for placeholder in placeholders {
        let covered = bindings
            .iter()
            .any(|b| b.name.eq_ignore_ascii_case(&placeholder));
        if !covered {
            bindings.push(ParamBinding {
                name: placeholder,
                source: BindingSource::Path,
            });
        }
    }

    bindings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(name: &str, source: BindingSource) -> ParamBinding {
        ParamBinding {
            name: name.to_string(),
            source,
        }
    }

    #[test]
    fn extract_preserves_operation_order() {
        let decl = ContractDecl::new("Orders")
            .operation(OperationDecl::new("List").get("/orders"))
            .operation(OperationDecl::new("Get").get("/orders/{id}"))
            .operation(OperationDecl::new("Create").post("/orders"));

        let desc = extract(&decl);
        let names: Vec<_> = desc.operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["List", "Get", "Create"]);
    }

    #[test]
    fn ignored_operation_is_marked_excluded() {
        let decl = ContractDecl::new("Orders").operation(
            OperationDecl::new("Purge")
                .delete("/orders")
                .description("internal only")
                .ignore(),
        );

        let op = &extract(&decl).operations[0];
        assert!(op.excluded);
        assert!(op.routes.is_empty());
        assert!(op.bindings.is_empty());
    }

    #[test]
    fn implicit_param_binds_to_matching_placeholder() {
        let decl = ContractDecl::new("People").operation(
            OperationDecl::new("GetPerson")
                .get("/people/{Id}")
                .param("id")
                .param("verbose"),
        );

        let op = &extract(&decl).operations[0];
        assert_eq!(
            op.bindings,
            vec![
                binding("id", BindingSource::Path),
                binding("verbose", BindingSource::Query),
            ]
        );
    }

    #[test]
    fn uncovered_placeholder_gets_implicit_path_binding() {
        let decl = ContractDecl::new("People").operation(
            OperationDecl::new("UpdatePerson")
                .put("/people/{id}")
                .body_param("person"),
        );

        let op = &extract(&decl).operations[0];
        assert_eq!(
            op.bindings,
            vec![
                binding("person", BindingSource::Body),
                binding("id", BindingSource::Path),
            ]
        );
    }

    #[test]
    fn explicit_source_wins_over_inference() {
        let decl = ContractDecl::new("People").operation(
            OperationDecl::new("Odd")
                .get("/things/{id}")
                .query_param("id"),
        );

        let op = &extract(&decl).operations[0];
        assert_eq!(op.bindings, vec![binding("id", BindingSource::Query)]);
    }

    #[test]
    fn multiple_routes_share_bindings() {
        let decl = ContractDecl::new("People").operation(
            OperationDecl::new("Upsert")
                .put("people/{id}")
                .patch("/people/{id}"),
        );

        let op = &extract(&decl).operations[0];
        assert_eq!(op.routes.len(), 2);
        assert_eq!(op.routes[0].path, "/people/{id}");
        assert_eq!(op.routes[1].method, Method::PATCH);
        assert_eq!(op.bindings, vec![binding("id", BindingSource::Path)]);
    }

    #[test]
    fn operation_without_routes_is_kept() {
        let decl = ContractDecl::new("People").operation(OperationDecl::new("Helper"));
        let op = &extract(&decl).operations[0];
        assert!(!op.excluded);
        assert!(op.routes.is_empty());
    }

    #[test]
    fn group_metadata_and_policies_are_carried() {
        let decl = ContractDecl::new("People")
            .description("People directory")
            .tag("people")
            .require_authorization("user");

        let desc = extract(&decl);
        assert_eq!(desc.name, "People");
        assert_eq!(desc.metadata.description.as_deref(), Some("People directory"));
        assert_eq!(desc.metadata.tags, vec!["people"]);
        assert_eq!(desc.policies, vec!["user"]);
    }

    #[test]
    fn template_parsing() {
        assert_eq!(
            parse_template("/people/{id}/friends/{friendId}").unwrap(),
            vec!["id", "friendId"]
        );
        assert_eq!(parse_template("/files/{*path}").unwrap(), vec!["path"]);
        assert!(parse_template("/people").unwrap().is_empty());
        assert!(matches!(
            parse_template("/people/{id"),
            Err(TemplateError::Unclosed(_))
        ));
        assert!(matches!(
            parse_template("/people/id}"),
            Err(TemplateError::UnexpectedClose(_))
        ));
        assert!(matches!(
            parse_template("/people/{}"),
            Err(TemplateError::Empty(_))
        ));
    }

    #[test]
    fn placeholders_fill_whole_segments() {
        for path in ["/a/{x}{y}", "/a/{id}.json", "/a/v{id}"] {
            assert!(
                matches!(parse_template(path), Err(TemplateError::MixedSegment(_))),
                "{path}"
            );
        }
        assert!(matches!(
            parse_template("/a/{*rest}/b"),
            Err(TemplateError::CatchAllNotLast(_))
        ));
        assert_eq!(parse_template("/a/{*rest}").unwrap(), vec!["rest"]);
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(normalize_path("people"), "/people");
        assert_eq!(normalize_path("/people"), "/people");
        assert_eq!(normalize_path(""), "/");
    }
}
