//! Handler registry and the argument/reply types handlers work with

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{collections::HashMap, fmt, future::Future, str::FromStr, sync::Arc};

use crate::api::failure::DomainFailure;

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Reply>>;

type ContractFn<C> = Arc<dyn Fn(Arc<C>, OperationArgs) -> HandlerFuture + Send + Sync>;

/// A handler bound to a contract instance; only needs the call arguments.
pub type BoundHandler = Arc<dyn Fn(OperationArgs) -> HandlerFuture + Send + Sync>;

/// What a handler produced on success.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 with a JSON body.
    Json(Value),
    /// 200 without a body.
    Empty,
}

impl Reply {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }
}

/// One bound argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Path segment or query string value.
    Text(String),
    /// Request body.
    Json(Value),
}

/// Arguments for one invocation, keyed by parameter name.
///
/// Lookups ignore ASCII case. Accessor failures are 400 domain failures, so
/// handlers can use `?` on them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationArgs {
    values: Vec<(String, ArgValue)>,
}

impl OperationArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, ArgValue::Text(value.into()));
        self
    }

    pub fn with_json(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, ArgValue::Json(value));
        self
    }

    /// Later values for the same name replace earlier ones.
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        let name = name.into();
        match self
            .values
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn optional_text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ArgValue::Text(s) => Some(s),
            ArgValue::Json(Value::String(s)) => Some(s),
            ArgValue::Json(_) => None,
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, DomainFailure> {
        self.optional_text(name).ok_or_else(|| missing(name))
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T, DomainFailure> {
        self.optional_parse(name)?.ok_or_else(|| missing(name))
    }

    pub fn optional_parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, DomainFailure> {
        match self.optional_text(name) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                DomainFailure::bad_request(format!("Invalid value for parameter '{name}'"))
            }),
        }
    }

    /// Deserialize a parameter (usually the body) into `T`.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<T, DomainFailure> {
        let value = match self.get(name) {
            Some(ArgValue::Json(v)) => v.clone(),
            Some(ArgValue::Text(s)) => Value::String(s.clone()),
            None => return Err(missing(name)),
        };
        serde_json::from_value(value).map_err(|e| {
            DomainFailure::bad_request(format!("Invalid value for parameter '{name}': {e}"))
        })
    }
}

fn missing(name: &str) -> DomainFailure {
    DomainFailure::bad_request(format!("Missing required parameter '{name}'"))
}

/// Operation name → handler for contract type `C`.
///
/// ```rust,ignore
/// HandlerRegistry::new()
///     .operation("GetPerson", |svc: Arc<dyn PeopleApi>, args| async move {
///         let person = svc.get_person(args.parse("id")?).await?;
///         Reply::json(&person)
///     })
/// ```
pub struct HandlerRegistry<C: ?Sized> {
    handlers: HashMap<String, ContractFn<C>>,
}

impl<C: ?Sized + Send + Sync + 'static> HandlerRegistry<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for `name`, replacing any earlier one.
    pub fn operation<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<C>, OperationArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
    {
        let f: ContractFn<C> = Arc::new(move |svc, args| handler(svc, args).boxed());
        self.handlers.insert(name.into(), f);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Bind the handler for `name` to `instance`.
    pub fn bind(&self, name: &str, instance: &Arc<C>) -> Option<BoundHandler> {
        let f = self.handlers.get(name)?.clone();
        let instance = instance.clone();
        Some(Arc::new(move |args| f(instance.clone(), args)))
    }
}

impl<C: ?Sized + Send + Sync + 'static> Default for HandlerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for HandlerRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry")
            .field("operations", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    struct Counter(i64);

    #[tokio::test]
    async fn bound_handler_receives_instance_and_args() {
        let registry = HandlerRegistry::<Counter>::new().operation("Add", |svc, args| async move {
            let n: i64 = args.parse("n")?;
            Reply::json(&(svc.0 + n))
        });

        let handler = registry.bind("Add", &Arc::new(Counter(40))).unwrap();
        let reply = handler(OperationArgs::new().with_text("n", "2")).await.unwrap();
        assert_eq!(reply, Reply::Json(json!(42)));
    }

    #[test]
    fn bind_unknown_operation_is_none() {
        let registry = HandlerRegistry::<Counter>::new();
        assert!(registry.bind("Missing", &Arc::new(Counter(0))).is_none());
    }

    #[test]
    fn lookups_ignore_case() {
        let args = OperationArgs::new().with_text("firstName", "Ada");
        assert_eq!(args.optional_text("FIRSTNAME"), Some("Ada"));
        assert_eq!(args.text("firstname").unwrap(), "Ada");
    }

    #[test]
    fn missing_and_invalid_values_are_bad_requests() {
        let args = OperationArgs::new().with_text("id", "abc");

        let err = args.parse::<i64>("id").unwrap_err();
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
        assert!(err.message().contains("'id'"));

        let err = args.text("name").unwrap_err();
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Missing required parameter 'name'");

        assert_eq!(args.optional_parse::<i64>("other").unwrap(), None);
    }

    #[test]
    fn body_is_deserialized() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Body {
            name: String,
        }

        let args = OperationArgs::new().with_json("body", json!({"name": "Acme"}));
        let body: Body = args.json("body").unwrap();
        assert_eq!(body.name, "Acme");

        let bad = OperationArgs::new().with_json("body", json!({"nope": 1}));
        assert!(bad.json::<Body>("body").is_err());
    }

    #[test]
    fn insert_replaces_same_name() {
        let mut args = OperationArgs::new().with_text("id", "1");
        args.insert("ID", ArgValue::Text("2".into()));
        assert_eq!(args.len(), 1);
        assert_eq!(args.text("id").unwrap(), "2");
    }
}
