//! Route binding: contract descriptor + instance → routing table

use futures::FutureExt;
use http::Method;
use serde::Serialize;
use std::{fmt, panic::AssertUnwindSafe, sync::Arc};

use crate::api::failure::{translate_failure, translate_panic};
use crate::api::problem::Problem;
use crate::contract::{extract, parse_template, Contract, ContractDescriptor, ParamBinding};
use crate::handler::{BoundHandler, HandlerRegistry, OperationArgs, Reply};
use crate::metadata::{merge_metadata, EffectiveMetadata};
use crate::policy::{resolve_policies, PolicySet};
use crate::service_hub::{ServiceHub, ServiceHubError};

/// HTTP verbs a route can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Verb {
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Self::Get),
            Method::POST => Some(Self::Post),
            Method::PUT => Some(Self::Put),
            Method::DELETE => Some(Self::Delete),
            Method::PATCH => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn as_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
            Self::Patch => Method::PATCH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration failures. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("contract '{contract}', operation '{operation}': unsupported HTTP verb '{verb}'")]
    UnsupportedVerb {
        contract: String,
        operation: String,
        verb: String,
    },

    #[error("contract '{contract}': service instance could not be resolved")]
    ServiceUnresolvable {
        contract: String,
        #[source]
        source: ServiceHubError,
    },

    #[error("contract '{contract}', operation '{operation}': cannot create handler: {reason}")]
    HandlerCreationFailure {
        contract: String,
        operation: String,
        reason: String,
    },
}

/// One bound route.
#[derive(Clone)]
pub struct RouteEntry {
    pub verb: Verb,
    pub path: String,
    pub contract: String,
    pub operation: String,
    pub bindings: Arc<[ParamBinding]>,
    pub metadata: Arc<EffectiveMetadata>,
    pub policies: PolicySet,
    handler: BoundHandler,
}

impl RouteEntry {
    /// Run the handler. Failures and panics come back as problems.
    pub async fn invoke(&self, args: OperationArgs) -> Result<Reply, Problem> {
        let started = std::panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(args)));
        let fut = match started {
            Ok(fut) => fut,
            Err(payload) => return Err(translate_panic(payload)),
        };

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => Err(translate_failure(&err)),
            Err(payload) => Err(translate_panic(payload)),
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("contract", &self.contract)
            .field("operation", &self.operation)
            .field("bindings", &self.bindings)
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

/// All routes of one contract, in declaration order.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    pub contract: String,
    entries: Vec<RouteEntry>,
}

impl RoutingTable {
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, verb: Verb, path: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|e| e.verb == verb && e.path == path)
    }

    pub fn into_entries(self) -> Vec<RouteEntry> {
        self.entries
    }
}

/// Binds extracted operations to handlers on a resolved instance.
pub struct RouteBinder<C: ?Sized> {
    registry: HandlerRegistry<C>,
    instance: Arc<C>,
}

impl<C: ?Sized + Send + Sync + 'static> RouteBinder<C> {
    pub fn new(registry: HandlerRegistry<C>, instance: Arc<C>) -> Self {
        Self { registry, instance }
    }

    /// Build the routing table. The first failure aborts the whole table.
    pub fn bind(&self, descriptor: &ContractDescriptor) -> Result<RoutingTable, RegistrationError> {
        let contract = descriptor.name.as_str();
        let mut entries = Vec::new();

        for op in &descriptor.operations {
            if op.excluded {
                tracing::debug!(contract, operation = %op.name, "skipping excluded operation");
                continue;
            }
            if op.routes.is_empty() {
                tracing::debug!(contract, operation = %op.name, "operation declares no routes");
                continue;
            }

            let metadata = Arc::new(merge_metadata(&descriptor.metadata, &op.metadata));
            let policies = resolve_policies(&descriptor.policies, &op.policies);
            let bindings: Arc<[ParamBinding]> = op.bindings.clone().into();

            for route in &op.routes {
                let verb = Verb::from_method(&route.method).ok_or_else(|| {
                    RegistrationError::UnsupportedVerb {
                        contract: contract.to_string(),
                        operation: op.name.clone(),
                        verb: route.method.to_string(),
                    }
                })?;

                let creation_failure = |reason: String| RegistrationError::HandlerCreationFailure {
                    contract: contract.to_string(),
                    operation: op.name.clone(),
                    reason,
                };

                parse_template(&route.path).map_err(|e| creation_failure(e.to_string()))?;
                let handler = self.registry.bind(&op.name, &self.instance).ok_or_else(|| {
                    creation_failure("no handler registered for this operation".to_string())
                })?;

                tracing::debug!(
                    contract,
                    operation = %op.name,
                    verb = %verb,
                    path = %route.path,
                    policies = ?policies.as_slice(),
                    "route bound"
                );

                entries.push(RouteEntry {
                    verb,
                    path: route.path.clone(),
                    contract: contract.to_string(),
                    operation: op.name.clone(),
                    bindings: bindings.clone(),
                    metadata: metadata.clone(),
                    policies: policies.clone(),
                    handler,
                });
            }
        }

        Ok(RoutingTable {
            contract: contract.to_string(),
            entries,
        })
    }
}

/// Resolve the instance for `C` from `hub`, extract its declaration and bind it.
pub fn register_contract<C>(hub: &ServiceHub) -> Result<RoutingTable, RegistrationError>
where
    C: Contract + ?Sized,
{
    let instance = hub
        .resolve::<C>()
        .map_err(|source| RegistrationError::ServiceUnresolvable {
            contract: C::NAME.to_string(),
            source,
        })?;

    let descriptor = extract(&C::declare());
    let table = RouteBinder::new(C::handlers(), instance).bind(&descriptor)?;

    tracing::info!(contract = C::NAME, routes = table.len(), "contract registered");
    Ok(table)
}
