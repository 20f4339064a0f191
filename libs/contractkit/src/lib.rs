//! # ContractKit - Contract-driven HTTP routing
//!
//! Turns a declaratively described service contract into an immutable routing table.
//!
//! ## Features
//!
//! - **Declarative**: contracts are described with builders (`ContractDecl`, `OperationDecl`)
//! - **Inherited metadata**: contract-level metadata flows into every operation and can be
//!   overridden per operation (scalars) or extended (tags, items)
//! - **Policy unions**: contract and operation authorization policies are merged
//! - **Fail-fast binding**: unsupported verbs and missing handlers abort registration
//! - **Uniform failures**: handler failures become RFC 9457 problem responses
//!
//! ## Example
//!
//! ```rust,ignore
//! use contractkit::{register_contract, ServiceHub};
//!
//! let hub = ServiceHub::new();
//! hub.register::<dyn PeopleApi>(Arc::new(PeopleService::seeded()));
//!
//! // Resolve → extract → merge → bind
//! let table = register_contract::<dyn PeopleApi>(&hub)?;
//! ```

pub mod api;
pub mod binder;
pub mod contract;
pub mod handler;
pub mod metadata;
pub mod policy;
pub mod service_hub;

pub use api::failure::{translate_failure, translate_panic, DomainFailure, UNHANDLED_EXCEPTION};
pub use api::problem::{
    bad_request, internal_error, not_found, Problem, ProblemResponse, APPLICATION_PROBLEM_JSON,
};
pub use binder::{register_contract, RegistrationError, RouteBinder, RouteEntry, RoutingTable, Verb};
pub use contract::{
    extract, parse_template, BindingSource, Contract, ContractDecl, ContractDescriptor,
    OperationDecl, OperationDescriptor, ParamBinding, ParamDecl, RouteDecl, TemplateError,
};
pub use handler::{ArgValue, HandlerRegistry, OperationArgs, Reply};
pub use metadata::{
    merge_metadata, EffectiveMetadata, HttpLogging, HttpLoggingFields, Metadata, RequestTimeout,
    TimeoutPolicy,
};
pub use policy::{resolve_policies, PolicySet};
pub use service_hub::{ServiceHub, ServiceHubError};
