//! HTTP boundary types: problem responses and the failure translator.

pub mod failure;
pub mod problem;

pub use failure::{translate_failure, translate_panic, DomainFailure};
pub use problem::{Problem, ProblemResponse, APPLICATION_PROBLEM_JSON};
