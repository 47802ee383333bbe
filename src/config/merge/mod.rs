//! Config composition: defaults and source precedence.

mod merge_policy;
pub mod service;
