//! Drishti Policy - object model, service registry, and flattener
//!
//! The policy model distinguishes the universal sentinel (`all`) as a
//! dedicated `Any` variant instead of a magic name check, so evaluation
//! never depends on string comparison. Raw member-name lists live on
//! [`PolicyDraft`] until [`flatten`] resolves them into flat axis lists.

pub mod flatten;
pub mod model;
pub mod provider;
pub mod services;

pub use flatten::flatten;
pub use model::{
    is_universal_name, Action, AddressObject, ObjectCatalog, Policy, PolicyDraft, PolicySet,
    ServiceObject,
};
pub use provider::PolicyProvider;
pub use services::{lookup, ServiceEntry};
