//! Reusable dependent-resource variants.
//!
//! Common subordinate objects primary resources tend to need (a role, a
//! binding, a configuration secret), ready to be registered as dependents.
//! Domain-specific variants implement [`crate::DependentResource`] directly.

pub mod role;
pub mod role_binding;
pub mod secret;

pub use role::RoleDependent;
pub use role_binding::RoleBindingDependent;
pub use secret::SecretDependent;
