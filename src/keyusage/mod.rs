//! Activity based key usage enforcement.
//!
//! A [`KeyUsagePolicy`] says which key usage bits and extended key usage
//! purposes allow which [`KeyUsageActivity`]; a [`KeyUsageChecker`] applies
//! it to certificates whose usage extensions are marked critical.

mod activity;
pub mod checker;
pub mod policy;

pub use activity::KeyUsageActivity;
pub use checker::{KeyUsageChecker, KeyUsageCheckerHandle};
pub use policy::{KeyUsagePolicy, KeyUsagePolicyDeclaration, PermitDeclaration, PermitRule};
