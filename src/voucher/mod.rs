pub mod domain;
pub mod entitlements;
pub mod repository;

pub use entitlements::{
    DynEntitlementGranter, EntitlementError, EntitlementGranter, MockEntitlementGranter,
    RevenueCatClient,
};
