pub mod domain;
pub mod repository;

pub use domain::{ProfileFields, ProfileInput};
