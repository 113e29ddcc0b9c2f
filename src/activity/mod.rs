pub mod domain;
pub mod repository;

pub use domain::{ActivityChange, ActivityType, ListFilter, PullWindow, SyncOutcome};
pub use repository::{
    ActivityRepository, DynActivityRepository, PullPage, RepositoryError,
    SqliteActivityRepository,
};
