/// Periodic trigger tasks.
///
/// Each task is a single request-scoped run: resolve collaborators,
/// fetch, merge, persist, return. There is no scheduler in-process;
/// cron-style triggers invoke the binaries in `src/bin/`.
///
/// Submodules:
/// - `collector`: pulls provider water levels into the sample store.
/// - `dashboard_builder`: rebuilds cached station dashboards.

use std::fmt;

use crate::dashboard::DashboardError;
use crate::measurement::MergeError;
use crate::model::ProviderError;
use crate::period::PeriodError;
use crate::stations::RepositoryError;
use crate::store::StoreError;

pub mod collector;
pub mod dashboard_builder;

// ---------------------------------------------------------------------------
// Task errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum TaskError {
    /// The station ID is not known to the repository.
    StationNotFound(String),
    /// The station has no external ID for the provider.
    MissingExternalId(String),
    Provider(ProviderError),
    Store(StoreError),
    Repository(RepositoryError),
    Dashboard(DashboardError),
    Merge(MergeError),
    Period(PeriodError),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::StationNotFound(id) => write!(f, "station not found: {}", id),
            TaskError::MissingExternalId(id) => {
                write!(f, "station {} has no PegelOnline ID", id)
            }
            TaskError::Provider(e) => write!(f, "provider: {}", e),
            TaskError::Store(e) => write!(f, "store: {}", e),
            TaskError::Repository(e) => write!(f, "station repository: {}", e),
            TaskError::Dashboard(e) => write!(f, "dashboard repository: {}", e),
            TaskError::Merge(e) => write!(f, "merge: {}", e),
            TaskError::Period(e) => write!(f, "period: {}", e),
        }
    }
}

impl std::error::Error for TaskError {}

impl From<ProviderError> for TaskError {
    fn from(e: ProviderError) -> Self {
        TaskError::Provider(e)
    }
}

impl From<StoreError> for TaskError {
    fn from(e: StoreError) -> Self {
        TaskError::Store(e)
    }
}

impl From<RepositoryError> for TaskError {
    fn from(e: RepositoryError) -> Self {
        TaskError::Repository(e)
    }
}

impl From<DashboardError> for TaskError {
    fn from(e: DashboardError) -> Self {
        TaskError::Dashboard(e)
    }
}

impl From<MergeError> for TaskError {
    fn from(e: MergeError) -> Self {
        TaskError::Merge(e)
    }
}

impl From<PeriodError> for TaskError {
    fn from(e: PeriodError) -> Self {
        TaskError::Period(e)
    }
}
