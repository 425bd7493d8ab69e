pub mod bulk;
pub mod learner;
pub mod resolver;
pub mod store;

pub use bulk::{AliasOverrides, ImportSummary};
pub use store::{AddOutcome, RegistryError, SupplierEntry, SupplierRegistry};
