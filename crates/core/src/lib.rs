pub mod definition;
pub mod error;
pub mod handle;
pub mod ids;
pub mod operation;
pub mod validation;

pub use definition::{DiscoveredMetadata, FieldDefinition, FieldOverrides, MergedMetadata};
pub use error::CoreError;
pub use handle::HandleCheck;
pub use ids::*;
pub use operation::{CreatedItem, EntityKind, FailedItem, Operation, OperationLedger};
pub use validation::{ValidationRule, ValueKind};
