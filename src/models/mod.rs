pub mod dimension;
pub mod entity;
pub mod family;
pub mod group;
pub mod record;

pub use dimension::{Branch, Periodicity, QueryKey};
pub use entity::{Entity, Sphere};
pub use family::{DimensionSchema, FamilyDescriptor, ReportFamily, SphereRules, Variant};
pub use group::{Group, UNKNOWN_REGION};
pub use record::{FailureEntry, ResultRecord, Row, TAG_COLUMNS};
