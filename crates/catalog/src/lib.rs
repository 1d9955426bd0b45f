//! Capability catalog
//!
//! Discovers workflow and agent documents under the project, user and package roots,
//! parses their metadata blocks and merges them into one [`ResolvedCapabilitySet`]
//! where the highest-precedence tier wins per logical name.

pub mod parser;
mod resolver;
mod types;

pub use parser::{FieldValidation, parse_strict, parse_tolerant, strip_metadata, validate_required_fields};
pub use resolver::{Resolver, ResolverOptions};
pub use types::{
    CapabilityDocument, CapabilityKey, CapabilityKind, Metadata, MetadataValue, Resolution, ResolvedCapabilitySet,
    Tier, TierRoot, UNCATEGORIZED,
};
