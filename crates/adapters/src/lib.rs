//! Host-tool projectors
//!
//! Turns a [`ResolvedCapabilitySet`](capforge_catalog::ResolvedCapabilitySet) into the
//! artifact tree each host tool expects. Projection is pure; [`write_artifacts`] is the
//! only place that touches an output directory.

pub mod claude;
pub mod cursor;
mod header;
mod naming;
mod projector;
pub mod qoder;
mod source;
mod writer;

pub use claude::{ClaudeProjector, PluginManifest};
pub use cursor::CursorProjector;
pub use projector::{
    AdapterArtifact, ArtifactRole, Projection, ProjectionCounts, ProjectionOptions, Projector, ProjectorSettings, Target,
    projector_for,
};
pub use qoder::QoderProjector;
pub use writer::{WriteOptions, WriteSummary, write_artifacts};
