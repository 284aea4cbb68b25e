//! Model Management Module
//!
//! Artifact serialization and on-disk export of trained models.

pub mod exporter;
pub mod serializer;

pub use exporter::ArtifactExporter;
pub use serializer::ArtifactSerializer;
