//! Configuration for the alignment pipeline.

mod settings;

pub use settings::{
    expand_path, Config, EncoderConfig, FusionConfig, OrchestratorConfig, ProjectionConfig,
    RetrievalConfig,
};
