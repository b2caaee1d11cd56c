pub mod config;
pub mod constants;

pub use config::{
    FrameSelectionConfig, MissingAnglePolicy, NormalizationConfig, PipelineConfig,
    PipelineConfigError, load_pipeline_config,
};
