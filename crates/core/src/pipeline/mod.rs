pub mod face_filter;
pub mod face_pipeline;
pub mod pipeline_config;
pub mod pipeline_listener;
pub mod pipeline_logger;
