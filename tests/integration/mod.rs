//! Integration tests for the assetforge pipelines

mod classification;
mod keying;
mod manifest_compat;
mod pipeline_resume;
