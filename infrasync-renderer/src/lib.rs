//! # infrasync-renderer
//!
//! Tera-based template engine that renders the model manifests written by
//! `infrasync generate`, plus the one-off expressions used by field transforms.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use infrasync_core::{schema::SchemaRoot, AdapterRole, SyncInstance};
//! use infrasync_renderer::{GenerateContext, TemplateEngine};
//!
//! fn render(instance: &SyncInstance, schema: &SchemaRoot) {
//!     let ctx = GenerateContext::from_instance(instance, AdapterRole::Source, schema);
//!     if let Ok(engine) = TemplateEngine::new(None) {
//!         if let Ok(outputs) = engine.render(&ctx, &instance.directory) {
//!             for output in outputs {
//!                 println!("{}: {} bytes", output.path.display(), output.content.len());
//!             }
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod transform;

pub use context::GenerateContext;
pub use engine::{RenderedFile, TemplateEngine};
pub use error::RenderError;
pub use transform::render_expression;
