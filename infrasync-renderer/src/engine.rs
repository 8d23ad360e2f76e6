//! Tera rendering engine for `infrasync generate`.
//!
//! # Output mapping
//!
//! | Template                | Output path                                 |
//! |-------------------------|---------------------------------------------|
//! | `sync_models.yaml.tera` | `<directory>/<adapter>/sync_models.yaml`    |
//! | `readme.md.tera`        | `<directory>/<adapter>/README.md`           |
//!
//! Templates found under `<directory>/templates/` with the same name replace
//! the embedded defaults.

use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::GenerateContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    (
        "sync_models.yaml.tera",
        include_str!("templates/sync_models.yaml.tera"),
    ),
    ("readme.md.tera", include_str!("templates/readme.md.tera")),
];

/// Template name → file name written under `<directory>/<adapter>/`.
pub const OUTPUTS: &[(&str, &str)] = &[
    ("sync_models.yaml.tera", "sync_models.yaml"),
    ("readme.md.tera", "README.md"),
];

/// Directory (relative to the sync directory) holding template overrides.
pub const USER_TEMPLATE_DIR: &str = "templates";

// ---------------------------------------------------------------------------
// Template loading
// ---------------------------------------------------------------------------

/// Embedded templates, each replaced by `<override_dir>/<name>` when that file exists.
fn build_tera(override_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates = Vec::with_capacity(TPLS.len());
    for (name, embedded) in TPLS {
        let path = override_dir.map(|dir| dir.join(name));
        let content = match path.filter(|p| p.is_file()) {
            Some(path) => std::fs::read_to_string(&path)
                .map_err(|source| RenderError::Io { path, source })?,
            None => (*embedded).to_string(),
        };
        templates.push((*name, content));
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// A rendered output file, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub template: String,
    pub path: PathBuf,
    pub content: String,
}

/// Tera-based engine for rendering the generated model files with optional
/// user overrides.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Construct a new [`TemplateEngine`] from the embedded templates and any
    /// same-named overrides in `override_dir`.
    pub fn new(override_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(override_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Engine for a sync rooted at `directory`, honouring `<directory>/templates/`.
    pub fn for_directory(directory: &Path) -> Result<Self, RenderError> {
        Self::new(Some(&directory.join(USER_TEMPLATE_DIR)))
    }

    /// Render every output file for the adapter described by `ctx`.
    ///
    /// Output paths live under `<directory>/<adapter name>/`.
    pub fn render(
        &self,
        ctx: &GenerateContext,
        directory: &Path,
    ) -> Result<Vec<RenderedFile>, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let adapter_dir = directory.join(&ctx.adapter.name);

        let mut results = Vec::with_capacity(OUTPUTS.len());
        for (template, file_name) in OUTPUTS {
            let content = self.tera.render(template, &tera_ctx)?;
            results.push(RenderedFile {
                template: (*template).to_string(),
                path: adapter_dir.join(file_name),
                content,
            });
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_templates_match_outputs() {
        assert_eq!(TPLS.len(), OUTPUTS.len());
        for (template, _) in OUTPUTS {
            assert!(TPLS.iter().any(|(name, _)| name == template), "{template} not embedded");
        }
    }

    #[test]
    fn engine_new_succeeds() {
        TemplateEngine::new(None).expect("embedded templates must parse");
    }

    #[test]
    fn missing_override_dir_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        TemplateEngine::for_directory(dir.path()).expect("no templates dir");
    }

    #[test]
    fn only_known_template_names_are_overridden() {
        let dir = tempfile::TempDir::new().unwrap();
        let templates = dir.path().join(USER_TEMPLATE_DIR);
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("notes.md.tera"), "{{ unclosed").unwrap();
        std::fs::write(templates.join("sync_models.yaml.tera"), "adapter: {{ adapter.name }}\n").unwrap();

        let engine = TemplateEngine::for_directory(dir.path()).expect("unknown files are ignored");
        let names: Vec<_> = engine.tera.get_template_names().collect();
        assert_eq!(names.len(), OUTPUTS.len());
    }
}
