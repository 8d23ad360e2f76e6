//! One-off expressions used by `transforms` in a model mapping.
//!
//! An expression is a Tera template rendered against the item's field values:
//! `"{{ name | upper }}"`, `"{{ site }}-{{ rack }}"`.

use serde_json::{Map, Value};
use tera::{Context, Tera};

use crate::error::RenderError;

/// Render `expression` with `values` as the template context.
pub fn render_expression(expression: &str, values: &Map<String, Value>) -> Result<String, RenderError> {
    let context = Context::from_serialize(values)?;
    Ok(Tera::one_off(expression, &context, false)?)
}
