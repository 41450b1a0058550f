//! Collection of `outputs` struct fields into Auxiliaries.

use keel_core::{Auxiliary, ExecutionContext, Object};
use keel_lang::Value;

use crate::error::RenderError;

/// Register every regular field of `outputs` as a named Auxiliary produced
/// by `kind`, in declaration order. Definition, hidden and optional fields
/// are skipped. A value that is not a struct registers nothing.
///
/// Nothing is registered unless every field wraps.
pub fn collect_outputs(
    renderer: &str,
    kind: &str,
    outputs: &Value,
    ctx: &mut dyn ExecutionContext,
) -> Result<usize, RenderError> {
    let Ok(fields) = outputs.fields() else {
        tracing::debug!(renderer, found = outputs.kind_name(), "outputs is not a struct, skipped");
        return Ok(0);
    };
    let mut collected = Vec::new();
    for field in fields.iter().filter(|f| !f.attrs.is_excluded()) {
        let instance = Object::new(field.value.clone()).map_err(|source| RenderError::Wrap {
            renderer: renderer.to_string(),
            field: format!("outputs.{}", field.name),
            source,
        })?;
        collected.push(Auxiliary {
            instance,
            kind: kind.to_string(),
            name: field.name.clone(),
            is_outputs: true,
        });
    }
    let count = collected.len();
    for auxiliary in collected {
        ctx.put_auxiliary(auxiliary);
    }
    Ok(count)
}
