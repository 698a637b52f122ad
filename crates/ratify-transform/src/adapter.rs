//! # Foreign Record Adapters
//!
//! Third-party record shapes (data classes from other libraries, generated
//! structs, ...) are not first-class record schemas. They participate as
//! ordinary registry entries keyed on a detector predicate: the input is
//! coerced to a mapping through the registry, filtered to the keys the
//! foreign type declares, and wrapped as an [`Object`] of that type.

use tracing::trace;

use ratify_core::{ConversionError, Object, RatifyError, TypeDescriptor, Value};

use crate::matcher::Matcher;
use crate::registry::{Converter, TransformerRegistry};

/// Build a foreign record instance of `target` from arbitrary input.
///
/// # Errors
///
/// Returns the mapping conversion error when the input cannot be viewed as
/// a mapping.
pub fn foreign_record(
    converter: &Converter<'_>,
    value: &Value,
    target: &TypeDescriptor,
) -> Result<Value, RatifyError> {
    let mapping = match value {
        Value::Map(m) => m.clone(),
        other => match converter.convert(other, &TypeDescriptor::map())? {
            Value::Map(m) => m,
            got => {
                return Err(ConversionError::new(
                    target.name(),
                    got,
                    "mapping conversion produced a non-mapping",
                )
                .into())
            }
        },
    };
    let fields: Vec<(String, Value)> = target
        .fields()
        .iter()
        .filter_map(|name| mapping.get_str(name).map(|v| (name.clone(), v.clone())))
        .collect();
    trace!(
        target = %target,
        kept = fields.len(),
        dropped = mapping.len().saturating_sub(fields.len()),
        "built foreign record"
    );
    Ok(Value::Object(Object::new(target.name(), fields)))
}

/// Register [`foreign_record`] for every target type `detector` accepts.
pub fn register_foreign_records(
    registry: &TransformerRegistry,
    detector: impl Fn(&TypeDescriptor) -> bool + Send + Sync + 'static,
) {
    registry
        .register(Matcher::detector(detector))
        .with(foreign_record);
}
