use std::collections::BTreeSet;

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueSet, ValueString};
use tf_provider::{AttributePath, Diagnostics};

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

#[async_trait]
pub(crate) trait WithValidate {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

pub(crate) trait WithNormalize {
    fn normalize(&mut self, diags: &mut Diagnostics);
}

/// Known strings of a set, skipping null and unknown elements
pub(crate) fn set_strings<'b>(set: &'b ValueSet<ValueString<'_>>) -> BTreeSet<&'b str> {
    set.iter()
        .flatten()
        .filter_map(|value| value.as_deref_option())
        .collect()
}

/// Mark `attribute` for replacement when its value changes between `prior` and `proposed`
pub(crate) fn replace_on_change<T: PartialEq>(
    replace: &mut Vec<AttributePath>,
    attribute: &'static str,
    prior: &Value<T>,
    proposed: &Value<T>,
) {
    if !proposed.is_unknown() && prior != proposed {
        replace.push(AttributePath::new(attribute));
    }
}

/// Set `value` to unknown when it is not yet known, so that it can be computed later on
pub(crate) fn unknown_if_null<T>(value: &mut Value<T>) {
    if value.is_null() {
        *value = Value::Unknown;
    }
}
