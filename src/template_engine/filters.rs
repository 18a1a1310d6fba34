//! Tera filters registered on every compiled template.

use std::collections::HashMap;

use heck::{ToKebabCase, ToSnakeCase, ToTitleCase};
use tera::{Result, Tera, Value};

/// Register the skin filter set on a Tera instance.
pub(crate) fn register(tera: &mut Tera) {
    tera.register_filter("slug", slug);
    tera.register_filter("snake_case", snake_case);
    tera.register_filter("title_case", title_case);
}

fn as_str<'a>(value: &'a Value, filter: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| tera::Error::msg(format!("{filter} filter expects a string")))
}

/// URL-safe lowercase-hyphenated form, for ids and fragment anchors.
fn slug(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(Value::String(as_str(value, "slug")?.to_kebab_case()))
}

fn snake_case(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(Value::String(as_str(value, "snake_case")?.to_snake_case()))
}

/// Space-separated capitalized words, for headings built from identifiers.
fn title_case(value: &Value, _args: &HashMap<String, Value>) -> Result<Value> {
    Ok(Value::String(as_str(value, "title_case")?.to_title_case()))
}
