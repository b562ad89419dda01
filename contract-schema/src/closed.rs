//! Closed-object schema rewriting.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

const SCHEMA_MAPS: &[&str] = &["properties", "patternProperties", "definitions", "$defs", "dependentSchemas"];
const SCHEMA_SINGLES: &[&str] = &[
    "additionalProperties",
    "items",
    "additionalItems",
    "contains",
    "not",
    "if",
    "then",
    "else",
    "propertyNames",
    "unevaluatedProperties",
];
const SCHEMA_LISTS: &[&str] = &["anyOf", "oneOf", "prefixItems", "items"];
const COMBINATORS: &[&str] = &["allOf", "anyOf", "oneOf"];

/// Returns a copy of `schema` in which every object schema that declares its
/// shape and does not say otherwise rejects undeclared properties.
///
/// An object schema is one with `properties` or `type: object`. Schemas that
/// already set `additionalProperties`, `patternProperties` or
/// `unevaluatedProperties` are left as authored.
///
/// Members of `allOf` only describe part of the object, so they are never
/// closed themselves; their nested schemas are. When an object schema is
/// closed, the property names declared by its `allOf`, `anyOf` and `oneOf`
/// members are added to its own `properties` and those members stay open.
/// If any member allows extra properties, the parent is left open.
#[must_use]
pub fn close_object_schemas(schema: &Value) -> Value {
    close(schema, true)
}

fn close(schema: &Value, may_close: bool) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let seals = may_close
        && describes_object(map)
        && !declares_extra_policy(map)
        && !members_allow_extras(map);

    let mut closed = Map::with_capacity(map.len() + 1);
    for (key, value) in map {
        let rewritten = match key.as_str() {
            k if SCHEMA_MAPS.contains(&k) => close_map(value),
            "allOf" => close_list(value, false),
            "anyOf" | "oneOf" => close_list(value, may_close && !seals),
            k if SCHEMA_LISTS.contains(&k) && value.is_array() => close_list(value, true),
            k if SCHEMA_SINGLES.contains(&k) => close(value, true),
            _ => value.clone(),
        };
        closed.insert(key.clone(), rewritten);
    }

    if seals {
        let inherited = member_property_names(map);
        if !inherited.is_empty() {
            let properties = closed
                .entry("properties")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(properties) = properties {
                for name in inherited {
                    properties
                        .entry(name)
                        .or_insert_with(|| Value::Object(Map::new()));
                }
            }
        }
        closed.insert("additionalProperties".to_owned(), Value::Bool(false));
    }
    Value::Object(closed)
}

fn close_map(value: &Value) -> Value {
    match value {
        Value::Object(members) => Value::Object(
            members
                .iter()
                .map(|(name, schema)| (name.clone(), close(schema, true)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn close_list(value: &Value, may_close: bool) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|item| close(item, may_close)).collect()),
        other => other.clone(),
    }
}

fn describes_object(map: &Map<String, Value>) -> bool {
    if map.contains_key("properties") {
        return true;
    }
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds.iter().any(|kind| kind == "object"),
        _ => false,
    }
}

fn declares_extra_policy(map: &Map<String, Value>) -> bool {
    ["additionalProperties", "patternProperties", "unevaluatedProperties"]
        .iter()
        .any(|key| map.contains_key(*key))
}

fn combinator_members(map: &Map<String, Value>) -> impl Iterator<Item = &Map<String, Value>> {
    COMBINATORS
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_object)
}

/// Property names declared by combinator members, including nested ones.
fn member_property_names(map: &Map<String, Value>) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for member in combinator_members(map) {
        if let Some(Value::Object(properties)) = member.get("properties") {
            names.extend(properties.keys().cloned());
        }
        names.extend(member_property_names(member));
    }
    names
}

/// True when a combinator member accepts properties beyond its `properties`.
fn members_allow_extras(map: &Map<String, Value>) -> bool {
    combinator_members(map).any(|member| {
        member.contains_key("patternProperties")
            || member.contains_key("unevaluatedProperties")
            || member
                .get("additionalProperties")
                .is_some_and(|policy| *policy != Value::Bool(false))
            || members_allow_extras(member)
    })
}
