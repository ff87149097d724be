//! OpenAPI 3.1 conformance checks.
//!
//! Structure is checked by `jsonschema` against the bundled OpenAPI 3.1
//! schema in `assets/schemas`. On top of that, local `$ref` pointers must
//! resolve within the document and operation ids must be unique.

use include_dir::{Dir, include_dir};
use jsonschema::{ValidationError, Validator};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::error::Failure;

static ASSETS: Dir = include_dir!("$CARGO_MANIFEST_DIR/assets");

const SCHEMA_PATH: &str = "schemas/openapi-3.1.json";

const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

// Keys whose values are literal data, not OpenAPI or Schema objects.
const LITERAL_KEYS: [&str; 4] = ["example", "default", "const", "enum"];

// Keys whose values are maps from user-chosen names to objects. A name such
// as `default` in these maps is not a literal.
const NAMED_MAPS: [&str; 20] = [
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "definitions",
    "paths",
    "webhooks",
    "schemas",
    "responses",
    "parameters",
    "examples",
    "requestBodies",
    "headers",
    "securitySchemes",
    "links",
    "callbacks",
    "pathItems",
    "content",
    "encoding",
    "variables",
];

pub struct SpecValidator {
    schema: Validator,
}

impl SpecValidator {
    /// Compile the bundled OpenAPI 3.1 schema.
    pub fn bundled() -> Result<Self, Failure> {
        let file = ASSETS.get_file(SCHEMA_PATH).ok_or_else(|| {
            Failure::MissingDependency(format!("bundled schema {SCHEMA_PATH} is missing"))
        })?;
        let schema: Value = serde_json::from_slice(file.contents()).map_err(|err| {
            Failure::MissingDependency(format!("bundled schema {SCHEMA_PATH} is not JSON: {err}"))
        })?;
        let schema = jsonschema::draft202012::new(&schema).map_err(|err| {
            Failure::MissingDependency(format!(
                "bundled schema {SCHEMA_PATH} failed to compile: {err}"
            ))
        })?;
        Ok(Self { schema })
    }

    pub fn validate(&self, document: &Value) -> Result<(), Failure> {
        let mut problems: Vec<String> = self
            .schema
            .iter_errors(document)
            .map(|err| located(&err))
            .collect();
        problems.extend(unresolved_references(document));
        problems.extend(duplicate_operation_ids(document));

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Failure::Schema(problems.join("\n")))
        }
    }
}

fn located(err: &ValidationError<'_>) -> String {
    match err.instance_path().as_str() {
        "" => format!("/: {err}"),
        path => format!("{path}: {err}"),
    }
}

fn unresolved_references(document: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    collect_refs(document, true, &mut refs);

    let mut seen = HashSet::new();
    refs.into_iter()
        .filter(|reference| seen.insert(*reference))
        .filter(|reference| !resolves(document, reference))
        .map(|reference| format!("unresolvable reference {reference:?}"))
        .collect()
}

fn collect_refs<'a>(value: &'a Value, skip_literals: bool, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => collect_refs_in_object(map, skip_literals, out),
        Value::Array(items) => {
            for item in items {
                collect_refs(item, true, out);
            }
        }
        _ => {}
    }
}

fn collect_refs_in_object<'a>(
    map: &'a Map<String, Value>,
    skip_literals: bool,
    out: &mut Vec<&'a str>,
) {
    for (key, child) in map {
        let key = key.as_str();
        if key == "$ref" {
            if let Value::String(reference) = child {
                out.push(reference.as_str());
                continue;
            }
        }
        if skip_literals && LITERAL_KEYS.contains(&key) {
            continue;
        }
        // JSON Schema `examples` is an array of literal instances.
        if key == "examples" && child.is_array() {
            continue;
        }
        let named_map = skip_literals && NAMED_MAPS.contains(&key);
        collect_refs(child, !named_map, out);
    }
}

/// Only same-document JSON pointers are checked; remote refs and anchors pass.
fn resolves(document: &Value, reference: &str) -> bool {
    let Some(fragment) = reference.strip_prefix('#') else {
        return true;
    };
    if fragment.is_empty() {
        return true;
    }
    if !fragment.starts_with('/') {
        return true;
    }
    match percent_decode_str(fragment).decode_utf8() {
        Ok(pointer) => document.pointer(&pointer).is_some(),
        Err(_) => false,
    }
}

fn duplicate_operation_ids(document: &Value) -> Vec<String> {
    let mut owners: HashMap<&str, String> = HashMap::new();
    let mut problems = Vec::new();

    for section in ["paths", "webhooks"] {
        let Some(items) = document.get(section).and_then(Value::as_object) else {
            continue;
        };
        for (path, item) in items {
            for method in HTTP_METHODS {
                let Some(id) = item
                    .get(method)
                    .and_then(|operation| operation.get("operationId"))
                    .and_then(Value::as_str)
                else {
                    continue;
                };
                let location = format!("{} {path}", method.to_uppercase());
                match owners.get(id) {
                    Some(first) => problems.push(format!(
                        "operationId {id:?} is used by both {first} and {location}"
                    )),
                    None => {
                        owners.insert(id, location);
                    }
                }
            }
        }
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "openapi": "3.1.0",
            "info": { "title": "Example", "version": "1.0.0" },
            "paths": {
                "/items/{id}": {
                    "get": {
                        "operationId": "getItem",
                        "parameters": [{
                            "name": "id",
                            "in": "path",
                            "required": true,
                            "schema": { "type": "string" }
                        }],
                        "responses": {
                            "200": {
                                "description": "Item",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Item" }
                                    }
                                }
                            },
                            "default": { "$ref": "#/components/responses/Error" }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Item": {
                        "type": "object",
                        "properties": {
                            "default": { "$ref": "#/components/schemas/Flag" },
                            "tags": { "type": "array", "items": { "type": "string" } }
                        }
                    },
                    "Flag": { "type": "boolean" }
                },
                "responses": {
                    "Error": { "description": "Something went wrong" }
                }
            }
        })
    }

    fn validator() -> SpecValidator {
        SpecValidator::bundled().unwrap()
    }

    fn schema_message(result: Result<(), Failure>) -> String {
        match result {
            Err(Failure::Schema(message)) => message,
            other => panic!("expected schema failure, got {other:?}"),
        }
    }

    #[test]
    fn bundled_schema_compiles() {
        assert!(SpecValidator::bundled().is_ok());
    }

    #[test]
    fn accepts_minimal_document() {
        validator().validate(&minimal()).unwrap();
    }

    #[test]
    fn accepts_components_only_document() {
        let doc = json!({
            "openapi": "3.1.0",
            "info": { "title": "Schemas", "version": "2" },
            "components": { "schemas": { "Empty": {} } }
        });
        validator().validate(&doc).unwrap();
    }

    #[test]
    fn rejects_missing_info() {
        let mut doc = minimal();
        doc.as_object_mut().unwrap().remove("info");
        let message = schema_message(validator().validate(&doc));
        assert!(message.contains("info"), "{message}");
    }

    #[test]
    fn structural_errors_name_their_location() {
        let mut doc = minimal();
        doc["paths"]["/items/{id}"]["get"]["responses"]["200"]["description"] = json!(5);
        let message = schema_message(validator().validate(&doc));
        assert!(
            message.contains("/paths/~1items~1{id}/get/responses/200/description: 5 is not of type"),
            "{message}"
        );
    }

    #[test]
    fn root_errors_are_located_at_the_document_root() {
        let mut doc = minimal();
        doc.as_object_mut().unwrap().remove("info");
        let message = schema_message(validator().validate(&doc));
        assert!(message.contains("/: \"info\" is a required property"), "{message}");
    }

    #[test]
    fn rejects_path_parameter_that_is_not_required() {
        let mut doc = minimal();
        doc["paths"]["/items/{id}"]["get"]["parameters"][0]["required"] = json!(false);
        assert!(validator().validate(&doc).is_err());
    }

    #[test]
    fn rejects_unknown_top_level_fields_but_allows_extensions() {
        let mut doc = minimal();
        doc["x-internal"] = json!(true);
        validator().validate(&doc).unwrap();

        doc["swagger"] = json!("2.0");
        assert!(validator().validate(&doc).is_err());
    }

    #[test]
    fn reports_unresolvable_references() {
        let mut doc = minimal();
        doc["components"]["schemas"]
            .as_object_mut()
            .unwrap()
            .remove("Flag");
        let message = schema_message(validator().validate(&doc));
        assert!(
            message.contains(r##"unresolvable reference "#/components/schemas/Flag""##),
            "{message}"
        );
    }

    #[test]
    fn ignores_refs_inside_literal_values() {
        let mut doc = minimal();
        doc["components"]["schemas"]["Flag"]["default"] = json!({ "$ref": "#/nowhere" });
        doc["components"]["schemas"]["Flag"]["examples"] = json!([{ "$ref": "#/nowhere" }]);
        validator().validate(&doc).unwrap();
    }

    #[test]
    fn resolves_escaped_and_percent_encoded_pointers() {
        let doc = minimal();
        assert!(resolves(&doc, "#/paths/~1items~1%7Bid%7D/get"));
        assert!(!resolves(&doc, "#/paths/~1items/get"));
        assert!(!resolves(&doc, "#/paths/%zz"));
        assert!(resolves(&doc, "other.yaml#/components/schemas/Item"));
        assert!(resolves(&doc, "#"));
    }

    #[test]
    fn reports_duplicate_operation_ids() {
        let mut doc = minimal();
        doc["paths"]["/items"] = json!({
            "post": {
                "operationId": "getItem",
                "responses": { "201": { "description": "Created" } }
            }
        });
        let message = schema_message(validator().validate(&doc));
        assert!(
            message.contains(r#"operationId "getItem" is used by both GET /items/{id} and POST /items"#),
            "{message}"
        );
    }
}
