//! Swagger 2.0 export of a [`Registry`]
//!
//! Read-only: the document is derived entirely from method descriptors.
//! Each method gets a `POST` path whose body schema is the
//! `<method>_params` definition; record types land in `definitions`.

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};

use crate::registry::{MethodDescriptor, Registry};

/// Document metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSpecConfig {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    /// Prefix each method name is appended to, e.g. `/api/`
    pub path_prefix: String,
}

impl Default for ApiSpecConfig {
    fn default() -> Self {
        Self {
            title: "Instant API".to_string(),
            version: "0.0.1".to_string(),
            description: None,
            path_prefix: "/api/".to_string(),
        }
    }
}

impl ApiSpecConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }
}

/// Render the whole registry as a Swagger 2.0 document
pub fn export_apispec(registry: &Registry, config: &ApiSpecConfig) -> Value {
    let mut definitions = Map::new();
    let mut paths = Map::new();
    let mut tags = BTreeSet::new();

    for descriptor in registry.descriptors() {
        tags.extend(descriptor.tags.iter().cloned());
        let params_name = format!("{}_params", descriptor.name);
        let params_schema = params_schema(descriptor, &mut definitions);
        definitions.insert(params_name.clone(), params_schema);

        let operation = operation(descriptor, &params_name, &mut definitions);
        paths.insert(
            format!("{}{}", config.path_prefix, descriptor.name),
            json!({"post": operation}),
        );
    }

    let mut info = Map::new();
    info.insert("title".to_string(), json!(config.title));
    info.insert("version".to_string(), json!(config.version));
    if let Some(description) = &config.description {
        info.insert("description".to_string(), json!(description));
    }

    json!({
        "swagger": "2.0",
        "info": info,
        "tags": tags.into_iter().map(|name| json!({"name": name})).collect::<Vec<_>>(),
        "paths": paths,
        "definitions": definitions,
    })
}

fn params_schema(descriptor: &MethodDescriptor, definitions: &mut Map<String, Value>) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in &descriptor.params {
        let mut schema = param.ty.to_json_schema(definitions);
        match &param.default {
            Some(default) => {
                // A `$ref` may not carry siblings, so wrap it
                if schema.get("$ref").is_some() {
                    schema = json!({"allOf": [schema]});
                }
                if let Value::Object(obj) = &mut schema {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            None => required.push(json!(param.name)),
        }
        properties.insert(param.name.clone(), schema);
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(schema)
}

fn operation(
    descriptor: &MethodDescriptor,
    params_name: &str,
    definitions: &mut Map<String, Value>,
) -> Value {
    let mut op = Map::new();
    if let Some(summary) = descriptor.summary() {
        op.insert("summary".to_string(), json!(summary));
    }
    if let Some(description) = &descriptor.description {
        op.insert("description".to_string(), json!(description));
    }
    if !descriptor.tags.is_empty() {
        op.insert("tags".to_string(), json!(descriptor.tags));
    }
    op.insert("operationId".to_string(), json!(descriptor.name));
    op.insert("consumes".to_string(), json!(["application/json"]));
    op.insert("produces".to_string(), json!(["application/json"]));
    op.insert(
        "parameters".to_string(),
        json!([{
            "in": "body",
            "name": "body",
            "required": true,
            "schema": {"$ref": format!("#/definitions/{}", params_name)}
        }]),
    );
    op.insert(
        "responses".to_string(),
        json!({
            "200": {
                "description": "Result of a successful call",
                "schema": descriptor.returns.to_json_schema(definitions)
            }
        }),
    );
    Value::Object(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MethodError;
    use crate::registry::MethodBuilder;
    use crate::schema::{Describe, RecordDescriptor, TypeDescriptor};

    struct Point;

    impl Describe for Point {
        fn describe() -> TypeDescriptor {
            RecordDescriptor::new("Point")
                .field("x", TypeDescriptor::int())
                .field("y", TypeDescriptor::int())
                .into()
        }
    }

    impl serde::Serialize for Point {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            json!({"x": 0, "y": 0}).serialize(serializer)
        }
    }

    fn registry() -> Registry {
        let translate = MethodBuilder::new("translate")
            .description("Move a point.\n\nReturns a new point.")
            .tag("Point methods")
            .param::<Point>("p")
            .param::<i64>("dx")
            .param_with_default::<i64>("dy", 0)
            .handler(|_| async { Ok::<_, MethodError>(Point) });
        let names = MethodBuilder::new("names")
            .param_with_default::<Option<String>>("prefix", None)
            .handler(|_| async { Ok::<_, MethodError>(Vec::<String>::new()) });
        Registry::builder()
            .method(translate)
            .method(names)
            .build()
            .unwrap()
    }

    #[test]
    fn test_every_method_is_documented() {
        let spec = export_apispec(&registry(), &ApiSpecConfig::default());
        assert_eq!(spec["swagger"], "2.0");
        assert_eq!(spec["info"], json!({"title": "Instant API", "version": "0.0.1"}));

        let paths = spec["paths"].as_object().unwrap();
        assert_eq!(
            paths.keys().collect::<Vec<_>>(),
            vec!["/api/names", "/api/translate"]
        );
        assert_eq!(spec["tags"], json!([{"name": "Point methods"}]));
    }

    #[test]
    fn test_operation_shape() {
        let spec = export_apispec(&registry(), &ApiSpecConfig::default());
        let post = &spec["paths"]["/api/translate"]["post"];
        assert_eq!(post["summary"], "Move a point.");
        assert_eq!(post["tags"], json!(["Point methods"]));
        assert_eq!(post["operationId"], "translate");
        assert_eq!(
            post["parameters"][0]["schema"],
            json!({"$ref": "#/definitions/translate_params"})
        );
        assert_eq!(
            post["responses"]["200"]["schema"],
            json!({"$ref": "#/definitions/Point"})
        );
    }

    #[test]
    fn test_definitions() {
        let spec = export_apispec(&registry(), &ApiSpecConfig::default());
        let definitions = &spec["definitions"];
        assert_eq!(
            definitions["translate_params"],
            json!({
                "type": "object",
                "properties": {
                    "p": {"$ref": "#/definitions/Point"},
                    "dx": {"type": "integer"},
                    "dy": {"type": "integer", "default": 0}
                },
                "required": ["p", "dx"]
            })
        );
        assert_eq!(definitions["Point"]["required"], json!(["x", "y"]));
        assert_eq!(
            definitions["names_params"],
            json!({
                "type": "object",
                "properties": {
                    "prefix": {"type": "string", "x-nullable": true, "default": null}
                }
            })
        );
        assert_eq!(
            spec["paths"]["/api/names"]["post"]["responses"]["200"]["schema"],
            json!({"type": "array", "items": {"type": "string"}})
        );
    }

    #[test]
    fn test_custom_prefix_and_info() {
        let config = ApiSpecConfig::new()
            .title("Points")
            .version("1.2.3")
            .description("Point arithmetic")
            .path_prefix("/rpc/");
        let spec = export_apispec(&registry(), &config);
        assert_eq!(spec["info"]["title"], "Points");
        assert_eq!(spec["info"]["description"], "Point arithmetic");
        assert!(spec["paths"].get("/rpc/translate").is_some());
    }
}
