use std::{fs, path::Path};

use serde_json::Value;

use crate::{
    error::{IflowError, IflowErrorLocation, Result},
    model::IntegrationDoc,
};

const INLINE_SOURCE: &str = "<inline>";

/// Parse an integration document from JSON text.
pub fn load_integration_from_str(json: &str) -> Result<IntegrationDoc> {
    load_with_source(json, INLINE_SOURCE, None)
}

/// Parse an integration document from a file on disk.
pub fn load_integration_from_path(path: &Path) -> Result<IntegrationDoc> {
    let content = fs::read_to_string(path).map_err(|e| IflowError::Internal {
        message: format!("failed to read {}: {e}", path.display()),
        location: IflowErrorLocation::at_path(path.display().to_string())
            .with_source_path(Some(path)),
    })?;
    load_with_source(&content, path.display().to_string(), Some(path))
}

pub fn load_with_source(
    json: &str,
    source_label: impl Into<String>,
    source_path: Option<&Path>,
) -> Result<IntegrationDoc> {
    let source_label = source_label.into();
    let value: Value = serde_json::from_str(json).map_err(|e| IflowError::Json {
        message: format!("line {} column {}: {e}", e.line(), e.column()),
        location: IflowErrorLocation::at_path(source_label.clone()).with_source_path(source_path),
    })?;
    check_shape(&value).map_err(|(pointer, message)| IflowError::Shape {
        message,
        location: IflowErrorLocation::at_pointer(pointer).with_source_path(source_path),
    })?;
    serde_json::from_value(value).map_err(|e| IflowError::Shape {
        message: e.to_string(),
        location: IflowErrorLocation::at_path(source_label).with_source_path(source_path),
    })
}

/// Structural checks serde cannot express; returns the offending JSON pointer.
fn check_shape(value: &Value) -> std::result::Result<(), (String, String)> {
    let Some(doc) = value.as_object() else {
        return Err(("".to_string(), "document must be a JSON object".to_string()));
    };
    let endpoints = match doc.get("endpoints") {
        Some(Value::Array(endpoints)) if !endpoints.is_empty() => endpoints,
        Some(Value::Array(_)) | None => {
            return Err((
                "/endpoints".to_string(),
                "at least one endpoint is required".to_string(),
            ));
        }
        Some(_) => {
            return Err(("/endpoints".to_string(), "endpoints must be an array".to_string()));
        }
    };
    for (idx, endpoint) in endpoints.iter().enumerate() {
        let Some(endpoint) = endpoint.as_object() else {
            return Err((format!("/endpoints/{idx}"), "endpoint must be an object".to_string()));
        };
        match endpoint.get("components") {
            None => {}
            Some(Value::Array(components)) => {
                if let Some(bad) = components.iter().position(|c| !c.is_object()) {
                    return Err((
                        format!("/endpoints/{idx}/components/{bad}"),
                        "component must be an object".to_string(),
                    ));
                }
            }
            Some(_) => {
                return Err((
                    format!("/endpoints/{idx}/components"),
                    "components must be an array".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_name_is_accepted_for_process_name() {
        let doc = load_integration_from_str(
            r#"{"api_name": "Orders", "endpoints": [{"components": []}]}"#,
        )
        .unwrap();
        assert_eq!(doc.process_name, "Orders");
    }

    #[test]
    fn syntax_errors_are_json_errors() {
        let err = load_integration_from_str("{ nope").unwrap_err();
        assert_eq!(err.code(), "JSON_PARSE");
    }

    #[test]
    fn shape_errors_carry_a_pointer() {
        let err = load_integration_from_str(
            r#"{"process_name": "X", "endpoints": [{"components": [1]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "DOCUMENT_SHAPE");
        assert_eq!(
            err.location().json_pointer.as_deref(),
            Some("/endpoints/0/components/0")
        );

        let err = load_integration_from_str(r#"{"process_name": "X", "endpoints": []}"#)
            .unwrap_err();
        assert_eq!(err.location().json_pointer.as_deref(), Some("/endpoints"));
    }
}
