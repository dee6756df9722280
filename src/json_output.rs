use serde::Serialize;

use crate::{
    assemble::AssembledFlow,
    config::GeneratorConfig,
    diagnostic::Diagnostic,
    error::{IflowError, IflowErrorLocation},
    generate_flow,
};

#[derive(Serialize, Clone, Debug)]
pub struct JsonDiagnostic {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_pointer: Option<String>,
}

impl JsonDiagnostic {
    pub fn from_error(err: &IflowError) -> Self {
        let IflowErrorLocation {
            path,
            source_path,
            json_pointer,
        } = err.location().clone();
        JsonDiagnostic {
            code: err.code().to_string(),
            message: err.to_string(),
            source_path: source_path.map(|p| p.display().to_string()),
            path,
            json_pointer,
        }
    }

    pub fn from_diagnostic(diagnostic: &Diagnostic) -> Self {
        JsonDiagnostic {
            code: diagnostic.code.to_string(),
            message: diagnostic.message.clone(),
            source_path: None,
            path: diagnostic.location.clone(),
            json_pointer: None,
        }
    }
}

/// Report printed by `iflow-forge doctor --json`.
#[derive(Serialize, Clone, Debug)]
pub struct DoctorJsonOutput {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<FlowCounts>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<JsonDiagnostic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<JsonDiagnostic>,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowCounts {
    pub nodes: usize,
    pub sequence_flows: usize,
    pub participants: usize,
    pub message_flows: usize,
}

impl DoctorJsonOutput {
    pub fn success(flow: &AssembledFlow) -> Self {
        DoctorJsonOutput {
            ok: true,
            process_name: Some(flow.process_name.clone()),
            counts: Some(FlowCounts {
                nodes: flow.nodes.len(),
                sequence_flows: flow.sequence_flows.len(),
                participants: flow.participants.len(),
                message_flows: flow.message_flows.len(),
            }),
            diagnostics: flow
                .diagnostics
                .iter()
                .map(JsonDiagnostic::from_diagnostic)
                .collect(),
            errors: Vec::new(),
        }
    }

    pub fn error(err: &IflowError) -> Self {
        DoctorJsonOutput {
            ok: false,
            process_name: None,
            counts: None,
            diagnostics: Vec::new(),
            errors: vec![JsonDiagnostic::from_error(err)],
        }
    }

    pub fn into_string(self) -> String {
        serde_json::to_string(&self)
            .unwrap_or_else(|e| format!(r#"{{"ok":false,"errors":[{{"code":"INTERNAL","message":"{e}"}}]}}"#))
    }
}

/// Validate a document and build the `doctor --json` report for it.
pub fn doctor_report(json: &str, config: &GeneratorConfig) -> DoctorJsonOutput {
    match generate_flow(json, config) {
        Ok(flow) => DoctorJsonOutput::success(&flow),
        Err(err) => DoctorJsonOutput::error(&err),
    }
}

/// Produce the JSON emitted by `iflow-forge doctor --json`.
pub fn doctor_to_stdout_json(json: &str, config: &GeneratorConfig) -> String {
    doctor_report(json, config).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn dangling_reference_reports_code_and_path() {
        let json = r#"{"process_name": "P", "endpoints": [{
            "components": [{"type": "enricher", "id": "a", "name": "A", "config": {}}],
            "sequence": ["a", "ghost"]
        }]}"#;
        let out: Value =
            serde_json::from_str(&doctor_to_stdout_json(json, &GeneratorConfig::default())).unwrap();
        assert_eq!(out["ok"], false);
        assert_eq!(out["errors"][0]["code"], "DANGLING_REFERENCE");
        assert_eq!(out["errors"][0]["path"], "endpoints[0].sequence[1]");
    }

    #[test]
    fn success_reports_counts() {
        let json = r#"{"process_name": "P", "endpoints": [{
            "components": [{"type": "enricher", "id": "a", "name": "A", "config": {}}],
            "sequence": ["a"]
        }]}"#;
        let out: Value =
            serde_json::from_str(&doctor_to_stdout_json(json, &GeneratorConfig::default())).unwrap();
        assert_eq!(out["ok"], true);
        assert_eq!(out["counts"]["nodes"], 3);
        assert_eq!(out["counts"]["sequence_flows"], 2);
    }

    #[test]
    fn report_carries_its_verdict() {
        let config = GeneratorConfig::default();
        let bad = doctor_report(r#"{"process_name": "P", "endpoints": [{
            "components": [{"type": "teleport", "id": "a", "name": "A", "config": {}}],
            "sequence": ["a"]
        }]}"#, &config);
        assert!(!bad.ok);
        assert_eq!(bad.errors[0].code, "UNSUPPORTED_COMPONENT_KIND");

        let good = doctor_report(r#"{"process_name": "P", "endpoints": [{
            "components": [{"type": "enricher", "id": "a", "name": "A", "config": {}}],
            "sequence": ["a"]
        }]}"#, &config);
        assert!(good.ok);
        assert_eq!(good.process_name.as_deref(), Some("P"));
    }
}
