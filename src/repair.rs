//! Normalizes upstream component JSON before assembly.
//!
//! Works on raw [`Value`]s so untouched components keep their exact key order and
//! repaired output is byte-stable: `validate_and_fix(validate_and_fix(x)) == validate_and_fix(x)`.

use serde_json::{Map, Value};
use url::Url;

use crate::{
    diagnostic::{ADAPTER_REPAIRED, Diagnostic, MALFORMED_COMPONENT_SHAPE},
    kind::{AdapterKind, ComponentKind},
    model::{IntegrationDoc, config_str},
    templates::adapters::http_verb,
};

const ADDRESS_KEYS: &[&str] = &[
    "address",
    "url",
    "endpoint",
    "endpoint_url",
    "base_url",
    "service_url",
    "host",
];

const SUCCESSFACTORS_DOMAINS: &[&str] = &["successfactors.com", "successfactors.eu", "sapsf.com"];

const SAAS_DOMAINS: &[&str] = &[
    "salesforce.com",
    "force.com",
    "dynamics.com",
    "servicenow.com",
    "workday.com",
    "netsuite.com",
    "s4hana.ondemand.com",
];

/// What an inference rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    /// `type` as written upstream, before any rewrite.
    pub original_type: &'a str,
    pub config: &'a Map<String, Value>,
}

impl RuleInput<'_> {
    fn protocol_is(&self, expected: &[&str]) -> bool {
        config_str(self.config, "protocol")
            .map(|p| {
                let p = p.trim().replace(['-', ' '], "_");
                expected.iter().any(|e| p.eq_ignore_ascii_case(e))
            })
            .unwrap_or(false)
    }

    fn address(&self) -> Option<&str> {
        ADDRESS_KEYS
            .iter()
            .find_map(|key| config_str(self.config, key))
    }

    fn host(&self) -> Option<String> {
        let raw = self.address()?.trim();
        let parsed = Url::parse(raw)
            .ok()
            .filter(|u| u.host_str().is_some())
            .or_else(|| Url::parse(&format!("https://{raw}")).ok())?;
        parsed.host_str().map(str::to_ascii_lowercase)
    }

    fn host_under(&self, domains: &[&str]) -> bool {
        self.host()
            .map(|host| {
                domains
                    .iter()
                    .any(|d| host == *d || host.ends_with(&format!(".{d}")))
            })
            .unwrap_or(false)
    }
}

/// One entry of the adapter inference list.
#[derive(Debug, Clone, Copy)]
pub struct AdapterRule {
    pub name: &'static str,
    pub infer: fn(&RuleInput<'_>) -> Option<AdapterKind>,
}

/// Ordered, first match wins.
pub const RULES: &[AdapterRule] = &[
    AdapterRule {
        name: "odata_component",
        infer: odata_component,
    },
    AdapterRule {
        name: "explicit_adapter_hint",
        infer: explicit_adapter_hint,
    },
    AdapterRule {
        name: "sftp_protocol",
        infer: sftp_protocol,
    },
    AdapterRule {
        name: "successfactors_host",
        infer: successfactors_host,
    },
    AdapterRule {
        name: "soap_hint",
        infer: soap_hint,
    },
    AdapterRule {
        name: "process_direct_hint",
        infer: process_direct_hint,
    },
    AdapterRule {
        name: "saas_host",
        infer: saas_host,
    },
    AdapterRule {
        name: "http_address",
        infer: http_address,
    },
];

fn odata_component(input: &RuleInput<'_>) -> Option<AdapterKind> {
    is_bare_odata(input.original_type).then_some(AdapterKind::OData)
}

fn explicit_adapter_hint(input: &RuleInput<'_>) -> Option<AdapterKind> {
    ["adapter_type", "adapter"]
        .iter()
        .find_map(|key| config_str(input.config, key))
        .and_then(AdapterKind::from_adapter_type)
}

fn sftp_protocol(input: &RuleInput<'_>) -> Option<AdapterKind> {
    input.protocol_is(&["sftp"]).then_some(AdapterKind::Sftp)
}

fn successfactors_host(input: &RuleInput<'_>) -> Option<AdapterKind> {
    input
        .host_under(SUCCESSFACTORS_DOMAINS)
        .then_some(AdapterKind::SuccessFactors)
}

fn soap_hint(input: &RuleInput<'_>) -> Option<AdapterKind> {
    let wsdl = config_str(input.config, "wsdl").is_some()
        || config_str(input.config, "wsdl_url").is_some()
        || input
            .address()
            .map(|a| a.to_ascii_lowercase().ends_with("?wsdl"))
            .unwrap_or(false);
    (input.protocol_is(&["soap"]) || wsdl).then_some(AdapterKind::Soap)
}

fn process_direct_hint(input: &RuleInput<'_>) -> Option<AdapterKind> {
    input
        .protocol_is(&["processdirect", "process_direct"])
        .then_some(AdapterKind::ProcessDirect)
}

fn saas_host(input: &RuleInput<'_>) -> Option<AdapterKind> {
    input.host_under(SAAS_DOMAINS).then_some(AdapterKind::OData)
}

fn http_address(input: &RuleInput<'_>) -> Option<AdapterKind> {
    let hint = input.address().is_some()
        || config_str(input.config, "resource_path").is_some()
        || config_str(input.config, "endpoint_path").is_some();
    hint.then_some(AdapterKind::Http)
}

/// Run [`RULES`] in order; returns the winning rule's name and kind.
pub fn infer_adapter(input: &RuleInput<'_>) -> Option<(&'static str, AdapterKind)> {
    RULES
        .iter()
        .find_map(|rule| (rule.infer)(input).map(|kind| (rule.name, kind)))
}

fn is_bare_odata(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("odata")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairOutcome {
    pub components: Vec<Value>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RepairOutcome {
    pub fn problems(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_problem())
    }
}

pub fn validate_and_fix(raw_components: &[Value]) -> RepairOutcome {
    let mut outcome = RepairOutcome::default();
    for (idx, raw) in raw_components.iter().enumerate() {
        let mut component = raw.clone();
        if let Value::Object(obj) = &mut component {
            fix_component(obj, idx, &mut outcome.diagnostics);
        }
        outcome.components.push(component);
    }
    outcome
}

/// Repair every endpoint of a document in place.
pub fn repair_document(doc: &mut IntegrationDoc) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (idx, endpoint) in doc.endpoints.iter_mut().enumerate() {
        let outcome = validate_and_fix(&endpoint.components);
        endpoint.components = outcome.components;
        diagnostics.extend(outcome.diagnostics.into_iter().map(|mut d| {
            d.location = d.location.map(|loc| format!("endpoints[{idx}].{loc}"));
            d
        }));
    }
    diagnostics
}

fn fix_component(obj: &mut Map<String, Value>, idx: usize, diagnostics: &mut Vec<Diagnostic>) {
    let original_type = obj
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let needs_adapter = is_bare_odata(&original_type)
        || ComponentKind::lookup(&original_type) == Some(ComponentKind::RequestReply);
    if !needs_adapter {
        return;
    }

    let label = component_label(obj, idx);
    let empty = Map::new();
    let config = obj
        .get("config")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or(empty);
    let input = RuleInput {
        original_type: &original_type,
        config: &config,
    };
    let location = Some(format!("components[{idx}]"));

    match obj.get("receiver_adapter") {
        None | Some(Value::Null) => {
            let Some((rule, kind)) = infer_adapter(&input) else {
                tracing::warn!(component = %label, "no adapter kind could be inferred");
                diagnostics.push(Diagnostic::new(
                    MALFORMED_COMPONENT_SHAPE,
                    format!("component '{label}' has no receiver_adapter and no adapter hint"),
                    location,
                ));
                return;
            };
            let adapter = synthesize_adapter(kind, obj, &config);
            if is_bare_odata(&original_type) {
                obj.insert("type".to_string(), Value::String("request_reply".to_string()));
            }
            obj.insert("receiver_adapter".to_string(), Value::Object(adapter));
            tracing::warn!(component = %label, rule, adapter = %kind, "synthesized receiver_adapter");
            diagnostics.push(Diagnostic::new(
                ADAPTER_REPAIRED,
                format!("component '{label}' given {kind} by rule {rule}"),
                location,
            ));
        }
        Some(Value::Object(_)) => {
            complete_adapter(obj, &input, &config, &label, location, diagnostics);
        }
        Some(_) => {
            diagnostics.push(Diagnostic::new(
                MALFORMED_COMPONENT_SHAPE,
                format!("component '{label}' has a receiver_adapter that is not an object"),
                location,
            ));
        }
    }
}

fn complete_adapter(
    obj: &mut Map<String, Value>,
    input: &RuleInput<'_>,
    config: &Map<String, Value>,
    label: &str,
    location: Option<String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let name = component_name(obj);
    let Some(Value::Object(adapter)) = obj.get_mut("receiver_adapter") else {
        return;
    };
    let known_type = config_str(adapter, "type")
        .and_then(AdapterKind::from_adapter_type)
        .is_some();
    let has_operation = config_str(adapter, "operation").is_some();
    let has_connection = config_str(adapter, "connection").is_some();
    if known_type && has_operation && has_connection {
        return;
    }

    if !known_type {
        if config_str(adapter, "type").is_some() {
            diagnostics.push(Diagnostic::new(
                MALFORMED_COMPONENT_SHAPE,
                format!("component '{label}' names an unknown receiver_adapter type"),
                location,
            ));
            return;
        }
        match infer_adapter(input) {
            Some((_, kind)) => {
                adapter.insert(
                    "type".to_string(),
                    Value::String(kind.adapter_type().to_string()),
                );
            }
            None => {
                diagnostics.push(Diagnostic::new(
                    MALFORMED_COMPONENT_SHAPE,
                    format!("component '{label}' has a receiver_adapter without a type"),
                    location,
                ));
                return;
            }
        }
    }
    if !has_operation {
        adapter.insert("operation".to_string(), Value::String(derive_operation(config)));
    }
    if !has_connection {
        adapter.insert(
            "connection".to_string(),
            Value::String(derive_connection(config, &name)),
        );
    }
    tracing::warn!(component = %label, "completed partial receiver_adapter");
    diagnostics.push(Diagnostic::new(
        ADAPTER_REPAIRED,
        format!("component '{label}' receiver_adapter completed"),
        location,
    ));
}

fn synthesize_adapter(
    kind: AdapterKind,
    obj: &Map<String, Value>,
    config: &Map<String, Value>,
) -> Map<String, Value> {
    let mut adapter = Map::new();
    adapter.insert(
        "type".to_string(),
        Value::String(kind.adapter_type().to_string()),
    );
    adapter.insert("operation".to_string(), Value::String(derive_operation(config)));
    if let Some(endpoint) = derive_endpoint(config) {
        adapter.insert("endpoint".to_string(), Value::String(endpoint));
    }
    adapter.insert(
        "connection".to_string(),
        Value::String(derive_connection(config, &component_name(obj))),
    );
    adapter
}

/// `Create(POST)` → `POST`, `post` → `POST`, otherwise `GET`.
pub fn derive_operation(config: &Map<String, Value>) -> String {
    ["operation", "method", "http_method"]
        .iter()
        .filter_map(|key| config_str(config, key))
        .find_map(http_verb)
        .unwrap_or_else(|| "GET".to_string())
}

fn derive_endpoint(config: &Map<String, Value>) -> Option<String> {
    config_str(config, "resource_path")
        .or_else(|| config_str(config, "endpoint_path"))
        .map(str::to_string)
}

fn derive_connection(config: &Map<String, Value>, name: &str) -> String {
    config_str(config, "connection")
        .map(str::to_string)
        .unwrap_or_else(|| format!("{name}_connection"))
}

fn component_name(obj: &Map<String, Value>) -> String {
    config_str(obj, "name")
        .or_else(|| config_str(obj, "id"))
        .unwrap_or("component")
        .to_string()
}

fn component_label(obj: &Map<String, Value>, idx: usize) -> String {
    config_str(obj, "id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{idx}"))
}
