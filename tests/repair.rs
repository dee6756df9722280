use iflow_forge::{
    diagnostic::{ADAPTER_REPAIRED, MALFORMED_COMPONENT_SHAPE},
    loader::load_integration_from_str,
    repair::{repair_document, validate_and_fix},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).unwrap()
}

fn components(name: &str) -> Vec<Value> {
    let doc: Value = serde_json::from_str(&fixture(name)).unwrap();
    doc["endpoints"][0]["components"]
        .as_array()
        .cloned()
        .unwrap()
}

#[test]
fn odata_component_becomes_request_reply_with_odata_adapter() {
    let outcome = validate_and_fix(&components("scenario_odata.json"));
    let c1 = &outcome.components[0];
    assert_eq!(c1["type"], "request_reply");
    assert_eq!(c1["receiver_adapter"]["type"], "odata_adapter");
    assert_eq!(c1["receiver_adapter"]["operation"], "POST");
    assert_eq!(c1["receiver_adapter"]["endpoint"], "Opportunity");
    assert_eq!(c1["receiver_adapter"]["connection"], "Create_Opp_connection");
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].code, ADAPTER_REPAIRED);
    assert_eq!(outcome.problems().count(), 0);
}

#[test]
fn second_pass_is_byte_identical() {
    let once = validate_and_fix(&components("scenario_odata.json")).components;
    let twice = validate_and_fix(&once);
    assert_eq!(
        serde_json::to_string(&once).unwrap(),
        serde_json::to_string(&twice.components).unwrap()
    );
    assert!(twice.diagnostics.is_empty());
}

#[test]
fn well_formed_adapter_is_left_alone() {
    let input = vec![json!({
        "id": "c9",
        "type": "request_reply",
        "name": "Call",
        "config": {"address": "https://api4.successfactors.com"},
        "receiver_adapter": {"type": "http_adapter", "operation": "PUT", "connection": "mine"}
    })];
    let outcome = validate_and_fix(&input);
    assert_eq!(
        serde_json::to_string(&outcome.components).unwrap(),
        serde_json::to_string(&input).unwrap()
    );
    assert!(outcome.diagnostics.is_empty());
}

#[test]
fn sftp_protocol_yields_sftp_adapter() {
    let outcome = validate_and_fix(&components("sftp_hint.json"));
    let upload = &outcome.components[0];
    assert_eq!(upload["type"], "request_reply");
    assert_eq!(upload["receiver_adapter"]["type"], "sftp_adapter");
    assert_eq!(upload["receiver_adapter"]["operation"], "GET");
}

#[test]
fn hostnames_pick_the_adapter_family() {
    let outcome = validate_and_fix(&[
        json!({"type": "request_reply", "id": "sf", "name": "SF", "config": {"url": "https://api4.successfactors.com/odata/v2"}}),
        json!({"type": "request_reply", "id": "crm", "name": "CRM", "config": {"address": "https://acme.my.salesforce.com"}}),
        json!({"type": "request_reply", "id": "ws", "name": "WS", "config": {"address": "https://legacy.example.com/svc?wsdl"}}),
        json!({"type": "request_reply", "id": "web", "name": "Web", "config": {"address": "https://api.example.com", "method": "delete"}}),
    ]);
    let adapter_types: Vec<&str> = outcome
        .components
        .iter()
        .map(|c| c["receiver_adapter"]["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        adapter_types,
        ["successfactors_adapter", "odata_adapter", "soap_adapter", "http_adapter"]
    );
    assert_eq!(outcome.components[3]["receiver_adapter"]["operation"], "DELETE");
}

#[test]
fn hintless_request_reply_is_flagged_not_guessed() {
    let outcome = validate_and_fix(&[json!({
        "type": "request_reply", "id": "mystery", "name": "Mystery", "config": {}
    })]);
    assert!(outcome.components[0].get("receiver_adapter").is_none());
    let problems: Vec<_> = outcome.problems().collect();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].code, MALFORMED_COMPONENT_SHAPE);
    assert_eq!(problems[0].location.as_deref(), Some("components[0]"));
}

#[test]
fn repair_document_prefixes_endpoint_locations() {
    let mut doc = load_integration_from_str(&fixture("multi_adapter.json")).unwrap();
    let diagnostics = repair_document(&mut doc);
    assert!(diagnostics.iter().all(|d| d.code == ADAPTER_REPAIRED));
    assert_eq!(
        diagnostics[0].location.as_deref(),
        Some("endpoints[0].components[1]")
    );
    assert_eq!(doc.endpoints[0].components[1]["type"], "request_reply");
    assert!(repair_document(&mut doc).is_empty());
}
