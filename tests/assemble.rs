use std::collections::HashSet;

use iflow_forge::{
    AssembledFlow, FlowAssembler, GeneratorConfig,
    assemble::{NodeKind, ParticipantRole},
    constants::{END_EVENT_ID, START_EVENT_ID},
    diagnostic::{DUPLICATE_COMPONENT_ID, ORPHAN_COMPONENT},
    error::IflowError,
    generate_flow, generate_package,
    kind::ComponentKind,
    loader::load_integration_from_str,
};
use pretty_assertions::assert_eq;

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).unwrap()
}

fn assemble(name: &str) -> AssembledFlow {
    generate_flow(&fixture(name), &GeneratorConfig::default()).unwrap()
}

fn assert_complete(flow: &AssembledFlow) {
    let flow_ids: HashSet<&str> = flow.sequence_flows.iter().map(|f| f.id.as_str()).collect();
    for node in &flow.nodes {
        for id in node.incoming.iter().chain(&node.outgoing) {
            assert!(flow_ids.contains(id.as_str()), "{} refers to {id}", node.id);
        }
    }
    let mut seen = HashSet::new();
    for id in flow.element_ids() {
        assert!(seen.insert(id), "duplicate id {id}");
    }
    let calls = flow.external_calls().count();
    assert_eq!(flow.receivers().count(), calls);
    assert_eq!(flow.receiver_message_flows().count(), calls);
}

#[test]
fn odata_scenario_has_one_receiver_and_two_flows() {
    let flow = assemble("scenario_odata.json");
    assert_complete(&flow);

    assert_eq!(flow.receivers().count(), 1);
    let receiver_flows: Vec<_> = flow.receiver_message_flows().collect();
    assert_eq!(receiver_flows.len(), 1);
    assert!(receiver_flows[0].xml.contains("<key>ComponentType</key>"));
    assert!(receiver_flows[0].xml.contains("<value>HCIOData</value>"));
    assert!(receiver_flows[0].xml.contains("<value>Create(POST)</value>"));
    assert_eq!(receiver_flows[0].source, "c1");

    let edges: Vec<(&str, &str)> = flow
        .sequence_flows
        .iter()
        .map(|f| (f.source.as_str(), f.target.as_str()))
        .collect();
    assert_eq!(edges, [(START_EVENT_ID, "c1"), ("c1", END_EVENT_ID)]);

    let start = flow.node(START_EVENT_ID).unwrap();
    assert_eq!(start.outgoing, ["SequenceFlow_1"]);
    let end = flow.node(END_EVENT_ID).unwrap();
    assert_eq!(end.incoming, ["SequenceFlow_2"]);
}

#[test]
fn sender_and_process_participants_surround_receivers() {
    let flow = assemble("scenario_odata.json");
    let roles: Vec<ParticipantRole> = flow.participants.iter().map(|p| p.role).collect();
    assert_eq!(
        roles,
        [
            ParticipantRole::Sender,
            ParticipantRole::IntegrationProcess,
            ParticipantRole::Receiver
        ]
    );
    let sender = &flow.message_flows[0];
    assert_eq!(sender.source, "Participant_1");
    assert_eq!(sender.target, START_EVENT_ID);
    assert!(sender.xml.contains("<value>/opportunities</value>"));
}

#[test]
fn dangling_reference_aborts_assembly() {
    let err = generate_flow(&fixture("dangling_reference.json"), &GeneratorConfig::default())
        .unwrap_err();
    match err {
        IflowError::DanglingReference {
            reference,
            referenced_from,
            ..
        } => {
            assert_eq!(reference, "missing_step");
            assert_eq!(referenced_from, "endpoints[0].sequence[1]");
        }
        other => panic!("expected dangling reference, got {other:?}"),
    }
}

#[test]
fn duplicate_ids_get_distinct_elements() {
    let flow = assemble("duplicate_ids.json");
    assert_complete(&flow);
    let ids: Vec<&str> = flow
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Component(_)))
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(ids, ["task1", "task1_2"]);
    assert_eq!(
        flow.node("task1_2").unwrap().kind,
        NodeKind::Component(ComponentKind::GroovyScript)
    );
}

#[test]
fn duplicate_declarations_follow_a_single_reference() {
    let json = r#"{
        "process_name": "Duplicate Steps",
        "endpoints": [{
            "components": [
                {"type": "content_modifier", "name": "Prepare", "id": "task1", "config": {}},
                {"type": "groovy_script", "name": "Transform", "id": "task1", "config": {"script": "transform.groovy"}}
            ],
            "sequence": ["task1"]
        }]
    }"#;
    let flow = generate_flow(json, &GeneratorConfig::default()).unwrap();
    assert_complete(&flow);

    let ids: Vec<&str> = flow.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, [START_EVENT_ID, "task1", "task1_2", END_EVENT_ID]);
    let edges: Vec<(&str, &str)> = flow
        .sequence_flows
        .iter()
        .map(|f| (f.source.as_str(), f.target.as_str()))
        .collect();
    assert_eq!(
        edges,
        [(START_EVENT_ID, "task1"), ("task1", "task1_2"), ("task1_2", END_EVENT_ID)]
    );

    assert!(flow.diagnostics.iter().all(|d| d.code != ORPHAN_COMPONENT));
    let renamed: Vec<_> = flow
        .diagnostics
        .iter()
        .filter(|d| d.code == DUPLICATE_COMPONENT_ID)
        .collect();
    assert_eq!(renamed.len(), 1);
    assert_eq!(renamed[0].location.as_deref(), Some("endpoints[0].components[1]"));
    assert!(!renamed[0].is_problem());
}

#[test]
fn unknown_component_type_aborts_assembly() {
    let json = r#"{
        "process_name": "Unknown Step",
        "endpoints": [{
            "components": [
                {"type": "content_modifier", "name": "Prepare", "id": "prepare", "config": {}},
                {"type": "teleport", "name": "Beam Up", "id": "beam", "config": {}}
            ],
            "sequence": ["prepare", "beam"]
        }]
    }"#;
    let err = generate_flow(json, &GeneratorConfig::default()).unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_COMPONENT_KIND");
    match err {
        IflowError::UnsupportedComponentKind {
            kind, component_id, ..
        } => {
            assert_eq!(kind, "teleport");
            assert_eq!(component_id, "beam");
        }
        other => panic!("expected unsupported component kind, got {other:?}"),
    }

    let err = generate_package(json, &GeneratorConfig::default()).unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_COMPONENT_KIND");
}

#[test]
fn exclusive_branching_fans_out_from_one_gateway() {
    let flow = assemble("exclusive_branching.json");
    assert_complete(&flow);

    let gateways: Vec<_> = flow
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::SynthesizedGateway(ComponentKind::Router))
        .collect();
    assert_eq!(gateways.len(), 1);
    let gateway = gateways[0];
    assert_eq!(gateway.name, "Check Priority");
    assert_eq!(gateway.outgoing.len(), 2);

    let targets: Vec<&str> = gateway
        .outgoing
        .iter()
        .map(|id| flow.sequence_flow(id).unwrap().target.as_str())
        .collect();
    assert_eq!(targets, ["priority", "standard"]);

    let high = flow.sequence_flow(&gateway.outgoing[0]).unwrap();
    assert_eq!(high.name.as_deref(), Some("High"));
    assert_eq!(high.condition.as_deref(), Some("/order/priority = 'HIGH'"));
    assert!(high.xml.contains("<bpmn2:conditionExpression"));

    let default_flow = gateway.default_flow.as_deref().unwrap();
    assert_eq!(default_flow, gateway.outgoing[1]);
    assert!(gateway.xml.contains(&format!(r#"default="{default_flow}""#)));

    let end = flow.node(END_EVENT_ID).unwrap();
    assert_eq!(end.incoming.len(), 2);
}

#[test]
fn parallel_branches_converge_on_a_join() {
    let flow = assemble("parallel_branching.json");
    assert_complete(&flow);

    let join = flow
        .nodes
        .iter()
        .find(|n| n.kind == NodeKind::SynthesizedGateway(ComponentKind::Join))
        .unwrap();
    let sources: Vec<&str> = join
        .incoming
        .iter()
        .map(|id| flow.sequence_flow(id).unwrap().source.as_str())
        .collect();
    assert_eq!(sources, ["crm", "audit"]);
    let after_join = flow.sequence_flow(&join.outgoing[0]).unwrap();
    assert_eq!(after_join.target, END_EVENT_ID);
    assert_eq!(flow.receivers().count(), 1);
    assert!(flow.sequence_flows.iter().all(|f| f.condition.is_none()));
}

#[test]
fn error_handlers_become_exception_subprocesses() {
    let flow = assemble("error_handling.json");
    assert_complete(&flow);

    let subprocesses: Vec<_> = flow
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::ExceptionSubprocess)
        .collect();
    assert_eq!(subprocesses.len(), 2);
    assert_eq!(subprocesses[0].id, "SubProcess_1");
    assert_eq!(subprocesses[0].name, "Handle Errors");
    assert_eq!(subprocesses[1].id, "Escalate");

    let inside: Vec<&str> = flow
        .nodes
        .iter()
        .filter(|n| n.container.as_deref() == Some("SubProcess_1"))
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(
        inside,
        ["SubProcess_1_Start", "log_failure", "fault", "SubProcess_1_End"]
    );
    assert!(subprocesses[0].xml.contains(r#"id="log_failure""#));
    assert!(subprocesses[0].xml.contains("<bpmn2:errorEventDefinition/>"));

    let escalate_end = flow.node("Escalate_End").unwrap();
    assert_eq!(escalate_end.kind, NodeKind::ErrorEndEvent);
    assert!(escalate_end.xml.contains("<bpmn2:errorEventDefinition/>"));

    let top_level: Vec<&str> = flow
        .nodes
        .iter()
        .filter(|n| n.container.is_none())
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(
        top_level,
        [START_EVENT_ID, "fetch", "map", END_EVENT_ID, "SubProcess_1", "Escalate"]
    );
}

#[test]
fn unreferenced_components_are_reported_not_rendered() {
    let flow = assemble("error_handling.json");
    assert!(flow.node("unused").is_none());
    let orphans: Vec<_> = flow
        .diagnostics
        .iter()
        .filter(|d| d.code == ORPHAN_COMPONENT)
        .collect();
    assert_eq!(orphans.len(), 1);
    assert_eq!(
        orphans[0].location.as_deref(),
        Some("endpoints[0].components[4]")
    );
}

#[test]
fn endpoints_chain_into_one_process() {
    let flow = assemble("multi_adapter.json");
    assert_complete(&flow);

    assert_eq!(flow.receivers().count(), 4);
    assert_eq!(flow.message_flows.len(), 5);
    assert_eq!(flow.participants.len(), 6);
    assert_eq!(flow.nodes.len(), 7);
    assert_eq!(flow.sequence_flows.len(), 6);
    assert!(flow.message_flows[0].xml.contains("<value>/everything/in</value>"));

    let component_types: Vec<&str> = flow
        .receiver_message_flows()
        .map(|m| {
            let start = m.xml.find("<key>ComponentType</key>").unwrap();
            let rest = &m.xml[start..];
            let open = rest.find("<value>").unwrap() + "<value>".len();
            let close = rest.find("</value>").unwrap();
            &rest[open..close]
        })
        .collect();
    assert_eq!(component_types, ["HCIOData", "SOAP", "ProcessDirect", "HTTP"]);

    let last = flow.node(END_EVENT_ID).unwrap();
    let into_end = flow.sequence_flow(&last.incoming[0]).unwrap();
    assert_eq!(into_end.source, "to_json");
}

#[test]
fn participant_ids_are_stable_across_runs() {
    let first = assemble("multi_adapter.json");
    let second = assemble("multi_adapter.json");
    let ids = |flow: &AssembledFlow| -> Vec<String> {
        flow.participants.iter().map(|p| p.id.clone()).collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert!(
        ids(&first)
            .iter()
            .any(|id| id.starts_with("Participant_accounts_"))
    );
    assert_eq!(first.shapes, second.shapes);
}

#[test]
fn assembler_is_reusable_across_documents() {
    let config = GeneratorConfig::default();
    let assembler = FlowAssembler::new(&config).unwrap();
    let doc = load_integration_from_str(&fixture("scenario_odata.json")).unwrap();
    let a = assembler.assemble(&doc).unwrap();
    let b = assembler.assemble(&doc).unwrap();
    assert_eq!(a, b);
}
