mod external_calls;

use std::collections::HashSet;

pub use external_calls::ExternalCallRule;

use crate::assemble::AssembledFlow;

/// Structural checks on an assembled flow. An empty result means the graph is sound.
pub fn lint_assembled(flow: &AssembledFlow) -> Vec<String> {
    let mut errors = unique_ids(flow);
    errors.extend(flow_refs_resolve(flow));
    errors.extend(nodes_are_connected(flow));
    errors.extend(ExternalCallRule::check(flow));
    errors
}

fn unique_ids(flow: &AssembledFlow) -> Vec<String> {
    let mut seen = HashSet::new();
    flow.element_ids()
        .into_iter()
        .filter(|id| !seen.insert(*id))
        .map(|id| format!("unique_ids: '{id}' is used more than once"))
        .collect()
}

fn flow_refs_resolve(flow: &AssembledFlow) -> Vec<String> {
    let mut errors = Vec::new();
    for seq in &flow.sequence_flows {
        for end in [&seq.source, &seq.target] {
            if flow.node(end).is_none() {
                errors.push(format!(
                    "flow_refs: sequence flow '{}' points at unknown node '{end}'",
                    seq.id
                ));
            }
        }
    }
    for node in &flow.nodes {
        for flow_id in node.incoming.iter().chain(&node.outgoing) {
            if flow.sequence_flow(flow_id).is_none() {
                errors.push(format!(
                    "flow_refs: node '{}' lists unknown sequence flow '{flow_id}'",
                    node.id
                ));
            }
        }
    }
    errors
}

fn nodes_are_connected(flow: &AssembledFlow) -> Vec<String> {
    let mut errors = Vec::new();
    for node in &flow.nodes {
        if !node.kind.is_initial() && node.incoming.is_empty() {
            errors.push(format!("connected: '{}' has no incoming flow", node.id));
        }
        if !node.kind.is_terminal() && node.outgoing.is_empty() {
            errors.push(format!("connected: '{}' has no outgoing flow", node.id));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assemble::{NodeKind, ProcessNode, SequenceFlowEdge},
        layout::NodeCategory,
    };

    fn node(id: &str, kind: NodeKind, incoming: &[&str], outgoing: &[&str]) -> ProcessNode {
        ProcessNode {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            category: NodeCategory::Event,
            container: None,
            incoming: incoming.iter().map(|s| s.to_string()).collect(),
            outgoing: outgoing.iter().map(|s| s.to_string()).collect(),
            default_flow: None,
            xml: String::new(),
        }
    }

    fn flow(nodes: Vec<ProcessNode>, flows: Vec<(&str, &str, &str)>) -> AssembledFlow {
        AssembledFlow {
            process_name: "Test".to_string(),
            description: String::new(),
            participants: Vec::new(),
            message_flows: Vec::new(),
            nodes,
            sequence_flows: flows
                .into_iter()
                .map(|(id, source, target)| SequenceFlowEdge {
                    id: id.to_string(),
                    source: source.to_string(),
                    target: target.to_string(),
                    name: None,
                    condition: None,
                    container: None,
                    xml: String::new(),
                })
                .collect(),
            shapes: Vec::new(),
            edges: Vec::new(),
            parameters: Vec::new(),
            scripts: Vec::new(),
            entity_sets: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn sound_graph_has_no_findings() {
        let flow = flow(
            vec![
                node("start", NodeKind::StartEvent, &[], &["f1"]),
                node("end", NodeKind::EndEvent, &["f1"], &[]),
            ],
            vec![("f1", "start", "end")],
        );
        assert!(lint_assembled(&flow).is_empty());
    }

    #[test]
    fn dangling_flow_and_dead_end_are_reported() {
        let flow = flow(
            vec![
                node("start", NodeKind::StartEvent, &[], &["f1"]),
                node("end", NodeKind::EndEvent, &["f1", "f9"], &[]),
                node("start", NodeKind::EndEvent, &[], &[]),
            ],
            vec![("f1", "start", "end")],
        );
        let errors = lint_assembled(&flow);
        assert!(errors.iter().any(|e| e.starts_with("unique_ids")));
        assert!(errors.iter().any(|e| e.contains("unknown sequence flow 'f9'")));
        assert!(errors.iter().any(|e| e.starts_with("connected")));
    }
}
