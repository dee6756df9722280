//! Typed result of one assembly.

use serde::Serialize;

use crate::{diagnostic::Diagnostic, kind::ComponentKind, layout::NodeCategory, model::Parameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Sender,
    Receiver,
    IntegrationProcess,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantNode {
    pub id: String,
    pub role: ParticipantRole,
    /// Process node whose external call this participant receives.
    pub anchor: Option<String>,
    #[serde(skip)]
    pub xml: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageFlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip)]
    pub xml: String,
}

/// What a process node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "node", content = "kind")]
pub enum NodeKind {
    StartEvent,
    EndEvent,
    ErrorStartEvent,
    ErrorEndEvent,
    /// Rendered from an input component.
    Component(ComponentKind),
    /// Gateway or join added for a branching block.
    SynthesizedGateway(ComponentKind),
    ExceptionSubprocess,
}

impl NodeKind {
    /// Nodes that legitimately have no incoming sequence flow.
    pub fn is_initial(self) -> bool {
        matches!(
            self,
            NodeKind::StartEvent
                | NodeKind::ErrorStartEvent
                | NodeKind::ExceptionSubprocess
                | NodeKind::Component(ComponentKind::TimerStart)
        )
    }

    /// Nodes that legitimately have no outgoing sequence flow.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeKind::EndEvent | NodeKind::ErrorEndEvent | NodeKind::ExceptionSubprocess
        )
    }

    pub fn is_external_call(self) -> bool {
        matches!(self, NodeKind::Component(kind) if kind.is_external_call())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub category: NodeCategory,
    /// Exception subprocess holding this node; `None` for the main process.
    pub container: Option<String>,
    pub incoming: Vec<String>,
    pub outgoing: Vec<String>,
    /// Default route of an exclusive gateway.
    pub default_flow: Option<String>,
    #[serde(skip)]
    pub xml: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceFlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub name: Option<String>,
    pub condition: Option<String>,
    pub container: Option<String>,
    #[serde(skip)]
    pub xml: String,
}

/// Everything the package builder needs, plus what the assembler noticed on the way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledFlow {
    pub process_name: String,
    pub description: String,
    pub participants: Vec<ParticipantNode>,
    pub message_flows: Vec<MessageFlowEdge>,
    pub nodes: Vec<ProcessNode>,
    pub sequence_flows: Vec<SequenceFlowEdge>,
    #[serde(skip)]
    pub shapes: Vec<String>,
    #[serde(skip)]
    pub edges: Vec<String>,
    pub parameters: Vec<Parameter>,
    /// Groovy files the package ships under `script/`, in first-use order.
    pub scripts: Vec<ScriptResource>,
    /// OData entity sets called by receivers; each gets an `edmx/` metadata stub.
    pub entity_sets: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptResource {
    pub file: String,
    /// Source from the endpoint's `transformations`; `None` ships a skeleton.
    pub body: Option<String>,
}

impl AssembledFlow {
    pub fn node(&self, id: &str) -> Option<&ProcessNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn sequence_flow(&self, id: &str) -> Option<&SequenceFlowEdge> {
        self.sequence_flows.iter().find(|f| f.id == id)
    }

    pub fn receivers(&self) -> impl Iterator<Item = &ParticipantNode> {
        self.participants
            .iter()
            .filter(|p| p.role == ParticipantRole::Receiver)
    }

    /// Message flows that leave the process toward a receiver.
    pub fn receiver_message_flows(&self) -> impl Iterator<Item = &MessageFlowEdge> {
        self.message_flows.iter().filter(|flow| {
            self.participants
                .iter()
                .any(|p| p.id == flow.target && p.role == ParticipantRole::Receiver)
        })
    }

    pub fn external_calls(&self) -> impl Iterator<Item = &ProcessNode> {
        self.nodes.iter().filter(|n| n.kind.is_external_call())
    }

    /// Top-level process elements followed by top-level sequence flows, as rendered XML.
    pub fn process_elements(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.container.is_none())
            .map(|n| n.xml.clone())
            .chain(
                self.sequence_flows
                    .iter()
                    .filter(|f| f.container.is_none())
                    .map(|f| f.xml.clone()),
            )
            .collect()
    }

    /// Every id the document will contain, in emission order.
    pub fn element_ids(&self) -> Vec<&str> {
        self.participants
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.message_flows.iter().map(|m| m.id.as_str()))
            .chain(self.nodes.iter().map(|n| n.id.as_str()))
            .chain(self.sequence_flows.iter().map(|f| f.id.as_str()))
            .collect()
    }
}
