//! Turns a repaired integration document into one process graph with layout.

pub mod graph;
pub mod ids;
pub mod wiring;

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub use graph::{
    AssembledFlow, MessageFlowEdge, NodeKind, ParticipantNode, ParticipantRole, ProcessNode,
    ScriptResource, SequenceFlowEdge,
};
pub use ids::IdAllocator;

use crate::{
    config::{GeneratorConfig, MalformedPolicy},
    constants::{
        COLLABORATION_ID, DEFINITIONS_ID, END_EVENT_ID, INTEGRATION_PROCESS, PROCESS_ID,
        PROCESS_PARTICIPANT_ID, SENDER_PARTICIPANT_ID, START_EVENT_ID,
    },
    diagnostic::{Diagnostic, DUPLICATE_COMPONENT_ID, HTTP_FALLBACK, ORPHAN_COMPONENT},
    error::{IflowError, IflowErrorLocation, Result},
    kind::{AdapterKind, ComponentKind},
    layout::{Lane, NodeCategory, PositionManager, Waypoints},
    lint,
    model::{Branching, BranchingType, Component, Endpoint, ErrorHandler, IntegrationDoc},
    repair,
    template::{
        EDGE, EdgeView, PARTICIPANT, ParticipantView, Property, SEQUENCE_FLOW, SHAPE,
        SequenceFlowView, ShapeView, TemplateRenderer,
    },
    templates::{
        self, Bindings, ComponentInput, Placeholder, adapters, events, flow_refs, gateways, steps,
        substitute,
    },
    util::slugify,
};

use wiring::{Binding, ReferenceTable, sequence_from_connections};

/// Ids every document uses for its fixed elements.
const RESERVED_IDS: &[&str] = &[
    DEFINITIONS_ID,
    COLLABORATION_ID,
    PROCESS_ID,
    PROCESS_PARTICIPANT_ID,
    SENDER_PARTICIPANT_ID,
    START_EVENT_ID,
    END_EVENT_ID,
    "BPMNDiagram_1",
    "BPMNPlane_1",
];

pub struct FlowAssembler<'c> {
    config: &'c GeneratorConfig,
    renderer: TemplateRenderer,
}

impl<'c> FlowAssembler<'c> {
    pub fn new(config: &'c GeneratorConfig) -> Result<Self> {
        Ok(FlowAssembler {
            config,
            renderer: TemplateRenderer::new()?,
        })
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Build the whole document or fail; partial graphs are never returned.
    pub fn assemble(&self, doc: &IntegrationDoc) -> Result<AssembledFlow> {
        if doc.process_name.trim().is_empty() {
            return Err(IflowError::MissingIdentity {
                field: "process_name",
                location: IflowErrorLocation::at_pointer("/process_name"),
            });
        }
        Assembly::new(self.config, &self.renderer, doc).run(doc)
    }
}

struct PreparedComponent {
    component: Component,
    kind: ComponentKind,
    resolved_id: String,
}

struct PreparedEndpoint<'d> {
    idx: usize,
    owner: String,
    endpoint: &'d Endpoint,
    components: Vec<PreparedComponent>,
    refs: ReferenceTable,
    sequence: Vec<String>,
}

/// Per-call state: one id arena and one layout cursor, dropped when the call returns.
struct Assembly<'a> {
    config: &'a GeneratorConfig,
    renderer: &'a TemplateRenderer,
    ids: IdAllocator,
    layout: PositionManager,
    nodes: IndexMap<String, ProcessNode>,
    flows: Vec<SequenceFlowEdge>,
    participants: Vec<ParticipantNode>,
    message_flows: Vec<MessageFlowEdge>,
    diagnostics: Vec<Diagnostic>,
    sender: Option<(String, String, Map<String, Value>)>,
    scripts: IndexMap<String, Option<String>>,
    entity_sets: IndexSet<String>,
}

impl<'a> Assembly<'a> {
    fn new(config: &'a GeneratorConfig, renderer: &'a TemplateRenderer, doc: &IntegrationDoc) -> Self {
        let mut ids = IdAllocator::new(&doc.process_name);
        for id in RESERVED_IDS {
            ids.reserve(id);
        }
        Assembly {
            config,
            renderer,
            ids,
            layout: PositionManager::with_settings(config.layout),
            nodes: IndexMap::new(),
            flows: Vec::new(),
            participants: Vec::new(),
            message_flows: Vec::new(),
            diagnostics: Vec::new(),
            sender: None,
            scripts: IndexMap::new(),
            entity_sets: IndexSet::new(),
        }
    }

    fn run(mut self, doc: &IntegrationDoc) -> Result<AssembledFlow> {
        let mut endpoints = Vec::with_capacity(doc.endpoints.len());
        for (idx, endpoint) in doc.endpoints.iter().enumerate() {
            endpoints.push(self.prepare(idx, endpoint)?);
        }
        let last = endpoints.len().saturating_sub(1);
        for ep in &endpoints {
            if ep.endpoint.branching.is_some() && ep.idx != last {
                return Err(IflowError::Graph {
                    message: "branching closes the process and must sit on the last endpoint"
                        .to_string(),
                    location: IflowErrorLocation::at_path(format!("{}.branching", ep.owner)),
                });
            }
        }

        let mut prev: Option<String> = None;
        let mut timer_start = false;
        let mut tails = Vec::new();
        for ep in endpoints.iter_mut() {
            for (pos, reference) in ep.sequence.clone().iter().enumerate() {
                let from = format!("{}.sequence[{pos}]", ep.owner);
                let binding = ep.refs.resolve(reference, &from)?;
                let kind = ep.components[binding.index].kind;
                match kind {
                    ComponentKind::HttpsSender => self.take_sender(ep, binding)?,
                    ComponentKind::TimerStart if prev.is_none() => {
                        let id = self.add_component_node(ep, binding, Lane::Main, None)?;
                        timer_start = true;
                        prev = Some(id);
                    }
                    ComponentKind::TimerStart => {
                        return Err(graph_error(
                            "a timer start must be the first step of the process",
                            &from,
                        ));
                    }
                    ComponentKind::ExceptionSubprocess => {
                        return Err(graph_error(
                            "exception subprocesses belong to error_handling, not the sequence",
                            &from,
                        ));
                    }
                    _ => {
                        let previous = match prev.take() {
                            Some(id) => id,
                            None => self.start_event()?,
                        };
                        let id = self.add_component_node(ep, binding, Lane::Main, None)?;
                        self.connect(&previous, &id, None, None, None)?;
                        let surplus = self.place_surplus(ep, reference, Lane::Main, None, &id)?;
                        prev = Some(surplus.last().cloned().unwrap_or(id));
                    }
                }
            }
            let endpoint = ep.endpoint;
            if let Some(branching) = &endpoint.branching {
                let previous = match prev.take() {
                    Some(id) => id,
                    None => self.start_event()?,
                };
                tails = self.wire_branching(ep, branching, &previous)?;
            }
        }
        let start_id = match self.nodes.first() {
            Some((id, _)) => id.clone(),
            None => self.start_event()?,
        };
        if tails.is_empty() {
            tails.push(prev.unwrap_or_else(|| start_id.clone()));
        }
        let end_id = self.end_event()?;
        for tail in &tails {
            self.connect(tail, &end_id, None, None, None)?;
        }

        let mut handler_no = 0usize;
        for ep in endpoints.iter_mut() {
            let endpoint = ep.endpoint;
            let handlers = endpoint
                .error_handling
                .as_ref()
                .map(|e| e.exception_subprocess.as_slice())
                .unwrap_or_default();
            for (h, handler) in handlers.iter().enumerate() {
                self.wire_handler(ep, h, handler_no, handler)?;
                handler_no += 1;
            }
        }

        if !timer_start {
            self.wire_sender(doc, &endpoints, &start_id)?;
        }
        for ep in &endpoints {
            self.report_orphans(ep);
        }
        self.process_participant(doc)?;
        self.finish(doc, &start_id, &end_id)
    }

    fn prepare<'d>(&mut self, idx: usize, endpoint: &'d Endpoint) -> Result<PreparedEndpoint<'d>> {
        let owner = format!("endpoints[{idx}]");
        let outcome = repair::validate_and_fix(&endpoint.components);
        self.diagnostics
            .extend(outcome.diagnostics.into_iter().map(|mut d| {
                d.location = d.location.map(|loc| format!("{owner}.{loc}"));
                d
            }));

        let mut components = Vec::with_capacity(outcome.components.len());
        for (cidx, raw) in outcome.components.into_iter().enumerate() {
            let pointer = format!("/endpoints/{idx}/components/{cidx}");
            let component: Component =
                serde_json::from_value(raw).map_err(|e| IflowError::Shape {
                    message: e.to_string(),
                    location: IflowErrorLocation::at_pointer(pointer.clone()),
                })?;
            for (field, value) in [("id", &component.id), ("name", &component.name)] {
                if value.trim().is_empty() {
                    return Err(IflowError::MissingIdentity {
                        field,
                        location: IflowErrorLocation::at_pointer(pointer.clone()),
                    });
                }
            }
            let kind = ComponentKind::parse(&component.kind, &component.id)?;
            let resolved_id = self.ids.claim(&component.id);
            if resolved_id != component.id {
                debug!(original = %component.id, resolved = %resolved_id, "renamed component id");
            }
            if resolved_id != slugify(&component.id) {
                self.diagnostics.push(Diagnostic::new(
                    DUPLICATE_COMPONENT_ID,
                    format!(
                        "component id '{}' is already taken; this declaration becomes '{resolved_id}'",
                        component.id
                    ),
                    Some(format!("{owner}.components[{cidx}]")),
                ));
            }
            components.push(PreparedComponent {
                component,
                kind,
                resolved_id,
            });
        }
        let refs = ReferenceTable::new(components.iter().map(|c| c.component.id.as_str()));

        let sequence = if !endpoint.sequence.is_empty() {
            endpoint.sequence.clone()
        } else if !endpoint.connections.is_empty() {
            sequence_from_connections(&endpoint.connections, &owner)?
        } else {
            implicit_sequence(endpoint, &components)
        };

        let mut ep = PreparedEndpoint {
            idx,
            owner,
            endpoint,
            components,
            refs,
            sequence,
        };
        check_references(&mut ep)?;
        Ok(ep)
    }

    fn effective_kind(&mut self, ep: &PreparedEndpoint<'_>, pc: &PreparedComponent) -> ComponentKind {
        if pc.kind != ComponentKind::RequestReply {
            return pc.kind;
        }
        let resolvable = pc
            .component
            .receiver_adapter
            .as_ref()
            .and_then(|a| AdapterKind::from_adapter_type(&a.adapter_type))
            .is_some();
        if resolvable || self.config.malformed_policy == MalformedPolicy::Abort {
            return pc.kind;
        }
        warn!(component = %pc.resolved_id, "falling back to a generic HTTP receiver");
        self.diagnostics.push(Diagnostic::new(
            HTTP_FALLBACK,
            format!(
                "component '{}' could not be classified; rendered as HTTP receiver",
                pc.component.id
            ),
            Some(format!("{}.components.{}", ep.owner, pc.component.id)),
        ));
        ComponentKind::Adapter(AdapterKind::Http)
    }

    fn add_component_node(
        &mut self,
        ep: &PreparedEndpoint<'_>,
        binding: Binding,
        lane: Lane,
        container: Option<&str>,
    ) -> Result<String> {
        let pc = &ep.components[binding.index];
        let id = if binding.repeat {
            self.ids.claim(&pc.resolved_id)
        } else {
            pc.resolved_id.clone()
        };
        let kind = self.effective_kind(ep, pc);
        let input = ComponentInput::new(&id, &pc.component.name, &pc.component.config)
            .with_receiver_adapter(pc.component.receiver_adapter.as_ref());
        let fragment = templates::build(self.renderer, kind, &input)?;
        debug!(component = %id, %kind, "rendered component");
        self.note_resources(kind, &input);

        let xml = fragment.definition.clone().unwrap_or_default();
        self.push_node(&id, &pc.component.name, NodeKind::Component(pc.kind), fragment.category, container, xml, lane);

        if let (Some(participant), Some(message_flow)) = (fragment.participant, fragment.message_flow) {
            let participant_id = self.ids.participant(&id);
            let message_flow_id = self.ids.message_flow(&id);
            let bindings = Bindings::new()
                .bind(Placeholder::ParticipantId, participant_id.clone())
                .bind(Placeholder::MessageFlowId, message_flow_id.clone())
                .bind(Placeholder::SourceRef, id.clone())
                .bind(Placeholder::TargetRef, participant_id.clone());
            self.participants.push(ParticipantNode {
                id: participant_id.clone(),
                role: ParticipantRole::Receiver,
                anchor: Some(id.clone()),
                xml: substitute(&participant, &bindings, &id)?,
            });
            self.message_flows.push(MessageFlowEdge {
                id: message_flow_id,
                source: id.clone(),
                target: participant_id.clone(),
                xml: substitute(&message_flow, &bindings, &id)?,
            });
            self.layout
                .calculate_participant_position(&participant_id, &id)?;
        }
        Ok(id)
    }

    /// Remember the files a rendered step needs inside the package.
    fn note_resources(&mut self, kind: ComponentKind, input: &ComponentInput<'_>) {
        let adapter = match kind {
            ComponentKind::Adapter(adapter) => Some(adapter),
            ComponentKind::RequestReply => input
                .receiver_adapter
                .and_then(|a| AdapterKind::from_adapter_type(&a.adapter_type)),
            _ => None,
        };
        if kind == ComponentKind::GroovyScript {
            self.scripts.entry(steps::script_file(input)).or_insert(None);
        } else if adapter == Some(AdapterKind::OData) {
            match adapters::entity_set(input) {
                Some(set) => {
                    self.entity_sets.insert(set);
                }
                None => debug!(component = %input.id, "OData call without an entity set"),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_node(
        &mut self,
        id: &str,
        name: &str,
        kind: NodeKind,
        category: NodeCategory,
        container: Option<&str>,
        xml: String,
        lane: Lane,
    ) {
        self.layout.calculate_position_in_lane(id, category, lane);
        self.nodes.insert(
            id.to_string(),
            ProcessNode {
                id: id.to_string(),
                name: name.to_string(),
                kind,
                category,
                container: container.map(str::to_string),
                incoming: Vec::new(),
                outgoing: Vec::new(),
                default_flow: None,
                xml,
            },
        );
    }

    fn start_event(&mut self) -> Result<String> {
        let xml = events::message_start(self.renderer, START_EVENT_ID, "Start")?;
        self.push_node(START_EVENT_ID, "Start", NodeKind::StartEvent, NodeCategory::Event, None, xml, Lane::Main);
        Ok(START_EVENT_ID.to_string())
    }

    fn end_event(&mut self) -> Result<String> {
        let xml = events::message_end(self.renderer, END_EVENT_ID, "End")?;
        self.push_node(END_EVENT_ID, "End", NodeKind::EndEvent, NodeCategory::Event, None, xml, Lane::Main);
        Ok(END_EVENT_ID.to_string())
    }

    fn connect(
        &mut self,
        source: &str,
        target: &str,
        name: Option<String>,
        condition: Option<String>,
        container: Option<&str>,
    ) -> Result<String> {
        let id = self.ids.sequence_flow();
        for (node_id, outgoing) in [(source, true), (target, false)] {
            let node = self.nodes.get_mut(node_id).ok_or_else(|| IflowError::Internal {
                message: format!("sequence flow {id} refers to unknown node '{node_id}'"),
                location: IflowErrorLocation::at_path(format!("process.{id}")),
            })?;
            if outgoing {
                node.outgoing.push(id.clone());
            } else {
                node.incoming.push(id.clone());
            }
        }
        self.flows.push(SequenceFlowEdge {
            id: id.clone(),
            source: source.to_string(),
            target: target.to_string(),
            name,
            condition,
            container: container.map(str::to_string),
            xml: String::new(),
        });
        Ok(id)
    }

    /// Chain the declarations sharing `reference`'s id that no reference reaches right after
    /// `after`, under their renamed ids. Returns the nodes placed.
    fn place_surplus(
        &mut self,
        ep: &mut PreparedEndpoint<'_>,
        reference: &str,
        lane: Lane,
        container: Option<&str>,
        after: &str,
    ) -> Result<Vec<String>> {
        if ep.refs.declarations(reference) < 2 {
            return Ok(Vec::new());
        }
        let components = &ep.components;
        let surplus = ep.refs.take_surplus(reference, |idx| {
            !matches!(
                components[idx].kind,
                ComponentKind::TimerStart | ComponentKind::HttpsSender | ComponentKind::ExceptionSubprocess
            )
        });
        let mut placed = Vec::with_capacity(surplus.len());
        let mut prev = after.to_string();
        for binding in surplus {
            debug!(
                reference,
                component = %ep.components[binding.index].resolved_id,
                "placing duplicate declaration"
            );
            let node = self.add_component_node(ep, binding, lane, container)?;
            self.connect(&prev, &node, None, None, container)?;
            placed.push(node.clone());
            prev = node;
        }
        Ok(placed)
    }

    fn take_sender(&mut self, ep: &PreparedEndpoint<'_>, binding: Binding) -> Result<()> {
        let pc = &ep.components[binding.index];
        if let Some((existing, _, _)) = &self.sender {
            if *existing != pc.resolved_id {
                return Err(graph_error(
                    format!(
                        "sender channel already configured by '{existing}'; '{}' is a second one",
                        pc.resolved_id
                    ),
                    &ep.owner,
                ));
            }
            return Ok(());
        }
        self.sender = Some((
            pc.resolved_id.clone(),
            pc.component.name.clone(),
            pc.component.config.clone(),
        ));
        Ok(())
    }

    /// Gateway after the last happy-path node, one outgoing flow per branch. Returns the
    /// nodes that still need a flow to the end event.
    fn wire_branching(
        &mut self,
        ep: &mut PreparedEndpoint<'_>,
        branching: &Branching,
        previous: &str,
    ) -> Result<Vec<String>> {
        let owner = format!("{}.branching", ep.owner);
        if branching.branches.is_empty() {
            return Err(graph_error("branching block declares no branches", &owner));
        }
        let gateway = match &branching.gateway {
            Some(reference) => {
                let from = format!("{owner}.gateway");
                let binding = ep.refs.resolve(reference, &from)?;
                let kind = ep.components[binding.index].kind;
                let fits = match branching.branching_type {
                    BranchingType::Exclusive => kind == ComponentKind::Router,
                    BranchingType::Parallel => matches!(
                        kind,
                        ComponentKind::Multicast | ComponentKind::SequentialMulticast
                    ),
                };
                if !fits {
                    return Err(graph_error(
                        format!("'{reference}' ({kind}) cannot open a {:?} branching", branching.branching_type),
                        &from,
                    ));
                }
                self.add_component_node(ep, binding, Lane::Main, None)?
            }
            None => {
                let id = self.ids.claim(&format!("Gateway_{}", ep.idx + 1));
                let name = branching.name.clone().unwrap_or_else(|| match branching.branching_type {
                    BranchingType::Exclusive => "Router".to_string(),
                    BranchingType::Parallel => "Multicast".to_string(),
                });
                let fragment = gateways::synthesize(self.renderer, branching.branching_type, &id, &name)?;
                let xml = fragment.definition.unwrap_or_default();
                self.push_node(&id, &name, NodeKind::SynthesizedGateway(fragment.kind), NodeCategory::Gateway, None, xml, Lane::Main);
                id
            }
        };
        self.connect(previous, &gateway, None, None, None)?;

        let branch_x = self.layout.cursor();
        let mut furthest_x = branch_x;
        let mut tails = Vec::with_capacity(branching.branches.len());
        let exclusive = branching.branching_type == BranchingType::Exclusive;
        for (b, branch) in branching.branches.iter().enumerate() {
            self.layout.set_cursor(branch_x);
            let mut prev_node = gateway.clone();
            for (step, reference) in branch.chain().enumerate() {
                let from = format!("{owner}.branches[{b}]");
                let binding = ep.refs.resolve(reference, &from)?;
                let node = self.add_component_node(ep, binding, Lane::Branch(b), None)?;
                if step == 0 {
                    let condition = if exclusive { branch.condition.clone() } else { None };
                    if !exclusive && branch.condition.is_some() {
                        debug!(branch = b, "condition ignored on parallel branch");
                    }
                    let flow = self.connect(&gateway, &node, branch.name.clone(), condition, None)?;
                    if branch.default && exclusive {
                        let gw = self.nodes.get_mut(&gateway).ok_or_else(|| IflowError::Internal {
                            message: format!("gateway '{gateway}' vanished"),
                            location: IflowErrorLocation::at_path(owner.clone()),
                        })?;
                        if let Some(existing) = &gw.default_flow {
                            return Err(graph_error(
                                format!("branches {existing} and {flow} are both marked default"),
                                &owner,
                            ));
                        }
                        gw.default_flow = Some(flow);
                    }
                } else {
                    self.connect(&prev_node, &node, None, None, None)?;
                }
                let surplus = self.place_surplus(ep, reference, Lane::Branch(b), None, &node)?;
                prev_node = surplus.last().cloned().unwrap_or(node);
            }
            furthest_x = furthest_x.max(self.layout.cursor());
            tails.push(prev_node);
        }
        self.layout.set_cursor(furthest_x);

        if exclusive {
            return Ok(tails);
        }
        let join_id = self.ids.claim(&format!("Join_{}", ep.idx + 1));
        let join = gateways::synthesize_join(self.renderer, &join_id)?;
        let xml = join.definition.unwrap_or_default();
        self.push_node(&join_id, "Join", NodeKind::SynthesizedGateway(ComponentKind::Join), NodeCategory::Gateway, None, xml, Lane::Main);
        for tail in &tails {
            self.connect(tail, &join_id, None, None, None)?;
        }
        Ok(vec![join_id])
    }

    /// Exception subprocess on its own lane with an independent chain of flows.
    fn wire_handler(
        &mut self,
        ep: &mut PreparedEndpoint<'_>,
        local_no: usize,
        handler_no: usize,
        handler: &ErrorHandler,
    ) -> Result<()> {
        let owner = format!("{}.error_handling.exception_subprocess[{local_no}]", ep.owner);
        let mut name = handler
            .name
            .clone()
            .unwrap_or_else(|| "Exception Subprocess".to_string());
        let container_id = match handler.id.as_deref().filter(|id| ep.refs.contains(id)) {
            Some(reference) => {
                let binding = ep.refs.resolve(reference, &owner)?;
                let pc = &ep.components[binding.index];
                if pc.kind != ComponentKind::ExceptionSubprocess {
                    return Err(graph_error(
                        format!("'{reference}' is a {} and cannot be a handler", pc.kind),
                        &owner,
                    ));
                }
                name = pc.component.name.clone();
                pc.resolved_id.clone()
            }
            None => {
                let hint = handler
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("SubProcess_{}", handler_no + 1));
                self.ids.claim(&hint)
            }
        };
        if let Some(trigger) = &handler.trigger {
            debug!(handler = %container_id, %trigger, "exception subprocess trigger");
        }

        let saved_x = self.layout.cursor();
        self.layout.set_cursor(self.layout.settings().start_x);
        let lane = Lane::ErrorHandling(handler_no);
        let container = Some(container_id.as_str());
        let mut children = Vec::new();

        let start_id = self.ids.claim(&format!("{container_id}_Start"));
        let xml = events::error_start(self.renderer, &start_id, "Error Start")?;
        self.push_node(&start_id, "Error Start", NodeKind::ErrorStartEvent, NodeCategory::Event, container, xml, lane);
        children.push(start_id.clone());

        let mut prev_node = start_id;
        for (step, reference) in handler.components.iter().enumerate() {
            let from = format!("{owner}.components[{step}]");
            let binding = ep.refs.resolve(reference, &from)?;
            let kind = ep.components[binding.index].kind;
            if matches!(
                kind,
                ComponentKind::TimerStart | ComponentKind::HttpsSender | ComponentKind::ExceptionSubprocess
            ) {
                return Err(graph_error(format!("{kind} cannot run inside an exception subprocess"), &from));
            }
            let node = self.add_component_node(ep, binding, lane, container)?;
            self.connect(&prev_node, &node, None, None, container)?;
            children.push(node.clone());
            let surplus = self.place_surplus(ep, reference, lane, container, &node)?;
            children.extend(surplus.iter().cloned());
            prev_node = surplus.last().cloned().unwrap_or(node);
        }

        let end_id = self.ids.claim(&format!("{container_id}_End"));
        let xml = events::handler_end(self.renderer, &end_id, "Error End", handler.end)?;
        self.push_node(&end_id, "Error End", NodeKind::ErrorEndEvent, NodeCategory::Event, container, xml, lane);
        self.connect(&prev_node, &end_id, None, None, container)?;
        children.push(end_id);

        let config = Map::new();
        let fragment = templates::build(
            self.renderer,
            ComponentKind::ExceptionSubprocess,
            &ComponentInput::new(&container_id, &name, &config),
        )?;
        let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
        self.layout.container_bounds(&container_id, &child_refs)?;
        self.nodes.insert(
            container_id.clone(),
            ProcessNode {
                id: container_id.clone(),
                name,
                kind: NodeKind::ExceptionSubprocess,
                category: fragment.category,
                container: None,
                incoming: Vec::new(),
                outgoing: Vec::new(),
                default_flow: None,
                xml: fragment.definition.unwrap_or_default(),
            },
        );
        self.layout.set_cursor(saved_x.max(self.layout.cursor()));
        Ok(())
    }

    fn wire_sender(
        &mut self,
        doc: &IntegrationDoc,
        endpoints: &[PreparedEndpoint<'_>],
        start_id: &str,
    ) -> Result<()> {
        let defaults = &self.config.sender;
        let url_path = endpoints
            .first()
            .and_then(|ep| ep.endpoint.path.clone())
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| format!("/{}", slugify(&doc.process_name)));
        let mut config = Map::new();
        config.insert("url_path".to_string(), Value::String(url_path));
        config.insert("user_role".to_string(), Value::String(defaults.user_role.clone()));
        config.insert("auth_type".to_string(), Value::String(defaults.auth_type.clone()));
        config.insert(
            "maximum_body_size".to_string(),
            Value::from(defaults.maximum_body_size),
        );
        let declared = self.sender.take().or_else(|| {
            endpoints.iter().flat_map(|ep| &ep.components).find_map(|pc| {
                (pc.kind == ComponentKind::HttpsSender).then(|| {
                    (
                        pc.resolved_id.clone(),
                        pc.component.name.clone(),
                        pc.component.config.clone(),
                    )
                })
            })
        });
        let (sender_id, name) = match declared {
            Some((id, name, overrides)) => {
                config.extend(overrides);
                (id, name)
            }
            None => ("Sender".to_string(), "Sender".to_string()),
        };
        let fragment = templates::build(
            self.renderer,
            ComponentKind::HttpsSender,
            &ComponentInput::new(&sender_id, &name, &config),
        )?;
        let (Some(participant), Some(message_flow)) = (fragment.participant, fragment.message_flow)
        else {
            return Err(IflowError::Internal {
                message: "sender channel rendered without participant".to_string(),
                location: IflowErrorLocation::at_path("collaboration.sender"),
            });
        };
        let message_flow_id = self.ids.message_flow(SENDER_PARTICIPANT_ID);
        let bindings = Bindings::new()
            .bind(Placeholder::ParticipantId, SENDER_PARTICIPANT_ID)
            .bind(Placeholder::MessageFlowId, message_flow_id.clone())
            .bind(Placeholder::SourceRef, SENDER_PARTICIPANT_ID)
            .bind(Placeholder::TargetRef, start_id);
        self.participants.insert(
            0,
            ParticipantNode {
                id: SENDER_PARTICIPANT_ID.to_string(),
                role: ParticipantRole::Sender,
                anchor: None,
                xml: substitute(&participant, &bindings, &sender_id)?,
            },
        );
        self.message_flows.insert(
            0,
            MessageFlowEdge {
                id: message_flow_id,
                source: SENDER_PARTICIPANT_ID.to_string(),
                target: start_id.to_string(),
                xml: substitute(&message_flow, &bindings, &sender_id)?,
            },
        );
        self.layout
            .calculate_sender_position(SENDER_PARTICIPANT_ID, start_id)?;
        Ok(())
    }

    fn report_orphans(&mut self, ep: &PreparedEndpoint<'_>) {
        for (idx, pc) in ep.components.iter().enumerate() {
            if ep.refs.is_bound(idx) || pc.kind == ComponentKind::HttpsSender {
                continue;
            }
            warn!(component = %pc.resolved_id, endpoint = ep.idx, "component is never referenced");
            let message = if pc.resolved_id != slugify(&pc.component.id) {
                format!(
                    "duplicate declaration of '{}' (renamed '{}') is not referenced and was not rendered",
                    pc.component.id, pc.resolved_id
                )
            } else {
                format!("component '{}' is not referenced and was not rendered", pc.component.id)
            };
            self.diagnostics.push(Diagnostic::new(
                ORPHAN_COMPONENT,
                message,
                Some(format!("{}.components[{idx}]", ep.owner)),
            ));
        }
    }

    fn process_participant(&mut self, doc: &IntegrationDoc) -> Result<()> {
        let xml = self.renderer.render(
            PARTICIPANT,
            &ParticipantView {
                id: PROCESS_PARTICIPANT_ID.to_string(),
                ifl_type: INTEGRATION_PROCESS.to_string(),
                name: doc.process_name.clone(),
                process_ref: Some(PROCESS_ID.to_string()),
                properties: vec![Property::new("ifl:type", INTEGRATION_PROCESS)],
            },
        )?;
        let others: Vec<&str> = self.participants.iter().map(|p| p.id.as_str()).collect();
        self.layout.process_bounds(PROCESS_PARTICIPANT_ID, &others);
        let at = self
            .participants
            .iter()
            .position(|p| p.role != ParticipantRole::Sender)
            .unwrap_or(self.participants.len());
        self.participants.insert(
            at,
            ParticipantNode {
                id: PROCESS_PARTICIPANT_ID.to_string(),
                role: ParticipantRole::IntegrationProcess,
                anchor: None,
                xml,
            },
        );
        Ok(())
    }

    /// Fill placeholders, render flows and the diagram, then verify the graph.
    fn finish(mut self, doc: &IntegrationDoc, start_id: &str, end_id: &str) -> Result<AssembledFlow> {
        for flow in self.flows.iter_mut() {
            let properties = flow
                .condition
                .as_deref()
                .map(gateways::route_properties)
                .unwrap_or_default();
            flow.xml = self.renderer.render(
                SEQUENCE_FLOW,
                &SequenceFlowView {
                    id: flow.id.clone(),
                    name: flow.name.clone(),
                    source: flow.source.clone(),
                    target: flow.target.clone(),
                    condition: flow.condition.clone(),
                    properties,
                },
            )?;
        }

        let ids: Vec<String> = self.nodes.keys().cloned().collect();
        for containers in [false, true] {
            for id in &ids {
                let Some(node) = self.nodes.get(id) else { continue };
                if (node.kind == NodeKind::ExceptionSubprocess) != containers {
                    continue;
                }
                let body = if containers {
                    self.subprocess_body(id)
                } else {
                    String::new()
                };
                let bindings = Bindings::new()
                    .bind(Placeholder::IncomingFlow, flow_refs("incoming", &node.incoming))
                    .bind(Placeholder::OutgoingFlow, flow_refs("outgoing", &node.outgoing))
                    .bind(
                        Placeholder::DefaultFlow,
                        gateways::default_flow_attribute(node.default_flow.as_deref()),
                    )
                    .bind(Placeholder::SubprocessBody, body);
                let xml = substitute(&node.xml, &bindings, id)?;
                if let Some(node) = self.nodes.get_mut(id) {
                    node.xml = xml;
                }
            }
        }

        let mut shapes = Vec::with_capacity(self.layout.positions().len());
        for (element, pos) in self.layout.positions() {
            shapes.push(self.renderer.render(
                SHAPE,
                &ShapeView {
                    element: element.clone(),
                    x: pos.x,
                    y: pos.y,
                    width: pos.width,
                    height: pos.height,
                },
            )?);
        }
        let mut edges = Vec::with_capacity(self.flows.len() + self.message_flows.len());
        for flow in &self.flows {
            let wp = self
                .layout
                .calculate_sequence_flow_waypoints(&flow.source, &flow.target)?;
            edges.push(self.render_edge(&flow.id, &flow.source, &flow.target, wp)?);
        }
        for flow in &self.message_flows {
            let wp = self
                .layout
                .calculate_message_flow_waypoints(&flow.source, &flow.target)?;
            edges.push(self.render_edge(&flow.id, &flow.source, &flow.target, wp)?);
        }

        let flow = AssembledFlow {
            process_name: doc.process_name.clone(),
            description: doc.description.clone().unwrap_or_default(),
            participants: self.participants,
            message_flows: self.message_flows,
            nodes: self.nodes.into_values().collect(),
            sequence_flows: self.flows,
            shapes,
            edges,
            parameters: doc.parameters.clone(),
            scripts: collect_scripts(self.scripts, doc),
            entity_sets: self.entity_sets.into_iter().collect(),
            diagnostics: self.diagnostics,
        };
        check_terminals(&flow, start_id, end_id)?;
        let problems = lint::lint_assembled(&flow);
        if !problems.is_empty() {
            return Err(IflowError::Graph {
                message: problems.join("; "),
                location: IflowErrorLocation::at_path("process"),
            });
        }
        Ok(flow)
    }

    fn subprocess_body(&self, container_id: &str) -> String {
        let owned = |c: &Option<String>| c.as_deref() == Some(container_id);
        self.nodes
            .values()
            .filter(|n| owned(&n.container))
            .map(|n| n.xml.as_str())
            .chain(
                self.flows
                    .iter()
                    .filter(|f| owned(&f.container))
                    .map(|f| f.xml.as_str()),
            )
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_edge(
        &self,
        element: &str,
        source: &str,
        target: &str,
        wp: Waypoints,
    ) -> Result<String> {
        self.renderer.render(
            EDGE,
            &EdgeView {
                element: element.to_string(),
                source: source.to_string(),
                target: target.to_string(),
                source_x: wp.source_x,
                source_y: wp.source_y,
                target_x: wp.target_x,
                target_y: wp.target_y,
            },
        )
    }
}

fn graph_error(message: impl Into<String>, path: &str) -> IflowError {
    IflowError::Graph {
        message: message.into(),
        location: IflowErrorLocation::at_path(path),
    }
}

/// Declaration order minus components that other blocks place.
fn implicit_sequence(endpoint: &Endpoint, components: &[PreparedComponent]) -> Vec<String> {
    let mut placed_elsewhere: Vec<&str> = Vec::new();
    if let Some(branching) = &endpoint.branching {
        placed_elsewhere.extend(branching.gateway.as_deref());
        for branch in &branching.branches {
            placed_elsewhere.extend(branch.chain());
        }
    }
    if let Some(handling) = &endpoint.error_handling {
        for handler in &handling.exception_subprocess {
            placed_elsewhere.extend(handler.id.as_deref());
            placed_elsewhere.extend(handler.components.iter().map(String::as_str));
        }
    }
    components
        .iter()
        .filter(|pc| {
            pc.kind != ComponentKind::ExceptionSubprocess
                && !placed_elsewhere.contains(&pc.component.id.as_str())
        })
        .map(|pc| pc.component.id.clone())
        .collect()
}

/// Scripts referenced by steps, filled with the bodies `transformations` carry. Groovy
/// transformations nobody references still ship, after the referenced ones.
fn collect_scripts(mut scripts: IndexMap<String, Option<String>>, doc: &IntegrationDoc) -> Vec<ScriptResource> {
    for transformation in doc.endpoints.iter().flat_map(|e| &e.transformations) {
        let (Some(file), Some(body)) = (transformation.script_file(), transformation.script.as_ref()) else {
            continue;
        };
        let slot = scripts.entry(file).or_insert(None);
        if slot.is_none() {
            *slot = Some(body.clone());
        }
    }
    scripts
        .into_iter()
        .map(|(file, body)| ScriptResource { file, body })
        .collect()
}

/// Every reference must name a declared component before anything is built. Counting them
/// up front lets duplicate declarations be placed after the last reference to their id.
fn check_references(ep: &mut PreparedEndpoint<'_>) -> Result<()> {
    for (pos, reference) in ep.sequence.iter().enumerate() {
        ep.refs
            .note(reference, &format!("{}.sequence[{pos}]", ep.owner))?;
    }
    if let Some(branching) = &ep.endpoint.branching {
        if let Some(gateway) = &branching.gateway {
            ep.refs
                .note(gateway, &format!("{}.branching.gateway", ep.owner))?;
        }
        for (b, branch) in branching.branches.iter().enumerate() {
            for reference in branch.chain() {
                ep.refs
                    .note(reference, &format!("{}.branching.branches[{b}]", ep.owner))?;
            }
        }
    }
    if let Some(handling) = &ep.endpoint.error_handling {
        for (h, handler) in handling.exception_subprocess.iter().enumerate() {
            let owner = format!("{}.error_handling.exception_subprocess[{h}]", ep.owner);
            if let Some(id) = handler.id.as_deref().filter(|id| ep.refs.contains(id)) {
                ep.refs.note(id, &owner)?;
            }
            for reference in &handler.components {
                ep.refs.note(reference, &owner)?;
            }
        }
    }
    Ok(())
}

/// Start must lead somewhere and the end must be reached, through flows that exist.
fn check_terminals(flow: &AssembledFlow, start_id: &str, end_id: &str) -> Result<()> {
    for (id, outgoing) in [(start_id, true), (end_id, false)] {
        let node = flow.node(id).ok_or_else(|| graph_error(format!("'{id}' missing"), "process"))?;
        let refs = if outgoing { &node.outgoing } else { &node.incoming };
        if refs.is_empty() {
            return Err(graph_error(
                format!("'{id}' has no {} flow", if outgoing { "outgoing" } else { "incoming" }),
                "process",
            ));
        }
        if let Some(missing) = refs.iter().find(|r| flow.sequence_flow(r).is_none()) {
            return Err(graph_error(
                format!("'{id}' references missing sequence flow '{missing}'"),
                "process",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> IntegrationDoc {
        serde_json::from_value(value).unwrap()
    }

    fn assemble(value: Value) -> Result<AssembledFlow> {
        let config = GeneratorConfig::default();
        FlowAssembler::new(&config)?.assemble(&doc(value))
    }

    #[test]
    fn empty_document_links_start_to_end() {
        let flow = assemble(json!({"process_name": "Empty", "endpoints": []})).unwrap();
        assert_eq!(flow.sequence_flows.len(), 1);
        assert_eq!(flow.sequence_flows[0].source, START_EVENT_ID);
        assert_eq!(flow.sequence_flows[0].target, END_EVENT_ID);
        assert_eq!(flow.participants.len(), 2);
    }

    #[test]
    fn timer_start_replaces_start_event_and_sender() {
        let flow = assemble(json!({
            "process_name": "Nightly",
            "endpoints": [{
                "components": [
                    {"type": "timer", "id": "t1", "name": "Every night", "config": {}},
                    {"type": "groovy_script", "id": "s1", "name": "Work", "config": {}}
                ],
                "sequence": ["t1", "s1"]
            }]
        }))
        .unwrap();
        assert!(flow.node(START_EVENT_ID).is_none());
        assert!(flow.participants.iter().all(|p| p.role != ParticipantRole::Sender));
        assert_eq!(flow.sequence_flows[0].source, "t1");
    }

    #[test]
    fn timer_in_the_middle_is_rejected() {
        let err = assemble(json!({
            "process_name": "Bad",
            "endpoints": [{
                "components": [
                    {"type": "groovy_script", "id": "s1", "name": "Work", "config": {}},
                    {"type": "timer", "id": "t1", "name": "Later", "config": {}}
                ],
                "sequence": ["s1", "t1"]
            }]
        }))
        .unwrap_err();
        assert_eq!(err.code(), "GRAPH_INTEGRITY");
    }

    #[test]
    fn unclassifiable_request_reply_aborts_by_default() {
        let err = assemble(json!({
            "process_name": "Mystery",
            "endpoints": [{
                "components": [{"type": "request_reply", "id": "c1", "name": "Call", "config": {}}],
                "sequence": ["c1"]
            }]
        }))
        .unwrap_err();
        assert_eq!(err.code(), "MALFORMED_COMPONENT_SHAPE");
    }

    #[test]
    fn http_fallback_policy_renders_generic_receiver() {
        let config = GeneratorConfig {
            malformed_policy: MalformedPolicy::HttpFallback,
            ..GeneratorConfig::default()
        };
        let flow = FlowAssembler::new(&config)
            .unwrap()
            .assemble(&doc(json!({
                "process_name": "Mystery",
                "endpoints": [{
                    "components": [{"type": "request_reply", "id": "c1", "name": "Call", "config": {}}],
                    "sequence": ["c1"]
                }]
            })))
            .unwrap();
        assert_eq!(flow.receivers().count(), 1);
        assert!(flow.diagnostics.iter().any(|d| d.code == HTTP_FALLBACK));
        assert!(flow.message_flows[1].xml.contains("<value>HTTP</value>"));
    }

    #[test]
    fn sender_component_overrides_url_path() {
        let flow = assemble(json!({
            "process_name": "Orders",
            "endpoints": [{
                "path": "/orders",
                "components": [
                    {"type": "https_sender", "id": "in", "name": "Inbound", "config": {"url_path": "/custom"}},
                    {"type": "groovy_script", "id": "s1", "name": "Work", "config": {}}
                ],
                "sequence": ["in", "s1"]
            }]
        }))
        .unwrap();
        let sender = &flow.message_flows[0];
        assert!(sender.xml.contains("<value>/custom</value>"));
        assert_eq!(sender.target, START_EVENT_ID);
        assert!(flow.diagnostics.iter().all(|d| d.code != ORPHAN_COMPONENT));
    }

    #[test]
    fn connections_stand_in_for_sequence() {
        let flow = assemble(json!({
            "process_name": "Chain",
            "endpoints": [{
                "components": [
                    {"type": "groovy_script", "id": "b", "name": "B", "config": {}},
                    {"type": "groovy_script", "id": "a", "name": "A", "config": {}}
                ],
                "connections": [{"source": "a", "target": "b"}]
            }]
        }))
        .unwrap();
        let order: Vec<_> = flow
            .sequence_flows
            .iter()
            .map(|f| (f.source.as_str(), f.target.as_str()))
            .collect();
        assert_eq!(order, [(START_EVENT_ID, "a"), ("a", "b"), ("b", END_EVENT_ID)]);
    }
}
