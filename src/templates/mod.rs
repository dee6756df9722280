//! Template library: one builder per component kind family.
//!
//! Builders are pure. They render XML with placeholder tokens for everything that depends on
//! graph position; the assembler fills those in with [`substitute`].

pub mod adapters;
pub mod events;
pub mod gateways;
pub mod steps;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{
    constants::{StepVariant, step_variant},
    error::{IflowError, IflowErrorLocation, Result},
    kind::ComponentKind,
    layout::NodeCategory,
    model::{ReceiverAdapter, config_scalar},
    template::{FLOW_STEP, Property, StepView, TemplateRenderer},
    util::PLACEHOLDER_RE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    IncomingFlow,
    OutgoingFlow,
    SourceRef,
    TargetRef,
    DefaultFlow,
    ParticipantId,
    MessageFlowId,
    SubprocessBody,
}

impl Placeholder {
    pub fn name(self) -> &'static str {
        match self {
            Placeholder::IncomingFlow => "incoming_flow",
            Placeholder::OutgoingFlow => "outgoing_flow",
            Placeholder::SourceRef => "source_ref",
            Placeholder::TargetRef => "target_ref",
            Placeholder::DefaultFlow => "default_flow",
            Placeholder::ParticipantId => "participant_id",
            Placeholder::MessageFlowId => "message_flow_id",
            Placeholder::SubprocessBody => "subprocess_body",
        }
    }

    pub fn token(self) -> String {
        format!("{{{{{}}}}}", self.name())
    }
}

/// Values for the placeholder tokens of one fragment.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: IndexMap<&'static str, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.values.insert(placeholder.name(), value.into());
        self
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values.get(placeholder.name()).map(String::as_str)
    }
}

/// Replace every placeholder token; an unbound token is an error, never left in the output.
pub fn substitute(text: &str, bindings: &Bindings, owner: &str) -> Result<String> {
    let mut missing = Vec::new();
    let replaced = PLACEHOLDER_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        match bindings.values.get(key) {
            Some(value) => value.clone(),
            None => {
                missing.push(key.to_string());
                String::new()
            }
        }
    });
    if missing.is_empty() {
        Ok(replaced.into_owned())
    } else {
        Err(IflowError::Template {
            template: owner.to_string(),
            message: format!("unresolved placeholder(s): {}", missing.join(", ")),
            location: IflowErrorLocation::at_path(format!("components.{owner}")),
        })
    }
}

/// Render `<bpmn2:incoming>`/`<bpmn2:outgoing>` lists for a placeholder binding.
pub fn flow_refs(tag: &str, ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("<bpmn2:{tag}>{}</bpmn2:{tag}>", crate::util::xml_escape(id)))
        .collect::<Vec<_>>()
        .join("\n    ")
}

/// Everything a builder may read from a component.
#[derive(Debug, Clone, Copy)]
pub struct ComponentInput<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub config: &'a Map<String, Value>,
    pub receiver_adapter: Option<&'a ReceiverAdapter>,
}

impl<'a> ComponentInput<'a> {
    pub fn new(id: &'a str, name: &'a str, config: &'a Map<String, Value>) -> Self {
        ComponentInput {
            id,
            name,
            config,
            receiver_adapter: None,
        }
    }

    pub fn with_receiver_adapter(mut self, adapter: Option<&'a ReceiverAdapter>) -> Self {
        self.receiver_adapter = adapter;
        self
    }

    fn require_identity(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(IflowError::MissingIdentity {
                field: "id",
                location: IflowErrorLocation::at_path(format!("components[name={}]", self.name)),
            });
        }
        if self.name.trim().is_empty() {
            return Err(IflowError::MissingIdentity {
                field: "name",
                location: IflowErrorLocation::at_path(format!("components.{}", self.id)),
            });
        }
        Ok(())
    }

    /// First non-empty scalar among `keys`.
    pub fn cfg(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| config_scalar(self.config, key))
    }

    pub fn cfg_or(&self, keys: &[&str], default: &str) -> String {
        self.cfg(keys).unwrap_or_else(|| default.to_string())
    }

    pub fn cfg_bool(&self, keys: &[&str], default: bool) -> String {
        self.cfg(keys)
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_else(|| default.to_string())
    }
}

/// Rendered pieces for one component.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub id: String,
    pub kind: ComponentKind,
    pub category: NodeCategory,
    /// Process-side element; `None` for kinds without one.
    pub definition: Option<String>,
    pub participant: Option<String>,
    pub message_flow: Option<String>,
}

impl Fragment {
    pub fn is_external_call(&self) -> bool {
        self.participant.is_some() && self.message_flow.is_some() && self.definition.is_some()
    }
}

/// Ordered `ifl:property` list.
#[derive(Debug, Clone, Default)]
pub struct PropertyList {
    props: Vec<Property>,
}

impl PropertyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.props.push(Property::new(key, value));
        self
    }

    /// Append the fixed `componentVersion` / `activityType` / `cmdVariantUri` triple.
    pub fn variant(mut self, variant: &StepVariant) -> Self {
        self.props
            .push(Property::new("componentVersion", variant.component_version));
        if let Some(activity) = variant.activity_type {
            self.props.push(Property::new("activityType", activity));
        }
        self.props
            .push(Property::new("cmdVariantUri", variant.cmd_variant_uri));
        self
    }

    pub fn into_vec(self) -> Vec<Property> {
        self.props
    }
}

pub(crate) fn variant_for(kind: ComponentKind) -> Result<&'static StepVariant> {
    step_variant(kind).ok_or_else(|| IflowError::Internal {
        message: format!("no process variant for kind '{kind}'"),
        location: IflowErrorLocation::at_path(format!("templates.{kind}")),
    })
}

/// How a process-side element connects to its neighbours.
#[derive(Debug, Clone, Default)]
pub(crate) struct StepWiring {
    pub incoming: bool,
    pub outgoing: bool,
    pub event_definition: &'static str,
    pub attribute_slot: String,
    pub body: String,
}

impl StepWiring {
    pub fn through() -> Self {
        StepWiring {
            incoming: true,
            outgoing: true,
            ..Default::default()
        }
    }
}

pub(crate) fn render_step(
    renderer: &TemplateRenderer,
    variant: &StepVariant,
    id: &str,
    name: &str,
    properties: Vec<Property>,
    wiring: StepWiring,
) -> Result<String> {
    let view = StepView {
        element: variant.element.tag().to_string(),
        id: id.to_string(),
        name: name.to_string(),
        attributes: Vec::new(),
        attribute_slot: wiring.attribute_slot,
        properties,
        incoming: if wiring.incoming {
            Placeholder::IncomingFlow.token()
        } else {
            String::new()
        },
        outgoing: if wiring.outgoing {
            Placeholder::OutgoingFlow.token()
        } else {
            String::new()
        },
        event_definition: wiring.event_definition.to_string(),
        body: wiring.body,
    };
    renderer.render(FLOW_STEP, &view)
}

/// Dispatch a component to its builder. Every kind has exactly one builder.
pub fn build(
    renderer: &TemplateRenderer,
    kind: ComponentKind,
    input: &ComponentInput<'_>,
) -> Result<Fragment> {
    input.require_identity()?;
    match kind {
        ComponentKind::RequestReply => adapters::build_request_reply(renderer, input),
        ComponentKind::Adapter(adapter) => adapters::build_external_call(renderer, adapter, input),
        ComponentKind::HttpsSender => adapters::build_sender_channel(renderer, input),
        ComponentKind::TimerStart => events::build_timer_start(renderer, input),
        ComponentKind::ExceptionSubprocess => events::build_exception_subprocess(renderer, input),
        ComponentKind::Router
        | ComponentKind::Multicast
        | ComponentKind::SequentialMulticast
        | ComponentKind::Join => gateways::build(renderer, kind, input),
        ComponentKind::ContentModifier
        | ComponentKind::MessageMapping
        | ComponentKind::OperationMapping
        | ComponentKind::XsltMapping
        | ComponentKind::GroovyScript
        | ComponentKind::Filter
        | ComponentKind::XmlValidator
        | ComponentKind::XmlModifier
        | ComponentKind::GeneralSplitter
        | ComponentKind::IdocSplitter
        | ComponentKind::EdiSplitter
        | ComponentKind::Aggregator
        | ComponentKind::Gather
        | ComponentKind::Base64Encoder
        | ComponentKind::Base64Decoder
        | ComponentKind::WriteToLog
        | ComponentKind::WriteVariables
        | ComponentKind::DataStoreSelect
        | ComponentKind::DataStoreWrite
        | ComponentKind::DataStoreGet
        | ComponentKind::Persist
        | ComponentKind::IdMapping
        | ComponentKind::JsonToXml
        | ComponentKind::XmlToJson
        | ComponentKind::XmlToCsv
        | ComponentKind::CsvToXml
        | ComponentKind::ProcessCall
        | ComponentKind::EdiExtractor
        | ComponentKind::EdiValidator => steps::build(renderer, kind, input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitute_fills_all_tokens() {
        let text = "<a>{{incoming_flow}}</a><b>{{ outgoing_flow }}</b>";
        let bindings = Bindings::new()
            .bind(Placeholder::IncomingFlow, "in")
            .bind(Placeholder::OutgoingFlow, "out");
        assert_eq!(
            substitute(text, &bindings, "c1").unwrap(),
            "<a>in</a><b>out</b>"
        );
    }

    #[test]
    fn substitute_rejects_unbound_tokens() {
        let err = substitute("{{target_ref}}", &Bindings::new(), "c1").unwrap_err();
        assert!(err.to_string().contains("target_ref"));
    }

    #[test]
    fn missing_name_is_a_hard_error() {
        let renderer = TemplateRenderer::new().unwrap();
        let config = json!({}).as_object().cloned().unwrap();
        let input = ComponentInput::new("c1", " ", &config);
        let err = build(&renderer, ComponentKind::GroovyScript, &input).unwrap_err();
        assert!(matches!(err, IflowError::MissingIdentity { field: "name", .. }));
    }

    #[test]
    fn builders_are_idempotent() {
        let renderer = TemplateRenderer::new().unwrap();
        let config = json!({"script": "def run() {}"}).as_object().cloned().unwrap();
        let input = ComponentInput::new("s1", "Script", &config);
        let first = build(&renderer, ComponentKind::GroovyScript, &input).unwrap();
        let second = build(&renderer, ComponentKind::GroovyScript, &input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn placeholder_token_format() {
        assert_eq!(Placeholder::IncomingFlow.token(), "{{incoming_flow}}");
    }
}
