use handlebars::{
    Context, Handlebars, Helper, HelperDef, Output, RenderContext, RenderError, RenderErrorReason,
    Renderable,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{IflowError, IflowErrorLocation, Result},
    util::xml_escape,
};

pub const FLOW_STEP: &str = "flow_step";
pub const SEQUENCE_FLOW: &str = "sequence_flow";
pub const PARTICIPANT: &str = "participant";
pub const MESSAGE_FLOW: &str = "message_flow";
pub const SHAPE: &str = "shape";
pub const EDGE: &str = "edge";
pub const DEFINITIONS: &str = "definitions";
pub const EDMX: &str = "edmx";
pub const GROOVY_SKELETON: &str = "groovy_skeleton";

const PROPERTIES_PARTIAL: &str = r#"{{#each properties}}
        <ifl:property>
            <key>{{key}}</key>
            <value>{{value}}</value>
        </ifl:property>{{/each}}"#;

const FLOW_STEP_TEMPLATE: &str = r#"<bpmn2:{{element}} id="{{id}}" name="{{name}}"{{#each attributes}} {{name}}="{{value}}"{{/each}}{{{attribute_slot}}}>
    <bpmn2:extensionElements>{{> properties}}
    </bpmn2:extensionElements>{{#if incoming}}
    {{{incoming}}}{{/if}}{{#if outgoing}}
    {{{outgoing}}}{{/if}}{{#ifEq event_definition "message"}}
    <bpmn2:messageEventDefinition/>{{/ifEq}}{{#ifEq event_definition "error"}}
    <bpmn2:errorEventDefinition/>{{/ifEq}}{{#ifEq event_definition "timer"}}
    <bpmn2:timerEventDefinition/>{{/ifEq}}{{#if body}}
{{{body}}}{{/if}}
</bpmn2:{{element}}>"#;

const SEQUENCE_FLOW_TEMPLATE: &str = r#"<bpmn2:sequenceFlow id="{{id}}"{{#if name}} name="{{name}}"{{/if}} sourceRef="{{source}}" targetRef="{{target}}"{{#if condition}}>
    <bpmn2:extensionElements>{{> properties}}
    </bpmn2:extensionElements>
    <bpmn2:conditionExpression id="FormalExpression_{{id}}" xsi:type="bpmn2:tFormalExpression">{{condition}}</bpmn2:conditionExpression>
</bpmn2:sequenceFlow>{{else}}/>{{/if}}"#;

const PARTICIPANT_TEMPLATE: &str = r#"<bpmn2:participant id="{{{id}}}" ifl:type="{{ifl_type}}" name="{{default name ifl_type}}"{{#if process_ref}} processRef="{{process_ref}}"{{/if}}>
    <bpmn2:extensionElements>{{> properties}}
    </bpmn2:extensionElements>
</bpmn2:participant>"#;

const MESSAGE_FLOW_TEMPLATE: &str = r#"<bpmn2:messageFlow id="{{{id}}}" name="{{name}}" sourceRef="{{{source}}}" targetRef="{{{target}}}">
    <bpmn2:extensionElements>{{> properties}}
    </bpmn2:extensionElements>
</bpmn2:messageFlow>"#;

const SHAPE_TEMPLATE: &str = r#"<bpmndi:BPMNShape bpmnElement="{{element}}" id="BPMNShape_{{element}}">
    <dc:Bounds height="{{height}}.0" width="{{width}}.0" x="{{x}}.0" y="{{y}}.0"/>
</bpmndi:BPMNShape>"#;

const EDGE_TEMPLATE: &str = r#"<bpmndi:BPMNEdge bpmnElement="{{element}}" id="BPMNEdge_{{element}}" sourceElement="BPMNShape_{{source}}" targetElement="BPMNShape_{{target}}">
    <di:waypoint x="{{source_x}}.0" xsi:type="dc:Point" y="{{source_y}}.0"/>
    <di:waypoint x="{{target_x}}.0" xsi:type="dc:Point" y="{{target_y}}.0"/>
</bpmndi:BPMNEdge>"#;

const DEFINITIONS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn2:definitions xmlns:bpmn2="{{ns.bpmn2}}" xmlns:bpmndi="{{ns.bpmndi}}" xmlns:dc="{{ns.dc}}" xmlns:di="{{ns.di}}" xmlns:ifl="{{ns.ifl}}" xmlns:xsi="{{ns.xsi}}" id="{{definitions_id}}">
    <bpmn2:collaboration id="{{collaboration_id}}" name="Default Collaboration">
        <bpmn2:documentation id="Documentation_{{collaboration_id}}" textFormat="text/plain">{{description}}</bpmn2:documentation>
        <bpmn2:extensionElements>{{#with collaboration}}{{> properties}}{{/with}}
        </bpmn2:extensionElements>
{{#each participants}}{{{this}}}
{{/each}}{{#each message_flows}}{{{this}}}
{{/each}}    </bpmn2:collaboration>
    <bpmn2:process id="{{process_id}}" name="{{process_name}}">
        <bpmn2:extensionElements>{{#with process}}{{> properties}}{{/with}}
        </bpmn2:extensionElements>
{{#each process_elements}}{{{this}}}
{{/each}}    </bpmn2:process>
    <bpmndi:BPMNDiagram id="BPMNDiagram_1" name="Default Collaboration Diagram">
        <bpmndi:BPMNPlane bpmnElement="{{collaboration_id}}" id="BPMNPlane_1">
{{#each shapes}}{{{this}}}
{{/each}}{{#each edges}}{{{this}}}
{{/each}}        </bpmndi:BPMNPlane>
    </bpmndi:BPMNDiagram>
</bpmn2:definitions>
"#;

/// One `<ifl:property>` key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub key: String,
    pub value: String,
}

impl Property {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Property {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StepView {
    pub element: String,
    pub id: String,
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Raw text appended after the attributes (placeholder for late-bound attributes).
    pub attribute_slot: String,
    pub properties: Vec<Property>,
    pub incoming: String,
    pub outgoing: String,
    pub event_definition: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SequenceFlowView {
    pub id: String,
    pub name: Option<String>,
    pub source: String,
    pub target: String,
    pub condition: Option<String>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParticipantView {
    pub id: String,
    pub ifl_type: String,
    pub name: String,
    pub process_ref: Option<String>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageFlowView {
    pub id: String,
    pub name: String,
    pub source: String,
    pub target: String,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShapeView {
    pub element: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EdgeView {
    pub element: String,
    pub source: String,
    pub target: String,
    pub source_x: i64,
    pub source_y: i64,
    pub target_x: i64,
    pub target_y: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Namespaces {
    pub bpmn2: &'static str,
    pub bpmndi: &'static str,
    pub dc: &'static str,
    pub di: &'static str,
    pub ifl: &'static str,
    pub xsi: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyBlock {
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DefinitionsView {
    pub ns: Namespaces,
    pub definitions_id: String,
    pub collaboration_id: String,
    pub description: String,
    pub collaboration: PropertyBlock,
    pub participants: Vec<String>,
    pub message_flows: Vec<String>,
    pub process_id: String,
    pub process_name: String,
    pub process: PropertyBlock,
    pub process_elements: Vec<String>,
    pub shapes: Vec<String>,
    pub edges: Vec<String>,
}

const EDMX_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="1.0" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata" xmlns:sap="http://www.sap.com/Protocols/SAPData">
  <edmx:DataServices m:DataServiceVersion="2.0">
    <Schema Namespace="{{namespace}}" xmlns="http://schemas.microsoft.com/ado/2008/09/edm">
      <EntityType Name="{{entity_type}}">
        <Key>
          <PropertyRef Name="{{key}}" />
        </Key>{{#each properties}}
        <Property Name="{{name}}" Type="{{edm_type}}" Nullable="{{nullable}}" />{{/each}}
      </EntityType>
      <EntityContainer Name="{{namespace}}" m:IsDefaultEntityContainer="true">
        <EntitySet Name="{{entity_set}}" EntityType="{{namespace}}.{{entity_type}}" />
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;

const GROOVY_SKELETON_TEMPLATE: &str = r#"import com.sap.gateway.ip.core.customdev.util.Message

// {{{file}}}: body not supplied with the integration description.
def Message processData(Message message) {
    def body = message.getBody(String)
    message.setBody(body)
    return message
}
"#;

#[derive(Serialize, Debug, Clone)]
pub struct EdmxProperty {
    pub name: &'static str,
    pub edm_type: &'static str,
    pub nullable: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct EdmxView {
    pub namespace: String,
    pub entity_type: String,
    pub entity_set: String,
    pub key: &'static str,
    pub properties: Vec<EdmxProperty>,
}

#[derive(Serialize, Debug, Clone)]
pub struct GroovySkeletonView {
    pub file: String,
}

/// Named XML templates rendered through handlebars with XML escaping.
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

impl TemplateRenderer {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(xml_escape);
        handlebars.register_helper("default", Box::new(DefaultHelper));
        handlebars.register_helper("ifEq", Box::new(IfEqHelper));
        handlebars
            .register_partial("properties", PROPERTIES_PARTIAL)
            .map_err(|e| template_error("properties", e))?;
        for (name, body) in [
            (FLOW_STEP, FLOW_STEP_TEMPLATE),
            (SEQUENCE_FLOW, SEQUENCE_FLOW_TEMPLATE),
            (PARTICIPANT, PARTICIPANT_TEMPLATE),
            (MESSAGE_FLOW, MESSAGE_FLOW_TEMPLATE),
            (SHAPE, SHAPE_TEMPLATE),
            (EDGE, EDGE_TEMPLATE),
            (DEFINITIONS, DEFINITIONS_TEMPLATE),
            (EDMX, EDMX_TEMPLATE),
            (GROOVY_SKELETON, GROOVY_SKELETON_TEMPLATE),
        ] {
            handlebars
                .register_template_string(name, body)
                .map_err(|e| template_error(name, e))?;
        }
        Ok(Self { handlebars })
    }

    pub fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        self.handlebars
            .render(template, data)
            .map_err(|e| template_error(template, e))
    }
}

fn template_error(template: &str, err: impl std::fmt::Display) -> IflowError {
    IflowError::Template {
        template: template.to_string(),
        message: err.to_string(),
        location: IflowErrorLocation::at_path(format!("templates.{template}")),
    }
}

struct DefaultHelper;

impl HelperDef for DefaultHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        helper: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> std::result::Result<(), RenderError> {
        let value = helper.param(0).map(|p| p.value().clone());
        let fallback = helper
            .param(1)
            .map(|p| p.value().clone())
            .ok_or_else(|| helper_error("default helper expects 2 parameters"))?;
        let chosen = match value {
            None | Some(Value::Null) => fallback,
            Some(Value::String(s)) if s.trim().is_empty() => fallback,
            Some(v) => v,
        };
        let rendered = match chosen {
            Value::String(s) => s,
            other => other.to_string(),
        };
        out.write(&xml_escape(&rendered))?;
        Ok(())
    }
}

struct IfEqHelper;

impl HelperDef for IfEqHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        helper: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> std::result::Result<(), RenderError> {
        let left = helper
            .param(0)
            .map(|p| p.value().clone())
            .ok_or_else(|| helper_error("ifEq helper expects 2 parameters"))?;
        let right = helper
            .param(1)
            .map(|p| p.value().clone())
            .ok_or_else(|| helper_error("ifEq helper expects 2 parameters"))?;
        if left == right {
            if let Some(t) = helper.template() {
                t.render(r, ctx, rc, out)?;
            }
        } else if let Some(t) = helper.inverse() {
            t.render(r, ctx, rc, out)?;
        }
        Ok(())
    }
}

fn helper_error(message: &str) -> RenderError {
    RenderErrorReason::Other(message.to_string()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new().unwrap()
    }

    #[test]
    fn step_escapes_user_text_but_keeps_placeholders() {
        let view = StepView {
            element: "callActivity".to_string(),
            id: "c1".to_string(),
            name: "Set <Header> & {{go}}".to_string(),
            properties: vec![Property::new("script", "a < b")],
            incoming: "{{incoming_flow}}".to_string(),
            outgoing: "{{outgoing_flow}}".to_string(),
            ..StepView::default()
        };
        let xml = renderer().render(FLOW_STEP, &view).unwrap();
        assert!(xml.contains(r#"name="Set &lt;Header&gt; &amp; &#123;&#123;go&#125;&#125;""#));
        assert!(xml.contains("<value>a &lt; b</value>"));
        assert!(xml.contains("{{incoming_flow}}"));
        assert!(xml.contains("{{outgoing_flow}}"));
        assert!(xml.ends_with("</bpmn2:callActivity>"));
    }

    #[test]
    fn event_definition_is_selected_by_ifeq() {
        let view = StepView {
            element: "startEvent".to_string(),
            id: "StartEvent_2".to_string(),
            name: "Start".to_string(),
            event_definition: "message".to_string(),
            ..StepView::default()
        };
        let xml = renderer().render(FLOW_STEP, &view).unwrap();
        assert!(xml.contains("<bpmn2:messageEventDefinition/>"));
        assert!(!xml.contains("errorEventDefinition"));
    }

    #[test]
    fn plain_sequence_flow_is_self_closing() {
        let view = SequenceFlowView {
            id: "SequenceFlow_1".to_string(),
            source: "a".to_string(),
            target: "b".to_string(),
            ..SequenceFlowView::default()
        };
        let xml = renderer().render(SEQUENCE_FLOW, &view).unwrap();
        assert_eq!(
            xml,
            r#"<bpmn2:sequenceFlow id="SequenceFlow_1" sourceRef="a" targetRef="b"/>"#
        );
    }

    #[test]
    fn conditional_sequence_flow_carries_expression() {
        let view = SequenceFlowView {
            id: "SequenceFlow_2".to_string(),
            name: Some("High".to_string()),
            source: "gw".to_string(),
            target: "b".to_string(),
            condition: Some("${property.amount} > 100".to_string()),
            properties: vec![Property::new("expressionType", "NonXML")],
        };
        let xml = renderer().render(SEQUENCE_FLOW, &view).unwrap();
        assert!(xml.contains(r#"<bpmn2:conditionExpression id="FormalExpression_SequenceFlow_2""#));
        assert!(xml.contains("$&#123;property.amount&#125; &gt; 100"));
    }

    #[test]
    fn participant_name_falls_back_to_type() {
        let view = ParticipantView {
            id: "Participant_x".to_string(),
            ifl_type: "EndpointRecevier".to_string(),
            ..ParticipantView::default()
        };
        let xml = renderer().render(PARTICIPANT, &view).unwrap();
        assert!(xml.contains(r#"name="EndpointRecevier""#));
    }
}
