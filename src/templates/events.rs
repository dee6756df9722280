use crate::{
    constants::{ERROR_END_EVENT, MESSAGE_END_EVENT, MESSAGE_START_EVENT},
    error::Result,
    kind::ComponentKind,
    layout::NodeCategory,
    model::HandlerEnd,
    template::{FLOW_STEP, StepView, TemplateRenderer},
};

use super::{
    ComponentInput, Fragment, Placeholder, PropertyList, StepWiring, render_step, variant_for,
};

fn event_fragment(id: &str, kind: ComponentKind, definition: String) -> Fragment {
    Fragment {
        id: id.to_string(),
        kind,
        category: NodeCategory::Event,
        definition: Some(definition),
        participant: None,
        message_flow: None,
    }
}

/// Message start event; the process entry when no timer replaces it.
pub fn message_start(renderer: &TemplateRenderer, id: &str, name: &str) -> Result<String> {
    render_step(
        renderer,
        &MESSAGE_START_EVENT,
        id,
        name,
        PropertyList::new().variant(&MESSAGE_START_EVENT).into_vec(),
        StepWiring {
            outgoing: true,
            event_definition: "message",
            ..Default::default()
        },
    )
}

pub fn message_end(renderer: &TemplateRenderer, id: &str, name: &str) -> Result<String> {
    render_step(
        renderer,
        &MESSAGE_END_EVENT,
        id,
        name,
        PropertyList::new().variant(&MESSAGE_END_EVENT).into_vec(),
        StepWiring {
            incoming: true,
            event_definition: "message",
            ..Default::default()
        },
    )
}

pub fn error_end(renderer: &TemplateRenderer, id: &str, name: &str) -> Result<String> {
    render_step(
        renderer,
        &ERROR_END_EVENT,
        id,
        name,
        PropertyList::new().variant(&ERROR_END_EVENT).into_vec(),
        StepWiring {
            incoming: true,
            event_definition: "error",
            ..Default::default()
        },
    )
}

/// Entry of an exception subprocess. It carries no properties.
pub fn error_start(renderer: &TemplateRenderer, id: &str, name: &str) -> Result<String> {
    let view = StepView {
        element: "startEvent".to_string(),
        id: id.to_string(),
        name: name.to_string(),
        outgoing: Placeholder::OutgoingFlow.token(),
        event_definition: "error".to_string(),
        ..StepView::default()
    };
    renderer.render(FLOW_STEP, &view)
}

pub fn handler_end(
    renderer: &TemplateRenderer,
    id: &str,
    name: &str,
    end: HandlerEnd,
) -> Result<String> {
    match end {
        HandlerEnd::Message => message_end(renderer, id, name),
        HandlerEnd::Error => error_end(renderer, id, name),
    }
}

pub fn build_timer_start(renderer: &TemplateRenderer, input: &ComponentInput<'_>) -> Result<Fragment> {
    let variant = variant_for(ComponentKind::TimerStart)?;
    let schedule = input.cfg_or(&["schedule", "schedule_key", "scheduleKey", "cron"], "fireOnce");
    let properties = PropertyList::new()
        .set("scheduleKey", schedule)
        .variant(variant)
        .into_vec();
    let definition = render_step(
        renderer,
        variant,
        input.id,
        input.name,
        properties,
        StepWiring {
            outgoing: true,
            event_definition: "timer",
            ..Default::default()
        },
    )?;
    Ok(event_fragment(input.id, ComponentKind::TimerStart, definition))
}

/// Subprocess shell; the assembler fills `{{subprocess_body}}` with its inner chain.
pub fn build_exception_subprocess(
    renderer: &TemplateRenderer,
    input: &ComponentInput<'_>,
) -> Result<Fragment> {
    let variant = variant_for(ComponentKind::ExceptionSubprocess)?;
    let definition = render_step(
        renderer,
        variant,
        input.id,
        input.name,
        PropertyList::new().variant(variant).into_vec(),
        StepWiring {
            body: Placeholder::SubprocessBody.token(),
            ..Default::default()
        },
    )?;
    Ok(Fragment {
        id: input.id.to_string(),
        kind: ComponentKind::ExceptionSubprocess,
        category: NodeCategory::Activity,
        definition: Some(definition),
        participant: None,
        message_flow: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_start_has_no_properties() {
        let renderer = TemplateRenderer::new().unwrap();
        let xml = error_start(&renderer, "ErrorStart_1", "Error Start").unwrap();
        assert!(!xml.contains("<ifl:property>"));
        assert!(xml.contains("<bpmn2:errorEventDefinition/>"));
        assert!(xml.contains("{{outgoing_flow}}"));
        assert!(!xml.contains("{{incoming_flow}}"));
    }

    #[test]
    fn error_end_uses_error_definition() {
        let renderer = TemplateRenderer::new().unwrap();
        let xml = handler_end(&renderer, "EndEvent_9", "Fail", HandlerEnd::Error).unwrap();
        assert!(xml.contains("cname::ErrorEndEvent"));
        assert!(xml.contains("<bpmn2:errorEventDefinition/>"));
    }

    #[test]
    fn message_start_carries_variant() {
        let renderer = TemplateRenderer::new().unwrap();
        let xml = message_start(&renderer, "StartEvent_2", "Start").unwrap();
        assert!(xml.starts_with(r#"<bpmn2:startEvent id="StartEvent_2" name="Start""#));
        assert!(xml.contains("cname::MessageStartEvent"));
    }

    #[test]
    fn subprocess_leaves_body_slot() {
        let renderer = TemplateRenderer::new().unwrap();
        let config = serde_json::Map::new();
        let input = ComponentInput::new("SubProcess_1", "Handle Errors", &config);
        let fragment = build_exception_subprocess(&renderer, &input).unwrap();
        let xml = fragment.definition.unwrap();
        assert!(xml.contains("{{subprocess_body}}"));
        assert!(xml.contains("<value>Exception Subprocess</value>"));
    }
}
