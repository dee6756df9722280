use crate::{
    constants::GATEWAY_ROUTE,
    error::{IflowError, IflowErrorLocation, Result},
    kind::ComponentKind,
    layout::NodeCategory,
    model::BranchingType,
    template::{Property, TemplateRenderer},
};

use super::{ComponentInput, Fragment, Placeholder, PropertyList, StepWiring, render_step, variant_for};

pub fn build(
    renderer: &TemplateRenderer,
    kind: ComponentKind,
    input: &ComponentInput<'_>,
) -> Result<Fragment> {
    let variant = variant_for(kind)?;
    let mut wiring = StepWiring::through();
    let props = PropertyList::new();
    let props = match kind {
        ComponentKind::Router => {
            wiring.attribute_slot = Placeholder::DefaultFlow.token();
            props.set(
                "throwException",
                input.cfg_bool(&["throw_exception", "raise_error"], false),
            )
        }
        ComponentKind::SequentialMulticast => props
            .set(
                "routingSequenceTable",
                input.cfg_or(&["routing_sequence", "routing_sequence_table"], ""),
            )
            .set("subActivityType", "parallel"),
        ComponentKind::Multicast | ComponentKind::Join => props.set("subActivityType", "parallel"),
        other => {
            return Err(IflowError::Internal {
                message: format!("'{other}' is not a gateway"),
                location: IflowErrorLocation::at_path(format!("components.{}", input.id)),
            });
        }
    };
    let definition = render_step(
        renderer,
        variant,
        input.id,
        input.name,
        props.variant(variant).into_vec(),
        wiring,
    )?;
    Ok(Fragment {
        id: input.id.to_string(),
        kind,
        category: NodeCategory::Gateway,
        definition: Some(definition),
        participant: None,
        message_flow: None,
    })
}

/// Gateway for a branching block that names no component of its own.
pub fn synthesize(
    renderer: &TemplateRenderer,
    branching: BranchingType,
    id: &str,
    name: &str,
) -> Result<Fragment> {
    let kind = match branching {
        BranchingType::Exclusive => ComponentKind::Router,
        BranchingType::Parallel => ComponentKind::Multicast,
    };
    let config = serde_json::Map::new();
    build(renderer, kind, &ComponentInput::new(id, name, &config))
}

/// Converging join for parallel branches.
pub fn synthesize_join(renderer: &TemplateRenderer, id: &str) -> Result<Fragment> {
    let config = serde_json::Map::new();
    build(
        renderer,
        ComponentKind::Join,
        &ComponentInput::new(id, "Join", &config),
    )
}

/// Properties on a conditional route leaving an exclusive gateway.
pub fn route_properties(condition: &str) -> Vec<Property> {
    let expression_type = if condition.trim_start().starts_with('/') {
        "XML"
    } else {
        "NonXML"
    };
    PropertyList::new()
        .set("expressionType", expression_type)
        .variant(&GATEWAY_ROUTE)
        .into_vec()
}

/// Value bound to `{{default_flow}}` on a router.
pub fn default_flow_attribute(flow_id: Option<&str>) -> String {
    flow_id
        .map(|id| format!(" default=\"{}\"", crate::util::xml_escape(id)))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_exposes_default_slot() {
        let renderer = TemplateRenderer::new().unwrap();
        let gateway = synthesize(&renderer, BranchingType::Exclusive, "Gateway_1", "Route").unwrap();
        let xml = gateway.definition.unwrap();
        assert!(xml.starts_with(r#"<bpmn2:exclusiveGateway id="Gateway_1" name="Route"{{default_flow}}>"#));
        assert_eq!(gateway.category, NodeCategory::Gateway);
    }

    #[test]
    fn parallel_branching_uses_multicast() {
        let renderer = TemplateRenderer::new().unwrap();
        let gateway = synthesize(&renderer, BranchingType::Parallel, "Gateway_1", "Fan out").unwrap();
        let xml = gateway.definition.unwrap();
        assert!(xml.starts_with("<bpmn2:parallelGateway"));
        assert!(xml.contains("cname::Multicast"));
        assert!(!xml.contains("{{default_flow}}"));
    }

    #[test]
    fn xpath_conditions_are_xml_routes() {
        let props = route_properties("/order/amount > 100");
        assert_eq!(props[0], Property::new("expressionType", "XML"));
        assert!(props.iter().any(|p| p.value.contains("GatewayRoute")));
        assert_eq!(default_flow_attribute(Some("SequenceFlow_3")), r#" default="SequenceFlow_3""#);
        assert_eq!(default_flow_attribute(None), "");
    }
}
