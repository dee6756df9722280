//! External calls (service task + receiver participant + message flow) and the sender channel.

use serde_json::Value;

use crate::{
    constants::{
        AdapterVariant, ENDPOINT_RECEIVER, ENDPOINT_SENDER, HTTPS_SENDER, adapter_variant,
    },
    error::{IflowError, IflowErrorLocation, Result},
    kind::{AdapterKind, ComponentKind},
    layout::NodeCategory,
    template::{
        MESSAGE_FLOW, MessageFlowView, PARTICIPANT, ParticipantView, Property, TemplateRenderer,
    },
    util::{HTTP_VERB_RE, OPERATION_VERB_RE},
};

use super::{ComponentInput, Fragment, Placeholder, PropertyList, StepWiring, render_step, variant_for};

/// Adapter named by a component's `receiver_adapter.type`.
pub fn resolve_adapter_kind(input: &ComponentInput<'_>) -> Option<AdapterKind> {
    input
        .receiver_adapter
        .and_then(|adapter| AdapterKind::from_adapter_type(&adapter.adapter_type))
}

/// HTTP verb carried by `Create(POST)`, `post` and similar spellings.
pub fn http_verb(raw: &str) -> Option<String> {
    if let Some(caps) = OPERATION_VERB_RE.captures(raw) {
        return Some(caps[1].to_ascii_uppercase());
    }
    let trimmed = raw.trim();
    HTTP_VERB_RE
        .is_match(trimmed)
        .then(|| trimmed.to_ascii_uppercase())
}

pub fn build_request_reply(
    renderer: &TemplateRenderer,
    input: &ComponentInput<'_>,
) -> Result<Fragment> {
    let adapter = resolve_adapter_kind(input).ok_or_else(|| {
        let found = input
            .receiver_adapter
            .map(|a| format!("unknown receiver_adapter type '{}'", a.adapter_type))
            .unwrap_or_else(|| "request-reply without receiver_adapter".to_string());
        IflowError::MalformedComponentShape {
            component_id: input.id.to_string(),
            message: found,
            location: IflowErrorLocation::at_path(format!(
                "components.{}.receiver_adapter",
                input.id
            )),
        }
    })?;
    build_external_call(renderer, adapter, input)
}

pub fn build_external_call(
    renderer: &TemplateRenderer,
    adapter: AdapterKind,
    input: &ComponentInput<'_>,
) -> Result<Fragment> {
    let kind = ComponentKind::Adapter(adapter);
    let task = variant_for(kind)?;
    let definition = render_step(
        renderer,
        task,
        input.id,
        input.name,
        PropertyList::new().variant(task).into_vec(),
        StepWiring::through(),
    )?;

    let variant = adapter_variant(adapter);
    let participant_name = input
        .cfg(&["system", "receiver_system", "receiver"])
        .unwrap_or_else(|| format!("{}_Receiver", input.name));
    let participant = renderer.render(
        PARTICIPANT,
        &ParticipantView {
            id: Placeholder::ParticipantId.token(),
            ifl_type: ENDPOINT_RECEIVER.to_string(),
            name: participant_name,
            process_ref: None,
            properties: vec![Property::new("ifl:type", ENDPOINT_RECEIVER)],
        },
    )?;
    let properties = variant_tail(adapter_properties(adapter, input), variant);
    let message_flow = renderer.render(
        MESSAGE_FLOW,
        &MessageFlowView {
            id: Placeholder::MessageFlowId.token(),
            name: variant.display_name.to_string(),
            source: Placeholder::SourceRef.token(),
            target: Placeholder::TargetRef.token(),
            properties,
        },
    )?;

    Ok(Fragment {
        id: input.id.to_string(),
        kind,
        category: NodeCategory::Activity,
        definition: Some(definition),
        participant: Some(participant),
        message_flow: Some(message_flow),
    })
}

/// Inbound HTTPS channel. Renders no process node; the message flow targets the start event.
pub fn build_sender_channel(
    renderer: &TemplateRenderer,
    input: &ComponentInput<'_>,
) -> Result<Fragment> {
    let participant = renderer.render(
        PARTICIPANT,
        &ParticipantView {
            id: Placeholder::ParticipantId.token(),
            ifl_type: ENDPOINT_SENDER.to_string(),
            name: input.name.to_string(),
            process_ref: None,
            properties: vec![
                Property::new("enableBasicAuthentication", "false"),
                Property::new("ifl:type", ENDPOINT_SENDER),
            ],
        },
    )?;
    let mut url_path = input.cfg_or(&["url_path", "urlPath", "path", "address"], "/");
    if !url_path.starts_with('/') {
        url_path.insert(0, '/');
    }
    let props = PropertyList::new()
        .set("Description", input.cfg_or(&["description"], ""))
        .set("urlPath", url_path)
        .set(
            "senderAuthType",
            input.cfg_or(&["auth_type", "sender_auth_type"], "RoleBased"),
        )
        .set(
            "userRole",
            input.cfg_or(&["user_role", "role"], "ESBMessaging.send"),
        )
        .set("xsrfProtection", input.cfg_or(&["xsrf_protection"], "0"))
        .set(
            "maximumBodySize",
            input.cfg_or(&["maximum_body_size", "max_body_size"], "40"),
        )
        .set("clientCertificates", input.cfg_or(&["client_certificates"], ""));
    let message_flow = renderer.render(
        MESSAGE_FLOW,
        &MessageFlowView {
            id: Placeholder::MessageFlowId.token(),
            name: HTTPS_SENDER.display_name.to_string(),
            source: Placeholder::SourceRef.token(),
            target: Placeholder::TargetRef.token(),
            properties: variant_tail(props, &HTTPS_SENDER),
        },
    )?;
    Ok(Fragment {
        id: input.id.to_string(),
        kind: ComponentKind::HttpsSender,
        category: NodeCategory::Participant,
        definition: None,
        participant: Some(participant),
        message_flow: Some(message_flow),
    })
}

fn variant_tail(props: PropertyList, variant: &AdapterVariant) -> Vec<Property> {
    props
        .set("ComponentType", variant.component_type)
        .set("ComponentNS", "sap")
        .set("Name", variant.display_name)
        .set("TransportProtocol", variant.transport_protocol)
        .set("TransportProtocolVersion", variant.transport_protocol_version)
        .set("MessageProtocol", variant.message_protocol)
        .set("MessageProtocolVersion", variant.message_protocol_version)
        .set("direction", variant.direction)
        .set("componentVersion", variant.component_version)
        .set("cmdVariantUri", variant.cmd_variant_uri)
        .into_vec()
}

fn adapter_properties(adapter: AdapterKind, input: &ComponentInput<'_>) -> PropertyList {
    let ra = input.receiver_adapter;
    let ra_address = ra.and_then(|a| a.address.clone());
    let ra_endpoint = ra.and_then(|a| a.endpoint.clone());
    let address = input
        .cfg(&["address", "url", "endpoint_url", "service_url", "base_url"])
        .or(ra_address);
    let description = input.cfg_or(&["description"], "");
    let props = PropertyList::new();
    match adapter {
        AdapterKind::Http => props
            .set("Description", description)
            .set("httpMethod", http_method(input))
            .set(
                "httpRequestTimeout",
                input.cfg_or(&["timeout", "request_timeout"], "60000"),
            )
            .set("authenticationMethod", authentication(input, "None"))
            .set("credentialName", credential(input))
            .set("httpAddressWithoutQuery", address.unwrap_or_default())
            .set(
                "throwExceptionOnFailure",
                input.cfg_bool(&["throw_exception_on_failure"], true),
            )
            .set("system", input.cfg_or(&["system"], "")),
        AdapterKind::OData => props
            .set("Description", description)
            .set("pagination", input.cfg_or(&["pagination"], "0"))
            .set("operation", odata_operation(input))
            .set("address", address.unwrap_or_default())
            .set("resourcePath", resource_path(input, ra_endpoint))
            .set("authenticationMethod", authentication(input, "None"))
            .set("credentialName", credential(input))
            .set("queryOptions", input.cfg_or(&["query_options", "query"], "")),
        AdapterKind::Soap => props
            .set("Description", description)
            .set("address", address.unwrap_or_default())
            .set("location_id", input.cfg_or(&["location_id"], ""))
            .set("cleanupHeaders", "1")
            .set("CompressMessage", "false")
            .set(
                "requestTimeout",
                input.cfg_or(&["timeout", "request_timeout"], "60000"),
            )
            .set("authentication", authentication(input, "None"))
            .set("credentialName", credential(input))
            .set("allowChunking", "1")
            .set("SapRmMessageIdDetermination", "Reuse")
            .set("ComponentSWCVName", "external")
            .set("system", input.cfg_or(&["system"], "")),
        AdapterKind::Sftp => {
            let (auth_type, user) = sftp_authentication(input);
            props
                .set(
                    "host",
                    input.cfg_or(&["host", "hostname", "server"], &address.unwrap_or_default()),
                )
                .set("port", input.cfg_or(&["port"], "22"))
                .set("path", input.cfg_or(&["path", "directory", "folder"], "/"))
                .set("authentication", auth_type)
                .set("username", user)
                .set("operation", input.cfg_or(&["operation"], "PUT"))
                .set("fileExist", input.cfg_or(&["file_exist", "file_exists"], "Override"))
                .set("autoCreate", "1")
                .set(
                    "connectTimeout",
                    input.cfg_or(&["connect_timeout", "timeout"], "10000"),
                )
        }
        AdapterKind::SuccessFactors => props
            .set("address", address.unwrap_or_default())
            .set("operation", odata_operation(input))
            .set("authenticationMethod", authentication(input, "OAuth"))
            .set("contentType", input.cfg_or(&["content_type"], "application/json"))
            .set("resourcePath", resource_path(input, ra_endpoint)),
        AdapterKind::ProcessDirect => props
            .set(
                "address",
                address.unwrap_or_else(|| format!("/{}", crate::util::slugify(input.name))),
            )
            .set("Vendor", "SAP")
            .set("ComponentSWCVName", "external"),
    }
}

fn http_method(input: &ComponentInput<'_>) -> String {
    input
        .cfg(&["method", "http_method", "operation"])
        .as_deref()
        .and_then(http_verb)
        .or_else(|| {
            input
                .receiver_adapter
                .and_then(|a| a.operation.as_deref())
                .and_then(http_verb)
        })
        .unwrap_or_else(|| "POST".to_string())
}

/// OData operation label such as `Create(POST)`.
pub fn odata_operation(input: &ComponentInput<'_>) -> String {
    let explicit = input.cfg(&["operation", "odata_operation"]);
    if let Some(op) = explicit.as_deref().filter(|op| op.contains('(')) {
        return op.to_string();
    }
    let ra_operation = input.receiver_adapter.and_then(|a| a.operation.as_deref());
    if let Some(op) = ra_operation.filter(|op| op.contains('(')) {
        return op.to_string();
    }
    let verb = ra_operation
        .and_then(http_verb)
        .or_else(|| explicit.as_deref().and_then(http_verb))
        .or_else(|| input.cfg(&["method", "http_method"]).as_deref().and_then(http_verb));
    match verb.as_deref() {
        Some("POST") => "Create(POST)",
        Some("PUT") => "Update(PUT)",
        Some("PATCH") => "Patch(PATCH)",
        Some("MERGE") => "Merge(MERGE)",
        Some("DELETE") => "Delete(DELETE)",
        _ => "Query(GET)",
    }
    .to_string()
}

fn resource_path(input: &ComponentInput<'_>, fallback: Option<String>) -> String {
    input
        .cfg(&["resource_path", "entity_set", "entity", "resource"])
        .or(fallback)
        .unwrap_or_default()
}

/// Entity set an OData call addresses: the first segment of its resource path, without key
/// predicate or query.
pub fn entity_set(input: &ComponentInput<'_>) -> Option<String> {
    let path = resource_path(input, input.receiver_adapter.and_then(|a| a.endpoint.clone()));
    let set = path
        .trim()
        .trim_start_matches('/')
        .split(['/', '(', '?'])
        .next()
        .unwrap_or_default()
        .trim();
    (!set.is_empty()).then(|| set.to_string())
}

fn authentication(input: &ComponentInput<'_>, default: &str) -> String {
    match input.config.get("authentication") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string(),
        _ => input.cfg_or(&["authentication_method", "auth_method"], default),
    }
}

fn credential(input: &ComponentInput<'_>) -> String {
    if let Some(Value::Object(obj)) = input.config.get("authentication") {
        if let Some(name) = obj.get("credential_name").and_then(Value::as_str) {
            return name.to_string();
        }
    }
    input.cfg_or(&["credential_name", "credential"], "")
}

fn sftp_authentication(input: &ComponentInput<'_>) -> (String, String) {
    let (auth_type, user) = match input.config.get("authentication") {
        Some(Value::Object(obj)) => (
            obj.get("type").and_then(Value::as_str).map(str::to_string),
            obj.get("username").and_then(Value::as_str).map(str::to_string),
        ),
        Some(Value::String(s)) => (Some(s.clone()), None),
        _ => (None, None),
    };
    let auth_type = auth_type
        .unwrap_or_else(|| "password".to_string())
        .to_ascii_lowercase();
    let user = user
        .or_else(|| input.cfg(&["username", "user"]))
        .unwrap_or_default();
    (auth_type, user)
}
