//! Fixed protocol literals of the SAP Integration Suite schema registry.
//!
//! Every `componentVersion` / `cmdVariantUri` pair lives here, keyed by kind. The importing
//! product validates these structurally, so they are reproduced verbatim (including the
//! `EndpointRecevier` spelling).

use crate::kind::{AdapterKind, ComponentKind};

pub const ENDPOINT_SENDER: &str = "EndpointSender";
pub const ENDPOINT_RECEIVER: &str = "EndpointRecevier";
pub const INTEGRATION_PROCESS: &str = "IntegrationProcess";

pub const NS_BPMN2: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
pub const NS_BPMNDI: &str = "http://www.omg.org/spec/BPMN/20100524/DI";
pub const NS_DC: &str = "http://www.omg.org/spec/DD/20100524/DC";
pub const NS_DI: &str = "http://www.omg.org/spec/DD/20100524/DI";
pub const NS_IFL: &str = "http:///com.sap.ifl.model/Ifl.xsd";
pub const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub const DEFINITIONS_ID: &str = "Definitions_1";
pub const COLLABORATION_ID: &str = "Collaboration_1";
pub const PROCESS_ID: &str = "Process_1";
pub const PROCESS_PARTICIPANT_ID: &str = "Participant_Process_1";
pub const SENDER_PARTICIPANT_ID: &str = "Participant_1";
pub const START_EVENT_ID: &str = "StartEvent_2";
pub const END_EVENT_ID: &str = "EndEvent_2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpmnElement {
    CallActivity,
    ServiceTask,
    ExclusiveGateway,
    ParallelGateway,
    StartEvent,
    EndEvent,
    SubProcess,
}

impl BpmnElement {
    pub fn tag(self) -> &'static str {
        match self {
            BpmnElement::CallActivity => "callActivity",
            BpmnElement::ServiceTask => "serviceTask",
            BpmnElement::ExclusiveGateway => "exclusiveGateway",
            BpmnElement::ParallelGateway => "parallelGateway",
            BpmnElement::StartEvent => "startEvent",
            BpmnElement::EndEvent => "endEvent",
            BpmnElement::SubProcess => "subProcess",
        }
    }
}

/// Constants row for a process-side node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepVariant {
    pub element: BpmnElement,
    pub component_version: &'static str,
    pub activity_type: Option<&'static str>,
    pub cmd_variant_uri: &'static str,
}

const fn step(
    element: BpmnElement,
    component_version: &'static str,
    activity_type: Option<&'static str>,
    cmd_variant_uri: &'static str,
) -> StepVariant {
    StepVariant {
        element,
        component_version,
        activity_type,
        cmd_variant_uri,
    }
}

use BpmnElement::*;

pub const MESSAGE_START_EVENT: StepVariant = step(
    StartEvent,
    "1.0",
    None,
    "ctype::FlowstepVariant/cname::MessageStartEvent/version::1.0",
);
pub const MESSAGE_END_EVENT: StepVariant = step(
    EndEvent,
    "1.1",
    None,
    "ctype::FlowstepVariant/cname::MessageEndEvent/version::1.1.0",
);
pub const ERROR_END_EVENT: StepVariant = step(
    EndEvent,
    "1.1",
    Some("EndErrorEvent"),
    "ctype::FlowstepVariant/cname::ErrorEndEvent",
);
pub const GATEWAY_ROUTE: StepVariant = step(
    ExclusiveGateway,
    "1.0",
    None,
    "ctype::FlowstepVariant/cname::GatewayRoute/version::1.0.0",
);

const EXTERNAL_CALL: StepVariant = step(
    ServiceTask,
    "1.0",
    Some("ExternalCall"),
    "ctype::FlowstepVariant/cname::ExternalCall/version::1.0.4",
);
const TIMER_START: StepVariant = step(
    StartEvent,
    "1.4",
    Some("StartTimerEvent"),
    "ctype::FlowstepVariant/cname::intermediatetimer/version::1.4.0",
);
const EXCEPTION_SUBPROCESS: StepVariant = step(
    SubProcess,
    "1.1",
    Some("Exception Subprocess"),
    "ctype::FlowstepVariant/cname::ExceptionSubprocess/version::1.1.0",
);
const ENRICHER: StepVariant = step(
    CallActivity,
    "1.6",
    Some("Enricher"),
    "ctype::FlowstepVariant/cname::Enricher/version::1.6.0",
);
const MESSAGE_MAPPING: StepVariant = step(
    CallActivity,
    "1.3",
    Some("Mapping"),
    "ctype::FlowstepVariant/cname::MessageMapping/version::1.3.1",
);
const OPERATION_MAPPING: StepVariant = step(
    CallActivity,
    "1.1",
    Some("Mapping"),
    "ctype::FlowstepVariant/cname::OperationMapping/version::1.1.0",
);
const XSLT_MAPPING: StepVariant = step(
    CallActivity,
    "1.2",
    Some("Mapping"),
    "ctype::FlowstepVariant/cname::XSLTMapping/version::1.2.0",
);
const GROOVY_SCRIPT: StepVariant = step(
    CallActivity,
    "1.1",
    Some("Script"),
    "ctype::FlowstepVariant/cname::GroovyScript/version::1.1.2",
);
const ROUTER: StepVariant = step(
    ExclusiveGateway,
    "1.1",
    Some("ExclusiveGateway"),
    "ctype::FlowstepVariant/cname::ExclusiveGateway/version::1.1.2",
);
const MULTICAST: StepVariant = step(
    ParallelGateway,
    "1.1",
    Some("Multicast"),
    "ctype::FlowstepVariant/cname::Multicast/version::1.1.1",
);
const SEQUENTIAL_MULTICAST: StepVariant = step(
    ParallelGateway,
    "1.1",
    Some("SequentialMulticast"),
    "ctype::FlowstepVariant/cname::SequentialMulticast/version::1.1.0",
);
const JOIN: StepVariant = step(
    ParallelGateway,
    "1.0",
    Some("Join"),
    "ctype::FlowstepVariant/cname::Join/version::1.0.0",
);
const FILTER: StepVariant = step(
    CallActivity,
    "1.1",
    Some("Filter"),
    "ctype::FlowstepVariant/cname::Filter/version::1.1.0",
);
const XML_VALIDATOR: StepVariant = step(
    CallActivity,
    "2.2",
    Some("XmlValidator"),
    "ctype::FlowstepVariant/cname::XmlValidator/version::2.2.3",
);
const XML_MODIFIER: StepVariant = step(
    CallActivity,
    "1.1",
    Some("XmlModifier"),
    "ctype::FlowstepVariant/cname::XmlModifier/version::1.1.0",
);
const GENERAL_SPLITTER: StepVariant = step(
    CallActivity,
    "1.6",
    Some("Splitter"),
    "ctype::FlowstepVariant/cname::GeneralSplitter/version::1.6.0",
);
const IDOC_SPLITTER: StepVariant = step(
    CallActivity,
    "1.1",
    Some("Splitter"),
    "ctype::FlowstepVariant/cname::IDoc/version::1.1.0",
);
const EDI_SPLITTER: StepVariant = step(
    CallActivity,
    "2.9",
    Some("Splitter"),
    "ctype::FlowstepVariant/cname::EDISplitter/version::2.9.0",
);
const AGGREGATOR: StepVariant = step(
    CallActivity,
    "1.4",
    Some("Aggregator"),
    "ctype::FlowstepVariant/cname::Aggregator/version::1.4.0",
);
const GATHER: StepVariant = step(
    CallActivity,
    "1.1",
    Some("Gather"),
    "ctype::FlowstepVariant/cname::Gather/version::1.1.0",
);
const BASE64_ENCODER: StepVariant = step(
    CallActivity,
    "1.0",
    Some("Encoder"),
    "ctype::FlowstepVariant/cname::Base64 Encode/version::1.0.1",
);
const BASE64_DECODER: StepVariant = step(
    CallActivity,
    "1.0",
    Some("Decoder"),
    "ctype::FlowstepVariant/cname::Base64 Decode/version::1.0.1",
);
const WRITE_TO_LOG: StepVariant = step(
    CallActivity,
    "1.0",
    Some("Write to Log"),
    "ctype::FlowstepVariant/cname::WriteToLog/version::1.0.0",
);
const WRITE_VARIABLES: StepVariant = step(
    CallActivity,
    "1.2",
    Some("Variables"),
    "ctype::FlowstepVariant/cname::Variables/version::1.2.0",
);
const DATA_STORE_SELECT: StepVariant = step(
    CallActivity,
    "1.7",
    Some("DBstorage"),
    "ctype::FlowstepVariant/cname::select/version::1.7.1",
);
const DATA_STORE_WRITE: StepVariant = step(
    CallActivity,
    "1.7",
    Some("DBstorage"),
    "ctype::FlowstepVariant/cname::put/version::1.7.1",
);
const DATA_STORE_GET: StepVariant = step(
    CallActivity,
    "1.7",
    Some("DBstorage"),
    "ctype::FlowstepVariant/cname::get/version::1.7.1",
);
const PERSIST: StepVariant = step(
    CallActivity,
    "1.0",
    Some("Persist"),
    "ctype::FlowstepVariant/cname::Persist/version::1.0.2",
);
const ID_MAPPING: StepVariant = step(
    CallActivity,
    "1.0",
    Some("IDMapper"),
    "ctype::FlowstepVariant/cname::IDMapper/version::1.0.0",
);
const JSON_TO_XML: StepVariant = step(
    CallActivity,
    "1.1",
    Some("JsonToXmlConverter"),
    "ctype::FlowstepVariant/cname::JsonToXmlConverter/version::1.1.2",
);
const XML_TO_JSON: StepVariant = step(
    CallActivity,
    "1.0",
    Some("XmlToJsonConverter"),
    "ctype::FlowstepVariant/cname::XmlToJsonConverter/version::1.0.8",
);
const XML_TO_CSV: StepVariant = step(
    CallActivity,
    "1.2",
    Some("XmlToCsvConverter"),
    "ctype::FlowstepVariant/cname::XmlToCsvConverter/version::1.2.0",
);
const CSV_TO_XML: StepVariant = step(
    CallActivity,
    "1.4",
    Some("CsvToXmlConverter"),
    "ctype::FlowstepVariant/cname::CsvToXmlConverter/version::1.4.0",
);
const PROCESS_CALL: StepVariant = step(
    CallActivity,
    "1.0",
    Some("ProcessCallElement"),
    "ctype::FlowstepVariant/cname::NonLoopingProcess/version::1.0.3",
);
const EDI_EXTRACTOR: StepVariant = step(
    CallActivity,
    "1.1",
    Some("EDIExtractor"),
    "ctype::FlowstepVariant/cname::EDIExtractor/version::1.1.0",
);
const EDI_VALIDATOR: StepVariant = step(
    CallActivity,
    "1.1",
    Some("EDIValidator"),
    "ctype::FlowstepVariant/cname::EDIValidator/version::1.1.0",
);

/// Constants row for a kind; `None` for kinds that render no process node.
pub fn step_variant(kind: ComponentKind) -> Option<&'static StepVariant> {
    let variant = match kind {
        ComponentKind::RequestReply | ComponentKind::Adapter(_) => &EXTERNAL_CALL,
        ComponentKind::HttpsSender => return None,
        ComponentKind::TimerStart => &TIMER_START,
        ComponentKind::ExceptionSubprocess => &EXCEPTION_SUBPROCESS,
        ComponentKind::ContentModifier => &ENRICHER,
        ComponentKind::MessageMapping => &MESSAGE_MAPPING,
        ComponentKind::OperationMapping => &OPERATION_MAPPING,
        ComponentKind::XsltMapping => &XSLT_MAPPING,
        ComponentKind::GroovyScript => &GROOVY_SCRIPT,
        ComponentKind::Router => &ROUTER,
        ComponentKind::Multicast => &MULTICAST,
        ComponentKind::SequentialMulticast => &SEQUENTIAL_MULTICAST,
        ComponentKind::Join => &JOIN,
        ComponentKind::Filter => &FILTER,
        ComponentKind::XmlValidator => &XML_VALIDATOR,
        ComponentKind::XmlModifier => &XML_MODIFIER,
        ComponentKind::GeneralSplitter => &GENERAL_SPLITTER,
        ComponentKind::IdocSplitter => &IDOC_SPLITTER,
        ComponentKind::EdiSplitter => &EDI_SPLITTER,
        ComponentKind::Aggregator => &AGGREGATOR,
        ComponentKind::Gather => &GATHER,
        ComponentKind::Base64Encoder => &BASE64_ENCODER,
        ComponentKind::Base64Decoder => &BASE64_DECODER,
        ComponentKind::WriteToLog => &WRITE_TO_LOG,
        ComponentKind::WriteVariables => &WRITE_VARIABLES,
        ComponentKind::DataStoreSelect => &DATA_STORE_SELECT,
        ComponentKind::DataStoreWrite => &DATA_STORE_WRITE,
        ComponentKind::DataStoreGet => &DATA_STORE_GET,
        ComponentKind::Persist => &PERSIST,
        ComponentKind::IdMapping => &ID_MAPPING,
        ComponentKind::JsonToXml => &JSON_TO_XML,
        ComponentKind::XmlToJson => &XML_TO_JSON,
        ComponentKind::XmlToCsv => &XML_TO_CSV,
        ComponentKind::CsvToXml => &CSV_TO_XML,
        ComponentKind::ProcessCall => &PROCESS_CALL,
        ComponentKind::EdiExtractor => &EDI_EXTRACTOR,
        ComponentKind::EdiValidator => &EDI_VALIDATOR,
    };
    Some(variant)
}

/// Constants row for an adapter's message flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterVariant {
    /// Message-flow `name` attribute shown in the editor.
    pub display_name: &'static str,
    pub component_type: &'static str,
    pub transport_protocol: &'static str,
    pub transport_protocol_version: &'static str,
    pub message_protocol: &'static str,
    pub message_protocol_version: &'static str,
    pub direction: &'static str,
    pub component_version: &'static str,
    pub cmd_variant_uri: &'static str,
}

pub const HTTPS_SENDER: AdapterVariant = AdapterVariant {
    display_name: "HTTPS",
    component_type: "HTTPS",
    transport_protocol: "HTTPS",
    transport_protocol_version: "1.4.1",
    message_protocol: "None",
    message_protocol_version: "1.4.1",
    direction: "Sender",
    component_version: "1.4",
    cmd_variant_uri: "ctype::AdapterVariant/cname::sap:HTTPS/tp::HTTPS/mp::None/direction::Sender/version::1.4.1",
};

const HTTP_RECEIVER: AdapterVariant = AdapterVariant {
    display_name: "HTTP",
    component_type: "HTTP",
    transport_protocol: "HTTP",
    transport_protocol_version: "1.15.0",
    message_protocol: "None",
    message_protocol_version: "1.15.0",
    direction: "Receiver",
    component_version: "1.15",
    cmd_variant_uri: "ctype::AdapterVariant/cname::sap:HTTP/tp::HTTP/mp::None/direction::Receiver/version::1.15.0",
};

const ODATA_RECEIVER: AdapterVariant = AdapterVariant {
    display_name: "OData",
    component_type: "HCIOData",
    transport_protocol: "HTTP",
    transport_protocol_version: "1.25.0",
    message_protocol: "OData V2",
    message_protocol_version: "1.25.0",
    direction: "Receiver",
    component_version: "1.25.0",
    cmd_variant_uri: "ctype::AdapterVariant/cname::sap:HCIOData/tp::HTTP/mp::OData V2/direction::Receiver/version::1.25.0",
};

const SOAP_RECEIVER: AdapterVariant = AdapterVariant {
    display_name: "SOAP",
    component_type: "SOAP",
    transport_protocol: "HTTP",
    transport_protocol_version: "1.10.0",
    message_protocol: "Plain SOAP",
    message_protocol_version: "1.10.0",
    direction: "Receiver",
    component_version: "1.9",
    cmd_variant_uri: "ctype::AdapterVariant/cname::sap:SOAP/tp::HTTP/mp::Plain SOAP/direction::Receiver/version::1.9.0",
};

const SFTP_RECEIVER: AdapterVariant = AdapterVariant {
    display_name: "SFTP",
    component_type: "SFTP",
    transport_protocol: "SFTP",
    transport_protocol_version: "1.11.2",
    message_protocol: "File",
    message_protocol_version: "1.11.2",
    direction: "Receiver",
    component_version: "1.11",
    cmd_variant_uri: "ctype::AdapterVariant/cname::sap:SFTP/tp::SFTP/mp::File/direction::Receiver/version::1.11.2",
};

const SUCCESSFACTORS_RECEIVER: AdapterVariant = AdapterVariant {
    display_name: "SuccessFactors",
    component_type: "SuccessFactors",
    transport_protocol: "HTTPS",
    transport_protocol_version: "1.25.0",
    message_protocol: "OData V2",
    message_protocol_version: "1.25.0",
    direction: "Receiver",
    component_version: "1.25",
    cmd_variant_uri: "ctype::AdapterVariant/cname::sap:SuccessFactors/tp::HTTPS/mp::OData V2/direction::Receiver/version::1.25.0",
};

const PROCESS_DIRECT_RECEIVER: AdapterVariant = AdapterVariant {
    display_name: "ProcessDirect",
    component_type: "ProcessDirect",
    transport_protocol: "Not Applicable",
    transport_protocol_version: "1.1.2",
    message_protocol: "Not Applicable",
    message_protocol_version: "1.1.2",
    direction: "Receiver",
    component_version: "1.1",
    cmd_variant_uri: "ctype::AdapterVariant/cname::ProcessDirect/vendor::SAP/tp::Not Applicable/mp::Not Applicable/direction::Receiver/version::1.1.1",
};

pub fn adapter_variant(kind: AdapterKind) -> &'static AdapterVariant {
    match kind {
        AdapterKind::Http => &HTTP_RECEIVER,
        AdapterKind::OData => &ODATA_RECEIVER,
        AdapterKind::Soap => &SOAP_RECEIVER,
        AdapterKind::Sftp => &SFTP_RECEIVER,
        AdapterKind::SuccessFactors => &SUCCESSFACTORS_RECEIVER,
        AdapterKind::ProcessDirect => &PROCESS_DIRECT_RECEIVER,
    }
}

/// Collaboration-level `IFlowConfiguration` variant.
pub const IFLOW_CONFIGURATION_VERSION: &str = "1.1";
pub const IFLOW_CONFIGURATION_URI: &str =
    "ctype::IFlowVariant/cname::IFlowConfiguration/version::1.1.16";

/// Process-level `IntegrationProcess` variant.
pub const INTEGRATION_PROCESS_VERSION: &str = "1.2";
pub const INTEGRATION_PROCESS_URI: &str =
    "ctype::FlowElementVariant/cname::IntegrationProcess/version::1.2.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_calls_share_one_service_task_variant() {
        let rr = step_variant(ComponentKind::RequestReply).unwrap();
        let odata = step_variant(ComponentKind::Adapter(AdapterKind::OData)).unwrap();
        assert_eq!(rr, odata);
        assert_eq!(rr.element, BpmnElement::ServiceTask);
        assert_eq!(rr.activity_type, Some("ExternalCall"));
    }

    #[test]
    fn sender_channel_has_no_process_variant() {
        assert!(step_variant(ComponentKind::HttpsSender).is_none());
    }

    #[test]
    fn odata_message_flow_uses_hci_component_type() {
        assert_eq!(adapter_variant(AdapterKind::OData).component_type, "HCIOData");
        assert_eq!(adapter_variant(AdapterKind::OData).message_protocol, "OData V2");
    }

    #[test]
    fn receiver_uris_are_receiver_direction() {
        for kind in AdapterKind::ALL {
            let variant = adapter_variant(kind);
            assert_eq!(variant.direction, "Receiver");
            assert!(variant.cmd_variant_uri.starts_with("ctype::AdapterVariant/"));
            assert!(variant.cmd_variant_uri.contains("direction::Receiver"));
        }
    }

    #[test]
    fn receiver_spelling_is_preserved() {
        assert_eq!(ENDPOINT_RECEIVER, "EndpointRecevier");
    }
}
