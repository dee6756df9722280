use std::fmt;

use crate::error::{IflowError, IflowErrorLocation, Result};

/// Receiver-side adapters that turn a process step into an external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Http,
    OData,
    Soap,
    Sftp,
    SuccessFactors,
    ProcessDirect,
}

impl AdapterKind {
    pub const ALL: [AdapterKind; 6] = [
        AdapterKind::Http,
        AdapterKind::OData,
        AdapterKind::Soap,
        AdapterKind::Sftp,
        AdapterKind::SuccessFactors,
        AdapterKind::ProcessDirect,
    ];

    /// The `receiver_adapter.type` spelling.
    pub fn adapter_type(self) -> &'static str {
        match self {
            AdapterKind::Http => "http_adapter",
            AdapterKind::OData => "odata_adapter",
            AdapterKind::Soap => "soap_adapter",
            AdapterKind::Sftp => "sftp_adapter",
            AdapterKind::SuccessFactors => "successfactors_adapter",
            AdapterKind::ProcessDirect => "process_direct_adapter",
        }
    }

    /// Accepts `odata_adapter`, `odata`, `OData` and similar spellings.
    pub fn from_adapter_type(raw: &str) -> Option<Self> {
        let key = normalize(raw);
        let key = key.strip_suffix("_adapter").unwrap_or(&key);
        let key = key.strip_suffix("_receiver").unwrap_or(key);
        match key {
            "http" | "https" => Some(AdapterKind::Http),
            "odata" | "hciodata" => Some(AdapterKind::OData),
            "soap" => Some(AdapterKind::Soap),
            "sftp" => Some(AdapterKind::Sftp),
            "successfactors" | "sf" => Some(AdapterKind::SuccessFactors),
            "process_direct" | "processdirect" => Some(AdapterKind::ProcessDirect),
            _ => None,
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.adapter_type())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    RequestReply,
    Adapter(AdapterKind),
    HttpsSender,
    TimerStart,
    ExceptionSubprocess,
    ContentModifier,
    MessageMapping,
    OperationMapping,
    XsltMapping,
    GroovyScript,
    Router,
    Multicast,
    SequentialMulticast,
    Join,
    Filter,
    XmlValidator,
    XmlModifier,
    GeneralSplitter,
    IdocSplitter,
    EdiSplitter,
    Aggregator,
    Gather,
    Base64Encoder,
    Base64Decoder,
    WriteToLog,
    WriteVariables,
    DataStoreSelect,
    DataStoreWrite,
    DataStoreGet,
    Persist,
    IdMapping,
    JsonToXml,
    XmlToJson,
    XmlToCsv,
    CsvToXml,
    ProcessCall,
    EdiExtractor,
    EdiValidator,
}

/// How a kind participates in the process graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Service task plus receiver participant and message flow.
    ExternalCall,
    /// Plain process step with one incoming and one outgoing flow.
    Step,
    /// Gateway with one or more outgoing flows.
    Gateway,
    /// Replaces the message start event.
    StartEvent,
    /// Configures the inbound sender channel; no process node.
    SenderChannel,
    /// Self-contained exception subprocess.
    Container,
}

const ALIASES: &[(&str, ComponentKind)] = &[
    ("request_reply", ComponentKind::RequestReply),
    ("request_reply_pattern", ComponentKind::RequestReply),
    ("requestreply", ComponentKind::RequestReply),
    ("external_call", ComponentKind::RequestReply),
    ("service_task", ComponentKind::RequestReply),
    ("http_adapter", ComponentKind::Adapter(AdapterKind::Http)),
    ("http_receiver", ComponentKind::Adapter(AdapterKind::Http)),
    ("odata_adapter", ComponentKind::Adapter(AdapterKind::OData)),
    ("odata_receiver", ComponentKind::Adapter(AdapterKind::OData)),
    ("odata", ComponentKind::Adapter(AdapterKind::OData)),
    ("soap_adapter", ComponentKind::Adapter(AdapterKind::Soap)),
    ("soap_receiver", ComponentKind::Adapter(AdapterKind::Soap)),
    ("sftp_adapter", ComponentKind::Adapter(AdapterKind::Sftp)),
    ("sftp_receiver", ComponentKind::Adapter(AdapterKind::Sftp)),
    ("sftp", ComponentKind::Adapter(AdapterKind::Sftp)),
    ("successfactors_adapter", ComponentKind::Adapter(AdapterKind::SuccessFactors)),
    ("successfactors_receiver", ComponentKind::Adapter(AdapterKind::SuccessFactors)),
    ("successfactors", ComponentKind::Adapter(AdapterKind::SuccessFactors)),
    ("process_direct", ComponentKind::Adapter(AdapterKind::ProcessDirect)),
    ("process_direct_adapter", ComponentKind::Adapter(AdapterKind::ProcessDirect)),
    ("processdirect", ComponentKind::Adapter(AdapterKind::ProcessDirect)),
    ("https_sender", ComponentKind::HttpsSender),
    ("http_sender", ComponentKind::HttpsSender),
    ("sender", ComponentKind::HttpsSender),
    ("timer", ComponentKind::TimerStart),
    ("timer_start", ComponentKind::TimerStart),
    ("timer_start_event", ComponentKind::TimerStart),
    ("exception_subprocess", ComponentKind::ExceptionSubprocess),
    ("content_modifier", ComponentKind::ContentModifier),
    ("content_enricher", ComponentKind::ContentModifier),
    ("enricher", ComponentKind::ContentModifier),
    ("modifier", ComponentKind::ContentModifier),
    ("set_header", ComponentKind::ContentModifier),
    ("set_property", ComponentKind::ContentModifier),
    ("message_mapping", ComponentKind::MessageMapping),
    ("mapping", ComponentKind::MessageMapping),
    ("operation_mapping", ComponentKind::OperationMapping),
    ("xslt_mapping", ComponentKind::XsltMapping),
    ("xslt", ComponentKind::XsltMapping),
    ("groovy_script", ComponentKind::GroovyScript),
    ("groovy", ComponentKind::GroovyScript),
    ("script", ComponentKind::GroovyScript),
    ("router", ComponentKind::Router),
    ("gateway", ComponentKind::Router),
    ("exclusive_gateway", ComponentKind::Router),
    ("multicast", ComponentKind::Multicast),
    ("parallel_multicast", ComponentKind::Multicast),
    ("parallel_gateway", ComponentKind::Multicast),
    ("sequential_multicast", ComponentKind::SequentialMulticast),
    ("join", ComponentKind::Join),
    ("joiner", ComponentKind::Join),
    ("filter", ComponentKind::Filter),
    ("xml_validator", ComponentKind::XmlValidator),
    ("validator", ComponentKind::XmlValidator),
    ("xml_modifier", ComponentKind::XmlModifier),
    ("general_splitter", ComponentKind::GeneralSplitter),
    ("splitter", ComponentKind::GeneralSplitter),
    ("iterating_splitter", ComponentKind::GeneralSplitter),
    ("idoc_splitter", ComponentKind::IdocSplitter),
    ("edi_splitter", ComponentKind::EdiSplitter),
    ("aggregator", ComponentKind::Aggregator),
    ("gather", ComponentKind::Gather),
    ("base64_encoder", ComponentKind::Base64Encoder),
    ("base64_encode", ComponentKind::Base64Encoder),
    ("encoder", ComponentKind::Base64Encoder),
    ("base64_decoder", ComponentKind::Base64Decoder),
    ("base64_decode", ComponentKind::Base64Decoder),
    ("decoder", ComponentKind::Base64Decoder),
    ("write_to_log", ComponentKind::WriteToLog),
    ("logger", ComponentKind::WriteToLog),
    ("log", ComponentKind::WriteToLog),
    ("write_variables", ComponentKind::WriteVariables),
    ("variables", ComponentKind::WriteVariables),
    ("data_store_select", ComponentKind::DataStoreSelect),
    ("ds_select", ComponentKind::DataStoreSelect),
    ("select", ComponentKind::DataStoreSelect),
    ("data_store_write", ComponentKind::DataStoreWrite),
    ("ds_write", ComponentKind::DataStoreWrite),
    ("write", ComponentKind::DataStoreWrite),
    ("data_store_get", ComponentKind::DataStoreGet),
    ("ds_get", ComponentKind::DataStoreGet),
    ("get", ComponentKind::DataStoreGet),
    ("persist", ComponentKind::Persist),
    ("id_mapping", ComponentKind::IdMapping),
    ("id_mapper", ComponentKind::IdMapping),
    ("json_to_xml", ComponentKind::JsonToXml),
    ("json_to_xml_converter", ComponentKind::JsonToXml),
    ("jsontoxml", ComponentKind::JsonToXml),
    ("xml_to_json", ComponentKind::XmlToJson),
    ("xml_to_json_converter", ComponentKind::XmlToJson),
    ("xml_to_csv", ComponentKind::XmlToCsv),
    ("csv_to_xml", ComponentKind::CsvToXml),
    ("process_call", ComponentKind::ProcessCall),
    ("call_activity", ComponentKind::ProcessCall),
    ("edi_extractor", ComponentKind::EdiExtractor),
    ("edi_validator", ComponentKind::EdiValidator),
];

fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' | '.' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

impl ComponentKind {
    /// Look up the upstream `type` string. Unknown strings are an error, never a default.
    pub fn parse(raw: &str, component_id: &str) -> Result<Self> {
        Self::lookup(raw).ok_or_else(|| IflowError::UnsupportedComponentKind {
            kind: raw.to_string(),
            component_id: component_id.to_string(),
            location: IflowErrorLocation::at_path(format!("components.{component_id}.type")),
        })
    }

    pub fn lookup(raw: &str) -> Option<Self> {
        let key = normalize(raw);
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, kind)| *kind)
    }

    pub fn role(self) -> NodeRole {
        match self {
            ComponentKind::RequestReply | ComponentKind::Adapter(_) => NodeRole::ExternalCall,
            ComponentKind::Router
            | ComponentKind::Multicast
            | ComponentKind::SequentialMulticast
            | ComponentKind::Join => NodeRole::Gateway,
            ComponentKind::TimerStart => NodeRole::StartEvent,
            ComponentKind::HttpsSender => NodeRole::SenderChannel,
            ComponentKind::ExceptionSubprocess => NodeRole::Container,
            _ => NodeRole::Step,
        }
    }

    pub fn is_external_call(self) -> bool {
        self.role() == NodeRole::ExternalCall
    }

    /// Canonical spelling, used in diagnostics.
    pub fn canonical_name(self) -> &'static str {
        ALIASES
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(alias, _)| *alias)
            .unwrap_or("unknown")
    }
}

impl serde::Serialize for ComponentKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.canonical_name())
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}
