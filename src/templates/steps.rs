//! Plain process steps: one incoming flow, one outgoing flow, a property table.

use serde_json::Value;

use crate::{
    error::{IflowError, IflowErrorLocation, Result},
    kind::ComponentKind,
    layout::NodeCategory,
    template::TemplateRenderer,
    util::xml_escape,
};

use super::{ComponentInput, Fragment, PropertyList, StepWiring, render_step, variant_for};

pub fn build(
    renderer: &TemplateRenderer,
    kind: ComponentKind,
    input: &ComponentInput<'_>,
) -> Result<Fragment> {
    let variant = variant_for(kind)?;
    let properties = step_properties(kind, input)?.variant(variant).into_vec();
    let definition = render_step(
        renderer,
        variant,
        input.id,
        input.name,
        properties,
        StepWiring::through(),
    )?;
    Ok(Fragment {
        id: input.id.to_string(),
        kind,
        category: NodeCategory::Activity,
        definition: Some(definition),
        participant: None,
        message_flow: None,
    })
}

fn step_properties(kind: ComponentKind, input: &ComponentInput<'_>) -> Result<PropertyList> {
    let props = PropertyList::new();
    let props = match kind {
        ComponentKind::ContentModifier => props
            .set("bodyType", input.cfg_or(&["body_type", "bodyType"], "constant"))
            .set("headerTable", modifier_table(input, &["headers", "header_table"]))
            .set(
                "propertyTable",
                modifier_table(input, &["properties", "property_table"]),
            )
            .set("wrapContent", input.cfg_or(&["body", "content", "wrap_content"], "")),
        ComponentKind::OperationMapping => props
            .set("mappinguri", input.cfg_or(&["mapping_uri", "mappinguri"], ""))
            .set("mappingname", mapping_name(input))
            .set("mappingType", "OperationMapping"),
        ComponentKind::XsltMapping => props
            .set(
                "mappingoutputformat",
                input.cfg_or(&["output_format", "mappingoutputformat"], "Bytes"),
            )
            .set(
                "mappingpath",
                input.cfg_or(&["mapping_path", "xslt_file", "mappingpath"], ""),
            )
            .set("mappingSource", "mappingSrcIflow")
            .set("subActivityType", "XSLTMapping"),
        ComponentKind::MessageMapping => props
            .set("mappinguri", input.cfg_or(&["mapping_uri", "mappinguri"], ""))
            .set("mappingname", mapping_name(input))
            .set("mappingType", "MessageMapping")
            .set("mappingReference", "static"),
        ComponentKind::XmlValidator => props
            .set("xmlSchemaSource", "iflowOption")
            .set(
                "preventException",
                input.cfg_bool(&["prevent_exception", "preventException"], false),
            )
            .set("xsd", input.cfg_or(&["xsd", "schema", "schema_file"], "")),
        ComponentKind::Filter => props
            .set("xpathType", input.cfg_or(&["xpath_type", "value_type"], "Nodelist"))
            .set(
                "wrapContent",
                input.cfg_or(&["xpath", "xpath_expression", "expression"], ""),
            ),
        ComponentKind::GroovyScript => {
            let script = script_file(input);
            props
                .set(
                    "scriptFunction",
                    input.cfg_or(&["function", "script_function"], "processData"),
                )
                .set("scriptBundleId", "")
                .set("subActivityType", "GroovyScript")
                .set("script", script)
        }
        ComponentKind::XmlModifier => props
            .set("removeExternalDTDs", input.cfg_or(&["remove_external_dtds"], "0"))
            .set(
                "removeXmlDeclaration",
                input.cfg_or(&["remove_xml_declaration"], "0"),
            )
            .set(
                "xmlCharacterHandling",
                input.cfg_or(&["xml_character_handling"], "none"),
            ),
        ComponentKind::WriteVariables => props
            .set("visibility", input.cfg_or(&["visibility", "scope"], "local"))
            .set("encrypt", input.cfg_bool(&["encrypt"], true))
            .set("expire", input.cfg_or(&["expire", "expiration_days"], "90"))
            .set("variable", variable_table(input)),
        ComponentKind::EdiSplitter => props
            .set("edifactSourceEncoding", "UTF-8")
            .set("x12SourceEncoding", "UTF-8")
            .set("edifactTransactionMode", "interchange")
            .set("x12TransactionMode", "interchange")
            .set("parallelProcessing", input.cfg_bool(&["parallel_processing"], false))
            .set("splitType", input.cfg_or(&["split_type"], "EDISplitter"))
            .set("timeOut", input.cfg_or(&["timeout", "time_out"], "300")),
        ComponentKind::IdocSplitter => props.set("splitType", "IDoc"),
        ComponentKind::GeneralSplitter => props
            .set("exprType", input.cfg_or(&["expression_type", "expr_type"], "XPath"))
            .set("Streaming", input.cfg_bool(&["streaming"], true))
            .set("StopOnExecution", input.cfg_bool(&["stop_on_exception"], true))
            .set("SplitterThreads", input.cfg_or(&["threads", "splitter_threads"], "10"))
            .set(
                "splitExprValue",
                input.cfg_or(&["xpath", "split_expression", "expression"], ""),
            )
            .set("ParallelProcessing", input.cfg_bool(&["parallel_processing"], false))
            .set("grouping", input.cfg_or(&["grouping"], ""))
            .set("splitType", "GeneralSplitter")
            .set("timeOut", input.cfg_or(&["timeout", "time_out"], "300")),
        ComponentKind::DataStoreSelect => props
            .set("visibility", input.cfg_or(&["visibility"], "local"))
            .set("maxresults", input.cfg_or(&["max_results", "maxresults"], "1"))
            .set("operation", "select")
            .set("delete", input.cfg_bool(&["delete"], false))
            .set("storageName", data_store_name(input)),
        ComponentKind::DataStoreWrite => props
            .set("visibility", input.cfg_or(&["visibility"], "local"))
            .set("alert", input.cfg_or(&["alert", "alert_days"], "2"))
            .set("encrypt", input.cfg_bool(&["encrypt"], true))
            .set("expire", input.cfg_or(&["expire", "expiration_days"], "30"))
            .set("messageId", input.cfg_or(&["entry_id", "message_id"], ""))
            .set("override", input.cfg_bool(&["override", "overwrite"], false))
            .set("operation", "put")
            .set("storageName", data_store_name(input))
            .set(
                "includeMessageHeaders",
                input.cfg_bool(&["include_message_headers"], false),
            ),
        ComponentKind::DataStoreGet => props
            .set("visibility", input.cfg_or(&["visibility"], "local"))
            .set("dataStoreId", input.cfg_or(&["entry_id", "data_store_id"], ""))
            .set("operation", "get")
            .set("delete", input.cfg_bool(&["delete"], false))
            .set(
                "stopOnMissingEntry",
                input.cfg_bool(&["stop_on_missing_entry"], true),
            )
            .set("storageName", data_store_name(input)),
        ComponentKind::Persist => props
            .set("stepid", input.cfg_or(&["step_id", "stepid"], input.id))
            .set("enableEncrypt", input.cfg_bool(&["encrypt"], true)),
        ComponentKind::IdMapping => props
            .set("visibility", input.cfg_or(&["visibility"], "local"))
            .set(
                "sourceMessageID",
                input.cfg_or(&["source_message_id", "source_id"], ""),
            )
            .set("expire", input.cfg_or(&["expire", "expiration_days"], "30"))
            .set("context", input.cfg_or(&["context"], ""))
            .set("targetHeader", input.cfg_or(&["target_header"], "")),
        ComponentKind::XmlToCsv => props
            .set(
                "Field_Separator_in_CSV",
                input.cfg_or(&["field_separator", "separator"], ","),
            )
            .set("CSV_Header", input.cfg_or(&["csv_header", "header"], "none"))
            .set("XPath_Field_Location", input.cfg_or(&["xpath"], ""))
            .set(
                "Include_Parent_Element",
                input.cfg_bool(&["include_parent_element"], false),
            )
            .set(
                "Include_Attribute_Values",
                input.cfg_bool(&["include_attribute_values"], false),
            ),
        ComponentKind::CsvToXml => props
            .set(
                "Field_Separator_in_CSV",
                input.cfg_or(&["field_separator", "separator"], ","),
            )
            .set(
                "ignoreFirstLineAsHeader",
                input.cfg_bool(&["ignore_first_line", "has_header"], false),
            )
            .set("headerMapping", "mapHeadersToXSD")
            .set("XML_Schema_File_Path", input.cfg_or(&["xsd", "schema"], ""))
            .set("Path_to_Target_Element_in_XSD", input.cfg_or(&["record_path"], ""))
            .set("Record_Marker_in_CSV", input.cfg_or(&["record_marker"], "")),
        ComponentKind::XmlToJson => props
            .set(
                "xmlJsonUseStreaming",
                input.cfg_bool(&["streaming", "use_streaming"], false),
            )
            .set(
                "jsonOutputEncoding",
                input.cfg_or(&["output_encoding"], "from xml"),
            )
            .set(
                "xmlJsonSuppressRootElement",
                input.cfg_bool(&["suppress_root_element"], false),
            ),
        ComponentKind::JsonToXml => props.set(
            "additionalRootElementName",
            input.cfg_or(&["root_element", "root_element_name"], "root"),
        ),
        ComponentKind::Base64Encoder => props.set("encoderType", "Base64 Encode"),
        ComponentKind::Base64Decoder => props.set("encoderType", "Base64 Decode"),
        ComponentKind::ProcessCall => props
            .set(
                "processId",
                input.cfg_or(&["process_id", "process", "local_process"], ""),
            )
            .set("subActivityType", "NonLoopingProcess"),
        ComponentKind::Aggregator => props
            .set(
                "aggregationAlgorithm",
                input.cfg_or(&["aggregation_algorithm", "algorithm"], "Combine"),
            )
            .set(
                "completionTimeout",
                input.cfg_or(&["completion_timeout", "timeout"], "60"),
            )
            .set(
                "correlationExpression",
                input.cfg_or(&["correlation_expression", "correlation"], ""),
            )
            .set("correlationExpressionType", "XPath")
            .set(
                "completionCondition",
                input.cfg_or(&["completion_condition"], ""),
            )
            .set("completionConditionType", "XPath")
            .set(
                "lastMessageExpression",
                input.cfg_or(&["last_message_expression"], ""),
            )
            .set("lastMessageExpressionType", "XPath")
            .set("dataStoreName", data_store_name(input))
            .set(
                "includeExceptionInResponse",
                input.cfg_bool(&["include_exception_in_response"], false),
            ),
        ComponentKind::Gather => props
            .set(
                "correlationExpression",
                input.cfg_or(&["correlation_expression", "correlation"], ""),
            )
            .set("messageType", input.cfg_or(&["message_type"], "XML"))
            .set(
                "gatherStrategy",
                input.cfg_or(&["strategy", "gather_strategy"], "Concatenate"),
            ),
        ComponentKind::EdiExtractor => props
            .set("extractType", "EDI")
            .set("sourceEncoding", "UTF-8")
            .set("preventException", input.cfg_bool(&["prevent_exception"], false)),
        ComponentKind::EdiValidator => props
            .set("validateType", "EDI")
            .set("sourceEncoding", "UTF-8")
            .set("preventException", input.cfg_bool(&["prevent_exception"], false)),
        ComponentKind::WriteToLog => props
            .set("logLevel", input.cfg_or(&["log_level", "level"], "Info"))
            .set("logMessage", input.cfg_or(&["message", "log_message"], "")),
        other => {
            return Err(IflowError::Internal {
                message: format!("'{other}' is not a plain step"),
                location: IflowErrorLocation::at_path(format!("components.{}", input.id)),
            });
        }
    };
    Ok(props)
}

/// Script a Groovy step runs; the package ships a file of this name under `script/`.
pub fn script_file(input: &ComponentInput<'_>) -> String {
    input.cfg_or(&["script", "script_file", "script_name"], "script1.groovy")
}

fn mapping_name(input: &ComponentInput<'_>) -> String {
    input
        .cfg(&["mapping_name", "mappingname"])
        .unwrap_or_else(|| input.name.to_string())
}

fn data_store_name(input: &ComponentInput<'_>) -> String {
    input.cfg_or(&["data_store_name", "storage_name", "data_store"], "DataStore")
}

/// Content-modifier table rows. Accepts `{"name": "value"}` maps and
/// `[{"name": .., "value": .., "type": ..}]` arrays.
fn modifier_table(input: &ComponentInput<'_>, keys: &[&str]) -> String {
    let Some(raw) = keys.iter().find_map(|key| input.config.get(*key)) else {
        return String::new();
    };
    let mut rows = String::new();
    for (name, value, value_type) in table_entries(raw) {
        let value_type = value_type.unwrap_or_else(|| {
            if value.starts_with("${") {
                "expression".to_string()
            } else {
                "constant".to_string()
            }
        });
        rows.push_str(&format!(
            "<row><cell id=\"Action\">Create</cell><cell id=\"Type\">{}</cell><cell id=\"Value\">{}</cell><cell id=\"Default\"></cell><cell id=\"Name\">{}</cell><cell id=\"Datatype\"></cell></row>",
            xml_escape(&value_type),
            xml_escape(&value),
            xml_escape(&name),
        ));
    }
    rows
}

fn variable_table(input: &ComponentInput<'_>) -> String {
    let Some(raw) = input.config.get("variables") else {
        return String::new();
    };
    table_entries(raw)
        .into_iter()
        .map(|(name, value, value_type)| {
            format!(
                "<row><cell id=\"Type\">{}</cell><cell id=\"Value\">{}</cell><cell id=\"Name\">{}</cell></row>",
                xml_escape(value_type.as_deref().unwrap_or("expression")),
                xml_escape(&value),
                xml_escape(&name),
            )
        })
        .collect()
}

fn table_entries(raw: &Value) -> Vec<(String, String, Option<String>)> {
    match raw {
        Value::Object(map) => map
            .iter()
            .map(|(name, value)| (name.clone(), scalar_text(value), None))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                let name = obj.get("name").and_then(Value::as_str)?.to_string();
                let value = obj.get("value").map(scalar_text).unwrap_or_default();
                let value_type = obj
                    .get("type")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Some((name, value, value_type))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
