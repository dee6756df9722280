//! `.iflw` rendering and the importable ZIP bundle around it.

use std::io::{Cursor, Write};

use blake3::Hasher;
use serde::Serialize;
use zip::{CompressionMethod, DateTime, ZipWriter, write::SimpleFileOptions};

use crate::{
    assemble::AssembledFlow,
    config::GeneratorConfig,
    constants::{
        COLLABORATION_ID, DEFINITIONS_ID, IFLOW_CONFIGURATION_URI, IFLOW_CONFIGURATION_VERSION,
        INTEGRATION_PROCESS_URI, INTEGRATION_PROCESS_VERSION, NS_BPMN2, NS_BPMNDI, NS_DC, NS_DI,
        NS_IFL, NS_XSI, PROCESS_ID,
    },
    diagnostic::Diagnostic,
    error::{IflowError, IflowErrorLocation, Result},
    model::Parameter,
    path_safety::{bundle_name, resource_file_name},
    template::{
        DEFINITIONS, DefinitionsView, EDMX, EdmxProperty, EdmxView, GROOVY_SKELETON,
        GroovySkeletonView, Namespaces, Property, PropertyBlock, TemplateRenderer,
    },
    util::xml_escape,
};

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
const PROJECT_PATH: &str = ".project";
const METAINFO_PATH: &str = "metainfo.prop";
const PARAMETERS_PATH: &str = "src/main/resources/parameters.prop";
const PROPDEF_PATH: &str = "src/main/resources/parameters.propdef";
const IFLOW_DIR: &str = "src/main/resources/scenarioflows/integrationflow";
const SCRIPT_DIR: &str = "src/main/resources/script";
const EDMX_DIR: &str = "src/main/resources/edmx";

const IMPORT_PACKAGE: &str = "com.sap.esb.application.services.cxf.interceptor,com.sap.esb.security,\
com.sap.it.op.agent.api,com.sap.it.op.agent.collector.camel,com.sap.it.op.agent.collector.cxf,\
com.sap.it.op.agent.mpl,javax.jms,javax.jws,javax.wsdl,javax.xml.bind.annotation,\
javax.xml.namespace,javax.xml.ws,org.apache.camel;version=\"2.8\",org.apache.camel.builder;version=\"2.8\",\
org.apache.camel.builder.xml;version=\"2.8\",org.apache.camel.component.cxf,org.apache.camel.model;version=\"2.8\",\
org.apache.camel.processor;version=\"2.8\",org.apache.camel.processor.aggregate;version=\"2.8\",\
org.apache.camel.spring.spi;version=\"2.8\",org.apache.commons.logging,org.apache.cxf.binding,\
org.apache.cxf.binding.soap,org.apache.cxf.binding.soap.spring,org.apache.cxf.bus,\
org.apache.cxf.bus.resource,org.apache.cxf.bus.spring,org.apache.cxf.buslifecycle,\
org.apache.cxf.catalog,org.apache.cxf.configuration.jsse;version=\"2.5\",\
org.apache.cxf.configuration.spring,org.apache.cxf.endpoint,org.apache.cxf.headers,\
org.apache.cxf.interceptor,org.apache.cxf.management.counters;version=\"2.5\",org.apache.cxf.message,\
org.apache.cxf.phase,org.apache.cxf.resource,org.apache.cxf.service.factory,\
org.apache.cxf.service.model,org.apache.cxf.transport,org.apache.cxf.transport.common.gzip,\
org.apache.cxf.transport.http,org.apache.cxf.transport.http.policy,org.apache.cxf.workqueue,\
org.apache.cxf.ws.rm.persistence,org.apache.cxf.wsdl11,org.osgi.framework;version=\"1.6.0\",\
org.slf4j;version=\"1.6\",org.springframework.beans.factory.config;version=\"3.0\",\
com.sap.esb.camel.security.cms,org.apache.camel.spi,com.sap.esb.webservice.audit.log,\
com.sap.esb.camel.endpoint.configurator.api,com.sap.esb.camel.jdbc.idempotency.reorg,javax.sql,\
org.apache.camel.processor.idempotent.jdbc,org.osgi.service.blueprint;version=\"[1.0.0,2.0.0)\"";

/// A finished package: the `.iflw` text, the archive bytes and their digest.
#[derive(Debug, Clone, Serialize)]
pub struct IflowPackage {
    pub name: String,
    pub iflw: String,
    #[serde(skip)]
    pub zip_bytes: Vec<u8>,
    pub blake3: String,
    /// Archive paths of the bundled scripts and metadata files.
    pub resources: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A file shipped next to the `.iflw`, addressed by its archive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub path: String,
    pub content: String,
}

impl IflowPackage {
    pub fn entry_path(&self) -> String {
        format!("{IFLOW_DIR}/{}.iflw", self.name)
    }
}

/// Compute a lowercase hex-encoded BLAKE3 hash for the provided bytes.
pub fn blake3_hex(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes.as_ref());
    hasher.finalize().to_hex().to_string()
}

/// Render the complete `.iflw` document for an assembled flow.
pub fn render_definitions(
    renderer: &TemplateRenderer,
    flow: &AssembledFlow,
    config: &GeneratorConfig,
) -> Result<String> {
    let collab = &config.collaboration;
    let collaboration = vec![
        Property::new("namespaceMapping", collab.namespace_mapping.as_str()),
        Property::new("httpSessionHandling", collab.http_session_handling.as_str()),
        Property::new("returnExceptionToSender", collab.return_exception_to_sender.to_string()),
        Property::new("log", collab.log_level.as_str()),
        Property::new("ServerTrace", collab.server_trace.to_string()),
        Property::new("allowedHeaderList", collab.allowed_header_list.as_str()),
        Property::new("componentVersion", IFLOW_CONFIGURATION_VERSION),
        Property::new("cmdVariantUri", IFLOW_CONFIGURATION_URI),
    ];
    let process = vec![
        Property::new("transactionTimeout", config.transaction.timeout.to_string()),
        Property::new("componentVersion", INTEGRATION_PROCESS_VERSION),
        Property::new("cmdVariantUri", INTEGRATION_PROCESS_URI),
        Property::new("transactionalHandling", config.transaction.handling.as_str()),
    ];
    let view = DefinitionsView {
        ns: Namespaces {
            bpmn2: NS_BPMN2,
            bpmndi: NS_BPMNDI,
            dc: NS_DC,
            di: NS_DI,
            ifl: NS_IFL,
            xsi: NS_XSI,
        },
        definitions_id: DEFINITIONS_ID.to_string(),
        collaboration_id: COLLABORATION_ID.to_string(),
        description: flow.description.clone(),
        collaboration: PropertyBlock {
            properties: collaboration,
        },
        participants: flow.participants.iter().map(|p| p.xml.clone()).collect(),
        message_flows: flow.message_flows.iter().map(|m| m.xml.clone()).collect(),
        process_id: PROCESS_ID.to_string(),
        process_name: flow.process_name.clone(),
        process: PropertyBlock {
            properties: process,
        },
        process_elements: flow.process_elements(),
        shapes: flow.shapes.clone(),
        edges: flow.edges.clone(),
    };
    renderer.render(DEFINITIONS, &view)
}

/// Scripts and OData metadata the flow needs at runtime. Scripts without a supplied body get a
/// pass-through skeleton so the package still deploys.
pub fn bundle_resources(renderer: &TemplateRenderer, flow: &AssembledFlow) -> Result<Vec<Resource>> {
    let mut resources: Vec<Resource> = Vec::new();
    for script in &flow.scripts {
        let file = resource_file_name(&script.file, "groovy")?;
        let path = format!("{SCRIPT_DIR}/{file}");
        if resources.iter().any(|r| r.path == path) {
            tracing::warn!(script = %script.file, %path, "script collides with an earlier one; skipped");
            continue;
        }
        let content = match &script.body {
            Some(body) => body.clone(),
            None => renderer.render(GROOVY_SKELETON, &GroovySkeletonView { file: file.clone() })?,
        };
        resources.push(Resource { path, content });
    }
    let namespace = bundle_name(&flow.process_name)?.replace(['.', '-'], "_");
    for set in &flow.entity_sets {
        let path = format!("{EDMX_DIR}/{}", resource_file_name(&set.to_lowercase(), "edmx")?);
        if resources.iter().any(|r| r.path == path) {
            continue;
        }
        let entity_type = match set.strip_suffix('s') {
            Some(single) if !single.is_empty() => single.to_string(),
            _ => set.clone(),
        };
        let view = EdmxView {
            namespace: namespace.clone(),
            entity_type,
            entity_set: set.clone(),
            key: "ID",
            properties: vec![
                EdmxProperty { name: "ID", edm_type: "Edm.String", nullable: false },
                EdmxProperty { name: "Name", edm_type: "Edm.String", nullable: false },
                EdmxProperty { name: "Description", edm_type: "Edm.String", nullable: true },
            ],
        };
        resources.push(Resource {
            path,
            content: renderer.render(EDMX, &view)?,
        });
    }
    Ok(resources)
}

/// Writes the fixed bundle layout. Entries carry a fixed timestamp so equal input gives equal bytes.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    bundle_version: String,
}

impl PackageBuilder {
    pub fn new(config: &GeneratorConfig) -> Self {
        PackageBuilder {
            bundle_version: config.bundle_version.0.clone(),
        }
    }

    pub fn build(
        &self,
        name: &str,
        iflw: &str,
        parameters: &[Parameter],
        resources: &[Resource],
    ) -> Result<IflowPackage> {
        let name = bundle_name(name)?;
        let mut entries = vec![
            (MANIFEST_PATH.to_string(), self.manifest(&name)),
            (PROJECT_PATH.to_string(), project_file(&name)),
            (METAINFO_PATH.to_string(), format!("#Store metainfo properties\ndescription={}\n", escape_prop(&name, false))),
            (PARAMETERS_PATH.to_string(), parameters_prop(parameters)),
            (PROPDEF_PATH.to_string(), parameters_propdef(parameters)),
            (format!("{IFLOW_DIR}/{name}.iflw"), iflw.to_string()),
        ];
        for resource in resources {
            if entries.iter().any(|(path, _)| *path == resource.path) {
                return Err(package_error(&resource.path, "duplicate archive entry"));
            }
            entries.push((resource.path.clone(), resource.content.clone()));
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (path, body) in &entries {
            writer
                .start_file(path.as_str(), options)
                .map_err(|e| package_error(path, e))?;
            writer
                .write_all(body.as_bytes())
                .map_err(|e| package_error(path, e))?;
        }
        let zip_bytes = writer
            .finish()
            .map_err(|e| package_error(&name, e))?
            .into_inner();
        tracing::debug!(bundle = %name, bytes = zip_bytes.len(), "wrote package");

        Ok(IflowPackage {
            blake3: blake3_hex(&zip_bytes),
            name,
            iflw: iflw.to_string(),
            zip_bytes,
            resources: resources.iter().map(|r| r.path.clone()).collect(),
            diagnostics: Vec::new(),
        })
    }

    fn manifest(&self, name: &str) -> String {
        let mut out = String::new();
        for (key, value) in [
            ("Manifest-Version", "1.0".to_string()),
            ("Bundle-ManifestVersion", "2".to_string()),
            ("Bundle-Name", name.to_string()),
            ("Bundle-SymbolicName", format!("{name}; singleton:=true")),
            ("Bundle-Version", self.bundle_version.clone()),
            ("SAP-BundleType", "IntegrationFlow".to_string()),
            ("SAP-NodeType", "IFLMAP".to_string()),
            ("SAP-RuntimeProfile", "iflmap".to_string()),
            ("Import-Package", IMPORT_PACKAGE.to_string()),
            ("Origin-Bundle-Name", name.to_string()),
            ("Origin-Bundle-SymbolicName", name.to_string()),
        ] {
            out.push_str(&manifest_line(key, &value));
        }
        out
    }
}

/// Manifest lines wrap at 72 bytes with a single-space continuation.
fn manifest_line(key: &str, value: &str) -> String {
    let line = format!("{key}: {value}");
    let mut out = String::with_capacity(line.len() + line.len() / 70 * 3 + 2);
    let mut width = 0usize;
    let mut limit = 72usize;
    for ch in line.chars() {
        if width + ch.len_utf8() > limit {
            out.push_str("\r\n ");
            width = 0;
            limit = 71;
        }
        out.push(ch);
        width += ch.len_utf8();
    }
    out.push_str("\r\n");
    out
}

fn project_file(name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<projectDescription>
	<name>{}</name>
	<comment></comment>
	<projects>
	</projects>
	<buildSpec>
		<buildCommand>
			<name>org.eclipse.jdt.core.javabuilder</name>
			<arguments>
			</arguments>
		</buildCommand>
	</buildSpec>
	<natures>
		<nature>org.eclipse.jdt.core.javanature</nature>
		<nature>com.sap.ide.ifl.project.support.project.nature</nature>
		<nature>com.sap.ide.ifl.bsn</nature>
	</natures>
</projectDescription>
"#,
        xml_escape(name)
    )
}

fn parameters_prop(parameters: &[Parameter]) -> String {
    let mut out = String::from("#Store parameters\n");
    for param in parameters {
        let value = param
            .default_value
            .as_ref()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        out.push_str(&format!(
            "{}={}\n",
            escape_prop(&param.name, true),
            escape_prop(&value, false)
        ));
    }
    out
}

fn parameters_propdef(parameters: &[Parameter]) -> String {
    let mut out =
        String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?><parameters>"#);
    for param in parameters {
        let kind = match param.param_type.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("integer" | "int" | "number") => "xsd:integer",
            Some("boolean" | "bool") => "xsd:boolean",
            _ => "xsd:string",
        };
        out.push_str(&format!(
            "<parameter><name>{}</name><type>{kind}</type><isRequired>{}</isRequired><description>{}</description></parameter>",
            xml_escape(&param.name),
            param.default_value.is_none(),
            xml_escape(param.description.as_deref().unwrap_or_default()),
        ));
    }
    out.push_str("<param_references/></parameters>");
    out
}

/// Java properties escaping; keys additionally escape separators and spaces.
fn escape_prop(raw: &str, key: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' | ' ' | '#' | '!' if key => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

fn package_error(entry: &str, err: impl std::fmt::Display) -> IflowError {
    IflowError::Package {
        message: format!("{entry}: {err}"),
        location: IflowErrorLocation::at_path(entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn param(name: &str, ty: Option<&str>, default: Option<serde_json::Value>) -> Parameter {
        Parameter {
            name: name.to_string(),
            param_type: ty.map(str::to_string),
            default_value: default,
            description: None,
        }
    }

    #[test]
    fn manifest_lines_wrap_at_72_bytes() {
        let line = manifest_line("Import-Package", IMPORT_PACKAGE);
        for physical in line.split("\r\n").filter(|l| !l.is_empty()) {
            assert!(physical.len() <= 72, "{physical}");
        }
        let joined: String = line.split("\r\n ").collect::<Vec<_>>().concat();
        assert_eq!(joined.trim_end(), format!("Import-Package: {IMPORT_PACKAGE}"));
    }

    #[test]
    fn parameters_land_in_prop_and_propdef() {
        let params = [
            param("Base URL", None, Some(json!("https://api.example.com"))),
            param("retries", Some("integer"), Some(json!(3))),
            param("token", None, None),
        ];
        let prop = parameters_prop(&params);
        assert!(prop.contains("Base\\ URL=https://api.example.com\n"));
        assert!(prop.contains("retries=3\n"));
        let propdef = parameters_propdef(&params);
        assert!(propdef.contains("<name>retries</name><type>xsd:integer</type><isRequired>false</isRequired>"));
        assert!(propdef.contains("<name>token</name><type>xsd:string</type><isRequired>true</isRequired>"));
    }

    #[test]
    fn identical_input_gives_identical_archive() {
        let builder = PackageBuilder::new(&GeneratorConfig::default());
        let a = builder.build("Order Sync", "<x/>", &[], &[]).unwrap();
        let b = builder.build("Order Sync", "<x/>", &[], &[]).unwrap();
        assert_eq!(a.name, "Order_Sync");
        assert_eq!(a.blake3, b.blake3);
        assert_eq!(a.zip_bytes, b.zip_bytes);
        assert_eq!(
            a.entry_path(),
            "src/main/resources/scenarioflows/integrationflow/Order_Sync.iflw"
        );
    }

    #[test]
    fn resource_paths_must_not_collide() {
        let builder = PackageBuilder::new(&GeneratorConfig::default());
        let clash = Resource {
            path: PARAMETERS_PATH.to_string(),
            content: String::new(),
        };
        let err = builder.build("Order Sync", "<x/>", &[], &[clash]).unwrap_err();
        assert_eq!(err.code(), "PACKAGE");
    }
}
