use std::io::{Cursor, Read};

use iflow_forge::{GeneratorConfig, generate_iflw, generate_package};
use pretty_assertions::assert_eq;

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).unwrap()
}

fn read_entry(bytes: &[u8], path: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(path).unwrap();
    let mut out = String::new();
    file.read_to_string(&mut out).unwrap();
    out
}

/// Value of the first `<ifl:property>` with the given key.
fn property<'a>(xml: &'a str, key: &str) -> &'a str {
    let at = xml.find(&format!("<key>{key}</key>")).unwrap();
    let rest = &xml[at..];
    let open = rest.find("<value>").unwrap() + "<value>".len();
    let close = rest.find("</value>").unwrap();
    &rest[open..close]
}

#[test]
fn every_fixture_renders_well_formed_xml() {
    for name in [
        "scenario_odata.json",
        "duplicate_ids.json",
        "sftp_hint.json",
        "exclusive_branching.json",
        "parallel_branching.json",
        "error_handling.json",
        "multi_adapter.json",
        "transformations.json",
    ] {
        let iflw = generate_iflw(&fixture(name), &GeneratorConfig::default())
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        let doc = roxmltree::Document::parse(&iflw).unwrap_or_else(|e| panic!("{name}: {e}"));

        let mut ids = std::collections::HashSet::new();
        for node in doc.descendants().filter(|n| n.is_element()) {
            if let Some(id) = node.attribute("id") {
                assert!(ids.insert(id.to_string()), "{name}: duplicate id {id}");
            }
        }
        for node in doc.descendants().filter(|n| n.has_tag_name("BPMNShape") || n.has_tag_name("BPMNEdge")) {
            let target = node.attribute("bpmnElement").unwrap();
            assert!(ids.contains(target), "{name}: diagram refers to {target}");
        }
    }
}

#[test]
fn definitions_carry_collaboration_and_process() {
    let iflw = generate_iflw(&fixture("scenario_odata.json"), &GeneratorConfig::default()).unwrap();
    let doc = roxmltree::Document::parse(&iflw).unwrap();
    let root = doc.root_element();
    assert_eq!(root.tag_name().name(), "definitions");
    assert_eq!(root.attribute("id"), Some("Definitions_1"));

    let process = root
        .children()
        .find(|n| n.has_tag_name("process"))
        .unwrap();
    assert_eq!(process.attribute("id"), Some("Process_1"));
    assert_eq!(process.attribute("name"), Some("Create Opportunity"));
    let participants = root
        .descendants()
        .filter(|n| n.has_tag_name("participant"))
        .count();
    assert_eq!(participants, 3);
    let message_flows = root
        .descendants()
        .filter(|n| n.has_tag_name("messageFlow"))
        .count();
    assert_eq!(message_flows, 2);
    assert!(iflw.contains("Creates Salesforce opportunities from inbound orders"));
}

#[test]
fn config_reaches_iflw_and_manifest() {
    let config = GeneratorConfig::load_from_file("tests/fixtures/gen_config.json").unwrap();
    let package = generate_package(&fixture("multi_adapter.json"), &config).unwrap();
    assert_eq!(property(&package.iflw, "ServerTrace"), "true");
    assert_eq!(property(&package.iflw, "transactionTimeout"), "60");
    assert_eq!(property(&package.iflw, "log"), "Info");

    let manifest = read_entry(&package.zip_bytes, "META-INF/MANIFEST.MF");
    assert!(manifest.contains("Bundle-SymbolicName: Everything_Everywhere; singleton:=true"));
    assert!(manifest.contains("Bundle-Version: 2.3.0"));
}

#[test]
fn archive_has_the_importable_layout() {
    let package =
        generate_package(&fixture("multi_adapter.json"), &GeneratorConfig::default()).unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(&package.zip_bytes)).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(
        names,
        [
            ".project",
            "META-INF/MANIFEST.MF",
            "metainfo.prop",
            "src/main/resources/edmx/accounts.edmx",
            "src/main/resources/parameters.prop",
            "src/main/resources/parameters.propdef",
            "src/main/resources/scenarioflows/integrationflow/Everything_Everywhere.iflw",
        ]
    );

    let iflw = read_entry(&package.zip_bytes, &package.entry_path());
    assert_eq!(iflw, package.iflw);
    let params = read_entry(&package.zip_bytes, "src/main/resources/parameters.prop");
    assert!(params.contains("SF_HOST=api4.successfactors.com\n"));
    assert!(params.contains("RETRIES=3\n"));
    let project = read_entry(&package.zip_bytes, ".project");
    assert!(project.contains("<name>Everything_Everywhere</name>"));
}

#[test]
fn scripts_and_entity_metadata_ship_with_the_flow() {
    let package =
        generate_package(&fixture("transformations.json"), &GeneratorConfig::default()).unwrap();
    assert_eq!(
        package.resources,
        [
            "src/main/resources/script/map_order.groovy",
            "src/main/resources/script/enrich.groovy",
            "src/main/resources/script/cleanup.groovy",
            "src/main/resources/edmx/salesorders.edmx",
        ]
    );

    let mapped = read_entry(&package.zip_bytes, "src/main/resources/script/map_order.groovy");
    assert!(mapped.contains("message.setHeader(\"mapped\", \"true\")"));
    let skeleton = read_entry(&package.zip_bytes, "src/main/resources/script/enrich.groovy");
    assert!(skeleton.starts_with("import com.sap.gateway.ip.core.customdev.util.Message"));
    assert!(skeleton.contains("def Message processData(Message message)"));
    let unreferenced = read_entry(&package.zip_bytes, "src/main/resources/script/cleanup.groovy");
    assert!(unreferenced.contains("removeHeader"));

    let edmx = read_entry(&package.zip_bytes, "src/main/resources/edmx/salesorders.edmx");
    let doc = roxmltree::Document::parse(&edmx).unwrap();
    let set = doc
        .descendants()
        .find(|n| n.has_tag_name("EntitySet"))
        .unwrap();
    assert_eq!(set.attribute("Name"), Some("SalesOrders"));
    assert_eq!(set.attribute("EntityType"), Some("Order_Intake.SalesOrder"));
    let key = doc
        .descendants()
        .find(|n| n.has_tag_name("PropertyRef"))
        .unwrap();
    assert_eq!(key.attribute("Name"), Some("ID"));

    let archive = zip::ZipArchive::new(Cursor::new(&package.zip_bytes)).unwrap();
    assert!(!archive.file_names().any(|n| n.contains("xslt")));
}

#[test]
fn package_bytes_are_deterministic() {
    let config = GeneratorConfig::default();
    let a = generate_package(&fixture("error_handling.json"), &config).unwrap();
    let b = generate_package(&fixture("error_handling.json"), &config).unwrap();
    assert_eq!(a.blake3, b.blake3);
    assert_eq!(a.zip_bytes, b.zip_bytes);
    assert_eq!(a.diagnostics.len(), b.diagnostics.len());
}

#[test]
fn failed_assembly_produces_nothing() {
    let err = generate_package(&fixture("dangling_reference.json"), &GeneratorConfig::default())
        .unwrap_err();
    assert_eq!(err.code(), "DANGLING_REFERENCE");
}
