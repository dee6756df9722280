//! Turns normalized integration descriptions into SAP Integration Suite iFlow packages.
//!
//! The pipeline is repair, assemble, render, package. Each call owns its id arena and layout,
//! so concurrent calls share nothing.
#![forbid(unsafe_code)]

pub mod assemble;
pub mod config;
pub mod constants;
pub mod diagnostic;
pub mod error;
pub mod json_output;
pub mod kind;
pub mod layout;
pub mod lint;
pub mod loader;
pub mod model;
pub mod package;
pub mod path_safety;
pub mod repair;
pub mod template;
pub mod templates;
pub mod util;

pub use assemble::{AssembledFlow, FlowAssembler};
pub use config::{GeneratorConfig, MalformedPolicy};
pub use error::{IflowError, Result};
pub use package::{IflowPackage, PackageBuilder};

use crate::{
    loader::load_integration_from_str,
    package::{bundle_resources, render_definitions},
};

/// Parse, repair and assemble a document without rendering the final XML.
pub fn generate_flow(json: &str, config: &GeneratorConfig) -> Result<AssembledFlow> {
    let doc = load_integration_from_str(json)?;
    FlowAssembler::new(config)?.assemble(&doc)
}

/// Render the `.iflw` text for a document.
pub fn generate_iflw(json: &str, config: &GeneratorConfig) -> Result<String> {
    let doc = load_integration_from_str(json)?;
    let assembler = FlowAssembler::new(config)?;
    let flow = assembler.assemble(&doc)?;
    render_definitions(assembler.renderer(), &flow, config)
}

/// Full pipeline: the importable ZIP plus the diagnostics collected on the way.
pub fn generate_package(json: &str, config: &GeneratorConfig) -> Result<IflowPackage> {
    let doc = load_integration_from_str(json)?;
    let assembler = FlowAssembler::new(config)?;
    let flow = assembler.assemble(&doc)?;
    let iflw = render_definitions(assembler.renderer(), &flow, config)?;
    let resources = bundle_resources(assembler.renderer(), &flow)?;
    let mut package =
        PackageBuilder::new(config).build(&doc.process_name, &iflw, &doc.parameters, &resources)?;
    package.diagnostics = flow.diagnostics;
    Ok(package)
}
