use serde::Serialize;

pub const MALFORMED_COMPONENT_SHAPE: &str = "MALFORMED_COMPONENT_SHAPE";
pub const ORPHAN_COMPONENT: &str = "ORPHAN_COMPONENT";
pub const HTTP_FALLBACK: &str = "HTTP_FALLBACK";
pub const ADAPTER_REPAIRED: &str = "ADAPTER_REPAIRED";
pub const DUPLICATE_COMPONENT_ID: &str = "DUPLICATE_COMPONENT_ID";

/// Non-fatal finding reported alongside a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub message: String,
    pub location: Option<String>,
}

impl Diagnostic {
    pub fn new(code: &'static str, message: impl Into<String>, location: Option<String>) -> Self {
        Diagnostic {
            code,
            message: message.into(),
            location,
        }
    }

    /// True for findings that describe something left broken, not something fixed.
    pub fn is_problem(&self) -> bool {
        !matches!(self.code, ADAPTER_REPAIRED | DUPLICATE_COMPONENT_ID)
    }
}
