use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Where in the input (or the generated artifact) an error was detected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IflowErrorLocation {
    pub path: Option<String>,
    pub source_path: Option<PathBuf>,
    pub json_pointer: Option<String>,
}

impl IflowErrorLocation {
    pub fn at_path(path: impl Into<String>) -> Self {
        IflowErrorLocation {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn at_pointer(pointer: impl Into<String>) -> Self {
        IflowErrorLocation {
            json_pointer: Some(pointer.into()),
            ..Default::default()
        }
    }

    pub fn with_source_path(mut self, source_path: Option<&Path>) -> Self {
        self.source_path = source_path.map(Path::to_path_buf);
        self
    }
}

impl fmt::Display for IflowErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(source) = &self.source_path {
            parts.push(source.display().to_string());
        }
        if let Some(path) = &self.path {
            parts.push(path.clone());
        }
        if let Some(pointer) = &self.json_pointer {
            parts.push(pointer.clone());
        }
        if parts.is_empty() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

#[derive(Debug, Error)]
pub enum IflowError {
    #[error("JSON parse error at {location}: {message}")]
    Json {
        message: String,
        location: IflowErrorLocation,
    },
    #[error("Invalid document shape at {location}: {message}")]
    Shape {
        message: String,
        location: IflowErrorLocation,
    },
    #[error("Unsupported component kind '{kind}' for component '{component_id}'")]
    UnsupportedComponentKind {
        kind: String,
        component_id: String,
        location: IflowErrorLocation,
    },
    #[error("Component at {location} is missing its {field}")]
    MissingIdentity {
        field: &'static str,
        location: IflowErrorLocation,
    },
    #[error("Dangling reference '{reference}' in {referenced_from}: no such component")]
    DanglingReference {
        reference: String,
        referenced_from: String,
        location: IflowErrorLocation,
    },
    #[error("Malformed component '{component_id}': {message}")]
    MalformedComponentShape {
        component_id: String,
        message: String,
        location: IflowErrorLocation,
    },
    #[error("Flow graph integrity violated: {message}")]
    Graph {
        message: String,
        location: IflowErrorLocation,
    },
    #[error("Template error in '{template}': {message}")]
    Template {
        template: String,
        message: String,
        location: IflowErrorLocation,
    },
    #[error("Package error: {message}")]
    Package {
        message: String,
        location: IflowErrorLocation,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        location: IflowErrorLocation,
    },
}

impl IflowError {
    pub fn location(&self) -> &IflowErrorLocation {
        match self {
            IflowError::Json { location, .. }
            | IflowError::Shape { location, .. }
            | IflowError::UnsupportedComponentKind { location, .. }
            | IflowError::MissingIdentity { location, .. }
            | IflowError::DanglingReference { location, .. }
            | IflowError::MalformedComponentShape { location, .. }
            | IflowError::Graph { location, .. }
            | IflowError::Template { location, .. }
            | IflowError::Package { location, .. }
            | IflowError::Internal { location, .. } => location,
        }
    }

    /// Stable machine-readable code, used by the JSON reports.
    pub fn code(&self) -> &'static str {
        match self {
            IflowError::Json { .. } => "JSON_PARSE",
            IflowError::Shape { .. } => "DOCUMENT_SHAPE",
            IflowError::UnsupportedComponentKind { .. } => "UNSUPPORTED_COMPONENT_KIND",
            IflowError::MissingIdentity { .. } => "MISSING_IDENTITY",
            IflowError::DanglingReference { .. } => "DANGLING_REFERENCE",
            IflowError::MalformedComponentShape { .. } => "MALFORMED_COMPONENT_SHAPE",
            IflowError::Graph { .. } => "GRAPH_INTEGRITY",
            IflowError::Template { .. } => "TEMPLATE",
            IflowError::Package { .. } => "PACKAGE",
            IflowError::Internal { .. } => "INTERNAL",
        }
    }
}

pub type Result<T> = std::result::Result<T, IflowError>;
