//! prego out: output formatters
//!
//! Turns each result item into one line of text. The format is picked once,
//! at startup, from a `name[=argument]` spec:
//!
//! | Spec | Formatter |
//! |---|---|
//! | `json` (or `raw`) | compact JSON of the whole item |
//! | `extract=<selector>` (or `regogo=`) | compact JSON of the selected sub-document |
//! | `template=<handlebars>` (or `gotemplate=`) | the rendered template |
//!
//! # Example
//!
//! ```
//! use prego_core::{OutputFormatter, OutputItem};
//! use prego_out::Formatter;
//! use serde_json::json;
//!
//! let formatter = Formatter::from_spec("template=x is {{res}}").unwrap();
//! let line = formatter.print(&OutputItem(json!({"res": 2}))).unwrap();
//! assert_eq!(line, "x is 2");
//! ```

pub mod extract;
pub mod renderer;

use extract::Selector;
use prego_core::{OutputFormatter, OutputItem, PregoError};
use renderer::TemplateRenderer;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building or running a formatter
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported output format: {0}")]
    Unsupported(String),
    #[error("output format `{0}` needs an argument (`{0}=...`)")]
    MissingArgument(String),
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error("invalid template `{template}`: {reason}")]
    Template { template: String, reason: String },
    #[error("Render failed: {0}")]
    Render(String),
}

impl From<FormatError> for PregoError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Render(message) => PregoError::Output(message),
            other => PregoError::Config(other.to_string()),
        }
    }
}

/// Parsed `--output` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSpec {
    Json,
    Extract(String),
    Template(String),
}

impl FromStr for OutputSpec {
    type Err = FormatError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (name, argument) = match spec.split_once('=') {
            Some((name, argument)) => (name, Some(argument)),
            None => (spec, None),
        };
        let required = || {
            argument
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .ok_or_else(|| FormatError::MissingArgument(name.to_string()))
        };

        match name {
            "json" | "raw" => Ok(Self::Json),
            "extract" | "regogo" => Ok(Self::Extract(required()?)),
            "template" | "gotemplate" => Ok(Self::Template(required()?)),
            _ => Err(FormatError::Unsupported(spec.to_string())),
        }
    }
}

/// Compact JSON of the whole item
#[derive(Debug, Clone, Copy, Default)]
pub struct RawFormatter;

impl OutputFormatter for RawFormatter {
    fn print(&self, item: &OutputItem) -> prego_core::Result<String> {
        serde_json::to_string(item.value()).map_err(|e| PregoError::Output(e.to_string()))
    }
}

/// Compact JSON of the sub-document picked by a selector
#[derive(Debug, Clone)]
pub struct ExtractionFormatter {
    selector: Selector,
}

impl ExtractionFormatter {
    pub fn new(selector: &str) -> Result<Self, FormatError> {
        Ok(Self {
            selector: selector.parse()?,
        })
    }
}

impl OutputFormatter for ExtractionFormatter {
    fn print(&self, item: &OutputItem) -> prego_core::Result<String> {
        let selected = self.selector.select(item.value());
        serde_json::to_string(&selected).map_err(|e| PregoError::Output(e.to_string()))
    }
}

/// Item rendered through a handlebars template
pub struct TemplateFormatter {
    renderer: TemplateRenderer,
}

impl TemplateFormatter {
    pub fn new(template: &str) -> Result<Self, FormatError> {
        Ok(Self {
            renderer: TemplateRenderer::new(template)?,
        })
    }
}

impl OutputFormatter for TemplateFormatter {
    fn print(&self, item: &OutputItem) -> prego_core::Result<String> {
        Ok(self.renderer.render(item.value())?)
    }
}

/// The closed set of formatters selectable from the command line
pub enum Formatter {
    Raw(RawFormatter),
    Extraction(ExtractionFormatter),
    Template(TemplateFormatter),
}

impl Formatter {
    pub fn new(spec: &OutputSpec) -> Result<Self, FormatError> {
        Ok(match spec {
            OutputSpec::Json => Self::Raw(RawFormatter),
            OutputSpec::Extract(selector) => Self::Extraction(ExtractionFormatter::new(selector)?),
            OutputSpec::Template(template) => Self::Template(TemplateFormatter::new(template)?),
        })
    }

    /// Parses and builds in one step; every failure is a configuration error.
    pub fn from_spec(spec: &str) -> Result<Self, PregoError> {
        Ok(Self::new(&spec.parse()?)?)
    }

    fn inner(&self) -> &dyn OutputFormatter {
        match self {
            Self::Raw(f) => f,
            Self::Extraction(f) => f,
            Self::Template(f) => f,
        }
    }
}

impl OutputFormatter for Formatter {
    fn preamble(&self) -> Option<String> {
        self.inner().preamble()
    }

    fn print(&self, item: &OutputItem) -> prego_core::Result<String> {
        self.inner().print(item)
    }

    fn epilogue(&self) -> Option<String> {
        self.inner().epilogue()
    }
}
