//! # xmlconform
//!
//! Schema conformance checking for XML instances with structured, ordered
//! problem reports.
//!
//! A pass/fail verdict is not enough for test-assertion tooling: when a
//! document fails validation, the caller needs the line, column, severity,
//! and message of *every* deviation in one pass. This crate wraps libxml2's
//! validators behind an engine that collects problems instead of throwing on
//! the first one, and keeps "the schema itself is broken" strictly separate
//! from "the instance does not conform".
//!
//! ```no_run
//! use xmlconform::{Source, Validator, W3C_XML_SCHEMA_NS_URI};
//!
//! # fn main() -> xmlconform::Result<()> {
//! let validator = Validator::for_language(
//!     W3C_XML_SCHEMA_NS_URI,
//!     vec![Source::from_path("order.xsd")],
//! )?;
//! let report = validator.validate_instance(&Source::from_path("order.xml"))?;
//! if !report.is_valid() {
//!     for problem in report.problems() {
//!         eprintln!("{problem}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod language;
pub mod libxml2;
pub mod matcher;
pub mod report;
pub mod schema;
pub mod source;
pub mod validator;

pub use error::{EngineError, Result};
pub use language::{
    SchemaLanguage, W3C_XML_SCHEMA_NS_URI, XDR_NS_URI, XML_DTD_NS_URI,
};
pub use libxml2::{LibXml2Backend, XmlDtdPtr, XmlSchemaPtr};
pub use matcher::ConformsToSchema;
pub use report::{Severity, ValidationProblem, ValidationResult};
pub use schema::ParsedSchema;
pub use source::{SchemaSet, Source};
pub use validator::Validator;
