//! Schema-language identifiers and their resolution.
//!
//! The resolution table is a process-wide constant: identifier strings map to
//! the validation strategy the engine selects at construction time. Lookup
//! failure is a configuration error surfaced immediately, never deferred to
//! validation time.

use crate::error::{EngineError, Result};

/// Namespace URI identifying W3C XML Schema.
pub const W3C_XML_SCHEMA_NS_URI: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace URI identifying XML DTD.
pub const XML_DTD_NS_URI: &str = "http://www.w3.org/TR/REC-xml";

/// URN identifying XML-Data Reduced. Recognized by the table, but the
/// libxml2 delegate has no XDR validator, so resolution rejects it.
pub const XDR_NS_URI: &str = "urn:schemas-microsoft-com:xml-data";

/// Validation strategy tag resolved from a schema-language identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaLanguage {
    /// W3C XML Schema (XSD).
    XmlSchema,
    /// XML 1.0 Document Type Definition.
    Dtd,
}

/// Fixed identifier table. An entry with `None` names a language the table
/// knows about but the delegate cannot validate.
const LANGUAGES: &[(&str, Option<SchemaLanguage>)] = &[
    (W3C_XML_SCHEMA_NS_URI, Some(SchemaLanguage::XmlSchema)),
    (XML_DTD_NS_URI, Some(SchemaLanguage::Dtd)),
    (XDR_NS_URI, None),
];

impl SchemaLanguage {
    /// Resolve a schema-language identifier to a validation strategy.
    ///
    /// Fails with [`EngineError::UnsupportedSchemaLanguage`] for identifiers
    /// outside the table and for XML-Data Reduced, which is recognized but
    /// has no backing validator. There is no silent default.
    pub fn resolve(identifier: &str) -> Result<SchemaLanguage> {
        match LANGUAGES.iter().find(|(id, _)| *id == identifier) {
            Some((_, Some(language))) => Ok(*language),
            _ => Err(EngineError::UnsupportedSchemaLanguage {
                identifier: identifier.to_string(),
            }),
        }
    }

    /// The canonical identifier for this language.
    pub fn identifier(&self) -> &'static str {
        match self {
            SchemaLanguage::XmlSchema => W3C_XML_SCHEMA_NS_URI,
            SchemaLanguage::Dtd => XML_DTD_NS_URI,
        }
    }
}
