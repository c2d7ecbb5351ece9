use std::io;

use thiserror::Error;

/// Fatal failures of the validation engine.
///
/// Conformance findings are deliberately *not* represented here: anything the
/// schema reader or document walk reports about the candidate instance is
/// collected into a [`ValidationResult`](crate::report::ValidationResult)
/// instead of being raised. This type covers the conditions under which no
/// result can be produced at all: bad configuration, an unreadable schema
/// source, or a failure inside the libxml2 delegate.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid construction input (empty matcher schema set, DTD source
    /// arity, parsed-schema language mismatch).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The schema-language identifier is not in the resolution table, or the
    /// libxml2 delegate has no validator for it. Raised at construction,
    /// never deferred to validation time.
    #[error("unsupported schema language: {identifier}")]
    UnsupportedSchemaLanguage { identifier: String },

    /// I/O failure while reading a configured schema source. Distinct from
    /// conformance problems: the validation context could not be established.
    #[error("schema source unreadable: {system_id}")]
    SchemaUnreadable {
        system_id: String,
        #[source]
        source: io::Error,
    },

    /// A configured schema source failed to compile while establishing an
    /// instance-validation context. The schema-only validation path reports
    /// the same condition as collected problems instead of failing.
    #[error("schema malformed: {system_id}: {details}")]
    SchemaMalformed { system_id: String, details: String },

    /// I/O failure while reading the candidate instance.
    #[error("instance source unreadable: {system_id}")]
    InstanceUnreadable {
        system_id: String,
        #[source]
        source: io::Error,
    },

    /// The requested operation does not exist for the current configuration.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),

    /// Negative return code or allocation failure inside libxml2.
    #[error("libxml2 internal error: {details}")]
    Internal { details: String },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_identifier_and_details() {
        let err = EngineError::UnsupportedSchemaLanguage {
            identifier: "urn:example:unknown".to_string(),
        };
        assert!(err.to_string().contains("urn:example:unknown"));

        let err = EngineError::SchemaMalformed {
            system_id: "schema.xsd".to_string(),
            details: "undefined type".to_string(),
        };
        assert!(err.to_string().contains("schema.xsd"));
        assert!(err.to_string().contains("undefined type"));
    }

    #[test]
    fn unreadable_preserves_io_source() {
        use std::error::Error;

        let err = EngineError::SchemaUnreadable {
            system_id: "/nonexistent/schema.xsd".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let source = err.source().expect("io source preserved");
        assert_eq!(source.to_string(), "no such file");
    }
}
