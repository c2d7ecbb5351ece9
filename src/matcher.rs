//! Adapter for assertion/matcher frameworks.
//!
//! Wraps the engine's [`ValidationResult`] into the two operations a matcher
//! framework consumes: a boolean verdict and a rendered description. The
//! description is rebuilt from the stored result of the last `matches` call
//! and never re-runs validation.

use crate::error::{EngineError, Result};
use crate::report::ValidationResult;
use crate::schema::ParsedSchema;
use crate::source::Source;
use crate::validator::Validator;

/// Matches a candidate document against a fixed schema configuration.
#[derive(Debug)]
pub struct ConformsToSchema {
    validator: Validator,
    schema_ids: Vec<String>,
    last_result: Option<ValidationResult>,
}

impl ConformsToSchema {
    /// Matcher over an ordered list of schema sources.
    ///
    /// Unlike the engine itself, the matcher has no well-formedness-only
    /// mode: an empty source list is an [`EngineError::InvalidArgument`].
    pub fn new(identifier: &str, sources: Vec<Source>) -> Result<ConformsToSchema> {
        if sources.is_empty() {
            return Err(EngineError::InvalidArgument(
                "at least one schema source is required".to_string(),
            ));
        }
        let schema_ids = sources.iter().filter_map(Source::system_id).collect();
        Ok(ConformsToSchema {
            validator: Validator::for_language(identifier, sources)?,
            schema_ids,
            last_result: None,
        })
    }

    /// Matcher over a pre-parsed schema.
    pub fn for_parsed_schema(schema: ParsedSchema) -> ConformsToSchema {
        ConformsToSchema {
            validator: Validator::for_parsed_schema(schema),
            schema_ids: Vec::new(),
            last_result: None,
        }
    }

    /// Validate `candidate` once and report whether it conformed.
    ///
    /// The full result is retained for [`describe`](Self::describe). Fatal
    /// engine failures (unreadable schema, malformed schema, unreadable
    /// candidate) propagate as errors rather than counting as a mismatch.
    pub fn matches(&mut self, candidate: &Source) -> Result<bool> {
        let result = self.validator.validate_instance(candidate)?;
        let valid = result.is_valid();
        self.last_result = Some(result);
        Ok(valid)
    }

    /// The result of the last `matches` call, if any.
    pub fn result(&self) -> Option<&ValidationResult> {
        self.last_result.as_ref()
    }

    /// Deterministic description of what was (or would be) checked.
    ///
    /// Renders the checked schemas by system identifier, one per line, or a
    /// generic phrase when none carry identifiers; when the last validation
    /// failed, appends a comma-joined rendering of every problem message.
    /// Safe to call before any validation has run.
    pub fn describe(&self) -> String {
        let mut out = String::from("conforms to ");
        if self.schema_ids.is_empty() {
            out.push_str("the supplied schema");
        } else {
            out.push_str("schema(s):");
            for id in &self.schema_ids {
                out.push('\n');
                out.push_str("  ");
                out.push_str(id);
            }
        }
        if let Some(result) = &self.last_result {
            if !result.is_valid() {
                let joined = result
                    .problems()
                    .iter()
                    .map(|p| p.message().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push_str("\nbut found these problems: ");
                out.push_str(&joined);
            }
        }
        out
    }
}
