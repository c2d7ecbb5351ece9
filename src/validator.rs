//! The schema validation engine.
//!
//! A [`Validator`] is configured once (schema language resolved at
//! construction, schema material fixed) and can then validate candidate
//! instances repeatedly. Each pass walks the entire document and collects
//! every reported problem into a [`ValidationResult`]; only failures that
//! prevent a pass from happening at all (unreadable or malformed schema
//! sources, unreadable instance, delegate failure) surface as errors.
//!
//! Schema sources are opened and compiled lazily on the first validation,
//! guarded so a concurrent first use still initializes exactly once; the
//! compiled representation is read-only afterwards, so a single `Validator`
//! may be shared across threads.

use std::sync::OnceLock;

use crate::error::{EngineError, Result};
use crate::language::SchemaLanguage;
use crate::libxml2::LibXml2Backend;
use crate::report::ValidationResult;
use crate::schema::{self, ParsedSchema, SchemaHandle};
use crate::source::{SchemaSet, Selection, Source};

/// Validates XML instances against a fixed schema configuration.
#[derive(Debug)]
pub struct Validator {
    language: SchemaLanguage,
    schemas: SchemaSet,
    backend: LibXml2Backend,
    compiled: OnceLock<Option<SchemaHandle>>,
}

impl Validator {
    /// Create an engine for the given schema-language identifier and schema
    /// material.
    ///
    /// Fails with [`EngineError::UnsupportedSchemaLanguage`] for identifiers
    /// outside the resolution table, and with
    /// [`EngineError::InvalidArgument`] when a supplied parsed schema does
    /// not match the language or a DTD configuration carries more than one
    /// source (DTDs do not aggregate).
    pub fn new(identifier: &str, schemas: SchemaSet) -> Result<Validator> {
        let language = SchemaLanguage::resolve(identifier)?;
        if let Some(parsed) = schemas.parsed() {
            if parsed.language() != language {
                return Err(EngineError::InvalidArgument(format!(
                    "parsed schema is {}, engine language is {}",
                    parsed.language().identifier(),
                    language.identifier()
                )));
            }
        }
        if language == SchemaLanguage::Dtd && schemas.sources().len() > 1 {
            return Err(EngineError::InvalidArgument(
                "DTD validation accepts exactly one schema source".to_string(),
            ));
        }
        Ok(Validator {
            language,
            schemas,
            backend: LibXml2Backend::new(),
            compiled: OnceLock::new(),
        })
    }

    /// Engine over an ordered list of schema sources.
    ///
    /// An empty list means no schema is attached: instance validation
    /// degrades to well-formedness-only checking.
    pub fn for_language(identifier: &str, sources: Vec<Source>) -> Result<Validator> {
        Validator::new(identifier, SchemaSet::from_sources(sources))
    }

    /// Engine over a single pre-parsed schema; the source-loading path is
    /// bypassed entirely.
    pub fn for_parsed_schema(schema: ParsedSchema) -> Validator {
        let language = schema.language();
        Validator {
            language,
            schemas: SchemaSet::from_parsed(schema),
            backend: LibXml2Backend::new(),
            compiled: OnceLock::new(),
        }
    }

    pub fn language(&self) -> SchemaLanguage {
        self.language
    }

    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    /// Validate the configured schema sources themselves.
    ///
    /// Runs the schema reader over each source in order, collecting every
    /// structural problem (malformed grammar, unresolvable references) into
    /// the result: a broken schema yields an invalid result, not an error.
    /// Only an I/O failure is fatal ([`EngineError::SchemaUnreadable`]).
    ///
    /// This path exists for source-list configurations only; a pre-parsed
    /// schema is assumed already validated and requesting it is a
    /// programming error ([`EngineError::NotSupported`]).
    pub fn validate_schema(&self) -> Result<ValidationResult> {
        let sources = match self.schemas.selection() {
            Selection::Parsed(_) => {
                return Err(EngineError::NotSupported(
                    "schema-only validation requires a schema-source configuration",
                ));
            }
            Selection::Sources(sources) => sources,
        };
        let mut problems = Vec::new();
        for source in sources {
            schema::collect_schema_problems(&self.backend, self.language, source, &mut problems)?;
        }
        Ok(ValidationResult::from_problems(problems))
    }

    /// Validate a candidate instance, returning the complete ordered report.
    ///
    /// The document is walked to the end of its token stream; problems never
    /// short-circuit the pass, so one call reports every defect in the
    /// instance. A candidate that is not well-formed at all yields an
    /// invalid result carrying the parser's problems; the malformed-markup
    /// case is folded into the report, not raised.
    pub fn validate_instance(&self, instance: &Source) -> Result<ValidationResult> {
        // Establish the validation context first: an unreadable or malformed
        // schema source must surface before any instance is examined.
        let handle = self.compiled()?;
        let data = instance
            .read()
            .map_err(|err| EngineError::InstanceUnreadable {
                system_id: instance.describe(),
                source: err,
            })?;

        let mut problems = Vec::new();
        let doc = self
            .backend
            .read_document(&data, instance.system_id().as_deref(), &mut problems);
        if let Some(doc) = doc {
            match &handle {
                None => {} // no schema attached: well-formedness only
                Some(SchemaHandle::Xsd(schema)) => {
                    self.backend
                        .validate_with_schema(schema, &doc, &mut problems)?;
                }
                Some(SchemaHandle::Dtd(dtd)) => {
                    self.backend.validate_with_dtd(dtd, &doc, &mut problems)?;
                }
            }
        }
        Ok(ValidationResult::from_problems(problems))
    }

    /// The compiled schema material, built on first use.
    ///
    /// A failed build is not cached: the next call retries, so a transient
    /// I/O failure does not poison the engine. On a concurrent first use the
    /// first completed build wins and later ones are dropped.
    fn compiled(&self) -> Result<Option<SchemaHandle>> {
        if let Some(handle) = self.compiled.get() {
            return Ok(handle.clone());
        }
        let built = self.build()?;
        let _ = self.compiled.set(built);
        Ok(self
            .compiled
            .get()
            .expect("compiled schema was just initialized")
            .clone())
    }

    fn build(&self) -> Result<Option<SchemaHandle>> {
        match self.schemas.selection() {
            Selection::Parsed(parsed) => Ok(Some(parsed.handle().clone())),
            Selection::Sources(sources) if sources.is_empty() => Ok(None),
            Selection::Sources(sources) => match self.language {
                SchemaLanguage::XmlSchema => Ok(Some(SchemaHandle::Xsd(
                    schema::compile_xsd_set(&self.backend, sources)?,
                ))),
                SchemaLanguage::Dtd => Ok(Some(SchemaHandle::Dtd(schema::compile_dtd_source(
                    &self.backend,
                    &sources[0],
                )?))),
            },
        }
    }
}
