//! Compiled schema material and schema-source aggregation.
//!
//! A [`ParsedSchema`] is the "already parsed, known good" representation a
//! caller can hand to the engine directly, bypassing source loading. The
//! free functions here are the loading path the engine uses for
//! source-configured validators: strict compilation of one source, driver
//! synthesis for multi-source XSD sets, and the problem-collecting read used
//! by schema-only validation.

use std::borrow::Cow;
use std::io::Write;
use std::sync::OnceLock;

use regex::bytes::Regex;
use tempfile::NamedTempFile;

use crate::error::{EngineError, Result};
use crate::language::SchemaLanguage;
use crate::libxml2::{LibXml2Backend, XmlDtdPtr, XmlSchemaPtr};
use crate::report::{Severity, ValidationProblem};
use crate::source::Source;

/// A schema compiled by the libxml2 delegate, ready for repeated
/// validation. Cheap to clone; the underlying structure is shared and
/// read-only.
#[derive(Debug, Clone)]
pub struct ParsedSchema {
    language: SchemaLanguage,
    handle: SchemaHandle,
}

/// Language-specific compiled representation.
#[derive(Debug, Clone)]
pub(crate) enum SchemaHandle {
    Xsd(XmlSchemaPtr),
    Dtd(XmlDtdPtr),
}

impl ParsedSchema {
    /// Compile a single schema source strictly: any error-severity problem
    /// reported by the schema reader fails with
    /// [`EngineError::SchemaMalformed`]. Warnings are tolerated.
    pub fn compile(identifier: &str, source: &Source) -> Result<ParsedSchema> {
        let language = SchemaLanguage::resolve(identifier)?;
        let backend = LibXml2Backend::new();
        let handle = match language {
            SchemaLanguage::XmlSchema => {
                SchemaHandle::Xsd(compile_xsd_source(&backend, source)?)
            }
            SchemaLanguage::Dtd => SchemaHandle::Dtd(compile_dtd_source(&backend, source)?),
        };
        Ok(ParsedSchema { language, handle })
    }

    pub fn language(&self) -> SchemaLanguage {
        self.language
    }

    pub(crate) fn handle(&self) -> &SchemaHandle {
        &self.handle
    }
}

/// Read a schema source, mapping I/O failure to the fatal
/// [`EngineError::SchemaUnreadable`] class, never into the problem list.
pub(crate) fn read_schema_bytes(source: &Source) -> Result<Cow<'_, [u8]>> {
    source.read().map_err(|err| EngineError::SchemaUnreadable {
        system_id: source.describe(),
        source: err,
    })
}

/// Run the schema reader over one source, appending every structural
/// problem it reports to `sink`. Used by schema-only validation: problems
/// are collected, never raised. I/O failure is still fatal.
pub(crate) fn collect_schema_problems(
    backend: &LibXml2Backend,
    language: SchemaLanguage,
    source: &Source,
    sink: &mut Vec<ValidationProblem>,
) -> Result<()> {
    let data = read_schema_bytes(source)?;
    match language {
        SchemaLanguage::XmlSchema => match source.local_path() {
            Some(path) => {
                backend.parse_schema_from_url(&path.to_string_lossy(), sink);
            }
            None => {
                backend.parse_schema_from_memory(&data, sink);
            }
        },
        SchemaLanguage::Dtd => {
            backend.parse_dtd_from_memory(&data, sink);
        }
    }
    Ok(())
}

/// Compile one XSD source, failing on error-severity problems.
pub(crate) fn compile_xsd_source(
    backend: &LibXml2Backend,
    source: &Source,
) -> Result<XmlSchemaPtr> {
    // Read first so an unreadable file is SchemaUnreadable, not a parse
    // problem reported by libxml2's own I/O layer.
    let data = read_schema_bytes(source)?;
    let mut problems = Vec::new();
    let schema = match source.local_path() {
        // File-backed sources parse from their URL so relative
        // xs:include/xs:import references resolve.
        Some(path) => backend.parse_schema_from_url(&path.to_string_lossy(), &mut problems),
        None => backend.parse_schema_from_memory(&data, &mut problems),
    };
    strict(schema, problems, source.describe())
}

/// Compile one external DTD subset, failing on error-severity problems.
pub(crate) fn compile_dtd_source(backend: &LibXml2Backend, source: &Source) -> Result<XmlDtdPtr> {
    let data = read_schema_bytes(source)?;
    let mut problems = Vec::new();
    let dtd = backend.parse_dtd_from_memory(&data, &mut problems);
    strict(dtd, problems, source.describe())
}

/// Compile an ordered set of XSD sources into one schema.
///
/// A single source compiles directly. Multiple sources are aggregated
/// through a synthesized driver schema that imports each source by its
/// sniffed target namespace (or includes it when it has none); buffer-backed
/// sources are spilled to temporary files for the duration of the compile.
/// Duplicate target namespaces are passed through unmodified; conflict
/// resolution belongs to libxml2.
pub(crate) fn compile_xsd_set(
    backend: &LibXml2Backend,
    sources: &[Source],
) -> Result<XmlSchemaPtr> {
    if let [source] = sources {
        return compile_xsd_source(backend, source);
    }

    let mut spilled: Vec<NamedTempFile> = Vec::new();
    let mut entries = String::new();
    for source in sources {
        let data = read_schema_bytes(source)?;
        let namespace = target_namespace(&data);
        let location = match source.local_path() {
            Some(path) => path
                .canonicalize()
                .map_err(|err| EngineError::SchemaUnreadable {
                    system_id: source.describe(),
                    source: err,
                })?
                .display()
                .to_string(),
            None => {
                let file = spill_to_disk(&data, source)?;
                let location = file.path().display().to_string();
                spilled.push(file);
                location
            }
        };
        match namespace {
            Some(ns) => {
                entries.push_str(&format!(
                    "  <xs:import namespace=\"{}\" schemaLocation=\"{}\"/>\n",
                    escape_attr(&ns),
                    escape_attr(&location)
                ));
            }
            None => {
                entries.push_str(&format!(
                    "  <xs:include schemaLocation=\"{}\"/>\n",
                    escape_attr(&location)
                ));
            }
        }
    }

    let driver = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\">\n{entries}</xs:schema>\n"
    );
    let mut problems = Vec::new();
    let schema = backend.parse_schema_from_memory(driver.as_bytes(), &mut problems);
    // Spilled files must outlive the parse; libxml2 reads them during
    // xmlSchemaParse.
    drop(spilled);
    strict(
        schema,
        problems,
        format!("aggregate of {} schema sources", sources.len()),
    )
}

fn spill_to_disk(data: &[u8], source: &Source) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("xmlconform-")
        .suffix(".xsd")
        .tempfile()
        .map_err(|err| schema_unreadable(source, err))?;
    file.write_all(data)
        .map_err(|err| schema_unreadable(source, err))?;
    file.flush().map_err(|err| schema_unreadable(source, err))?;
    Ok(file)
}

fn schema_unreadable(source: &Source, err: std::io::Error) -> EngineError {
    EngineError::SchemaUnreadable {
        system_id: source.describe(),
        source: err,
    }
}

fn strict<T>(
    handle: Option<T>,
    problems: Vec<ValidationProblem>,
    system_id: String,
) -> Result<T> {
    let errors: Vec<&ValidationProblem> = problems
        .iter()
        .filter(|p| p.severity() == Severity::Error)
        .collect();
    match handle {
        Some(handle) if errors.is_empty() => Ok(handle),
        _ => {
            let details = if errors.is_empty() {
                "schema reader produced no usable schema".to_string()
            } else {
                errors
                    .iter()
                    .map(|p| p.message().to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            Err(EngineError::SchemaMalformed { system_id, details })
        }
    }
}

/// Sniff the target namespace of a schema document without parsing it.
fn target_namespace(data: &[u8]) -> Option<String> {
    static DOUBLE_QUOTED: OnceLock<Regex> = OnceLock::new();
    static SINGLE_QUOTED: OnceLock<Regex> = OnceLock::new();

    let double_quoted = DOUBLE_QUOTED.get_or_init(|| {
        Regex::new(r#"targetNamespace\s*=\s*"([^"]*)""#)
            .expect("targetNamespace regex is valid")
    });
    let single_quoted = SINGLE_QUOTED.get_or_init(|| {
        Regex::new(r#"targetNamespace\s*=\s*'([^']*)'"#)
            .expect("targetNamespace regex is valid")
    });

    double_quoted
        .captures(data)
        .or_else(|| single_quoted.captures(data))
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}
