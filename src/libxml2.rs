//! Safe wrapper around the libxml2 validation surface.
//!
//! The Rust ecosystem has no mature XSD validator, so schema processing is
//! delegated to libxml2 through direct FFI. This module owns every `unsafe`
//! block in the crate and exposes a small safe API: parse a schema or DTD
//! while collecting structural problems, parse a candidate document, and
//! drive schema/DTD validation over a parsed document to completion.
//!
//! ## Problem collection
//!
//! libxml2 reports problems through error callbacks rather than return
//! values, which is exactly the shape the engine needs: every callback event
//! becomes one [`ValidationProblem`] appended to a caller-owned sink, in
//! detection order, and validation keeps walking the document after each one.
//! Two channels feed the sink:
//!
//! - per-context structured handlers (`xmlSchemaSetParserStructuredErrors`,
//!   `xmlSchemaSetValidStructuredErrors`) for schema parsing and schema
//!   validation;
//! - the process-global structured handler for events that have no
//!   per-context hook (document parsing, DTD validity). The global handler
//!   is process state, so every pass that installs it holds a static mutex;
//!   concurrent validations serialize at this boundary.
//!
//! ## Thread safety
//!
//! Parsed schema structures are read-only after `xmlSchemaParse` and are
//! documented thread-safe for validation (<http://xmlsoft.org/threads.html>),
//! so `XmlSchemaPtr`/`XmlDtdPtr` are `Send + Sync` behind `Arc`. Parser
//! initialization is guarded by `std::sync::Once`; schema parsing itself is
//! serialized by the error-channel mutex.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::ptr;
use std::sync::{Arc, Mutex, Once};

use libc::{c_char, c_int, c_void};

use crate::error::{EngineError, Result};
use crate::report::{Severity, ValidationProblem};

/// One-time libxml2 parser initialization; the init functions themselves are
/// not thread-safe.
static LIBXML2_INIT: Once = Once::new();

/// Guards installation of the process-global structured error handler.
static ERROR_CHANNEL: Mutex<()> = Mutex::new(());

/// Block network fetches of DTDs/schemata referenced by the input.
const XML_PARSE_NONET: c_int = 1 << 11;

/// `xmlCharEncoding` value for "detect from content".
const XML_CHAR_ENCODING_NONE: c_int = 0;

// Opaque libxml2 structures.
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDtd {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserInputBuffer {
    _private: [u8; 0],
}

/// Mirror of libxml2's `xmlError`. `int2` carries the column for parser and
/// validity errors.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    fn xmlInitParser();

    // Document parsing
    fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    fn xmlFreeDoc(doc: *mut XmlDoc);

    // Global structured error channel
    fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);
    fn xmlResetLastError();
    fn xmlGetLastError() -> *mut xmlError;

    // Schema parsing
    fn xmlSchemaNewMemParserCtxt(buffer: *const c_char, size: c_int)
    -> *mut XmlSchemaParserCtxt;
    fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    fn xmlSchemaParse(ctxt: *mut XmlSchemaParserCtxt) -> *mut XmlSchema;
    fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation
    fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;
    fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);

    // DTD parsing and validation
    fn xmlParserInputBufferCreateMem(
        mem: *const c_char,
        size: c_int,
        enc: c_int,
    ) -> *mut XmlParserInputBuffer;
    fn xmlIOParseDTD(
        sax: *mut c_void,
        input: *mut XmlParserInputBuffer,
        enc: c_int,
    ) -> *mut XmlDtd;
    fn xmlFreeDtd(dtd: *mut XmlDtd);
    fn xmlNewValidCtxt() -> *mut XmlValidCtxt;
    fn xmlFreeValidCtxt(ctxt: *mut XmlValidCtxt);
    fn xmlValidateDtd(ctxt: *mut XmlValidCtxt, doc: *mut XmlDoc, dtd: *mut XmlDtd) -> c_int;
}

fn severity_from_level(level: c_int) -> Severity {
    // XML_ERR_WARNING == 1; everything stronger is an error.
    if level == 1 {
        Severity::Warning
    } else {
        Severity::Error
    }
}

fn problem_from_error(error: &xmlError) -> ValidationProblem {
    let message = if error.message.is_null() {
        String::from("unspecified libxml2 error")
    } else {
        unsafe { CStr::from_ptr(error.message) }
            .to_string_lossy()
            .trim_end()
            .to_string()
    };
    let line = error.line.max(0) as u32;
    let column = error.int2.max(0) as u32;
    ValidationProblem::new(message, line, column, severity_from_level(error.level))
}

/// Structured error callback: appends one problem per event to the sink the
/// engine registered. Must never unwind across the FFI boundary, so it does
/// nothing but convert and push.
unsafe extern "C" fn collect_problem(user_data: *mut c_void, error: *mut xmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }
    let sink = unsafe { &mut *(user_data as *mut Vec<ValidationProblem>) };
    let error = unsafe { &*error };
    sink.push(problem_from_error(error));
}

/// Run `f` with the structured error channel routed into `sink`.
///
/// `f` receives the raw sink pointer so it can additionally register the
/// same sink as a per-context handler. The global handler is restored before
/// returning, and the channel mutex is held throughout.
fn with_error_channel<T>(sink: &mut Vec<ValidationProblem>, f: impl FnOnce(*mut c_void) -> T) -> T {
    let _guard = ERROR_CHANNEL.lock().unwrap_or_else(|e| e.into_inner());
    let ctx = sink as *mut Vec<ValidationProblem> as *mut c_void;
    unsafe {
        xmlResetLastError();
        xmlSetStructuredErrorFunc(ctx, Some(collect_problem));
    }
    let out = f(ctx);
    unsafe {
        xmlSetStructuredErrorFunc(ptr::null_mut(), None);
    }
    out
}

/// Problem synthesized from libxml2's thread-local last-error slot, for the
/// rare case where an operation fails without routing anything through the
/// structured channel.
fn last_error_problem(fallback: &str) -> ValidationProblem {
    let last = unsafe { xmlGetLastError() };
    if last.is_null() {
        return ValidationProblem::new(fallback, 0, 0, Severity::Error);
    }
    problem_from_error(unsafe { &*last })
}

/// Shared, read-only handle to a parsed XML Schema. Freed exactly once when
/// the last clone drops.
#[derive(Debug)]
pub struct XmlSchemaPtr {
    inner: Arc<SchemaInner>,
}

#[derive(Debug)]
struct SchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: libxml2 schema structures are read-only after parsing and
// documented thread-safe for concurrent validation.
unsafe impl Send for SchemaInner {}
unsafe impl Sync for SchemaInner {}

impl XmlSchemaPtr {
    /// # Safety
    ///
    /// `ptr` must be non-null, allocated by libxml2, and owned exclusively
    /// by the returned handle (freed via `xmlSchemaFree` on last drop).
    unsafe fn from_raw(ptr: *mut XmlSchema) -> Self {
        XmlSchemaPtr {
            inner: Arc::new(SchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        }
    }

    fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }
}

impl Clone for XmlSchemaPtr {
    fn clone(&self) -> Self {
        XmlSchemaPtr {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for SchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = ptr::null_mut();
        }
    }
}

/// Shared, read-only handle to a parsed external DTD subset.
#[derive(Debug)]
pub struct XmlDtdPtr {
    inner: Arc<DtdInner>,
}

#[derive(Debug)]
struct DtdInner {
    ptr: *mut XmlDtd,
    _phantom: PhantomData<XmlDtd>,
}

// Safety: the DTD tree is read-only after parsing; validation creates its
// own context per call.
unsafe impl Send for DtdInner {}
unsafe impl Sync for DtdInner {}

impl XmlDtdPtr {
    /// # Safety
    ///
    /// Same ownership contract as [`XmlSchemaPtr::from_raw`].
    unsafe fn from_raw(ptr: *mut XmlDtd) -> Self {
        XmlDtdPtr {
            inner: Arc::new(DtdInner {
                ptr,
                _phantom: PhantomData,
            }),
        }
    }

    fn as_ptr(&self) -> *mut XmlDtd {
        self.inner.ptr
    }
}

impl Clone for XmlDtdPtr {
    fn clone(&self) -> Self {
        XmlDtdPtr {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for DtdInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlFreeDtd(self.ptr);
            }
            self.ptr = ptr::null_mut();
        }
    }
}

/// Owned parse tree of one candidate document; lives for the duration of a
/// single validation pass.
pub(crate) struct Document {
    ptr: *mut XmlDoc,
}

impl Document {
    fn as_ptr(&self) -> *mut XmlDoc {
        self.ptr
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlFreeDoc(self.ptr);
            }
        }
    }
}

/// Safe facade over the libxml2 calls the engine needs.
///
/// Creating an instance initializes libxml2 exactly once; instances are
/// zero-sized and freely shareable.
#[derive(Debug)]
pub struct LibXml2Backend {
    _phantom: PhantomData<()>,
}

impl LibXml2Backend {
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });
        LibXml2Backend {
            _phantom: PhantomData,
        }
    }

    /// Parse an XML Schema from memory, collecting every structural problem
    /// the schema reader reports. Returns `None` when no usable schema was
    /// produced; in that case at least one problem is guaranteed in `sink`.
    pub fn parse_schema_from_memory(
        &self,
        data: &[u8],
        sink: &mut Vec<ValidationProblem>,
    ) -> Option<XmlSchemaPtr> {
        let before = sink.len();
        let schema = with_error_channel(sink, |ctx| unsafe {
            let pctxt =
                xmlSchemaNewMemParserCtxt(data.as_ptr() as *const c_char, data.len() as c_int);
            if pctxt.is_null() {
                return None;
            }
            xmlSchemaSetParserStructuredErrors(pctxt, Some(collect_problem), ctx);
            let schema = xmlSchemaParse(pctxt);
            xmlSchemaFreeParserCtxt(pctxt);
            if schema.is_null() {
                None
            } else {
                Some(XmlSchemaPtr::from_raw(schema))
            }
        });
        if schema.is_none() && sink.len() == before {
            sink.push(last_error_problem("schema could not be parsed"));
        }
        schema
    }

    /// Parse an XML Schema from a location URL (usually a file path), so
    /// relative `xs:include`/`xs:import` references resolve against it.
    pub fn parse_schema_from_url(
        &self,
        url: &str,
        sink: &mut Vec<ValidationProblem>,
    ) -> Option<XmlSchemaPtr> {
        let c_url = match CString::new(url) {
            Ok(c) => c,
            Err(_) => {
                sink.push(ValidationProblem::new(
                    format!("schema location contains NUL byte: {url}"),
                    0,
                    0,
                    Severity::Error,
                ));
                return None;
            }
        };
        let before = sink.len();
        let schema = with_error_channel(sink, |ctx| unsafe {
            let pctxt = xmlSchemaNewParserCtxt(c_url.as_ptr());
            if pctxt.is_null() {
                return None;
            }
            xmlSchemaSetParserStructuredErrors(pctxt, Some(collect_problem), ctx);
            let schema = xmlSchemaParse(pctxt);
            xmlSchemaFreeParserCtxt(pctxt);
            if schema.is_null() {
                None
            } else {
                Some(XmlSchemaPtr::from_raw(schema))
            }
        });
        if schema.is_none() && sink.len() == before {
            sink.push(last_error_problem("schema could not be parsed"));
        }
        schema
    }

    /// Parse an external DTD subset from memory, collecting problems.
    pub fn parse_dtd_from_memory(
        &self,
        data: &[u8],
        sink: &mut Vec<ValidationProblem>,
    ) -> Option<XmlDtdPtr> {
        let before = sink.len();
        let dtd = with_error_channel(sink, |_ctx| unsafe {
            let input = xmlParserInputBufferCreateMem(
                data.as_ptr() as *const c_char,
                data.len() as c_int,
                XML_CHAR_ENCODING_NONE,
            );
            if input.is_null() {
                return None;
            }
            // xmlIOParseDTD consumes the input buffer.
            let dtd = xmlIOParseDTD(ptr::null_mut(), input, XML_CHAR_ENCODING_NONE);
            if dtd.is_null() {
                None
            } else {
                Some(XmlDtdPtr::from_raw(dtd))
            }
        });
        if dtd.is_none() && sink.len() == before {
            sink.push(last_error_problem("DTD could not be parsed"));
        }
        dtd
    }

    /// Parse a candidate document, collecting parser errors and warnings.
    ///
    /// Returns `None` when the document is not well-formed; the fatal parse
    /// problems are in `sink` (at least one guaranteed), so the caller can
    /// fold them into the report rather than aborting.
    pub(crate) fn read_document(
        &self,
        data: &[u8],
        system_id: Option<&str>,
        sink: &mut Vec<ValidationProblem>,
    ) -> Option<Document> {
        let url = system_id.and_then(|id| CString::new(id).ok());
        let before = sink.len();
        let doc = with_error_channel(sink, |_ctx| unsafe {
            let doc = xmlReadMemory(
                data.as_ptr() as *const c_char,
                data.len() as c_int,
                url.as_ref().map_or(ptr::null(), |c| c.as_ptr()),
                ptr::null(),
                XML_PARSE_NONET,
            );
            if doc.is_null() {
                None
            } else {
                Some(Document { ptr: doc })
            }
        });
        if doc.is_none() && sink.len() == before {
            sink.push(last_error_problem("document is not well-formed"));
        }
        doc
    }

    /// Validate a parsed document against a schema, appending every reported
    /// violation to `sink`. The walk always runs to the end of the document;
    /// a collected problem never stops it.
    pub(crate) fn validate_with_schema(
        &self,
        schema: &XmlSchemaPtr,
        doc: &Document,
        sink: &mut Vec<ValidationProblem>,
    ) -> Result<()> {
        let before = sink.len();
        let code = with_error_channel(sink, |ctx| unsafe {
            let vctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if vctxt.is_null() {
                return c_int::MIN;
            }
            xmlSchemaSetValidStructuredErrors(vctxt, Some(collect_problem), ctx);
            let code = xmlSchemaValidateDoc(vctxt, doc.as_ptr());
            xmlSchemaFreeValidCtxt(vctxt);
            code
        });
        if code == c_int::MIN {
            return Err(EngineError::Internal {
                details: "failed to allocate schema validation context".to_string(),
            });
        }
        if code < 0 {
            return Err(EngineError::Internal {
                details: format!("schema validation returned internal error code {code}"),
            });
        }
        if code > 0 && sink.len() == before {
            sink.push(last_error_problem("instance does not conform to schema"));
        }
        Ok(())
    }

    /// Validate a parsed document against an external DTD, appending every
    /// reported violation to `sink`.
    pub(crate) fn validate_with_dtd(
        &self,
        dtd: &XmlDtdPtr,
        doc: &Document,
        sink: &mut Vec<ValidationProblem>,
    ) -> Result<()> {
        let before = sink.len();
        let code = with_error_channel(sink, |_ctx| unsafe {
            let vctxt = xmlNewValidCtxt();
            if vctxt.is_null() {
                return c_int::MIN;
            }
            // Validity events route through the global channel; the context
            // carries no callbacks of its own.
            let code = xmlValidateDtd(vctxt, doc.as_ptr(), dtd.as_ptr());
            xmlFreeValidCtxt(vctxt);
            code
        });
        if code == c_int::MIN {
            return Err(EngineError::Internal {
                details: "failed to allocate DTD validation context".to_string(),
            });
        }
        // xmlValidateDtd returns 1 for a valid document, 0 otherwise.
        if code == 0 && sink.len() == before {
            sink.push(last_error_problem("instance does not conform to DTD"));
        }
        Ok(())
    }
}

impl Default for LibXml2Backend {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root" type="xs:string"/>
</xs:schema>"#;

    const SIMPLE_DTD: &str = "<!ELEMENT note (body)>\n<!ELEMENT body (#PCDATA)>\n";

    #[test]
    fn parses_well_formed_schema() {
        let backend = LibXml2Backend::new();
        let mut sink = Vec::new();
        let schema = backend.parse_schema_from_memory(SIMPLE_XSD.as_bytes(), &mut sink);
        assert!(schema.is_some());
        assert!(sink.is_empty(), "unexpected problems: {sink:?}");
    }

    #[test]
    fn broken_schema_collects_problems_instead_of_panicking() {
        let backend = LibXml2Backend::new();
        let mut sink = Vec::new();
        // Element declaration referencing an undefined type.
        let broken = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root" type="NoSuchType"/>
</xs:schema>"#;
        let schema = backend.parse_schema_from_memory(broken.as_bytes(), &mut sink);
        assert!(schema.is_none());
        assert!(!sink.is_empty());
        assert!(sink.iter().all(|p| p.severity() == Severity::Error));
    }

    #[test]
    fn schema_validation_collects_all_violations() {
        let backend = LibXml2Backend::new();
        let mut sink = Vec::new();
        let xsd = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="item" type="xs:int" maxOccurs="unbounded"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;
        let schema = backend
            .parse_schema_from_memory(xsd.as_bytes(), &mut sink)
            .expect("schema parses");
        assert!(sink.is_empty());

        let instance = "<root><item>not-a-number</item><item>also-bad</item></root>";
        let doc = backend
            .read_document(instance.as_bytes(), None, &mut sink)
            .expect("instance is well-formed");
        backend
            .validate_with_schema(&schema, &doc, &mut sink)
            .unwrap();

        // Both bad items are reported; the walk did not stop at the first.
        assert_eq!(sink.len(), 2, "problems: {sink:?}");
        assert!(sink[0].line() > 0);
    }

    #[test]
    fn malformed_document_yields_problem_not_abort() {
        let backend = LibXml2Backend::new();
        let mut sink = Vec::new();
        let doc = backend.read_document(b"<root><unterminated></root>", None, &mut sink);
        assert!(doc.is_none());
        assert!(!sink.is_empty());
        assert_eq!(sink[0].severity(), Severity::Error);
    }

    #[test]
    fn dtd_parse_and_validate() {
        let backend = LibXml2Backend::new();
        let mut sink = Vec::new();
        let dtd = backend
            .parse_dtd_from_memory(SIMPLE_DTD.as_bytes(), &mut sink)
            .expect("DTD parses");
        assert!(sink.is_empty(), "unexpected problems: {sink:?}");

        let good = backend
            .read_document(b"<note><body>hi</body></note>", None, &mut sink)
            .unwrap();
        backend.validate_with_dtd(&dtd, &good, &mut sink).unwrap();
        assert!(sink.is_empty(), "valid doc reported problems: {sink:?}");

        let bad = backend
            .read_document(b"<note><subject>hi</subject></note>", None, &mut sink)
            .unwrap();
        backend.validate_with_dtd(&dtd, &bad, &mut sink).unwrap();
        assert!(!sink.is_empty());
    }

    #[test]
    fn schema_handle_is_cloneable_and_shared() {
        let backend = LibXml2Backend::new();
        let mut sink = Vec::new();
        let schema = backend
            .parse_schema_from_memory(SIMPLE_XSD.as_bytes(), &mut sink)
            .unwrap();
        let clone = schema.clone();
        assert_eq!(schema.as_ptr(), clone.as_ptr());
        drop(schema);
        // Clone keeps the underlying schema alive and usable.
        let doc = backend
            .read_document(b"<root>text</root>", None, &mut sink)
            .unwrap();
        backend
            .validate_with_schema(&clone, &doc, &mut sink)
            .unwrap();
        assert!(sink.is_empty());
    }
}
