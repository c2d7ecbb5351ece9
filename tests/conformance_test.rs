//! End-to-end conformance tests over file-backed schema and instance
//! fixtures, exercising the full load → aggregate → validate → report flow.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use xmlconform::{
    ConformsToSchema, EngineError, ParsedSchema, SchemaSet, Severity, Source, Validator,
    W3C_XML_SCHEMA_NS_URI, XML_DTD_NS_URI,
};

const PERSON_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="person">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="name" type="xs:string"/>
                <xs:element name="age" type="xs:int"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

fn write_fixture(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn file_backed_schema_validates_file_backed_instance() {
    let dir = TempDir::new().unwrap();
    let schema = write_fixture(&dir, "person.xsd", PERSON_XSD);
    let instance = write_fixture(
        &dir,
        "person.xml",
        "<person><name>Ada</name><age>36</age></person>",
    );

    let validator =
        Validator::for_language(W3C_XML_SCHEMA_NS_URI, vec![Source::from_path(&schema)]).unwrap();
    let result = validator
        .validate_instance(&Source::from_path(&instance))
        .unwrap();

    assert!(result.is_valid(), "problems: {:?}", result.problems());
}

#[test]
fn nonconformant_instance_reports_located_problems() {
    let dir = TempDir::new().unwrap();
    let schema = write_fixture(&dir, "person.xsd", PERSON_XSD);
    let instance = write_fixture(
        &dir,
        "person.xml",
        "<person>\n  <name>Ada</name>\n  <age>not-a-number</age>\n</person>",
    );

    let validator =
        Validator::for_language(W3C_XML_SCHEMA_NS_URI, vec![Source::from_path(&schema)]).unwrap();
    let result = validator
        .validate_instance(&Source::from_path(&instance))
        .unwrap();

    assert!(!result.is_valid());
    assert_eq!(result.problems().len(), 1);
    let problem = &result.problems()[0];
    assert_eq!(problem.severity(), Severity::Error);
    assert_eq!(problem.line(), 3);
    assert!(problem.message().contains("age") || problem.message().contains("int"));

    // Same pair, same report: determinism across repeated runs.
    let again = validator
        .validate_instance(&Source::from_path(&instance))
        .unwrap();
    assert_eq!(result, again);
}

#[test]
fn two_namespaced_sources_aggregate_into_one_context() {
    let dir = TempDir::new().unwrap();
    let books = write_fixture(
        &dir,
        "books.xsd",
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:test:books" elementFormDefault="qualified">
    <xs:element name="book" type="xs:string"/>
</xs:schema>"#,
    );
    let orders = write_fixture(
        &dir,
        "orders.xsd",
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:test:orders" elementFormDefault="qualified">
    <xs:element name="order" type="xs:string"/>
</xs:schema>"#,
    );

    let validator = Validator::for_language(
        W3C_XML_SCHEMA_NS_URI,
        vec![Source::from_path(&books), Source::from_path(&orders)],
    )
    .unwrap();

    let book = validator
        .validate_instance(&Source::from(r#"<book xmlns="urn:test:books">Dune</book>"#))
        .unwrap();
    assert!(book.is_valid(), "problems: {:?}", book.problems());

    let order = validator
        .validate_instance(&Source::from(r#"<order xmlns="urn:test:orders">42</order>"#))
        .unwrap();
    assert!(order.is_valid(), "problems: {:?}", order.problems());

    let wrong = validator
        .validate_instance(&Source::from(
            r#"<book xmlns="urn:test:books"><child/></book>"#,
        ))
        .unwrap();
    assert!(!wrong.is_valid());
}

#[test]
fn unreadable_source_among_two_fails_before_validation() {
    let dir = TempDir::new().unwrap();
    let good = write_fixture(&dir, "person.xsd", PERSON_XSD);
    let missing = dir.path().join("does-not-exist.xsd");

    let validator = Validator::for_language(
        W3C_XML_SCHEMA_NS_URI,
        vec![Source::from_path(&good), Source::from_path(&missing)],
    )
    .unwrap();

    let err = validator
        .validate_instance(&Source::from("<person><name>Ada</name><age>1</age></person>"))
        .unwrap_err();
    assert!(matches!(err, EngineError::SchemaUnreadable { .. }));
}

#[test]
fn identity_constraints_are_enforced() {
    let schema = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="db">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="rec" maxOccurs="unbounded">
                    <xs:complexType>
                        <xs:attribute name="id" type="xs:string" use="required"/>
                    </xs:complexType>
                </xs:element>
            </xs:sequence>
        </xs:complexType>
        <xs:unique name="rec-id">
            <xs:selector xpath="rec"/>
            <xs:field xpath="@id"/>
        </xs:unique>
    </xs:element>
</xs:schema>"#;

    let validator = Validator::for_language(
        W3C_XML_SCHEMA_NS_URI,
        vec![Source::from_bytes(schema.as_bytes().to_vec())],
    )
    .unwrap();

    let unique = validator
        .validate_instance(&Source::from(r#"<db><rec id="1"/><rec id="2"/></db>"#))
        .unwrap();
    assert!(unique.is_valid(), "problems: {:?}", unique.problems());

    let duplicated = validator
        .validate_instance(&Source::from(r#"<db><rec id="1"/><rec id="1"/></db>"#))
        .unwrap();
    assert!(!duplicated.is_valid());
}

#[test]
fn dtd_file_source_end_to_end() {
    let dir = TempDir::new().unwrap();
    let dtd = write_fixture(
        &dir,
        "note.dtd",
        "<!ELEMENT note (to, body)>\n<!ELEMENT to (#PCDATA)>\n<!ELEMENT body (#PCDATA)>\n",
    );

    let validator =
        Validator::for_language(XML_DTD_NS_URI, vec![Source::from_path(&dtd)]).unwrap();

    let valid = validator
        .validate_instance(&Source::from("<note><to>Bob</to><body>hi</body></note>"))
        .unwrap();
    assert!(valid.is_valid(), "problems: {:?}", valid.problems());

    let invalid = validator
        .validate_instance(&Source::from("<note><body>hi</body></note>"))
        .unwrap();
    assert!(!invalid.is_valid());
}

#[test]
fn parsed_schema_wins_over_source_list() {
    let dir = TempDir::new().unwrap();
    let schema_file = write_fixture(&dir, "person.xsd", PERSON_XSD);

    let parsed =
        ParsedSchema::compile(W3C_XML_SCHEMA_NS_URI, &Source::from_path(&schema_file)).unwrap();
    let validator = Validator::new(
        W3C_XML_SCHEMA_NS_URI,
        SchemaSet::from_parsed_and_sources(
            parsed,
            vec![Source::from_path(dir.path().join("never-read.xsd"))],
        ),
    )
    .unwrap();

    // The bogus source list is never consulted.
    let result = validator
        .validate_instance(&Source::from("<person><name>Ada</name><age>1</age></person>"))
        .unwrap();
    assert!(result.is_valid(), "problems: {:?}", result.problems());
}

#[test]
fn matcher_renders_schema_paths_and_problems() {
    let dir = TempDir::new().unwrap();
    let schema = write_fixture(&dir, "person.xsd", PERSON_XSD);

    let mut matcher =
        ConformsToSchema::new(W3C_XML_SCHEMA_NS_URI, vec![Source::from_path(&schema)]).unwrap();

    assert!(
        matcher
            .matches(&Source::from("<person><name>Ada</name><age>1</age></person>"))
            .unwrap()
    );

    assert!(!matcher.matches(&Source::from("<person/>")).unwrap());
    let description = matcher.describe();
    assert!(description.contains(&schema.display().to_string()));
    assert!(description.contains("but found these problems: "));
}

#[test]
fn report_serializes_for_tooling() {
    let dir = TempDir::new().unwrap();
    let schema = write_fixture(&dir, "person.xsd", PERSON_XSD);

    let validator =
        Validator::for_language(W3C_XML_SCHEMA_NS_URI, vec![Source::from_path(&schema)]).unwrap();
    let result = validator
        .validate_instance(&Source::from("<person><name>Ada</name></person>"))
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["valid"], serde_json::json!(false));
    assert!(json["problems"].as_array().unwrap().len() >= 1);
    assert_eq!(json["problems"][0]["severity"], "error");
}

#[test]
fn schema_only_validation_over_files() {
    let dir = TempDir::new().unwrap();
    let broken = write_fixture(
        &dir,
        "broken.xsd",
        r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root" type="MissingType"/>
</xs:schema>"#,
    );
    let sound = write_fixture(&dir, "person.xsd", PERSON_XSD);

    let validator = Validator::for_language(
        W3C_XML_SCHEMA_NS_URI,
        vec![Source::from_path(&sound), Source::from_path(&broken)],
    )
    .unwrap();

    let report = validator.validate_schema().unwrap();
    assert!(!report.is_valid());
    assert!(!report.problems().is_empty());
}
