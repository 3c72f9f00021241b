use assert_matches::assert_matches;
use relaxng_model::datatype::DefaultNameResolver;
use relaxng_model::names::{NameClass, QualifiedName};
use relaxng_model::{Compiler, CompilerOptions, RelaxError, Resource, ResourceLoader, Schema};
use relaxng_validator::{Event, Expected, GrammarWalker, ValidationError, Validator, ValidatorError};
use std::collections::{HashMap, HashSet};
use std::io;
use url::Url;

struct FS(HashMap<&'static str, &'static str>);

impl ResourceLoader for FS {
    fn load(&self, url: &Url) -> Result<Resource, RelaxError> {
        match self.0.get(url.path()) {
            Some(text) => Ok(Resource::new(url.clone(), text.to_string())),
            None => Err(RelaxError::Io(
                url.clone(),
                io::Error::from(io::ErrorKind::NotFound),
            )),
        }
    }
}

fn url(path: &str) -> Url {
    Url::parse("mem:/").unwrap().join(path).unwrap()
}

fn compile_all(files: &[(&'static str, &'static str)]) -> Result<Schema, RelaxError> {
    let fs = FS(files.iter().copied().collect());
    let mut c = Compiler::new(fs, CompilerOptions::default());
    c.compile(&url("main.rng"))
}

fn compile(schema: &'static str) -> Schema {
    match compile_all(&[("/main.rng", schema)]) {
        Ok(s) => s,
        Err(e) => panic!("{e:?}"),
    }
}

/// The validation errors found in `doc`, in document order
fn errors(schema: &Schema, doc: &str) -> Vec<ValidationError> {
    let mut v = Validator::new(&schema.grammar, xmlparser::Tokenizer::from(doc));
    let mut result = vec![];
    while let Some(r) = v.validate_next() {
        match r {
            Ok(()) => {}
            Err(ValidatorError::Invalid { errors, .. }) => result.extend(errors),
            Err(other) => panic!("{other:?}"),
        }
    }
    result
}

#[test]
fn empty_content() {
    let schema = compile(
        r#"<element name="e" xmlns="http://relaxng.org/ns/structure/1.0"><empty/></element>"#,
    );
    assert!(errors(&schema, "<e/>").is_empty());
    assert!(errors(&schema, "<e></e>").is_empty());
    assert!(errors(&schema, "<e>\n  </e>").is_empty());
    assert_eq!(
        errors(&schema, "<e>x</e>"),
        vec![ValidationError::Message {
            message: "text not allowed here".to_string()
        }]
    );
}

#[test]
fn whitespace_between_elements() {
    let schema = compile(
        r#"<element name="e" xmlns="http://relaxng.org/ns/structure/1.0">
             <element name="c"><empty/></element>
             <element name="d"><empty/></element>
           </element>"#,
    );
    assert!(errors(&schema, "<e><c/>   <d/></e>").is_empty());
    assert_eq!(
        errors(&schema, "<e><c/>X<d/></e>"),
        vec![ValidationError::Message {
            message: "text not allowed here".to_string()
        }]
    );
}

#[test]
fn choice_of_attributes() {
    let schema = compile(
        r#"<element name="e" xmlns="http://relaxng.org/ns/structure/1.0">
             <choice>
               <attribute name="a"/>
               <attribute name="b"/>
             </choice>
           </element>"#,
    );
    assert!(errors(&schema, r#"<e a="1"/>"#).is_empty());
    assert!(errors(&schema, r#"<e b="1"/>"#).is_empty());
    let errs = errors(&schema, "<e/>");
    assert_matches!(&errs[..], [ValidationError::Choice { names_a, names_b }] => {
        assert_eq!(names_a.len(), 1);
        assert_eq!(names_b.len(), 1);
        assert_eq!(names_a[0].describe(), "a");
        assert_eq!(names_b[0].describe(), "b");
    });
    assert_eq!(errs[0].to_string(), "must choose either a or b");

    assert_eq!(
        errors(&schema, r#"<e c="v"/>"#),
        vec![
            ValidationError::AttributeName {
                message: "attribute not allowed here".to_string(),
                name: NameClass::named("", "c"),
            },
            ValidationError::Choice {
                names_a: vec![NameClass::named("", "a")],
                names_b: vec![NameClass::named("", "b")],
            },
        ]
    );
}

#[test]
fn one_or_more() {
    let schema = compile(
        r#"<element name="list" xmlns="http://relaxng.org/ns/structure/1.0">
             <oneOrMore>
               <element name="item"><text/></element>
             </oneOrMore>
           </element>"#,
    );
    let errs = errors(&schema, "<list/>");
    assert_matches!(
        &errs[..],
        [ValidationError::ElementName { message, .. }] if message == "tag required"
    );
    assert!(errors(&schema, "<list><item/></list>").is_empty());
    assert!(errors(&schema, "<list><item>1</item><item>2</item></list>").is_empty());
    assert!(errors(&schema, "<list><item/><item/><item/><item/></list>").is_empty());
}

#[test]
fn unexpected_element_reports_what_was_expected() {
    let schema = compile(
        r#"<element name="doc" xmlns="http://relaxng.org/ns/structure/1.0">
             <element name="title"><text/></element>
           </element>"#,
    );
    let mut v = Validator::new(
        &schema.grammar,
        xmlparser::Tokenizer::from("<doc><para/></doc>"),
    );
    let mut first = None;
    while let Some(r) = v.validate_next() {
        if let Err(e) = r {
            first.get_or_insert(e);
        }
    }
    assert_matches!(first, Some(ValidatorError::Invalid { errors, expected, .. }) => {
        assert_eq!(errors[0].to_string(), "tag not allowed here: para");
        assert_matches!(&expected[..], [Expected::EnterStartTag(nc)] if nc.describe() == "title");
    });
}

#[test]
fn conflicting_parameters() {
    let result = compile_all(&[(
        "/main.rng",
        r#"<element name="n" xmlns="http://relaxng.org/ns/structure/1.0"
                    datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
             <data type="int">
               <param name="minInclusive">10</param>
               <param name="maxInclusive">5</param>
             </data>
           </element>"#,
    )]);
    assert_matches!(result, Err(RelaxError::ParameterError { error, .. }) => {
        assert_eq!(error.errors[0].message, "minInclusive conflicts with maxInclusive");
    });
}

#[test]
fn include_cycle() {
    let result = compile_all(&[
        (
            "/main.rng",
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
                 <include href="a.rng"/>
                 <start><element name="x"><empty/></element></start>
               </grammar>"#,
        ),
        (
            "/a.rng",
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><include href="b.rng"/></grammar>"#,
        ),
        (
            "/b.rng",
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><include href="a.rng"/></grammar>"#,
        ),
    ]);
    let err = match result {
        Err(e) => e,
        Ok(_) => panic!("include cycle not detected"),
    };
    // the loop is reported from within the include that closed it
    let mut inner = &err;
    while let RelaxError::IncludeError(_, e) = inner {
        inner = e;
    }
    assert_matches!(inner, RelaxError::IncludeLoop { chain, .. } => {
        let paths: Vec<&str> = chain.iter().map(Url::path).collect();
        assert_eq!(paths, vec!["/main.rng", "/a.rng", "/b.rng", "/a.rng"]);
    });
}

#[test]
fn repeated_validation_is_deterministic() {
    let schema = compile(
        r#"<element name="r" xmlns="http://relaxng.org/ns/structure/1.0">
             <interleave>
               <element name="a"><empty/></element>
               <element name="b"><text/></element>
             </interleave>
             <attribute name="id"/>
           </element>"#,
    );
    let doc = r#"<r><b>x</b><c/><a>y</a></r>"#;
    let first = errors(&schema, doc);
    assert!(!first.is_empty());
    for _ in 0..3 {
        assert_eq!(errors(&schema, doc), first);
    }
}

#[test]
fn possible_inside_start_tag_and_after_content() {
    let schema = compile(
        r#"<element name="e" xmlns="http://relaxng.org/ns/structure/1.0">
             <attribute name="a"/>
             <optional><attribute name="b"/></optional>
             <element name="x"><empty/></element>
             <zeroOrMore><element name="y"><empty/></element></zeroOrMore>
           </element>"#,
    );
    let resolver = DefaultNameResolver::default();
    let mut w = GrammarWalker::new(&schema.grammar);
    let set = |v: Vec<Expected>| v.into_iter().collect::<HashSet<_>>();
    let q = |local: &str| QualifiedName::new("", local);

    assert!(w.fire_event(Event::EnterStartTag(q("e")), &resolver).is_empty());
    // a is still required, so the start tag cannot close yet
    assert_eq!(
        set(w.possible()),
        set(vec![
            Expected::AttributeName(NameClass::named("", "a")),
            Expected::AttributeName(NameClass::named("", "b")),
        ])
    );
    assert!(w
        .fire_event(Event::AttributeNameAndValue(q("a"), "1".to_string()), &resolver)
        .is_empty());
    assert_eq!(
        set(w.possible()),
        set(vec![
            Expected::AttributeName(NameClass::named("", "b")),
            Expected::LeaveStartTag,
        ])
    );
    assert!(w.fire_event(Event::LeaveStartTag, &resolver).is_empty());
    assert_eq!(
        w.possible(),
        vec![Expected::EnterStartTag(NameClass::named("", "x"))]
    );

    for event in [
        Event::EnterStartTag(q("x")),
        Event::LeaveStartTag,
        Event::EndTag(q("x")),
    ] {
        assert!(w.fire_event(event, &resolver).is_empty());
    }
    assert_eq!(
        set(w.possible()),
        set(vec![
            Expected::EnterStartTag(NameClass::named("", "y")),
            Expected::EndTag(q("e")),
        ])
    );
    assert!(w.fire_event(Event::EndTag(q("e")), &resolver).is_empty());
    assert!(w.end().is_empty());
}

#[test]
fn qname_prefix_scope_ends_with_its_element() {
    let schema = compile(
        r#"<element name="r" xmlns="http://relaxng.org/ns/structure/1.0"
                    datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
             <element name="w">
               <element name="q"><data type="QName"/></element>
             </element>
             <element name="q"><data type="QName"/></element>
           </element>"#,
    );
    assert!(errors(
        &schema,
        r#"<r><w xmlns:p="urn:p"><q>p:x</q></w><q xmlns:p="urn:p">p:x</q></r>"#
    )
    .is_empty());
    // declared on w, so the second q cannot use it
    assert_eq!(
        errors(
            &schema,
            r#"<r><w xmlns:p="urn:p"><q>p:x</q></w><q>p:x</q></r>"#
        ),
        vec![
            ValidationError::Message {
                message: "text not allowed here".to_string()
            },
            ValidationError::Message {
                message: "QName value required".to_string()
            },
        ]
    );
}
