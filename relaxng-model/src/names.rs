use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub namespace_uri: String,
    pub local_name: String,
}

impl QualifiedName {
    pub fn new(namespace_uri: &str, local_name: &str) -> QualifiedName {
        QualifiedName {
            namespace_uri: namespace_uri.to_string(),
            local_name: local_name.to_string(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            f.write_str(&self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_name)
        }
    }
}

/// Namespace pseudo-entry reported by [`NameClass::namespaces()`] when any namespace may match
pub const ANY_NAMESPACE: &str = "*";
/// Namespace pseudo-entry reported by [`NameClass::namespaces()`] when some names are excluded
pub const EXCEPT_NAMESPACE: &str = "::except";

/// The set of names an element or attribute pattern may have.
///
/// The `except` of an `NsName` may only contain `Named` (or `Alt` of `Named`) values, and the
/// `except` of an `AnyName` may not contain `AnyName`.  The operations here panic when given
/// values breaking those rules.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NameClass {
    Named {
        namespace_uri: String,
        name: String,
    },
    NsName {
        namespace_uri: String,
        except: Option<Box<NameClass>>,
    },
    AnyName {
        except: Option<Box<NameClass>>,
    },
    Alt {
        a: Box<NameClass>,
        b: Box<NameClass>,
    },
}

impl NameClass {
    pub fn named(namespace_uri: &str, name: &str) -> NameClass {
        NameClass::Named {
            namespace_uri: namespace_uri.to_string(),
            name: name.to_string(),
        }
    }

    pub fn ns_name(namespace_uri: &str, except: Option<NameClass>) -> NameClass {
        NameClass::NsName {
            namespace_uri: namespace_uri.to_string(),
            except: except.map(Box::new),
        }
    }

    pub fn any_name(except: Option<NameClass>) -> NameClass {
        NameClass::AnyName {
            except: except.map(Box::new),
        }
    }

    pub fn alt(a: NameClass, b: NameClass) -> NameClass {
        NameClass::Alt {
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    pub fn matches(&self, namespace_uri: &str, local_name: &str) -> bool {
        match self {
            NameClass::Named {
                namespace_uri: ns,
                name,
            } => ns == namespace_uri && name == local_name,
            NameClass::NsName {
                namespace_uri: ns,
                except,
            } => {
                ns == namespace_uri
                    && !except
                        .as_ref()
                        .map(|e| e.matches(namespace_uri, local_name))
                        .unwrap_or(false)
            }
            NameClass::AnyName { except } => !except
                .as_ref()
                .map(|e| e.matches(namespace_uri, local_name))
                .unwrap_or(false),
            NameClass::Alt { a, b } => {
                a.matches(namespace_uri, local_name) || b.matches(namespace_uri, local_name)
            }
        }
    }

    pub fn matches_name(&self, name: &QualifiedName) -> bool {
        self.matches(&name.namespace_uri, &name.local_name)
    }

    fn matches_exactly(&self, namespace_uri: &str, local_name: &str) -> bool {
        match self {
            NameClass::Named {
                namespace_uri: ns,
                name,
            } => ns == namespace_uri && name == local_name,
            NameClass::NsName { .. } | NameClass::AnyName { .. } => false,
            NameClass::Alt { a, b } => {
                a.matches_exactly(namespace_uri, local_name)
                    || b.matches_exactly(namespace_uri, local_name)
            }
        }
    }

    /// True when the name is matched, but only by way of a wildcard (`NsName` or `AnyName`)
    pub fn wildcard_matches(&self, namespace_uri: &str, local_name: &str) -> bool {
        self.matches(namespace_uri, local_name)
            && !self.matches_exactly(namespace_uri, local_name)
    }

    /// True if the name class consists only of `Named` values (possibly within `Alt`)
    pub fn simple(&self) -> bool {
        match self {
            NameClass::Named { .. } => true,
            NameClass::NsName { .. } | NameClass::AnyName { .. } => false,
            NameClass::Alt { a, b } => a.simple() && b.simple(),
        }
    }

    /// The names matched, or `None` if the name class is not [simple](Self::simple)
    pub fn to_array(&self) -> Option<Vec<QualifiedName>> {
        let mut result = vec![];
        if self.collect_names(&mut result) {
            Some(result)
        } else {
            None
        }
    }

    fn collect_names(&self, result: &mut Vec<QualifiedName>) -> bool {
        match self {
            NameClass::Named {
                namespace_uri,
                name,
            } => {
                result.push(QualifiedName::new(namespace_uri, name));
                true
            }
            NameClass::NsName { .. } | NameClass::AnyName { .. } => false,
            NameClass::Alt { a, b } => a.collect_names(result) && b.collect_names(result),
        }
    }

    /// The namespaces this name class refers to, including [`ANY_NAMESPACE`] for `AnyName` and
    /// [`EXCEPT_NAMESPACE`] when an except clause is present
    pub fn namespaces(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        self.collect_namespaces(&mut result);
        result
    }

    fn collect_namespaces(&self, result: &mut BTreeSet<String>) {
        match self {
            NameClass::Named { namespace_uri, .. } => {
                result.insert(namespace_uri.clone());
            }
            NameClass::NsName {
                namespace_uri,
                except,
            } => {
                result.insert(namespace_uri.clone());
                if except.is_some() {
                    result.insert(EXCEPT_NAMESPACE.to_string());
                }
            }
            NameClass::AnyName { except } => {
                result.insert(ANY_NAMESPACE.to_string());
                if except.is_some() {
                    result.insert(EXCEPT_NAMESPACE.to_string());
                }
            }
            NameClass::Alt { a, b } => {
                a.collect_namespaces(result);
                b.collect_namespaces(result);
            }
        }
    }

    pub fn intersects(&self, other: &NameClass) -> bool {
        self.intersection(other).is_some()
    }

    /// The name class matching names matched by both, or `None` when no name is matched by both
    pub fn intersection(&self, other: &NameClass) -> Option<NameClass> {
        match (self, other) {
            (NameClass::Alt { a, b }, _) => union(a.intersection(other), b.intersection(other)),
            (_, NameClass::Alt { a, b }) => union(self.intersection(a), self.intersection(b)),
            (
                NameClass::Named {
                    namespace_uri,
                    name,
                },
                _,
            ) => {
                if other.matches(namespace_uri, name) {
                    Some(self.clone())
                } else {
                    None
                }
            }
            (
                _,
                NameClass::Named {
                    namespace_uri,
                    name,
                },
            ) => {
                if self.matches(namespace_uri, name) {
                    Some(other.clone())
                } else {
                    None
                }
            }
            (
                NameClass::NsName {
                    namespace_uri: ns1,
                    except: e1,
                },
                NameClass::NsName {
                    namespace_uri: ns2,
                    except: e2,
                },
            ) => {
                if ns1 == ns2 {
                    Some(NameClass::NsName {
                        namespace_uri: ns1.clone(),
                        except: union_except(e1, e2),
                    })
                } else {
                    None
                }
            }
            (NameClass::NsName { .. }, NameClass::AnyName { except }) => {
                intersect_any_name(self, except)
            }
            (NameClass::AnyName { except }, NameClass::NsName { .. }) => {
                intersect_any_name(other, except)
            }
            (NameClass::AnyName { except: e1 }, NameClass::AnyName { except: e2 }) => {
                Some(NameClass::AnyName {
                    except: union_except(e1, e2),
                })
            }
        }
    }

    /// The names matched by `self` but not by `other`, or `None` when nothing remains.
    ///
    /// Panics if `other` is, or contains, an `AnyName`.
    pub fn subtract(&self, other: &NameClass) -> Option<NameClass> {
        if let NameClass::AnyName { .. } = other {
            panic!("cannot subtract anyName from a name class");
        }
        match self {
            NameClass::Named {
                namespace_uri,
                name,
            } => {
                if other.matches(namespace_uri, name) {
                    None
                } else {
                    Some(self.clone())
                }
            }
            NameClass::Alt { a, b } => union(a.subtract(other), b.subtract(other)),
            NameClass::NsName {
                namespace_uri,
                except,
            } => match other {
                NameClass::Named {
                    namespace_uri: ns,
                    name,
                } => {
                    if ns != namespace_uri || !self.matches(ns, name) {
                        Some(self.clone())
                    } else {
                        Some(NameClass::NsName {
                            namespace_uri: namespace_uri.clone(),
                            except: union_except(except, &Some(Box::new(other.clone()))),
                        })
                    }
                }
                NameClass::NsName {
                    namespace_uri: ns,
                    except: other_except,
                } => {
                    if ns != namespace_uri {
                        return Some(self.clone());
                    }
                    // what is left are the names the other nsName excludes, and we do not
                    match other_except {
                        None => None,
                        Some(e) => e.filter_names(&|ns, name| {
                            ns == namespace_uri
                                && !except
                                    .as_ref()
                                    .map(|ex| ex.matches(ns, name))
                                    .unwrap_or(false)
                        }),
                    }
                }
                NameClass::Alt { a, b } => self.subtract(a).and_then(|rest| rest.subtract(b)),
                NameClass::AnyName { .. } => unreachable!(),
            },
            NameClass::AnyName { except } => Some(NameClass::AnyName {
                except: union_except(except, &Some(Box::new(other.clone()))),
            }),
        }
    }

    fn filter_names(&self, pred: &dyn Fn(&str, &str) -> bool) -> Option<NameClass> {
        match self {
            NameClass::Named {
                namespace_uri,
                name,
            } => {
                if pred(namespace_uri, name) {
                    Some(self.clone())
                } else {
                    None
                }
            }
            NameClass::Alt { a, b } => union(a.filter_names(pred), b.filter_names(pred)),
            _ => panic!("the except of an nsName may only contain names: {}", self),
        }
    }

    /// A short description for use in diagnostics
    pub fn describe(&self) -> String {
        match self {
            NameClass::Named {
                namespace_uri,
                name,
            } => {
                if namespace_uri.is_empty() {
                    name.clone()
                } else {
                    format!("{{{}}}{}", namespace_uri, name)
                }
            }
            NameClass::NsName {
                namespace_uri,
                except,
            } => match except {
                Some(e) => format!("{{{}}}* - ({})", namespace_uri, e.describe()),
                None => format!("{{{}}}*", namespace_uri),
            },
            NameClass::AnyName { except } => match except {
                Some(e) => format!("* - ({})", e.describe()),
                None => "*".to_string(),
            },
            NameClass::Alt { a, b } => format!("{} | {}", a.describe(), b.describe()),
        }
    }
}

fn intersect_any_name(ns_name: &NameClass, any_except: &Option<Box<NameClass>>) -> Option<NameClass> {
    match any_except {
        None => Some(ns_name.clone()),
        Some(e) => ns_name.subtract(e),
    }
}

/// Combines two optional name classes into their union
pub fn union(a: Option<NameClass>, b: Option<NameClass>) -> Option<NameClass> {
    match (a, b) {
        (Some(a), Some(b)) => Some(NameClass::alt(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

fn union_except(
    a: &Option<Box<NameClass>>,
    b: &Option<Box<NameClass>>,
) -> Option<Box<NameClass>> {
    union(a.as_deref().cloned(), b.as_deref().cloned()).map(Box::new)
}

fn json_str(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str(&serde_json::Value::String(s.to_string()).to_string())
}

/// The canonical string form, a JSON object with a fixed key order
impl fmt::Display for NameClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameClass::Named {
                namespace_uri,
                name,
            } => {
                f.write_str("{\"ns\":")?;
                json_str(f, namespace_uri)?;
                f.write_str(",\"name\":")?;
                json_str(f, name)?;
                f.write_str("}")
            }
            NameClass::NsName {
                namespace_uri,
                except,
            } => {
                f.write_str("{\"ns\":")?;
                json_str(f, namespace_uri)?;
                if let Some(e) = except {
                    write!(f, ",\"except\":{}", e)?;
                }
                f.write_str("}")
            }
            NameClass::AnyName { except } => {
                f.write_str("{\"pattern\":\"AnyName\"")?;
                if let Some(e) = except {
                    write!(f, ",\"except\":{}", e)?;
                }
                f.write_str("}")
            }
            NameClass::Alt { a, b } => write!(f, "{{\"a\":{},\"b\":{}}}", a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn samples() -> Vec<NameClass> {
        vec![
            NameClass::named("", "a"),
            NameClass::named("urn:x", "a"),
            NameClass::ns_name("urn:x", None),
            NameClass::ns_name("urn:x", Some(NameClass::named("urn:x", "a"))),
            NameClass::any_name(None),
            NameClass::any_name(Some(NameClass::ns_name("urn:x", None))),
            NameClass::any_name(Some(NameClass::named("", "b"))),
            NameClass::alt(NameClass::named("", "a"), NameClass::named("", "b")),
        ]
    }

    fn probes() -> Vec<(&'static str, &'static str)> {
        vec![
            ("", "a"),
            ("", "b"),
            ("", "c"),
            ("urn:x", "a"),
            ("urn:x", "b"),
            ("urn:y", "a"),
        ]
    }

    #[test]
    fn intersection_is_symmetric() {
        for x in samples() {
            for y in samples() {
                assert_eq!(x.intersects(&y), y.intersects(&x), "{} / {}", x, y);
            }
        }
    }

    #[test]
    fn intersection_agrees_with_matching() {
        for x in samples() {
            for y in samples() {
                let both = x.intersection(&y);
                for (ns, local) in probes() {
                    let expected = x.matches(ns, local) && y.matches(ns, local);
                    let actual = both.as_ref().map(|b| b.matches(ns, local)).unwrap_or(false);
                    assert_eq!(expected, actual, "{} ∩ {} on {{{}}}{}", x, y, ns, local);
                }
            }
        }
    }

    #[test]
    fn subtraction_agrees_with_matching() {
        let left = NameClass::ns_name("urn:x", Some(NameClass::named("urn:x", "a")));
        let rights = vec![
            NameClass::named("urn:x", "b"),
            NameClass::named("urn:y", "b"),
            NameClass::ns_name("urn:x", Some(NameClass::named("urn:x", "b"))),
            NameClass::ns_name("urn:y", None),
        ];
        for right in rights {
            let rest = left.subtract(&right);
            for (ns, local) in probes() {
                let expected = left.matches(ns, local) && !right.matches(ns, local);
                let actual = rest.as_ref().map(|r| r.matches(ns, local)).unwrap_or(false);
                assert_eq!(expected, actual, "{} - {} on {{{}}}{}", left, right, ns, local);
            }
        }
    }

    #[test]
    fn name_intersection_is_equality() {
        let a = NameClass::named("", "a");
        assert_eq!(a.intersection(&NameClass::named("", "a")), Some(a.clone()));
        assert_eq!(a.intersection(&NameClass::named("urn:x", "a")), None);
    }

    #[test]
    fn wildcard() {
        let nc = NameClass::alt(NameClass::named("", "a"), NameClass::any_name(None));
        assert!(!nc.wildcard_matches("", "a"));
        assert!(nc.wildcard_matches("", "z"));
        assert!(!NameClass::named("", "a").wildcard_matches("", "a"));
    }

    #[test]
    #[should_panic]
    fn subtract_any_name_panics() {
        NameClass::ns_name("", None).subtract(&NameClass::any_name(None));
    }

    #[test]
    fn simple_names() {
        let nc = NameClass::alt(NameClass::named("", "a"), NameClass::named("urn:x", "b"));
        assert!(nc.simple());
        assert_matches!(nc.to_array(), Some(ref v) if v.len() == 2);
        assert_matches!(NameClass::any_name(None).to_array(), None);
    }

    #[test]
    fn namespace_sentinels() {
        let nc = NameClass::alt(
            NameClass::any_name(Some(NameClass::named("urn:x", "a"))),
            NameClass::named("urn:y", "b"),
        );
        let ns: Vec<_> = nc.namespaces().into_iter().collect();
        assert_eq!(ns, vec!["*", "::except", "urn:y"]);
    }

    #[test]
    fn canonical_form() {
        let nc = NameClass::alt(
            NameClass::named("", "a"),
            NameClass::ns_name("urn:\"x\"", None),
        );
        assert_eq!(
            nc.to_string(),
            r#"{"a":{"ns":"","name":"a"},"b":{"ns":"urn:\"x\""}}"#
        );
        assert_eq!(nc.to_string(), nc.clone().to_string());
    }
}
