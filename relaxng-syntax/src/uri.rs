use url::Url;

/// Checks the value of a `datatypeLibrary` attribute, returning a description of the problem
/// when it is not acceptable.
///
/// The empty string is allowed, and names the built-in Relax NG library.
pub fn check_datatype_library(val: &str) -> Result<(), &'static str> {
    if val.is_empty() {
        return Ok(());
    }
    if !rfc2396::validate(val) {
        return Err("Datatype library URI is invalid");
    }
    match Url::parse(val) {
        Ok(url) => {
            if url.fragment().is_some() {
                Err("Datatype library URI must not include a fragment identifier")
            } else {
                Ok(())
            }
        }
        Err(_) => Err("Invalid datatype library URI"),
    }
}

#[derive(Debug, PartialEq)]
pub enum HrefError {
    Fragment,
    Invalid(url::ParseError),
}

/// Resolves an `href` against the document URL, after first applying any `xml:base` values
/// found on the referring element and its ancestors (given outermost first)
pub fn resolve_href(document: &Url, bases: &[&str], href: &str) -> Result<Url, HrefError> {
    let mut base = document.clone();
    for b in bases {
        base = base.join(b.trim()).map_err(HrefError::Invalid)?;
    }
    let href = href.trim();
    if href.contains('#') {
        return Err(HrefError::Fragment);
    }
    base.join(href).map_err(HrefError::Invalid)
}
