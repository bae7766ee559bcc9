//! Parsing of the JSON arguments taken by `check` and `search`

use anyhow::{Context, Result};
use postern_access::{CatalogRequest, IdentityAttribute};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Deserialize)]
#[serde(untagged)]
enum AttributesInput {
    /// `[{"key": "sub", "value": "u1"}, ...]`
    List(Vec<IdentityAttribute>),
    /// `{"sub": "u1", "role": ["DomainManagement"]}`
    Map(BTreeMap<String, AttributeValue>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AttributeValue {
    One(String),
    Many(Vec<String>),
}

/// Inline JSON, or `@path` to read it from a file
pub fn read_json_arg(raw: &str) -> Result<String> {
    match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON from {}", path)),
        None => Ok(raw.to_string()),
    }
}

pub fn parse_attributes(raw: &str) -> Result<Vec<IdentityAttribute>> {
    let json = read_json_arg(raw)?;
    let input: AttributesInput =
        serde_json::from_str(&json).context("Attributes must be a list of {key, value} or an object")?;

    Ok(match input {
        AttributesInput::List(list) => list,
        AttributesInput::Map(map) => map
            .into_iter()
            .flat_map(|(key, value)| {
                let values = match value {
                    AttributeValue::One(v) => vec![v],
                    AttributeValue::Many(vs) => vs,
                };
                values
                    .into_iter()
                    .map(move |v| IdentityAttribute::new(key.clone(), v))
            })
            .collect(),
    })
}

pub fn parse_request(raw: &str) -> Result<CatalogRequest> {
    let json = read_json_arg(raw)?;
    serde_json::from_str(&json).context("Request must be a tagged object, e.g. {\"type\": \"GetDomain\", ...}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use postern_access::ActorDescriptor;
    use std::io::Write;

    #[test]
    fn object_form_expands_repeated_keys() {
        let attrs = parse_attributes(
            r#"{"sub": "u1", "role": ["DomainManagement", "UserManagement"]}"#,
        )
        .unwrap();
        assert_eq!(attrs.len(), 3);

        let actor = ActorDescriptor::from_attribute_list(&attrs);
        assert_eq!(actor.user_id().as_str(), "u1");
        assert!(actor.is_domain_admin());
    }

    #[test]
    fn list_form_is_taken_verbatim() {
        let attrs = parse_attributes(r#"[{"key": "sub", "value": "u2"}]"#).unwrap();
        assert_eq!(attrs, vec![IdentityAttribute::new("sub", "u2")]);
    }

    #[test]
    fn malformed_attributes_are_rejected() {
        assert!(parse_attributes("42").is_err());
        assert!(parse_attributes("{not json").is_err());
    }

    #[test]
    fn requests_parse_by_type_tag() {
        let request = parse_request(
            r#"{"type": "GetDomain", "domain_id": "6f1c1d0e-1111-4a4a-9b9b-000000000001"}"#,
        )
        .unwrap();
        assert_eq!(request.name(), "GetDomain");

        assert!(parse_request(r#"{"type": "Nope"}"#).is_err());
    }

    #[test]
    fn at_prefix_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sub": "from-file"}}"#).unwrap();

        let arg = format!("@{}", file.path().display());
        let attrs = parse_attributes(&arg).unwrap();
        assert_eq!(attrs, vec![IdentityAttribute::new("sub", "from-file")]);
    }
}
