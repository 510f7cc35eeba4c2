//! YAML input loading
//!
//! Compile configs and inventories are parsed with yaml-rust2 and lowered to
//! `serde_json::Value` before typed deserialization, so JSON input (a YAML
//! subset) goes through the same path.

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

use crate::{Error, Result};

/// Parse the first YAML document in `input` into a JSON value.
///
/// Empty input yields `Value::Null`.
pub fn load_document(input: &str) -> Result<Value> {
    let docs = YamlLoader::load_from_str(input)
        .map_err(|e| Error::serialization_for("yaml", e.to_string()))?;
    docs.into_iter()
        .next()
        .map_or(Ok(Value::Null), to_json)
}

/// Parse every `---`-separated document in `input`.
pub fn load_documents(input: &str) -> Result<Vec<Value>> {
    let docs = YamlLoader::load_from_str(input)
        .map_err(|e| Error::serialization_for("yaml", e.to_string()))?;
    docs.into_iter().map(to_json).collect()
}

/// Parse `input` and deserialize it into `T`.
///
/// `kind` names the document in error messages (e.g. "compile config").
pub fn from_yaml_str<T: DeserializeOwned>(input: &str, kind: &str) -> Result<T> {
    let value = load_document(input)?;
    if value.is_null() {
        return Err(Error::serialization_for(kind, "document is empty"));
    }
    serde_json::from_value(value).map_err(|e| Error::serialization_for(kind, e.to_string()))
}

fn to_json(yaml: Yaml) -> Result<Value> {
    let value = match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::Number(i.into()),
        Yaml::Real(raw) => {
            let parsed: f64 = raw
                .parse()
                .map_err(|_| Error::serialization_for("yaml", format!("invalid float '{raw}'")))?;
            Number::from_f64(parsed).map_or(Value::Null, Value::Number)
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => Value::Array(items.into_iter().map(to_json).collect::<Result<_>>()?),
        Yaml::Hash(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(key_to_string(key)?, to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Alias(_) => {
            return Err(Error::serialization_for("yaml", "aliases are not supported"))
        }
        Yaml::BadValue => return Err(Error::serialization_for("yaml", "bad value")),
    };
    Ok(value)
}

// Env var names like `ENABLE_METRICS` are strings, but a bare `true:` or `3:`
// key is legal YAML and should still land as a map key.
fn key_to_string(key: Yaml) -> Result<String> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        _ => Err(Error::serialization_for("yaml", "unsupported key type")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_load_service_document() {
        let yaml = r#"
service:
  name: price-pusher
  cluster: backend
  secrets:
    - MNEMONIC
  sizing:
    cpu: 1024
    memoryMib: 2048
"#;
        let doc = load_document(yaml).unwrap();
        assert_eq!(doc["service"]["name"], "price-pusher");
        assert_eq!(doc["service"]["secrets"][0], "MNEMONIC");
        assert_eq!(doc["service"]["sizing"]["memoryMib"], 2048);
    }

    #[test]
    fn test_load_json_input() {
        let doc = load_document(r#"{"name": "price-pusher", "replicas": 1}"#).unwrap();
        assert_eq!(doc["name"], "price-pusher");
        assert_eq!(doc["replicas"], 1);
    }

    #[test]
    fn test_load_documents_splits_on_separator() {
        let docs = load_documents("id: vpc-a\n---\nid: vpc-b\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["id"], "vpc-b");
    }

    #[test]
    fn test_empty_input_is_null() {
        assert_eq!(load_document("").unwrap(), Value::Null);
    }

    #[test]
    fn test_invalid_yaml_is_serialization_error() {
        let err = load_document("not: valid: yaml: {{").unwrap_err();
        assert_eq!(err.kind(), "Serialization");
    }

    #[test]
    fn test_non_string_keys_become_strings() {
        let doc = load_document("3: three\ntrue: yes").unwrap();
        assert_eq!(doc["3"], "three");
        assert_eq!(doc["true"], "yes");
    }

    #[test]
    fn test_float_values() {
        let doc = load_document("ratio: 0.5").unwrap();
        let ratio = doc["ratio"].as_f64().unwrap();
        assert!((ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_yaml_str_typed() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Subnet {
            id: String,
            zone: String,
        }

        let subnet: Subnet = from_yaml_str("id: subnet-1\nzone: eu-west-1a", "subnet").unwrap();
        assert_eq!(
            subnet,
            Subnet {
                id: "subnet-1".to_string(),
                zone: "eu-west-1a".to_string()
            }
        );
    }

    #[test]
    fn test_from_yaml_str_empty_document_names_kind() {
        #[derive(Deserialize, Debug)]
        struct Anything {
            _x: u8,
        }

        let err = from_yaml_str::<Anything>("", "compile config").unwrap_err();
        match err {
            Error::Serialization { kind, .. } => assert_eq!(kind.as_deref(), Some("compile config")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
