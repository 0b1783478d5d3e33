//! Typed rule parameters.
//!
//! Each rule declares its parameters once as [`ParamSpec`]s. Raw values from
//! configuration are checked against those declarations when a rule set is
//! bound, so handlers only ever see values of the declared type.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use sqlvet_core::RuleParamValue;

use crate::error::{RuleConfigError, RuleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Float,
    /// One of a fixed set of strings, matched case-insensitively.
    Enum(&'static [&'static str]),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Enum(values) => write!(f, "one of [{}]", values.join(", ")),
        }
    }
}

/// A parameter value that has passed type checking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Declaration of one rule parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub key: &'static str,
    pub desc: &'static str,
    pub kind: ParamType,
    /// Value used when configuration omits the key; `None` makes it required.
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    pub fn int(key: &'static str, desc: &'static str, default: i64) -> Self {
        Self {
            key,
            desc,
            kind: ParamType::Int,
            default: Some(ParamValue::Int(default)),
        }
    }

    pub fn float(key: &'static str, desc: &'static str, default: f64) -> Self {
        Self {
            key,
            desc,
            kind: ParamType::Float,
            default: Some(ParamValue::Float(default)),
        }
    }

    pub fn string(key: &'static str, desc: &'static str, default: &str) -> Self {
        Self {
            key,
            desc,
            kind: ParamType::String,
            default: Some(ParamValue::Text(default.to_string())),
        }
    }

    pub fn one_of(
        key: &'static str,
        desc: &'static str,
        values: &'static [&'static str],
        default: &str,
    ) -> Self {
        Self {
            key,
            desc,
            kind: ParamType::Enum(values),
            default: Some(ParamValue::Text(default.to_string())),
        }
    }

    /// Drop the default so configuration must supply the key.
    pub fn required(mut self) -> Self {
        self.default = None;
        self
    }

    /// Check a raw configured value against the declared type.
    pub fn coerce(&self, rule: &str, raw: &RuleParamValue) -> Result<ParamValue, RuleConfigError> {
        let invalid = || RuleConfigError::invalid_param(rule, self.key, self.kind.to_string(), raw);

        match (self.kind, raw) {
            (ParamType::String, RuleParamValue::Text(v)) => Ok(ParamValue::Text(v.clone())),
            (ParamType::String, other) => Ok(ParamValue::Text(other.to_string())),

            (ParamType::Int, RuleParamValue::Int(v)) => Ok(ParamValue::Int(*v)),
            (ParamType::Int, RuleParamValue::Text(v)) => v
                .trim()
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| invalid()),

            (ParamType::Float, RuleParamValue::Float(v)) => Ok(ParamValue::Float(*v)),
            (ParamType::Float, RuleParamValue::Int(v)) => Ok(ParamValue::Float(*v as f64)),
            (ParamType::Float, RuleParamValue::Text(v)) => v
                .trim()
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|_| invalid()),

            (ParamType::Enum(values), RuleParamValue::Text(v)) => values
                .iter()
                .find(|allowed| allowed.eq_ignore_ascii_case(v.trim()))
                .map(|allowed| ParamValue::Text(allowed.to_string()))
                .ok_or_else(invalid),

            _ => Err(invalid()),
        }
    }
}

/// Parameter values of one rule, resolved against its declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoundParams {
    values: BTreeMap<String, ParamValue>,
}

impl BoundParams {
    /// Resolve `raw` against `specs`: declared keys take the configured value
    /// or their default, undeclared keys are ignored.
    pub fn bind(
        rule: &str,
        specs: &[ParamSpec],
        raw: &BTreeMap<String, RuleParamValue>,
    ) -> Result<Self, RuleConfigError> {
        let mut values = BTreeMap::new();
        for spec in specs {
            let value = match raw.get(spec.key) {
                Some(raw) => Some(spec.coerce(rule, raw)?),
                None => spec.default.clone(),
            };
            if let Some(value) = value {
                values.insert(spec.key.to_string(), value);
            }
        }
        for key in raw.keys().filter(|k| !specs.iter().any(|s| s.key == k.as_str())) {
            tracing::debug!(rule = %rule, key = %key, "Ignoring undeclared rule parameter");
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64, RuleError> {
        match self.get(key) {
            Some(ParamValue::Int(v)) => Ok(*v),
            Some(_) => Err(RuleError::ParamType {
                key: key.to_string(),
                expected: "int",
            }),
            None => Err(RuleError::MissingParam(key.to_string())),
        }
    }

    pub fn get_float(&self, key: &str) -> Result<f64, RuleError> {
        match self.get(key) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(_) => Err(RuleError::ParamType {
                key: key.to_string(),
                expected: "float",
            }),
            None => Err(RuleError::MissingParam(key.to_string())),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str, RuleError> {
        match self.get(key) {
            Some(ParamValue::Text(v)) => Ok(v),
            Some(_) => Err(RuleError::ParamType {
                key: key.to_string(),
                expected: "string",
            }),
            None => Err(RuleError::MissingParam(key.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, RuleParamValue)]) -> BTreeMap<String, RuleParamValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_defaults_and_overrides() {
        let specs = [
            ParamSpec::int("max_length", "maximum name length", 64),
            ParamSpec::string("prefix", "required prefix", "uniq_"),
        ];
        let params = BoundParams::bind(
            "r",
            &specs,
            &raw(&[("max_length", RuleParamValue::Int(32))]),
        )
        .unwrap();

        assert_eq!(params.get_int("max_length").unwrap(), 32);
        assert_eq!(params.get_str("prefix").unwrap(), "uniq_");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let specs = [ParamSpec::int("max_count", "maximum index count", 5)];
        let params = BoundParams::bind(
            "r",
            &specs,
            &raw(&[("colour", RuleParamValue::Text("blue".into()))]),
        )
        .unwrap();
        assert!(params.get("colour").is_none());
        assert_eq!(params.get_int("max_count").unwrap(), 5);
    }

    #[test]
    fn test_type_mismatch_rejected_at_bind() {
        let specs = [ParamSpec::int("max_rows", "maximum affected rows", 10_000)];
        let err = BoundParams::bind(
            "dml_check_affected_rows",
            &specs,
            &raw(&[("max_rows", RuleParamValue::Text("lots".into()))]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_rows"));

        let ok = BoundParams::bind(
            "r",
            &specs,
            &raw(&[("max_rows", RuleParamValue::Text("200".into()))]),
        )
        .unwrap();
        assert_eq!(ok.get_int("max_rows").unwrap(), 200);
    }

    #[test]
    fn test_enum_matches_case_insensitively() {
        const ENGINES: &[&str] = &["InnoDB", "MyISAM"];
        let specs = [ParamSpec::one_of("engine", "storage engine", ENGINES, "InnoDB")];

        let params = BoundParams::bind(
            "r",
            &specs,
            &raw(&[("engine", RuleParamValue::Text("myisam".into()))]),
        )
        .unwrap();
        assert_eq!(params.get_str("engine").unwrap(), "MyISAM");

        assert!(
            BoundParams::bind(
                "r",
                &specs,
                &raw(&[("engine", RuleParamValue::Text("Aria".into()))]),
            )
            .is_err()
        );
    }

    #[test]
    fn test_missing_required_fails_on_read() {
        let specs = [ParamSpec::int("min_size", "threshold", 0).required()];
        let params = BoundParams::bind("r", &specs, &BTreeMap::new()).unwrap();
        assert!(matches!(
            params.get_int("min_size"),
            Err(RuleError::MissingParam(_))
        ));
    }

    #[test]
    fn test_float_accepts_int() {
        let specs = [ParamSpec::float("min_selectivity", "selectivity", 0.0)];
        let params = BoundParams::bind(
            "r",
            &specs,
            &raw(&[("min_selectivity", RuleParamValue::Int(1))]),
        )
        .unwrap();
        assert_eq!(params.get_float("min_selectivity").unwrap(), 1.0);
    }
}
