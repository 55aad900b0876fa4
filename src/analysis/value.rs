//! Canonical structural values produced by the node normalizers.
//!
//! A `NormalizedValue` is the language-neutral form of an argument or
//! receiver expression: literals become scalars, member paths become
//! dotted strings, collections keep their shape and calls become
//! `CallDescriptor`s that nest through their qualifier.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Named arguments in source order.
pub type Keywords = Vec<(String, NormalizedValue)>;

/// A literal leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Str(s) => serializer.serialize_str(s),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Null => serializer.serialize_unit(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => write!(f, "{}", s),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Null => write!(f, "null"),
        }
    }
}

/// Language-neutral value of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    Scalar(Scalar),
    Sequence(Vec<NormalizedValue>),
    /// Ordered key/value pairs. Keys may be any value, not only literals.
    Mapping(Vec<(NormalizedValue, NormalizedValue)>),
    Call(Box<CallDescriptor>),
}

impl NormalizedValue {
    /// A string scalar.
    pub fn str(s: impl Into<String>) -> Self {
        NormalizedValue::Scalar(Scalar::Str(s.into()))
    }

    /// The null scalar, used for unsupported elements inside collections.
    pub fn null() -> Self {
        NormalizedValue::Scalar(Scalar::Null)
    }

    /// The string content if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NormalizedValue::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// The call descriptor if this is a call.
    pub fn as_call(&self) -> Option<&CallDescriptor> {
        match self {
            NormalizedValue::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, NormalizedValue::Scalar(_))
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, NormalizedValue::Mapping(_))
    }

    /// String used when this value is a mapping key in serialized output.
    pub fn key_string(&self) -> String {
        match self.as_str() {
            Some(s) => s.to_string(),
            None => self.to_string(),
        }
    }

    /// Rewrite every call in this value into the requested chain layout.
    pub fn into_chain_style(self, style: ChainStyle) -> Self {
        match style {
            ChainStyle::Nested => self,
            ChainStyle::Trailing => self.into_trailing(),
        }
    }

    fn into_trailing(self) -> Self {
        match self {
            NormalizedValue::Scalar(_) => self,
            NormalizedValue::Sequence(items) => {
                NormalizedValue::Sequence(items.into_iter().map(Self::into_trailing).collect())
            }
            NormalizedValue::Mapping(pairs) => NormalizedValue::Mapping(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into_trailing(), v.into_trailing()))
                    .collect(),
            ),
            NormalizedValue::Call(call) => {
                NormalizedValue::Call(Box::new(call.into_trailing_form()))
            }
        }
    }
}

impl From<Scalar> for NormalizedValue {
    fn from(s: Scalar) -> Self {
        NormalizedValue::Scalar(s)
    }
}

impl Serialize for NormalizedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NormalizedValue::Scalar(s) => s.serialize(serializer),
            NormalizedValue::Sequence(items) => items.serialize(serializer),
            NormalizedValue::Mapping(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(&key.key_string(), value)?;
                }
                map.end()
            }
            NormalizedValue::Call(call) => call.serialize(serializer),
        }
    }
}

/// Best-effort string form, used when a member access sits on a non-scalar base.
impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Scalar(s) => write!(f, "{}", s),
            NormalizedValue::Sequence(items) => {
                write!(f, "[")?;
                write_joined(f, items.iter())?;
                write!(f, "]")
            }
            NormalizedValue::Mapping(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            NormalizedValue::Call(call) => write!(f, "{}", call),
        }
    }
}

/// Structural description of a call expression.
///
/// A fluent chain such as `a.b().c().d()` is represented with the receiver
/// call nested in `qualifier`: the descriptor for `d` has the descriptor
/// for `c` as its qualifier, and so on down to the non-call base `a`.
/// [`CallDescriptor::into_trailing_form`] converts that into the
/// head-call plus `trailing_calls` layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallDescriptor {
    /// The invoked operation; usually a string scalar.
    pub target: NormalizedValue,
    /// The receiver, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<NormalizedValue>,
    pub arguments: Vec<NormalizedValue>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_keywords"
    )]
    pub keywords: Option<Keywords>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_calls: Option<Vec<CallDescriptor>>,
}

impl CallDescriptor {
    /// A call with no receiver, arguments or keywords.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: NormalizedValue::str(target),
            qualifier: None,
            arguments: Vec::new(),
            keywords: None,
            trailing_calls: None,
        }
    }

    /// The target as a string, if it is one.
    pub fn target_name(&self) -> Option<&str> {
        self.target.as_str()
    }

    /// Number of calls nested through the qualifier chain below this one.
    pub fn qualifier_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.qualifier.as_ref();
        while let Some(NormalizedValue::Call(inner)) = current {
            depth += 1;
            current = inner.qualifier.as_ref();
        }
        depth
    }

    /// Convert a nested qualifier chain into its head call followed by the
    /// calls applied to it, in application order.
    pub fn into_trailing_form(self) -> CallDescriptor {
        let mut outer = Vec::new();
        let mut current = self;
        loop {
            match current.qualifier.take() {
                Some(NormalizedValue::Call(inner)) => {
                    outer.push(current);
                    current = *inner;
                }
                other => {
                    current.qualifier = other.map(NormalizedValue::into_trailing);
                    break;
                }
            }
        }

        let mut head = current.with_trailing_arguments();
        if outer.is_empty() {
            return head;
        }

        let mut trailing = head.trailing_calls.take().unwrap_or_default();
        trailing.extend(outer.into_iter().rev().map(|c| c.with_trailing_arguments()));
        head.trailing_calls = Some(trailing);
        head
    }

    fn with_trailing_arguments(mut self) -> Self {
        self.arguments = self
            .arguments
            .into_iter()
            .map(NormalizedValue::into_trailing)
            .collect();
        self.keywords = self.keywords.map(|kw| {
            kw.into_iter()
                .map(|(k, v)| (k, v.into_trailing()))
                .collect()
        });
        self
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(qualifier) = &self.qualifier {
            write!(f, "{}.", qualifier)?;
        }
        write!(f, "{}(", self.target)?;
        write_joined(f, self.arguments.iter())?;
        if let Some(keywords) = &self.keywords {
            for (i, (name, value)) in keywords.iter().enumerate() {
                if i > 0 || !self.arguments.is_empty() {
                    write!(f, ", ")?;
                }
                write!(f, "{}={}", name, value)?;
            }
        }
        write!(f, ")")?;
        if let Some(trailing) = &self.trailing_calls {
            for call in trailing {
                write!(f, ".{}", call)?;
            }
        }
        Ok(())
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a NormalizedValue>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Serialize optional keyword pairs as an ordered JSON object.
pub(crate) fn serialize_keywords<S: Serializer>(
    keywords: &Option<Keywords>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match keywords {
        Some(pairs) => serialize_pairs(pairs, serializer),
        None => serializer.serialize_none(),
    }
}

/// Serialize `(name, value)` pairs as a map, keeping their order.
pub(crate) fn serialize_pairs<S: Serializer, V: Serialize>(
    pairs: &[(String, V)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (name, value) in pairs {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

/// Layout used for fluent call chains in rendered reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStyle {
    /// Receiver calls nested through `qualifier`.
    #[default]
    Nested,
    /// Head call plus `trailing_calls`.
    Trailing,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(target: &str, qualifier: Option<NormalizedValue>, args: Vec<NormalizedValue>) -> NormalizedValue {
        NormalizedValue::Call(Box::new(CallDescriptor {
            qualifier,
            arguments: args,
            ..CallDescriptor::new(target)
        }))
    }

    /// `Attributes.builder().put("a", 1).build()`
    fn builder_chain() -> NormalizedValue {
        let builder = call("builder", Some(NormalizedValue::str("Attributes")), vec![]);
        let put = call(
            "put",
            Some(builder),
            vec![NormalizedValue::str("a"), Scalar::Int(1).into()],
        );
        call("build", Some(put), vec![])
    }

    #[test]
    fn test_qualifier_depth() {
        let value = builder_chain();
        assert_eq!(value.as_call().unwrap().qualifier_depth(), 2);
        assert_eq!(CallDescriptor::new("f").qualifier_depth(), 0);
    }

    #[test]
    fn test_display_chain() {
        assert_eq!(builder_chain().to_string(), "Attributes.builder().put(a, 1).build()");
    }

    #[test]
    fn test_into_trailing_form() {
        let head = match builder_chain().into_chain_style(ChainStyle::Trailing) {
            NormalizedValue::Call(c) => *c,
            other => panic!("expected call, got {:?}", other),
        };

        assert_eq!(head.target_name(), Some("builder"));
        assert_eq!(head.qualifier, Some(NormalizedValue::str("Attributes")));
        let trailing = head.trailing_calls.as_ref().unwrap();
        let names: Vec<_> = trailing.iter().filter_map(|c| c.target_name()).collect();
        assert_eq!(names, vec!["put", "build"]);
        assert!(trailing.iter().all(|c| c.qualifier.is_none()));
        assert_eq!(trailing[0].arguments.len(), 2);
        // Same rendering as the nested form.
        assert_eq!(head.to_string(), "Attributes.builder().put(a, 1).build()");
    }

    #[test]
    fn test_nested_style_is_identity() {
        let value = builder_chain();
        assert_eq!(value.clone().into_chain_style(ChainStyle::Nested), value);
    }

    #[test]
    fn test_serialize_mapping_keeps_order() {
        let value = NormalizedValue::Mapping(vec![
            (NormalizedValue::str("zeta"), Scalar::Int(1).into()),
            (NormalizedValue::str("alpha"), Scalar::Bool(true).into()),
            (call("key", None, vec![]), NormalizedValue::null()),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":true,"key()":null}"#);
    }

    #[test]
    fn test_serialize_call() {
        let mut descriptor = CallDescriptor::new("add");
        descriptor.qualifier = Some(NormalizedValue::str("counter"));
        descriptor.arguments = vec![Scalar::Int(1).into()];
        descriptor.keywords = Some(vec![("attributes".to_string(), NormalizedValue::Mapping(vec![]))]);

        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["target"], "add");
        assert_eq!(json["qualifier"], "counter");
        assert_eq!(json["arguments"], serde_json::json!([1]));
        assert_eq!(json["keywords"]["attributes"], serde_json::json!({}));
        assert!(json.get("trailing_calls").is_none());
    }
}
