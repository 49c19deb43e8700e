//! Change descriptors and the match expressions built from them.

use crate::error::{ErrorKind, Result};
use crate::rules::{DEFAULT_DOCUMENT, RuleTable};
use derive_more::Display;
use exn::ResultExt;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One change entry as it appears in the manifest:
/// `{"flag": "file", "value": ["a.css", "b.js"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub flag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<DescriptorValue>,
}
impl Descriptor {
    pub fn new(flag: impl Into<String>, value: Option<DescriptorValue>) -> Self {
        Self {
            flag: flag.into(),
            value,
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// A descriptor value: one scalar or an ordered list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescriptorValue {
    // Order matters: `One` would happily swallow an array.
    Many(Vec<Value>),
    One(Value),
}
impl From<&str> for DescriptorValue {
    fn from(value: &str) -> Self {
        Self::One(Value::String(value.to_string()))
    }
}
impl From<Vec<&str>> for DescriptorValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(|v| Value::String(v.to_string())).collect())
    }
}

/// The flag of a [`MatchExpression`], for logging and inspection.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    #[display("all")]
    All,
    #[display("html")]
    Html,
    #[display("page")]
    Page,
    #[display("file")]
    File,
    #[display("str")]
    Substring,
    #[display("reg")]
    Regex,
}

/// Predicate deciding whether a cache key is affected by one change.
///
/// Multi-valued expressions are an OR over their values, evaluated in order
/// and stopping at the first hit.
#[derive(Debug, Clone)]
pub enum MatchExpression {
    /// Every key a site-wide clean may evict (see [`RuleTable::is_cleanable`]).
    All,
    /// Directory pages: keys ending in `/` or `/index.html`.
    Html,
    /// Keys for the named page: `/<value>/`, optionally followed by `index.html`.
    Page(Vec<String>),
    /// Keys ending with a literal suffix.
    File(Vec<String>),
    /// Keys containing a literal substring.
    Substring(Vec<String>),
    /// Keys matching a case-insensitive regular expression.
    Regex(Vec<Regex>),
}

impl MatchExpression {
    /// Build an expression from a manifest descriptor.
    ///
    /// Fails with [`UnknownExpression`](ErrorKind::UnknownExpression) for an
    /// unrecognized flag; an expression that cannot be evaluated must never
    /// be mistaken for one that matches nothing.
    ///
    /// ```
    /// use swcache_core::{Descriptor, MatchExpression, RuleTable};
    ///
    /// let descriptor = Descriptor::new("file", Some("a.css".into()));
    /// let expression = MatchExpression::from_descriptor(&descriptor).unwrap();
    /// assert!(expression.matches("https://example.com/style/a.css", &RuleTable::default()));
    ///
    /// let unknown = Descriptor::new("nope", None);
    /// assert!(MatchExpression::from_descriptor(&unknown).is_err());
    /// ```
    pub fn from_descriptor(descriptor: &Descriptor) -> Result<Self> {
        Ok(match descriptor.flag.as_str() {
            "all" => Self::All,
            "html" => Self::Html,
            "page" => Self::Page(Self::values(descriptor)?),
            "file" => Self::File(Self::values(descriptor)?),
            "str" | "substring" => Self::Substring(Self::values(descriptor)?),
            "reg" | "regex" => Self::Regex(
                Self::values(descriptor)?
                    .into_iter()
                    .map(|pattern| {
                        RegexBuilder::new(&pattern)
                            .case_insensitive(true)
                            .build()
                            .or_raise(|| ErrorKind::InvalidPattern(pattern.clone()))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            _ => exn::bail!(ErrorKind::UnknownExpression(descriptor.to_json())),
        })
    }

    /// Normalize the descriptor value into a list of strings.
    fn values(descriptor: &Descriptor) -> Result<Vec<String>> {
        let scalar = |value: &Value| -> Result<String> {
            Ok(match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => exn::bail!(ErrorKind::InvalidValue(descriptor.to_json())),
            })
        };
        match &descriptor.value {
            None => exn::bail!(ErrorKind::MissingValue(descriptor.flag.clone())),
            Some(DescriptorValue::One(value)) => Ok(vec![scalar(value)?]),
            Some(DescriptorValue::Many(values)) => values.iter().map(scalar).collect(),
        }
    }

    pub fn kind(&self) -> ExpressionKind {
        match self {
            Self::All => ExpressionKind::All,
            Self::Html => ExpressionKind::Html,
            Self::Page(_) => ExpressionKind::Page,
            Self::File(_) => ExpressionKind::File,
            Self::Substring(_) => ExpressionKind::Substring,
            Self::Regex(_) => ExpressionKind::Regex,
        }
    }

    /// Whether the entry stored under `key` is affected by this change.
    ///
    /// `rules` is only consulted by [`All`](Self::All).
    pub fn matches(&self, key: &str, rules: &RuleTable) -> bool {
        match self {
            Self::All => rules.is_cleanable(key),
            Self::Html => key.ends_with('/') || key.ends_with(&format!("/{DEFAULT_DOCUMENT}")),
            Self::Page(pages) => pages.iter().any(|page| Self::is_page(key, page)),
            Self::File(suffixes) => suffixes.iter().any(|suffix| key.ends_with(suffix.as_str())),
            Self::Substring(needles) => needles.iter().any(|needle| key.contains(needle.as_str())),
            Self::Regex(patterns) => patterns.iter().any(|pattern| pattern.is_match(key)),
        }
    }

    fn is_page(key: &str, page: &str) -> bool {
        let key = key.strip_suffix(DEFAULT_DOCUMENT).unwrap_or(key);
        key.strip_suffix('/')
            .and_then(|rest| rest.strip_suffix(page))
            .is_some_and(|rest| rest.ends_with('/'))
    }
}
