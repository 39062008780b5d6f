//! Page node modules and their per-route options.
//!
//! A node exposes up to two option records: `universal` (runs on both sides)
//! and `server` (request-time server logic). A present `server` record, even
//! an empty one, means the node has server logic.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Index of a node within the manifest's node table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl From<usize> for NodeId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Option names a node may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteOption {
    Prerender,
    Ssr,
    Csr,
    TrailingSlash,
    Entries,
}

impl RouteOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOption::Prerender => "prerender",
            RouteOption::Ssr => "ssr",
            RouteOption::Csr => "csr",
            RouteOption::TrailingSlash => "trailingSlash",
            RouteOption::Entries => "entries",
        }
    }
}

impl FromStr for RouteOption {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prerender" => Ok(RouteOption::Prerender),
            "ssr" => Ok(RouteOption::Ssr),
            "csr" => Ok(RouteOption::Csr),
            "trailingSlash" => Ok(RouteOption::TrailingSlash),
            "entries" => Ok(RouteOption::Entries),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RouteOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a route option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value)
    }
}

/// Known options declared by one capability slot of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct OptionsRecord(BTreeMap<RouteOption, OptionValue>);

impl OptionsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, option: RouteOption, value: impl Into<OptionValue>) -> Self {
        self.0.insert(option, value.into());
        self
    }

    pub fn get(&self, option: RouteOption) -> Option<&OptionValue> {
        self.0.get(&option)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A known option carried a value of an unsupported shape.
#[derive(Debug)]
pub struct InvalidOptionValue {
    option: RouteOption,
}

impl fmt::Display for InvalidOptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "option `{}` must be a boolean, a string or a list of strings",
            self.option
        )
    }
}

impl TryFrom<Map<String, Value>> for OptionsRecord {
    type Error = InvalidOptionValue;

    fn try_from(exports: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut record = BTreeMap::new();
        for (name, value) in exports {
            // Anything else a module exports (load functions, actions) is not an option.
            let Ok(option) = name.parse::<RouteOption>() else {
                continue;
            };
            let value = match value {
                Value::Null => continue,
                Value::Bool(b) => OptionValue::Bool(b),
                Value::String(s) => OptionValue::Text(s),
                Value::Array(items) => OptionValue::List(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s),
                            _ => Err(InvalidOptionValue { option }),
                        })
                        .collect::<Result<_, _>>()?,
                ),
                _ => return Err(InvalidOptionValue { option }),
            };
            record.insert(option, value);
        }
        Ok(Self(record))
    }
}

/// A loaded page node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub universal: Option<OptionsRecord>,
    #[serde(default)]
    pub server: Option<OptionsRecord>,
}

impl Node {
    /// True if the node runs request-time server logic.
    pub fn has_server(&self) -> bool {
        self.server.is_some()
    }

    /// The node's own value for `option`; `universal` shadows `server`.
    pub fn option(&self, option: RouteOption) -> Option<&OptionValue> {
        self.universal
            .as_ref()
            .and_then(|r| r.get(option))
            .or_else(|| self.server.as_ref().and_then(|r| r.get(option)))
    }
}
