use std::collections::BTreeMap;
use super::value::Value;

/// Bind values shipped next to a query text. Backends bind them
/// server-side; they are never spliced into the SQL string.
///
/// Positional values answer `?` and `:1`-style placeholders, named values
/// answer `:name`. Names are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    #[must_use]
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.named.insert(name.to_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn get_positional(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    #[must_use]
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.named.get(&name.to_lowercase())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }
}
