//! # Query Descriptor
//!
//! Multi-valued description of the exact matching configuration a batch run
//! was started with. The descriptor is written as the first journal line and
//! compared on resume, so its text form must stay on a single line.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;

use crate::error::{BatchMatchError, Result};
use crate::query::equality::descriptors_equal;

/// Parameter name -> ordered values.
///
/// Every present name has at least one value; setting an empty list removes
/// the name. Any string is a valid name, the empty string included, and
/// survives the text form unchanged. Order of values under one name is significant, order of names
/// is not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDescriptor {
    params: BTreeMap<String, Vec<String>>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`QueryDescriptor::add`]
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.add(name, value);
        self
    }

    /// Append a value under `name`, keeping earlier values
    pub fn add(&mut self, name: impl Into<String>, value: impl ToString) {
        self.params
            .entry(name.into())
            .or_default()
            .push(value.to_string());
    }

    /// Replace all values under `name`
    pub fn set<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let name = name.into();
        let values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        if values.is_empty() {
            self.params.remove(&name);
        } else {
            self.params.insert(name, values);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.params.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.params.get(name).map(Vec::as_slice)
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.params
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Serialize as a form-urlencoded query string (`a=1&b=x&b=y`)
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, values) in &self.params {
            for value in values {
                serializer.append_pair(name, value);
            }
        }
        serializer.finish()
    }

    /// Parse the output of [`QueryDescriptor::to_query_string`]
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim_end_matches(['\r', '\n']);
        if input.contains(['\n', '\t']) {
            return Err(BatchMatchError::InvalidDescriptor(
                "descriptor text must be a single line without tabs".to_string(),
            ));
        }

        let mut descriptor = Self::new();
        for (name, value) in form_urlencoded::parse(input.as_bytes()) {
            descriptor.add(name.into_owned(), value);
        }
        Ok(descriptor)
    }
}

impl PartialEq for QueryDescriptor {
    fn eq(&self, other: &Self) -> bool {
        descriptors_equal(self, other)
    }
}

impl Eq for QueryDescriptor {}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl FromStr for QueryDescriptor {
    type Err = BatchMatchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
