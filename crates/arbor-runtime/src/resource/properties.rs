//! Property files and property locators.
//!
//! Property files use the classic `key=value` layout:
//!
//! ```text
//! # comment
//! ! also a comment
//! title = Address book
//! page.size: 25
//! greeting = Hello, \
//!            world
//! ```
//!
//! The first `=` or `:` separates key from value; both sides are trimmed.
//! A line ending in a single backslash continues on the next line. A line
//! without a separator defines a key with an empty value.

use arbor_types::ValidationError;
use std::collections::HashMap;

/// A parsed property file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySet {
    file: String,
    values: HashMap<String, String>,
}

impl PropertySet {
    /// Parses `text` as the content of `file`.
    #[must_use]
    pub fn parse(file: impl Into<String>, text: &str) -> Self {
        let mut values = HashMap::new();
        let mut pending = String::new();

        for raw in text.lines() {
            let line = raw.trim_start();
            let comment = line.starts_with('#') || line.starts_with('!');
            if pending.is_empty() && (line.is_empty() || comment) {
                continue;
            }

            if let Some(head) = continued(line) {
                pending.push_str(head);
                continue;
            }
            pending.push_str(line);
            insert_entry(&mut values, &std::mem::take(&mut pending));
        }
        // a continuation on the last line still ends the entry
        if !pending.is_empty() {
            insert_entry(&mut values, &pending);
        }

        Self {
            file: file.into(),
            values,
        }
    }

    /// Returns the file this set was parsed from.
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Returns the value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name.trim()).map(String::as_str)
    }

    /// Returns the value of `name`, or `default` when absent.
    #[must_use]
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Returns all property names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the file defined no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn insert_entry(values: &mut HashMap<String, String>, entry: &str) {
    let (key, value) = match entry.find(|c: char| c == '=' || c == ':') {
        Some(at) => (&entry[..at], &entry[at + 1..]),
        None => (entry, ""),
    };
    let key = key.trim();
    if !key.is_empty() {
        values.insert(key.to_string(), value.trim().to_string());
    }
}

/// Returns the line without its continuation backslash, if it has one.
fn continued(line: &str) -> Option<&str> {
    let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
    if trailing % 2 == 1 {
        Some(&line[..line.len() - 1])
    } else {
        None
    }
}

/// A `"<file>:<property>"` reference to one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyLocator {
    /// Property file name.
    pub file: String,
    /// Property name within the file.
    pub property: String,
}

impl PropertyLocator {
    /// Parses a locator.
    ///
    /// # Errors
    ///
    /// Fails unless the locator has a non-empty file name and a non-empty
    /// property name separated by `:`.
    ///
    /// # Example
    ///
    /// ```
    /// use arbor_runtime::PropertyLocator;
    ///
    /// let locator = PropertyLocator::parse("labels.properties:title").unwrap();
    /// assert_eq!(locator.file, "labels.properties");
    /// assert_eq!(locator.property, "title");
    ///
    /// assert!(PropertyLocator::parse("labels.properties").is_err());
    /// ```
    pub fn parse(locator: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidLocator {
            locator: locator.to_string(),
        };
        let (file, property) = locator.split_once(':').ok_or_else(invalid)?;
        let (file, property) = (file.trim(), property.trim());
        if file.is_empty() || property.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            file: file.to_string(),
            property: property.to_string(),
        })
    }
}
