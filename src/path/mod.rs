//! Dotted/bracketed paths over nested mapping/sequence structures.
//!
//! A path like `company.members[0].name` parses into alternating mapping
//! keys and sequence indices. Paths compose by concatenation and slice into
//! new paths; the empty path denotes the root.

pub mod ops;
pub mod visit;

use crate::core::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One step of a [`TreePath`]: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathComponent {
    Key(String),
    Index(usize),
}

impl PathComponent {
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(k) => Some(k),
            Self::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Key(_) => None,
            Self::Index(i) => Some(*i),
        }
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "{}", k),
            Self::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<&str> for PathComponent {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathComponent {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreePath {
    components: Vec<PathComponent>,
}

impl TreePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(components: Vec<PathComponent>) -> Self {
        Self { components }
    }

    /// Parse a string form like `company.members[0].name`.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Ok(Self::root());
        }

        let mut components = Vec::new();
        for part in path.split('.') {
            let (key, mut brackets) = Self::split_first_bracket(part);
            if key.is_empty() {
                return Err(StoreError::InvalidArgument(format!(
                    "path components may not be empty: \"{}\"",
                    path
                )));
            }
            components.push(PathComponent::Key(key.to_string()));

            while !brackets.is_empty() {
                let (index, rest) = Self::extract_index(brackets, path)?;
                components.push(PathComponent::Index(index));
                brackets = rest;
            }
        }
        Ok(Self { components })
    }

    fn split_first_bracket(part: &str) -> (&str, &str) {
        match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        }
    }

    fn extract_index<'a>(section: &'a str, full_path: &str) -> Result<(usize, &'a str)> {
        let end = section.find(']').ok_or_else(|| {
            StoreError::InvalidArgument(format!("unmatched '[' in path \"{}\"", full_path))
        })?;
        let index = section[1..end].parse::<usize>().map_err(|_| {
            StoreError::InvalidArgument(format!(
                "\"{}\" is not a sequence index in \"{}\"",
                &section[1..end],
                full_path
            ))
        })?;
        Ok((index, &section[end + 1..]))
    }

    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PathComponent> {
        self.components.get(index)
    }

    /// New path holding the components of `range`, like slicing in a
    /// sequence.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Self {
        Self {
            components: self.components[range].to_vec(),
        }
    }

    /// Everything but the last component; `None` for the empty path.
    pub fn parent(&self) -> Option<Self> {
        if self.components.is_empty() {
            return None;
        }
        Some(self.slice(0..self.components.len() - 1))
    }

    pub fn last(&self) -> Option<&PathComponent> {
        self.components.last()
    }

    pub fn child(&self, component: impl Into<PathComponent>) -> Self {
        let mut components = self.components.clone();
        components.push(component.into());
        Self { components }
    }

    /// Concatenate paths into a new joined path.
    pub fn join(&self, other: &TreePath) -> Self {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Self { components }
    }

    /// True if the string form carries a bracketed index.
    pub fn has_indices(&self) -> bool {
        self.components
            .iter()
            .any(|c| matches!(c, PathComponent::Index(_)))
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            match component {
                PathComponent::Key(k) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", k)?;
                }
                PathComponent::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

impl FromStr for TreePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Vec<PathComponent>> for TreePath {
    fn from(components: Vec<PathComponent>) -> Self {
        Self { components }
    }
}
