// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Resource holding the decoded flow input.
pub const INPUT_RESOURCE: &str = "input";
/// Reserved for the assembled flow output.
pub const OUTPUT_RESOURCE: &str = "output";
/// Prefix of the per-call-site function resources.
pub const STACK_RESOURCE: &str = "stack";
/// Appended to a resource name to address its header metadata.
pub const HEADER_SUFFIX: &str = ".header";
/// Path addressing the whole value of a resource.
pub const ROOT_PATH: &str = ".";

/// An absolute `<resource>:<path>` property address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    pub resource: String,
    pub path: String,
}

impl Reference {
    pub fn new(resource: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            resource: resource.into(),
            path: if path.is_empty() { ROOT_PATH.to_string() } else { path },
        }
    }

    /// Parses `resource:path`. Returns `None` when the value is not a reference.
    pub fn parse(raw: &str) -> Option<Self> {
        let (resource, path) = raw.trim().split_once(':')?;
        if resource.is_empty()
            || !resource.chars().all(is_resource_char)
            || !path.chars().all(is_path_char)
            || path.contains("..")
        {
            return None;
        }
        Some(Self::new(resource, path))
    }

    pub fn is_root(&self) -> bool {
        self.path == ROOT_PATH
    }

    pub fn is_input(&self) -> bool {
        self.resource == INPUT_RESOURCE || self.resource == input_header()
    }

    pub fn is_header(&self) -> bool {
        self.resource.ends_with(HEADER_SUFFIX)
    }

    /// The node name that owns this reference's resource, stripping the header suffix.
    pub fn owner(&self) -> &str {
        self.resource
            .strip_suffix(HEADER_SUFFIX)
            .unwrap_or(&self.resource)
    }

    /// Path segments, empty for the root path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path
            .split('.')
            .filter(|segment| !segment.is_empty())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.path)
    }
}

pub(crate) fn is_resource_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

pub(crate) fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '^' | '&' | '%' | '$' | '@')
}

pub(crate) fn input_header() -> String {
    format!("{}{}", INPUT_RESOURCE, HEADER_SUFFIX)
}

pub(crate) fn header_resource(resource: &str) -> String {
    format!("{}{}", resource, HEADER_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resource_and_path() {
        let reference = Reference::parse("user:address.city").unwrap();
        assert_eq!(reference.resource, "user");
        assert_eq!(reference.path, "address.city");
        assert_eq!(reference.segments().collect::<Vec<_>>(), vec!["address", "city"]);
        assert_eq!(reference.to_string(), "user:address.city");
    }

    #[test]
    fn empty_path_is_root() {
        let reference = Reference::parse("stack.upper.0:").unwrap();
        assert!(reference.is_root());
        assert_eq!(reference.segments().count(), 0);
    }

    #[test]
    fn header_references_belong_to_their_node() {
        let reference = Reference::parse("charge.header:X-Request-Id").unwrap();
        assert!(reference.is_header());
        assert_eq!(reference.owner(), "charge");
        assert!(Reference::parse("input.header:Authorization").unwrap().is_input());
    }

    #[test]
    fn rejects_non_references() {
        assert!(Reference::parse("plain text").is_none());
        assert!(Reference::parse(":path").is_none());
        assert!(Reference::parse("a:b..c").is_none());
        assert!(Reference::parse("a b:c").is_none());
    }
}
