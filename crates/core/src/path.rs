//! Remote path parsing
//!
//! Remote objects are addressed as `alias/bucket/key`.

use std::fmt;

use crate::error::{Error, Result};

/// A fully qualified remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub alias: String,
    pub bucket: String,
    pub key: String,
}

impl RemotePath {
    pub fn new(alias: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `alias/bucket/key`; the key may itself contain slashes
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::InvalidPath("path cannot be empty".to_string()));
        }

        let mut parts = path.splitn(3, '/');
        let alias = parts.next().unwrap_or_default();
        let bucket = parts.next().unwrap_or_default();
        let key = parts.next().unwrap_or_default();

        if alias.is_empty() || bucket.is_empty() {
            return Err(Error::InvalidPath(format!(
                "expected alias/bucket/key, got '{path}'"
            )));
        }
        if key.is_empty() {
            return Err(Error::InvalidPath(format!(
                "object key is required (alias/bucket/key): '{path}'"
            )));
        }

        Ok(Self::new(alias, bucket, key))
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.alias, self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        let path = RemotePath::parse("myalias/mybucket/path/to/file.txt").unwrap();
        assert_eq!(path.alias, "myalias");
        assert_eq!(path.bucket, "mybucket");
        assert_eq!(path.key, "path/to/file.txt");
        assert_eq!(path.to_string(), "myalias/mybucket/path/to/file.txt");
    }

    #[test]
    fn test_parse_path_errors() {
        assert!(RemotePath::parse("").is_err());
        assert!(RemotePath::parse("myalias").is_err());
        assert!(RemotePath::parse("myalias/mybucket").is_err());
        assert!(RemotePath::parse("myalias/mybucket/").is_err());
        assert!(RemotePath::parse("/mybucket/key").is_err());
    }
}
