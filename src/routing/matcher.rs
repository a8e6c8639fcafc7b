//! Route matching module
//!
//! Path patterns made of exact segments, `:name` parameters and an
//! optional trailing `*` wildcard.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("route pattern '{0}' must start with '/'")]
    NotAbsolute(String),
    #[error("route pattern '{0}' has an unnamed ':' parameter")]
    EmptyParam(String),
    #[error("route pattern '{0}' uses '*' before its last segment")]
    MisplacedWildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Exact(String),
    Param(String),
}

/// Compiled path pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<Segment>,
    wildcard: bool,
}

/// Values captured by a successful match, in pattern order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(Vec<(String, String)>);

impl RouteParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remainder matched by a trailing `*`
    pub fn wildcard(&self) -> Option<&str> {
        self.get("*")
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::NotAbsolute(pattern.to_string()));
        }

        let parts: Vec<&str> = split(pattern).collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut wildcard = false;

        for (i, part) in parts.iter().enumerate() {
            if *part == "*" {
                if i + 1 != parts.len() {
                    return Err(PatternError::MisplacedWildcard(pattern.to_string()));
                }
                wildcard = true;
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(PatternError::EmptyParam(pattern.to_string()));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Exact((*part).to_string()));
            }
        }

        Ok(Self {
            segments,
            wildcard,
        })
    }

    /// Match `path`, returning captured parameters on success
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        let parts: Vec<&str> = split(path).collect();
        if parts.len() < self.segments.len()
            || (!self.wildcard && parts.len() != self.segments.len())
        {
            return None;
        }

        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Exact(s) if s == part => {}
                Segment::Exact(_) => return None,
                Segment::Param(name) => params.push((name.clone(), (*part).to_string())),
            }
        }

        if self.wildcard {
            params.push(("*".to_string(), parts[self.segments.len()..].join("/")));
        }
        Some(RouteParams(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern() {
        let p = PathPattern::parse("/about").unwrap();
        assert!(p.matches("/about").is_some());
        assert!(p.matches("/about/").is_some());
        assert!(p.matches("/about/team").is_none());
        assert!(p.matches("/").is_none());
    }

    #[test]
    fn test_root_pattern() {
        let p = PathPattern::parse("/").unwrap();
        assert!(p.matches("/").is_some());
        assert!(p.matches("/x").is_none());
    }

    #[test]
    fn test_param_capture() {
        let p = PathPattern::parse("/share/:kind/:id").unwrap();
        let params = p.matches("/share/todo/abc123").unwrap();
        assert_eq!(params.get("kind"), Some("todo"));
        assert_eq!(params.get("id"), Some("abc123"));
        assert!(p.matches("/share/todo").is_none());
    }

    #[test]
    fn test_wildcard_tail() {
        let p = PathPattern::parse("/docs/*").unwrap();
        assert_eq!(p.matches("/docs").unwrap().wildcard(), Some(""));
        assert_eq!(
            p.matches("/docs/guide/intro").unwrap().wildcard(),
            Some("guide/intro")
        );
        assert!(p.matches("/doc").is_none());
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(
            PathPattern::parse("docs").unwrap_err(),
            PatternError::NotAbsolute("docs".into())
        );
        assert!(matches!(
            PathPattern::parse("/a/*/b"),
            Err(PatternError::MisplacedWildcard(_))
        ));
        assert!(matches!(
            PathPattern::parse("/a/:"),
            Err(PatternError::EmptyParam(_))
        ));
    }
}
