//! Path patterns such as `/rooms/{id}`.
//!
//! A pattern is a sequence of literal segments and `{name}` captures. A
//! capture matches exactly one non-empty segment. One trailing slash on the
//! request path is ignored.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture,
}

/// Compiled path matcher.
#[derive(Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    path.split('/').filter(move |_| !path.is_empty())
}

impl PathPattern {
    /// Compiles `pattern`.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|segment| {
                match segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                {
                    Some(_) => Segment::Capture,
                    None => Segment::Literal(segment.to_string()),
                }
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// Matches `path`, returning the captured segments in order.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<Vec<String>> {
        let mut captures = Vec::new();
        let mut parts = split(path);
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Capture if !part.is_empty() => captures.push(part.to_string()),
                _ => return None,
            }
        }
        parts.next().is_none().then_some(captures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths() {
        let pattern = PathPattern::parse("/rooms");
        assert_eq!(pattern.matches("/rooms"), Some(vec![]));
        assert_eq!(pattern.matches("/rooms/"), Some(vec![]));
        assert_eq!(pattern.matches("/room"), None);
        assert_eq!(pattern.matches("/rooms/x"), None);
        assert_eq!(pattern.matches("/"), None);
    }

    #[test]
    fn captures_in_order() {
        let pattern = PathPattern::parse("/rooms/{id}/posts/{post}");
        assert_eq!(
            pattern.matches("/rooms/a/posts/b"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(pattern.matches("/rooms//posts/b"), None);
        assert_eq!(pattern.matches("/rooms/a/posts"), None);
    }

    #[test]
    fn root_path() {
        let pattern = PathPattern::parse("/");
        assert_eq!(pattern.matches("/"), Some(vec![]));
        assert_eq!(pattern.matches("/x"), None);
    }
}
