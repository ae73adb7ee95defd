use crate::router::RouteError;
use std::collections::HashSet;
use std::fmt::{self, Write};

/// Name bound by a bare `*` wildcard.
pub const DEFAULT_WILDCARD: &str = "wildcard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `:name`, matches exactly one non-empty segment
    Param(String),
    /// `*name` or `*`, matches the non-empty remainder of the path
    Wildcard(String),
}

/// A parsed route pattern such as `/users/:id/files/*path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() };

        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };
        if rest.is_empty() {
            return Ok(Self { raw: pattern.to_string(), segments: vec![] });
        }

        let raw_segments = rest.split('/').collect::<Vec<_>>();
        let last = raw_segments.len() - 1;
        let mut seen = HashSet::new();
        let mut segments = Vec::with_capacity(raw_segments.len());

        for (i, raw) in raw_segments.into_iter().enumerate() {
            let segment = if let Some(name) = raw.strip_prefix(':') {
                if !is_identifier(name) {
                    return Err(invalid("parameter name must be a non-empty identifier"));
                }
                Segment::Param(name.to_string())
            } else if let Some(name) = raw.strip_prefix('*') {
                if i != last {
                    return Err(invalid("wildcard must be the last segment"));
                }
                if name.is_empty() {
                    Segment::Wildcard(DEFAULT_WILDCARD.to_string())
                } else if is_identifier(name) {
                    Segment::Wildcard(name.to_string())
                } else {
                    return Err(invalid("wildcard name must be an identifier"));
                }
            } else if raw.is_empty() {
                return Err(invalid("empty segment"));
            } else {
                Segment::Literal(raw.to_string())
            };

            if let Segment::Param(name) | Segment::Wildcard(name) = &segment
                && !seen.insert(name.clone())
            {
                return Err(RouteError::DuplicateParam { pattern: pattern.to_string(), name: name.clone() });
            }
            segments.push(segment);
        }

        Ok(Self { raw: pattern.to_string(), segments })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names in path order, wildcard included.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) | Segment::Wildcard(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Per-segment rank, lower wins: literal, then parameter, then wildcard.
    ///
    /// Of two patterns matching the same path, the one with the smaller rank list is preferred.
    pub(crate) fn precedence(&self) -> Vec<u8> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(_) => 0,
                Segment::Param(_) => 1,
                Segment::Wildcard(_) => 2,
            })
            .collect()
    }

    /// The pattern in matchit syntax with parameters named by position (`p0`, `p1`, ...).
    ///
    /// Two patterns have the same shape exactly when this string is equal.
    pub(crate) fn to_matchit(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }

        let mut path = String::with_capacity(self.raw.len() + 8);
        let mut position = 0;
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => {
                    for c in literal.chars() {
                        match c {
                            '{' => path.push_str("{{"),
                            '}' => path.push_str("}}"),
                            c => path.push(c),
                        }
                    }
                }
                Segment::Param(_) => {
                    let _ = write!(path, "{{p{position}}}");
                    position += 1;
                }
                Segment::Wildcard(_) => {
                    let _ = write!(path, "{{*p{position}}}");
                    position += 1;
                }
            }
        }
        path
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::{RoutePattern, Segment};
    use crate::router::RouteError;

    #[test]
    fn parse_segments() {
        let pattern = RoutePattern::parse("/users/:id/files/*path").unwrap();
        assert_eq!(
            pattern.segments(),
            [
                Segment::Literal("users".into()),
                Segment::Param("id".into()),
                Segment::Literal("files".into()),
                Segment::Wildcard("path".into()),
            ]
        );
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), ["id", "path"]);
        assert_eq!(pattern.to_matchit(), "/users/{p0}/files/{*p1}");
    }

    #[test]
    fn root_and_bare_wildcard() {
        assert_eq!(RoutePattern::parse("/").unwrap().to_matchit(), "/");

        let pattern = RoutePattern::parse("/static/*").unwrap();
        assert_eq!(pattern.param_names().collect::<Vec<_>>(), ["wildcard"]);
    }

    #[test]
    fn same_shape_ignores_names() {
        let a = RoutePattern::parse("/users/:id").unwrap();
        let b = RoutePattern::parse("/users/:name").unwrap();
        assert_eq!(a.to_matchit(), b.to_matchit());
    }

    #[test]
    fn precedence_by_segment_kind() {
        let literal = RoutePattern::parse("/files/readme").unwrap().precedence();
        let param = RoutePattern::parse("/files/:name").unwrap().precedence();
        let nested = RoutePattern::parse("/files/:dir/*rest").unwrap().precedence();
        let wildcard = RoutePattern::parse("/files/*path").unwrap().precedence();

        assert_eq!(param, [0, 1]);
        assert!(literal < param);
        assert!(param < wildcard);
        assert!(nested < wildcard);
    }

    #[test]
    fn braces_in_literals_are_escaped() {
        let pattern = RoutePattern::parse("/odd/{x}").unwrap();
        assert_eq!(pattern.to_matchit(), "/odd/{{x}}");
    }

    #[test]
    fn invalid_patterns() {
        for pattern in ["", "users", "/users//x", "/users/", "/:", "/:1st", "/*rest/more", "/*a-b", "/:user-id"] {
            let error = RoutePattern::parse(pattern).unwrap_err();
            assert!(matches!(error, RouteError::InvalidPattern { .. }), "{pattern}: {error}");
        }
    }

    #[test]
    fn duplicate_parameter() {
        let error = RoutePattern::parse("/:id/posts/:id").unwrap_err();
        assert_eq!(error, RouteError::DuplicateParam { pattern: "/:id/posts/:id".into(), name: "id".into() });
    }
}
