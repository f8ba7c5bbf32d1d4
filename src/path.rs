//! Path utilities shared by registration and lookup.
//!
//! - [`clean_path`] normalizes request paths before a case-insensitive
//!   fixed-path lookup.
//! - [`expand_optional_segments`] turns one pattern with trailing optional
//!   parameters into the concrete patterns that get inserted into the trie.
//! - `find_wildcard` scans the pattern syntax (`:name`, `*name`, `{name}`,
//!   `{name:*}`) for the trie.

use crate::router::RouteError;

/// Return the canonical form of a URL path.
///
/// Works lexically, never touching a filesystem:
///
/// 1. Replace multiple slashes with a single slash.
/// 2. Eliminate each `.` path name element (the current directory).
/// 3. Eliminate each inner `..` element and the non-`..` element before it.
/// 4. Eliminate `..` elements that begin a rooted path.
///
/// The result always starts with `/` and keeps a trailing `/` if the input had
/// one. An empty input yields `/`.
///
/// ```
/// use routetree::path::clean_path;
///
/// assert_eq!(clean_path("//a/./b/../c/"), "/a/c/");
/// assert_eq!(clean_path("../../etc"), "/etc");
/// ```
#[must_use]
pub fn clean_path(p: &str) -> String {
    if p.is_empty() {
        return "/".to_owned();
    }

    let bytes = p.as_bytes();
    let n = bytes.len();
    let mut buf = String::with_capacity(n + 1);
    buf.push('/');

    // read index; a missing leading slash is treated as if present
    let mut r = usize::from(bytes[0] == b'/');
    let mut trailing = n > 1 && bytes[n - 1] == b'/';

    while r < n {
        match (bytes[r], bytes.get(r + 1), bytes.get(r + 2)) {
            // empty path element
            (b'/', _, _) => r += 1,
            // `.` as the final element
            (b'.', None, _) => {
                trailing = true;
                r += 1;
            }
            // `./`
            (b'.', Some(b'/'), _) => r += 2,
            // `..` element: drop the last written element
            (b'.', Some(b'.'), None | Some(b'/')) => {
                r += 3;
                if buf.len() > 1 {
                    let keep = buf[1..].rfind('/').map_or(1, |i| i + 1);
                    buf.truncate(keep);
                }
            }
            _ => {
                if buf.len() > 1 {
                    buf.push('/');
                }
                let end = bytes[r..]
                    .iter()
                    .position(|&b| b == b'/')
                    .map_or(n, |i| r + i);
                buf.push_str(&p[r..end]);
                r = end;
            }
        }
    }

    if trailing && buf.len() > 1 {
        buf.push('/');
    }
    buf
}

/// Expand a pattern ending in optional parameters into concrete patterns.
///
/// Optional parameters are written `{name?}` or `:name?`. Only the trailing
/// run of optional segments is expanded; the result is ordered from the most
/// specific pattern (every optional segment present) to the least specific
/// (all omitted), so `k` optional segments give `k + 1` patterns. A pattern
/// without a trailing optional run comes back unchanged as the only element.
///
/// ```
/// use routetree::path::expand_optional_segments;
///
/// assert_eq!(
///     expand_optional_segments("/users/{id?}/{tab?}"),
///     vec!["/users/{id}/{tab}", "/users/{id}", "/users"]
/// );
/// ```
#[must_use]
pub fn expand_optional_segments(pattern: &str) -> Vec<String> {
    let segments: Vec<&str> = pattern.split('/').collect();
    let optional = segments
        .iter()
        .rev()
        .take_while(|s| strip_optional(s).is_some())
        .count();

    if optional == 0 {
        return vec![pattern.to_owned()];
    }

    let required = segments.len() - optional;
    let concrete: Vec<String> = segments
        .iter()
        .enumerate()
        .map(|(i, s)| match strip_optional(s) {
            Some(stripped) if i >= required => stripped,
            _ => (*s).to_owned(),
        })
        .collect();

    (0..=optional)
        .rev()
        .map(|kept| {
            let joined = concrete[..required + kept].join("/");
            if joined.is_empty() {
                "/".to_owned()
            } else {
                joined
            }
        })
        .collect()
}

/// Remove the optional marker from a segment, if it carries one.
fn strip_optional(segment: &str) -> Option<String> {
    if let Some(inner) = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix("?}"))
    {
        return (!inner.is_empty()).then(|| format!("{{{inner}}}"));
    }
    if let Some(name) = segment
        .strip_prefix(':')
        .and_then(|s| s.strip_suffix('?'))
    {
        return (!name.is_empty()).then(|| format!(":{name}"));
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WildcardKind {
    Param,
    CatchAll,
}

/// A wildcard token located inside a pattern.
///
/// `start..end` is the byte span of the whole token, so `end` is either the
/// pattern length or the index of the `/` that follows the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Wildcard<'p> {
    pub kind: WildcardKind,
    pub name: &'p str,
    pub start: usize,
    pub end: usize,
}

/// Find and validate the first wildcard token in `pattern`.
///
/// `full` is the complete pattern being registered, used for error messages.
pub(crate) fn find_wildcard<'p>(
    pattern: &'p [u8],
    full: &str,
) -> Result<Option<Wildcard<'p>>, RouteError> {
    let Some(start) = pattern
        .iter()
        .position(|&b| matches!(b, b':' | b'*' | b'{'))
    else {
        return Ok(None);
    };

    let end = pattern[start..]
        .iter()
        .position(|&b| b == b'/')
        .map_or(pattern.len(), |i| start + i);

    let invalid = || RouteError::InvalidWildcard {
        path: full.to_owned(),
        token: String::from_utf8_lossy(&pattern[start..end]).into_owned(),
    };

    let (kind, name) = match pattern[start] {
        b'{' => {
            // the closing brace has to end the segment
            if end - start < 2 || pattern[end - 1] != b'}' {
                return Err(invalid());
            }
            let inner = &pattern[start + 1..end - 1];
            match inner.strip_suffix(b":*") {
                Some(name) => (WildcardKind::CatchAll, name),
                None => (WildcardKind::Param, inner),
            }
        }
        b':' => (WildcardKind::Param, &pattern[start + 1..end]),
        _ => (WildcardKind::CatchAll, &pattern[start + 1..end]),
    };

    if name.is_empty()
        || name
            .iter()
            .any(|b| matches!(b, b':' | b'*' | b'{' | b'}' | b'?'))
    {
        return Err(invalid());
    }
    let name = std::str::from_utf8(name).map_err(|_| invalid())?;

    Ok(Some(Wildcard {
        kind,
        name,
        start,
        end,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN_TESTS: &[(&str, &str)] = &[
        // already clean
        ("/", "/"),
        ("/abc", "/abc"),
        ("/a/b/c", "/a/b/c"),
        ("/abc/", "/abc/"),
        ("/a/b/c/", "/a/b/c/"),
        // missing root
        ("", "/"),
        ("a/", "/a/"),
        ("abc", "/abc"),
        ("abc/def", "/abc/def"),
        ("a/b/c", "/a/b/c"),
        // double slashes
        ("//", "/"),
        ("/abc//", "/abc/"),
        ("/abc/def//", "/abc/def/"),
        ("/a/b/c//", "/a/b/c/"),
        ("/abc//def//ghi", "/abc/def/ghi"),
        ("//abc", "/abc"),
        ("///abc", "/abc"),
        ("//abc//", "/abc/"),
        // dot elements
        (".", "/"),
        ("./", "/"),
        ("/abc/./def", "/abc/def"),
        ("/./abc/def", "/abc/def"),
        ("/abc/.", "/abc/"),
        // dot-dot elements
        ("..", "/"),
        ("../", "/"),
        ("../../", "/"),
        ("../..", "/"),
        ("../../abc", "/abc"),
        ("/abc/def/ghi/../jkl", "/abc/def/jkl"),
        ("/abc/def/../ghi/../jkl", "/abc/jkl"),
        ("/abc/def/..", "/abc"),
        ("/abc/def/../..", "/"),
        ("/abc/def/../../..", "/"),
        ("/abc/def/../../../ghi/jkl/../../../mno", "/mno"),
        // combinations
        ("abc/./../def", "/def"),
        ("abc//./../def", "/def"),
        ("abc/../../././../def", "/def"),
        // dots that are part of a name
        ("/.hidden/..x", "/.hidden/..x"),
        ("/über/../straße", "/straße"),
    ];

    #[test]
    fn test_clean_path() {
        for (input, expected) in CLEAN_TESTS {
            assert_eq!(clean_path(input), *expected, "clean_path({input:?})");
        }
    }

    #[test]
    fn test_clean_path_is_idempotent() {
        for (input, expected) in CLEAN_TESTS {
            let once = clean_path(input);
            assert_eq!(clean_path(&once), once, "second pass over {input:?}");
            assert_eq!(clean_path(expected), *expected);
            assert!(once.starts_with('/'));
        }
    }

    #[test]
    fn test_expand_without_optional_segments() {
        assert_eq!(expand_optional_segments("/a/{b}/c"), vec!["/a/{b}/c"]);
        assert_eq!(expand_optional_segments("/"), vec!["/"]);
    }

    #[test]
    fn test_expand_single_optional() {
        assert_eq!(
            expand_optional_segments("/items/:id?"),
            vec!["/items/:id", "/items"]
        );
    }

    #[test]
    fn test_expand_counts_and_order() {
        let expanded = expand_optional_segments("/a/{b?}/{c?}/{d?}");
        assert_eq!(expanded.len(), 4);
        assert_eq!(expanded[0], "/a/{b}/{c}/{d}");
        assert_eq!(expanded[3], "/a");
        for pair in expanded.windows(2) {
            assert!(pair[0].len() > pair[1].len());
        }
    }

    #[test]
    fn test_expand_everything_optional_falls_back_to_root() {
        assert_eq!(expand_optional_segments("/{page?}"), vec!["/{page}", "/"]);
    }

    #[test]
    fn test_expand_ignores_non_trailing_optional() {
        assert_eq!(
            expand_optional_segments("/a/{b?}/c"),
            vec!["/a/{b?}/c"]
        );
    }

    #[test]
    fn test_find_wildcard_kinds() {
        let wc = find_wildcard(b"/users/:id/posts", "p").unwrap().unwrap();
        assert_eq!((wc.kind, wc.name, wc.start, wc.end), (WildcardKind::Param, "id", 7, 10));

        let wc = find_wildcard(b"/users/{id}", "p").unwrap().unwrap();
        assert_eq!((wc.kind, wc.name, wc.end), (WildcardKind::Param, "id", 11));

        let wc = find_wildcard(b"/src/*filepath", "p").unwrap().unwrap();
        assert_eq!((wc.kind, wc.name), (WildcardKind::CatchAll, "filepath"));

        let wc = find_wildcard(b"/src/{filepath:*}", "p").unwrap().unwrap();
        assert_eq!((wc.kind, wc.name), (WildcardKind::CatchAll, "filepath"));

        assert!(find_wildcard(b"/static/only", "p").unwrap().is_none());
    }

    #[test]
    fn test_find_wildcard_rejects_malformed_tokens() {
        for bad in [
            "/:", "/*", "/{}", "/{:*}", "/:a:b", "/{a}{b}", "/{a", "/{a}x", "/{a?}/b", "/:a*",
        ] {
            let err = find_wildcard(bad.as_bytes(), bad).unwrap_err();
            assert!(
                matches!(err, RouteError::InvalidWildcard { .. }),
                "{bad} gave {err:?}"
            );
        }
    }
}
