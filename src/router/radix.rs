//! Radix tree implementation for HTTP route matching
//!
//! One tree is kept per request method. Lookup time is proportional to the
//! length of the request path, not the number of registered routes.
//!
//! ## Structure
//!
//! Every node stores a literal byte prefix. Static children are keyed by
//! their first byte (`indices[i]` is the first byte of `children[i]`), so no
//! two static children of a node share a first byte. Besides the static
//! children a node owns at most one parameter child and at most one catch-all
//! child; wildcard nodes have an empty prefix and carry the parameter name.
//!
//! - A parameter consumes one or more bytes up to the next `/`.
//! - A catch-all consumes the rest of the path including the `/` in front of
//!   it, so it hangs off the node *before* that slash.
//!
//! ## Explicit matches only
//!
//! Registration rejects any pair of routes that could match the same request
//! path: a parameter child next to a static child starting with anything but
//! `/`, or a catch-all child next to a static child starting with `/`. As a
//! result lookup never backtracks and a request matches one route or none.
//!
//! ```text
//! Pattern: /src/*filepath
//!
//!  /src/                     match  filepath="/"
//!  /src/somefile.go          match  filepath="/somefile.go"
//!  /src                      no match, trailing slash redirect
//! ```

use std::sync::Arc;

use super::core::ParamVec;
use super::RouteError;
use crate::path::{find_wildcard, WildcardKind};

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Static,
    Param(Arc<str>),
    CatchAll(Arc<str>),
}

/// Node in the radix tree
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    kind: NodeKind,
    /// Literal bytes matched by this node; empty for wildcard nodes
    prefix: Vec<u8>,
    /// First byte of each static child, same order as `children`
    indices: Vec<u8>,
    children: Vec<Node<T>>,
    param: Option<Box<Node<T>>>,
    catch_all: Option<Box<Node<T>>>,
    /// Present iff a registered pattern ends exactly at this node
    value: Option<T>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self::new(NodeKind::Static, Vec::new())
    }
}

impl<T> Node<T> {
    fn new(kind: NodeKind, prefix: Vec<u8>) -> Self {
        Self {
            kind,
            prefix,
            indices: Vec::new(),
            children: Vec::new(),
            param: None,
            catch_all: None,
            value: None,
        }
    }

    fn static_child(&self, first: u8) -> Option<&Node<T>> {
        self.indices
            .iter()
            .position(|&b| b == first)
            .map(|i| &self.children[i])
    }

    /// Human readable description used in conflict errors
    fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Static => format!("path segment '{}'", String::from_utf8_lossy(&self.prefix)),
            NodeKind::Param(name) => format!("wildcard ':{name}'"),
            NodeKind::CatchAll(name) => format!("catch-all '*{name}'"),
        }
    }

    fn wildcard_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Param(name) | NodeKind::CatchAll(name) => Some(name),
            NodeKind::Static => None,
        }
    }

    /// Name a wildcard node binds its capture to. Only wildcard nodes sit in
    /// the `param` and `catch_all` slots, so the static arm is never taken
    /// during lookup.
    fn binding_name(&self) -> Arc<str> {
        match &self.kind {
            NodeKind::Param(name) | NodeKind::CatchAll(name) => Arc::clone(name),
            NodeKind::Static => Arc::from(""),
        }
    }

    /// Whether appending a single `/` to a path ending at this node would match
    fn slash_below(&self) -> bool {
        self.catch_all.is_some()
            || self
                .static_child(b'/')
                .is_some_and(|c| c.prefix == b"/" && c.value.is_some())
    }

    /// Register `value` under `pattern`.
    ///
    /// Fails without shadowing anything if the pattern is malformed, collides
    /// with an existing wildcard or static segment, or is already registered.
    pub(crate) fn insert(&mut self, pattern: &str, value: T) -> Result<(), RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::MissingLeadingSlash {
                path: pattern.to_owned(),
            });
        }
        self.insert_at(pattern.as_bytes(), pattern, value)
    }

    fn insert_at(&mut self, rest: &[u8], full: &str, value: T) -> Result<(), RouteError> {
        let wildcard = find_wildcard(rest, full)?;

        // Static nodes take everything up to the wildcard. A catch-all keeps
        // the slash in front of it.
        let literal_end = match wildcard {
            None => rest.len(),
            Some(wc) if wc.kind == WildcardKind::CatchAll => {
                if wc.end != rest.len() {
                    return Err(RouteError::CatchAllNotLast {
                        path: full.to_owned(),
                    });
                }
                if wc.start == 0 || rest[wc.start - 1] != b'/' {
                    return Err(RouteError::CatchAllWithoutSlash {
                        path: full.to_owned(),
                    });
                }
                wc.start - 1
            }
            Some(wc) => wc.start,
        };

        let literal = &rest[..literal_end];
        let common = self
            .prefix
            .iter()
            .zip(literal)
            .take_while(|(a, b)| a == b)
            .count();

        if common < self.prefix.len() {
            self.split(common);
        }

        let literal_rest = &literal[common..];
        if let Some(&first) = literal_rest.first() {
            let remaining = &rest[common..];
            if let Some(i) = self.indices.iter().position(|&b| b == first) {
                return self.children[i].insert_at(remaining, full, value);
            }

            let blocking = if first == b'/' {
                self.catch_all.as_deref()
            } else {
                self.param.as_deref()
            };
            if let Some(existing) = blocking {
                return Err(RouteError::WildcardConflict {
                    path: full.to_owned(),
                    segment: String::from_utf8_lossy(literal_rest).into_owned(),
                    existing: existing.describe(),
                });
            }

            self.indices.push(first);
            self.children
                .push(Node::new(NodeKind::Static, literal_rest.to_vec()));
            let last = self.children.len() - 1;
            return self.children[last].insert_at(remaining, full, value);
        }

        let Some(wc) = wildcard else {
            if self.value.is_some() {
                return Err(RouteError::DuplicateRoute {
                    path: full.to_owned(),
                });
            }
            self.value = Some(value);
            return Ok(());
        };

        let token = String::from_utf8_lossy(&rest[wc.start..wc.end]).into_owned();
        match wc.kind {
            WildcardKind::Param => {
                if let Some(i) = self.indices.iter().position(|&b| b != b'/') {
                    return Err(RouteError::WildcardConflict {
                        path: full.to_owned(),
                        segment: token,
                        existing: self.children[i].describe(),
                    });
                }
                let after = &rest[wc.end..];
                match self.param.as_deref_mut() {
                    Some(param) if param.wildcard_name() != Some(wc.name) => {
                        Err(RouteError::WildcardConflict {
                            path: full.to_owned(),
                            segment: token,
                            existing: param.describe(),
                        })
                    }
                    Some(param) => param.insert_at(after, full, value),
                    None => {
                        let mut param = Node::new(NodeKind::Param(Arc::from(wc.name)), Vec::new());
                        param.insert_at(after, full, value)?;
                        self.param = Some(Box::new(param));
                        Ok(())
                    }
                }
            }
            WildcardKind::CatchAll => {
                if let Some(child) = self.static_child(b'/') {
                    return Err(RouteError::WildcardConflict {
                        path: full.to_owned(),
                        segment: token,
                        existing: child.describe(),
                    });
                }
                match self.catch_all.as_deref() {
                    Some(existing) if existing.wildcard_name() != Some(wc.name) => {
                        Err(RouteError::WildcardConflict {
                            path: full.to_owned(),
                            segment: token,
                            existing: existing.describe(),
                        })
                    }
                    Some(_) => Err(RouteError::DuplicateRoute {
                        path: full.to_owned(),
                    }),
                    None => {
                        let mut catch_all =
                            Node::new(NodeKind::CatchAll(Arc::from(wc.name)), Vec::new());
                        catch_all.value = Some(value);
                        self.catch_all = Some(Box::new(catch_all));
                        Ok(())
                    }
                }
            }
        }
    }

    /// Split this node so that it keeps `prefix[..at]` and everything else
    /// moves into a single static child.
    fn split(&mut self, at: usize) {
        let suffix = self.prefix.split_off(at);
        let child = Node {
            kind: NodeKind::Static,
            indices: std::mem::take(&mut self.indices),
            children: std::mem::take(&mut self.children),
            param: self.param.take(),
            catch_all: self.catch_all.take(),
            value: self.value.take(),
            prefix: suffix,
        };
        self.indices = vec![child.prefix[0]];
        self.children = vec![child];
    }

    /// Look up the value registered for `path`.
    ///
    /// On an exact match returns the value and pushes the wildcard bindings
    /// into `params` (when given). Otherwise the flag reports whether adding
    /// or removing one trailing slash would produce an exact match.
    pub(crate) fn get_value<'n>(
        &'n self,
        path: &str,
        mut params: Option<&mut ParamVec>,
    ) -> (Option<&'n T>, bool) {
        let bytes = path.as_bytes();
        let mut node = self;
        let mut pos = 0;
        // set when we left a node holding a value with exactly "/" remaining
        let mut tsr_fallback = false;

        loop {
            let rest = &bytes[pos..];
            let prefix = node.prefix.as_slice();
            if !rest.starts_with(prefix) {
                let missing_slash = node.value.is_some()
                    && prefix.len() == rest.len() + 1
                    && prefix.ends_with(b"/")
                    && prefix.starts_with(rest);
                return (None, missing_slash || tsr_fallback);
            }
            pos += prefix.len();

            let rest = &bytes[pos..];
            let Some(&next) = rest.first() else {
                if let Some(value) = &node.value {
                    return (Some(value), false);
                }
                return (None, tsr_fallback || node.slash_below());
            };

            if let Some(child) = node.static_child(next) {
                tsr_fallback = rest == b"/" && node.value.is_some();
                node = child;
                continue;
            }

            if next != b'/' {
                if let Some(param) = node.param.as_deref() {
                    let end = rest.iter().position(|&b| b == b'/').unwrap_or(rest.len());
                    // The literal before a wildcard ends on a char boundary of
                    // its pattern, so `pos` is one in `path` too; `end` stops
                    // at `/` or the end of the path.
                    if let Some(sink) = params.as_deref_mut() {
                        sink.push((param.binding_name(), path[pos..pos + end].to_owned()));
                    }
                    pos += end;
                    tsr_fallback = false;
                    node = param;
                    continue;
                }
            } else if let Some(catch_all) = node.catch_all.as_deref() {
                if let Some(sink) = params.as_deref_mut() {
                    sink.push((catch_all.binding_name(), path[pos..].to_owned()));
                }
                return (catch_all.value.as_ref(), false);
            }

            return (None, rest == b"/" && node.value.is_some());
        }
    }

    /// Case-insensitive lookup that returns the canonically-cased path.
    ///
    /// Static text is compared one character at a time, trying the
    /// character as given and its single-character lower and upper case
    /// forms; the bytes stored in the tree are copied to the result.
    /// Parameter and catch-all captures are copied unchanged. With
    /// `fix_trailing_slash` a single missing or surplus trailing slash is
    /// corrected as well.
    pub(crate) fn find_case_insensitive_path(
        &self,
        path: &str,
        fix_trailing_slash: bool,
    ) -> Option<String> {
        let mut out = Vec::with_capacity(path.len() + 1);
        if self.find_ci(0, path, &mut out, fix_trailing_slash) {
            String::from_utf8(out).ok()
        } else {
            None
        }
    }

    /// Match `rest` starting at byte `off` of this node's prefix.
    fn find_ci(&self, off: usize, rest: &str, out: &mut Vec<u8>, fix_ts: bool) -> bool {
        let Some(c) = rest.chars().next() else {
            return self.find_ci_end(off, out, fix_ts);
        };
        let after = &rest[c.len_utf8()..];

        // several children may match once case is ignored
        let mut buf = [0u8; 4];
        for variant in case_variants(c).into_iter().flatten() {
            let encoded = variant.encode_utf8(&mut buf).as_bytes();
            if self.find_ci_bytes(off, encoded, after, out, fix_ts) {
                return true;
            }
        }

        if off < self.prefix.len() {
            return false;
        }

        if c != '/' {
            if let Some(param) = self.param.as_deref() {
                let end = rest.find('/').unwrap_or(rest.len());
                let mark = out.len();
                out.extend_from_slice(rest[..end].as_bytes());
                if param.find_ci(0, &rest[end..], out, fix_ts) {
                    return true;
                }
                out.truncate(mark);
            }
        } else if self.catch_all.is_some() {
            out.extend_from_slice(rest.as_bytes());
            return true;
        }

        // surplus trailing slash
        fix_ts && rest == "/" && self.value.is_some()
    }

    /// Match the encoding of one character, which may continue into a
    /// static child when a prefix ends inside it, then resume with `after`.
    fn find_ci_bytes(
        &self,
        off: usize,
        bytes: &[u8],
        after: &str,
        out: &mut Vec<u8>,
        fix_ts: bool,
    ) -> bool {
        let Some(&first) = bytes.first() else {
            return self.find_ci(off, after, out, fix_ts);
        };
        if off == self.prefix.len() {
            return self
                .static_child(first)
                .is_some_and(|child| child.find_ci_bytes(0, bytes, after, out, fix_ts));
        }

        let k = bytes.len().min(self.prefix.len() - off);
        if self.prefix[off..off + k] != bytes[..k] {
            return false;
        }
        let mark = out.len();
        out.extend_from_slice(&bytes[..k]);
        if self.find_ci_bytes(off + k, &bytes[k..], after, out, fix_ts) {
            return true;
        }
        out.truncate(mark);
        false
    }

    /// The path is exhausted at byte `off` of this node's prefix.
    fn find_ci_end(&self, off: usize, out: &mut Vec<u8>, fix_ts: bool) -> bool {
        let n = self.prefix.len();
        if off == n {
            if self.value.is_some() {
                return true;
            }
            if fix_ts && self.slash_below() {
                out.push(b'/');
                return true;
            }
            return false;
        }

        // the path lacks this node's trailing slash
        if fix_ts && self.value.is_some() && off + 1 == n && self.prefix[off] == b'/' {
            out.push(b'/');
            return true;
        }
        false
    }
}

/// `c` followed by its lower and upper case forms, when those are single
/// characters different from `c`.
fn case_variants(c: char) -> [Option<char>; 3] {
    let lower = single_char(c.to_lowercase()).filter(|&l| l != c);
    let upper = single_char(c.to_uppercase()).filter(|&u| u != c && Some(u) != lower);
    [Some(c), lower, upper]
}

fn single_char(mut chars: impl Iterator<Item = char>) -> Option<char> {
    let first = chars.next()?;
    chars.next().is_none().then_some(first)
}
