use std::fmt;

/// Route registration error
///
/// Returned by every registration call on [`Router`](super::Router) and
/// [`Group`](super::Group) when a pattern is malformed or would shadow an
/// existing route. These are programmer errors: setup code is expected to
/// propagate them with `?` and abort startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The pattern does not begin with `/`
    MissingLeadingSlash {
        /// The offending pattern
        path: String,
    },
    /// A wildcard token is malformed
    ///
    /// Covers empty names, illegal characters in a name, unclosed `{` and
    /// more than one wildcard inside a single path segment.
    InvalidWildcard {
        /// The full pattern being registered
        path: String,
        /// The wildcard token as written
        token: String,
    },
    /// A catch-all wildcard is followed by further segments
    CatchAllNotLast {
        /// The full pattern being registered
        path: String,
    },
    /// A catch-all wildcard is not directly preceded by `/`
    CatchAllWithoutSlash {
        /// The full pattern being registered
        path: String,
    },
    /// The pattern could match the same request as an existing route
    WildcardConflict {
        /// The full pattern being registered
        path: String,
        /// The part of the new pattern that conflicts
        segment: String,
        /// Description of the existing tree entry it collides with
        existing: String,
    },
    /// The exact concrete pattern is already registered for this method
    DuplicateRoute {
        /// The duplicated pattern
        path: String,
    },
    /// `serve_files` was given a path without a trailing `filepath` catch-all
    InvalidFilesPath {
        /// The offending path
        path: String,
    },
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::MissingLeadingSlash { path } => {
                write!(f, "path must begin with '/' in path '{path}'")
            }
            RouteError::InvalidWildcard { path, token } => {
                write!(f, "invalid wildcard '{token}' in path '{path}'")
            }
            RouteError::CatchAllNotLast { path } => {
                write!(
                    f,
                    "catch-all routes are only allowed at the end of the path in path '{path}'"
                )
            }
            RouteError::CatchAllWithoutSlash { path } => {
                write!(f, "no / before catch-all in path '{path}'")
            }
            RouteError::WildcardConflict {
                path,
                segment,
                existing,
            } => {
                write!(
                    f,
                    "'{segment}' in new path '{path}' conflicts with existing {existing}"
                )
            }
            RouteError::DuplicateRoute { path } => {
                write!(f, "a handler is already registered for path '{path}'")
            }
            RouteError::InvalidFilesPath { path } => {
                write!(
                    f,
                    "path must end with /*filepath or /{{filepath:*}} in path '{path}'"
                )
            }
        }
    }
}

impl std::error::Error for RouteError {}
