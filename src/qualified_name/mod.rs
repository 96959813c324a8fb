//! Hierarchical entity names of the form `[/namespace[/package]]/entity`.
//!
//! Functions-style resources (actions, packages, triggers, rules) address
//! entities that live in a namespace distinct from the resource's own
//! identity. Only a leading `/` introduces a namespace: `pkg/action` is a
//! package-scoped action relative to the default namespace, while
//! `/ns/action` names the namespace explicitly. Parsing never infers a
//! segment beyond the default-namespace substitution performed by
//! [`QualifiedName::resolve_with_default`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const SEPARATOR: char = '/';
const MAX_SEGMENTS: usize = 3;

/// Errors raised while parsing a qualified name.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum QualifiedNameError {
    /// Raised for more than three segments or an empty interior segment.
    #[error("malformed identifier {raw:?}: {reason}")]
    MalformedIdentifier {
        /// Input passed by the caller.
        raw: String,
        /// Short description of the violation.
        reason: String,
    },
    /// Raised when the entity segment is missing or empty.
    #[error("entity name must not be empty in {raw:?}")]
    EmptyEntityName {
        /// Input passed by the caller.
        raw: String,
    },
}

/// A parsed `[/namespace[/package]]/entity` name.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct QualifiedName {
    namespace: Option<String>,
    package: Option<String>,
    entity: String,
}

impl QualifiedName {
    /// Builds a name from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`QualifiedNameError::EmptyEntityName`] when `entity` is
    /// empty and [`QualifiedNameError::MalformedIdentifier`] when any part is
    /// empty or contains a `/`. A package without a namespace yields a
    /// relative name.
    pub fn new(
        namespace: Option<String>,
        package: Option<String>,
        entity: impl Into<String>,
    ) -> Result<Self, QualifiedNameError> {
        let name = Self {
            namespace,
            package,
            entity: entity.into(),
        };
        name.validate()?;
        Ok(name)
    }

    /// Parses a raw name.
    ///
    /// With a leading `/` the name is absolute: `/ns/entity` or
    /// `/ns/pkg/entity`. Without one it is relative: `entity` or
    /// `pkg/entity`, with the namespace left for
    /// [`QualifiedName::resolve_with_default`] to fill in. A lone `/entity`
    /// carries no namespace either.
    ///
    /// # Errors
    ///
    /// Returns [`QualifiedNameError::MalformedIdentifier`] for more than
    /// three segments, an empty interior segment, or a relative name with
    /// more than two segments, and [`QualifiedNameError::EmptyEntityName`]
    /// when the entity is empty (including a trailing slash).
    pub fn parse(raw: &str) -> Result<Self, QualifiedNameError> {
        let (absolute, body) = raw
            .strip_prefix(SEPARATOR)
            .map_or((false, raw), |body| (true, body));
        let segments: Vec<&str> = body.split(SEPARATOR).collect();
        if segments.len() > MAX_SEGMENTS {
            return Err(malformed(raw, "more than three segments"));
        }

        let Some((entity, scope)) = segments.split_last() else {
            return Err(empty_entity(raw));
        };
        if entity.is_empty() {
            return Err(empty_entity(raw));
        }
        if scope.iter().any(|segment| segment.is_empty()) {
            return Err(malformed(raw, "empty interior segment"));
        }

        let (namespace, package) = match (absolute, scope) {
            (_, []) => (None, None),
            (true, [namespace]) => (Some((*namespace).to_owned()), None),
            (true, [namespace, package]) => {
                (Some((*namespace).to_owned()), Some((*package).to_owned()))
            }
            (false, [package]) => (None, Some((*package).to_owned())),
            (false, _) => return Err(malformed(raw, "a namespace requires a leading '/'")),
            (true, _) => return Err(malformed(raw, "more than three segments")),
        };

        Ok(Self {
            namespace,
            package,
            entity: (*entity).to_owned(),
        })
    }

    /// Parses `raw`, substituting `default_namespace` when the name carries
    /// no namespace of its own.
    ///
    /// # Errors
    ///
    /// Propagates [`QualifiedName::parse`] failures, and returns
    /// [`QualifiedNameError::MalformedIdentifier`] when the default namespace
    /// is empty or contains a `/`.
    pub fn resolve_with_default(
        raw: &str,
        default_namespace: &str,
    ) -> Result<Self, QualifiedNameError> {
        let mut name = Self::parse(raw)?;
        if name.namespace.is_none() {
            if default_namespace.is_empty() || default_namespace.contains(SEPARATOR) {
                return Err(malformed(raw, "invalid default namespace"));
            }
            name.namespace = Some(default_namespace.to_owned());
        }
        Ok(name)
    }

    /// Namespace segment, when present.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Package segment, when present.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Entity segment.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Path of the entity inside its namespace (`package/entity` or
    /// `entity`), as used in REST paths under `/namespaces/{ns}/...`.
    #[must_use]
    pub fn path_in_namespace(&self) -> String {
        self.package.as_ref().map_or_else(
            || self.entity.clone(),
            |package| format!("{package}{SEPARATOR}{}", self.entity),
        )
    }

    /// Canonical string form. Names with a namespace carry a leading `/`;
    /// relative names are rendered without one.
    #[must_use]
    pub fn format(&self) -> String {
        self.to_string()
    }

    fn validate(&self) -> Result<(), QualifiedNameError> {
        let raw = self.to_string();
        if self.entity.is_empty() {
            return Err(empty_entity(&raw));
        }
        let parts = [
            self.namespace.as_deref(),
            self.package.as_deref(),
            Some(self.entity.as_str()),
        ];
        if parts
            .iter()
            .flatten()
            .any(|part| part.is_empty() || part.contains(SEPARATOR))
        {
            return Err(malformed(&raw, "segments must be non-empty and free of '/'"));
        }
        Ok(())
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(f, "{SEPARATOR}{namespace}{SEPARATOR}")?;
        }
        if let Some(package) = &self.package {
            write!(f, "{package}{SEPARATOR}")?;
        }
        f.write_str(&self.entity)
    }
}

impl FromStr for QualifiedName {
    type Err = QualifiedNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn malformed(raw: &str, reason: &str) -> QualifiedNameError {
    QualifiedNameError::MalformedIdentifier {
        raw: raw.to_owned(),
        reason: reason.to_owned(),
    }
}

fn empty_entity(raw: &str) -> QualifiedNameError {
    QualifiedNameError::EmptyEntityName {
        raw: raw.to_owned(),
    }
}
