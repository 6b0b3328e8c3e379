/// Errors that can occur while validating plugin metadata.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The metadata object is a valid package description but not a plugin.
    ///
    /// Callers enumerating search results must skip these silently; a
    /// registry full of ordinary packages is not an error condition.
    #[error("'{name}' is not a plugin: missing '{marker}'")]
    NotAPlugin { name: String, marker: &'static str },

    /// A field failed schema validation.
    ///
    /// `path` is the dotted path into the metadata object (e.g.
    /// `osSpecificArtifact.linux`), `actual` a JSON rendering of the value
    /// found there (`undefined` when the field is missing).
    #[error("field '{path}': expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: String,
    },

    /// The identifier string could not be split into publisher and name.
    #[error("invalid plugin identifier '{0}': expected 'publisher.name'")]
    InvalidIdentifier(String),
}

pub type Result<T> = std::result::Result<T, Error>;
