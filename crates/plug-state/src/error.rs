/// Errors from the host plugin manager or the remote bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The editor's native plugin manager failed a request.
    #[error("host plugin manager: {0}")]
    Host(String),

    /// The message round-trip to the remote helper failed.
    #[error("remote bridge: {0}")]
    Bridge(String),

    /// The remote helper answered with a version string that does not parse.
    #[error("remote reported invalid version '{version}' for '{id}': {source}")]
    RemoteVersion {
        id: String,
        version: String,
        source: semver::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
