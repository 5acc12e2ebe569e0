//! Engine error types.
//!
//! Policy violations (hierarchy rules, cycles, editability) are recoverable:
//! the operation is rejected and no state changes. Load errors are fatal for
//! the load that raised them; no partial tree is returned.

use thiserror::Error;

/// Rejections raised by tree/graph mutations. Every variant leaves the
/// scene untouched.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("'{parent}' cannot hold a child of class '{child}'")]
    InvalidHierarchy { parent: String, child: String },

    #[error("moving '{id}' would make it its own ancestor")]
    CyclicHierarchy { id: String },

    #[error("modulating '{target}' from '{source_id}' would close a feedback loop")]
    CyclicModulation { source_id: String, target: String },

    #[error("connecting '{from}' -> '{to}' would close an audio loop")]
    CyclicConnection { from: String, to: String },

    #[error("parameter '{param}' is not editable")]
    NotEditable { param: String },

    #[error("parameter '{param}' cannot be modulated")]
    NotModulateable { param: String },

    #[error("'{source_id}' cannot act as a modulation source for '{param}'")]
    IncompatibleSource { source_id: String, param: String },

    /// Re-adding an existing (source, output) pair. The built-in facade
    /// treats this as an idempotent no-op instead of raising it — re-adding
    /// a link is a common, harmless editor action — but the case is part of
    /// the taxonomy for callers that want to surface it.
    #[error("modulator '{source_id}' already feeds parameter '{param}'")]
    DuplicateModulator { source_id: String, param: String },

    #[error("channels {first}..{last} out of range for '{id}' ({available} available)")]
    ChannelOutOfRange {
        id: String,
        first: u32,
        last: u32,
        available: u32,
    },

    #[error("unknown object class '{class}'")]
    UnknownClass { class: String },

    #[error("no object '{id}' in tree")]
    UnknownObject { id: String },

    #[error("object '{object}' has no parameter '{param}'")]
    UnknownParameter { object: String, param: String },

    #[error("'{id}' is not an audio object")]
    NotAudioObject { id: String },

    #[error("value of wrong type for parameter '{param}'")]
    WrongValueType { param: String },

    #[error("the scene root cannot be deleted, moved or replaced")]
    RootImmutable,
}

/// Fatal errors while reading a serialized scene/tree.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed stream: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad format tag: expected '{expected}', found '{found}'")]
    BadFormat {
        expected: &'static str,
        found: String,
    },

    #[error("record version {found} is newer than supported {supported}")]
    BadVersion { found: u32, supported: u32 },
}
