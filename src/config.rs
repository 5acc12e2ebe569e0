//! Engine-wide constants.

/// Format tag written at the head of every serialized object record.
pub const OBJECT_FORMAT: &str = "scn-obj";

/// Format tag of a full scene file.
pub const SCENE_FORMAT: &str = "scn-scene";

/// Current object record version. Readers accept anything up to this.
pub const OBJECT_VERSION: u32 = 1;

/// Current scene file version.
pub const SCENE_VERSION: u32 = 1;

/// Number of render/audio threads a fresh scene is sized for.
pub const DEFAULT_NUM_THREADS: usize = 1;

/// Default tick interval of the render worker pool, milliseconds.
pub const DEFAULT_TICK_MS: u64 = 20;

/// Depth cap for chained modulator evaluation. Resolution passes reject
/// modulation cycles up front; the cap only guards against curves loaded
/// from hand-edited files.
pub const MAX_MODULATION_DEPTH: u32 = 32;
