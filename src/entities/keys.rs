//! Parameter id constants.
//!
//! Ids are storage keys: they stay stable across file versions and never
//! follow display text. Avoid string typos, enable IDE autocomplete.
//! Usage: `obj.params().get(P_X)`

// === Built-in ===
/// Activity scope select, created on every object
pub const P_ACTIVE_SCOPE: &str = "_activescope";

// === Transform ===
/// X component (translation/scale/rotation axis)
pub const P_X: &str = "x";
/// Y component
pub const P_Y: &str = "y";
/// Z component
pub const P_Z: &str = "z";
/// Rotation angle, degrees
pub const P_ANGLE: &str = "angle";
/// Transform-mix blend factor, 0..1
pub const P_MIX: &str = "mix";

// === Visual ===
/// Camera field of view, degrees
pub const P_FOV: &str = "fov";
/// Light intensity multiplier
pub const P_INTENSITY: &str = "intensity";
/// Light color, red component
pub const P_RED: &str = "red";
/// Light color, green component
pub const P_GREEN: &str = "green";
/// Light color, blue component
pub const P_BLUE: &str = "blue";

// === Audio ===
/// Oscillator frequency, Hz
pub const P_FREQ: &str = "freq";
/// Filter cutoff, Hz
pub const P_CUTOFF: &str = "cutoff";

// === Modulation / sequencing ===
/// Output value of a float modulator object
pub const P_VALUE: &str = "value";
/// Output amplitude of a float modulator object
pub const P_AMP: &str = "amp";
/// Sequence start, scene seconds
pub const P_START: &str = "start";
/// Sequence length, seconds
pub const P_LENGTH: &str = "length";
/// Sequence playback speed multiplier
pub const P_SPEED: &str = "speed";
/// Sequence value curve
pub const P_TIMELINE: &str = "timeline";
