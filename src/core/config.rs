//! Tuning constants with documented rationale
//!
//! Collected here so corpus-dependent sizing and the propagation safety
//! valve are adjustable in one place.

/// Default slot count for the template probe table.
///
/// Must exceed the number of uniquely-named templates in the corpus; the
/// loader treats a full table as a fatal configuration error rather than
/// growing it, so bump this when the corpus outgrows it.
pub const TEMPLATE_TABLE_SIZE: usize = 8192;

/// How many leading bytes of a template name participate in the hash.
///
/// Longer names still compare fully on probe; only the hash is bounded.
pub const HASH_PREFIX_LEN: usize = 20;

/// Depth budget for cascading trigger propagation.
///
/// Cascades terminate through the "no-op on unchanged state" rule at each
/// mechanism that can re-trigger; content that still exceeds this depth
/// surfaces as an error instead of looping forever.
pub const MAX_CASCADE_DEPTH: usize = 64;

/// Speed a gate receives when a trigger arms its open/close transition.
///
/// Nonzero so the traversal change is gradual over the following ticks
/// rather than instantaneous.
pub const GATE_TRANSITION_SPEED: f32 = 0.5;

/// Animation frames in a gate's open/close transition
pub const GATE_FRAMES: u32 = 6;

/// Facings a director rotates through before wrapping
pub const DIRECTOR_FACINGS: i32 = 8;
