use thiserror::Error;

/// Rejected controller configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("setting `{name}` must be finite, got {value}")]
    NotFinite { name: &'static str, value: f32 },

    #[error("setting `{name}` must be positive, got {value}")]
    NotPositive { name: &'static str, value: f32 },

    #[error("setting `{name}` must not be negative, got {value}")]
    Negative { name: &'static str, value: f32 },

    #[error("setting `{name}` must lie in ({min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("world up vector must have a direction")]
    DegenerateWorldUp,

    #[error("history length must be at least 2, got {0}")]
    HistoryTooShort(usize),
}

/// Rejected body-shape description.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BodyError {
    #[error("actor has no body shapes")]
    Empty,

    #[error("body shape `{name}` has a non-positive radius {radius}")]
    BadRadius { name: String, radius: f32 },

    #[error("body shape `{name}` has a non-finite offset")]
    BadOffset { name: String },
}

/// Any failure raised while building an actor controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Body(#[from] BodyError),
}
