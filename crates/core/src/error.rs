/// Result alias that carries the custom [`DogDoorError`] type.
pub type Result<T> = std::result::Result<T, DogDoorError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum DogDoorError {
    /// Renderer creation, mesh upload or controller attachment failed while
    /// mounting the scene. Terminal for that mount.
    #[error("scene setup failed: {0}")]
    Setup(String),
    /// The audio output context refused to leave the suspended state.
    #[error("audio output could not be resumed: {0}")]
    AudioResume(String),
    /// A resource could not be released during teardown.
    #[error("cleanup: {0}")]
    Cleanup(String),
    /// A transient failure while starting or stopping a sound.
    #[error("audio: {0}")]
    Audio(String),
    /// A single frame could not be drawn.
    #[error("render: {0}")]
    Render(String),
    /// Arguments that can never be processed.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("fft: {0}")]
    Fft(#[from] realfft::FftError),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl DogDoorError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Re-labels any error raised while mounting as a [`DogDoorError::Setup`].
    pub fn into_setup(self) -> Self {
        match self {
            Self::Setup(_) => self,
            other => Self::Setup(other.to_string()),
        }
    }
}

impl From<&str> for DogDoorError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for DogDoorError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
