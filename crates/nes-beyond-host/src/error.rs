use thiserror::Error;

/// Failures reported by a console core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("not a recognized program image")]
    UnrecognizedImage,

    #[error("console core could not be constructed: {0}")]
    Construction(String),

    #[error("no program is loaded")]
    NoProgram,

    #[error("snapshot is malformed: {0}")]
    MalformedState(&'static str),
}

/// Failures opening the audio output device.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("audio device rejected the stream: {0}")]
    Stream(String),
}

/// Failures of the persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a program load can fail. The display strings are shown to the user.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Please upload a valid .nes ROM file.")]
    UnsupportedFile,

    #[error("Failed to load ROM: {0}")]
    Core(#[from] CoreError),

    #[error("Audio output unavailable: {0}")]
    Audio(#[from] AudioError),
}

/// Save/load state failures surfaced to the user.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No game is loaded.")]
    NoProgram,

    #[error("No save state found for this game.")]
    NoSaveState,

    #[error("Could not capture the emulator state.")]
    CaptureFailed,

    #[error("Could not access saved states: {0}")]
    Store(#[from] StoreError),
}
