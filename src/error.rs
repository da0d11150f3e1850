use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatewireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed description text. Fatal to the compilation; no Model is produced.
    #[error("{line}:{column}: {message}")]
    Description {
        line: usize,
        column: usize,
        message: String,
    },

    /// The Model violates a generator precondition. Nothing is emitted.
    #[error("generation error: {0}")]
    Generation(String),

    #[error("communications error: {0}")]
    Communications(String),

    #[error("mismatching build IDs: expected {expected:#010x} but got {actual:#010x}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// Recoverable console command error (unknown name, unparsable value).
    #[error("{0}")]
    Command(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// A decoded frame referenced a state or value outside the declared tables.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl StatewireError {
    pub(crate) fn description(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Description {
            line,
            column,
            message: message.into(),
        }
    }
}

impl From<serialport::Error> for StatewireError {
    fn from(e: serialport::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
