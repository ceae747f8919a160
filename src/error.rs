/// Broad category of a failure.
///
/// The CLI maps each kind to an exit code; library callers use it to tell a
/// provider failure from a mismatch in their own inputs without parsing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments or configuration.
    Usage,
    /// Local file I/O.
    Io,
    /// Malformed data (duplicate timestamps, bad metadata rows, ...).
    InvalidData,
    /// Geography or time granularity disagree across signals.
    InputMismatch,
    /// The signal provider failed or returned nothing.
    Fetch,
    /// No lag produced a defined correlation.
    DegenerateCorrelation,
    /// A forecaster run failed.
    ForecastFailure,
    /// A long-running operation was interrupted.
    Cancelled,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Usage | ErrorKind::Io => 2,
            ErrorKind::InvalidData | ErrorKind::InputMismatch => 3,
            ErrorKind::Fetch => 4,
            ErrorKind::DegenerateCorrelation => 5,
            ErrorKind::ForecastFailure => 6,
            ErrorKind::Cancelled => 130,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidData, message)
    }

    pub fn input_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputMismatch, message)
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fetch, message)
    }

    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DegenerateCorrelation, message)
    }

    pub fn forecast(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ForecastFailure, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
