//! Btserial errors

/// The error type for serial link operations
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    message: String,
}

impl Error {
    /// Creates a new error of the given kind.
    ///
    /// Transport implementations outside this crate use this to report native failures.
    pub fn new(
        kind: ErrorKind,
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
        message: impl Into<String>,
    ) -> Self {
        Error {
            kind,
            source,
            message: message.into(),
        }
    }

    /// Returns the corresponding [ErrorKind] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.message.is_empty(), &self.source) {
            (true, None) => write!(f, "{}", &self.kind),
            (false, None) => write!(f, "{}: {}", &self.kind, &self.message),
            (true, Some(err)) => write!(f, "{}: {}", &self.kind, err),
            (false, Some(err)) => write!(f, "{}: {} ({})", &self.kind, &self.message, err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|x| {
            let x: &(dyn std::error::Error + 'static) = &**x;
            x
        })
    }
}

/// A list of general categories of serial link error.
#[non_exhaustive]
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// the native Bluetooth capability is not available on this platform
    TransportUnavailable,
    /// no serial connection is active
    NotConnected,
    /// the message cannot be represented in the code page
    Encoding,
    /// a packet write failed
    TransportWrite,
    /// connection failed
    ConnectionFailed,
    /// the operation is unsupported by the transport
    NotSupported,
    /// not found
    NotFound,
    /// invalid parameter
    InvalidParameter,
    /// already listening for incoming connections
    AlreadyListening,
    /// an internal error has occured
    Internal,
    /// error
    Other,
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            source: None,
            message: String::new(),
        }
    }
}
