use crate::error::ErrorKind;

impl From<bluer::Error> for crate::Error {
    fn from(err: bluer::Error) -> Self {
        crate::Error::new(kind_from_bluer(&err), Some(Box::new(err)), String::new())
    }
}

fn kind_from_bluer(err: &bluer::Error) -> ErrorKind {
    match err.kind {
        bluer::ErrorKind::ConnectionAttemptFailed => ErrorKind::ConnectionFailed,
        bluer::ErrorKind::InvalidArguments => ErrorKind::InvalidParameter,
        bluer::ErrorKind::InvalidLength => ErrorKind::InvalidParameter,
        bluer::ErrorKind::InvalidAddress(_) => ErrorKind::InvalidParameter,
        bluer::ErrorKind::InvalidName(_) => ErrorKind::InvalidParameter,
        bluer::ErrorKind::NotReady => ErrorKind::TransportUnavailable,
        bluer::ErrorKind::NotAuthorized | bluer::ErrorKind::NotPermitted => ErrorKind::TransportUnavailable,
        bluer::ErrorKind::NotSupported => ErrorKind::NotSupported,
        bluer::ErrorKind::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::Other,
    }
}

impl From<std::io::Error> for crate::Error {
    fn from(err: std::io::Error) -> Self {
        crate::Error::new(kind_from_io(err.kind()), Some(Box::new(err)), String::new())
    }
}

pub(super) fn kind_from_io(kind: std::io::ErrorKind) -> ErrorKind {
    use std::io::ErrorKind as StdErrorKind;

    match kind {
        StdErrorKind::NotFound => ErrorKind::NotFound,
        StdErrorKind::ConnectionRefused | StdErrorKind::ConnectionReset | StdErrorKind::TimedOut => {
            ErrorKind::ConnectionFailed
        }
        StdErrorKind::NotConnected | StdErrorKind::BrokenPipe | StdErrorKind::ConnectionAborted => {
            ErrorKind::NotConnected
        }
        StdErrorKind::AddrNotAvailable | StdErrorKind::PermissionDenied => ErrorKind::TransportUnavailable,
        StdErrorKind::Unsupported => ErrorKind::NotSupported,
        StdErrorKind::Other => ErrorKind::Other,
        // None of the other errors have semantic meaning for us
        _ => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_dropped_socket_is_not_connected() {
        assert_eq!(kind_from_io(std::io::ErrorKind::BrokenPipe), ErrorKind::NotConnected);
        let err = crate::Error::from(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    }
}
