use std::panic::Location;

/// Error kinds that can occur in thimbl-lib
#[derive(Debug)]
pub enum ErrorKind {
    CacheMissingIdentity(String),
    Connect(String, std::io::Error),
    DelegatedFinger,
    Dns(String, std::io::Error),
    DnsNoAddress(String),
    FromUtf8(std::string::FromUtf8Error),
    General(String),
    InvalidAddress(String),
    InvalidMessageTime(String),
    Io(std::io::Error),
    MalformedPlan(serde_json::Error),
    NoHomeDirectory,
    PlanMarkerMissing,
    PlanTooLarge(usize),
    RequestTooLong(usize),
    ResponseTooLarge(usize),
    SerdeJson(serde_json::Error),
    Timeout(tokio::time::error::Elapsed),
    TimeFormat(time::error::Format),
    Transfer(String, std::io::Error),
    UnknownCommand(String),
    Usage(String, String), // error, usage line
    Utf8Error(std::str::Utf8Error),
}

/// Errors that can occur in thimbl-lib, including the file and line number
/// where they were generated
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    location: &'static Location<'static>,
}

impl Error {
    /// True for failures of the network round trip itself (as opposed to
    /// problems with what came back).
    pub fn is_transport(&self) -> bool {
        use ErrorKind::*;
        matches!(
            self.kind,
            Connect(..)
                | Dns(..)
                | DnsNoAddress(_)
                | FromUtf8(_)
                | ResponseTooLarge(_)
                | Timeout(_)
                | Transfer(..)
        )
    }

    /// True when a fetched response did not carry a usable plan
    pub fn is_malformed_plan(&self) -> bool {
        use ErrorKind::*;
        matches!(
            self.kind,
            PlanMarkerMissing | PlanTooLarge(_) | MalformedPlan(_) | InvalidMessageTime(_)
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.kind, self.location)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        match self {
            CacheMissingIdentity(me) => {
                write!(f, "Cache has no plan for its own identity {me}")
            }
            Connect(host, e) => write!(f, "Could not connect to {host}: {e}"),
            DelegatedFinger => write!(f, "Delegated fingering is not supported"),
            Dns(host, e) => write!(f, "Could not resolve {host}: {e}"),
            DnsNoAddress(host) => write!(f, "Host {host} resolved to no addresses"),
            FromUtf8(e) => write!(f, "UTF-8 error: {e}"),
            General(s) => write!(f, "{s}"),
            InvalidAddress(s) => write!(f, "Invalid address, should be user@host: {s}"),
            InvalidMessageTime(s) => write!(f, "Invalid message time: {s}"),
            Io(e) => write!(f, "I/O Error: {e}"),
            MalformedPlan(e) => write!(f, "Malformed plan: {e}"),
            NoHomeDirectory => write!(f, "Cannot find a home directory"),
            PlanMarkerMissing => write!(f, "Response has no Plan: marker"),
            PlanTooLarge(n) => write!(f, "Plan payload too large ({n} bytes)"),
            RequestTooLong(n) => write!(f, "Request line longer than {n} bytes"),
            ResponseTooLarge(n) => write!(f, "Response larger than {n} bytes"),
            SerdeJson(e) => write!(f, "SerdeJson Error: {e}"),
            Timeout(e) => write!(f, "Timeout: {e}"),
            TimeFormat(e) => write!(f, "Time format: {e}"),
            Transfer(host, e) => write!(f, "Connection to {host} failed: {e}"),
            UnknownCommand(s) => write!(f, "Unknown command: {s}"),
            Usage(e, u) => write!(f, "{}\n\nUsage: {}", e, u),
            Utf8Error(e) => write!(f, "UTF-8 error: {e}"),
        }
    }
}

// Note: we impl Into because our typical pattern is ErrorKind::Variant.into()
//       when we tried implementing From, the location was deep in rust code's
//       blanket into implementation, which wasn't the line number we wanted.
//
//       As for converting other error types, the ? operator uses From so it
//       is correct.
#[allow(clippy::from_over_into)]
impl Into<Error> for ErrorKind {
    #[track_caller]
    fn into(self) -> Error {
        Error {
            kind: self,
            location: Location::caller(),
        }
    }
}

impl From<String> for Error {
    #[track_caller]
    fn from(s: String) -> Error {
        Error {
            kind: ErrorKind::General(s),
            location: Location::caller(),
        }
    }
}

impl From<&str> for Error {
    #[track_caller]
    fn from(s: &str) -> Error {
        Error {
            kind: ErrorKind::General(s.to_string()),
            location: Location::caller(),
        }
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(e: std::io::Error) -> Error {
        Error {
            kind: ErrorKind::Io(e),
            location: Location::caller(),
        }
    }
}

impl From<serde_json::Error> for Error {
    #[track_caller]
    fn from(e: serde_json::Error) -> Error {
        Error {
            kind: ErrorKind::SerdeJson(e),
            location: Location::caller(),
        }
    }
}

impl From<time::error::Format> for Error {
    #[track_caller]
    fn from(e: time::error::Format) -> Error {
        Error {
            kind: ErrorKind::TimeFormat(e),
            location: Location::caller(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    #[track_caller]
    fn from(e: tokio::time::error::Elapsed) -> Error {
        Error {
            kind: ErrorKind::Timeout(e),
            location: Location::caller(),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    #[track_caller]
    fn from(e: std::str::Utf8Error) -> Error {
        Error {
            kind: ErrorKind::Utf8Error(e),
            location: Location::caller(),
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    #[track_caller]
    fn from(e: std::string::FromUtf8Error) -> Error {
        Error {
            kind: ErrorKind::FromUtf8(e),
            location: Location::caller(),
        }
    }
}
