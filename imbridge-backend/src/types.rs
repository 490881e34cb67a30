use crate::protocol::{Interface, ProtocolError};
use crate::server::ObjectId;

/// Description of a global advertised to clients
#[derive(Debug)]
pub struct GlobalInfo {
    /// Interface of the global
    pub interface: &'static Interface,
    /// Advertised version
    pub version: u32,
    /// Whether the global was withdrawn from the registry
    pub disabled: bool,
}

/// Failure to set up a client connection
#[derive(Debug)]
pub enum InitError {
    /// The socket could not be configured
    Io(std::io::Error),
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Io(ref err) => Some(err),
        }
    }
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> Result<(), ::std::fmt::Error> {
        match self {
            InitError::Io(ref err) => std::fmt::Display::fmt(err, f),
        }
    }
}

/// An id that does not, or no longer, designate a live object, client or global.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidId;

impl std::error::Error for InvalidId {}

impl std::fmt::Display for InvalidId {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> Result<(), ::std::fmt::Error> {
        write!(f, "Invalid Id")
    }
}

/// Why a client was disconnected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The socket was closed or became unusable
    ConnectionClosed,
    /// The client was sent a fatal protocol error
    ProtocolError(ProtocolError),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> Result<(), ::std::fmt::Error> {
        match self {
            Self::ConnectionClosed => f.write_str("connection closed"),
            Self::ProtocolError(err) => std::fmt::Display::fmt(err, f),
        }
    }
}

/// Error returned by a request handler
///
/// The backend turns it into a `wl_display.error` event about the object and
/// tears that single object down, the client and its other objects survive.
#[derive(Debug, Clone)]
pub struct RequestError {
    pub(crate) object: Option<ObjectId>,
    /// Error code, from the error enum of the object's interface
    pub code: u32,
    /// Description sent to the client
    pub message: String,
}

impl RequestError {
    /// An error about the object the request was sent to
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self { object: None, code, message: message.into() }
    }

    /// An error about another object of the same client
    pub fn on(object: ObjectId, code: u32, message: impl Into<String>) -> Self {
        Self { object: Some(object), code, message: message.into() }
    }

    /// The object the error is about, if not the sender of the request
    pub fn object(&self) -> Option<&ObjectId> {
        self.object.as_ref()
    }
}

impl std::error::Error for RequestError {}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> Result<(), ::std::fmt::Error> {
        match self.object {
            Some(ref object) => write!(f, "error {} on {}: {}", self.code, object, self.message),
            None => write!(f, "error {}: {}", self.code, self.message),
        }
    }
}
