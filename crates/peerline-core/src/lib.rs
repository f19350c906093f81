//! Peerline Core API
//!
//! Stable types shared by the Peerline engine, its transports and its UIs:
//! domain types, the CSP message protocol, configuration, the error taxonomy,
//! the chat wire format, and the traits for external collaborators
//! (rendezvous service, audio capture, contact lookup, wall clock).

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod contacts;
pub mod errors;
pub mod media;
pub mod transport;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{
    AppEvent, AppEventReceiver, AppEventSender, ChannelError, Command, CommandReceiver,
    CommandSender, ConnectionStatus, Effect, EffectReceiver, EffectSender, Event, EventReceiver,
    EventSender, Failure, Generation, NonBlockingSend,
};
pub use config::{
    BrokerConfig, CallConfig, ChannelConfig, MessagingConfig, NotificationConfig, PeerlineConfig,
};
pub use contacts::{ContactBook, ContactDirectory, NoContacts};
pub use errors::{
    CaptureError, PeerlineError, PeerlineResult, RegistrationError, TransportError, WireError,
};
pub use media::{AudioTrack, LocalMedia, MediaDevices, RemoteMedia};
pub use transport::{CallControl, CallHandle, CallSignal, DataChannel, Inbound, IncomingCall, Rendezvous};
pub use types::{
    format_duration, AppTag, CallId, CallSnapshot, CallStatus, ChatMessage, Contact,
    DownloadedFile, LocalAddress, Notification, Recording, SystemTimeSource, TimeSource,
    Timestamp,
};
pub use wire::Frame;
