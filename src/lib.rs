mod device;
mod diff;
mod dispatch;
mod entity;
mod error;
mod logger;
mod namespace;
mod protocol;
mod transport;
mod types;

pub use device::{Descriptor, Device, DeviceBuilder};
pub use dispatch::{
    payload_items, split_items, CustomParser, Dispatcher, HandlerKind, Lookup, NamespaceHandler,
};
pub use entity::{ClimateState, Entity, FlushHook, LightState, ModeState, Mp3State, NumericState};
pub use error::{Error, Result};
pub use logger::{LogThrottle, MessageLogMode, DEFAULT_LOG_SUPPRESSION};
pub use namespace::{CreatePolicy, Method, Namespace};
pub use protocol::{
    build_request, check_sign, compute_sign, get_element_by_key, get_payload, mode_payload,
    mp3_payload, onoff_payload, parse_message, spray_payload, Header, Message, DEFAULT_FROM,
    PAYLOAD_VERSION,
};
pub use transport::{is_ack, HttpTransport, HttpTransportBuilder, Transport, TransportConfig};
pub use types::*;
