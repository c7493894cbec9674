//! sketchwire core library
//!
//! Platform-agnostic canvas model for a collaborative drawing game: the
//! element history, the event reducer, the wire protocol, pointer mapping and
//! the socket transport.

pub mod canvas;
pub mod collaboration;
pub mod color;
pub mod coords;
pub mod element;
pub mod event;
pub mod input;
pub mod protocol;
pub mod sync;
pub mod wire_point;

pub use canvas::{CanvasState, apply, apply_all};
pub use collaboration::{CollaborationManager, Inbound, Notification};
pub use color::{ColorParseError, Rgb};
pub use coords::{BUFFER_SCALE, CoordinateMapper};
pub use element::{Element, ElementId, Fill, Stroke};
pub use event::{CanvasEvent, Dispatch};
pub use input::{Intent, PointerEvent, PointerTracker, Tool, ToolSettings};
pub use protocol::{Envelope, Message, ProtocolError};
pub use sync::{
    ConnectionState, LoopbackTransport, NativeWebSocket, Transport, TransportError, TransportEvent,
};
