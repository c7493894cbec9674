//! Canvas events consumed by the reducer.

use crate::color::Rgb;
use crate::element::Element;
use kurbo::Point;

/// An event applied to [`CanvasState`](crate::canvas::CanvasState).
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// Start an incomplete stroke seeded with one point.
    NewStroke { color: Rgb, width: f64, point: Point },
    /// Append a point to the trailing stroke.
    StrokePoint { point: Point },
    /// Finalize the trailing stroke (pointer released or left the canvas).
    EndStroke,
    /// Append a bucket fill.
    NewFill { color: Rgb, seed: Point },
    /// Remove the last element.
    Undo,
    /// Remove every element.
    Clear,
    /// Replace the whole element list with an authoritative snapshot.
    FullState { elements: Vec<Element> },
    /// A message type this client does not understand.
    Unknown { kind: String },
}

impl CanvasEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &str {
        match self {
            CanvasEvent::NewStroke { .. } => "new_stroke",
            CanvasEvent::StrokePoint { .. } => "stroke_point",
            CanvasEvent::EndStroke => "end_stroke",
            CanvasEvent::NewFill { .. } => "new_fill",
            CanvasEvent::Undo => "undo",
            CanvasEvent::Clear => "clear",
            CanvasEvent::FullState { .. } => "full_state",
            CanvasEvent::Unknown { kind } => kind,
        }
    }
}

/// An event together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub event: CanvasEvent,
    /// Confirmed events arrived from the server and are never sent back.
    pub confirmed: bool,
}

impl Dispatch {
    /// A locally originated (optimistic) event.
    pub fn local(event: CanvasEvent) -> Self {
        Self {
            event,
            confirmed: false,
        }
    }

    /// An event relayed by the server.
    pub fn remote(event: CanvasEvent) -> Self {
        Self {
            event,
            confirmed: true,
        }
    }
}
