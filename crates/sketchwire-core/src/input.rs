//! Pointer lifecycle for the brush and bucket tools.

use crate::color::Rgb;
use crate::event::CanvasEvent;
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Available drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Tool {
    #[default]
    Brush,
    Bucket,
}

/// Current tool with its color and width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    pub tool: Tool,
    pub color: Rgb,
    /// Brush width in display pixels.
    pub width: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            color: Rgb::BLACK,
            width: 4.0,
        }
    }
}

/// Pointer event in buffer space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Point),
    Move(Point),
    Up(Point),
    /// The pointer left the canvas element.
    Leave,
}

/// What a pointer event asks the board to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Apply and send a canvas event.
    Event(CanvasEvent),
    /// Bucket click; the board decides whether the fill changes anything.
    Fill { color: Rgb, seed: Point },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum TrackerState {
    #[default]
    Idle,
    Drawing,
}

/// Turns pointer events into stroke/fill intents.
///
/// A stroke starts on pointer-down, grows on pointer-move and is finalized on
/// pointer-up, on leaving the canvas, or when a move lands outside the buffer.
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    pub settings: ToolSettings,
    state: TrackerState,
    last_point: Option<Point>,
}

impl PointerTracker {
    pub fn new(settings: ToolSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.state == TrackerState::Drawing
    }

    /// Handle a buffer-space pointer event.
    ///
    /// `buffer_size` bounds the canvas; `width_scale` converts the brush
    /// width from display to buffer pixels.
    pub fn handle(&mut self, event: PointerEvent, buffer_size: Size, width_scale: f64) -> Vec<Intent> {
        let inside = |p: Point| {
            p.x >= 0.0 && p.y >= 0.0 && p.x < buffer_size.width && p.y < buffer_size.height
        };

        match event {
            PointerEvent::Down(point) => {
                let mut intents = self.finish();
                if !inside(point) {
                    return intents;
                }
                match self.settings.tool {
                    Tool::Brush => {
                        self.state = TrackerState::Drawing;
                        self.last_point = Some(point);
                        intents.push(Intent::Event(CanvasEvent::NewStroke {
                            color: self.settings.color,
                            width: self.settings.width * width_scale,
                            point,
                        }));
                    }
                    Tool::Bucket => intents.push(Intent::Fill {
                        color: self.settings.color,
                        seed: point,
                    }),
                }
                intents
            }
            PointerEvent::Move(point) => {
                if !self.is_drawing() {
                    return Vec::new();
                }
                if !inside(point) {
                    return self.finish();
                }
                if self.last_point == Some(point) {
                    return Vec::new();
                }
                self.last_point = Some(point);
                vec![Intent::Event(CanvasEvent::StrokePoint { point })]
            }
            PointerEvent::Up(_) | PointerEvent::Leave => self.finish(),
        }
    }

    fn finish(&mut self) -> Vec<Intent> {
        if !self.is_drawing() {
            return Vec::new();
        }
        self.state = TrackerState::Idle;
        self.last_point = None;
        vec![Intent::Event(CanvasEvent::EndStroke)]
    }
}
