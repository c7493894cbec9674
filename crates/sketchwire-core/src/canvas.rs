//! Canvas history and the event reducer.

use crate::element::{Element, ElementId, Fill, Stroke};
use crate::event::CanvasEvent;
use serde::{Deserialize, Serialize};

/// Everything drawn on the canvas, in paint order.
///
/// Elements are immutable once appended, except that the trailing element
/// may be an incomplete [`Stroke`] that still receives points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasState {
    /// Paint order: later elements cover earlier ones.
    pub elements: Vec<Element>,
    /// Next id handed out by the reducer.
    #[serde(default)]
    next_id: u64,
    /// Bumped whenever already painted elements are removed or replaced.
    #[serde(default)]
    generation: u64,
}

impl CanvasState {
    /// Create an empty canvas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a canvas from a snapshot.
    pub fn from_elements(elements: Vec<Element>) -> Self {
        let mut state = Self::new();
        state.replace(elements);
        state
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn last(&self) -> Option<&Element> {
        self.elements.last()
    }

    /// Drawing-session counter; changes on undo, clear and snapshot replacement.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The trailing stroke if it can still grow.
    pub fn open_stroke(&self) -> Option<&Stroke> {
        self.elements
            .last()
            .filter(|el| el.is_open_stroke())
            .and_then(Element::as_stroke)
    }

    /// Apply one event in place. Returns whether the element list changed.
    ///
    /// Never fails: events that do not make sense for the current state are
    /// ignored.
    pub fn apply(&mut self, event: &CanvasEvent) -> bool {
        match event {
            CanvasEvent::NewStroke { color, width, point } => {
                let id = self.allocate_id();
                self.push(Element::Stroke(Stroke::new(id, *color, *width, *point)));
                true
            }
            CanvasEvent::StrokePoint { point } => match self.elements.last_mut() {
                Some(Element::Stroke(stroke)) if !stroke.complete => {
                    stroke.points.push(*point);
                    true
                }
                _ => {
                    log::debug!("stroke point without an open stroke, ignored");
                    false
                }
            },
            CanvasEvent::EndStroke => self.finish_open_stroke(),
            CanvasEvent::NewFill { color, seed } => {
                let id = self.allocate_id();
                self.push(Element::Fill(Fill {
                    id,
                    color: *color,
                    seed: *seed,
                }));
                true
            }
            CanvasEvent::Undo => {
                if self.elements.pop().is_some() {
                    self.generation += 1;
                    true
                } else {
                    false
                }
            }
            CanvasEvent::Clear => {
                if self.elements.is_empty() {
                    return false;
                }
                self.elements.clear();
                self.generation += 1;
                true
            }
            CanvasEvent::FullState { elements } => {
                self.replace(elements.clone());
                true
            }
            CanvasEvent::Unknown { kind } => {
                log::debug!("ignoring unknown event type {kind:?}");
                false
            }
        }
    }

    fn allocate_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append an element, finalizing a trailing open stroke first.
    fn push(&mut self, element: Element) {
        self.finish_open_stroke();
        self.elements.push(element);
    }

    fn finish_open_stroke(&mut self) -> bool {
        match self.elements.last_mut() {
            Some(Element::Stroke(stroke)) if !stroke.complete => {
                stroke.complete = true;
                true
            }
            _ => false,
        }
    }

    fn replace(&mut self, elements: Vec<Element>) {
        let max_id = elements.iter().map(|el| el.id().0 + 1).max().unwrap_or(0);
        self.next_id = self.next_id.max(max_id);
        self.elements = elements;
        self.generation += 1;
    }
}

/// Apply `event` to `state`, producing the next state.
pub fn apply(mut state: CanvasState, event: &CanvasEvent) -> CanvasState {
    state.apply(event);
    state
}

/// Fold a sequence of events over `state` in order.
pub fn apply_all<'a>(
    state: CanvasState,
    events: impl IntoIterator<Item = &'a CanvasEvent>,
) -> CanvasState {
    events.into_iter().fold(state, apply)
}
