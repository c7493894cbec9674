//! Socket message envelope and payload codecs.
//!
//! Every frame is a JSON object `{ "type": string, "payload": any }`. Payload
//! points are already in buffer space and are never rescaled by peers.
//!
//! ```json
//! { "type": "STROKE", "payload": { "color": "#ff0000", "width": 4, "points": [[10, 20]] } }
//! { "type": "STROKE_POINT", "payload": [12, 24] }
//! { "type": "UNDO_STROKE" }
//! ```

use crate::color::Rgb;
use crate::element::{Element, ElementId, Stroke};
use crate::event::CanvasEvent;
use crate::wire_point;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const STROKE: &str = "STROKE";
pub const STROKE_POINT: &str = "STROKE_POINT";
pub const FILL: &str = "FILL";
pub const UNDO_STROKE: &str = "UNDO_STROKE";
pub const CLEAR_STROKES: &str = "CLEAR_STROKES";
pub const STATE: &str = "STATE";
pub const GET_STATE: &str = "GET_STATE";
pub const ERROR: &str = "error";

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),
    #[error("malformed {kind} payload: {reason}")]
    Payload { kind: &'static str, reason: String },
}

impl ProtocolError {
    fn payload(kind: &'static str, reason: impl ToString) -> Self {
        ProtocolError::Payload {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// Raw `{ type, payload }` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StrokePayload {
    color: Rgb,
    width: f64,
    #[serde(with = "wire_point::vec")]
    points: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FillPayload {
    color: Rgb,
    #[serde(with = "wire_point")]
    point: Point,
}

/// Older snapshots carry bare strokes without ids.
#[derive(Debug, Clone, Deserialize)]
struct LegacyStroke {
    color: Rgb,
    width: f64,
    #[serde(with = "wire_point::vec")]
    points: Vec<Point>,
}

#[derive(Debug, Clone, Deserialize)]
struct StatePayload {
    #[serde(default)]
    elements: Option<Vec<Element>>,
    #[serde(default)]
    strokes: Option<Vec<LegacyStroke>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Text(String),
    Object { message: String },
}

/// A decoded socket message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Stroke start; relayed snapshots may carry more than one point.
    Stroke { color: Rgb, width: f64, points: Vec<Point> },
    StrokePoint(Point),
    Fill { color: Rgb, point: Point },
    UndoStroke,
    ClearStrokes,
    State { elements: Vec<Element> },
    /// Ask the server for a `STATE` snapshot.
    GetState,
    Error { message: String },
    Unknown { kind: String },
}

impl Message {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        let Envelope { kind, payload } = envelope;
        match kind.as_str() {
            STROKE => {
                let p: StrokePayload = serde_json::from_value(payload)
                    .map_err(|e| ProtocolError::payload(STROKE, e))?;
                validate_width(STROKE, p.width)?;
                if p.points.is_empty() {
                    return Err(ProtocolError::payload(STROKE, "stroke without points"));
                }
                validate_points(STROKE, &p.points)?;
                Ok(Message::Stroke {
                    color: p.color,
                    width: p.width,
                    points: p.points,
                })
            }
            STROKE_POINT => {
                let [x, y]: [f64; 2] = serde_json::from_value(payload)
                    .map_err(|e| ProtocolError::payload(STROKE_POINT, e))?;
                let point = Point::new(x, y);
                validate_points(STROKE_POINT, &[point])?;
                Ok(Message::StrokePoint(point))
            }
            FILL => {
                let p: FillPayload = serde_json::from_value(payload)
                    .map_err(|e| ProtocolError::payload(FILL, e))?;
                validate_points(FILL, &[p.point])?;
                Ok(Message::Fill {
                    color: p.color,
                    point: p.point,
                })
            }
            UNDO_STROKE => Ok(Message::UndoStroke),
            CLEAR_STROKES => Ok(Message::ClearStrokes),
            GET_STATE => Ok(Message::GetState),
            STATE => decode_state(payload).map(|elements| Message::State { elements }),
            ERROR => {
                let message = match serde_json::from_value::<ErrorPayload>(payload) {
                    Ok(ErrorPayload::Text(message)) | Ok(ErrorPayload::Object { message }) => message,
                    Err(_) => "unknown server error".to_string(),
                };
                Ok(Message::Error { message })
            }
            _ => Ok(Message::Unknown { kind }),
        }
    }

    /// Wire representation.
    pub fn to_envelope(&self) -> Envelope {
        let (kind, payload) = match self {
            Message::Stroke {
                color,
                width,
                points,
            } => (
                STROKE.to_string(),
                to_value(&StrokePayload {
                    color: *color,
                    width: *width,
                    points: points.clone(),
                }),
            ),
            Message::StrokePoint(p) => (STROKE_POINT.to_string(), serde_json::json!([p.x, p.y])),
            Message::Fill { color, point } => (
                FILL.to_string(),
                to_value(&FillPayload {
                    color: *color,
                    point: *point,
                }),
            ),
            Message::UndoStroke => (UNDO_STROKE.to_string(), Value::Null),
            Message::ClearStrokes => (CLEAR_STROKES.to_string(), Value::Null),
            Message::State { elements } => (
                STATE.to_string(),
                serde_json::json!({ "elements": to_value(elements) }),
            ),
            Message::GetState => (GET_STATE.to_string(), Value::Null),
            Message::Error { message } => {
                (ERROR.to_string(), serde_json::json!({ "message": message }))
            }
            Message::Unknown { kind } => (kind.clone(), Value::Null),
        };
        Envelope { kind, payload }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> String {
        serde_json::to_string(&self.to_envelope()).unwrap_or_else(|e| {
            log::error!("failed to encode message: {e}");
            String::new()
        })
    }

    /// Canvas events carried by this message, in application order.
    pub fn into_events(self) -> Vec<CanvasEvent> {
        match self {
            Message::Stroke {
                color,
                width,
                points,
            } => {
                let mut iter = points.into_iter();
                let Some(first) = iter.next() else {
                    return Vec::new();
                };
                let mut events = vec![CanvasEvent::NewStroke {
                    color,
                    width,
                    point: first,
                }];
                events.extend(iter.map(|point| CanvasEvent::StrokePoint { point }));
                events
            }
            Message::StrokePoint(point) => vec![CanvasEvent::StrokePoint { point }],
            Message::Fill { color, point } => vec![CanvasEvent::NewFill { color, seed: point }],
            Message::UndoStroke => vec![CanvasEvent::Undo],
            Message::ClearStrokes => vec![CanvasEvent::Clear],
            Message::State { elements } => vec![CanvasEvent::FullState { elements }],
            Message::Unknown { kind } => vec![CanvasEvent::Unknown { kind }],
            Message::GetState | Message::Error { .. } => Vec::new(),
        }
    }

    /// Outbound message for a local event, if the event is ever sent.
    pub fn from_event(event: &CanvasEvent) -> Option<Self> {
        match event {
            CanvasEvent::NewStroke {
                color,
                width,
                point,
            } => Some(Message::Stroke {
                color: *color,
                width: *width,
                points: vec![*point],
            }),
            CanvasEvent::StrokePoint { point } => Some(Message::StrokePoint(*point)),
            CanvasEvent::NewFill { color, seed } => Some(Message::Fill {
                color: *color,
                point: *seed,
            }),
            CanvasEvent::Undo => Some(Message::UndoStroke),
            CanvasEvent::Clear => Some(Message::ClearStrokes),
            CanvasEvent::EndStroke | CanvasEvent::FullState { .. } | CanvasEvent::Unknown { .. } => {
                None
            }
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn validate_width(kind: &'static str, width: f64) -> Result<(), ProtocolError> {
    if width.is_finite() && width > 0.0 {
        Ok(())
    } else {
        Err(ProtocolError::payload(kind, format!("invalid width {width}")))
    }
}

fn validate_points(kind: &'static str, points: &[Point]) -> Result<(), ProtocolError> {
    match points.iter().find(|p| !wire_point::is_finite(**p)) {
        Some(p) => Err(ProtocolError::payload(kind, format!("non-finite point {p:?}"))),
        None => Ok(()),
    }
}

fn decode_state(payload: Value) -> Result<Vec<Element>, ProtocolError> {
    let state: StatePayload =
        serde_json::from_value(payload).map_err(|e| ProtocolError::payload(STATE, e))?;

    let mut elements = match (state.elements, state.strokes) {
        (Some(elements), _) => elements,
        (None, Some(strokes)) => strokes
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                Element::Stroke(Stroke {
                    id: ElementId(i as u64),
                    color: s.color,
                    width: s.width,
                    points: s.points,
                    complete: true,
                })
            })
            .collect(),
        (None, None) => return Err(ProtocolError::payload(STATE, "no elements or strokes")),
    };

    for element in &elements {
        match element {
            Element::Stroke(stroke) => {
                validate_width(STATE, stroke.width)?;
                if stroke.points.is_empty() {
                    return Err(ProtocolError::payload(STATE, format!("stroke {} has no points", stroke.id)));
                }
                validate_points(STATE, &stroke.points)?;
            }
            Element::Fill(fill) => validate_points(STATE, &[fill.seed])?,
        }
    }

    // Only the trailing stroke may still be growing.
    let tail = elements.len().saturating_sub(1);
    for element in &mut elements[..tail] {
        if let Element::Stroke(stroke) = element {
            stroke.complete = true;
        }
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Fill;

    #[test]
    fn test_decode_stroke() {
        let msg = Message::decode(
            r##"{"type":"STROKE","payload":{"color":"#ff0000","width":4,"points":[[10,20]]}}"##,
        )
        .unwrap();
        assert_eq!(
            msg,
            Message::Stroke {
                color: Rgb::new(255, 0, 0),
                width: 4.0,
                points: vec![Point::new(10.0, 20.0)],
            }
        );
    }

    #[test]
    fn test_multi_point_stroke_expands_to_point_events() {
        let msg = Message::Stroke {
            color: Rgb::BLACK,
            width: 1.0,
            points: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
        };
        let events = msg.into_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], CanvasEvent::NewStroke { .. }));
        assert_eq!(
            events[2],
            CanvasEvent::StrokePoint {
                point: Point::new(2.0, 2.0)
            }
        );
    }

    #[test]
    fn test_decode_point_and_bare_types() {
        assert_eq!(
            Message::decode(r#"{"type":"STROKE_POINT","payload":[1.5,2]}"#).unwrap(),
            Message::StrokePoint(Point::new(1.5, 2.0))
        );
        assert_eq!(
            Message::decode(r#"{"type":"UNDO_STROKE"}"#).unwrap(),
            Message::UndoStroke
        );
        assert_eq!(
            Message::decode(r#"{"type":"CLEAR_STROKES","payload":null}"#).unwrap(),
            Message::ClearStrokes
        );
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let msg = Message::decode(r#"{"type":"ROUND_START","payload":{"word":"cat"}}"#).unwrap();
        assert_eq!(
            msg.into_events(),
            vec![CanvasEvent::Unknown {
                kind: "ROUND_START".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert!(Message::decode("not json").is_err());
        assert!(Message::decode(r#"{"payload":[1,2]}"#).is_err());
        assert!(Message::decode(r#"{"type":"STROKE_POINT","payload":"x"}"#).is_err());
        assert!(
            Message::decode(r##"{"type":"STROKE","payload":{"color":"#000","width":0,"points":[[1,1]]}}"##)
                .is_err()
        );
        assert!(
            Message::decode(r##"{"type":"STROKE","payload":{"color":"#000","width":2,"points":[]}}"##)
                .is_err()
        );
        assert!(
            Message::decode(r#"{"type":"STROKE","payload":{"color":"blue","width":2,"points":[[1,1]]}}"#)
                .is_err()
        );
    }

    #[test]
    fn test_state_with_elements() {
        let elements = vec![Element::Fill(Fill {
            id: ElementId(3),
            color: Rgb::WHITE,
            seed: Point::new(1.0, 1.0),
        })];
        let text = Message::State {
            elements: elements.clone(),
        }
        .encode();
        assert_eq!(Message::decode(&text).unwrap(), Message::State { elements });
    }

    #[test]
    fn test_state_closes_all_but_trailing_stroke() {
        let msg = Message::decode(
            r##"{"type":"STATE","payload":{"elements":[
                {"kind":"stroke","id":0,"color":"#111","width":3,"points":[[0,0]],"complete":false},
                {"kind":"fill","id":1,"color":"#222","seed":[5,5]},
                {"kind":"stroke","id":2,"color":"#333","width":3,"points":[[1,1]]},
                {"kind":"stroke","id":3,"color":"#444","width":3,"points":[[2,2]],"complete":false}
            ]}}"##,
        )
        .unwrap();
        let Message::State { elements } = msg else {
            panic!("expected state");
        };
        let open: Vec<bool> = elements
            .iter()
            .filter_map(Element::as_stroke)
            .map(|stroke| !stroke.complete)
            .collect();
        assert_eq!(open, vec![false, false, true]);
    }

    #[test]
    fn test_state_with_legacy_strokes_and_extra_fields() {
        let msg = Message::decode(
            r##"{"type":"STATE","payload":{"round":2,"players":[],"strokes":[
                {"color":"#111","width":3,"points":[[0,0],[4,4]]},
                {"color":"#222","width":5,"points":[[1,1]]}
            ]}}"##,
        )
        .unwrap();
        let Message::State { elements } = msg else {
            panic!("expected state");
        };
        assert_eq!(elements.len(), 2);
        let second = elements[1].as_stroke().unwrap();
        assert_eq!(second.id, ElementId(1));
        assert!(second.complete);
        assert_eq!(second.width, 5.0);
    }

    #[test]
    fn test_error_payload_forms() {
        assert_eq!(
            Message::decode(r#"{"type":"error","payload":"room full"}"#).unwrap(),
            Message::Error {
                message: "room full".to_string()
            }
        );
        assert_eq!(
            Message::decode(r#"{"type":"error","payload":{"message":"bad"}}"#).unwrap(),
            Message::Error {
                message: "bad".to_string()
            }
        );
    }

    #[test]
    fn test_outbound_mapping() {
        let event = CanvasEvent::NewStroke {
            color: Rgb::new(0, 0, 255),
            width: 6.0,
            point: Point::new(2.0, 3.0),
        };
        let text = Message::from_event(&event).unwrap().encode();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "STROKE",
                "payload": {"color": "#0000ff", "width": 6.0, "points": [[2.0, 3.0]]}
            })
        );

        assert_eq!(Message::from_event(&CanvasEvent::Undo).unwrap().encode(), r#"{"type":"UNDO_STROKE"}"#);
        assert!(Message::from_event(&CanvasEvent::EndStroke).is_none());
        assert!(Message::from_event(&CanvasEvent::FullState { elements: vec![] }).is_none());
    }
}
