use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-assigned identity of one connection. Stable for the connection's lifetime.
pub type AuthorId = Uuid;

pub const DEFAULT_COLOR: &str = "#111111";
pub const DEFAULT_WIDTH: f64 = 4.0;
pub const DEFAULT_OPACITY: f64 = 100.0;
pub const MAX_COLOR_LEN: usize = 32;
pub const MAX_STROKE_ID_LEN: usize = 64;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

pub fn normalize_point(point: Point) -> Option<Point> {
    if !point.x.is_finite() || !point.y.is_finite() {
        return None;
    }
    Some(point)
}

pub fn valid_stroke_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_STROKE_ID_LEN
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StrokeStyle {
    pub color: String,
    pub width: f64,
    pub opacity: f64,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_string(),
            width: DEFAULT_WIDTH,
            opacity: DEFAULT_OPACITY,
        }
    }
}

/// Style as sent by a client; every field may be missing.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct StyleInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl StyleInput {
    pub fn sanitize(self) -> StrokeStyle {
        StrokeStyle {
            color: sanitize_color(self.color.unwrap_or_default()),
            width: sanitize_width(self.width),
            opacity: sanitize_opacity(self.opacity),
        }
    }
}

impl From<StrokeStyle> for StyleInput {
    fn from(style: StrokeStyle) -> Self {
        Self {
            color: Some(style.color),
            width: Some(style.width),
            opacity: Some(style.opacity),
        }
    }
}

pub fn sanitize_color(mut color: String) -> String {
    if color.is_empty() {
        return DEFAULT_COLOR.to_string();
    }
    if color.len() > MAX_COLOR_LEN {
        let mut end = MAX_COLOR_LEN;
        while !color.is_char_boundary(end) {
            end -= 1;
        }
        color.truncate(end);
    }
    color
}

fn sanitize_width(width: Option<f64>) -> f64 {
    match width {
        Some(width) if width.is_finite() && width > 0.0 => width,
        _ => DEFAULT_WIDTH,
    }
}

fn sanitize_opacity(opacity: Option<f64>) -> f64 {
    match opacity {
        Some(opacity) if opacity.is_finite() => opacity.clamp(0.0, 100.0),
        _ => DEFAULT_OPACITY,
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Line,
    Rectangle,
    Circle,
}

/// Anchors of a primitive shape. The stroke's points then hold its outline.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ShapeMeta {
    #[serde(rename = "shapeKind")]
    pub kind: ShapeKind,
    #[serde(rename = "anchorStart")]
    pub start: Point,
    #[serde(rename = "anchorEnd")]
    pub end: Point,
}

impl ShapeMeta {
    pub fn normalize(self) -> Option<Self> {
        Some(Self {
            kind: self.kind,
            start: normalize_point(self.start)?,
            end: normalize_point(self.end)?,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: String,
    pub author_id: AuthorId,
    pub style: StrokeStyle,
    pub points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_meta: Option<ShapeMeta>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    StrokeStart {
        id: String,
        #[serde(default)]
        style: StyleInput,
        point: Point,
        #[serde(
            rename = "shapeMeta",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        shape_meta: Option<ShapeMeta>,
    },
    StrokeSegment {
        id: String,
        point: Point,
    },
    StrokeEnd {
        id: String,
    },
    Cursor {
        x: f64,
        y: f64,
    },
    Undo,
    Redo,
    Clear,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Hello {
        #[serde(rename = "authorId")]
        author_id: AuthorId,
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(default)]
        members: Vec<AuthorId>,
    },
    State {
        strokes: Vec<Stroke>,
    },
    UserJoined {
        #[serde(rename = "authorId")]
        author_id: AuthorId,
    },
    UserLeft {
        #[serde(rename = "authorId")]
        author_id: AuthorId,
    },
    StrokeStart {
        id: String,
        #[serde(rename = "authorId")]
        author_id: AuthorId,
        style: StrokeStyle,
        point: Point,
        #[serde(
            rename = "shapeMeta",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        shape_meta: Option<ShapeMeta>,
    },
    StrokeSegment {
        id: String,
        point: Point,
    },
    StrokeEnd {
        id: String,
    },
    Cursor {
        #[serde(rename = "authorId")]
        author_id: AuthorId,
        x: f64,
        y: f64,
    },
    CursorLeave {
        #[serde(rename = "authorId")]
        author_id: AuthorId,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Hello { .. } => "hello",
            ServerMessage::State { .. } => "state",
            ServerMessage::UserJoined { .. } => "user-joined",
            ServerMessage::UserLeft { .. } => "user-left",
            ServerMessage::StrokeStart { .. } => "stroke-start",
            ServerMessage::StrokeSegment { .. } => "stroke-segment",
            ServerMessage::StrokeEnd { .. } => "stroke-end",
            ServerMessage::Cursor { .. } => "cursor",
            ServerMessage::CursorLeave { .. } => "cursor-leave",
        }
    }
}
