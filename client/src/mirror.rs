//! Local copy of a room as the server last described it, plus this client's
//! optimistic strokes.
//!
//! A `state` event always wins: the stroke list is replaced wholesale and nothing
//! local is merged back in.

use std::collections::{HashMap, HashSet};

use inkroom_shared::{
    normalize_point, AuthorId, ClientMessage, Point, ServerMessage, ShapeMeta, Stroke, StyleInput,
};

#[derive(Default)]
pub struct Mirror {
    author_id: Option<AuthorId>,
    room_id: Option<String>,
    strokes: Vec<Stroke>,
    active_ids: HashSet<String>,
    members: HashSet<AuthorId>,
    cursors: HashMap<AuthorId, Point>,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author_id(&self) -> Option<AuthorId> {
        self.author_id
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn members(&self) -> &HashSet<AuthorId> {
        &self.members
    }

    pub fn cursors(&self) -> &HashMap<AuthorId, Point> {
        &self.cursors
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active_ids.contains(id)
    }

    /// Applies one server event. Returns whether anything visible changed.
    pub fn apply(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::Hello {
                author_id,
                room_id,
                members,
            } => {
                self.author_id = Some(author_id);
                self.room_id = Some(room_id);
                self.members = members.into_iter().collect();
                self.cursors.clear();
                true
            }
            ServerMessage::State { strokes } => {
                self.strokes = strokes;
                self.active_ids.clear();
                true
            }
            ServerMessage::UserJoined { author_id } => self.members.insert(author_id),
            ServerMessage::UserLeft { author_id } => {
                let cursor = self.cursors.remove(&author_id).is_some();
                self.members.remove(&author_id) || cursor
            }
            ServerMessage::StrokeStart {
                id,
                author_id,
                style,
                point,
                shape_meta,
            } => self.push_stroke(Stroke {
                id,
                author_id,
                style,
                points: vec![point],
                shape_meta,
            }),
            ServerMessage::StrokeSegment { id, point } => self.push_point(&id, point),
            ServerMessage::StrokeEnd { id } => self.active_ids.remove(&id),
            ServerMessage::Cursor { author_id, x, y } => {
                let Some(point) = normalize_point(Point::new(x, y)) else {
                    return false;
                };
                self.cursors.insert(author_id, point);
                true
            }
            ServerMessage::CursorLeave { author_id } => self.cursors.remove(&author_id).is_some(),
        }
    }

    /// Draws a new stroke locally and returns the event announcing it. Nothing is
    /// drawn before `hello` has assigned this client's author id.
    pub fn begin_stroke(
        &mut self,
        id: String,
        style: StyleInput,
        point: Point,
        shape_meta: Option<ShapeMeta>,
    ) -> Option<ClientMessage> {
        let author_id = self.author_id?;
        let style = style.sanitize();
        self.push_stroke(Stroke {
            id: id.clone(),
            author_id,
            style: style.clone(),
            points: vec![point],
            shape_meta,
        });
        Some(ClientMessage::StrokeStart {
            id,
            style: StyleInput::from(style),
            point,
            shape_meta,
        })
    }

    /// The event is returned even when the stroke is no longer mirrored locally; the
    /// server decides whether it still applies.
    pub fn extend_stroke(&mut self, id: String, point: Point) -> ClientMessage {
        self.push_point(&id, point);
        ClientMessage::StrokeSegment { id, point }
    }

    pub fn finish_stroke(&mut self, id: String) -> ClientMessage {
        self.active_ids.remove(&id);
        ClientMessage::StrokeEnd { id }
    }

    pub fn cursor(&self, x: f64, y: f64) -> Option<ClientMessage> {
        let point = normalize_point(Point::new(x, y))?;
        Some(ClientMessage::Cursor {
            x: point.x,
            y: point.y,
        })
    }

    fn push_stroke(&mut self, stroke: Stroke) -> bool {
        if normalize_point(stroke.points[0]).is_none()
            || self.strokes.iter().any(|known| known.id == stroke.id)
        {
            return false;
        }
        self.active_ids.insert(stroke.id.clone());
        self.strokes.push(stroke);
        true
    }

    fn push_point(&mut self, id: &str, point: Point) -> bool {
        let Some(point) = normalize_point(point) else {
            return false;
        };
        if !self.active_ids.contains(id) {
            return false;
        }
        match self.strokes.iter_mut().rev().find(|stroke| stroke.id == id) {
            Some(stroke) => {
                stroke.points.push(point);
                true
            }
            None => false,
        }
    }
}
