//! Authoritative per-room stroke record.
//!
//! Completed and undone strokes are kept in commit-sequence order. Each author owns a
//! stack of sequence numbers into both logs, so undo and redo jump straight to that
//! author's most recent entry instead of scanning everyone else's strokes.
//!
//! A stroke id is never reused within a store: ids of dropped strokes stay retired
//! until the store itself goes away.

use std::collections::{BTreeMap, HashMap};

use inkroom_shared::{
    normalize_point, valid_stroke_id, AuthorId, Point, ShapeMeta, Stroke, StrokeStyle,
};

pub const DEFAULT_MAX_STROKES: usize = 5000;
pub const DEFAULT_MAX_POINTS_PER_STROKE: usize = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_strokes: usize,
    pub max_points_per_stroke: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_strokes: DEFAULT_MAX_STROKES,
            max_points_per_stroke: DEFAULT_MAX_POINTS_PER_STROKE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Pending,
    Completed,
    Undone,
    Retired,
}

#[derive(Default)]
pub struct StrokeStore {
    limits: StoreLimits,
    completed: BTreeMap<u64, Stroke>,
    undone: BTreeMap<u64, Stroke>,
    pending: HashMap<String, Stroke>,
    completed_by_author: HashMap<AuthorId, Vec<u64>>,
    undone_by_author: HashMap<AuthorId, Vec<u64>>,
    // every id ever started and where it currently is
    slots: HashMap<String, Slot>,
    next_seq: u64,
}

impl StrokeStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Opens a pending stroke holding `first` as its only point.
    ///
    /// Returns `false` without touching the store when the id or point is malformed,
    /// the id has been used before, or the store is full.
    pub fn start_stroke(
        &mut self,
        id: String,
        author_id: AuthorId,
        style: StrokeStyle,
        first: Point,
        shape_meta: Option<ShapeMeta>,
    ) -> bool {
        if !valid_stroke_id(&id) || self.slots.contains_key(&id) || self.is_full() {
            return false;
        }
        let Some(first) = normalize_point(first) else {
            return false;
        };
        let shape_meta = match shape_meta {
            Some(shape) => match shape.normalize() {
                Some(shape) => Some(shape),
                None => return false,
            },
            None => None,
        };
        let stroke = Stroke {
            id: id.clone(),
            author_id,
            style,
            points: vec![first],
            shape_meta,
        };
        self.slots.insert(id.clone(), Slot::Pending);
        self.pending.insert(id, stroke);
        true
    }

    pub fn add_point(&mut self, id: &str, point: Point) -> bool {
        let Some(point) = normalize_point(point) else {
            return false;
        };
        let max_points = self.limits.max_points_per_stroke;
        match self.pending.get_mut(id) {
            Some(stroke) if stroke.points.len() < max_points => {
                stroke.points.push(point);
                true
            }
            _ => false,
        }
    }

    /// Commits a pending stroke on top of the log. New work drops all redo history.
    pub fn end_stroke(&mut self, id: &str) -> bool {
        let Some(stroke) = self.pending.remove(id) else {
            return false;
        };
        self.clear_undone();
        self.commit(stroke);
        true
    }

    /// Deep copy of the completed strokes in commit order. Pending strokes are never
    /// included.
    pub fn snapshot(&self) -> Vec<Stroke> {
        self.completed.values().cloned().collect()
    }

    /// Moves `author_id`'s most recently committed stroke to the undo buffer.
    pub fn undo_last(&mut self, author_id: AuthorId) -> bool {
        let Some(seq) = pop_latest(&mut self.completed_by_author, author_id) else {
            return false;
        };
        let Some(stroke) = self.completed.remove(&seq) else {
            return false;
        };
        let seq = self.next_seq();
        self.slots.insert(stroke.id.clone(), Slot::Undone);
        self.undone_by_author
            .entry(author_id)
            .or_default()
            .push(seq);
        self.undone.insert(seq, stroke);
        true
    }

    /// Re-commits `author_id`'s most recently undone stroke at the top of the log.
    /// Refused while the store is full.
    pub fn redo_last(&mut self, author_id: AuthorId) -> bool {
        if self.is_full() {
            return false;
        }
        let Some(seq) = pop_latest(&mut self.undone_by_author, author_id) else {
            return false;
        };
        let Some(stroke) = self.undone.remove(&seq) else {
            return false;
        };
        self.commit(stroke);
        true
    }

    /// Drops every stroke. Their ids stay retired.
    pub fn clear(&mut self) {
        for slot in self.slots.values_mut() {
            *slot = Slot::Retired;
        }
        self.completed.clear();
        self.undone.clear();
        self.pending.clear();
        self.completed_by_author.clear();
        self.undone_by_author.clear();
    }

    /// Drops every pending stroke `author_id` left unfinished and returns their ids.
    pub fn discard_pending_by(&mut self, author_id: AuthorId) -> Vec<String> {
        let ids = self
            .pending
            .values()
            .filter(|stroke| stroke.author_id == author_id)
            .map(|stroke| stroke.id.clone())
            .collect::<Vec<_>>();
        for id in &ids {
            self.pending.remove(id);
            self.slots.insert(id.clone(), Slot::Retired);
        }
        ids
    }

    pub fn pending_author(&self, id: &str) -> Option<AuthorId> {
        self.pending.get(id).map(|stroke| stroke.author_id)
    }

    /// Whether `id` currently names a pending, completed or undone stroke.
    pub fn contains(&self, id: &str) -> bool {
        matches!(self.slots.get(id), Some(slot) if *slot != Slot::Retired)
    }

    /// Completed and pending strokes together have reached `max_strokes`. New strokes
    /// and redo are refused until something is undone or cleared.
    pub fn is_full(&self) -> bool {
        self.completed.len() + self.pending.len() >= self.limits.max_strokes
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn undone_len(&self) -> usize {
        self.undone.len()
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn commit(&mut self, stroke: Stroke) {
        let seq = self.next_seq();
        self.completed_by_author
            .entry(stroke.author_id)
            .or_default()
            .push(seq);
        self.slots.insert(stroke.id.clone(), Slot::Completed);
        self.completed.insert(seq, stroke);
    }

    fn clear_undone(&mut self) {
        for stroke in self.undone.values() {
            self.slots.insert(stroke.id.clone(), Slot::Retired);
        }
        self.undone.clear();
        self.undone_by_author.clear();
    }
}

fn pop_latest(index: &mut HashMap<AuthorId, Vec<u64>>, author_id: AuthorId) -> Option<u64> {
    let stack = index.get_mut(&author_id)?;
    let seq = stack.pop();
    if stack.is_empty() {
        index.remove(&author_id);
    }
    seq
}
