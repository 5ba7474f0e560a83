use std::sync::Arc;

use inkroom_shared::{valid_stroke_id, AuthorId, ClientMessage, ServerMessage};

use crate::state::{Outbound, RoomState};

/// Who receives the effect of an applied client event.
#[derive(Debug, PartialEq)]
pub enum Fanout {
    /// Every member except the sender.
    Others(ServerMessage),
    /// Every member including the sender.
    All(ServerMessage),
    /// Only the sender.
    Sender(ServerMessage),
}

/// Applies one validated client event to the room. `None` means nothing changed and
/// nothing is sent.
pub fn apply_client_message(
    room: &mut RoomState,
    sender: AuthorId,
    message: ClientMessage,
) -> Option<Fanout> {
    match message {
        ClientMessage::StrokeStart {
            id,
            style,
            point,
            shape_meta,
        } => {
            if room.store.is_full() {
                // the sender already drew it locally, so resync them
                tracing::debug!(author_id = %sender, strokes = room.store.len(), "Room is full");
                return Some(Fanout::Sender(snapshot_message(room)));
            }
            let style = style.sanitize();
            let started = room.store.start_stroke(
                id.clone(),
                sender,
                style.clone(),
                point,
                shape_meta,
            );
            if !started {
                return None;
            }
            Some(Fanout::Others(ServerMessage::StrokeStart {
                id,
                author_id: sender,
                style,
                point,
                shape_meta,
            }))
        }
        ClientMessage::StrokeSegment { id, point } => {
            if !owns_pending(room, sender, &id) || !room.store.add_point(&id, point) {
                return None;
            }
            Some(Fanout::Others(ServerMessage::StrokeSegment { id, point }))
        }
        ClientMessage::StrokeEnd { id } => {
            if !owns_pending(room, sender, &id) || !room.store.end_stroke(&id) {
                return None;
            }
            Some(Fanout::Others(ServerMessage::StrokeEnd { id }))
        }
        ClientMessage::Cursor { x, y } => {
            if !x.is_finite() || !y.is_finite() {
                return None;
            }
            Some(Fanout::Others(ServerMessage::Cursor {
                author_id: sender,
                x,
                y,
            }))
        }
        ClientMessage::Undo => {
            if !room.store.undo_last(sender) {
                return None;
            }
            tracing::debug!(author_id = %sender, strokes = room.store.len(), "Undo applied");
            Some(Fanout::All(snapshot_message(room)))
        }
        ClientMessage::Redo => {
            if !room.store.redo_last(sender) {
                return None;
            }
            tracing::debug!(author_id = %sender, strokes = room.store.len(), "Redo applied");
            Some(Fanout::All(snapshot_message(room)))
        }
        ClientMessage::Clear => {
            room.store.clear();
            tracing::info!(author_id = %sender, "Room cleared");
            Some(Fanout::All(snapshot_message(room)))
        }
    }
}

fn owns_pending(room: &RoomState, sender: AuthorId, id: &str) -> bool {
    valid_stroke_id(id) && room.store.pending_author(id) == Some(sender)
}

pub fn snapshot_message(room: &RoomState) -> ServerMessage {
    ServerMessage::State {
        strokes: room.store.snapshot(),
    }
}

pub fn deliver(room: &mut RoomState, sender: AuthorId, fanout: Fanout) {
    match fanout {
        Fanout::Others(message) => broadcast_except(room, sender, message),
        Fanout::All(message) => broadcast_all(room, message),
        Fanout::Sender(message) => send_where(room, message, |id| *id == sender),
    }
}

pub fn broadcast_except(room: &mut RoomState, sender: AuthorId, message: ServerMessage) {
    send_where(room, message, |id| *id != sender);
}

pub fn broadcast_all(room: &mut RoomState, message: ServerMessage) {
    send_where(room, message, |_| true);
}

fn send_where(room: &mut RoomState, message: ServerMessage, include: impl Fn(&AuthorId) -> bool) {
    let message = Arc::new(message);
    let mut stale = Vec::new();
    for (id, tx) in room.peers.iter() {
        if !include(id) {
            continue;
        }
        if tx.send(message.clone()).is_err() {
            stale.push(*id);
        }
    }
    for id in stale {
        room.peers.remove(&id);
    }
}

/// Registers a connection as a room member.
///
/// The newcomer's queue receives `hello` and then the baseline `state` before any
/// other room event can reach it; existing members get `user-joined`.
pub fn join_room(room: &mut RoomState, room_id: &str, author_id: AuthorId, tx: Outbound) {
    let members = room.peers.keys().copied().collect::<Vec<_>>();
    let _ = tx.send(Arc::new(ServerMessage::Hello {
        author_id,
        room_id: room_id.to_string(),
        members,
    }));
    let _ = tx.send(Arc::new(snapshot_message(room)));
    broadcast_all(room, ServerMessage::UserJoined { author_id });
    room.peers.insert(author_id, tx);
    room.touch();
}

/// Removes a member. Strokes it left unfinished are discarded; if any were, the
/// remaining members get a fresh `state` so their mirrors drop them too.
pub fn leave_room(room: &mut RoomState, author_id: AuthorId) -> usize {
    room.peers.remove(&author_id);
    let discarded = room.store.discard_pending_by(author_id);
    if !discarded.is_empty() {
        tracing::debug!(
            author_id = %author_id,
            discarded = discarded.len(),
            "Discarded unfinished strokes"
        );
        let snapshot = snapshot_message(room);
        broadcast_all(room, snapshot);
    }
    broadcast_all(room, ServerMessage::UserLeft { author_id });
    broadcast_all(room, ServerMessage::CursorLeave { author_id });
    room.touch();
    discarded.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkroom_shared::{Point, StrokeStyle, StyleInput};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use uuid::Uuid;

    use crate::store::StoreLimits;

    type Inbox = UnboundedReceiver<Arc<ServerMessage>>;

    fn drain(rx: &mut Inbox) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push((*message).clone());
        }
        messages
    }

    fn member(room: &mut RoomState) -> (AuthorId, Inbox) {
        let author = Uuid::new_v4();
        let (tx, rx) = unbounded_channel();
        join_room(room, "art", author, tx);
        (author, rx)
    }

    fn start(id: &str, x: f64) -> ClientMessage {
        ClientMessage::StrokeStart {
            id: id.to_string(),
            style: StyleInput::default(),
            point: Point::new(x, 0.0),
            shape_meta: None,
        }
    }

    fn apply(room: &mut RoomState, sender: AuthorId, message: ClientMessage) -> bool {
        match apply_client_message(room, sender, message) {
            Some(fanout) => {
                deliver(room, sender, fanout);
                true
            }
            None => false,
        }
    }

    fn draw(room: &mut RoomState, sender: AuthorId, id: &str) {
        assert!(apply(room, sender, start(id, 0.0)));
        assert!(apply(
            room,
            sender,
            ClientMessage::StrokeSegment {
                id: id.to_string(),
                point: Point::new(1.0, 1.0),
            }
        ));
        assert!(apply(room, sender, ClientMessage::StrokeEnd { id: id.to_string() }));
    }

    #[test]
    fn join_sends_hello_then_state_then_notifies_others() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, mut alice_rx) = member(&mut room);
        draw(&mut room, alice, "a1");
        drain(&mut alice_rx);

        let (bob, mut bob_rx) = member(&mut room);
        let bob_inbox = drain(&mut bob_rx);
        assert_eq!(bob_inbox.len(), 2);
        assert_eq!(
            bob_inbox[0],
            ServerMessage::Hello {
                author_id: bob,
                room_id: "art".into(),
                members: vec![alice],
            }
        );
        match &bob_inbox[1] {
            ServerMessage::State { strokes } => {
                assert_eq!(strokes.len(), 1);
                assert_eq!(strokes[0].id, "a1");
            }
            other => panic!("expected state, got {other:?}"),
        }

        assert_eq!(
            drain(&mut alice_rx),
            vec![ServerMessage::UserJoined { author_id: bob }]
        );
    }

    #[test]
    fn stroke_events_reach_peers_with_author() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, mut alice_rx) = member(&mut room);
        let (_bob, mut bob_rx) = member(&mut room);
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        draw(&mut room, alice, "a1");
        assert!(drain(&mut alice_rx).is_empty());
        let inbox = drain(&mut bob_rx);
        assert_eq!(inbox.len(), 3);
        assert_eq!(
            inbox[0],
            ServerMessage::StrokeStart {
                id: "a1".into(),
                author_id: alice,
                style: StrokeStyle::default(),
                point: Point::new(0.0, 0.0),
                shape_meta: None,
            }
        );
        assert_eq!(inbox[2], ServerMessage::StrokeEnd { id: "a1".into() });
    }

    #[test]
    fn duplicate_and_unknown_stroke_events_are_not_rebroadcast() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, _alice_rx) = member(&mut room);
        let (_bob, mut bob_rx) = member(&mut room);
        drain(&mut bob_rx);

        assert!(apply(&mut room, alice, start("x", 0.0)));
        assert!(!apply(&mut room, alice, start("x", 5.0)));
        assert!(!apply(
            &mut room,
            alice,
            ClientMessage::StrokeSegment {
                id: "ghost".into(),
                point: Point::new(1.0, 1.0),
            }
        ));
        assert!(!apply(&mut room, alice, ClientMessage::StrokeEnd { id: "ghost".into() }));
        assert_eq!(drain(&mut bob_rx).len(), 1);
    }

    #[test]
    fn only_the_author_extends_or_finishes_a_stroke() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, _alice_rx) = member(&mut room);
        let (bob, _bob_rx) = member(&mut room);

        assert!(apply(&mut room, alice, start("a1", 0.0)));
        assert!(!apply(
            &mut room,
            bob,
            ClientMessage::StrokeSegment {
                id: "a1".into(),
                point: Point::new(1.0, 1.0),
            }
        ));
        assert!(!apply(&mut room, bob, ClientMessage::StrokeEnd { id: "a1".into() }));
        assert_eq!(room.store.pending_author("a1"), Some(alice));
    }

    #[test]
    fn undo_broadcasts_state_to_everyone_including_sender() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, mut alice_rx) = member(&mut room);
        let (bob, mut bob_rx) = member(&mut room);
        draw(&mut room, alice, "a1");
        draw(&mut room, bob, "b1");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        assert!(apply(&mut room, alice, ClientMessage::Undo));
        for inbox in [drain(&mut alice_rx), drain(&mut bob_rx)] {
            match inbox.as_slice() {
                [ServerMessage::State { strokes }] => {
                    let ids = strokes.iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
                    assert_eq!(ids, vec!["b1"]);
                }
                other => panic!("expected a single state, got {other:?}"),
            }
        }

        assert!(apply(&mut room, alice, ClientMessage::Redo));
        match drain(&mut bob_rx).as_slice() {
            [ServerMessage::State { strokes }] => {
                let ids = strokes.iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
                assert_eq!(ids, vec!["b1", "a1"]);
            }
            other => panic!("expected a single state, got {other:?}"),
        }
    }

    #[test]
    fn full_room_keeps_every_mirror_on_the_server_snapshot() {
        let mut room = RoomState::new(StoreLimits {
            max_strokes: 1,
            max_points_per_stroke: 10,
        });
        let (alice, mut alice_rx) = member(&mut room);
        let (_bob, mut bob_rx) = member(&mut room);
        drain(&mut alice_rx);
        drain(&mut bob_rx);
        draw(&mut room, alice, "a1");
        drain(&mut alice_rx);
        assert_eq!(drain(&mut bob_rx).len(), 3);

        // only the sender hears about the refused stroke
        assert!(apply(&mut room, alice, start("a2", 0.0)));
        match drain(&mut alice_rx).as_slice() {
            [ServerMessage::State { strokes }] => {
                let ids = strokes.iter().map(|s| s.id.as_str()).collect::<Vec<_>>();
                assert_eq!(ids, vec!["a1"]);
            }
            other => panic!("expected a single state, got {other:?}"),
        }
        assert!(!apply(
            &mut room,
            alice,
            ClientMessage::StrokeSegment {
                id: "a2".into(),
                point: Point::new(1.0, 1.0),
            }
        ));
        assert!(!apply(&mut room, alice, ClientMessage::StrokeEnd { id: "a2".into() }));
        assert!(drain(&mut bob_rx).is_empty());

        let ids = room
            .store
            .snapshot()
            .into_iter()
            .map(|stroke| stroke.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a1".to_string()]);
    }

    #[test]
    fn retired_ids_cannot_be_taken_over_by_another_member() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, _alice_rx) = member(&mut room);
        let (bob, mut bob_rx) = member(&mut room);
        draw(&mut room, alice, "a1");
        assert!(apply(&mut room, alice, ClientMessage::Undo));
        draw(&mut room, bob, "b1");
        drain(&mut bob_rx);

        assert!(!apply(&mut room, bob, start("a1", 0.0)));
        assert!(drain(&mut bob_rx).is_empty());
        let snapshot = room.store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "b1");
        assert_eq!(snapshot[0].author_id, bob);
    }

    #[test]
    fn failed_undo_sends_nothing() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, mut alice_rx) = member(&mut room);
        let (bob, mut bob_rx) = member(&mut room);
        draw(&mut room, bob, "b1");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        assert!(!apply(&mut room, alice, ClientMessage::Undo));
        assert!(!apply(&mut room, alice, ClientMessage::Redo));
        assert!(drain(&mut alice_rx).is_empty());
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[test]
    fn clear_resets_everyone_to_an_empty_state() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, mut alice_rx) = member(&mut room);
        let (bob, mut bob_rx) = member(&mut room);
        draw(&mut room, alice, "a1");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        assert!(apply(&mut room, bob, ClientMessage::Clear));
        let empty = ServerMessage::State { strokes: vec![] };
        assert_eq!(drain(&mut alice_rx), vec![empty.clone()]);
        assert_eq!(drain(&mut bob_rx), vec![empty]);
        assert!(room.store.is_empty());
    }

    #[test]
    fn cursor_is_relayed_but_not_stored() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, mut alice_rx) = member(&mut room);
        let (_bob, mut bob_rx) = member(&mut room);
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        assert!(apply(&mut room, alice, ClientMessage::Cursor { x: 3.5, y: -2.0 }));
        assert!(!apply(&mut room, alice, ClientMessage::Cursor { x: f64::NAN, y: 0.0 }));
        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(
            drain(&mut bob_rx),
            vec![ServerMessage::Cursor {
                author_id: alice,
                x: 3.5,
                y: -2.0,
            }]
        );
        assert!(room.store.is_empty());
        assert_eq!(room.store.pending_len(), 0);
    }

    #[test]
    fn leaving_discards_unfinished_strokes_and_announces_departure() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, _alice_rx) = member(&mut room);
        let (_bob, mut bob_rx) = member(&mut room);
        draw(&mut room, alice, "a1");
        assert!(apply(&mut room, alice, start("a2", 0.0)));
        drain(&mut bob_rx);

        assert_eq!(leave_room(&mut room, alice), 1);
        assert_eq!(room.store.pending_len(), 0);
        assert!(!room.peers.contains_key(&alice));

        let inbox = drain(&mut bob_rx);
        assert_eq!(inbox.len(), 3);
        match &inbox[0] {
            ServerMessage::State { strokes } => {
                assert_eq!(strokes.len(), 1);
                assert_eq!(strokes[0].id, "a1");
            }
            other => panic!("expected state, got {other:?}"),
        }
        assert_eq!(inbox[1], ServerMessage::UserLeft { author_id: alice });
        assert_eq!(inbox[2], ServerMessage::CursorLeave { author_id: alice });
    }

    #[test]
    fn leaving_without_unfinished_strokes_skips_state() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, _alice_rx) = member(&mut room);
        let (_bob, mut bob_rx) = member(&mut room);
        drain(&mut bob_rx);

        assert_eq!(leave_room(&mut room, alice), 0);
        assert_eq!(
            drain(&mut bob_rx),
            vec![
                ServerMessage::UserLeft { author_id: alice },
                ServerMessage::CursorLeave { author_id: alice },
            ]
        );
    }

    #[test]
    fn closed_peers_are_pruned_on_broadcast() {
        let mut room = RoomState::new(StoreLimits::default());
        let (alice, _alice_rx) = member(&mut room);
        let (bob, bob_rx) = member(&mut room);
        drop(bob_rx);

        broadcast_except(&mut room, alice, ServerMessage::StrokeEnd { id: "x".into() });
        assert!(!room.peers.contains_key(&bob));
        assert!(room.peers.contains_key(&alice));
    }
}
