use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use inkroom_shared::{AuthorId, ClientMessage, Point, ShapeKind, ShapeMeta, StyleInput};

use crate::mirror::Mirror;
use crate::util::make_id;
use crate::ws::{connect_ws, WsEvent, WsSender};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CursorView {
    author_id: AuthorId,
    x: f64,
    y: f64,
}

fn parse_shape_kind(kind: &str) -> Result<ShapeKind, JsValue> {
    match kind {
        "line" => Ok(ShapeKind::Line),
        "rectangle" => Ok(ShapeKind::Rectangle),
        "circle" => Ok(ShapeKind::Circle),
        _ => Err(JsValue::from_str(&format!("Unknown shape kind: {kind}"))),
    }
}

fn style_input(color: Option<String>, width: Option<f64>, opacity: Option<f64>) -> StyleInput {
    StyleInput {
        color,
        width,
        opacity,
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|error| JsValue::from_str(&error.to_string()))
}

/// Browser-side sync agent. Rendering stays in JS: `on_change` is called with the
/// event kind whenever the mirrored view changes, and the page reads the view back
/// through `strokes_json`/`cursors_json`.
#[wasm_bindgen]
pub struct BoardClient {
    mirror: Rc<RefCell<Mirror>>,
    sender: Rc<WsSender>,
}

#[wasm_bindgen]
impl BoardClient {
    #[wasm_bindgen(constructor)]
    pub fn new(room: Option<String>, on_change: js_sys::Function) -> Result<BoardClient, JsValue> {
        console_error_panic_hook::set_once();

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
        let mirror = Rc::new(RefCell::new(Mirror::new()));
        let mirror_cb = mirror.clone();
        let sender = connect_ws(&window, room.as_deref(), move |event| {
            let kind = match event {
                WsEvent::Open => "open",
                WsEvent::Close => "close",
                WsEvent::Error => "error",
                WsEvent::Message(message) => {
                    let kind = message.kind();
                    if !mirror_cb.borrow_mut().apply(message) {
                        return;
                    }
                    kind
                }
            };
            if let Err(error) = on_change.call1(&JsValue::NULL, &JsValue::from_str(kind)) {
                web_sys::console::error_1(&error);
            }
        })?;

        Ok(BoardClient { mirror, sender })
    }

    #[wasm_bindgen(js_name = isOpen)]
    pub fn is_open(&self) -> bool {
        self.sender.is_open()
    }

    #[wasm_bindgen(js_name = authorId)]
    pub fn author_id(&self) -> Option<String> {
        self.mirror.borrow().author_id().map(|id| id.to_string())
    }

    #[wasm_bindgen(js_name = roomId)]
    pub fn room_id(&self) -> Option<String> {
        self.mirror.borrow().room_id().map(str::to_string)
    }

    /// Starts a freehand stroke and returns its id, or `undefined` while the server
    /// has not greeted this client yet.
    #[wasm_bindgen(js_name = beginStroke)]
    pub fn begin_stroke(
        &self,
        x: f64,
        y: f64,
        color: Option<String>,
        width: Option<f64>,
        opacity: Option<f64>,
    ) -> Option<String> {
        let id = make_id();
        let message = self.mirror.borrow_mut().begin_stroke(
            id.clone(),
            style_input(color, width, opacity),
            Point::new(x, y),
            None,
        )?;
        self.sender.send(&message);
        Some(id)
    }

    /// Starts a primitive shape anchored at the two points. The outline is streamed
    /// afterwards with `extendStroke`.
    #[wasm_bindgen(js_name = beginShape)]
    #[allow(clippy::too_many_arguments)]
    pub fn begin_shape(
        &self,
        kind: &str,
        start_x: f64,
        start_y: f64,
        end_x: f64,
        end_y: f64,
        color: Option<String>,
        width: Option<f64>,
        opacity: Option<f64>,
    ) -> Result<Option<String>, JsValue> {
        let shape = ShapeMeta {
            kind: parse_shape_kind(kind)?,
            start: Point::new(start_x, start_y),
            end: Point::new(end_x, end_y),
        };
        let id = make_id();
        let message = self.mirror.borrow_mut().begin_stroke(
            id.clone(),
            style_input(color, width, opacity),
            shape.start,
            Some(shape),
        );
        let Some(message) = message else {
            return Ok(None);
        };
        self.sender.send(&message);
        Ok(Some(id))
    }

    #[wasm_bindgen(js_name = extendStroke)]
    pub fn extend_stroke(&self, id: String, x: f64, y: f64) {
        let message = self
            .mirror
            .borrow_mut()
            .extend_stroke(id, Point::new(x, y));
        self.sender.send(&message);
    }

    #[wasm_bindgen(js_name = finishStroke)]
    pub fn finish_stroke(&self, id: String) {
        let message = self.mirror.borrow_mut().finish_stroke(id);
        self.sender.send(&message);
    }

    #[wasm_bindgen(js_name = moveCursor)]
    pub fn move_cursor(&self, x: f64, y: f64) {
        if let Some(message) = self.mirror.borrow().cursor(x, y) {
            self.sender.send(&message);
        }
    }

    pub fn undo(&self) {
        self.sender.send(&ClientMessage::Undo);
    }

    pub fn redo(&self) {
        self.sender.send(&ClientMessage::Redo);
    }

    pub fn clear(&self) {
        self.sender.send(&ClientMessage::Clear);
    }

    #[wasm_bindgen(js_name = strokesJson)]
    pub fn strokes_json(&self) -> Result<String, JsValue> {
        to_json(self.mirror.borrow().strokes())
    }

    #[wasm_bindgen(js_name = cursorsJson)]
    pub fn cursors_json(&self) -> Result<String, JsValue> {
        let mirror = self.mirror.borrow();
        let cursors = mirror
            .cursors()
            .iter()
            .map(|(author_id, point)| CursorView {
                author_id: *author_id,
                x: point.x,
                y: point.y,
            })
            .collect::<Vec<_>>();
        to_json(&cursors)
    }

    pub fn close(&self) {
        self.sender.close();
    }
}
