use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket, Window};

use inkroom_shared::{ClientMessage, ServerMessage};

use crate::net::websocket_url;

#[derive(Debug)]
pub enum WsEvent {
    Open,
    Close,
    Error,
    Message(ServerMessage),
}

pub struct WsSender {
    socket: WebSocket,
}

impl WsSender {
    pub fn is_open(&self) -> bool {
        self.socket.ready_state() == WebSocket::OPEN
    }

    pub fn send(&self, message: &ClientMessage) {
        if !self.is_open() {
            return;
        }
        match serde_json::to_string(message) {
            Ok(payload) => {
                if let Err(error) = self.socket.send_with_str(&payload) {
                    web_sys::console::error_2(&"WS send failed".into(), &error);
                }
            }
            Err(error) => {
                web_sys::console::error_1(&format!("WS encode error: {error}").into());
            }
        }
    }

    pub fn close(&self) {
        if let Err(error) = self.socket.close() {
            web_sys::console::error_2(&"WS close failed".into(), &error);
        }
    }
}

pub fn connect_ws(
    window: &Window,
    room: Option<&str>,
    on_event: impl 'static + FnMut(WsEvent),
) -> Result<Rc<WsSender>, JsValue> {
    let ws_url = websocket_url(window, room)?;
    let socket = WebSocket::new(&ws_url)?;

    let sender = Rc::new(WsSender {
        socket: socket.clone(),
    });

    let on_event = Rc::new(RefCell::new(on_event));
    let open_reported = Rc::new(Cell::new(false));

    {
        let on_event = on_event.clone();
        let open_reported = open_reported.clone();
        let onopen = Closure::<dyn FnMut(Event)>::new(move |_| {
            open_reported.set(true);
            on_event.borrow_mut()(WsEvent::Open);
        });
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();
    }

    {
        let on_event = on_event.clone();
        let open_reported = open_reported.clone();
        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |_| {
            open_reported.set(false);
            on_event.borrow_mut()(WsEvent::Close);
        });
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();
    }

    {
        let on_event = on_event.clone();
        let open_reported = open_reported.clone();
        let onerror = Closure::<dyn FnMut(Event)>::new(move |_| {
            open_reported.set(false);
            on_event.borrow_mut()(WsEvent::Error);
        });
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    }

    {
        let on_event = on_event.clone();
        let open_reported = open_reported.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if !open_reported.replace(true) {
                on_event.borrow_mut()(WsEvent::Open);
            }

            let Some(text) = event.data().as_string() else {
                web_sys::console::error_2(&"WS message data is not text".into(), &event.data());
                return;
            };
            let message = match serde_json::from_str::<ServerMessage>(&text) {
                Ok(message) => message,
                Err(error) => {
                    let snippet = if text.len() <= 200 {
                        text
                    } else {
                        let mut end = 200;
                        while !text.is_char_boundary(end) {
                            end -= 1;
                        }
                        format!("{}...", &text[..end])
                    };
                    web_sys::console::error_1(
                        &format!("WS message JSON parse error: {error} payload={snippet:?}").into(),
                    );
                    return;
                }
            };

            on_event.borrow_mut()(WsEvent::Message(message));
        });
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    {
        let socket = socket.clone();
        let onbeforeunload = Closure::<dyn FnMut(Event)>::new(move |_| {
            if let Err(error) = socket.close() {
                web_sys::console::error_2(&"WS close failed".into(), &error);
            }
        });
        window.add_event_listener_with_callback(
            "beforeunload",
            onbeforeunload.as_ref().unchecked_ref(),
        )?;
        onbeforeunload.forget();
    }

    Ok(sender)
}
