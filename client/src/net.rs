use wasm_bindgen::JsValue;
use web_sys::Window;

pub fn websocket_url(window: &Window, room: Option<&str>) -> Result<String, JsValue> {
    let location = window.location();
    let protocol = location.protocol()?;
    let host = location.host()?;
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    let room = match room {
        Some(room) => Some(room.to_string()),
        None => room_from_location(&location),
    };
    Ok(ws_url_for(scheme, &host, room.as_deref()))
}

fn ws_url_for(scheme: &str, host: &str, room: Option<&str>) -> String {
    match room.map(str::trim).filter(|room| !room.is_empty()) {
        Some(room) => {
            let encoded = String::from(js_sys::encode_uri_component(room));
            format!("{scheme}://{host}/ws/{encoded}")
        }
        None => format!("{scheme}://{host}/ws"),
    }
}

/// Room named by a `/r/<room>` page path, if any.
fn room_from_location(location: &web_sys::Location) -> Option<String> {
    let path = location.pathname().ok()?;
    room_from_path(&path)
}

fn room_from_path(path: &str) -> Option<String> {
    let mut parts = path.trim_matches('/').split('/');
    if parts.next()? != "r" {
        return None;
    }
    let room = parts.next()?;
    if room.is_empty() {
        None
    } else {
        Some(room.to_string())
    }
}
