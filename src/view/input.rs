//! Synthetic input events sent to the embedded page.

use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    KeyDown { key: String },
    KeyUp { key: String },
    /// Text input for a single character, e.g. a site keyboard shortcut.
    Char { key: String },
    MouseDown { x: f64, y: f64, button: MouseButton },
    MouseUp { x: f64, y: f64, button: MouseButton },
}

impl InputEvent {
    pub fn char(key: char) -> Self {
        InputEvent::Char {
            key: key.to_string(),
        }
    }

    /// Key down followed by key up.
    pub fn press(key: &str) -> Vec<InputEvent> {
        vec![
            InputEvent::KeyDown {
                key: key.to_string(),
            },
            InputEvent::KeyUp {
                key: key.to_string(),
            },
        ]
    }

    /// Mouse down followed by mouse up at rounded coordinates.
    pub fn click(x: f64, y: f64, button: MouseButton) -> Vec<InputEvent> {
        let (x, y) = (x.round(), y.round());
        vec![
            InputEvent::MouseDown { x, y, button },
            InputEvent::MouseUp { x, y, button },
        ]
    }

    /// CDP method and parameters that reproduce this event.
    pub fn to_cdp(&self) -> (&'static str, serde_json::Value) {
        match self {
            InputEvent::KeyDown { key } => {
                let mut params = json!({
                    "type": "rawKeyDown",
                    "key": key,
                    "code": key_code_name(key),
                    "windowsVirtualKeyCode": virtual_key_code(key),
                });
                if let Some(text) = key_text(key) {
                    params["type"] = json!("keyDown");
                    params["text"] = json!(text);
                }
                ("Input.dispatchKeyEvent", params)
            }
            InputEvent::KeyUp { key } => (
                "Input.dispatchKeyEvent",
                json!({
                    "type": "keyUp",
                    "key": key,
                    "code": key_code_name(key),
                    "windowsVirtualKeyCode": virtual_key_code(key),
                }),
            ),
            InputEvent::Char { key } => (
                "Input.dispatchKeyEvent",
                json!({
                    "type": "char",
                    "key": key,
                    "text": key,
                    "unmodifiedText": key,
                }),
            ),
            InputEvent::MouseDown { x, y, button } => (
                "Input.dispatchMouseEvent",
                json!({
                    "type": "mousePressed",
                    "x": x,
                    "y": y,
                    "button": button,
                    "clickCount": 1,
                }),
            ),
            InputEvent::MouseUp { x, y, button } => (
                "Input.dispatchMouseEvent",
                json!({
                    "type": "mouseReleased",
                    "x": x,
                    "y": y,
                    "button": button,
                    "clickCount": 1,
                }),
            ),
        }
    }
}

fn virtual_key_code(key: &str) -> i32 {
    match key {
        "Enter" => 13,
        "Tab" => 9,
        "Escape" => 27,
        "Backspace" => 8,
        "ArrowUp" => 38,
        "ArrowDown" => 40,
        "ArrowLeft" => 37,
        "ArrowRight" => 39,
        _ => key
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase() as i32)
            .unwrap_or(0),
    }
}

fn key_code_name(key: &str) -> String {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => format!("Key{}", c.to_ascii_uppercase()),
        (Some(c), None) if c.is_ascii_digit() => format!("Digit{}", c),
        _ => key.to_string(),
    }
}

/// Text produced by the key press, if any. Enter must carry "\r" to activate links.
fn key_text(key: &str) -> Option<&str> {
    match key {
        "Enter" => Some("\r"),
        k if k.chars().count() == 1 => Some(k),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_is_down_then_up() {
        let events = InputEvent::press("Tab");
        assert_eq!(
            events,
            vec![
                InputEvent::KeyDown { key: "Tab".into() },
                InputEvent::KeyUp { key: "Tab".into() },
            ]
        );
    }

    #[test]
    fn test_tab_maps_to_raw_key_down() {
        let (method, params) = InputEvent::KeyDown { key: "Tab".into() }.to_cdp();
        assert_eq!(method, "Input.dispatchKeyEvent");
        assert_eq!(params["type"], "rawKeyDown");
        assert_eq!(params["windowsVirtualKeyCode"], 9);
        assert!(params.get("text").is_none());
    }

    #[test]
    fn test_enter_carries_carriage_return() {
        let (_, params) = InputEvent::KeyDown {
            key: "Enter".into(),
        }
        .to_cdp();
        assert_eq!(params["type"], "keyDown");
        assert_eq!(params["text"], "\r");
        assert_eq!(params["windowsVirtualKeyCode"], 13);
    }

    #[test]
    fn test_char_event() {
        let (method, params) = InputEvent::char('j').to_cdp();
        assert_eq!(method, "Input.dispatchKeyEvent");
        assert_eq!(params["type"], "char");
        assert_eq!(params["text"], "j");
    }

    #[test]
    fn test_click_rounds_coordinates() {
        let events = InputEvent::click(10.4, 20.6, MouseButton::Left);
        let (method, params) = events[0].to_cdp();
        assert_eq!(method, "Input.dispatchMouseEvent");
        assert_eq!(params["type"], "mousePressed");
        assert_eq!(params["x"], 10.0);
        assert_eq!(params["y"], 21.0);
        assert_eq!(params["button"], "left");
        assert_eq!(events[1].to_cdp().1["type"], "mouseReleased");
    }

    #[test]
    fn test_key_code_names() {
        assert_eq!(key_code_name("j"), "KeyJ");
        assert_eq!(key_code_name("7"), "Digit7");
        assert_eq!(key_code_name("Tab"), "Tab");
    }
}
