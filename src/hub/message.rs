use serde::{Deserialize, Serialize};

/// Messages pushed to browser viewers, tagged by the `message` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireMessage {
    PowerOn,
    PowerOff,
    ToggleGif,
    /// Full media list as URL paths relative to the landing page.
    LoadGifs {
        gifs: Vec<String>,
    },
    NoGifs,
}
