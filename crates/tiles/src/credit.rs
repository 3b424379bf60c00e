use serde::{Deserialize, Serialize};

/// Attribution for data a raster tile was built from.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Credit {
    pub html: String,
    pub show_on_screen: bool,
}

impl Credit {
    pub fn new(html: impl Into<String>, show_on_screen: bool) -> Self {
        Self {
            html: html.into(),
            show_on_screen,
        }
    }
}
