//! TOML hint configuration, loaded once at startup and pushed into the
//! encoder's hint setters before `boot`.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub hints: HintSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HintSection {
    #[serde(default = "default_channel_base")]
    pub channel_base: i32,
    #[serde(default = "default_channel_span")]
    pub channel_span: i32,
    #[serde(default = "default_bend_semis")]
    pub bend_semis: i32,
    #[serde(default)]
    pub suppress_bends: bool,
}

impl Default for HintSection {
    fn default() -> Self {
        Self {
            channel_base: default_channel_base(),
            channel_span: default_channel_span(),
            bend_semis: default_bend_semis(),
            suppress_bends: false,
        }
    }
}

fn default_channel_base() -> i32 {
    0
}

fn default_channel_span() -> i32 {
    8
}

fn default_bend_semis() -> i32 {
    2
}
