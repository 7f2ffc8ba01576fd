use serde::Serialize;

use crate::avatar::{self, AllowedRoots, ValidatedPath};
use crate::chat::Chat;

/// Normalized network name to bundled brand asset.
pub const NETWORK_ICONS: &[(&str, &str)] = &[
    ("slack", "slack.svg"),
    ("whatsapp", "whatsapp.svg"),
    ("telegram", "telegram.svg"),
    ("discord", "discord.svg"),
    ("instagram", "instagram.svg"),
    ("facebook", "facebook.svg"),
    ("facebookmessenger", "messenger.svg"),
    ("messenger", "messenger.svg"),
    ("signal", "signal.svg"),
    ("imessage", "imessage.svg"),
    ("twitter", "twitter.svg"),
    ("email", "email.svg"),
    ("googlemessages", "google-messages.svg"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mask {
    Circle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChatIcon {
    Avatar { path: ValidatedPath, mask: Mask },
    Network { asset: &'static str },
    /// Generic message glyph.
    Generic,
}

pub fn normalize_network(network: &str) -> String {
    network
        .to_lowercase()
        .chars()
        .filter(|c| !(*c == '/' || *c == '-' || c.is_whitespace()))
        .collect()
}

pub fn network_icon(network: &str) -> ChatIcon {
    let key = normalize_network(network);
    NETWORK_ICONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|&(_, asset)| ChatIcon::Network { asset })
        .unwrap_or(ChatIcon::Generic)
}

pub fn resolve_chat_icon(chat: &Chat, roots: &AllowedRoots) -> ChatIcon {
    chat.counterpart()
        .and_then(|p| p.img_url.as_deref())
        .and_then(|url| avatar::validate(url, roots))
        .map(|path| ChatIcon::Avatar { path, mask: Mask::Circle })
        .unwrap_or_else(|| network_icon(&chat.network))
}
