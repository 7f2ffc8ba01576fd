use serde::Deserialize;

pub const UNNAMED_CHAT: &str = "Unnamed chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Single,
    Group,
    #[serde(other)]
    Unknown,
}

/// Chat record as returned by the desktop API. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub network: String,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ChatType>,
    pub participants: Option<Participants>,
    #[serde(default)]
    pub unread_count: u64,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_muted: bool,
    pub last_activity: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Participants {
    #[serde(default)]
    pub items: Vec<Participant>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default)]
    pub is_self: bool,
    #[serde(rename = "imgURL")]
    pub img_url: Option<String>,
}

impl Chat {
    pub fn is_one_to_one(&self) -> bool {
        self.kind == Some(ChatType::Single)
    }

    /// The other side of a one-to-one chat, if the API listed one.
    pub fn counterpart(&self) -> Option<&Participant> {
        if !self.is_one_to_one() {
            return None;
        }
        self.participants.as_ref()?.items.iter().find(|p| !p.is_self)
    }

    pub fn display_title(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => UNNAMED_CHAT,
        }
    }
}

/// Chats with unread messages, most unread first, plus the unread total.
/// Ties keep their input order.
pub fn unread_view(chats: &[Chat]) -> (Vec<&Chat>, u64) {
    let mut unread: Vec<&Chat> = chats.iter().filter(|c| c.unread_count > 0).collect();
    unread.sort_by(|a, b| b.unread_count.cmp(&a.unread_count));
    let total = unread.iter().fold(0u64, |sum, c| sum.saturating_add(c.unread_count));
    (unread, total)
}
