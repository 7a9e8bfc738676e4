use rand::{thread_rng, Rng};
use serde::Serialize;

use crate::util::random_string;

/// The avatar styles offered by the DiceBear API
const AVATAR_STYLES: [&str; 6] = [
    "adventurer",
    "avataaars",
    "bottts",
    "identicon",
    "micah",
    "personas",
];

/// An ephemeral identity, generated when a session enters a room.
/// This is not an account, it only lives as long as the session does.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    pub user_id: String,
    pub username: String,
    pub avatar: String,
}

impl SessionIdentity {
    pub fn generate() -> Self {
        let user_id = format!("user-{}", random_string(7));
        let username = format!("user{}", thread_rng().gen_range(0..1000));
        let avatar = avatar_url(&user_id);

        Self {
            user_id,
            username,
            avatar,
        }
    }
}

/// Returns an avatar url for the given seed, with a randomly picked style
pub fn avatar_url(seed: &str) -> String {
    let style = AVATAR_STYLES[thread_rng().gen_range(0..AVATAR_STYLES.len())];

    format!("https://api.dicebear.com/7.x/{}/svg?seed={}", style, seed)
}
