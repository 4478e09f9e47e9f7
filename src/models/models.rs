use serde::{Deserialize, Deserializer, Serialize};

/// Ids were once written as JSON numbers; read them back as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Text(String),
    Number(serde_json::Number),
}

impl From<LooseId> for String {
    fn from(id: LooseId) -> Self {
        match id {
            LooseId::Text(s) => s,
            LooseId::Number(n) => n.to_string(),
        }
    }
}

fn loose_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    LooseId::deserialize(deserializer).map(String::from)
}

fn loose_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Vec::<LooseId>::deserialize(deserializer).map(|ids| ids.into_iter().map(String::from).collect())
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "loose_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string, never sent to clients.
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    #[serde(deserialize_with = "loose_id")]
    pub user_id: String,
    pub timestamp: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(deserialize_with = "loose_id")]
    pub id: String,
    #[serde(deserialize_with = "loose_id")]
    pub user_id: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(deserialize_with = "loose_id")]
    pub id: String,
    #[serde(deserialize_with = "loose_id")]
    pub user_id: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "loose_ids")]
    pub likes: Vec<String>,
    #[serde(default)]
    pub shares: Vec<Share>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, deserialize_with = "loose_ids")]
    pub bookmarks: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    #[serde(deserialize_with = "loose_id")]
    pub id: String,
    #[serde(deserialize_with = "loose_id")]
    pub user_id: String,
    #[serde(deserialize_with = "loose_id")]
    pub friend_id: String,
    pub status: FriendRequestStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl FriendRequest {
    pub fn involves(&self, user_id: &str) -> bool {
        self.user_id == user_id || self.friend_id == user_id
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.user_id == a && self.friend_id == b) || (self.user_id == b && self.friend_id == a)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub token: String,
    #[serde(deserialize_with = "loose_id")]
    pub user_id: String,
    pub created_at: String,
}
