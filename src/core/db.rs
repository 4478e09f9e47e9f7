use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::core::helpers::{hash_password, new_id, now_iso};
use crate::models::models::{FriendRequest, FriendRequestStatus, Message, User};

/// One JSON file holding an array of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Messages,
    FriendRequests,
    Tokens,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Messages,
        Collection::FriendRequests,
        Collection::Tokens,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Collection::Users => "users.json",
            Collection::Messages => "messages.json",
            Collection::FriendRequests => "friendRequests.json",
            Collection::Tokens => "tokens.json",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Flat-file store: every collection is read and rewritten as a whole.
///
/// Read-modify-write cycles go through [`JsonStore::update`], which holds a
/// per-collection lock for the whole cycle. Writes land in a temp file that
/// is renamed over the target, so plain reads never see a partial file.
pub struct JsonStore {
    dir: PathBuf,
    locks: [Mutex<()>; 4],
}

impl JsonStore {
    pub async fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating data directory {}", dir.display()))?;

        let store = Self {
            dir,
            locks: [Mutex::new(()), Mutex::new(()), Mutex::new(()), Mutex::new(())],
        };
        for collection in Collection::ALL {
            store.ensure_file(collection).await?;
        }
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    async fn ensure_file(&self, collection: Collection) -> anyhow::Result<()> {
        let path = self.path(collection);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::write(&path, b"[]")
            .await
            .with_context(|| format!("initializing {}", path.display()))
    }

    /// Loads the whole collection. A missing or empty file reads as `[]`.
    pub async fn read<T: DeserializeOwned>(&self, collection: Collection) -> anyhow::Result<Vec<T>> {
        let path = self.path(collection);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))
    }

    /// Replaces the whole collection on disk.
    pub async fn write<T: Serialize>(&self, collection: Collection, records: &[T]) -> anyhow::Result<()> {
        let path = self.path(collection);
        let tmp = self.dir.join(format!(".{}.{}.tmp", collection.file_name(), new_id()));
        let data = serde_json::to_vec_pretty(records)
            .with_context(|| format!("serializing {}", collection.file_name()))?;

        tokio::fs::write(&tmp, &data)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("replacing {}", path.display()));
        }
        Ok(())
    }

    /// Runs `f` over the loaded collection under the collection's lock and
    /// rewrites the file only when `f` succeeds.
    pub async fn update<T, R, E, F>(&self, collection: Collection, f: F) -> Result<R, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<anyhow::Error>,
        F: FnOnce(&mut Vec<T>) -> Result<R, E>,
    {
        let _guard = self.locks[collection.index()].lock().await;
        let mut records = self.read::<T>(collection).await?;
        let result = f(&mut records)?;
        self.write(collection, &records).await?;
        Ok(result)
    }
}

/// Populates demo users, messages and one friendship. Safe to run on every
/// start: users that already exist (by email) are left alone.
pub async fn seed_demo_data(store: &JsonStore) -> anyhow::Result<()> {
    const DEMO: [(&str, &str, &[&str]); 3] = [
        ("test", "Test user bio", &["This is my first post on SocialBee!"]),
        (
            "alice",
            "Hello, I'm Alice!",
            &[
                "Welcome to my feed! Excited to share thoughts here.",
                "Just finished an amazing project. Feeling productive today!",
            ],
        ),
        (
            "bob",
            "Bob's corner of the internet",
            &["Hey everyone! Just joined SocialBee, looking forward to connecting with you all."],
        ),
    ];

    let mut new_users = Vec::new();
    for (name, bio, posts) in DEMO {
        new_users.push((
            User {
                id: new_id(),
                name: name.to_string(),
                email: format!("{}@example.com", name),
                password: hash_password(name).await?,
                bio: Some(bio.to_string()),
                profile_picture: None,
                created_at: now_iso(),
            },
            posts,
        ));
    }

    let created: Vec<(User, &[&str])> = store
        .update(Collection::Users, |users: &mut Vec<User>| {
            let mut created = Vec::new();
            for (user, posts) in new_users {
                if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
                    continue;
                }
                users.push(user.clone());
                created.push((user, posts));
            }
            Ok::<_, anyhow::Error>(created)
        })
        .await?;

    if created.is_empty() {
        return Ok(());
    }
    tracing::info!(users = created.len(), "seeding demo data");

    store
        .update(Collection::Messages, |messages: &mut Vec<Message>| {
            for (user, posts) in &created {
                for text in posts.iter() {
                    messages.push(Message {
                        id: new_id(),
                        user_id: user.id.clone(),
                        message: text.to_string(),
                        timestamp: now_iso(),
                        updated_at: None,
                        likes: Vec::new(),
                        shares: Vec::new(),
                        comments: Vec::new(),
                        bookmarks: Vec::new(),
                    });
                }
            }
            Ok::<_, anyhow::Error>(())
        })
        .await?;

    // "test" and "bob" start out as friends.
    let test = created.iter().find(|(u, _)| u.name == "test");
    let bob = created.iter().find(|(u, _)| u.name == "bob");
    if let (Some((test, _)), Some((bob, _))) = (test, bob) {
        store
            .update(Collection::FriendRequests, |requests: &mut Vec<FriendRequest>| {
                requests.push(FriendRequest {
                    id: new_id(),
                    user_id: test.id.clone(),
                    friend_id: bob.id.clone(),
                    status: FriendRequestStatus::Accepted,
                    created_at: now_iso(),
                    updated_at: None,
                });
                Ok::<_, anyhow::Error>(())
            })
            .await?;
    }

    Ok(())
}
