use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Wire types ---

/// A user object as returned by the v2 API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
}

/// A tweet object as returned by the v2 API.
#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Expanded objects referenced from `data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<User>,
}

/// Pagination metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub result_count: Option<u32>,
    pub next_token: Option<String>,
    pub previous_token: Option<String>,
}

/// A partial error entry. The v2 API returns these alongside (or instead of) `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiProblem {
    pub title: Option<String>,
    pub detail: Option<String>,
}

/// Envelope for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListResponse<T> {
    pub data: Option<Vec<T>>,
    pub includes: Option<Includes>,
    pub meta: Option<Meta>,
}

/// Envelope for single-object endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SingleResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<ApiProblem>>,
}

/// Body for `POST /2/users/:id/following`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FollowRequest<'a> {
    pub target_user_id: &'a str,
}

/// Result of a follow or unfollow call.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowState {
    pub following: bool,
    #[serde(default)]
    pub pending_follow: bool,
}

// --- Client output types ---

/// One page of users plus the cursors around it.
#[derive(Debug, Clone, Default)]
pub struct UserPage {
    pub users: Vec<User>,
    pub next_token: Option<String>,
    pub previous_token: Option<String>,
}

/// A tweet joined with its author's handle from `includes.users`.
#[derive(Debug, Clone)]
pub struct AuthoredTweet {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub username: Option<String>,
    pub author_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One page of tweets plus the forward cursor.
#[derive(Debug, Clone, Default)]
pub struct TweetPage {
    pub tweets: Vec<AuthoredTweet>,
    pub next_token: Option<String>,
}

impl ListResponse<Tweet> {
    /// Resolve each tweet's author against the expansion block.
    pub(crate) fn into_page(self) -> TweetPage {
        let authors: HashMap<String, User> = self
            .includes
            .map(|i| i.users)
            .unwrap_or_default()
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let tweets = self
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|t| {
                let author = t.author_id.as_ref().and_then(|id| authors.get(id));
                AuthoredTweet {
                    username: author.map(|a| a.username.clone()),
                    author_name: author.map(|a| a.name.clone()),
                    id: t.id,
                    text: t.text,
                    author_id: t.author_id,
                    created_at: t.created_at,
                }
            })
            .collect();

        TweetPage {
            tweets,
            next_token: self.meta.and_then(|m| m.next_token),
        }
    }
}
