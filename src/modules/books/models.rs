use readlog_kernel::settings::PatchPolicy;
use serde::{Deserialize, Serialize};

/// `end` value of a book that is still being read.
pub const UNFINISHED: &str = "";
/// `score` value of a book that has not been scored.
pub const UNSCORED: i64 = -1;

/// A stored reading record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookRecord {
    /// Identifier assigned by the store
    pub id: i64,
    /// Title of the book, used as the lookup key
    pub title: String,
    /// Author of the book
    pub author: String,
    /// Number of pages
    pub pages: i64,
    /// Day the reading started, `DD/MM/YYYY`
    pub start: String,
    /// Day the reading ended, empty while unfinished
    pub end: String,
    /// Score given to the book, `-1` when unscored
    pub score: i64,
}

/// A record about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    /// Title, unique across the store
    pub title: String,
    /// Author of the book
    pub author: String,
    /// Number of pages
    pub pages: i64,
    /// Day the reading started, `DD/MM/YYYY`
    pub start: String,
    /// Day the reading ended, [`UNFINISHED`] by default
    pub end: String,
    /// Score, [`UNSCORED`] by default
    pub score: i64,
}

/// Response body of `GET /books`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookList {
    pub books: Vec<BookRecord>,
}

/// Request model for recording a new reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookBody {
    pub title: String,
    pub author: String,
    pub pages: i64,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
}

impl BookBody {
    /// Fill in the defaults: `start` is `today`, `end` is unfinished and
    /// `score` is unscored unless the policy admits the supplied values.
    pub fn into_new_book(self, policy: PatchPolicy, today: String) -> NewBook {
        let end = policy
            .admit_str(self.end.as_deref())
            .map(str::to_owned)
            .unwrap_or_else(|| UNFINISHED.to_string());
        let score = policy.admit_int(self.score).unwrap_or(UNSCORED);

        NewBook {
            title: self.title,
            author: self.author,
            pages: self.pages,
            start: self.start.unwrap_or(today),
            end,
            score,
        }
    }
}

/// Request model for a partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub pages: Option<i64>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
}

/// Request model for marking a reading as finished.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookUpdateFinish {
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
}

impl BookRecord {
    pub fn is_finished(&self) -> bool {
        self.end != UNFINISHED
    }

    /// Overwrite every field of `patch` the policy admits.
    ///
    /// Under [`PatchPolicy::Truthy`] a missing or empty `end` means `today`.
    pub fn apply_update(&mut self, patch: &BookUpdate, policy: PatchPolicy, today: &str) {
        if let Some(title) = policy.admit_str(patch.title.as_deref()) {
            self.title = title.to_owned();
        }
        if let Some(author) = policy.admit_str(patch.author.as_deref()) {
            self.author = author.to_owned();
        }
        if let Some(pages) = policy.admit_int(patch.pages) {
            self.pages = pages;
        }
        if let Some(start) = policy.admit_str(patch.start.as_deref()) {
            self.start = start.to_owned();
        }
        if let Some(end) = patched_end(patch.end.as_deref(), policy, today) {
            self.end = end.to_owned();
        }
        if let Some(score) = policy.admit_int(patch.score) {
            self.score = score;
        }
    }

    /// Overwrite `end` and `score` when the policy admits them.
    ///
    /// Under [`PatchPolicy::Truthy`] a missing or empty `end` means `today`.
    pub fn apply_finish(&mut self, patch: &BookUpdateFinish, policy: PatchPolicy, today: &str) {
        if let Some(end) = patched_end(patch.end.as_deref(), policy, today) {
            self.end = end.to_owned();
        }
        if let Some(score) = policy.admit_int(patch.score) {
            self.score = score;
        }
    }
}

fn patched_end<'a>(end: Option<&'a str>, policy: PatchPolicy, today: &'a str) -> Option<&'a str> {
    match policy {
        PatchPolicy::Presence => policy.admit_str(end),
        PatchPolicy::Truthy => Some(policy.admit_str(end).unwrap_or(today)),
    }
}
