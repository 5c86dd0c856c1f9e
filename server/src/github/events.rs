//! GitHub Event Model
//!
//! One variant per supported `X-GitHub-Event` kind. The variant is chosen by
//! the header, never by probing the payload, so each kind only carries the
//! fields that kind is guaranteed to have.

use serde::Deserialize;
use thiserror::Error;

/// Ref value GitHub uses for "no commit" (branch creation / deletion).
pub const NULL_SHA: &str = "0000000000000000000000000000000000000000";

const TAG_PREFIX: &str = "refs/tags/";
const BRANCH_PREFIX: &str = "refs/heads/";

/// Supported webhook event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    PullRequest,
    Issues,
    IssueComment,
    CommitComment,
    PullRequestReviewComment,
    Gollum,
}

impl EventKind {
    /// Parse the `X-GitHub-Event` header value. Unsupported kinds yield `None`.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "push" => Some(Self::Push),
            "pull_request" => Some(Self::PullRequest),
            "issues" => Some(Self::Issues),
            "issue_comment" => Some(Self::IssueComment),
            "commit_comment" => Some(Self::CommitComment),
            "pull_request_review_comment" => Some(Self::PullRequestReviewComment),
            "gollum" => Some(Self::Gollum),
            _ => None,
        }
    }

    /// Header form of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::PullRequest => "pull_request",
            Self::Issues => "issues",
            Self::IssueComment => "issue_comment",
            Self::CommitComment => "commit_comment",
            Self::PullRequestReviewComment => "pull_request_review_comment",
            Self::Gollum => "gollum",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload did not match the shape its declared kind requires.
#[derive(Error, Debug)]
#[error("malformed {kind} payload: {source}")]
pub struct DecodeError {
    pub kind: EventKind,
    #[source]
    pub source: serde_json::Error,
}

/// User who triggered the event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub login: String,
}

/// Repository owner. Push payloads fill `name`, the others `login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
}

/// Repository the event happened in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl Repository {
    /// Owner display name, whichever form the payload carried.
    pub fn owner_name(&self) -> &str {
        self.owner
            .name
            .as_deref()
            .or(self.owner.login.as_deref())
            .unwrap_or_default()
    }

    /// Browser URL of the repository.
    ///
    /// Push payloads put it in `url`; the other kinds put the API URL there
    /// and the browser URL in `html_url`.
    pub fn web_url(&self) -> &str {
        self.html_url.as_deref().unwrap_or(&self.url)
    }
}

/// Commit author.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
}

/// One commit of a push.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    #[serde(rename = "id", alias = "sha")]
    pub sha: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub distinct: bool,
}

impl Commit {
    /// Marked distinct by GitHub and carrying a non-blank message.
    pub fn is_distinct(&self) -> bool {
        self.distinct && !self.message.trim().is_empty()
    }
}

/// Who pushed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pusher {
    #[serde(default)]
    pub name: String,
}

/// `push` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub repository: Repository,
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub forced: bool,
    #[serde(default)]
    pub base_ref: Option<String>,
    #[serde(default)]
    pub compare: String,
    #[serde(default)]
    pub pusher: Pusher,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

fn short_ref(git_ref: &str) -> &str {
    git_ref
        .strip_prefix(TAG_PREFIX)
        .or_else(|| git_ref.strip_prefix(BRANCH_PREFIX))
        .unwrap_or(git_ref)
}

impl PushEvent {
    /// Commits worth announcing, in push order.
    pub fn distinct_commits(&self) -> Vec<&Commit> {
        self.commits.iter().filter(|c| c.is_distinct()).collect()
    }

    /// Whether the pushed ref is a tag.
    pub fn is_tag(&self) -> bool {
        self.git_ref.starts_with(TAG_PREFIX)
    }

    /// Branch or tag name without its `refs/...` prefix.
    pub fn ref_name(&self) -> &str {
        short_ref(&self.git_ref)
    }

    /// Short name of the base ref, if the push had one.
    pub fn base_ref_name(&self) -> Option<&str> {
        self.base_ref
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(short_ref)
    }

    /// The ref did not exist before this push.
    pub fn is_created(&self) -> bool {
        self.created && self.before == NULL_SHA
    }

    /// The ref no longer exists after this push.
    pub fn is_deleted(&self) -> bool {
        self.deleted && self.after == NULL_SHA
    }

    pub const fn is_forced(&self) -> bool {
        self.forced
    }
}

/// Head or base of a pull request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestBranch {
    #[serde(default)]
    pub label: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub sha: String,
}

/// Pull request attached to a `pull_request` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub head: PullRequestBranch,
    #[serde(default)]
    pub base: PullRequestBranch,
}

/// `pull_request` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub repository: Repository,
    #[serde(default)]
    pub action: String,
    pub pull_request: PullRequest,
}

/// Issue attached to `issues` and `issue_comment` events.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
}

/// A comment on a commit, issue or pull request diff.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub commit_id: String,
    #[serde(default)]
    pub html_url: String,
}

/// `issues` event.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub repository: Repository,
    #[serde(default)]
    pub action: String,
    pub issue: Issue,
}

/// `issue_comment` event.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub repository: Repository,
    #[serde(default)]
    pub action: String,
    pub issue: Issue,
    #[serde(default)]
    pub comment: Option<Comment>,
}

/// `commit_comment` event.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitCommentEvent {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub repository: Repository,
    pub comment: Comment,
}

/// The pull request a review comment belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestLink {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
}

/// `pull_request_review_comment` event.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCommentEvent {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub repository: Repository,
    #[serde(default)]
    pub action: String,
    pub comment: Comment,
    pub pull_request: PullRequestLink,
}

/// One wiki page touched by a `gollum` event.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub html_url: String,
}

/// `gollum` (wiki) event.
#[derive(Debug, Clone, Deserialize)]
pub struct GollumEvent {
    #[serde(default)]
    pub sender: Sender,
    #[serde(default)]
    pub repository: Repository,
    #[serde(default)]
    pub pages: Vec<Page>,
}

/// A decoded webhook delivery.
#[derive(Debug, Clone)]
pub enum Event {
    Push(PushEvent),
    PullRequest(PullRequestEvent),
    Issues(IssuesEvent),
    IssueComment(IssueCommentEvent),
    CommitComment(CommitCommentEvent),
    PullRequestReviewComment(ReviewCommentEvent),
    Gollum(GollumEvent),
}

impl Event {
    /// Decode a raw body as the given kind.
    pub fn decode(kind: EventKind, body: &[u8]) -> Result<Self, DecodeError> {
        let wrap = |source| DecodeError { kind, source };
        Ok(match kind {
            EventKind::Push => Self::Push(serde_json::from_slice(body).map_err(wrap)?),
            EventKind::PullRequest => {
                Self::PullRequest(serde_json::from_slice(body).map_err(wrap)?)
            }
            EventKind::Issues => Self::Issues(serde_json::from_slice(body).map_err(wrap)?),
            EventKind::IssueComment => {
                Self::IssueComment(serde_json::from_slice(body).map_err(wrap)?)
            }
            EventKind::CommitComment => {
                Self::CommitComment(serde_json::from_slice(body).map_err(wrap)?)
            }
            EventKind::PullRequestReviewComment => {
                Self::PullRequestReviewComment(serde_json::from_slice(body).map_err(wrap)?)
            }
            EventKind::Gollum => Self::Gollum(serde_json::from_slice(body).map_err(wrap)?),
        })
    }

    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Push(_) => EventKind::Push,
            Self::PullRequest(_) => EventKind::PullRequest,
            Self::Issues(_) => EventKind::Issues,
            Self::IssueComment(_) => EventKind::IssueComment,
            Self::CommitComment(_) => EventKind::CommitComment,
            Self::PullRequestReviewComment(_) => EventKind::PullRequestReviewComment,
            Self::Gollum(_) => EventKind::Gollum,
        }
    }

    pub const fn repository(&self) -> &Repository {
        match self {
            Self::Push(e) => &e.repository,
            Self::PullRequest(e) => &e.repository,
            Self::Issues(e) => &e.repository,
            Self::IssueComment(e) => &e.repository,
            Self::CommitComment(e) => &e.repository,
            Self::PullRequestReviewComment(e) => &e.repository,
            Self::Gollum(e) => &e.repository,
        }
    }

    pub const fn sender(&self) -> &Sender {
        match self {
            Self::Push(e) => &e.sender,
            Self::PullRequest(e) => &e.sender,
            Self::Issues(e) => &e.sender,
            Self::IssueComment(e) => &e.sender,
            Self::CommitComment(e) => &e.sender,
            Self::PullRequestReviewComment(e) => &e.sender,
            Self::Gollum(e) => &e.sender,
        }
    }
}
