//! IRC Notification Formatter
//!
//! Turns a decoded [`Event`] into the text announced on IRC. The result may
//! span several lines (push summaries), or be empty, meaning the event is not
//! worth announcing.
//!
//! Styling uses mIRC control codes:
//!
//! | code   | effect            |
//! |--------|-------------------|
//! | `\x02` | bold              |
//! | `\x03` | colour (+ 2 digits) |
//! | `\x0f` | reset             |
//! | `\x16` | reverse           |
//! | `\x1f` | underline         |

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::events::{
    Commit, CommitCommentEvent, Event, GollumEvent, IssueCommentEvent, IssuesEvent,
    PullRequestEvent, PushEvent, ReviewCommentEvent,
};
use super::shorten::UrlShortener;

/// Maximum number of commits listed under a push summary.
const MAX_COMMIT_LINES: usize = 3;

/// Length of abbreviated commit hashes.
const SHORT_SHA_LEN: usize = 7;

const RESET: &str = "\x0f";

static CONTROL_CODES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x02|\x0f|\x16|\x1f|\x03\d{0,2}(?:,\d{1,2})?").expect("valid regex")
});

fn fmt_url(s: &str) -> String {
    format!("\x0302\x1f{s}{RESET}")
}

fn fmt_repo(s: &str) -> String {
    format!("\x0313{s}{RESET}")
}

fn fmt_name(s: &str) -> String {
    format!("\x0315{s}{RESET}")
}

fn fmt_branch(s: &str) -> String {
    format!("\x0306{s}{RESET}")
}

fn fmt_tag(s: &str) -> String {
    format!("\x0306{s}{RESET}")
}

fn fmt_hash(s: &str) -> String {
    format!("\x0314{s}{RESET}")
}

fn fmt_alert(s: &str) -> String {
    format!("\x0304{s}{RESET}")
}

fn fmt_count(n: usize) -> String {
    format!("\x02{n}{RESET}")
}

/// Remove every IRC control sequence from `text`.
pub fn strip_control_codes(text: &str) -> String {
    CONTROL_CODES.replace_all(text, "").into_owned()
}

fn plural(n: usize, singular: &'static str, plural: &'static str) -> &'static str {
    if n == 1 {
        singular
    } else {
        plural
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..SHORT_SHA_LEN).unwrap_or(sha)
}

/// First line of `text`, with `...` appended when anything was cut.
fn first_line(text: &str) -> String {
    match text.find(['\r', '\n']) {
        Some(idx) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Join items as an English list: `a`, `a and b`, `a, b, and c`.
fn to_sentence(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

/// Formatting switches.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Branches whose pushes are announced. Empty means every branch.
    pub branches: Vec<String>,
    /// Strip colours and styles from the final text.
    pub no_colors: bool,
    /// Skip URL shortening.
    pub long_url: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            branches: Vec::new(),
            no_colors: false,
            long_url: true,
        }
    }
}

impl FormatOptions {
    /// Parse a comma-separated branch allow-list.
    pub fn parse_branches(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_owned)
            .collect()
    }

    fn branch_allowed(&self, branch: &str) -> bool {
        self.branches.is_empty() || self.branches.iter().any(|b| b == branch)
    }
}

/// Where a notification links to.
struct Link {
    url: String,
    shortenable: bool,
}

impl Link {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            shortenable: true,
        }
    }
}

/// Renders events as IRC text.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    options: FormatOptions,
    shortener: Option<UrlShortener>,
}

impl Formatter {
    pub const fn new(options: FormatOptions, shortener: Option<UrlShortener>) -> Self {
        Self { options, shortener }
    }

    /// Format `event`, shortening its link when configured to.
    ///
    /// Returns an empty string when the event should not be announced.
    pub async fn format(&self, event: &Event) -> String {
        let Some(link) = self.link(event) else {
            return String::new();
        };

        let url = match &self.shortener {
            Some(shortener) if link.shortenable && !self.options.long_url => {
                shortener.shorten(&link.url).await
            }
            _ => link.url,
        };

        self.render(event, &url)
    }

    /// Format `event` using `url` verbatim as its link.
    pub fn render(&self, event: &Event, url: &str) -> String {
        let message = match event {
            Event::Push(e) => self.push_message(e, url),
            Event::PullRequest(e) => pull_request_message(e, url),
            Event::Issues(e) => issue_message(e, url),
            Event::IssueComment(e) => issue_comment_message(e, url),
            Event::CommitComment(e) => Some(commit_comment_message(e, url)),
            Event::PullRequestReviewComment(e) => Some(review_comment_message(e, url)),
            Event::Gollum(e) => gollum_message(e, url),
        };

        match message {
            Some(text) if self.options.no_colors => strip_control_codes(&text),
            Some(text) => text,
            None => String::new(),
        }
    }

    /// Link for `event`, or `None` when the event is suppressed.
    fn link(&self, event: &Event) -> Option<Link> {
        match event {
            Event::Push(e) => self
                .options
                .branch_allowed(e.ref_name())
                .then(|| Link::new(push_url(e))),
            Event::PullRequest(e) => {
                is_open_or_close(&e.action).then(|| Link::new(&e.pull_request.html_url))
            }
            Event::Issues(e) => is_open_or_close(&e.action).then(|| Link::new(&e.issue.html_url)),
            Event::IssueComment(e) => {
                (e.action != "edited" && e.comment.is_some()).then(|| Link::new(&e.issue.html_url))
            }
            Event::CommitComment(e) => Some(Link::new(&e.comment.html_url)),
            Event::PullRequestReviewComment(e) => Some(Link::new(&e.pull_request.html_url)),
            Event::Gollum(e) => {
                let url = match e.pages.as_slice() {
                    [] => return None,
                    [page] => page.html_url.clone(),
                    _ => format!("{}/wiki", e.repository.web_url()),
                };
                Some(Link {
                    url,
                    shortenable: false,
                })
            }
        }
    }

    fn push_message(&self, event: &PushEvent, url: &str) -> Option<String> {
        if !self.options.branch_allowed(event.ref_name()) {
            return None;
        }

        let mut lines = vec![format!("{}: {}", push_summary(event), fmt_url(url))];
        lines.extend(
            event
                .distinct_commits()
                .into_iter()
                .take(MAX_COMMIT_LINES)
                .map(|commit| commit_line(event, commit)),
        );
        Some(lines.join("\n"))
    }
}

fn is_open_or_close(action: &str) -> bool {
    action.contains("open") || action.contains("close")
}

fn push_summary(event: &PushEvent) -> String {
    let pusher = if event.pusher.name.is_empty() {
        "somebody"
    } else {
        event.pusher.name.as_str()
    };
    let mut summary = format!(
        "[{}] {}",
        fmt_repo(&event.repository.name),
        fmt_name(pusher)
    );

    let distinct = event.distinct_commits().len();
    let branch = event.ref_name();
    let before = short_sha(&event.before);
    let after = short_sha(&event.after);

    if event.is_created() {
        if event.is_tag() {
            summary.push_str(&format!(" tagged {} at ", fmt_tag(branch)));
            match event.base_ref_name() {
                Some(base) => summary.push_str(&fmt_branch(base)),
                None => summary.push_str(&fmt_hash(after)),
            }
        } else {
            summary.push_str(&format!(" created {}", fmt_branch(branch)));
            if let Some(base) = event.base_ref_name() {
                summary.push_str(&format!(" from {}", fmt_branch(base)));
            } else if distinct == 0 {
                summary.push_str(&format!(" at {}", fmt_hash(after)));
            }
            summary.push_str(&format!(
                " (+{} new {})",
                fmt_count(distinct),
                plural(distinct, "commit", "commits")
            ));
        }
    } else if event.is_deleted() {
        summary.push_str(&format!(
            " {} {} at {}",
            fmt_alert("deleted"),
            fmt_branch(branch),
            fmt_hash(before)
        ));
    } else if event.is_forced() {
        summary.push_str(&format!(
            " {} {} from {} to {}",
            fmt_alert("force-pushed"),
            fmt_branch(branch),
            fmt_hash(before),
            fmt_hash(after)
        ));
    } else if !event.commits.is_empty() && distinct == 0 {
        match event.base_ref_name() {
            Some(base) => summary.push_str(&format!(
                " merged {} into {}",
                fmt_branch(base),
                fmt_branch(branch)
            )),
            None => summary.push_str(&format!(
                " fast-forwarded {} from {} to {}",
                fmt_branch(branch),
                fmt_hash(before),
                fmt_hash(after)
            )),
        }
    } else {
        summary.push_str(&format!(
            " pushed {} new {} to {}",
            fmt_count(distinct),
            plural(distinct, "commit", "commits"),
            fmt_branch(branch)
        ));
    }

    summary
}

fn push_url(event: &PushEvent) -> String {
    let distinct = event.distinct_commits();
    let repo_url = event.repository.web_url();

    if event.is_created() {
        if distinct.is_empty() {
            format!("{repo_url}/commits/{}", event.ref_name())
        } else {
            event.compare.clone()
        }
    } else if event.is_deleted() {
        format!("{repo_url}/commit/{}", short_sha(&event.before))
    } else if event.is_forced() {
        event.compare.clone()
    } else if let [only] = distinct.as_slice() {
        only.url.clone()
    } else {
        event.compare.clone()
    }
}

fn commit_line(event: &PushEvent, commit: &Commit) -> String {
    format!(
        "{}/{} {} {}: {}",
        fmt_repo(&event.repository.name),
        fmt_branch(event.ref_name()),
        fmt_hash(short_sha(&commit.sha)),
        fmt_name(&commit.author.name),
        first_line(&commit.message)
    )
}

fn pull_request_message(event: &PullRequestEvent, url: &str) -> Option<String> {
    if !is_open_or_close(&event.action) {
        return None;
    }

    let pull = &event.pull_request;
    let base_ref = pull.base.git_ref.as_str();
    let head_label = if pull.head.git_ref == base_ref {
        pull.head.label.as_str()
    } else {
        pull.head.git_ref.as_str()
    };

    Some(format!(
        "[{}] {} {} pull request #{}: {} ({}...{}) {}",
        fmt_repo(&event.repository.name),
        fmt_name(&event.sender.login),
        event.action,
        pull.number,
        pull.title,
        fmt_branch(base_ref),
        fmt_branch(head_label),
        fmt_url(url)
    ))
}

fn issue_message(event: &IssuesEvent, url: &str) -> Option<String> {
    if !is_open_or_close(&event.action) {
        return None;
    }

    Some(format!(
        "[{}] {} {} issue #{}: {} {}",
        fmt_repo(&event.repository.name),
        fmt_name(&event.sender.login),
        event.action,
        event.issue.number,
        event.issue.title,
        fmt_url(url)
    ))
}

fn issue_comment_message(event: &IssueCommentEvent, url: &str) -> Option<String> {
    if event.action == "edited" {
        return None;
    }

    let Some(comment) = &event.comment else {
        warn!(
            repo = %event.repository.full_name,
            issue = event.issue.number,
            "issue_comment event without a comment, suppressing"
        );
        return None;
    };

    Some(format!(
        "[{}] {} commented on issue #{}: {} {}",
        fmt_repo(&event.repository.name),
        fmt_name(&event.sender.login),
        event.issue.number,
        first_line(&comment.body),
        fmt_url(url)
    ))
}

fn commit_comment_message(event: &CommitCommentEvent, url: &str) -> String {
    format!(
        "[{}] {} commented on commit {}: {} {}",
        fmt_repo(&event.repository.name),
        fmt_name(&event.sender.login),
        fmt_hash(short_sha(&event.comment.commit_id)),
        first_line(&event.comment.body),
        fmt_url(url)
    )
}

fn review_comment_message(event: &ReviewCommentEvent, url: &str) -> String {
    format!(
        "[{}] {} commented on pull request #{} {}: {} {}",
        fmt_repo(&event.repository.name),
        fmt_name(&event.sender.login),
        event.pull_request.number,
        fmt_hash(short_sha(&event.comment.commit_id)),
        first_line(&event.comment.body),
        fmt_url(url)
    )
}

fn gollum_message(event: &GollumEvent, url: &str) -> Option<String> {
    let prefix = format!(
        "[{}] {}",
        fmt_repo(&event.repository.name),
        fmt_name(&event.sender.login)
    );

    let summary = match event.pages.as_slice() {
        [] => {
            warn!(repo = %event.repository.full_name, "gollum event without pages, suppressing");
            return None;
        }
        [page] => {
            let mut line = format!("{prefix} {} wiki page {}", page.action, page.title);
            if let Some(summary) = page.summary.as_deref().filter(|s| !s.is_empty()) {
                line.push_str(": ");
                line.push_str(summary);
            }
            line
        }
        pages => {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for page in pages {
                *counts.entry(page.action.as_str()).or_default() += 1;
            }
            let actions: Vec<String> = counts
                .iter()
                .map(|(action, count)| format!("{action} {count}"))
                .collect();
            format!("{prefix} {} wiki pages", to_sentence(&actions))
        }
    };

    Some(format!("{summary} {}", fmt_url(url)))
}
