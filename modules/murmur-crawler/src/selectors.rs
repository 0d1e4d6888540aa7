//! DOM selectors for nitter-style mirror markup.
//!
//! Mirrors drift, but the timeline structure has been stable across
//! instances; pagination controls vary the most, hence the priority list.

/// Container for one rendered post.
pub const FRAGMENT: &str = ".timeline-item";

/// Canonical post permalink anchor inside a fragment.
pub const PERMALINK: &str = "a.tweet-link";

/// Body container carrying the dedicated id attribute on some mirrors.
pub const BODY: &str = ".tweet-body";
pub const ID_ATTR: &str = "data-tweet-id";

pub const CONTENT: &str = ".tweet-content";
pub const USERNAME: &str = ".username";
pub const FULLNAME: &str = ".fullname";
pub const DATE_LINK: &str = ".tweet-date a";

pub const REPLYING_TO: &str = ".replying-to";
pub const REPLY_PARENT: &str = "a[href*='/status/']";

pub const ATTACHMENTS: &str = ".attachments";

/// "Load more" controls, in priority order.
pub const LOAD_MORE: &[&str] = &["div.show-more a", "a.more", "div.show-more"];

/// Engagement counter icons, paired with the counter name they report.
pub const STAT_ICONS: &[(&str, &str)] = &[
    ("replies", ".icon-comment"),
    ("retweets", ".icon-retweet"),
    ("likes", ".icon-heart"),
];

/// The stat container enclosing each icon; its text is the counter value.
pub const STAT_CONTAINER: &str = ".tweet-stat";
