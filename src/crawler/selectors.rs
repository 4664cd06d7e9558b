//! CSS selectors for the note, comment and search surfaces
//!
//! Centralized so a site markup change is a one-file fix. Class names track
//! the live site as of mid-2026.

// note detail page
pub const DETAIL_TITLE: &str = "#detail-title";
pub const DETAIL_DESC: &str = "#detail-desc";
pub const AUTHOR_LINK: &str = "div.author-wrapper a.name";
pub const AUTHOR_AVATAR: &str = "img.avatar-item";
pub const PUBLISH_DATE: &str = "span.date";
pub const LIKE_COUNT: &str = "span.like-wrapper span.count";
pub const COLLECT_COUNT: &str = "span.collect-wrapper span.count";
pub const CHAT_COUNT: &str = "span.chat-wrapper span.count";
pub const HASH_TAG: &str = "a#hash-tag";
pub const SLIDER_IMAGE: &str = "img.note-slider-img";

// comment area
pub const COMMENTS_CONTAINER: &str = "div.comments-container";
pub const COMMENTS_TOTAL: &str = "div.comments-container div.total";
pub const PARENT_COMMENT: &str = "div.parent-comment";
pub const COMMENT_ITEM: &str = "div.comment-item";
pub const REPLY_CONTAINER: &str = "div.reply-container";
pub const REPLY_ITEM: &str = "div.comment-item-sub";
pub const COMMENT_NAME: &str = "a.name";
pub const COMMENT_TEXT: &str = "span.note-text";
pub const COMMENT_DATE: &str = "span.date";
pub const COMMENT_LOCATION: &str = "span.location";
pub const COMMENT_LIKE: &str = "div.like span.count";
pub const SHOW_MORE: &str = "div.show-more";
pub const LOAD_MORE: &str = "div.load-more";
pub const END_MARKER: &str = "div.end-container";

// search result page
pub const SEARCH_ITEM: &str = "section.note-item";
pub const SEARCH_TITLE: &str = "a.title";
pub const SEARCH_TITLE_FALLBACK: &str = ".content";
pub const SEARCH_AUTHOR: &str = ".author";
pub const SEARCH_AUTHOR_FALLBACK: &str = ".user-name";
pub const SEARCH_LIKE: &str = ".count";
pub const SEARCH_COVER: &str = "img[data-xhs-img]:not(.author-avatar)";
pub const SEARCH_AVATAR: &str = "img.author-avatar";
pub const SEARCH_NOTE_LINK: &str = "a[href*='/explore/']";
pub const SEARCH_RESULT_LINK: &str = "a[href*='/search_result/']";
