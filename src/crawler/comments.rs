//! Comment tree assembler
//!
//! Walks the fully-rendered comment subtree into two-level records: root
//! comments in document order, each carrying its replies in document order.
//! Field extraction is defensive per node; a root node whose core lookup
//! fails is skipped and logged, never fatal. De-duplication keys on the
//! non-empty comment id (the page sometimes re-renders a node while the
//! loader is still scrolling).

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::browser::{probe, ElementId, PageSession};
use crate::crawler::count::parse_count;
use crate::crawler::ids::user_id_from_url;
use crate::crawler::selectors;
use crate::error::SessionError;
use crate::models::{AuthorIdentity, Comment, Reply};

/// Assembles the rendered comment area into structured records
pub struct CommentAssembler<'a> {
    session: &'a dyn PageSession,
}

impl<'a> CommentAssembler<'a> {
    pub fn new(session: &'a dyn PageSession) -> Self {
        Self { session }
    }

    /// Collect every rendered root comment with its replies.
    pub async fn collect(&self) -> Vec<Comment> {
        let roots = probe::all(self.session, selectors::PARENT_COMMENT).await;
        debug!(roots = roots.len(), "assembling comment tree");

        let mut comments = Vec::new();
        let mut seen = HashSet::new();
        for (index, root) in roots.into_iter().enumerate() {
            match self.parse_root(root).await {
                Ok(comment) => {
                    if !comment.comment_id.is_empty() && !seen.insert(comment.comment_id.clone()) {
                        debug!(comment_id = %comment.comment_id, "duplicate root skipped");
                        continue;
                    }
                    comments.push(comment);
                }
                Err(e) => {
                    warn!(index, error = %e, "root comment skipped");
                }
            }
        }
        comments
    }

    /// Parse one root node. Only the core comment-item lookup is fatal for
    /// the node; every field underneath degrades to its default.
    async fn parse_root(&self, root: ElementId) -> Result<Comment, SessionError> {
        let item = self
            .session
            .find_in(root, selectors::COMMENT_ITEM)
            .await?
            .ok_or_else(|| SessionError::ElementNotFound(selectors::COMMENT_ITEM.into()))?;

        let comment_id = self.comment_id(item).await;
        let replies = self.parse_replies(root, &comment_id).await;

        Ok(Comment {
            author: self.author(item).await,
            content: self.content(item).await,
            date: probe::text_under(self.session, item, selectors::COMMENT_DATE).await,
            location: probe::text_under(self.session, item, selectors::COMMENT_LOCATION).await,
            like_count: self.like_count(item).await,
            is_reply: false,
            comment_id,
            replies,
        })
    }

    /// Replies under one root. A missing container or any failed item yields
    /// fewer replies, never an error.
    async fn parse_replies(&self, root: ElementId, parent_id: &str) -> Vec<Reply> {
        // collapsed reply lists hide behind a show-more control
        if let Some(more) = probe::find_in(self.session, root, selectors::SHOW_MORE).await {
            probe::click(self.session, more).await;
        }

        let container = match probe::find_in(self.session, root, selectors::REPLY_CONTAINER).await {
            Some(container) => container,
            None => return Vec::new(),
        };

        let mut replies = Vec::new();
        for item in probe::all_in(self.session, container, selectors::REPLY_ITEM).await {
            replies.push(Reply {
                comment_id: self.comment_id(item).await,
                author: self.author(item).await,
                content: self.content(item).await,
                date: probe::text_under(self.session, item, selectors::COMMENT_DATE).await,
                location: probe::text_under(self.session, item, selectors::COMMENT_LOCATION).await,
                like_count: self.like_count(item).await,
                is_reply: true,
                parent_comment_id: parent_id.to_string(),
            });
        }
        replies
    }

    /// The DOM id carries a `comment-` prefix over the stable identifier
    async fn comment_id(&self, item: ElementId) -> String {
        let raw = probe::attr(self.session, item, "id").await;
        raw.strip_prefix("comment-").unwrap_or(&raw).to_string()
    }

    async fn author(&self, item: ElementId) -> AuthorIdentity {
        match probe::find_in(self.session, item, selectors::COMMENT_NAME).await {
            Some(link) => {
                let href = probe::attr(self.session, link, "href").await;
                AuthorIdentity {
                    name: probe::text(self.session, link).await,
                    id: user_id_from_url(&href),
                    avatar: probe::attr_under(
                        self.session,
                        item,
                        selectors::AUTHOR_AVATAR,
                        "src",
                    )
                    .await,
                }
            }
            None => AuthorIdentity::default(),
        }
    }

    /// Comment body: join child text spans when present (rich content mixes
    /// text runs with emoji images), fall back to the node's own text.
    async fn content(&self, item: ElementId) -> String {
        let node = match probe::find_in(self.session, item, selectors::COMMENT_TEXT).await {
            Some(node) => node,
            None => return String::new(),
        };

        let spans = probe::all_in(self.session, node, "span").await;
        if spans.is_empty() {
            return probe::text(self.session, node).await;
        }

        let mut parts = Vec::new();
        for span in spans {
            let text = probe::text(self.session, span).await;
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts.join(" ")
    }

    /// A bare "赞" label with no digits means zero likes
    async fn like_count(&self, item: ElementId) -> u64 {
        let raw = probe::text_under(self.session, item, selectors::COMMENT_LIKE).await;
        parse_count(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeSession;

    /// Stage one root comment with `reply_count` replies under it
    fn stage_root(
        fake: &FakeSession,
        roots: &mut Vec<ElementId>,
        id: &str,
        text: &str,
        reply_count: usize,
    ) -> ElementId {
        let root = fake.add_node("", &[]);
        let item = fake.add_node("", &[("id", &format!("comment-{id}"))]);
        fake.set_scoped(root, selectors::COMMENT_ITEM, vec![item]);

        let name = fake.add_node(
            "author",
            &[("href", "https://x/user/profile/u1?channel=rec")],
        );
        fake.set_scoped(item, selectors::COMMENT_NAME, vec![name]);
        let body = fake.add_node(text, &[]);
        fake.set_scoped(item, selectors::COMMENT_TEXT, vec![body]);
        let like = fake.add_node("1.2万", &[]);
        fake.set_scoped(item, selectors::COMMENT_LIKE, vec![like]);

        if reply_count > 0 {
            let container = fake.add_node("", &[]);
            fake.set_scoped(root, selectors::REPLY_CONTAINER, vec![container]);
            let mut items = Vec::new();
            for r in 0..reply_count {
                let reply = fake.add_node("", &[("id", &format!("comment-{id}-r{r}"))]);
                let reply_body = fake.add_node("reply text", &[]);
                fake.set_scoped(reply, selectors::COMMENT_TEXT, vec![reply_body]);
                items.push(reply);
            }
            fake.set_scoped(container, selectors::REPLY_ITEM, items);
        }

        roots.push(root);
        root
    }

    #[tokio::test]
    async fn test_roots_and_replies_assemble() {
        let fake = FakeSession::new();
        let mut roots = Vec::new();
        stage_root(&fake, &mut roots, "c1", "first", 2);
        stage_root(&fake, &mut roots, "c2", "second", 0);
        fake.set_matches(selectors::PARENT_COMMENT, roots);

        let comments = CommentAssembler::new(&fake).collect().await;

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].comment_id, "c1");
        assert_eq!(comments[0].content, "first");
        assert_eq!(comments[0].like_count, 12_000);
        assert_eq!(comments[0].author.id, "u1");
        assert_eq!(comments[0].replies.len(), 2);
        for reply in &comments[0].replies {
            assert_eq!(reply.parent_comment_id, "c1");
            assert!(reply.is_reply);
        }
        assert!(comments[1].replies.is_empty());
    }

    #[tokio::test]
    async fn test_failed_root_is_skipped_not_fatal() {
        let fake = FakeSession::new();
        let mut roots = Vec::new();
        stage_root(&fake, &mut roots, "c1", "ok", 0);
        // a bare root with no comment-item underneath fails its core lookup
        let broken = fake.add_node("", &[]);
        roots.insert(0, broken);
        fake.set_matches(selectors::PARENT_COMMENT, roots);

        let comments = CommentAssembler::new(&fake).collect().await;

        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].comment_id, "c1");
    }

    #[tokio::test]
    async fn test_duplicate_ids_collapse() {
        let fake = FakeSession::new();
        let mut roots = Vec::new();
        stage_root(&fake, &mut roots, "c1", "first render", 0);
        stage_root(&fake, &mut roots, "c1", "re-render", 0);
        fake.set_matches(selectors::PARENT_COMMENT, roots);

        let comments = CommentAssembler::new(&fake).collect().await;

        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "first render");
    }

    #[tokio::test]
    async fn test_bare_like_label_is_zero() {
        let fake = FakeSession::new();
        let root = fake.add_node("", &[]);
        let item = fake.add_node("", &[("id", "comment-c9")]);
        fake.set_scoped(root, selectors::COMMENT_ITEM, vec![item]);
        let like = fake.add_node("赞", &[]);
        fake.set_scoped(item, selectors::COMMENT_LIKE, vec![like]);
        fake.set_matches(selectors::PARENT_COMMENT, vec![root]);

        let comments = CommentAssembler::new(&fake).collect().await;

        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].like_count, 0);
        assert!(comments[0].author.name.is_empty());
    }
}
