//! Publication rules for posts.

use time::OffsetDateTime;

/// Publication state of a post before a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicationState {
    pub published: bool,
    pub published_at: Option<OffsetDateTime>,
}

/// Compute the `published_at` a post carries after a write.
///
/// A first publish (or a republish after being unpublished) stamps `now`,
/// staying published keeps the existing stamp, and unpublishing clears it.
/// `previous` is `None` when the post is being created.
pub fn next_published_at(
    previous: Option<PublicationState>,
    published: bool,
    now: OffsetDateTime,
) -> Option<OffsetDateTime> {
    if !published {
        return None;
    }

    match previous {
        Some(PublicationState {
            published: true,
            published_at: Some(at),
        }) => Some(at),
        _ => Some(now),
    }
}
