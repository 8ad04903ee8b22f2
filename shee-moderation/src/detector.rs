use tracing::error;

use shee_content::ViolationType;
use shee_database::Database;
use shee_database::impls::spam::is_spam_burst;

use crate::badwords::BadwordFilter;
use crate::links::LinkPolicy;

/// Stateless classifiers over inbound messages, checked in a fixed order.
#[derive(Debug)]
pub struct ViolationDetector {
    badwords: BadwordFilter,
    links: LinkPolicy,
}

impl ViolationDetector {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            badwords: BadwordFilter::from_builtin()?,
            links: LinkPolicy::from_builtin()?,
        })
    }

    /// Classify a message. Checks run spam, then badword, then link, and
    /// stop at the first violation found.
    ///
    /// The spam check always runs (it counts the message against the user's
    /// window as a side effect); a cache failure is logged and treated as
    /// not-spam so moderation never blocks message handling.
    pub async fn detect(
        &self,
        db: &Database,
        guild_id: u64,
        user_id: u64,
        content: &str,
    ) -> Option<ViolationType> {
        match is_spam_burst(db, guild_id, user_id).await {
            Ok(true) => return Some(ViolationType::Spam),
            Ok(false) => {}
            Err(source) => error!(?source, "spam counter check failed"),
        }

        if self.badwords.contains_badword(content) {
            return Some(ViolationType::Badword);
        }

        if self.links.has_unauthorized_link(content) {
            return Some(ViolationType::Link);
        }

        None
    }
}
