use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use claim_core::{SocialPost, VerifyResult};
use tracing::{debug, info, warn};

/// A social network's search endpoint.
#[async_trait]
pub trait SocialSearch: Send + Sync {
    /// Search recent posts for `query`, returning at most `max_results`.
    async fn search_recent(&self, query: &str, max_results: u32) -> VerifyResult<Vec<SocialPost>>;
}

/// Finds the freshest post carrying a unique code.
///
/// Every search failure (auth, rate limit, network, parse) is reported as
/// "not found"; recovering from transient failures is left to the sweeper.
pub struct PostLocator {
    search: Arc<dyn SocialSearch>,
    max_results: u32,
}

impl PostLocator {
    pub fn new(search: Arc<dyn SocialSearch>, max_results: u32) -> Self {
        Self {
            search,
            max_results,
        }
    }

    pub async fn locate(&self, unique_code: &str) -> Option<SocialPost> {
        let code = unique_code.trim();
        if code.is_empty() {
            warn!("Refusing to search for an empty unique code");
            return None;
        }

        let posts = match self.search.search_recent(code, self.max_results).await {
            Ok(posts) => posts,
            Err(e) => {
                metrics::counter!("social.search_failures").increment(1);
                warn!(code = %code, error = %e, "Social search failed, treating as not found");
                return None;
            }
        };

        debug!(code = %code, matches = posts.len(), "Social search returned");

        // Results arrive newest first; on equal timestamps the earlier entry wins.
        let post = posts.into_iter().min_by_key(|p| Reverse(p.created_at));
        match &post {
            Some(p) => info!(code = %code, created_at = %p.created_at, "Post found"),
            None => info!(code = %code, "No post found"),
        }
        post
    }
}
