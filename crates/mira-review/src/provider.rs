//! The abstract contract the engine consumes to talk to a code-hosting
//! platform, plus a registry for constructing providers by name.
//!
//! This module defines the trait and a minimal in-memory reference
//! implementation used by tests. A production-grade GitHub adapter (GraphQL
//! thread resolution, REST pagination, installation-token refresh) is a
//! concrete collaborator that plugs into this contract; it isn't built here.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use mira_core::{MiraError, PRInfo, ReviewResult, UnresolvedThread};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, MiraError>> + Send + 'a>>;

/// Collaborator contract for a code-hosting platform (GitHub, GitLab, ...).
///
/// `get_unresolved_bot_threads`, `resolve_threads`, and `get_file_content`
/// carry default bodies returning empty/zero — a concrete adapter overrides
/// whatever subset its platform actually supports.
pub trait Provider: Send + Sync {
    fn get_pr_info<'a>(&'a self, url: &'a str) -> BoxFuture<'a, PRInfo>;

    fn get_pr_diff<'a>(&'a self, pr: &'a PRInfo) -> BoxFuture<'a, String>;

    fn get_file_content<'a>(
        &'a self,
        _pr: &'a PRInfo,
        _path: &'a str,
        _git_ref: &'a str,
    ) -> BoxFuture<'a, String> {
        Box::pin(async { Ok(String::new()) })
    }

    fn get_unresolved_bot_threads<'a>(
        &'a self,
        _pr: &'a PRInfo,
        _bot_login: Option<&'a str>,
    ) -> BoxFuture<'a, Vec<UnresolvedThread>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn resolve_threads<'a>(
        &'a self,
        _pr: &'a PRInfo,
        _thread_ids: &'a [String],
    ) -> BoxFuture<'a, usize> {
        Box::pin(async { Ok(0) })
    }

    fn post_review<'a>(&'a self, pr: &'a PRInfo, result: &'a ReviewResult) -> BoxFuture<'a, ()>;

    fn post_comment<'a>(&'a self, pr: &'a PRInfo, body: &'a str) -> BoxFuture<'a, ()>;

    fn find_bot_comment<'a>(
        &'a self,
        pr: &'a PRInfo,
        marker: &'a str,
    ) -> BoxFuture<'a, Option<String>>;

    fn update_comment<'a>(
        &'a self,
        pr: &'a PRInfo,
        comment_id: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, ()>;
}

/// Case-insensitive author comparison that treats `name` and `name[bot]` as
/// the same author — hosts commonly report the viewer identity suffixed with
/// `[bot]` while authored comments carry the bare login.
pub fn same_author(a: &str, b: &str) -> bool {
    strip_bot_suffix(a).eq_ignore_ascii_case(strip_bot_suffix(b))
}

fn strip_bot_suffix(login: &str) -> &str {
    login.strip_suffix("[bot]").unwrap_or(login)
}

type ProviderConstructor = Box<dyn Fn() -> Box<dyn Provider> + Send + Sync>;

/// Factory for constructing a [`Provider`] by the configured `provider.type`.
#[derive(Default)]
pub struct ProviderRegistry {
    constructors: Mutex<HashMap<String, ProviderConstructor>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`, overwriting any prior registration.
    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn Provider> + Send + Sync + 'static,
    {
        self.constructors
            .lock()
            .expect("provider registry mutex poisoned")
            .insert(name.into(), Box::new(constructor));
    }

    /// Build a provider instance for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MiraError::Config`] when no constructor is registered under `name`.
    pub fn build(&self, name: &str) -> Result<Box<dyn Provider>, MiraError> {
        let constructors = self
            .constructors
            .lock()
            .expect("provider registry mutex poisoned");
        let constructor = constructors
            .get(name)
            .ok_or_else(|| MiraError::Config(format!("no provider registered as '{name}'")))?;
        Ok(constructor())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! An in-memory [`Provider`] for engine/orchestration tests.
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    pub struct FakeProvider {
        pub diff: String,
        pub threads: Vec<UnresolvedThread>,
        pub posted_reviews: StdMutex<Vec<ReviewResult>>,
        pub posted_comments: StdMutex<Vec<String>>,
        pub existing_marker_comment: Option<String>,
        pub resolved: StdMutex<Vec<String>>,
    }

    impl Provider for FakeProvider {
        fn get_pr_info<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, PRInfo> {
            Box::pin(async {
                Ok(PRInfo {
                    title: "Test PR".into(),
                    description: String::new(),
                    base_branch: "main".into(),
                    head_branch: "feature".into(),
                    url: "https://example.com/pr/1".into(),
                    number: 1,
                    owner: "acme".into(),
                    repo: "widgets".into(),
                })
            })
        }

        fn get_pr_diff<'a>(&'a self, _pr: &'a PRInfo) -> BoxFuture<'a, String> {
            Box::pin(async move { Ok(self.diff.clone()) })
        }

        fn get_unresolved_bot_threads<'a>(
            &'a self,
            _pr: &'a PRInfo,
            _bot_login: Option<&'a str>,
        ) -> BoxFuture<'a, Vec<UnresolvedThread>> {
            Box::pin(async move { Ok(self.threads.clone()) })
        }

        fn resolve_threads<'a>(
            &'a self,
            _pr: &'a PRInfo,
            thread_ids: &'a [String],
        ) -> BoxFuture<'a, usize> {
            Box::pin(async move {
                let mut resolved = self.resolved.lock().unwrap();
                resolved.extend(thread_ids.iter().cloned());
                Ok(thread_ids.len())
            })
        }

        fn post_review<'a>(&'a self, _pr: &'a PRInfo, result: &'a ReviewResult) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                self.posted_reviews.lock().unwrap().push(result.clone());
                Ok(())
            })
        }

        fn post_comment<'a>(&'a self, _pr: &'a PRInfo, body: &'a str) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                self.posted_comments.lock().unwrap().push(body.to_string());
                Ok(())
            })
        }

        fn find_bot_comment<'a>(
            &'a self,
            _pr: &'a PRInfo,
            _marker: &'a str,
        ) -> BoxFuture<'a, Option<String>> {
            Box::pin(async move { Ok(self.existing_marker_comment.clone()) })
        }

        fn update_comment<'a>(
            &'a self,
            _pr: &'a PRInfo,
            _comment_id: &'a str,
            body: &'a str,
        ) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                self.posted_comments.lock().unwrap().push(body.to_string());
                Ok(())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeProvider;
    use super::*;
    use mira_core::TokenUsage;

    fn pr() -> PRInfo {
        PRInfo {
            title: "t".into(),
            description: String::new(),
            base_branch: "main".into(),
            head_branch: "feature".into(),
            url: "u".into(),
            number: 1,
            owner: "acme".into(),
            repo: "widgets".into(),
        }
    }

    #[test]
    fn same_author_matches_identical_logins() {
        assert!(same_author("mira", "mira"));
    }

    #[test]
    fn same_author_is_case_insensitive() {
        assert!(same_author("Mira", "mira"));
    }

    #[test]
    fn same_author_strips_bot_suffix() {
        assert!(same_author("mira[bot]", "mira"));
        assert!(same_author("mira", "mira[bot]"));
    }

    #[test]
    fn same_author_rejects_different_logins() {
        assert!(!same_author("mira", "someone-else"));
    }

    #[tokio::test]
    async fn default_get_unresolved_bot_threads_is_empty() {
        let provider = FakeProvider::default();
        let threads = provider.get_unresolved_bot_threads(&pr(), None).await;
        assert!(threads.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fake_provider_records_posted_review() {
        let provider = FakeProvider::default();
        let result = ReviewResult {
            comments: Vec::new(),
            summary: "ok".into(),
            reviewed_files: 1,
            skipped_reason: None,
            token_usage: TokenUsage::default(),
            walkthrough: None,
            thread_decisions: Vec::new(),
        };
        provider.post_review(&pr(), &result).await.unwrap();
        assert_eq!(provider.posted_reviews.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_threads_records_ids() {
        let provider = FakeProvider::default();
        let ids = vec!["t1".to_string(), "t2".to_string()];
        let count = provider.resolve_threads(&pr(), &ids).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(*provider.resolved.lock().unwrap(), ids);
    }

    #[test]
    fn registry_errors_on_unknown_provider() {
        let registry = ProviderRegistry::new();
        assert!(registry.build("github").is_err());
    }

    #[test]
    fn registry_builds_registered_provider() {
        let registry = ProviderRegistry::new();
        registry.register("fake", || Box::new(FakeProvider::default()) as Box<dyn Provider>);
        assert!(registry.build("fake").is_ok());
    }
}
