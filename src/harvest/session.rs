//! Harvest session entry point
//!
//! A [`Harvester`] runs at most one session at a time. Each session clears the
//! store, walks the main chain, drains the reply tasks and pending writes, and
//! reports the final snapshot.

use crate::config::HarvestConfig;
use crate::harvest::fallback::{FallbackExtractor, NoFallback};
use crate::harvest::replies::ReplyHarvester;
use crate::harvest::source::PageSource;
use crate::harvest::walker::TokenWalker;
use crate::harvest::{HarvestReport, SeedRequest};
use crate::resolver::EntityStore;
use crate::storage::{DurableSink, PendingWriteSet, RecordCounts, SessionStatus};
use crate::transport::{ClientContext, RemoteClient, RetryPolicy, RetryTransport};
use crate::{ConfigError, HarvestError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

/// Clears the in-progress flag when the session ends
struct SessionGuard<'a>(&'a AtomicBool);

impl<'a> SessionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, HarvestError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| HarvestError::SessionConflict)?;
        Ok(Self(flag))
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight harvest session runner
pub struct Harvester {
    config: HarvestConfig,
    url: String,
    client: Arc<dyn RemoteClient>,
    retry: RetryPolicy,
    sink: DurableSink,
    fallback: Arc<dyn FallbackExtractor>,
    readiness: Option<watch::Receiver<Option<ClientContext>>>,
    in_progress: AtomicBool,
}

impl Harvester {
    /// Creates a harvester posting to the configured endpoint
    ///
    /// Fails only when the endpoint is not a valid URL.
    pub fn new(
        config: HarvestConfig,
        client: Arc<dyn RemoteClient>,
        retry: RetryPolicy,
        sink: DurableSink,
    ) -> Result<Self, HarvestError> {
        let url = request_url(&config)?;

        Ok(Self {
            config,
            url,
            client,
            retry,
            sink,
            fallback: Arc::new(NoFallback),
            readiness: None,
            in_progress: AtomicBool::new(false),
        })
    }

    pub fn with_fallback(mut self, fallback: impl FallbackExtractor + 'static) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }

    /// Channel that delivers the client context when the seed carries none
    pub fn with_readiness(mut self, readiness: watch::Receiver<Option<ClientContext>>) -> Self {
        self.readiness = Some(readiness);
        self
    }

    pub fn sink(&self) -> &DurableSink {
        &self.sink
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Runs one session to completion
    ///
    /// Returns [`HarvestError::SessionConflict`] if another session is running
    /// on this harvester. A missing seed token or client context yields an
    /// empty report.
    pub async fn harvest(&self, seed: SeedRequest) -> Result<HarvestReport, HarvestError> {
        let _guard = SessionGuard::acquire(&self.in_progress)?;
        let session_id = seed.session_id;

        let Some(continuation) = seed.continuation else {
            tracing::warn!("Session {} has no seed token; nothing to harvest", session_id);
            return Ok(HarvestReport::empty(session_id));
        };

        let context = match seed.context {
            Some(context) => context,
            None => match self.wait_for_context().await {
                Some(context) => context,
                None => {
                    tracing::warn!("Session {} has no client context; nothing to harvest", session_id);
                    return Ok(HarvestReport::empty(session_id));
                }
            },
        };

        tracing::info!("Starting harvest session {}", session_id);
        self.sink.clear().await?;
        let id = session_id.clone();
        if let Err(e) = self.sink.with_store(move |store| store.begin_session(&id)).await {
            tracing::warn!("Failed to record session start: {}", e);
        }

        let source = Arc::new(PageSource::new(
            RetryTransport::new(Arc::clone(&self.client), self.retry),
            self.url.clone(),
            context,
            EntityStore::shared(),
            self.sink.clone(),
            Arc::new(PendingWriteSet::new()),
        ));
        let replies = ReplyHarvester::new(
            Arc::clone(&source),
            self.config.reply_concurrency as usize,
            self.config.max_reply_depth,
            self.config.max_pages,
        );
        let mut walker = TokenWalker::new(
            source,
            replies.clone(),
            Arc::clone(&self.fallback),
            self.config.max_pages,
        );

        let outcome = walker.run(continuation).await;

        let reply_count = outcome.records.iter().filter(|r| r.is_reply()).count();
        let report = HarvestReport {
            main_count: outcome.records.len() - reply_count,
            reply_count,
            main_fetches: outcome.main_fetches,
            reply_fetches: replies.fetches_issued(),
            used_fallback: outcome.used_fallback,
            records: outcome.records,
            session_id,
        };

        let status = if report.used_fallback {
            SessionStatus::Degraded
        } else if report.is_empty() {
            SessionStatus::Empty
        } else {
            SessionStatus::Completed
        };
        let counts = RecordCounts {
            main: report.main_count as u64,
            replies: report.reply_count as u64,
        };
        let id = report.session_id.clone();
        if let Err(e) = self
            .sink
            .with_store(move |store| store.finish_session(&id, status, counts))
            .await
        {
            tracing::warn!("Failed to record session end: {}", e);
        }

        tracing::info!(
            "Session {} finished: {} comments, {} replies ({} main fetches, {} reply fetches, peak {} concurrent)",
            report.session_id,
            report.main_count,
            report.reply_count,
            report.main_fetches,
            report.reply_fetches,
            replies.peak_running()
        );

        Ok(report)
    }

    /// Waits for the readiness channel to carry a context, up to the timeout
    async fn wait_for_context(&self) -> Option<ClientContext> {
        let mut readiness = self.readiness.clone()?;
        let timeout = self.config.ready_timeout();

        let waited = tokio::time::timeout(timeout, readiness.wait_for(Option::is_some)).await;
        match waited {
            Ok(Ok(context)) => context.clone(),
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::warn!("Client context not ready after {:?}", timeout);
                None
            }
        }
    }
}

/// `<endpoint>?key=<api key>` when a key is configured
fn request_url(config: &HarvestConfig) -> Result<String, ConfigError> {
    let mut url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.endpoint, e)))?;

    if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
        url.query_pairs_mut().append_pair("key", key);
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::testing::{comment_page, fast_retry, thread_page, ScriptedClient};
    use crate::model::{Continuation, ContinuationToken};
    use crate::storage::SqliteRecordStore;
    use serde_json::json;
    use std::time::Duration;

    fn harvester(client: ScriptedClient) -> Harvester {
        let mut config = HarvestConfig::with_endpoint("http://remote.test/youtubei/v1/next");
        config.ready_timeout_ms = 50;
        Harvester::new(
            config,
            Arc::new(client),
            fast_retry(),
            DurableSink::new(SqliteRecordStore::new_in_memory().unwrap()),
        )
        .unwrap()
    }

    fn context() -> ClientContext {
        ClientContext::from_value(json!({"client": {"clientName": "TEST"}}))
    }

    fn seed(token: &str) -> SeedRequest {
        SeedRequest::new("s1", Continuation::new(ContinuationToken::new(token)))
            .with_context(context())
    }

    #[tokio::test]
    async fn test_end_to_end_threads_and_replies() {
        let client = ScriptedClient::new()
            .page("T0", thread_page(&[("c1", Some("R1"))], Some("T1")))
            .page("T1", thread_page(&[("c2", None)], None))
            .page("R1", comment_page(&["r1"], None));
        let harvester = harvester(client.clone());

        let report = harvester.harvest(seed("T0")).await.unwrap();

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.main_count, 2);
        assert_eq!(report.reply_count, 1);
        assert_eq!(report.main_fetches, 2);
        assert_eq!(report.reply_fetches, 1);
        assert!(!report.used_fallback);

        let reply = report.records.iter().find(|r| r.id == "r1").unwrap();
        assert_eq!(reply.parent_id(), Some("c1"));
    }

    #[tokio::test]
    async fn test_empty_last_page_ends_session() {
        let client = ScriptedClient::new()
            .page("T0", thread_page(&[("c1", Some("R1")), ("c2", None)], Some("T1")))
            .page("T1", thread_page(&[], None))
            .page("R1", comment_page(&["r1"], None));
        let harvester = harvester(client.clone());

        let report = harvester.harvest(seed("T0")).await.unwrap();

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.main_fetches, 2);
        assert_eq!(report.reply_fetches, 1);
        assert_eq!(client.calls_for("T1"), 1);
        assert_eq!(client.calls_for("R1"), 1);
        assert_eq!(report.main_count, 2);
        assert_eq!(report.reply_count, 1);
    }

    #[tokio::test]
    async fn test_session_is_recorded() {
        let client = ScriptedClient::new().page("T0", comment_page(&["c1"], None));
        let harvester = harvester(client);

        harvester.harvest(seed("T0")).await.unwrap();

        let session = harvester
            .sink()
            .with_store(|store| store.get_session("s1"))
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.counts.main, 1);
    }

    #[tokio::test]
    async fn test_each_session_starts_clean() {
        let client = ScriptedClient::new()
            .page("A", comment_page(&["a1", "a2"], None))
            .page("B", comment_page(&["b1"], None));
        let harvester = harvester(client);

        harvester.harvest(seed("A")).await.unwrap();
        let report = harvester.harvest(seed("B")).await.unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].id, "b1");
    }

    #[tokio::test]
    async fn test_concurrent_session_is_rejected() {
        let client = ScriptedClient::new()
            .with_delay(Duration::from_millis(50))
            .page("T0", comment_page(&["c1"], None));
        let harvester = harvester(client);

        let (first, second) = tokio::join!(harvester.harvest(seed("T0")), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            harvester.harvest(seed("T0")).await
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(HarvestError::SessionConflict)));
        assert!(!harvester.is_running());
    }

    #[tokio::test]
    async fn test_missing_token_returns_empty_report() {
        let client = ScriptedClient::new();
        let harvester = harvester(client.clone());
        let request = SeedRequest {
            session_id: "s1".to_string(),
            continuation: None,
            context: Some(context()),
        };

        let report = harvester.harvest(request).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_context_times_out_to_empty_report() {
        let client = ScriptedClient::new().page("T0", comment_page(&["c1"], None));
        let (_tx, rx) = watch::channel(None);
        let harvester = harvester(client.clone()).with_readiness(rx);

        let request = SeedRequest::new("s1", Continuation::new(ContinuationToken::new("T0")));
        let report = harvester.harvest(request).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_context_delivered_through_readiness_channel() {
        let client = ScriptedClient::new().page("T0", comment_page(&["c1"], None));
        let (tx, rx) = watch::channel(None);
        let harvester = harvester(client).with_readiness(rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = tx.send(Some(context()));
            // Keep the sender alive past the wait
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let request = SeedRequest::new("s1", Continuation::new(ContinuationToken::new("T0")));
        let report = harvester.harvest(request).await.unwrap();

        assert_eq!(report.records.len(), 1);
    }

    #[test]
    fn test_request_url_appends_key() {
        let mut config = HarvestConfig::with_endpoint("https://remote.test/youtubei/v1/next");
        assert_eq!(
            request_url(&config).unwrap(),
            "https://remote.test/youtubei/v1/next"
        );

        config.api_key = Some("abc".to_string());
        assert_eq!(
            request_url(&config).unwrap(),
            "https://remote.test/youtubei/v1/next?key=abc"
        );
    }
}
