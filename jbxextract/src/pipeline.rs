//! Fallback extraction pipeline.
//!
//! Entered when backend search returns the terminal auth-required
//! classification, or directly for requests the routing classifier marks as
//! extract-first. Either way the pipeline bypasses the node pool: it
//! resolves a direct stream URL through the worker pool and starts the
//! session's stream itself.

use crate::credentials::CredentialCache;
use crate::model::ExtractionOutput;
use crate::selection::{AudioCandidate, choose_audio_candidate};
use crate::worker::ExtractionPool;
use jbxplayer::{NowPlaying, PlayerSession, StreamTransport};
use jbxsource::{ProviderKind, Track};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Classifier deciding which requests go straight to extraction.
///
/// The lists come from configuration; the classifier itself only does the
/// matching. URL queries match when their host is one of the configured
/// domains (or a subdomain of one) — matching on the parsed host rather
/// than a raw substring keeps search phrases that merely mention a platform
/// name out of this path.
#[derive(Debug, Clone, Default)]
pub struct ExtractRouting {
    domains: Vec<String>,
    kinds: Vec<ProviderKind>,
}

impl ExtractRouting {
    pub fn new(domains: Vec<String>, kinds: Vec<ProviderKind>) -> Self {
        Self {
            domains: domains.into_iter().map(|d| d.to_lowercase()).collect(),
            kinds,
        }
    }

    /// True when the request should resolve through extraction first.
    pub fn requires_extraction(&self, query: &str, kind: ProviderKind) -> bool {
        if query.trim_start().starts_with("search:") {
            return true;
        }
        if self.kinds.contains(&kind) {
            return true;
        }
        if let Ok(url) = url::Url::parse(query.trim()) {
            if let Some(host) = url.host_str() {
                let host = host.to_lowercase();
                return self
                    .domains
                    .iter()
                    .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")));
            }
        }
        false
    }
}

/// Resolves a query to a direct stream and starts it on a session.
pub struct FallbackPipeline {
    credentials: Arc<CredentialCache>,
    pool: Arc<ExtractionPool>,
}

impl FallbackPipeline {
    pub fn new(credentials: Arc<CredentialCache>, pool: Arc<ExtractionPool>) -> Self {
        Self { credentials, pool }
    }

    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    /// Resolves `raw_query` and starts the resulting stream on the session.
    ///
    /// Returns `true` only if the stream actually started. Everything that
    /// can go wrong on the way (no credentials, extraction failure, nothing
    /// playable, transport refusal) resolves to `false`; the caller decides
    /// what to tell the user.
    pub async fn resolve_and_play(
        &self,
        session: &mut PlayerSession,
        transport: &dyn StreamTransport,
        raw_query: &str,
    ) -> bool {
        let query = extractor_query(raw_query);
        // Missing credentials are not fatal; extraction runs without them
        let credentials = self.credentials.fetch().await;

        let Some(output) = self.extract_with_retry(&query, credentials.clone()).await else {
            return false;
        };

        let candidate = match choose_audio_candidate(&output) {
            Some(candidate) => Some(candidate),
            None => self.second_pass(&output, credentials).await,
        };
        let Some(candidate) = candidate else {
            info!(query = %query, "Extraction produced no playable audio candidate");
            return false;
        };

        match transport.start_stream(session.id(), &candidate.url).await {
            Ok(()) => {
                session.begin_stream(candidate_track(&candidate, &query));
                // Attaching the descriptor is best-effort display state
                session.set_now_playing(NowPlaying {
                    title: candidate.entry.title.clone(),
                    uploader: candidate.entry.uploader.clone(),
                    duration_secs: candidate.entry.duration,
                    source_url: candidate.url.clone(),
                });
                info!(
                    session = %session.id(),
                    title = candidate.entry.title.as_deref().unwrap_or(&query),
                    "Started direct stream"
                );
                true
            }
            Err(error) => {
                warn!(error = %error, "Failed to start direct stream");
                false
            }
        }
    }

    /// Runs the extraction, falling back to a cookie-less attempt when the
    /// first try used credentials and failed.
    async fn extract_with_retry(
        &self,
        query: &str,
        credentials: Option<String>,
    ) -> Option<ExtractionOutput> {
        match self.pool.submit(query, credentials.clone()).await {
            Ok(output) => Some(output),
            Err(error) if credentials.is_some() => {
                debug!(error = %error, "Extraction with credentials failed, retrying without");
                self.pool.submit(query, None).await.ok()
            }
            Err(error) => {
                debug!(error = %error, "Extraction failed");
                None
            }
        }
    }

    /// When a container's first entry has no usable candidate, extract that
    /// entry's own page once and select from the richer result.
    async fn second_pass(
        &self,
        output: &ExtractionOutput,
        credentials: Option<String>,
    ) -> Option<AudioCandidate> {
        let first = output.entries.as_ref()?.first()?;
        let url = first.webpage_url.clone().or_else(|| first.url.clone())?;
        debug!(url = %url, "Re-extracting first entry for a direct candidate");

        let output = self.extract_with_retry(&url, credentials).await?;
        choose_audio_candidate(&output)
    }
}

/// Builds the query the extractor sees: URLs pass through, anything else
/// becomes a platform search, and the explicit `search:` opt-in prefix is
/// stripped.
fn extractor_query(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("search:")
        .map(str::trim)
        .unwrap_or(trimmed);
    if is_http_url(stripped) {
        stripped.to_string()
    } else {
        format!("ytsearch:{stripped}")
    }
}

fn is_http_url(text: &str) -> bool {
    url::Url::parse(text)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

/// Synthesizes the queue-visible track for a directly-started stream.
fn candidate_track(candidate: &AudioCandidate, query: &str) -> Track {
    let title = candidate
        .entry
        .title
        .clone()
        .unwrap_or_else(|| query.to_string());
    let duration = Duration::from_secs_f64(candidate.entry.duration.unwrap_or(0.0).max(0.0));
    Track::new(candidate.url.clone(), title, duration, ProviderKind::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::extractor::Extractor;
    use crate::model::{ExtractionEntry, FormatDescriptor};
    use async_trait::async_trait;
    use jbxsource::{ChannelId, SessionId};
    use std::path::Path;
    use std::sync::Mutex;

    // ============ Routing ============

    fn routing() -> ExtractRouting {
        ExtractRouting::new(
            vec!["youtube.com".into(), "youtu.be".into()],
            vec![ProviderKind::MusicTrack],
        )
    }

    #[test]
    fn url_host_matching_includes_subdomains() {
        let routing = routing();
        assert!(routing.requires_extraction(
            "https://www.youtube.com/watch?v=x",
            ProviderKind::Generic
        ));
        assert!(routing.requires_extraction("https://youtu.be/x", ProviderKind::Generic));
        assert!(!routing.requires_extraction("https://example.org/x", ProviderKind::Generic));
    }

    #[test]
    fn search_phrases_mentioning_a_platform_do_not_match() {
        let routing = routing();
        assert!(!routing.requires_extraction("that youtube.com song everyone plays", ProviderKind::Generic));
    }

    #[test]
    fn search_prefix_is_an_explicit_opt_in() {
        let routing = routing();
        assert!(routing.requires_extraction("search: some song", ProviderKind::Generic));
    }

    #[test]
    fn configured_kinds_always_extract() {
        let routing = routing();
        assert!(routing.requires_extraction("anything", ProviderKind::MusicTrack));
        assert!(!routing.requires_extraction("anything", ProviderKind::SoundCloud));
    }

    // ============ Pipeline ============

    enum Step {
        Ok(ExtractionOutput),
        FailWithCredentials,
        Fail,
    }

    struct ScriptedExtractor {
        steps: Mutex<Vec<Step>>,
        queries: Mutex<Vec<(String, bool)>>,
    }

    impl ScriptedExtractor {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps),
                queries: Mutex::new(Vec::new()),
            })
        }

        fn queries(&self) -> Vec<(String, bool)> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl Extractor for ScriptedExtractor {
        fn extract(
            &self,
            query: &str,
            credential_file: Option<&Path>,
        ) -> crate::Result<ExtractionOutput> {
            self.queries
                .lock()
                .unwrap()
                .push((query.to_string(), credential_file.is_some()));
            let step = self.steps.lock().unwrap().remove(0);
            match step {
                Step::Ok(output) => Ok(output),
                Step::FailWithCredentials if credential_file.is_some() => {
                    Err(ExtractError::ExtractorFailed("cookies rejected".into()))
                }
                Step::FailWithCredentials => Ok(single_entry_output("after-retry")),
                Step::Fail => Err(ExtractError::ExtractorFailed("nothing found".into())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        started: Mutex<Vec<(SessionId, String)>>,
        refuse: bool,
    }

    #[async_trait]
    impl StreamTransport for RecordingTransport {
        async fn start_stream(&self, session: SessionId, url: &str) -> anyhow::Result<()> {
            if self.refuse {
                anyhow::bail!("voice gateway unavailable");
            }
            self.started.lock().unwrap().push((session, url.to_string()));
            Ok(())
        }

        async fn stop(&self, _session: SessionId) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn single_entry_output(tag: &str) -> ExtractionOutput {
        ExtractionOutput::from_entry(ExtractionEntry {
            url: Some(format!("https://cdn.example.org/{tag}")),
            title: Some(format!("title {tag}")),
            uploader: Some("someone".into()),
            duration: Some(200.0),
            ..Default::default()
        })
    }

    fn pipeline_with(extractor: Arc<ScriptedExtractor>) -> FallbackPipeline {
        let credentials = Arc::new(CredentialCache::new(None, "gistfile1.txt"));
        let pool = Arc::new(ExtractionPool::new(extractor, 1));
        FallbackPipeline::new(credentials, pool)
    }

    fn session() -> PlayerSession {
        PlayerSession::new(SessionId(9), ChannelId(1), ProviderKind::Generic)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn successful_resolution_starts_the_stream_and_attaches_metadata() {
        let extractor = ScriptedExtractor::new(vec![Step::Ok(single_entry_output("hit"))]);
        let pipeline = pipeline_with(extractor.clone());
        let transport = RecordingTransport::default();
        let mut session = session();

        let ok = pipeline
            .resolve_and_play(&mut session, &transport, "some song")
            .await;
        assert!(ok);

        let started = transport.started.lock().unwrap();
        assert_eq!(started[0].1, "https://cdn.example.org/hit");
        assert!(session.is_playing());
        assert_eq!(session.current().unwrap().title, "title hit");
        assert_eq!(
            session.now_playing().unwrap().title.as_deref(),
            Some("title hit")
        );

        // Non-URL queries become platform searches
        assert_eq!(extractor.queries()[0].0, "ytsearch:some song");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn urls_pass_through_unwrapped() {
        let extractor = ScriptedExtractor::new(vec![Step::Ok(single_entry_output("hit"))]);
        let pipeline = pipeline_with(extractor.clone());
        let mut session = session();

        pipeline
            .resolve_and_play(
                &mut session,
                &RecordingTransport::default(),
                "https://example.org/watch?v=1",
            )
            .await;

        assert_eq!(extractor.queries()[0].0, "https://example.org/watch?v=1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_credentialed_extraction_retries_without_credentials() {
        let extractor = ScriptedExtractor::new(vec![Step::FailWithCredentials, Step::FailWithCredentials]);
        let pipeline = pipeline_with(extractor.clone());
        pipeline.credentials().store("cookie text".to_string());
        let mut session = session();

        let ok = pipeline
            .resolve_and_play(&mut session, &RecordingTransport::default(), "q")
            .await;
        assert!(ok);

        let queries = extractor.queries();
        assert_eq!(queries.len(), 2);
        assert!(queries[0].1, "first attempt carries the cookie file");
        assert!(!queries[1].1, "retry runs without credentials");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn extraction_failure_resolves_to_false() {
        let extractor = ScriptedExtractor::new(vec![Step::Fail]);
        let pipeline = pipeline_with(extractor);
        let transport = RecordingTransport::default();
        let mut session = session();

        let ok = pipeline
            .resolve_and_play(&mut session, &transport, "q")
            .await;
        assert!(!ok);
        assert!(transport.started.lock().unwrap().is_empty());
        assert!(!session.is_playing());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unplayable_first_entry_triggers_a_second_pass() {
        let container = ExtractionOutput {
            entries: Some(vec![ExtractionEntry {
                webpage_url: Some("https://example.org/watch?v=first".into()),
                ..Default::default()
            }]),
            entry: ExtractionEntry::default(),
        };
        let extractor =
            ScriptedExtractor::new(vec![Step::Ok(container), Step::Ok(single_entry_output("resolved"))]);
        let pipeline = pipeline_with(extractor.clone());
        let mut session = session();

        let ok = pipeline
            .resolve_and_play(&mut session, &RecordingTransport::default(), "q")
            .await;
        assert!(ok);

        let queries = extractor.queries();
        assert_eq!(queries[1].0, "https://example.org/watch?v=first");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transport_refusal_resolves_to_false() {
        let extractor = ScriptedExtractor::new(vec![Step::Ok(single_entry_output("hit"))]);
        let pipeline = pipeline_with(extractor);
        let transport = RecordingTransport {
            refuse: true,
            ..Default::default()
        };
        let mut session = session();

        let ok = pipeline
            .resolve_and_play(&mut session, &transport, "q")
            .await;
        assert!(!ok);
        assert!(!session.is_playing());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_candidate_anywhere_resolves_to_false() {
        let video_only = ExtractionOutput::from_entry(ExtractionEntry {
            formats: vec![FormatDescriptor {
                acodec: Some("none".into()),
                url: Some("video".into()),
                ..Default::default()
            }],
            ..Default::default()
        });
        let extractor = ScriptedExtractor::new(vec![Step::Ok(video_only)]);
        let pipeline = pipeline_with(extractor);
        let mut session = session();

        let ok = pipeline
            .resolve_and_play(&mut session, &RecordingTransport::default(), "q")
            .await;
        assert!(!ok);
    }
}
