//! Diagnostic runner orchestrating probes, aggregation and panel state

use crate::clipboard::ClipboardSink;
use crate::config::Config;
use crate::endpoints::EndpointMap;
use crate::errors::{DrWebError, Result};
use crate::fetcher::{BoundedFetcher, FetchOptions, Fetcher};
use crate::report::{CheckResults, Clock, Report, SystemClock};
use crate::widget::PanelState;

use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// What a call to [`DiagnosticRunner::run_all`] did
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(Arc<Report>),
    /// No backend URL; nothing was probed
    NotConfigured,
    /// Another run was in flight; nothing was probed
    AlreadyRunning,
}

impl RunOutcome {
    pub fn report(&self) -> Option<&Arc<Report>> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Probes every endpoint against the configured backend and keeps the latest report
pub struct DiagnosticRunner {
    config: Config,
    endpoints: EndpointMap,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    state: RwLock<PanelState>,
    auto_ran: AtomicBool,
}

impl DiagnosticRunner {
    /// Create a runner probing the default endpoints over HTTP
    pub fn new(config: Config) -> Result<Self> {
        config.validate().map_err(DrWebError::Config)?;

        let fetcher = Arc::new(BoundedFetcher::new()?);
        Ok(Self::with_parts(
            config,
            EndpointMap::default(),
            fetcher,
            Arc::new(SystemClock),
        ))
    }

    pub fn with_parts(
        config: Config,
        endpoints: EndpointMap,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            endpoints,
            fetcher,
            clock,
            state: RwLock::new(PanelState::default()),
            auto_ran: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Probe every endpoint and replace the current report.
    ///
    /// Does nothing without a backend URL, and refuses to start while a
    /// previous run is still in flight.
    #[instrument(skip(self))]
    pub async fn run_all(&self) -> RunOutcome {
        match self.claim_run().await {
            Ok(base) => self.execute_run(base).await,
            Err(outcome) => outcome,
        }
    }

    /// Claim the busy flag now and probe in a background task.
    ///
    /// The panel shows the run as in flight as soon as this returns `Ok`.
    pub async fn spawn_run(self: &Arc<Self>) -> std::result::Result<JoinHandle<RunOutcome>, RunOutcome> {
        let base = self.claim_run().await?.to_string();
        let runner = Arc::clone(self);
        Ok(tokio::spawn(async move { runner.execute_run(&base).await }))
    }

    /// Run once on first readiness; later calls and unconfigured runners do nothing
    pub async fn auto_run(&self) -> Option<RunOutcome> {
        if !self.take_auto_run() {
            return None;
        }

        info!("Starting automatic diagnostics");
        Some(self.run_all().await)
    }

    /// Background variant of [`DiagnosticRunner::auto_run`]
    pub async fn spawn_auto_run(self: &Arc<Self>) -> Option<JoinHandle<RunOutcome>> {
        if !self.take_auto_run() {
            return None;
        }

        info!("Starting automatic diagnostics");
        self.spawn_run().await.ok()
    }

    fn take_auto_run(&self) -> bool {
        self.is_configured() && !self.auto_ran.swap(true, Ordering::SeqCst)
    }

    /// Resolve the base URL and enter the busy state
    async fn claim_run(&self) -> std::result::Result<&str, RunOutcome> {
        let Some(base) = self.config.base_url() else {
            debug!("No backend URL configured, skipping diagnostics");
            return Err(RunOutcome::NotConfigured);
        };

        if !self.state.write().await.start_run() {
            warn!("Diagnostics already running, ignoring request");
            return Err(RunOutcome::AlreadyRunning);
        }

        Ok(base)
    }

    /// Probe, aggregate and publish; the busy flag must already be held
    async fn execute_run(&self, base: &str) -> RunOutcome {
        let started = self.clock.now();
        info!("Running {} diagnostic checks against {}", self.endpoints.len(), base);

        let results = if self.config.concurrent {
            self.probe_concurrently(base).await
        } else {
            self.probe_sequentially(base).await
        };

        let report = Arc::new(Report::new(
            started,
            self.clock.now(),
            self.config.origin.clone(),
            base.to_string(),
            results,
        ));

        let failed = report.failed_checks();
        if failed.is_empty() {
            info!("Diagnostics finished: {}", report.verdict);
        } else {
            info!("Diagnostics finished: {} (failed: {})", report.verdict, failed.join(", "));
        }

        self.state.write().await.complete_run(Arc::clone(&report));
        RunOutcome::Completed(report)
    }

    fn probe_options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_timeout(self.config.timeout)
            .with_header("Content-Type", "application/json")
    }

    async fn probe_sequentially(&self, base: &str) -> CheckResults {
        let options = self.probe_options();
        let mut results = CheckResults::with_capacity(self.endpoints.len());

        for (name, url) in self.endpoints.resolve(base) {
            let result = self.fetcher.fetch(&url, &options).await;
            results.insert(name.to_string(), result);
        }

        results
    }

    async fn probe_concurrently(&self, base: &str) -> CheckResults {
        let options = self.probe_options();
        let probes = self.endpoints.resolve(base).map(|(name, url)| {
            let options = &options;
            async move { (name.to_string(), self.fetcher.fetch(&url, options).await) }
        });

        // join_all yields in input order
        join_all(probes).await.into_iter().collect()
    }

    pub async fn toggle_open(&self) -> bool {
        let mut state = self.state.write().await;
        state.toggle_open();
        state.open
    }

    /// Copy of the current panel state
    pub async fn snapshot(&self) -> PanelState {
        self.state.read().await.clone()
    }

    pub async fn current_report(&self) -> Option<Arc<Report>> {
        self.state.read().await.report.clone()
    }

    pub async fn render(&self) -> String {
        self.state.read().await.render(self.is_configured())
    }

    /// Write the current report as indented JSON; returns false when there is none
    pub async fn copy_report(&self, sink: &dyn ClipboardSink) -> Result<bool> {
        let Some(report) = self.current_report().await else {
            debug!("No report to copy");
            return Ok(false);
        };

        sink.write_text(&report.to_pretty_json()?)?;
        info!("Copied report to clipboard");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::fetcher::FetchResult;
    use crate::report::Verdict;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Answers from a per-path script and records every call
    #[derive(Default)]
    struct ScriptedFetcher {
        script: HashMap<String, FetchResult>,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedFetcher {
        fn answering(pairs: &[(&str, FetchResult)]) -> Self {
            Self {
                script: pairs.iter().map(|(p, r)| (p.to_string(), r.clone())).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult {
            self.calls.lock().unwrap().push((url.to_string(), options.headers.clone()));
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            let path = url.split_once("/api").map(|(_, p)| format!("/api{}", p)).unwrap_or_default();
            self.script.get(&path).cloned().unwrap_or_else(ok)
        }
    }

    /// Advances one second per reading
    struct SteppingClock {
        start: DateTime<Utc>,
        ticks: Mutex<i64>,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut ticks = self.ticks.lock().unwrap();
            *ticks += 1;
            self.start + chrono::Duration::seconds(*ticks)
        }
    }

    fn ok() -> FetchResult {
        FetchResult::from_response(StatusCode::OK, r#"{"ok":true}"#.to_string())
    }

    fn runner(base: Option<&str>, fetcher: Arc<ScriptedFetcher>) -> DiagnosticRunner {
        let mut config = Config::default();
        if let Some(base) = base {
            config = config.with_base_url(base);
        }
        let clock = SteppingClock {
            start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ticks: Mutex::new(0),
        };
        DiagnosticRunner::with_parts(config, EndpointMap::default(), fetcher, Arc::new(clock))
    }

    #[tokio::test]
    async fn test_unconfigured_run_is_noop() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let runner = runner(None, fetcher.clone());

        assert!(matches!(runner.run_all().await, RunOutcome::NotConfigured));
        assert!(runner.auto_run().await.is_none());
        assert!(fetcher.calls().is_empty());

        let state = runner.snapshot().await;
        assert!(!state.busy);
        assert!(state.report.is_none());
    }

    #[tokio::test]
    async fn test_probes_in_order_with_json_header() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let runner = runner(Some("https://api.example.com//"), fetcher.clone());

        let outcome = runner.run_all().await;
        let report = outcome.report().unwrap();

        assert_eq!(
            fetcher.calls(),
            vec![
                "https://api.example.com/api/healthz",
                "https://api.example.com/api/diag",
                "https://api.example.com/api/selftest",
                "https://api.example.com/api/version",
                "https://api.example.com/api/time",
            ]
        );
        for (_, headers) in fetcher.calls.lock().unwrap().iter() {
            assert_eq!(headers, &vec![("Content-Type".to_string(), "application/json".to_string())]);
        }

        assert_eq!(report.verdict, Verdict::Ok);
        assert_eq!(report.backend_base, "https://api.example.com");
        assert_eq!(report.frontend_origin, "cli://localhost");
        assert!(report.finished > report.started);
        let names: Vec<&str> = report.results.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["health", "diag", "selftest", "version", "time"]);

        let state = runner.snapshot().await;
        assert!(!state.busy);
        assert_eq!(state.report.as_deref(), Some(&**report));
    }

    #[tokio::test]
    async fn test_informational_failures_keep_ok_verdict() {
        let fetcher = Arc::new(ScriptedFetcher::answering(&[
            ("/api/version", FetchResult::timeout()),
            ("/api/time", FetchResult::timeout()),
        ]));
        let runner = runner(Some("https://api.example.com"), fetcher);

        let outcome = runner.run_all().await;
        assert_eq!(outcome.report().unwrap().verdict, Verdict::Ok);
    }

    #[tokio::test]
    async fn test_critical_timeout_fails_verdict() {
        let fetcher = Arc::new(ScriptedFetcher::answering(&[("/api/diag", FetchResult::timeout())]));
        let runner = runner(Some("https://api.example.com"), fetcher);

        let outcome = runner.run_all().await;
        let report = outcome.report().unwrap();
        assert_eq!(report.verdict, Verdict::Fail);
        assert!(report.results["diag"].is_timeout());
        assert!(report.results["health"].ok);
    }

    #[tokio::test]
    async fn test_concurrent_mode_keeps_order() {
        let fetcher = Arc::new(ScriptedFetcher::answering(&[(
            "/api/selftest",
            FetchResult::from_response(StatusCode::INTERNAL_SERVER_ERROR, "broken".to_string()),
        )]));
        let mut config = Config::default().with_base_url("https://api.example.com");
        config.concurrent = true;
        let runner = DiagnosticRunner::with_parts(
            config,
            EndpointMap::default(),
            fetcher.clone(),
            Arc::new(SystemClock),
        );

        let outcome = runner.run_all().await;
        let report = outcome.report().unwrap();
        let names: Vec<&str> = report.results.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["health", "diag", "selftest", "version", "time"]);
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(fetcher.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_auto_run_happens_once() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let runner = runner(Some("https://api.example.com"), fetcher.clone());

        assert!(runner.auto_run().await.is_some());
        assert!(runner.auto_run().await.is_none());
        assert_eq!(fetcher.calls().len(), 5);

        // explicit runs are still allowed
        runner.run_all().await;
        assert_eq!(fetcher.calls().len(), 10);
    }

    #[tokio::test]
    async fn test_overlapping_run_is_rejected() {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(ScriptedFetcher {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let runner = Arc::new(runner(Some("https://api.example.com"), fetcher.clone()));

        let first = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run_all().await }
        });

        while !runner.snapshot().await.busy {
            tokio::task::yield_now().await;
        }
        assert!(matches!(runner.run_all().await, RunOutcome::AlreadyRunning));
        assert!(runner.current_report().await.is_none());

        gate.add_permits(5);
        let outcome = first.await.unwrap();
        assert!(outcome.report().is_some());
        assert_eq!(fetcher.calls().len(), 5);
        assert!(!runner.snapshot().await.busy);
    }

    #[tokio::test]
    async fn test_spawned_run_is_busy_until_complete() {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(ScriptedFetcher {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let runner = Arc::new(runner(Some("https://api.example.com"), fetcher.clone()));

        let handle = runner.spawn_run().await.unwrap();
        assert!(runner.snapshot().await.busy);
        assert!(matches!(runner.spawn_run().await, Err(RunOutcome::AlreadyRunning)));

        gate.add_permits(5);
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.report().unwrap().verdict, Verdict::Ok);
        assert!(!runner.snapshot().await.busy);
        assert_eq!(fetcher.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_spawn_auto_run_happens_once() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let runner = Arc::new(runner(Some("https://api.example.com"), fetcher.clone()));

        let handle = runner.spawn_auto_run().await.unwrap();
        assert!(runner.snapshot().await.busy);
        assert!(handle.await.unwrap().report().is_some());
        assert!(runner.spawn_auto_run().await.is_none());
        assert!(runner.auto_run().await.is_none());
        assert_eq!(fetcher.calls().len(), 5);

        let unconfigured = Arc::new(self::runner(None, Arc::new(ScriptedFetcher::default())));
        assert!(unconfigured.spawn_auto_run().await.is_none());
        assert!(matches!(unconfigured.spawn_run().await, Err(RunOutcome::NotConfigured)));
    }

    #[tokio::test]
    async fn test_copy_report() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let runner = runner(Some("https://api.example.com"), fetcher);
        let clipboard = MemoryClipboard::default();

        assert!(!runner.copy_report(&clipboard).await.unwrap());
        assert!(clipboard.writes().is_empty());

        runner.run_all().await;
        assert!(runner.copy_report(&clipboard).await.unwrap());

        let writes = clipboard.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].contains('\n'));
        let copied: Report = serde_json::from_str(&writes[0]).unwrap();
        assert_eq!(Some(&copied), runner.current_report().await.as_deref());
    }

    #[test]
    fn test_toggle_open() {
        let runner = runner(None, Arc::new(ScriptedFetcher::default()));
        assert!(tokio_test::block_on(runner.toggle_open()));
        assert!(!tokio_test::block_on(runner.toggle_open()));
        assert!(!tokio_test::block_on(runner.snapshot()).busy);
    }
}
