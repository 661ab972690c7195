//! Concurrent scan of one user's domains with bounded in-flight probes and
//! incremental, batched persistence of results.

mod batch;

pub use batch::ScanBatch;

use anyhow::Result;
use monitor_core::{clean_host, DomainRecord, DomainStore, HostProbe, ProbeError, ScanSummary};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Maximum probes in flight at once.
    pub pool_size: usize,
    /// Flush once this many results are buffered.
    pub batch_size: usize,
    /// Flush once this long has passed since the previous flush.
    pub flush_interval: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            pool_size: 30,
            batch_size: 10,
            flush_interval: Duration::from_secs(2),
        }
    }
}

/// Cleaned, non-empty, first-seen-order unique hostnames of `records`.
pub fn collect_hosts(records: &[DomainRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| !r.domain.trim().is_empty())
        .map(|r| clean_host(&r.domain))
        .filter(|h| !h.is_empty() && seen.insert(h.clone()))
        .collect()
}

pub struct Scanner {
    probe: Arc<dyn HostProbe>,
    store: Arc<dyn DomainStore>,
    cfg: ScanConfig,
}

impl Scanner {
    pub fn new(probe: Arc<dyn HostProbe>, store: Arc<dyn DomainStore>, cfg: ScanConfig) -> Self {
        Scanner { probe, store, cfg }
    }

    /// Probe every stored domain of `user`, writing results back as they
    /// accumulate. Only a failure to read the domain list is an error;
    /// per-host failures are counted in the summary.
    pub async fn run(&self, user: &str) -> Result<ScanSummary> {
        let store = self.store.clone();
        let owner = user.to_string();
        let records = tokio::task::spawn_blocking(move || store.list_domains(&owner)).await??;
        let hosts = collect_hosts(&records);
        if hosts.is_empty() {
            info!(user, "no domains to scan");
            return Ok(ScanSummary::default());
        }

        let pool_size = self.cfg.pool_size.max(1);
        info!(user, hosts = hosts.len(), pool_size, "starting scan");

        let sem = Arc::new(Semaphore::new(pool_size));
        let mut tasks = JoinSet::new();
        let mut task_hosts = HashMap::with_capacity(hosts.len());
        for host in &hosts {
            let probe = self.probe.clone();
            let sem = sem.clone();
            let h = host.clone();
            let handle = tasks.spawn(async move {
                let outcome = match sem.acquire_owned().await {
                    Ok(_permit) => probe.probe(&h).await,
                    Err(_) => Err(ProbeError::PoolClosed),
                };
                (h, outcome)
            });
            task_hosts.insert(handle.id(), host.clone());
        }

        let mut batch = ScanBatch::new(self.cfg.batch_size, self.cfg.flush_interval);
        let mut errors = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((host, Ok(result))) => {
                    debug!(user, host = %host, status = %result.status, "probe finished");
                    batch.push(host, result);
                }
                Ok((host, Err(e))) => {
                    errors += 1;
                    error!(user, host = %host, error = %e, "probe failed");
                }
                Err(e) => {
                    errors += 1;
                    let host = task_hosts.get(&e.id()).map(String::as_str).unwrap_or("?");
                    error!(user, host, error = %e, "probe task aborted");
                }
            }
            if batch.should_flush(Instant::now()) {
                self.flush(user, &mut batch).await;
            }
        }
        if !batch.is_empty() {
            self.flush(user, &mut batch).await;
        }

        info!(user, domains = hosts.len(), errors, "scan complete");
        Ok(ScanSummary { domains_scanned: hosts.len(), errors })
    }

    /// Write and clear the buffer on the blocking pool. A failed write is
    /// logged and its entries are dropped; the next scan derives them again.
    async fn flush(&self, user: &str, batch: &mut ScanBatch) {
        let updates = batch.take();
        let flushed = updates.len();
        let store = self.store.clone();
        let owner = user.to_string();
        let written = tokio::task::spawn_blocking(move || store.update_fields(&owner, &updates)).await;
        match written {
            Ok(Ok(report)) => info!(
                user,
                flushed,
                updated = report.updated.len(),
                skipped = report.skipped.len(),
                "results flushed"
            ),
            Ok(Err(e)) => error!(user, flushed, error = %e, "flush failed, results dropped"),
            Err(e) => error!(user, flushed, error = %e, "flush task aborted, results dropped"),
        }
    }

    /// Fire-and-forget: run a full scan on its own task. The outcome is only
    /// logged; dropping the returned handle does not cancel the scan.
    pub fn spawn_background(self: &Arc<Self>, user: impl Into<String>) -> JoinHandle<()> {
        let scanner = Arc::clone(self);
        let user = user.into();
        tokio::spawn(async move {
            match scanner.run(&user).await {
                Ok(summary) => info!(
                    user = %user,
                    domains = summary.domains_scanned,
                    errors = summary.errors,
                    "background scan finished"
                ),
                Err(e) => error!(user = %user, error = %e, "background scan failed"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use monitor_core::{FieldUpdates, ProbeResult, ProbeStatus, UpdateReport};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeProbe {
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        failing: HashSet<String>,
        panicking: HashSet<String>,
    }

    #[async_trait]
    impl HostProbe for FakeProbe {
        async fn probe(&self, host: &str) -> Result<ProbeResult, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.panicking.contains(host) {
                panic!("probe blew up on {host}");
            }
            if self.failing.contains(host) {
                return Err(ProbeError::Other(format!("unexpected failure for {host}")));
            }
            Ok(ProbeResult {
                status: ProbeStatus::Live,
                ssl_expiration: "2030-01-01".into(),
                ssl_issuer: format!("CA for {host}"),
            })
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        records: Vec<DomainRecord>,
        flushes: Mutex<Vec<FieldUpdates>>,
        fail_reads: bool,
        fail_writes: bool,
        write_delay: Duration,
    }

    impl RecordingStore {
        fn with_hosts<I: IntoIterator<Item = String>>(hosts: I) -> Self {
            RecordingStore {
                records: hosts.into_iter().map(DomainRecord::pending).collect(),
                ..Default::default()
            }
        }

        fn flushes(&self) -> Vec<FieldUpdates> {
            self.flushes.lock().unwrap().clone()
        }

        fn flushed_hosts(&self) -> BTreeSet<String> {
            self.flushes().into_iter().flat_map(|u| u.into_keys()).collect()
        }
    }

    impl DomainStore for RecordingStore {
        fn list_domains(&self, _user: &str) -> Result<Vec<DomainRecord>> {
            if self.fail_reads {
                return Err(anyhow!("store offline"));
            }
            Ok(self.records.clone())
        }

        fn update_fields(&self, _user: &str, updates: &FieldUpdates) -> Result<UpdateReport> {
            if !self.write_delay.is_zero() {
                std::thread::sleep(self.write_delay);
            }
            self.flushes.lock().unwrap().push(updates.clone());
            if self.fail_writes {
                return Err(anyhow!("disk full"));
            }
            Ok(UpdateReport { updated: updates.keys().cloned().collect(), skipped: vec![] })
        }
    }

    fn hosts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("host{i}.example.com")).collect()
    }

    fn make_scanner(probe: Arc<FakeProbe>, store: Arc<RecordingStore>, cfg: ScanConfig) -> Scanner {
        Scanner::new(probe, store, cfg)
    }

    #[test]
    fn collect_hosts_cleans_skips_and_dedupes() {
        let records: Vec<DomainRecord> = ["", "  ", "A.com", "https://a.com/x", "b.com.", "http://"]
            .into_iter()
            .map(DomainRecord::pending)
            .collect();
        assert_eq!(collect_hosts(&records), vec!["a.com", "b.com"]);
    }

    #[tokio::test]
    async fn flushes_by_size_with_final_remainder() {
        let probe = Arc::new(FakeProbe::default());
        let store = Arc::new(RecordingStore::with_hosts(hosts(25)));
        let cfg = ScanConfig { pool_size: 30, batch_size: 10, flush_interval: Duration::from_secs(3600) };
        let summary = make_scanner(probe, store.clone(), cfg).run("alice").await.unwrap();

        assert_eq!(summary, ScanSummary { domains_scanned: 25, errors: 0 });
        let sizes: Vec<usize> = store.flushes().iter().map(|f| f.len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(store.flushed_hosts(), hosts(25).into_iter().collect());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_flight_probes_never_exceed_pool_size() {
        let probe = Arc::new(FakeProbe { delay: Duration::from_millis(20), ..Default::default() });
        let store = Arc::new(RecordingStore::with_hosts(hosts(40)));
        let cfg = ScanConfig { pool_size: 5, ..ScanConfig::default() };
        let summary = make_scanner(probe.clone(), store.clone(), cfg).run("alice").await.unwrap();

        assert_eq!(summary.domains_scanned, 40);
        let peak = probe.peak.load(Ordering::SeqCst);
        assert!((1..=5).contains(&peak), "peak in-flight was {peak}");
        assert_eq!(store.flushed_hosts().len(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_scans_flush_on_interval() {
        let probe = Arc::new(FakeProbe { delay: Duration::from_millis(30), ..Default::default() });
        let store = Arc::new(RecordingStore::with_hosts(hosts(4)));
        let cfg = ScanConfig { pool_size: 1, batch_size: 100, flush_interval: Duration::from_millis(50) };
        make_scanner(probe, store.clone(), cfg).run("alice").await.unwrap();

        assert!(store.flushes().len() >= 2, "expected progressive flushes, got {:?}", store.flushes());
        assert_eq!(store.flushed_hosts(), hosts(4).into_iter().collect());
    }

    #[tokio::test]
    async fn task_failures_are_counted_and_left_out() {
        let all = hosts(5);
        let probe = Arc::new(FakeProbe {
            failing: [all[1].clone()].into_iter().collect(),
            panicking: [all[3].clone()].into_iter().collect(),
            ..Default::default()
        });
        let store = Arc::new(RecordingStore::with_hosts(all.clone()));
        let summary = make_scanner(probe, store.clone(), ScanConfig::default()).run("alice").await.unwrap();

        assert_eq!(summary, ScanSummary { domains_scanned: 5, errors: 2 });
        let expected: BTreeSet<String> = [&all[0], &all[2], &all[4]].into_iter().cloned().collect();
        assert_eq!(store.flushed_hosts(), expected);
    }

    #[tokio::test]
    async fn duplicate_hosts_are_probed_once() {
        let probe = Arc::new(FakeProbe::default());
        let store = Arc::new(RecordingStore::with_hosts(
            ["a.com", "A.COM", "https://a.com/", "b.com", ""].map(String::from),
        ));
        let summary = make_scanner(probe.clone(), store.clone(), ScanConfig::default()).run("alice").await.unwrap();
        assert_eq!(summary.domains_scanned, 2);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.flushes().len(), 1);
    }

    #[tokio::test]
    async fn empty_domain_list_writes_nothing() {
        let probe = Arc::new(FakeProbe::default());
        let store = Arc::new(RecordingStore::default());
        let summary = make_scanner(probe.clone(), store.clone(), ScanConfig::default()).run("alice").await.unwrap();
        assert_eq!(summary, ScanSummary::default());
        assert!(store.flushes().is_empty());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_flush_does_not_abort_scan() {
        let probe = Arc::new(FakeProbe::default());
        let store = Arc::new(RecordingStore { fail_writes: true, ..RecordingStore::with_hosts(hosts(12)) });
        let cfg = ScanConfig { batch_size: 5, flush_interval: Duration::from_secs(3600), ..ScanConfig::default() };
        let summary = make_scanner(probe.clone(), store.clone(), cfg).run("alice").await.unwrap();
        assert_eq!(summary, ScanSummary { domains_scanned: 12, errors: 0 });
        assert_eq!(store.flushes().len(), 3);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn unreadable_store_fails_the_run() {
        let probe = Arc::new(FakeProbe::default());
        let store = Arc::new(RecordingStore { fail_reads: true, ..Default::default() });
        assert!(make_scanner(probe, store, ScanConfig::default()).run("alice").await.is_err());
    }

    #[tokio::test]
    async fn repeated_scans_produce_identical_updates() {
        let probe = Arc::new(FakeProbe::default());
        let store = Arc::new(RecordingStore::with_hosts(hosts(7)));
        let s = make_scanner(probe, store.clone(), ScanConfig::default());
        s.run("alice").await.unwrap();
        s.run("alice").await.unwrap();
        let flushes = store.flushes();
        assert_eq!(flushes.len(), 2);
        assert_eq!(flushes[0], flushes[1]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn slow_writes_do_not_stall_other_scans() {
        let probe = Arc::new(FakeProbe::default());
        let store = Arc::new(RecordingStore {
            write_delay: Duration::from_millis(300),
            ..RecordingStore::with_hosts(hosts(1))
        });
        let s = make_scanner(probe, store.clone(), ScanConfig::default());

        let started = std::time::Instant::now();
        let (a, b) = tokio::join!(s.run("alice"), s.run("bob"));
        let elapsed = started.elapsed();

        assert_eq!(a.unwrap().domains_scanned, 1);
        assert_eq!(b.unwrap().domains_scanned, 1);
        assert_eq!(store.flushes().len(), 2);
        assert!(elapsed < Duration::from_millis(550), "flushes ran back to back: {elapsed:?}");
    }

    #[tokio::test]
    async fn background_scan_runs_detached() {
        let probe = Arc::new(FakeProbe::default());
        let store = Arc::new(RecordingStore::with_hosts(hosts(3)));
        let s = Arc::new(make_scanner(probe, store.clone(), ScanConfig::default()));
        s.spawn_background("alice").await.unwrap();
        assert_eq!(store.flushed_hosts().len(), 3);
    }

    #[tokio::test]
    async fn background_failure_is_only_logged() {
        let probe = Arc::new(FakeProbe::default());
        let store = Arc::new(RecordingStore { fail_reads: true, ..Default::default() });
        let s = Arc::new(make_scanner(probe, store, ScanConfig::default()));
        assert!(s.spawn_background("alice").await.is_ok());
    }
}
