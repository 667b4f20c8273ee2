use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ResolvedConfig;
use crate::domain::{FileDescriptor, SampleVector};
use crate::error::GdcEmError;
use crate::export;
use crate::extract;
use crate::gdc::GdcClient;
use crate::matrix::MatrixSet;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub sites: Vec<SiteReport>,
}

impl RunSummary {
    pub fn sites_failed(&self) -> usize {
        self.sites
            .iter()
            .filter(|site| site.retrieval_failed)
            .count()
    }

    pub fn samples_skipped(&self) -> usize {
        self.sites.iter().map(|site| site.skipped.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub site: String,
    pub retrieval_failed: bool,
    pub files_found: usize,
    pub unclassified: usize,
    pub samples_assembled: usize,
    pub skipped: Vec<SkippedSample>,
    pub outputs: Vec<String>,
    pub export_failures: Vec<String>,
}

impl SiteReport {
    fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            retrieval_failed: false,
            files_found: 0,
            unclassified: 0,
            samples_assembled: 0,
            skipped: Vec::new(),
            outputs: Vec::new(),
            export_failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSample {
    pub file_id: String,
    pub sample_id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<C: GdcClient> {
    client: C,
}

impl<C: GdcClient> App<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    // No failure below the run level escapes: a metadata failure skips the
    // site, a fetch or parse failure skips the sample, an export failure
    // skips the file.
    pub fn run(&self, config: &ResolvedConfig, sink: &dyn ProgressSink) -> RunSummary {
        let started_at = iso_timestamp();
        let mut sites = Vec::with_capacity(config.sites.len());
        for site in &config.sites {
            sites.push(self.process_site(site, config, sink));
        }
        RunSummary {
            started_at,
            finished_at: iso_timestamp(),
            sites,
        }
    }

    fn process_site(
        &self,
        site: &str,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> SiteReport {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; querying files for {site}"),
            elapsed: None,
        });
        let mut report = SiteReport::new(site);

        let start = Instant::now();
        let query = match self.client.query_files(site) {
            Ok(query) => query,
            Err(err) => {
                warn!(site, error = %err, "metadata query failed, skipping site");
                report.retrieval_failed = true;
                return report;
            }
        };
        report.files_found = query.descriptors.len();
        report.unclassified = query.unclassified;
        if query.descriptors.is_empty() {
            info!(site, "no matching files");
            return report;
        }

        sink.event(ProgressEvent {
            message: format!(
                "phase=Fetch; {} files over {} workers",
                query.descriptors.len(),
                config.workers
            ),
            elapsed: Some(start.elapsed()),
        });

        let deadline = config.site_timeout.map(|timeout| Instant::now() + timeout);
        let matrices = MatrixSet::new();
        let assembled = AtomicUsize::new(0);
        let queue = Mutex::new(VecDeque::from(query.descriptors));
        let skipped = Mutex::new(Vec::new());

        let worker_count = config.workers.min(report.files_found);
        thread::scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|| {
                    loop {
                        let next = {
                            let mut queue = queue
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner());
                            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                                drain_expired(site, &mut queue, &skipped);
                                None
                            } else {
                                queue.pop_front()
                            }
                        };
                        let Some(descriptor) = next else {
                            break;
                        };
                        match self.fetch_sample(&descriptor) {
                            Ok(sample) => {
                                matrices.add_sample(&sample);
                                assembled.fetch_add(1, Ordering::Relaxed);
                                info!(
                                    file_name = %descriptor.file_name,
                                    sample_id = %descriptor.sample_id,
                                    "processed file"
                                );
                            }
                            Err(err) => {
                                warn!(
                                    file_id = %descriptor.file_id,
                                    sample_id = %descriptor.sample_id,
                                    error = %err,
                                    "skipping sample"
                                );
                                skipped
                                    .lock()
                                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                                    .push(SkippedSample {
                                        file_id: descriptor.file_id,
                                        sample_id: descriptor.sample_id,
                                        reason: err.to_string(),
                                    });
                            }
                        }
                    }
                });
            }
        });

        report.samples_assembled = assembled.load(Ordering::Relaxed);
        report.skipped = skipped
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        sink.event(ProgressEvent {
            message: format!(
                "phase=Export; {} samples assembled, {} skipped",
                report.samples_assembled,
                report.skipped.len()
            ),
            elapsed: Some(start.elapsed()),
        });

        for (sample_type, metric, matrix) in matrices.into_parts() {
            if matrix.is_empty() {
                info!(site, %sample_type, %metric, "no samples, nothing to export");
                continue;
            }
            let path = export::matrix_path(&config.output_root, site, sample_type, metric);
            match export::write_matrix(&matrix, &path) {
                Ok(()) => report.outputs.push(path.into_string()),
                Err(err) => {
                    warn!(error = %err, "export failed");
                    report.export_failures.push(err.to_string());
                }
            }
        }

        report
    }

    fn fetch_sample(&self, descriptor: &FileDescriptor) -> Result<SampleVector, GdcEmError> {
        let bytes = self.client.download(descriptor)?;
        extract::sample_from_bytes(descriptor, &bytes)
    }
}

fn drain_expired(
    site: &str,
    queue: &mut VecDeque<FileDescriptor>,
    skipped: &Mutex<Vec<SkippedSample>>,
) {
    if queue.is_empty() {
        return;
    }
    warn!(
        site,
        remaining = queue.len(),
        "site deadline exceeded, abandoning queued downloads"
    );
    let mut skipped = skipped
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    while let Some(descriptor) = queue.pop_front() {
        skipped.push(SkippedSample {
            file_id: descriptor.file_id,
            sample_id: descriptor.sample_id,
            reason: "site deadline exceeded".to_string(),
        });
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
