use std::collections::{HashMap, HashSet};
use std::time::Duration;

use camino::Utf8PathBuf;

use gdc_expression_matrix::app::{App, ProgressEvent, ProgressSink};
use gdc_expression_matrix::config::ResolvedConfig;
use gdc_expression_matrix::domain::{FileDescriptor, SampleType};
use gdc_expression_matrix::error::GdcEmError;
use gdc_expression_matrix::gdc::{FileQuery, GdcClient};

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
struct MockGdc {
    descriptors: HashMap<String, Vec<FileDescriptor>>,
    files: HashMap<String, Vec<u8>>,
    fail_sites: HashSet<String>,
}

impl MockGdc {
    fn with_file(
        mut self,
        site: &str,
        file_id: &str,
        sample_id: &str,
        sample_type: SampleType,
        content: Option<Vec<u8>>,
    ) -> Self {
        self.descriptors
            .entry(site.to_string())
            .or_default()
            .push(FileDescriptor {
                file_id: file_id.to_string(),
                sample_id: sample_id.to_string(),
                file_name: format!("{file_id}.rna_seq.augmented_star_gene_counts.tsv"),
                sample_type,
                project_id: Some("TCGA-TEST".to_string()),
            });
        if let Some(content) = content {
            self.files.insert(file_id.to_string(), content);
        }
        self
    }

    fn failing_site(mut self, site: &str) -> Self {
        self.fail_sites.insert(site.to_string());
        self
    }
}

impl GdcClient for MockGdc {
    fn query_files(&self, site: &str) -> Result<FileQuery, GdcEmError> {
        if self.fail_sites.contains(site) {
            return Err(GdcEmError::RetrievalStatus {
                site: site.to_string(),
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(FileQuery {
            descriptors: self.descriptors.get(site).cloned().unwrap_or_default(),
            unclassified: 0,
        })
    }

    fn download(&self, descriptor: &FileDescriptor) -> Result<Vec<u8>, GdcEmError> {
        self.files
            .get(&descriptor.file_id)
            .cloned()
            .ok_or_else(|| GdcEmError::FetchStatus {
                file_id: descriptor.file_id.clone(),
                sample_id: descriptor.sample_id.clone(),
                status: 404,
            })
    }
}

// (tpm, fpkm, fpkm_uq) per gene, G1 then G2
fn star_content(g1: (f64, f64, f64), g2: (f64, f64, f64)) -> Vec<u8> {
    let mut text = String::from("# gene-model: GENCODE v36\n");
    text.push_str("gene_id\tgene_name\tgene_type\tunstranded\ttpm_unstranded\tfpkm_unstranded\tfpkm_uq_unstranded\n");
    text.push_str("N_unmapped\t\t\t100\t\t\t\n");
    text.push_str(&format!(
        "G1\tALPHA\tprotein_coding\t10\t{}\t{}\t{}\n",
        g1.0, g1.1, g1.2
    ));
    text.push_str(&format!(
        "G2\tBETA\tprotein_coding\t20\t{}\t{}\t{}\n",
        g2.0, g2.1, g2.2
    ));
    text.into_bytes()
}

fn config(root: &std::path::Path, sites: &[&str]) -> ResolvedConfig {
    ResolvedConfig {
        sites: sites.iter().map(|site| site.to_string()).collect(),
        output_root: Utf8PathBuf::from_path_buf(root.to_path_buf()).unwrap(),
        workers: 4,
        site_timeout: None,
    }
}

fn read_csv(path: &std::path::Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(|field| field.to_string())
        .collect();
    let rows = reader
        .records()
        .map(|row| row.unwrap().iter().map(|field| field.to_string()).collect())
        .collect();
    (header, rows)
}

#[test]
fn breast_site_assembles_six_matrices() {
    let client = MockGdc::default()
        .with_file(
            "Breast",
            "t1",
            "s1",
            SampleType::Tumor,
            Some(star_content((1.5, 2.5, 3.5), (4.5, 5.5, 6.5))),
        )
        .with_file(
            "Breast",
            "t2",
            "s2",
            SampleType::Tumor,
            Some(star_content((10.0, 20.0, 30.0), (40.0, 50.0, 60.0))),
        )
        .with_file(
            "Breast",
            "n1",
            "s3",
            SampleType::Normal,
            Some(star_content((7.0, 8.0, 9.0), (17.0, 18.0, 19.0))),
        );

    let temp = tempfile::tempdir().unwrap();
    let summary = App::new(client).run(&config(temp.path(), &["Breast"]), &NoopSink);

    assert_eq!(summary.sites.len(), 1);
    let report = &summary.sites[0];
    assert!(!report.retrieval_failed);
    assert_eq!(report.files_found, 3);
    assert_eq!(report.samples_assembled, 3);
    assert!(report.skipped.is_empty());
    assert_eq!(report.outputs.len(), 6);

    let site_dir = temp.path().join("Breast");
    for name in [
        "tumor_tpm.csv",
        "tumor_fpkm.csv",
        "tumor_fpkm_uq.csv",
        "normal_tpm.csv",
        "normal_fpkm.csv",
        "normal_fpkm_uq.csv",
    ] {
        assert!(site_dir.join(name).exists(), "{name}");
    }

    let (header, rows) = read_csv(&site_dir.join("tumor_tpm.csv"));
    assert_eq!(header, vec!["gene_id", "gene_name", "s1", "s2"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], vec!["G1", "ALPHA", "1.5", "10"]);
    assert_eq!(rows[1], vec!["G2", "BETA", "4.5", "40"]);

    let (header, rows) = read_csv(&site_dir.join("normal_tpm.csv"));
    assert_eq!(header, vec!["gene_id", "gene_name", "s3"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], vec!["G1", "ALPHA", "7"]);

    let (_, rows) = read_csv(&site_dir.join("tumor_fpkm_uq.csv"));
    assert_eq!(rows[0], vec!["G1", "ALPHA", "3.5", "30"]);
}

#[test]
fn one_failed_fetch_does_not_abort_the_site() {
    let client = MockGdc::default()
        .with_file(
            "Breast",
            "t1",
            "s1",
            SampleType::Tumor,
            Some(star_content((1.0, 2.0, 3.0), (4.0, 5.0, 6.0))),
        )
        // no bytes registered for t2: the download 404s
        .with_file("Breast", "t2", "s2", SampleType::Tumor, None)
        .with_file(
            "Breast",
            "n1",
            "s3",
            SampleType::Normal,
            Some(star_content((7.0, 8.0, 9.0), (17.0, 18.0, 19.0))),
        );

    let temp = tempfile::tempdir().unwrap();
    let summary = App::new(client).run(&config(temp.path(), &["Breast"]), &NoopSink);

    let report = &summary.sites[0];
    assert_eq!(report.samples_assembled, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].file_id, "t2");
    assert_eq!(report.skipped[0].sample_id, "s2");
    assert_eq!(report.outputs.len(), 6);

    let (header, rows) = read_csv(&temp.path().join("Breast/tumor_tpm.csv"));
    assert_eq!(header, vec!["gene_id", "gene_name", "s1"]);
    assert_eq!(rows[0], vec!["G1", "ALPHA", "1"]);
}

#[test]
fn corrupt_file_is_skipped_with_reason() {
    let client = MockGdc::default()
        .with_file(
            "Breast",
            "t1",
            "s1",
            SampleType::Tumor,
            Some(b"gene_id\tgene_name\ttpm_unstranded\nG1\tALPHA\t1.0\n".to_vec()),
        )
        .with_file(
            "Breast",
            "t2",
            "s2",
            SampleType::Tumor,
            Some(star_content((1.0, 2.0, 3.0), (4.0, 5.0, 6.0))),
        );

    let temp = tempfile::tempdir().unwrap();
    let summary = App::new(client).run(&config(temp.path(), &["Breast"]), &NoopSink);

    let report = &summary.sites[0];
    assert_eq!(report.samples_assembled, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("fpkm_unstranded"));
}

#[test]
fn retrieval_failure_skips_site_but_not_run() {
    let client = MockGdc::default()
        .failing_site("Breast")
        .with_file(
            "Lung",
            "l1",
            "s9",
            SampleType::Tumor,
            Some(star_content((1.0, 2.0, 3.0), (4.0, 5.0, 6.0))),
        );

    let temp = tempfile::tempdir().unwrap();
    let summary = App::new(client).run(&config(temp.path(), &["Breast", "Lung"]), &NoopSink);

    assert_eq!(summary.sites.len(), 2);
    assert!(summary.sites[0].retrieval_failed);
    assert!(summary.sites[0].outputs.is_empty());
    assert!(!summary.sites[1].retrieval_failed);
    assert_eq!(summary.sites[1].samples_assembled, 1);
    assert_eq!(summary.sites_failed(), 1);
}

#[test]
fn expired_site_deadline_abandons_queued_downloads() {
    let client = MockGdc::default()
        .with_file(
            "Breast",
            "t1",
            "s1",
            SampleType::Tumor,
            Some(star_content((1.0, 2.0, 3.0), (4.0, 5.0, 6.0))),
        )
        .with_file(
            "Breast",
            "t2",
            "s2",
            SampleType::Tumor,
            Some(star_content((1.0, 2.0, 3.0), (4.0, 5.0, 6.0))),
        );

    let temp = tempfile::tempdir().unwrap();
    let mut config = config(temp.path(), &["Breast"]);
    config.site_timeout = Some(Duration::ZERO);
    let summary = App::new(client).run(&config, &NoopSink);

    let report = &summary.sites[0];
    assert_eq!(report.samples_assembled, 0);
    assert_eq!(report.skipped.len(), 2);
    assert!(
        report
            .skipped
            .iter()
            .all(|skip| skip.reason == "site deadline exceeded")
    );
    assert!(report.outputs.is_empty());
}

#[test]
fn site_without_files_produces_no_output() {
    let client = MockGdc::default();
    let temp = tempfile::tempdir().unwrap();
    let summary = App::new(client).run(&config(temp.path(), &["Eye"]), &NoopSink);

    let report = &summary.sites[0];
    assert_eq!(report.files_found, 0);
    assert!(report.outputs.is_empty());
    assert!(!temp.path().join("Eye").exists());
}
