use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{FileDescriptor, SampleType};
use crate::error::GdcEmError;

pub const FILES_ENDPOINT: &str = "https://api.gdc.cancer.gov/files";
pub const DATA_ENDPOINT: &str = "https://api.gdc.cancer.gov/data";

// GDC caps page sizes well below typical per-site result counts.
const PAGE_SIZE: usize = 500;

const QUERY_FIELDS: &str =
    "file_id,file_name,cases.samples.submitter_id,cases.samples.sample_type,cases.project.project_id";

#[derive(Debug, Default)]
pub struct FileQuery {
    pub descriptors: Vec<FileDescriptor>,
    pub unclassified: usize,
}

impl FileQuery {
    fn merge(&mut self, page: FileQuery) {
        self.descriptors.extend(page.descriptors);
        self.unclassified += page.unclassified;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageInfo {
    pub hits: usize,
    pub total: usize,
}

pub trait GdcClient: Send + Sync {
    fn query_files(&self, site: &str) -> Result<FileQuery, GdcEmError>;
    fn download(&self, descriptor: &FileDescriptor) -> Result<Vec<u8>, GdcEmError>;
}

#[derive(Clone)]
pub struct GdcHttpClient {
    client: Client,
    files_endpoint: String,
    data_endpoint: String,
}

impl GdcHttpClient {
    pub fn new() -> Result<Self, GdcEmError> {
        Self::with_endpoints(FILES_ENDPOINT, DATA_ENDPOINT)
    }

    pub fn with_endpoints(files_endpoint: &str, data_endpoint: &str) -> Result<Self, GdcEmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gdc-em/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GdcEmError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| GdcEmError::Http(err.to_string()))?;
        Ok(Self {
            client,
            files_endpoint: files_endpoint.to_string(),
            data_endpoint: data_endpoint.to_string(),
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, reqwest::Error>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    fn page_request(site: &str, from: usize) -> Value {
        json!({
            "filters": {
                "op": "and",
                "content": [
                    {"op": "=", "content": {"field": "cases.primary_site", "value": site}},
                    {"op": "=", "content": {"field": "data_category", "value": "Transcriptome Profiling"}},
                    {"op": "=", "content": {"field": "data_type", "value": "Gene Expression Quantification"}},
                    {"op": "=", "content": {"field": "experimental_strategy", "value": "RNA-Seq"}},
                    {"op": "=", "content": {"field": "analysis.workflow_type", "value": "STAR - Counts"}},
                    {"op": "=", "content": {"field": "access", "value": "open"}},
                    {"op": "=", "content": {"field": "data_format", "value": "TSV"}}
                ]
            },
            "fields": QUERY_FIELDS,
            "format": "JSON",
            "from": from,
            "size": PAGE_SIZE,
        })
    }
}

impl GdcClient for GdcHttpClient {
    fn query_files(&self, site: &str) -> Result<FileQuery, GdcEmError> {
        let mut result = FileQuery::default();
        let mut from = 0usize;
        loop {
            let body = Self::page_request(site, from);
            let response = self
                .send_with_retries(|| self.client.post(&self.files_endpoint).json(&body))
                .map_err(|err| GdcEmError::Retrieval {
                    site: site.to_string(),
                    message: err.to_string(),
                })?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response
                    .text()
                    .unwrap_or_else(|_| "GDC request failed".to_string());
                return Err(GdcEmError::RetrievalStatus {
                    site: site.to_string(),
                    status,
                    message,
                });
            }
            let payload: Value = response.json().map_err(|err| GdcEmError::Retrieval {
                site: site.to_string(),
                message: err.to_string(),
            })?;
            let (page, info) = parse_files_page(site, &payload)?;
            result.merge(page);
            from += info.hits;
            if info.hits == 0 || from >= info.total {
                break;
            }
        }
        Ok(result)
    }

    fn download(&self, descriptor: &FileDescriptor) -> Result<Vec<u8>, GdcEmError> {
        let url = format!("{}/{}", self.data_endpoint, descriptor.file_id);
        let response = self
            .send_with_retries(|| self.client.get(&url))
            .map_err(|err| GdcEmError::Fetch {
                file_id: descriptor.file_id.clone(),
                sample_id: descriptor.sample_id.clone(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(GdcEmError::FetchStatus {
                file_id: descriptor.file_id.clone(),
                sample_id: descriptor.sample_id.clone(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().map_err(|err| GdcEmError::Fetch {
            file_id: descriptor.file_id.clone(),
            sample_id: descriptor.sample_id.clone(),
            message: err.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

pub fn parse_files_page(site: &str, payload: &Value) -> Result<(FileQuery, PageInfo), GdcEmError> {
    let data = payload.get("data").ok_or_else(|| GdcEmError::Retrieval {
        site: site.to_string(),
        message: "response missing data".to_string(),
    })?;
    let hits = data
        .get("hits")
        .and_then(|value| value.as_array())
        .ok_or_else(|| GdcEmError::Retrieval {
            site: site.to_string(),
            message: "response missing data.hits".to_string(),
        })?;

    let mut page = FileQuery::default();
    for hit in hits {
        collect_hit(hit, &mut page);
    }

    let total = data
        .get("pagination")
        .and_then(|value| value.get("total"))
        .and_then(|value| value.as_u64())
        .unwrap_or(0) as usize;

    Ok((
        page,
        PageInfo {
            hits: hits.len(),
            total,
        },
    ))
}

// One GDC file record may expand to several descriptors, one per nested
// case/sample. Entries without a submitter id or sample type are dropped.
fn collect_hit(hit: &Value, page: &mut FileQuery) {
    let Some(file_id) = hit.get("file_id").and_then(|value| value.as_str()) else {
        return;
    };
    let file_name = hit
        .get("file_name")
        .and_then(|value| value.as_str())
        .unwrap_or("")
        .to_string();
    let Some(cases) = hit.get("cases").and_then(|value| value.as_array()) else {
        return;
    };
    for case in cases {
        let project_id = case
            .get("project")
            .and_then(|value| value.get("project_id"))
            .and_then(|value| value.as_str())
            .map(|value| value.to_string());
        let Some(samples) = case.get("samples").and_then(|value| value.as_array()) else {
            continue;
        };
        for sample in samples {
            let Some(sample_id) = sample.get("submitter_id").and_then(|value| value.as_str())
            else {
                continue;
            };
            let Some(raw_type) = sample.get("sample_type").and_then(|value| value.as_str()) else {
                continue;
            };
            match SampleType::classify(raw_type) {
                Some(sample_type) => page.descriptors.push(FileDescriptor {
                    file_id: file_id.to_string(),
                    sample_id: sample_id.to_string(),
                    file_name: file_name.clone(),
                    sample_type,
                    project_id: project_id.clone(),
                }),
                None => {
                    debug!(sample_id, raw_type, "sample type is neither tumor nor normal");
                    page.unclassified += 1;
                }
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
