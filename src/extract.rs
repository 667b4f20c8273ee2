use std::io::Read;

use flate2::read::GzDecoder;
use tracing::warn;

use crate::domain::{ExpressionRecord, FileDescriptor, SampleVector};
use crate::error::GdcEmError;

pub const REQUIRED_COLUMNS: [&str; 5] = [
    "gene_id",
    "gene_name",
    "tpm_unstranded",
    "fpkm_unstranded",
    "fpkm_uq_unstranded",
];

// STAR writes aggregate counters (N_unmapped, N_ambiguous, N_noFeature)
// as pseudo-rows under this prefix.
const SUMMARY_PREFIX: &str = "N_";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn sample_from_bytes(
    descriptor: &FileDescriptor,
    bytes: &[u8],
) -> Result<SampleVector, GdcEmError> {
    let text = decode_text(descriptor, bytes)?;
    parse_sample(descriptor, &text)
}

// GDC does not name files consistently, so compression is detected from
// the magic bytes, never from the extension or Content-Type.
pub fn decode_text(descriptor: &FileDescriptor, bytes: &[u8]) -> Result<String, GdcEmError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut text = String::new();
        decoder
            .read_to_string(&mut text)
            .map_err(|err| decode_error(descriptor, err.to_string()))?;
        return Ok(text);
    }
    String::from_utf8(bytes.to_vec()).map_err(|err| decode_error(descriptor, err.to_string()))
}

pub fn parse_sample(descriptor: &FileDescriptor, text: &str) -> Result<SampleVector, GdcEmError> {
    let mut lines = text.lines().filter(|line| !line.starts_with('#'));
    let header = lines
        .next()
        .ok_or_else(|| decode_error(descriptor, "file has no header row".to_string()))?;

    let columns: Vec<&str> = header.split('\t').collect();
    let mut positions = [0usize; REQUIRED_COLUMNS.len()];
    for (slot, name) in REQUIRED_COLUMNS.iter().enumerate() {
        match columns.iter().position(|column| column == name) {
            Some(position) => positions[slot] = position,
            None => {
                return Err(GdcEmError::MissingColumn {
                    file_id: descriptor.file_id.clone(),
                    sample_id: descriptor.sample_id.clone(),
                    column: name.to_string(),
                });
            }
        }
    }
    let [gene_id_at, gene_name_at, tpm_at, fpkm_at, fpkm_uq_at] = positions;

    let mut records = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let Some(gene_id) = fields.get(gene_id_at).map(|value| value.trim()) else {
            warn!(
                file_id = %descriptor.file_id,
                "skipping row with missing gene_id"
            );
            continue;
        };
        if gene_id.starts_with(SUMMARY_PREFIX) {
            continue;
        }
        let gene_name = fields
            .get(gene_name_at)
            .map(|value| value.trim())
            .unwrap_or("");
        let (Some(tpm), Some(fpkm), Some(fpkm_uq)) = (
            numeric(&fields, tpm_at),
            numeric(&fields, fpkm_at),
            numeric(&fields, fpkm_uq_at),
        ) else {
            // a bad row never fails the sample
            warn!(
                file_id = %descriptor.file_id,
                sample_id = %descriptor.sample_id,
                gene_id,
                "skipping row with missing or non-numeric metric value"
            );
            continue;
        };
        records.push(ExpressionRecord {
            gene_id: gene_id.to_string(),
            gene_name: gene_name.to_string(),
            tpm,
            fpkm,
            fpkm_uq,
        });
    }

    Ok(SampleVector {
        sample_id: descriptor.sample_id.clone(),
        sample_type: descriptor.sample_type,
        records,
    })
}

fn numeric(fields: &[&str], position: usize) -> Option<f64> {
    fields
        .get(position)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

fn decode_error(descriptor: &FileDescriptor, message: String) -> GdcEmError {
    GdcEmError::Decode {
        file_id: descriptor.file_id.clone(),
        sample_id: descriptor.sample_id.clone(),
        message,
    }
}
