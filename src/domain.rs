use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Tumor,
    Normal,
}

impl SampleType {
    pub const ALL: [SampleType; 2] = [SampleType::Tumor, SampleType::Normal];

    // GDC sample_type is a controlled vocabulary ("Primary Tumor",
    // "Solid Tissue Normal", "Metastatic", ...); routing is by substring
    // after lowercasing, anything else is excluded from the run.
    pub fn classify(raw: &str) -> Option<Self> {
        let lowered = raw.to_lowercase();
        if lowered.contains("tumor") {
            return Some(SampleType::Tumor);
        }
        if lowered.contains("normal") {
            return Some(SampleType::Normal);
        }
        None
    }

    pub fn label(self) -> &'static str {
        match self {
            SampleType::Tumor => "tumor",
            SampleType::Normal => "normal",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            SampleType::Tumor => 0,
            SampleType::Normal => 1,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Tpm,
    Fpkm,
    FpkmUq,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Tpm, Metric::Fpkm, Metric::FpkmUq];

    // Source column names as written by the STAR - Counts workflow.
    pub fn column(self) -> &'static str {
        match self {
            Metric::Tpm => "tpm_unstranded",
            Metric::Fpkm => "fpkm_unstranded",
            Metric::FpkmUq => "fpkm_uq_unstranded",
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            Metric::Tpm => "tpm",
            Metric::Fpkm => "fpkm",
            Metric::FpkmUq => "fpkm_uq",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Metric::Tpm => 0,
            Metric::Fpkm => 1,
            Metric::FpkmUq => 2,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    pub file_id: String,
    pub sample_id: String,
    pub file_name: String,
    pub sample_type: SampleType,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionRecord {
    pub gene_id: String,
    pub gene_name: String,
    pub tpm: f64,
    pub fpkm: f64,
    pub fpkm_uq: f64,
}

impl ExpressionRecord {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Tpm => self.tpm,
            Metric::Fpkm => self.fpkm,
            Metric::FpkmUq => self.fpkm_uq,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleVector {
    pub sample_id: String,
    pub sample_type: SampleType,
    pub records: Vec<ExpressionRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_tumor_vocabulary() {
        assert_eq!(
            SampleType::classify("Primary Tumor"),
            Some(SampleType::Tumor)
        );
        assert_eq!(
            SampleType::classify("Recurrent Tumor"),
            Some(SampleType::Tumor)
        );
        assert_eq!(
            SampleType::classify("Additional - New Primary Tumor"),
            Some(SampleType::Tumor)
        );
    }

    #[test]
    fn classify_normal_vocabulary() {
        assert_eq!(
            SampleType::classify("Solid Tissue Normal"),
            Some(SampleType::Normal)
        );
        assert_eq!(
            SampleType::classify("Blood Derived Normal"),
            Some(SampleType::Normal)
        );
    }

    #[test]
    fn classify_rejects_other_types() {
        assert_eq!(SampleType::classify("Cell Lines"), None);
        assert_eq!(SampleType::classify("Metastatic"), None);
        assert_eq!(SampleType::classify(""), None);
    }

    #[test]
    fn metric_columns_match_star_workflow() {
        assert_eq!(Metric::Tpm.column(), "tpm_unstranded");
        assert_eq!(Metric::Fpkm.column(), "fpkm_unstranded");
        assert_eq!(Metric::FpkmUq.column(), "fpkm_uq_unstranded");
    }

    #[test]
    fn metric_file_stems() {
        let stems: Vec<&str> = Metric::ALL.iter().map(|m| m.file_stem()).collect();
        assert_eq!(stems, vec!["tpm", "fpkm", "fpkm_uq"]);
    }

    #[test]
    fn record_value_by_metric() {
        let record = ExpressionRecord {
            gene_id: "ENSG00000000003.15".to_string(),
            gene_name: "TSPAN6".to_string(),
            tpm: 1.0,
            fpkm: 2.0,
            fpkm_uq: 3.0,
        };
        assert_eq!(record.value(Metric::Tpm), 1.0);
        assert_eq!(record.value(Metric::Fpkm), 2.0);
        assert_eq!(record.value(Metric::FpkmUq), 3.0);
    }
}
