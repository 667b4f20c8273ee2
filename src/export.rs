use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{Metric, SampleType};
use crate::error::GdcEmError;
use crate::matrix::ExpressionMatrix;

pub fn matrix_path(
    output_root: &Utf8Path,
    site: &str,
    sample_type: SampleType,
    metric: Metric,
) -> Utf8PathBuf {
    output_root.join(site).join(format!(
        "{}_{}.csv",
        sample_type.label(),
        metric.file_stem()
    ))
}

// Columns are sorted by sample id at export time so output is reproducible
// regardless of download completion order.
pub fn write_matrix(matrix: &ExpressionMatrix, path: &Utf8Path) -> Result<(), GdcEmError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| export_error(path, err.to_string()))?;
    }

    let columns = matrix.columns();
    let mut order: Vec<usize> = (0..columns.len()).collect();
    order.sort_by(|&a, &b| columns[a].0.cmp(&columns[b].0));

    let mut writer =
        csv::Writer::from_path(path).map_err(|err| export_error(path, err.to_string()))?;

    let mut header = Vec::with_capacity(order.len() + 2);
    header.push("gene_id".to_string());
    header.push("gene_name".to_string());
    header.extend(order.iter().map(|&slot| columns[slot].0.clone()));
    writer
        .write_record(&header)
        .map_err(|err| export_error(path, err.to_string()))?;

    for (row, (gene_id, gene_name)) in matrix.genes().iter().enumerate() {
        let mut record = Vec::with_capacity(order.len() + 2);
        record.push(gene_id.clone());
        record.push(gene_name.clone());
        for &slot in &order {
            record.push(match columns[slot].1[row] {
                Some(value) => value.to_string(),
                None => String::new(),
            });
        }
        writer
            .write_record(&record)
            .map_err(|err| export_error(path, err.to_string()))?;
    }

    writer
        .flush()
        .map_err(|err| export_error(path, err.to_string()))
}

fn export_error(path: &Utf8Path, message: String) -> GdcEmError {
    GdcEmError::Export {
        path: path.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_path_layout() {
        let path = matrix_path(
            Utf8Path::new("tcga_csvs"),
            "Breast",
            SampleType::Tumor,
            Metric::FpkmUq,
        );
        assert_eq!(path, Utf8PathBuf::from("tcga_csvs/Breast/tumor_fpkm_uq.csv"));
    }
}
