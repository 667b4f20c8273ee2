use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{Metric, SampleType, SampleVector};

#[derive(Debug, Default)]
pub struct ExpressionMatrix {
    genes: Vec<(String, String)>,
    row_of: HashMap<String, usize>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl ExpressionMatrix {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn genes(&self) -> &[(String, String)] {
        &self.genes
    }

    pub fn columns(&self) -> &[(String, Vec<Option<f64>>)] {
        &self.columns
    }

    // The first sample fixes the row index. Later samples align by gene_id:
    // genes outside the index are dropped, indexed genes missing from the
    // sample leave an empty cell.
    pub fn add_sample(&mut self, sample: &SampleVector, metric: Metric) {
        if self.columns.is_empty() {
            self.genes = sample
                .records
                .iter()
                .map(|record| (record.gene_id.clone(), record.gene_name.clone()))
                .collect();
            self.row_of = self
                .genes
                .iter()
                .enumerate()
                .map(|(row, (gene_id, _))| (gene_id.clone(), row))
                .collect();
        }

        let mut values = vec![None; self.genes.len()];
        for record in &sample.records {
            if let Some(&row) = self.row_of.get(&record.gene_id) {
                values[row] = Some(record.value(metric));
            }
        }
        self.columns.push((sample.sample_id.clone(), values));
    }
}

// One accumulator per (sample_type, metric) partition, each behind its own
// lock, so concurrent samples only contend when they target the same table.
pub struct MatrixSet {
    cells: [Mutex<ExpressionMatrix>; SampleType::ALL.len() * Metric::ALL.len()],
}

impl MatrixSet {
    pub fn new() -> Self {
        Self {
            cells: std::array::from_fn(|_| Mutex::new(ExpressionMatrix::default())),
        }
    }

    fn cell(&self, sample_type: SampleType, metric: Metric) -> &Mutex<ExpressionMatrix> {
        &self.cells[sample_type.index() * Metric::ALL.len() + metric.index()]
    }

    pub fn add_sample(&self, sample: &SampleVector) {
        for metric in Metric::ALL {
            let mut matrix = self
                .cell(sample.sample_type, metric)
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            matrix.add_sample(sample, metric);
        }
    }

    pub fn into_parts(self) -> Vec<(SampleType, Metric, ExpressionMatrix)> {
        self.cells
            .into_iter()
            .enumerate()
            .map(|(slot, cell)| {
                let sample_type = SampleType::ALL[slot / Metric::ALL.len()];
                let metric = Metric::ALL[slot % Metric::ALL.len()];
                let matrix = cell
                    .into_inner()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                (sample_type, metric, matrix)
            })
            .collect()
    }
}

impl Default for MatrixSet {
    fn default() -> Self {
        Self::new()
    }
}
