use gdc_expression_matrix::domain::{Metric, SampleType};

#[test]
fn gdc_sample_type_vocabulary_routes() {
    let cases = [
        ("Primary Tumor", Some(SampleType::Tumor)),
        ("Recurrent Tumor", Some(SampleType::Tumor)),
        ("Additional - New Primary Tumor", Some(SampleType::Tumor)),
        ("Solid Tissue Normal", Some(SampleType::Normal)),
        ("Blood Derived Normal", Some(SampleType::Normal)),
        ("Bone Marrow Normal", Some(SampleType::Normal)),
        ("Metastatic", None),
        ("Cell Lines", None),
        ("Primary Xenograft Tissue", None),
        ("FFPE Scrolls", None),
    ];
    for (raw, expected) in cases {
        assert_eq!(SampleType::classify(raw), expected, "{raw}");
    }
}

#[test]
fn sample_type_labels_match_output_naming() {
    assert_eq!(SampleType::Tumor.label(), "tumor");
    assert_eq!(SampleType::Normal.label(), "normal");
}

#[test]
fn every_metric_has_a_distinct_source_column() {
    let columns: Vec<&str> = Metric::ALL.iter().map(|metric| metric.column()).collect();
    let mut deduped = columns.clone();
    deduped.dedup();
    assert_eq!(columns, deduped);
    assert!(columns.iter().all(|column| column.ends_with("_unstranded")));
}
