mod common;

use common::{
    SyntheticPeak,
    ms2_scan,
    sample,
};
use lcmsfeat::io::mgf::{
    write_associated,
    write_reduced,
};
use lcmsfeat::io::{
    write_quant_table,
    write_summary,
};
use lcmsfeat::{
    Pipeline,
    PipelineConfig,
    PipelineOutput,
};

fn run() -> PipelineOutput {
    let ms2 = vec![
        ms2_scan(501, 104.5, 200.0, &[(81.05, 40.0), (120.2, 0.0)]),
        ms2_scan(502, 105.5, 200.0, &[(81.05, 60.0)]),
    ];
    let samples = vec![
        sample("first", "qc", &[SyntheticPeak::new(200.0, 105.0)], ms2),
        sample("second", "qc", &[SyntheticPeak::new(200.0, 105.0)], vec![]),
    ];
    Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run_loaded(samples)
        .unwrap()
}

#[test]
fn test_mgf_records_are_keyed_by_feature() {
    let out = run();

    let mut buf = Vec::new();
    assert_eq!(write_associated(&mut buf, &out.associated).unwrap(), 2);
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text.matches("BEGIN IONS").count(), 2);
    assert_eq!(text.matches("FEATURE_ID=1\n").count(), 2);
    assert!(text.contains("PEPMASS=200.000000\n"));
    // Zero intensity fragments are dropped on association.
    assert!(!text.contains("120.2"));

    for reduced in out.reduced.iter() {
        let mut buf = Vec::new();
        assert_eq!(write_reduced(&mut buf, reduced).unwrap(), 1);
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("BEGIN IONS\nFEATURE_ID=1\n"), "{}", text);
        assert!(text.ends_with("END IONS\n\n"));
    }
}

#[test]
fn test_quant_table_has_one_column_per_sample() {
    let out = run();
    let mut buf = Vec::new();
    write_quant_table(&mut buf, &out.tables.full).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let mut lines = text.lines();

    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    assert_eq!(header[0], "row ID");
    assert_eq!(&header[header.len() - 2..], ["first Peak area", "second Peak area"]);

    let row: Vec<&str> = lines.next().unwrap().split('\t').collect();
    assert_eq!(row.len(), header.len());
    assert_eq!(row[0], "1");
    assert!(row[row.len() - 1].parse::<f64>().unwrap() > 0.0);
    assert!(lines.next().is_none());
}

#[test]
fn test_summary_is_json() {
    let out = run();
    let mut buf = Vec::new();
    write_summary(&mut buf, &out.report).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    assert_eq!(value["num_features"], 1);
    assert_eq!(value["num_spectra_associated"], 2);
    assert_eq!(value["samples"].as_array().unwrap().len(), 2);
    assert_eq!(value["views"][0]["name"], "max_intensity");
}
