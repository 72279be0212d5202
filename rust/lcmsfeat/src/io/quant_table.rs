use std::io::Write;

use crate::errors::DataProcessingError;
use crate::table::QuantificationTable;

const FIXED_COLUMNS: [&str; 8] = [
    "row ID",
    "row m/z",
    "row retention time",
    "mzmin",
    "mzmax",
    "rtmin",
    "rtmax",
    "npeaks",
];

/// Writes the table as tab separated values, one row per feature.
///
/// Missing values are written as empty fields.
pub fn write_quant_table(
    writer: impl Write,
    table: &QuantificationTable,
) -> Result<(), DataProcessingError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(table.samples().iter().map(|s| format!("{} Peak area", s.name)));
    wtr.write_record(&header)?;

    for row in table.rows() {
        let mut record: Vec<String> = vec![
            row.feature.to_string(),
            format!("{:.6}", row.mz),
            format!("{:.3}", row.rt),
            format!("{:.6}", row.mz_range.start()),
            format!("{:.6}", row.mz_range.end()),
            format!("{:.3}", row.rt_range.start()),
            format!("{:.3}", row.rt_range.end()),
            row.npeaks.to_string(),
        ];
        record.extend(
            row.values
                .iter()
                .map(|v| v.map(|x| format!("{:.2}", x)).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Feature,
        FeatureSet,
        SampleInfo,
        SampleValue,
    };
    use crate::utils::TupleRange;

    #[test]
    fn test_tsv_layout() {
        let feature = Feature {
            id: 0,
            mz: 200.0,
            mz_range: TupleRange::try_new(199.999, 200.001).unwrap(),
            rt: 105.0,
            rt_range: TupleRange::try_new(100.0, 110.0).unwrap(),
            npeaks: 1,
            samples_per_group: vec![1],
            values: vec![Some(SampleValue::Detected { peak: 0, area: 1234.5 }), None],
        };
        let features = FeatureSet::new(vec![feature], 2);
        let samples = vec![
            SampleInfo {
                id: 0,
                name: "s1".into(),
                group: "g".into(),
            },
            SampleInfo {
                id: 1,
                name: "s2".into(),
                group: "g".into(),
            },
        ];
        let table = QuantificationTable::from_features(&features, &samples).unwrap();
        let mut out = Vec::new();
        write_quant_table(&mut out, &table).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "row ID\trow m/z\trow retention time\tmzmin\tmzmax\trtmin\trtmax\tnpeaks\ts1 Peak area\ts2 Peak area"
        );
        assert_eq!(
            lines[1],
            "1\t200.000000\t105.000\t199.999000\t200.001000\t100.000\t110.000\t1\t1234.50\t"
        );
    }
}
