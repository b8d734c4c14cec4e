use calamine::{open_workbook, DataType, Reader, Xlsx};
use chrono::{Duration, NaiveDate};

use crate::dash::{io_common::simplify_file_name, *};

pub fn read_excel_table(path: &str, worksheet: Option<&str>) -> DashResult<RawTable> {
    let wrange = get_range(path, worksheet)?;

    let mut iter = wrange.rows();
    let header_cells = iter.next().context(MissingHeaderSnafu { path })?;
    let header: Vec<String> = header_cells
        .iter()
        .map(|c| cell_text(c).unwrap_or_default())
        .collect();
    debug!("read_excel_table: header: {:?}", header);

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for (idx, row) in iter.enumerate() {
        debug!("read_excel_table: idx: {:?} row: {:?}", idx, row);
        rows.push(row.iter().map(cell_text).collect());
    }
    info!(
        "read_excel_table: read {:?} rows from {:?}",
        rows.len(),
        simplify_file_name(path)
    );
    Ok(RawTable { header, rows })
}

/// Renders a cell as text. Empty and error cells are missing values.
///
/// Date cells are rendered as `YYYY-MM-DD`, or `YYYY-MM-DD HH:MM:SS` when they
/// carry a time of day.
pub fn cell_text(cell: &DataType) -> Option<String> {
    match cell {
        DataType::String(s) if s.is_empty() => None,
        DataType::String(s) => Some(s.clone()),
        DataType::Int(i) => Some(i.to_string()),
        // Integral numbers are shown without decimals, as in the spreadsheet.
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
            Some(format!("{}", *f as i64))
        }
        DataType::Float(f) => Some(f.to_string()),
        DataType::Bool(b) => Some(b.to_string()),
        DataType::DateTime(f) => Some(excel_date_text(*f).unwrap_or_else(|| f.to_string())),
        DataType::Error(e) => {
            warn!("cell_text: error cell {:?} treated as empty", e);
            None
        }
        DataType::Empty => None,
        #[allow(unreachable_patterns)]
        other => Some(format!("{:?}", other)),
    }
}

// Excel serial dates count days from 1899-12-30.
fn excel_date_text(serial: f64) -> Option<String> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let secs = (serial * 86_400.0).round() as i64;
    let dt = base.checked_add_signed(Duration::seconds(secs))?;
    if secs % 86_400 == 0 {
        Some(dt.format("%Y-%m-%d").to_string())
    } else {
        Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

fn get_range(path: &str, worksheet: Option<&str>) -> DashResult<calamine::Range<DataType>> {
    debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet {
        let wrange = workbook
            .worksheet_range(worksheet_name)
            .context(MissingWorksheetSnafu {
                worksheet: worksheet_name,
                path,
            })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let names = workbook.sheet_names().to_owned();
        if names.len() > 1 {
            info!(
                "get_range: {:?} has {} worksheets, using the first one ({:?})",
                path,
                names.len(),
                names.first()
            );
        }
        let wrange = workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_cells() {
        assert_eq!(cell_text(&DataType::String("CBC".to_string())), Some("CBC".to_string()));
        assert_eq!(cell_text(&DataType::String("".to_string())), None);
        assert_eq!(cell_text(&DataType::Empty), None);
        assert_eq!(cell_text(&DataType::Int(42)), Some("42".to_string()));
        assert_eq!(cell_text(&DataType::Float(1234.0)), Some("1234".to_string()));
        assert_eq!(cell_text(&DataType::Float(2.5)), Some("2.5".to_string()));
        assert_eq!(cell_text(&DataType::Bool(true)), Some("true".to_string()));
    }

    #[test]
    fn renders_dates() {
        assert_eq!(cell_text(&DataType::DateTime(44927.0)), Some("2023-01-01".to_string()));
        assert_eq!(
            cell_text(&DataType::DateTime(44927.5)),
            Some("2023-01-01 12:00:00".to_string())
        );
    }

    // Two worksheets: a notes sheet first, then the records.
    fn write_workbook(dir: &std::path::Path) -> String {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let notes = workbook.add_worksheet();
        notes.set_name("Notes").unwrap();
        notes.write_string(0, 0, "Volumes for March").unwrap();

        let samples = workbook.add_worksheet();
        samples.set_name("Samples").unwrap();
        for (col, h) in ["Franchisee", "Sub Client", "test name", "Lab Partner"]
            .iter()
            .enumerate()
        {
            samples.write_string(0, col as u16, *h).unwrap();
        }
        samples.write_string(1, 0, "Acme").unwrap();
        samples.write_string(1, 1, "Acme").unwrap();
        samples.write_string(1, 2, "CBC").unwrap();
        samples.write_string(1, 3, "LabX").unwrap();
        samples.write_string(2, 0, "Beta").unwrap();
        samples.write_number(2, 2, 1234.0).unwrap();

        let path = dir.join("volumes.xlsx");
        workbook.save(&path).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn reads_named_worksheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(dir.path());
        let t = read_excel_table(&path, Some("Samples")).unwrap();
        assert_eq!(
            t.header,
            vec!["Franchisee", "Sub Client", "test name", "Lab Partner"]
        );
        assert_eq!(
            t.rows,
            vec![
                vec![
                    Some("Acme".to_string()),
                    Some("Acme".to_string()),
                    Some("CBC".to_string()),
                    Some("LabX".to_string())
                ],
                vec![Some("Beta".to_string()), None, Some("1234".to_string()), None],
            ]
        );
        let ds = load(&t, &ColumnNames::default()).unwrap();
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn first_worksheet_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(dir.path());
        let t = read_excel_table(&path, None).unwrap();
        assert_eq!(t.header, vec!["Volumes for March"]);
        assert!(t.rows.is_empty());
    }

    #[test]
    fn unknown_worksheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(dir.path());
        match read_excel_table(&path, Some("April")) {
            Err(DashError::MissingWorksheet { worksheet, .. }) => assert_eq!(worksheet, "April"),
            x => panic!("unexpected result {:?}", x.map(|_| ())),
        }
    }

    #[test]
    fn missing_workbook() {
        assert!(matches!(
            read_excel_table("/nonexistent/volumes.xlsx", None),
            Err(DashError::OpeningExcel { .. })
        ));
    }
}
