// Primitives for reading CSV files.

use crate::dash::{io_common::non_empty, *};

pub fn read_csv_table(path: &str) -> DashResult<RawTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let header_line = records
        .next()
        .context(MissingHeaderSnafu { path })?
        .context(CsvLineParseSnafu { lineno: 1usize })?;
    let header: Vec<String> = header_line
        .iter()
        .enumerate()
        // Spreadsheet exports often start with a byte order mark.
        .map(|(idx, s)| {
            if idx == 0 {
                s.trim_start_matches('\u{feff}').to_string()
            } else {
                s.to_string()
            }
        })
        .collect();
    debug!("read_csv_table: header: {:?}", header);

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        debug!("read_csv_table: lineno: {:?} row: {:?}", lineno, line);
        rows.push(line.iter().map(non_empty).collect());
    }
    info!("read_csv_table: read {:?} rows from {:?}", rows.len(), path);
    Ok(RawTable { header, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn reads_header_and_rows() {
        let f = write_tmp(
            "\u{feff}Franchisee,Sub Client,test name,Lab Partner\nAcme,,CBC,LabX\n\"Beta, Inc\",Beta,CMP\n",
        );
        let t = read_csv_table(f.path().to_str().unwrap()).unwrap();
        assert_eq!(
            t.header,
            vec!["Franchisee", "Sub Client", "test name", "Lab Partner"]
        );
        assert_eq!(
            t.rows,
            vec![
                vec![
                    Some("Acme".to_string()),
                    None,
                    Some("CBC".to_string()),
                    Some("LabX".to_string())
                ],
                vec![
                    Some("Beta, Inc".to_string()),
                    Some("Beta".to_string()),
                    Some("CMP".to_string())
                ],
            ]
        );
    }

    #[test]
    fn empty_file_has_no_header() {
        let f = write_tmp("");
        assert!(matches!(
            read_csv_table(f.path().to_str().unwrap()),
            Err(DashError::MissingHeader { .. })
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            read_csv_table("/nonexistent/volumes.csv"),
            Err(DashError::CsvOpen { .. })
        ));
    }
}
