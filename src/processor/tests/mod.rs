//! Integration tests for the processor module
//!
//! Runs the complete merge pipeline over temporary directories of
//! agency spreadsheets.


use crate::config::{AgencyLabelMap, PipelineConfig};
use crate::models::CellValue;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Create `semi_processed/` and `output/` under the temp dir and write the given files
pub(crate) fn create_source_dir(temp_dir: &TempDir, files: &[(&str, &str)]) -> PathBuf {
    let source_path = temp_dir.path().join("semi_processed");
    fs::create_dir_all(&source_path).unwrap();
    for (name, content) in files {
        fs::write(source_path.join(name), content).unwrap();
    }
    source_path
}

/// Configuration pointing at the temp source and output directories
pub(crate) fn test_config(temp_dir: &TempDir, labels: &[(&str, &str)]) -> PipelineConfig {
    let labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(file, agency)| (file.to_string(), agency.to_string()))
        .collect();

    PipelineConfig::default()
        .with_source_directory(temp_dir.path().join("semi_processed"))
        .with_output_directory(temp_dir.path().join("output"))
        .with_agency_labels(AgencyLabelMap::new(labels))
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Stops" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn sheet_xml(rows: &[Vec<CellValue>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row_idx, row) in rows.iter().enumerate() {
        let row_number = row_idx + 1;
        xml.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (col_idx, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", (b'A' + col_idx as u8) as char, row_number);
            let cell_xml = match cell {
                CellValue::Missing => continue,
                CellValue::Bool(b) => {
                    format!(r#"<c r="{}" t="b"><v>{}</v></c>"#, reference, u8::from(*b))
                }
                CellValue::Int(v) => format!(r#"<c r="{}"><v>{}</v></c>"#, reference, v),
                CellValue::Float(v) => format!(r#"<c r="{}"><v>{}</v></c>"#, reference, v),
                CellValue::Text(s) => format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    reference,
                    escape_xml(s)
                ),
            };
            xml.push_str(&cell_xml);
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Write a single-sheet xlsx workbook; the first row is the header
///
/// Numbers are stored the way spreadsheet applications store them, so
/// `CellValue::Int(123)` reads back as the float `123.0`.
pub(crate) fn write_workbook(path: &Path, rows: &[Vec<CellValue>]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    let sheet = sheet_xml(rows);
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

pub(crate) fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}
