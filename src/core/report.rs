use crate::domain::model::AlignmentResult;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

pub const ALIGNMENT_JSON: &str = "alignment.json";
pub const MATCHED_CSV: &str = "matched.csv";
pub const UNMATCHED_CSV: &str = "unmatched.csv";

#[derive(Serialize)]
struct AlignmentReport<'a> {
    generated_at: DateTime<Utc>,
    process_count: usize,
    matched_total: usize,
    unmatched_total: usize,
    results: &'a [AlignmentResult],
}

#[derive(Serialize)]
struct MatchedRow<'a> {
    process_name: &'a str,
    uuid: &'a str,
    base_name: &'a str,
    geography: Option<&'a str>,
    flow_type: Option<&'a str>,
    cas: Option<&'a str>,
    version: Option<&'a str>,
}

#[derive(Serialize)]
struct UnmatchedRow<'a> {
    process_name: &'a str,
    base_name: &'a str,
    general_comment: Option<&'a str>,
}

/// 對齊結果打包為 zip：完整 JSON 與兩份 CSV 摘要
pub fn build_report(results: &[AlignmentResult]) -> Result<Vec<u8>> {
    let report = AlignmentReport {
        generated_at: Utc::now(),
        process_count: results.len(),
        matched_total: results.iter().map(AlignmentResult::matched_count).sum(),
        unmatched_total: results.iter().map(AlignmentResult::unmatched_count).sum(),
        results,
    };

    let entries = [
        (ALIGNMENT_JSON, serde_json::to_vec_pretty(&report)?),
        (MATCHED_CSV, matched_csv(results)?),
        (UNMATCHED_CSV, unmatched_csv(results)?),
    ];

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(name, SimpleFileOptions::default())?;
        zip.write_all(&content)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn matched_csv(results: &[AlignmentResult]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for result in results {
        for flow in &result.matched_flows {
            writer.serialize(MatchedRow {
                process_name: &result.process_name,
                uuid: &flow.uuid,
                base_name: &flow.base_name,
                geography: flow.geography.as_deref(),
                flow_type: flow.flow_type.as_deref(),
                cas: flow.cas.as_deref(),
                version: flow.version.as_deref(),
            })?;
        }
    }
    finish_csv(writer)
}

fn unmatched_csv(results: &[AlignmentResult]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for result in results {
        for flow in &result.unmatched_flows {
            writer.serialize(UnmatchedRow {
                process_name: flow.process_name.as_deref().unwrap_or(&result.process_name),
                base_name: &flow.base_name,
                general_comment: flow.general_comment.as_deref(),
            })?;
        }
    }
    finish_csv(writer)
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{FlowCandidate, UnmatchedFlow};
    use std::io::Read;

    fn sample() -> Vec<AlignmentResult> {
        let mut result = AlignmentResult::new("Biogas upgrading");
        let mut methane = FlowCandidate::new("m-1", "Methane, biogenic");
        methane.geography = Some("GLO".to_string());
        result.matched_flows.push(methane);
        result.unmatched_flows.push(UnmatchedFlow {
            base_name: "Digestate".to_string(),
            general_comment: Some("wet, 8% DM".to_string()),
            process_name: Some("Biogas upgrading".to_string()),
        });
        vec![result]
    }

    fn read_entry(archive: &mut zip::ZipArchive<std::io::Cursor<Vec<u8>>>, name: &str) -> String {
        let mut file = archive.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_report_contains_json_and_csv_files() {
        let bytes = build_report(&sample()).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();

        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec![ALIGNMENT_JSON, MATCHED_CSV, UNMATCHED_CSV]);

        let json: serde_json::Value = serde_json::from_str(&read_entry(&mut archive, ALIGNMENT_JSON)).unwrap();
        assert_eq!(json["matched_total"], 1);
        assert_eq!(json["unmatched_total"], 1);
        assert_eq!(json["results"][0]["process_name"], "Biogas upgrading");

        let matched = read_entry(&mut archive, MATCHED_CSV);
        let mut lines = matched.lines();
        assert_eq!(
            lines.next(),
            Some("process_name,uuid,base_name,geography,flow_type,cas,version")
        );
        assert_eq!(lines.next(), Some("Biogas upgrading,m-1,\"Methane, biogenic\",GLO,,,"));

        let unmatched = read_entry(&mut archive, UNMATCHED_CSV);
        assert!(unmatched.contains("Digestate,\"wet, 8% DM\""));
    }

    #[test]
    fn test_empty_results_still_produce_report() {
        let bytes = build_report(&[]).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        assert!(read_entry(&mut archive, MATCHED_CSV).is_empty());
    }
}
