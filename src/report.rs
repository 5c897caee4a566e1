//! Report generation: one timestamped directory per run holding the JSON
//! record set, a CSV table, per-record dossiers and a plain-text summary.

use crate::error::Result;
use crate::models::{ContactRecord, CrawlSummary};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const HIGH_CONFIDENCE: f64 = 0.8;
const MEDIUM_CONFIDENCE: f64 = 0.6;

/// Top-level shape of the JSON report file.
#[derive(Serialize)]
struct JsonReport<'a> {
    domain: &'a str,
    total: usize,
    profiles: &'a [ContactRecord],
}

/// Writes every artifact of a finished run into its own directory,
/// `<output_dir>/<base_domain>_<unix_ts>`.
pub(crate) struct ReportWriter {
    run_dir: PathBuf,
    domain: String,
}

impl ReportWriter {
    pub(crate) fn create(output_dir: &str, base_domain: &str) -> Result<Self> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let run_dir = Path::new(output_dir).join(format!("{}_{}", base_domain, timestamp));
        fs::create_dir_all(&run_dir)?;
        tracing::info!(target: "report", "Writing reports to {}", run_dir.display());
        Ok(Self {
            run_dir,
            domain: base_domain.to_string(),
        })
    }

    pub(crate) fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Writes all report artifacts for the run.
    pub(crate) fn write_all(
        &self,
        records: &[ContactRecord],
        summary: &CrawlSummary,
    ) -> Result<()> {
        self.write_json(records)?;
        self.write_csv(records)?;
        self.write_dossiers(records)?;
        self.write_summary(records, summary)?;
        Ok(())
    }

    fn write_json(&self, records: &[ContactRecord]) -> Result<()> {
        let report = JsonReport {
            domain: &self.domain,
            total: records.len(),
            profiles: records,
        };
        let path = self.run_dir.join("records.json");
        fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        Ok(())
    }

    fn write_csv(&self, records: &[ContactRecord]) -> Result<()> {
        let path = self.run_dir.join("records.csv");
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record([
            "Email",
            "Name",
            "Seniority",
            "Department",
            "Confidence",
            "Source URL",
            "Context Snippet",
        ])?;
        for record in records {
            let confidence = format!("{:.2}", record.confidence);
            writer.write_record([
                record.email.as_str(),
                record.name.as_str(),
                record.seniority.as_str(),
                record.department.as_str(),
                confidence.as_str(),
                record.source_url.as_str(),
                record.context_snippet.as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// One human-readable dossier file per record.
    fn write_dossiers(&self, records: &[ContactRecord]) -> Result<()> {
        for record in records {
            let path = self
                .run_dir
                .join(format!("dossier_{}.txt", sanitize_for_filename(&record.email)));
            let mut dossier = String::new();
            dossier.push_str(&format!("Email:       {}\n", record.email));
            dossier.push_str(&format!("Name:        {}\n", display_or_dash(&record.name)));
            dossier.push_str(&format!("Seniority:   {}\n", record.seniority));
            dossier.push_str(&format!("Department:  {}\n", record.department));
            dossier.push_str(&format!(
                "Confidence:  {:.2} ({})\n",
                record.confidence,
                confidence_band(record.confidence)
            ));
            dossier.push_str(&format!("Source:      {}\n", record.source_url));
            dossier.push_str(&format!("Context:     {}\n", record.context_snippet));
            fs::write(&path, dossier)?;
        }
        Ok(())
    }

    fn write_summary(&self, records: &[ContactRecord], summary: &CrawlSummary) -> Result<()> {
        let high = records
            .iter()
            .filter(|r| r.confidence >= HIGH_CONFIDENCE)
            .count();
        let medium = records
            .iter()
            .filter(|r| r.confidence >= MEDIUM_CONFIDENCE && r.confidence < HIGH_CONFIDENCE)
            .count();
        let low = records.len() - high - medium;

        let mut text = String::new();
        text.push_str(&format!("Target domain:       {}\n", self.domain));
        text.push_str(&format!("Pages fetched:       {}\n", summary.pages_fetched));
        text.push_str(&format!("Documents mined:     {}\n", summary.documents_seen));
        text.push_str(&format!("Unique records:      {}\n", records.len()));
        text.push_str(&format!("  high confidence:   {}\n", high));
        text.push_str(&format!("  medium confidence: {}\n", medium));
        text.push_str(&format!("  low confidence:    {}\n", low));

        fs::write(self.run_dir.join("summary.txt"), text)?;
        Ok(())
    }
}

/// Confidence band label used in dossiers and logs.
pub(crate) fn confidence_band(confidence: f64) -> &'static str {
    if confidence >= HIGH_CONFIDENCE {
        "high"
    } else if confidence >= MEDIUM_CONFIDENCE {
        "medium"
    } else {
        "low"
    }
}

fn sanitize_for_filename(email: &str) -> String {
    email
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            c
        } else {
            '_'
        })
        .collect()
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<ContactRecord> {
        vec![
            ContactRecord {
                email: "jane.smith@univ.edu".to_string(),
                name: "Jane Smith".to_string(),
                seniority: "senior".to_string(),
                department: "Computer Science".to_string(),
                confidence: 0.95,
                source_url: "https://univ.edu/staff".to_string(),
                context_snippet: "Professor Jane Smith".to_string(),
            },
            ContactRecord::from_document(
                "info@univ.edu".to_string(),
                "https://univ.edu/files/handbook.pdf".to_string(),
            ),
        ]
    }

    fn sample_summary() -> CrawlSummary {
        CrawlSummary {
            total_records: 2,
            pages_fetched: 12,
            documents_seen: 1,
        }
    }

    #[test]
    fn test_report_artifacts_written() {
        let out = tempfile::tempdir().unwrap();
        let writer =
            ReportWriter::create(out.path().to_str().unwrap(), "univ.edu").unwrap();
        writer
            .write_all(&sample_records(), &sample_summary())
            .unwrap();

        let dir = writer.run_dir();
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("univ.edu_"));
        assert!(dir.join("records.json").exists());
        assert!(dir.join("records.csv").exists());
        assert!(dir.join("summary.txt").exists());
        assert!(dir.join("dossier_jane.smith_univ.edu.txt").exists());
        assert!(dir.join("dossier_info_univ.edu.txt").exists());
    }

    #[test]
    fn test_json_report_shape() {
        let out = tempfile::tempdir().unwrap();
        let writer =
            ReportWriter::create(out.path().to_str().unwrap(), "univ.edu").unwrap();
        writer
            .write_all(&sample_records(), &sample_summary())
            .unwrap();

        let raw = fs::read_to_string(writer.run_dir().join("records.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["domain"], "univ.edu");
        assert_eq!(parsed["total"], 2);
        assert_eq!(parsed["profiles"][0]["email"], "jane.smith@univ.edu");
        assert_eq!(parsed["profiles"][1]["seniority"], "unknown");
    }

    #[test]
    fn test_csv_rows_match_records() {
        let out = tempfile::tempdir().unwrap();
        let writer =
            ReportWriter::create(out.path().to_str().unwrap(), "univ.edu").unwrap();
        writer
            .write_all(&sample_records(), &sample_summary())
            .unwrap();

        let raw = fs::read_to_string(writer.run_dir().join("records.csv")).unwrap();
        let mut lines = raw.lines();
        assert!(lines.next().unwrap().starts_with("Email,Name,Seniority"));
        let first = lines.next().unwrap();
        assert!(first.starts_with("jane.smith@univ.edu,Jane Smith,senior"));
        assert!(first.contains("0.95"));
    }

    #[test]
    fn test_summary_confidence_breakdown() {
        let out = tempfile::tempdir().unwrap();
        let writer =
            ReportWriter::create(out.path().to_str().unwrap(), "univ.edu").unwrap();
        writer
            .write_all(&sample_records(), &sample_summary())
            .unwrap();

        let text = fs::read_to_string(writer.run_dir().join("summary.txt")).unwrap();
        assert!(text.contains("Pages fetched:       12"));
        assert!(text.contains("high confidence:   1"));
        assert!(text.contains("low confidence:    1"));
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(confidence_band(0.95), "high");
        assert_eq!(confidence_band(0.8), "high");
        assert_eq!(confidence_band(0.6), "medium");
        assert_eq!(confidence_band(0.4), "low");
    }
}
