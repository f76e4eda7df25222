//! Output formatting for scan results

use anyhow::Result;
use clap::ValueEnum;
use std::io::Write;
use buckscan_common::{ProbeVerdict, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable blocks
    Text,
    /// name,read,write,aws for accessible buckets
    Csv,
    /// One JSON object per verdict
    Json,
}

/// Writes each verdict as soon as it arrives, then the summary.
pub struct ResultSink<W: Write> {
    format: OutputFormat,
    out: W,
}

impl<W: Write> ResultSink<W> {
    pub fn new(format: OutputFormat, out: W) -> Self {
        Self { format, out }
    }

    pub fn write_verdict(&mut self, verdict: &ProbeVerdict) -> Result<()> {
        match self.format {
            OutputFormat::Text => write!(self.out, "{}", text_block(verdict))?,
            OutputFormat::Csv => {
                if let Some(line) = csv_line(verdict) {
                    writeln!(self.out, "{}", line)?;
                }
            }
            OutputFormat::Json => writeln!(self.out, "{}", serde_json::to_string(verdict)?)?,
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn write_summary(&mut self, stats: &StatsSnapshot) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "\n{}", summary_line(stats))?,
            OutputFormat::Csv => writeln!(self.out, "{}", summary_line(stats))?,
            OutputFormat::Json => writeln!(
                self.out,
                "{}",
                serde_json::json!({ "summary": stats })
            )?,
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// `name,read,write,aws` for buckets with at least one open access path.
fn csv_line(verdict: &ProbeVerdict) -> Option<String> {
    verdict.is_accessible().then(|| {
        format!(
            "{},{},{},{}",
            verdict.name(),
            verdict.public_read(),
            verdict.public_write(),
            verdict.credential_read()
        )
    })
}

fn summary_line(s: &StatsSnapshot) -> String {
    format!(
        "# Summary: {} tested, {} found ({} readable, {} writable, {} aws), {} not found",
        s.total, s.found, s.with_public_read, s.with_public_write, s.with_credential_read, s.not_found
    )
}

fn text_block(verdict: &ProbeVerdict) -> String {
    let mut out = format!("\n[+] Checking s3://{}\n", verdict.name());
    if !verdict.exists() {
        out.push_str("[-] Bucket does not exist\n");
        return out;
    }

    out.push_str(&format!("[+] Public Read:  {}\n", verdict.public_read()));
    out.push_str(&format!("[+] Public Write: {}\n", verdict.public_write()));
    out.push_str(&format!("[+] AWS Read:     {}\n", verdict.credential_read()));

    if !verdict.manifest().is_empty() {
        let via = if verdict.credential_read() { "AWS" } else { "HTTP" };
        out.push_str(&format!("\nFiles (via {}):\n", via));
        for entry in verdict.manifest() {
            let ts = entry
                .last_modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!("{}\t{} bytes\t{}\n", ts, entry.size, entry.name));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use buckscan_common::{BucketName, ManifestEntry};
    use chrono::{TimeZone, Utc};

    fn name(s: &str) -> BucketName {
        BucketName::new(s).unwrap()
    }

    fn render(format: OutputFormat, verdicts: &[ProbeVerdict], stats: StatsSnapshot) -> String {
        let mut sink = ResultSink::new(format, Vec::new());
        for v in verdicts {
            sink.write_verdict(v).unwrap();
        }
        sink.write_summary(&stats).unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_csv_only_accessible_buckets() {
        let verdicts = vec![
            ProbeVerdict::found(name("flaws.cloud"))
                .with_public_read(true)
                .with_credential_read(true),
            ProbeVerdict::found(name("locked")),
            ProbeVerdict::not_found(name("missing")),
        ];
        let stats = StatsSnapshot {
            total: 3,
            found: 2,
            not_found: 1,
            with_public_read: 1,
            with_public_write: 0,
            with_credential_read: 1,
        };

        let out = render(OutputFormat::Csv, &verdicts, stats);
        assert_eq!(
            out,
            "flaws.cloud,true,false,true\n\
             # Summary: 3 tested, 2 found (1 readable, 0 writable, 1 aws), 1 not found\n"
        );
    }

    #[test]
    fn test_summary_for_missing_bucket() {
        let stats = StatsSnapshot {
            total: 1,
            not_found: 1,
            ..Default::default()
        };
        assert_eq!(
            summary_line(&stats),
            "# Summary: 1 tested, 0 found (0 readable, 0 writable, 0 aws), 1 not found"
        );
    }

    #[test]
    fn test_text_block_lists_manifest() {
        let ts = Utc.with_ymd_and_hms(2017, 3, 14, 3, 0, 38).unwrap();
        let v = ProbeVerdict::found(name("flaws.cloud"))
            .with_credential_read(true)
            .with_manifest(vec![ManifestEntry::new("hint1.html", 2575).with_last_modified(ts)]);

        let block = text_block(&v);
        assert!(block.contains("[+] Checking s3://flaws.cloud"));
        assert!(block.contains("[+] AWS Read:     true"));
        assert!(block.contains("Files (via AWS):"));
        assert!(block.contains("2017-03-14 03:00:38\t2575 bytes\thint1.html"));
    }

    #[test]
    fn test_text_block_missing_bucket() {
        let block = text_block(&ProbeVerdict::not_found(name("gone")));
        assert!(block.contains("[-] Bucket does not exist"));
        assert!(!block.contains("Public Read"));
    }

    #[test]
    fn test_json_lines() {
        let verdicts = vec![ProbeVerdict::found(name("open")).with_public_write(true)];
        let stats = StatsSnapshot {
            total: 1,
            found: 1,
            with_public_write: 1,
            ..Default::default()
        };
        let out = render(OutputFormat::Json, &verdicts, stats);
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["name"], "open");
        assert_eq!(lines[0]["public_write"], true);
        assert_eq!(lines[1]["summary"]["with_public_write"], 1);
    }
}
