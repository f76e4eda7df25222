use clap::Parser;

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "buckscan")]
#[command(version = "0.1.0")]
#[command(about = "Probe S3 bucket names for existence and public or credentialed access", long_about = None)]
#[command(after_help = "Examples:\n  buckscan flaws.cloud\n  cat domains.txt | buckscan -q -w 20")]
pub struct Cli {
    /// Bucket name or URL. When omitted, names are read line by line from stdin
    pub bucket: Option<String>,

    /// Quiet mode: CSV lines (name,read,write,aws) plus a summary; same as -o csv
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Number of concurrent workers (clamped to 1..=100)
    #[arg(short, long, default_value = "10")]
    pub workers: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Endpoint suffix for virtual-hosted bucket URLs
    #[arg(long, default_value = "s3.amazonaws.com")]
    pub endpoint: String,

    /// Skip the anonymous write probe
    #[arg(long)]
    pub no_write_probe: bool,

    /// Keep the case of bucket names instead of lower-casing them
    #[arg(long)]
    pub keep_case: bool,

    /// Skip the credentialed listing
    #[arg(long)]
    pub no_aws: bool,

    /// AWS profile for the credentialed listing
    #[arg(long)]
    pub aws_profile: Option<String>,

    /// AWS region for the credentialed listing
    #[arg(long)]
    pub aws_region: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// `-q` wins over `-o`.
    pub fn format(&self) -> OutputFormat {
        if self.quiet {
            OutputFormat::Csv
        } else {
            self.output_format
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["buckscan", "flaws.cloud"]).unwrap();
        assert_eq!(cli.bucket.as_deref(), Some("flaws.cloud"));
        assert_eq!(cli.workers, 10);
        assert_eq!(cli.timeout, 10);
        assert_eq!(cli.format(), OutputFormat::Text);
        assert!(!cli.no_aws);
    }

    #[test]
    fn test_quiet_selects_csv() {
        let cli = Cli::try_parse_from(["buckscan", "-q", "-w", "20"]).unwrap();
        assert!(cli.bucket.is_none());
        assert_eq!(cli.workers, 20);
        assert_eq!(cli.format(), OutputFormat::Csv);

        let cli = Cli::try_parse_from(["buckscan", "-q", "-o", "json"]).unwrap();
        assert_eq!(cli.format(), OutputFormat::Csv);

        let cli = Cli::try_parse_from(["buckscan", "-o", "json", "x"]).unwrap();
        assert_eq!(cli.format(), OutputFormat::Json);
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["buckscan", "-o", "xml"]).is_err());
        assert!(Cli::try_parse_from(["buckscan", "-o", "j"]).is_err());
    }
}
