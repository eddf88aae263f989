use clap::Parser;
use std::path::PathBuf;

use crate::record_writer::output_path_for_input;

#[derive(Parser, Debug)]
#[command(name = "proptax")]
#[command(about = "Retrieve property tax amounts and statement PDFs for a list of accounts")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/proptax.toml
    #[arg(long)]
    pub init: bool,

    /// Input CSV: account number in column 1, address in column 3 (no header)
    #[arg(short, long, value_name = "CSV", required_unless_present = "init")]
    pub input: Option<PathBuf>,

    /// Directory where statement PDFs are saved (created if missing)
    #[arg(short, long, value_name = "DIR", required_unless_present = "init")]
    pub pdf_dir: Option<PathBuf>,

    /// Results CSV, appended to (defaults to the input name with a _taxes suffix)
    #[arg(short, long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Chrome/Chromium binary (overrides config and CHROME_PATH)
    #[arg(long, value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Run the browser headless (overrides config)
    #[arg(long, conflicts_with = "no_headless")]
    pub headless: bool,

    /// Show the browser window (overrides config)
    #[arg(long, conflicts_with = "headless")]
    pub no_headless: bool,

    /// Tax year used in statement filenames (defaults to last year)
    #[arg(long, value_name = "YEAR")]
    pub tax_year: Option<i32>,

    /// Export execution logs to a file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<String>,

    /// Write a JSON summary of the run to this file
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,

    /// Verbose logging (use -v for per-record progress, -vv for debug output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Headless override from the command line, if any
    pub fn headless_override(&self) -> Option<bool> {
        if self.headless {
            Some(true)
        } else if self.no_headless {
            Some(false)
        } else {
            None
        }
    }

    /// Results file: explicit `--output`, else derived from `--input`
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output
            .clone()
            .or_else(|| self.input.as_deref().map(output_path_for_input))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.init {
            return Ok(());
        }

        match &self.input {
            Some(path) if !path.is_file() => {
                return Err(format!("Input file not found: {}", path.display()))
            }
            None => return Err("--input is required".to_string()),
            _ => {}
        }

        if self.pdf_dir.is_none() {
            return Err("--pdf-dir is required".to_string());
        }

        if let (Some(input), Some(output)) = (&self.input, &self.output) {
            if input == output {
                return Err("--output must differ from --input".to_string());
            }
        }

        if let Some(year) = self.tax_year {
            if !(1900..=9999).contains(&year) {
                return Err(format!("Tax year out of range: {}", year));
            }
        }

        Ok(())
    }
}
