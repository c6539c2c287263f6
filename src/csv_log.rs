//! Optional append-only CSV archive log (C13). RFC 4180 quoting via the
//! `csv` crate resolves the embedded-comma Open Question: a malformed
//! callsign or squawk containing a comma, quote, or newline round-trips
//! correctly instead of corrupting the row.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::sbs::{FIELD_NAMES, SbsMessage};

pub struct CsvLog {
    writer: Mutex<csv::Writer<std::fs::File>>,
}

impl CsvLog {
    /// Open (creating if necessary) the archive file at `path`, writing the
    /// header row only if the file was empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let needs_header = !path.exists()
            || path
                .metadata()
                .map(|m| m.len() == 0)
                .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening CSV archive log at {}", path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(FIELD_NAMES)?;
            writer.flush()?;
        }

        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub async fn append(&self, msg: &SbsMessage) -> Result<()> {
        let row = msg.to_row();
        let mut writer = self.writer.lock().await;
        writer.write_record(&row)?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbs::parse_sbs_line;

    #[tokio::test]
    async fn writes_header_once_for_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.csv");

        let log = CsvLog::open(&path).unwrap();
        let msg = parse_sbs_line(
            "MSG,1,1,1,A12F52,1,,,,,SWA123,,,,,,,,,,,0",
        )
        .unwrap();
        log.append(&msg).await.unwrap();
        log.flush().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), FIELD_NAMES.join(","));
        assert!(lines.next().unwrap().contains("SWA123"));
    }

    #[tokio::test]
    async fn embedded_comma_in_a_field_is_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.csv");
        let log = CsvLog::open(&path).unwrap();

        let mut msg = parse_sbs_line("MSG,1,1,1,A12F52,1,,,,,,,,,,,,,,,,0").unwrap();
        msg.callsign = Some("SWA,123".to_string());
        log.append(&msg).await.unwrap();
        log.flush().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"SWA,123\""));
    }

    #[tokio::test]
    async fn reopening_existing_nonempty_file_does_not_duplicate_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.csv");

        {
            let log = CsvLog::open(&path).unwrap();
            let msg = parse_sbs_line("MSG,1,1,1,A12F52,1,,,,,,,,,,,,,,,,0").unwrap();
            log.append(&msg).await.unwrap();
            log.flush().await.unwrap();
        }

        {
            let log = CsvLog::open(&path).unwrap();
            let msg = parse_sbs_line("MSG,1,1,1,A12F52,1,,,,,,,,,,,,,,,,0").unwrap();
            log.append(&msg).await.unwrap();
            log.flush().await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let header_count = contents
            .lines()
            .filter(|l| *l == FIELD_NAMES.join(","))
            .count();
        assert_eq!(header_count, 1);
    }
}
