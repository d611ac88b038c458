//! Tesseract OCR via subprocess.
//!
//! The binary is invoked per document with a hard wall-clock timeout; a
//! hung tesseract is killed and reported as `OcrTimeout` so the chain can
//! move on to the vision strategy.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::types::OcrEngine;
use super::ExtractionError;

const POLL_INTERVAL_MS: u64 = 50;

/// OCR engine shelling out to the `tesseract` binary.
pub struct TesseractOcr {
    languages: String,
    timeout_secs: u64,
}

impl TesseractOcr {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            languages: "spa+eng".to_string(),
            timeout_secs,
        }
    }

    pub fn with_languages(mut self, languages: &str) -> Self {
        self.languages = languages.to_string();
        self
    }
}

impl OcrEngine for TesseractOcr {
    fn ocr_document(&self, bytes: &[u8], extension: &str) -> Result<String, ExtractionError> {
        // Tesseract reads images, not PDFs; PDF pages would need rendering
        // first, which the vision strategy covers.
        if extension.eq_ignore_ascii_case("pdf") {
            return Err(ExtractionError::UnsupportedFormat(
                "tesseract cannot read PDF input".into(),
            ));
        }

        let mut child = Command::new("tesseract")
            .args(["stdin", "stdout", "-l", &self.languages])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExtractionError::OcrProcessing(format!("failed to spawn: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(bytes)?;
        }

        let deadline = Instant::now() + Duration::from_secs(self.timeout_secs);
        loop {
            match child.try_wait()? {
                Some(status) => {
                    let output = child.wait_with_output()?;
                    if !status.success() {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        return Err(ExtractionError::OcrProcessing(stderr.trim().to_string()));
                    }
                    return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
                }
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ExtractionError::OcrTimeout(self.timeout_secs));
                }
                None => std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS)),
            }
        }
    }
}
