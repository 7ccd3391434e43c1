//! Optical text recognition backends.
//!
//! Recognition is delegated to an external `tesseract` binary when one is
//! installed; otherwise a null backend keeps the callers' control flow
//! uniform. Recognition failures always degrade to "absent", never to an
//! error.

use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace, warn};

/// A word located by the recognizer, with its bounding box in the image
/// the recognition ran over.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedWord {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl RecognizedWord {
    pub fn center(&self) -> (i32, i32) {
        (self.left + self.width / 2, self.top + self.height / 2)
    }
}

/// A text-recognition backend. All methods return `None` when the backend
/// is missing or recognition fails.
pub trait OcrBackend: Send + Sync {
    /// All visible text lines in the image, trimmed, empties dropped.
    fn recognize_lines(&self, image: &RgbaImage) -> Option<Vec<String>>;

    /// Word-level recognition with bounding boxes.
    fn recognize_words(&self, image: &RgbaImage) -> Option<Vec<RecognizedWord>>;

    /// Single-fragment recognition for a small, pre-cropped window.
    fn recognize_fragment(&self, image: &RgbaImage) -> Option<String>;

    fn is_available(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Backend that shells out to the `tesseract` CLI.
pub struct TesseractCli {
    binary: PathBuf,
}

impl TesseractCli {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn save_temp(&self, image: &RgbaImage) -> Option<PathBuf> {
        let path = std::env::temp_dir().join(format!(
            "uireplay_ocr_{}_{}.png",
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        ));
        if let Err(e) = image.save(&path) {
            warn!("Failed to save OCR temp image: {}", e);
            return None;
        }
        Some(path)
    }

    fn run(&self, input: &Path, extra_args: &[&str]) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg(input)
            .arg("stdout")
            .args(extra_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        match output {
            Ok(out) if out.status.success() => {
                Some(String::from_utf8_lossy(&out.stdout).into_owned())
            }
            Ok(out) => {
                debug!(
                    "tesseract exited with {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                None
            }
            Err(e) => {
                debug!("Failed to spawn tesseract: {}", e);
                None
            }
        }
    }

    fn with_temp<T>(&self, image: &RgbaImage, f: impl FnOnce(&Path) -> Option<T>) -> Option<T> {
        let path = self.save_temp(image)?;
        let result = f(&path);
        let _ = std::fs::remove_file(&path);
        result
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for TesseractCli {
    fn recognize_lines(&self, image: &RgbaImage) -> Option<Vec<String>> {
        self.with_temp(image, |path| {
            let text = self.run(path, &[])?;
            let lines: Vec<String> = text
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            trace!("Recognized {} text lines", lines.len());
            Some(lines)
        })
    }

    fn recognize_words(&self, image: &RgbaImage) -> Option<Vec<RecognizedWord>> {
        self.with_temp(image, |path| {
            let tsv = self.run(path, &["tsv"])?;
            Some(parse_tsv_words(&tsv))
        })
    }

    fn recognize_fragment(&self, image: &RgbaImage) -> Option<String> {
        self.with_temp(image, |path| {
            // PSM 8: treat the crop as a single word/fragment.
            let text = self.run(path, &["--psm", "8"])?;
            let trimmed = text.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        })
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

/// Parse tesseract TSV output into word boxes. Word rows carry level 5;
/// everything else (pages, blocks, lines) is skipped.
fn parse_tsv_words(tsv: &str) -> Vec<RecognizedWord> {
    let mut words = Vec::new();
    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            cols[6].parse::<i32>(),
            cols[7].parse::<i32>(),
            cols[8].parse::<i32>(),
            cols[9].parse::<i32>(),
        ) else {
            continue;
        };
        words.push(RecognizedWord {
            text: text.to_string(),
            left,
            top,
            width,
            height,
        });
    }
    words
}

/// Null-object backend: recognition is never possible.
pub struct NullOcr;

impl OcrBackend for NullOcr {
    fn recognize_lines(&self, _image: &RgbaImage) -> Option<Vec<String>> {
        None
    }

    fn recognize_words(&self, _image: &RgbaImage) -> Option<Vec<RecognizedWord>> {
        None
    }

    fn recognize_fragment(&self, _image: &RgbaImage) -> Option<String> {
        None
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Pick the best available backend at startup.
pub fn detect_backend() -> Box<dyn OcrBackend> {
    let tesseract = TesseractCli::new();
    if tesseract.is_available() {
        debug!("Text recognition backend: tesseract");
        Box::new(tesseract)
    } else {
        debug!("No text recognition backend found; OCR strategies disabled");
        Box::new(NullOcr)
    }
}
