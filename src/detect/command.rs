//! Face detection by an external program.
//!
//! The program receives the saved image path as its last argument and must
//! print either a bare face count, a JSON array with one element per face, or
//! one line per face (the format of `face_recognition`'s `face_detection`
//! CLI: `path,top,right,bottom,left`).

use super::{FaceDetector, StoredImage};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl FaceDetector for CommandDetector {
    fn name(&self) -> &str {
        &self.program
    }

    async fn count_faces(&self, image: &StoredImage) -> Result<usize> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&image.path)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run face detector '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Face detector '{}' failed ({}): {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }

        parse_detector_output(&String::from_utf8_lossy(&output.stdout))
    }
}

pub fn parse_detector_output(stdout: &str) -> Result<usize> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if let Ok(count) = trimmed.parse::<usize>() {
        return Ok(count);
    }
    if trimmed.starts_with('[') {
        let faces: Vec<serde_json::Value> = serde_json::from_str(trimmed)
            .context("Face detector printed malformed JSON")?;
        return Ok(faces.len());
    }
    Ok(trimmed.lines().filter(|l| !l.trim().is_empty()).count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dummy_image() -> StoredImage {
        StoredImage {
            path: PathBuf::from("/tmp/does-not-matter.png"),
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn parses_bare_count() {
        assert_eq!(parse_detector_output("2\n").unwrap(), 2);
        assert_eq!(parse_detector_output("0").unwrap(), 0);
    }

    #[test]
    fn empty_output_means_no_faces() {
        assert_eq!(parse_detector_output("").unwrap(), 0);
        assert_eq!(parse_detector_output("  \n").unwrap(), 0);
    }

    #[test]
    fn counts_face_detection_cli_lines() {
        let out = "/up/a.png,10,80,70,20\n/up/a.png,110,180,170,120\n";
        assert_eq!(parse_detector_output(out).unwrap(), 2);
    }

    #[test]
    fn counts_json_array_entries() {
        assert_eq!(
            parse_detector_output("[[10, 80, 70, 20], [1, 2, 3, 4], [5, 6, 7, 8]]").unwrap(),
            3
        );
        assert!(parse_detector_output("[not json").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_program_with_image_path() {
        // $0 is "detector", $1 is the image path appended by the detector.
        let detector = CommandDetector::new(
            "sh",
            vec![
                "-c".into(),
                "case \"$1\" in *.png) echo 1;; *) echo 0;; esac".into(),
                "detector".into(),
            ],
        );
        assert_eq!(detector.count_faces(&dummy_image()).await.unwrap(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_surfaces_stderr() {
        let detector = CommandDetector::new(
            "sh",
            vec!["-c".into(), "echo 'unsupported image' >&2; exit 3".into()],
        );
        let err = detector.count_faces(&dummy_image()).await.unwrap_err();
        assert!(err.to_string().contains("unsupported image"));
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let detector = CommandDetector::new("bioface-no-such-detector-binary", Vec::new());
        let err = detector.count_faces(&dummy_image()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to run face detector"));
    }
}
