use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use credcheck_core::{CandidateSnapshot, LocalFile, Origin};
use credcheck_processing::{content_type_for_filename, export, report_file_name, to_report};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// http(s) arguments are remote URLs; anything else is read as a local file.
/// Files over `max_bytes` are not loaded, only their size is kept so that
/// validation rejects them as too large.
pub fn parse_input(arg: &str, max_bytes: u64) -> anyhow::Result<Origin> {
    let lowered = arg.to_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return Ok(Origin::RemoteUrl(arg.to_string()));
    }

    let path = Path::new(arg);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| arg.to_string());
    let content_type = content_type_for_filename(&name).unwrap_or(FALLBACK_CONTENT_TYPE);

    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read {}", arg))?
        .len();
    if size > max_bytes {
        return Ok(Origin::LocalFile(LocalFile::unread(name, content_type, size)));
    }

    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", arg))?;
    Ok(Origin::LocalFile(LocalFile::new(
        name,
        content_type,
        Bytes::from(data),
    )))
}

/// A command-line input that could not be read.
#[derive(Debug, Clone)]
pub struct UnreadableInput {
    pub input: String,
    pub error: String,
}

/// Parse every argument in order. An unreadable path is set aside and the
/// rest are still returned.
pub fn parse_inputs(args: &[String], max_bytes: u64) -> (Vec<Origin>, Vec<UnreadableInput>) {
    let mut origins = Vec::with_capacity(args.len());
    let mut unreadable = Vec::new();
    for arg in args {
        match parse_input(arg, max_bytes) {
            Ok(origin) => origins.push(origin),
            Err(e) => unreadable.push(UnreadableInput {
                input: arg.clone(),
                error: format!("{:#}", e),
            }),
        }
    }
    (origins, unreadable)
}

/// One line per candidate: name, state, confidence, detail.
pub fn format_table(snapshots: &[CandidateSnapshot]) -> String {
    let mut out = format!(
        "{:<32} {:<14} {:>10}  {}\n",
        "FILE", "STATE", "CONFIDENCE", "DETAILS"
    );
    for snapshot in snapshots {
        let confidence = snapshot
            .outcome
            .as_ref()
            .and_then(|o| o.confidence)
            .map(|c| format!("{:.0}%", c))
            .unwrap_or_else(|| "-".to_string());
        let details = match (&snapshot.outcome, &snapshot.failure) {
            (Some(outcome), _) => outcome.details.as_str(),
            (None, Some(failure)) => failure.message.as_str(),
            (None, None) => "",
        };
        out.push_str(&format!(
            "{:<32} {:<14} {:>10}  {}\n",
            truncate_string(&snapshot.display_name, 32),
            snapshot.state.as_str(),
            confidence,
            truncate_string(details, 60)
        ));
    }
    out
}

/// Write one report file per finished candidate into `dir`.
pub fn write_reports(dir: &Path, snapshots: &[CandidateSnapshot]) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for snapshot in snapshots {
        let Ok(report) = to_report(snapshot) else {
            continue;
        };
        let path = dir.join(report_file_name(&report));
        let bytes = export(&report).context("Encode report")?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use credcheck_core::{CandidateId, CandidateState, ErrorKind, FailureRecord};

    fn failed_snapshot(name: &str) -> CandidateSnapshot {
        CandidateSnapshot {
            id: CandidateId::new(),
            display_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            byte_size: Some(10),
            url: None,
            state: CandidateState::UploadFailed,
            progress: Some(40),
            asset_ref: None,
            outcome: None,
            failure: Some(FailureRecord::new(
                ErrorKind::TransportFailure,
                "Network error during upload: reset",
            )),
            preview_url: None,
        }
    }

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_multibyte() {
        assert_eq!(truncate_string("diplôme-é.png", 8), "diplô...");
    }

    const MAX: u64 = 10 * 1024 * 1024;

    #[test]
    fn parse_input_url() {
        let origin = parse_input("https://example.com/cert.pdf", MAX).unwrap();
        assert!(matches!(origin, Origin::RemoteUrl(url) if url == "https://example.com/cert.pdf"));
    }

    #[test]
    fn parse_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Diploma.PNG");
        std::fs::write(&path, b"png-bytes").unwrap();

        match parse_input(path.to_str().unwrap(), MAX).unwrap() {
            Origin::LocalFile(file) => {
                assert_eq!(file.name, "Diploma.PNG");
                assert_eq!(file.content_type, "image/png");
                assert_eq!(file.size, 9);
                assert_eq!(file.data.len(), 9);
            }
            other => panic!("expected local file, got {:?}", other),
        }
    }

    #[test]
    fn parse_input_oversized_file_is_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        match parse_input(path.to_str().unwrap(), 16).unwrap() {
            Origin::LocalFile(file) => {
                assert_eq!(file.size, 64);
                assert!(file.data.is_empty());
                assert_eq!(file.content_type, "application/pdf");
            }
            other => panic!("expected local file, got {:?}", other),
        }
    }

    #[test]
    fn parse_input_unknown_extension_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.xyz");
        std::fs::write(&path, b"x").unwrap();
        match parse_input(path.to_str().unwrap(), MAX).unwrap() {
            Origin::LocalFile(file) => assert_eq!(file.content_type, FALLBACK_CONTENT_TYPE),
            other => panic!("expected local file, got {:?}", other),
        }

        assert!(parse_input(dir.path().join("missing.pdf").to_str().unwrap(), MAX).is_err());
    }

    #[test]
    fn parse_inputs_keeps_going_past_a_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("transcript.pdf");
        std::fs::write(&present, b"%PDF").unwrap();
        let missing = dir.path().join("does-not-exist.pdf");

        let args = vec![
            "https://example.com/a.pdf".to_string(),
            missing.to_str().unwrap().to_string(),
            present.to_str().unwrap().to_string(),
        ];
        let (origins, unreadable) = parse_inputs(&args, MAX);

        assert_eq!(origins.len(), 2);
        assert!(matches!(&origins[0], Origin::RemoteUrl(url) if url == "https://example.com/a.pdf"));
        assert!(matches!(&origins[1], Origin::LocalFile(file) if file.name == "transcript.pdf"));
        assert_eq!(unreadable.len(), 1);
        assert_eq!(unreadable[0].input, args[1]);
        assert!(unreadable[0].error.contains("Failed to read"));
    }

    #[test]
    fn write_reports_one_file_per_finished_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let mut unfinished = failed_snapshot("pending.png");
        unfinished.state = CandidateState::Uploading;
        unfinished.failure = None;

        let written =
            write_reports(dir.path(), &[failed_snapshot("a.png"), unfinished]).unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("verification-report-a.png.json"));
        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&written[0]).unwrap()).unwrap();
        assert_eq!(json["status"], "upload_failed");
    }

    #[test]
    fn format_table_lists_every_candidate() {
        let table = format_table(&[failed_snapshot("a.png"), failed_snapshot("b.png")]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("upload_failed"));
        assert!(lines[1].contains("Network error"));
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
