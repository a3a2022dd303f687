//! Build progress reporting.
//!
//! Reports observable progress during `treerag index` so users see how many
//! chunks have been embedded and when the tree is saved. Progress is emitted
//! on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use treerag_core::index::BuildEvent;

/// Reports build progress. Implementations write to stderr (human or JSON).
pub trait BuildProgressReporter: Send + Sync {
    /// Emit a progress event for `document`.
    fn report(&self, document: &str, event: &BuildEvent);
}

/// Human-friendly progress on stderr: "index notes  embedding  12 / 1,024 chunks".
pub struct StderrProgress;

impl BuildProgressReporter for StderrProgress {
    fn report(&self, document: &str, event: &BuildEvent) {
        let line = human_line(document, event);
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

fn human_line(document: &str, event: &BuildEvent) -> String {
    match event {
        BuildEvent::Embedded { index, total } => format!(
            "index {}  embedding  {} / {} chunks\n",
            document,
            format_number(*index as u64 + 1),
            format_number(*total as u64)
        ),
        BuildEvent::Saved { nodes, depth, .. } => format!(
            "index {}  saved  {} nodes, depth {}\n",
            document,
            format_number(*nodes as u64),
            depth
        ),
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BuildProgressReporter for JsonProgress {
    fn report(&self, document: &str, event: &BuildEvent) {
        if let Ok(line) = json_line(document, event) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn json_line(document: &str, event: &BuildEvent) -> serde_json::Result<String> {
    let mut obj = serde_json::to_value(event)?;
    if let Some(map) = obj.as_object_mut() {
        map.insert("document".to_string(), serde_json::json!(document));
    }
    serde_json::to_string(&obj)
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BuildProgressReporter for NoProgress {
    fn report(&self, _document: &str, _event: &BuildEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
