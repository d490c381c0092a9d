use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Success => "success",
            Outcome::Skipped => "skipped",
            Outcome::Failed  => "failed",
        })
    }
}

/// Outcome for one directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub source_name:   String,
    pub outcome:       Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason:        Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id:     Option<u64>,
    pub type_tag:      u32,
    /// Path relative to the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output:        Option<PathBuf>,
    #[serde(default)]
    pub bytes_written: u64,
    /// BLAKE3 of the written file, hex encoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash:  Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width:         Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height:        Option<u32>,
}

impl ManifestEntry {
    pub fn new(source_name: impl Into<String>, type_tag: u32, outcome: Outcome) -> Self {
        Self {
            source_name: source_name.into(),
            outcome,
            reason: None,
            object_id: None,
            type_tag,
            output: None,
            bytes_written: 0,
            content_hash: None,
            width: None,
            height: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_object(mut self, id: u64) -> Self {
        self.object_id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub success: usize,
    pub skipped: usize,
    pub failed:  usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} extracted, {} skipped, {} failed", self.success, self.skipped, self.failed)
    }
}

/// Per-run record of what happened to every entry, in directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub bundle:         String,
    pub format_version: u32,
    pub generated_at:   String,
    pub cancelled:      bool,
    pub entries:        Vec<ManifestEntry>,
}

impl Manifest {
    pub fn summary(&self) -> Summary {
        self.entries.iter().fold(Summary::default(), |mut s, e| {
            match e.outcome {
                Outcome::Success => s.success += 1,
                Outcome::Skipped => s.skipped += 1,
                Outcome::Failed  => s.failed += 1,
            }
            s
        })
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.entries.iter().map(|e| e.outcome).collect()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Standalone HTML page: run header, outcome totals, one row per entry.
    pub fn to_html(&self) -> String {
        let s = self.summary();
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>Extraction report - {}</title>\n", escape_html(&self.bundle)));
        html.push_str(REPORT_STYLE);
        html.push_str("</head>\n<body>\n<div class=\"header\">\n");
        html.push_str(&format!("<h1>{}</h1>\n", escape_html(&self.bundle)));
        html.push_str(&format!(
            "<p>Format v{} &middot; {}{}</p>\n</div>\n",
            self.format_version,
            escape_html(&self.generated_at),
            if self.cancelled { " &middot; cancelled" } else { "" },
        ));

        html.push_str("<div class=\"stats\">\n");
        for (label, count) in [("Extracted", s.success), ("Skipped", s.skipped), ("Failed", s.failed)] {
            html.push_str(&format!(
                "<div class=\"stat\"><div>{label}</div><div class=\"value\">{count}</div></div>\n"
            ));
        }
        html.push_str("</div>\n");

        html.push_str("<table>\n<tr><th>Entry</th><th>Type</th><th>Outcome</th><th>Output</th><th>Bytes</th><th>Reason</th></tr>\n");
        for e in &self.entries {
            let output = e.output.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
            html.push_str(&format!(
                "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                e.outcome,
                escape_html(&e.source_name),
                e.type_tag,
                e.outcome,
                escape_html(&output),
                e.bytes_written,
                escape_html(e.reason.as_deref().unwrap_or("")),
            ));
        }
        html.push_str("</table>\n</body>\n</html>\n");
        html
    }
}

const REPORT_STYLE: &str = "<style>
body { font-family: Arial, sans-serif; margin: 40px; }
.header { background: #4CAF50; color: white; padding: 20px; }
.stats { display: flex; gap: 20px; margin: 20px 0; }
.stat { background: #f5f5f5; padding: 15px; border-radius: 5px; min-width: 150px; }
.value { font-size: 24px; font-weight: bold; color: #4CAF50; }
table { border-collapse: collapse; width: 100%; }
td, th { border-bottom: 1px solid #ddd; padding: 4px 8px; text-align: left; }
tr.failed { background: #fdecea; }
tr.skipped { color: #888; }
</style>
";

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&'  => out.push_str("&amp;"),
            '<'  => out.push_str("&lt;"),
            '>'  => out.push_str("&gt;"),
            '"'  => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _    => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let m = Manifest {
            entries: vec![
                ManifestEntry::new("a", 28, Outcome::Success),
                ManifestEntry::new("b", 49, Outcome::Failed).with_reason("bad"),
                ManifestEntry::new("c", 0, Outcome::Skipped),
                ManifestEntry::new("d", 0, Outcome::Skipped),
            ],
            ..Default::default()
        };
        let s = m.summary();
        assert_eq!((s.success, s.skipped, s.failed, s.total()), (1, 2, 1, 4));
        assert_eq!(s.to_string(), "1 extracted, 2 skipped, 1 failed");
    }

    #[test]
    fn json_omits_empty_optionals() {
        let m = Manifest {
            bundle: "x.bundle".into(),
            entries: vec![ManifestEntry::new("a", 28, Outcome::Skipped)],
            ..Default::default()
        };
        let text = String::from_utf8(m.to_json().unwrap()).unwrap();
        assert!(text.contains("\"outcome\": \"skipped\""));
        assert!(!text.contains("content_hash"));
        assert_eq!(Manifest::from_json(text.as_bytes()).unwrap(), m);
    }

    #[test]
    fn html_report_escapes_names_and_lists_every_row() {
        let m = Manifest {
            bundle: "<level1>.bundle".into(),
            entries: vec![
                ManifestEntry::new("hero & co", 28, Outcome::Success),
                ManifestEntry::new("broken", 49, Outcome::Failed).with_reason("bad \"tag\""),
            ],
            ..Default::default()
        };
        let html = m.to_html();
        assert!(html.contains("<title>Extraction report - &lt;level1&gt;.bundle</title>"));
        assert!(html.contains("<td>hero &amp; co</td>"));
        assert!(html.contains("<td>bad &quot;tag&quot;</td>"));
        assert!(html.contains("<tr class=\"failed\">"));
        assert!(!html.contains("<level1>"));
        assert_eq!(html.matches("<tr class=").count(), 2);
    }
}
