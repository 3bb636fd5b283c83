use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// `java -version` prints exactly this many lines on the runtimes we accept.
const EXPECTED_PROBE_LINES: usize = 3;

pub const DEFAULT_ACCEPTED_PREFIX: &str = "1.8.";
pub const DEFAULT_DOWNLOAD_LINK: &str = "https://www.java.com/en/download/manual.jsp";

/// Command used to ask the runtime for its version banner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeProbe {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for RuntimeProbe {
    fn default() -> Self {
        Self {
            program: "java".to_string(),
            args: vec!["-version".to_string()],
        }
    }
}

/// Verdict of the prerequisite gate. A rejection is not an error: it only
/// disables the external installer branch.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RuntimeCheck {
    pub ok: bool,
    /// First diagnostic line, empty if the probe printed nothing.
    pub detected_version_line: String,
}

/// Run the probe and judge its diagnostic (stderr) output.
#[instrument(skip_all, fields(program = %probe.program))]
pub async fn check_runtime(probe: &RuntimeProbe, accepted_prefix: &str) -> RuntimeCheck {
    match read_probe_lines(probe).await {
        Ok(lines) => {
            debug!("Probe printed {} lines", lines.len());
            let check = evaluate_probe_lines(&lines, accepted_prefix);
            info!(
                "Runtime check {}: {}",
                if check.ok { "passed" } else { "rejected" },
                check.detected_version_line
            );
            check
        }
        Err(e) => {
            warn!("Runtime probe could not run: {}", e);
            RuntimeCheck {
                ok: false,
                detected_version_line: String::new(),
            }
        }
    }
}

/// Accept only exactly three lines whose first line carries a quoted
/// version starting with `accepted_prefix`. Anything else is a rejection.
pub fn evaluate_probe_lines<S: AsRef<str>>(lines: &[S], accepted_prefix: &str) -> RuntimeCheck {
    let detected_version_line = lines
        .first()
        .map(|line| line.as_ref().to_string())
        .unwrap_or_default();

    let ok = lines.len() == EXPECTED_PROBE_LINES
        && quoted_version(&detected_version_line)
            .map_or(false, |version| version.starts_with(accepted_prefix));

    RuntimeCheck {
        ok,
        detected_version_line,
    }
}

/// Text between the first pair of double quotes, e.g. `1.8.0_392` from
/// `java version "1.8.0_392"`.
pub fn quoted_version(line: &str) -> Option<&str> {
    let start = line.find('"')?;
    let end = line[start + 1..].find('"')?;
    Some(&line[start + 1..start + 1 + end])
}

/// Guidance shown when the gate rejects.
pub fn remediation_lines(download_link: &str) -> Vec<String> {
    vec![
        "You are using the wrong version of Java.".to_string(),
        "Download the newest version here:".to_string(),
        download_link.to_string(),
        "Select \"Windows Offline (64-Bit)\"".to_string(),
    ]
}

async fn read_probe_lines(probe: &RuntimeProbe) -> std::io::Result<Vec<String>> {
    let mut child = Command::new(&probe.program)
        .args(&probe.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut lines = Vec::new();
    if let Some(stderr) = child.stderr.take() {
        let mut reader = BufReader::new(stderr).lines();
        while let Some(line) = reader.next_line().await? {
            lines.push(line);
        }
    }

    let status = child.wait().await?;
    debug!("Probe exited with {}", status);
    Ok(lines)
}
