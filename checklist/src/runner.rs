//! Executes a single verification check with an explicit timeout. A
//! timeout, an unsafe input, or a missing interpreter/tool all resolve to
//! `passed: None` (pending) — only an explicit mismatch is `Some(false)`.

use crate::model::{CheckType, VerificationCheck};
use crate::validate::{is_safe_pattern, validate_path};
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

const OUTPUT_TRUNCATE_BYTES: usize = 500;

fn truncate(text: &str) -> String {
    text.chars().take(OUTPUT_TRUNCATE_BYTES).collect()
}

enum RunOutcome {
    Completed { passed: bool, output: String },
    TimedOut,
    NotFound(String),
    Errored(String),
}

async fn run_argv_with_timeout(mut cmd: Command, timeout: Duration) -> RunOutcome {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return RunOutcome::NotFound(e.to_string()),
        Err(e) => return RunOutcome::Errored(e.to_string()),
    };

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(s) = stdout.as_mut() {
            let _ = s.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(s) = stderr.as_mut() {
            let _ = s.read_to_end(&mut buf).await;
        }
        buf
    });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let out = stdout_task.await.unwrap_or_default();
            let err = stderr_task.await.unwrap_or_default();
            let mut combined = String::from_utf8_lossy(&out).into_owned();
            combined.push_str(&String::from_utf8_lossy(&err));
            RunOutcome::Completed { passed: status.success(), output: truncate(&combined) }
        }
        Ok(Err(e)) => RunOutcome::Errored(e.to_string()),
        Err(_) => {
            let _ = child.kill().await;
            let _ = child.wait().await;
            RunOutcome::TimedOut
        }
    }
}

fn pending(check: &VerificationCheck, output: impl Into<String>) -> VerificationCheck {
    let mut updated = check.clone();
    updated.passed = None;
    updated.output = Some(output.into());
    updated
}

fn resolved(check: &VerificationCheck, passed: bool, output: impl Into<String>) -> VerificationCheck {
    let mut updated = check.clone();
    updated.passed = Some(passed);
    updated.output = Some(output.into());
    updated
}

async fn run_file_exists(check: &VerificationCheck, project_dir: &Path) -> VerificationCheck {
    let path = check.path.as_deref().unwrap_or_default();
    match validate_path(path, project_dir) {
        Ok(full_path) => resolved(check, full_path.exists(), ""),
        Err(msg) => pending(check, msg),
    }
}

async fn run_file_contains(check: &VerificationCheck, project_dir: &Path) -> VerificationCheck {
    let path = check.path.as_deref().unwrap_or_default();
    let pattern = check.pattern.as_deref().unwrap_or_default();
    if !pattern.is_empty() && !is_safe_pattern(pattern) {
        return pending(check, format!("Unsafe pattern rejected: {pattern:?}"));
    }
    let full_path = match validate_path(path, project_dir) {
        Ok(p) => p,
        Err(msg) => return pending(check, msg),
    };
    if !full_path.is_file() {
        return resolved(check, false, "");
    }
    let content = tokio::fs::read_to_string(&full_path).await.unwrap_or_default();
    match Regex::new(pattern) {
        Ok(re) => resolved(check, re.is_match(&content), ""),
        Err(e) => resolved(check, false, format!("Invalid regex: {e}")),
    }
}

async fn run_tests_pass(check: &VerificationCheck, project_dir: &Path, timeout: Duration) -> VerificationCheck {
    let pattern = check.pattern.as_deref().unwrap_or_default();
    if pattern.is_empty() {
        return pending(check, "");
    }
    if !is_safe_pattern(pattern) {
        return pending(check, format!("Unsafe pattern rejected: {pattern:?}"));
    }

    let mut cmd = if project_dir.join("package.json").is_file() {
        let mut cmd = Command::new("npx");
        cmd.args(["jest", "--testPathPattern", pattern, "--passWithNoTests"]);
        cmd
    } else {
        let mut cmd = Command::new("python3");
        cmd.args(["-m", "pytest", "-q", pattern]);
        cmd
    };
    cmd.current_dir(project_dir);

    match run_argv_with_timeout(cmd, timeout).await {
        RunOutcome::Completed { passed, output } => resolved(check, passed, output),
        RunOutcome::TimedOut => pending(check, format!("Timed out after {}s", timeout.as_secs())),
        RunOutcome::NotFound(_) => pending(check, "Test runner not found"),
        RunOutcome::Errored(e) => pending(check, e),
    }
}

async fn run_command(check: &VerificationCheck, project_dir: &Path, timeout: Duration) -> VerificationCheck {
    let command = check.command.as_deref().unwrap_or_default();
    if command.is_empty() {
        return pending(check, "");
    }
    let argv = match shell_words::split(command) {
        Ok(argv) if !argv.is_empty() => argv,
        _ => return pending(check, "Failed to parse command"),
    };

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]).current_dir(project_dir);

    match run_argv_with_timeout(cmd, timeout).await {
        RunOutcome::Completed { passed, output } => resolved(check, passed, output),
        RunOutcome::TimedOut => pending(check, format!("Timed out after {}s", timeout.as_secs())),
        RunOutcome::NotFound(_) => pending(check, format!("Command not found: {}", argv[0])),
        RunOutcome::Errored(e) => pending(check, e),
    }
}

async fn run_grep_codebase(check: &VerificationCheck, project_dir: &Path, timeout: Duration) -> VerificationCheck {
    let pattern = check.pattern.as_deref().unwrap_or_default();
    if pattern.is_empty() {
        return pending(check, "");
    }
    if !is_safe_pattern(pattern) {
        return pending(check, format!("Unsafe grep pattern rejected: {pattern:?}"));
    }

    let mut cmd = Command::new("grep");
    cmd.args(["-r", "-l", "--exclude-dir=.git", "--exclude-dir=node_modules", "--exclude-dir=.loki", "--exclude-dir=__pycache__", "--", pattern, "."]);
    cmd.current_dir(project_dir);

    match run_argv_with_timeout(cmd, timeout).await {
        RunOutcome::Completed { passed, output } => {
            let files_found = output.lines().filter(|l| !l.is_empty()).count();
            resolved(check, passed, format!("Found in {files_found} file(s)"))
        }
        RunOutcome::TimedOut => pending(check, format!("Timed out after {}s", timeout.as_secs())),
        RunOutcome::NotFound(_) => pending(check, "grep not found"),
        RunOutcome::Errored(e) => pending(check, e),
    }
}

#[derive(serde::Deserialize)]
struct AppRunnerState {
    status: String,
    #[serde(default)]
    url: String,
}

async fn run_http_check(check: &VerificationCheck, project_dir: &Path, timeout: Duration) -> VerificationCheck {
    let path = check.path.as_deref().unwrap_or("/");
    let stripped = path.trim_start_matches('/');
    if !stripped.is_empty() && !crate::validate::is_safe_path(stripped) {
        return pending(check, format!("Unsafe path rejected: {path:?}"));
    }

    let state_path = project_dir.join(".loki").join("app-runner").join("state.json");
    let app_url = match tokio::fs::read_to_string(&state_path).await {
        Ok(text) => match serde_json::from_str::<AppRunnerState>(&text) {
            Ok(state) if state.status == "running" && !state.url.is_empty() => Some(state.url),
            _ => None,
        },
        Err(_) => None,
    };

    let Some(app_url) = app_url else {
        return pending(check, "App not running (app runner not active)");
    };

    let expected_status = check.expected_status.unwrap_or(200);
    let target_url = format!("{}/{}", app_url.trim_end_matches('/'), stripped);

    let client = match reqwest::Client::builder().timeout(timeout.min(Duration::from_secs(10))).build() {
        Ok(client) => client,
        Err(e) => return pending(check, format!("HTTP check error: {e}")),
    };

    match client.get(&target_url).send().await {
        Ok(resp) => {
            let actual = resp.status().as_u16();
            resolved(check, actual == expected_status, format!("HTTP {actual} (expected {expected_status})"))
        }
        Err(e) if e.is_timeout() => pending(check, format!("Timed out after {}s", timeout.as_secs())),
        Err(e) => resolved(check, false, format!("Connection failed: {e}")),
    }
}

/// Runs one check against `project_dir`, returning an updated copy with
/// `passed`/`output` filled in. Never panics on malformed input — every
/// branch either resolves or falls back to pending.
pub async fn run_check(check: &VerificationCheck, project_dir: &Path, timeout: Duration) -> VerificationCheck {
    match check.check_type {
        CheckType::FileExists => run_file_exists(check, project_dir).await,
        CheckType::FileContains => run_file_contains(check, project_dir).await,
        CheckType::TestsPass => run_tests_pass(check, project_dir, timeout).await,
        CheckType::Command => run_command(check, project_dir, timeout).await,
        CheckType::GrepCodebase => run_grep_codebase(check, project_dir, timeout).await,
        CheckType::HttpCheck => run_http_check(check, project_dir, timeout).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CheckType;

    fn check(check_type: CheckType) -> VerificationCheck {
        VerificationCheck { check_type, path: None, pattern: None, command: None, expected_status: None, passed: None, output: None }
    }

    #[tokio::test]
    async fn file_exists_true_for_present_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();
        let mut c = check(CheckType::FileExists);
        c.path = Some("README.md".to_string());
        let result = run_check(&c, dir.path(), Duration::from_secs(5)).await;
        assert_eq!(result.passed, Some(true));
    }

    #[tokio::test]
    async fn file_exists_false_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = check(CheckType::FileExists);
        c.path = Some("nope.txt".to_string());
        let result = run_check(&c, dir.path(), Duration::from_secs(5)).await;
        assert_eq!(result.passed, Some(false));
    }

    #[tokio::test]
    async fn file_contains_matches_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        let mut c = check(CheckType::FileContains);
        c.path = Some("a.txt".to_string());
        c.pattern = Some("wor[a-z]+".to_string());
        let result = run_check(&c, dir.path(), Duration::from_secs(5)).await;
        assert_eq!(result.passed, Some(true));
    }

    #[tokio::test]
    async fn command_timeout_is_pending_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = check(CheckType::Command);
        c.command = Some("sleep 5".to_string());
        let result = run_check(&c, dir.path(), Duration::from_millis(50)).await;
        assert_eq!(result.passed, None);
    }

    #[tokio::test]
    async fn command_exit_code_determines_pass() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = check(CheckType::Command);
        c.command = Some("true".to_string());
        let result = run_check(&c, dir.path(), Duration::from_secs(5)).await;
        assert_eq!(result.passed, Some(true));
    }

    #[tokio::test]
    async fn http_check_pending_when_app_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = check(CheckType::HttpCheck);
        c.path = Some("/healthz".to_string());
        let result = run_check(&c, dir.path(), Duration::from_secs(5)).await;
        assert_eq!(result.passed, None);
    }

    #[tokio::test]
    async fn unsafe_pattern_is_rejected_as_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = check(CheckType::GrepCodebase);
        c.pattern = Some("$(rm -rf /)".to_string());
        let result = run_check(&c, dir.path(), Duration::from_secs(5)).await;
        assert_eq!(result.passed, None);
    }
}
