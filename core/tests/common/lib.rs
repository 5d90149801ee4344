#![cfg(unix)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Fake `codex` executables for integration tests.
//!
//! [`FakeCodex`] writes a POSIX shell script into a temp directory that
//! imitates the subcommands the bridge calls. Every invocation appends its
//! kind to `calls.log`; the main `exec` run also records its arguments,
//! stdin and `OPENAI_API_KEY`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;

use codex_bridge_core::config_types::CodexCliConfig;
use tempfile::TempDir;

/// How `codex login status --json` behaves.
#[derive(Debug, Clone)]
pub enum StatusProbe {
    /// Exit 0 printing this stdout.
    Succeeds(String),
    /// Exit non-zero printing this stderr.
    Fails { stderr: String, code: i32 },
}

#[derive(Debug, Clone)]
pub struct FakeCodexBuilder {
    events: Vec<Vec<u8>>,
    exec_stderr: String,
    exec_exit: i32,
    read_stdin: bool,
    hang: bool,
    status: StatusProbe,
    probe_exit: i32,
    login_exit: i32,
    login_stderr: String,
    version_exit: i32,
}

impl Default for FakeCodexBuilder {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            exec_stderr: String::new(),
            exec_exit: 0,
            read_stdin: true,
            hang: false,
            status: StatusProbe::Succeeds(r#"{"authenticated": true}"#.to_string()),
            probe_exit: 0,
            login_exit: 0,
            login_stderr: String::new(),
            version_exit: 0,
        }
    }
}

impl FakeCodexBuilder {
    /// One stdout line for the main `exec` run.
    pub fn event(self, line: impl Into<String>) -> Self {
        self.raw_event(line.into().into_bytes())
    }

    /// One stdout line given as raw bytes, which need not be UTF-8.
    pub fn raw_event(mut self, line: impl Into<Vec<u8>>) -> Self {
        self.events.push(line.into());
        self
    }

    pub fn json_event(self, value: serde_json::Value) -> Self {
        self.event(value.to_string())
    }

    pub fn exec_exit(mut self, code: i32, stderr: impl Into<String>) -> Self {
        self.exec_exit = code;
        self.exec_stderr = stderr.into();
        self
    }

    /// Exit without consuming the prompt on stdin.
    pub fn ignore_stdin(mut self) -> Self {
        self.read_stdin = false;
        self
    }

    /// Keep running after printing events until killed.
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn status(mut self, status: StatusProbe) -> Self {
        self.status = status;
        self
    }

    pub fn probe_exit(mut self, code: i32) -> Self {
        self.probe_exit = code;
        self
    }

    pub fn login_exit(mut self, code: i32, stderr: impl Into<String>) -> Self {
        self.login_exit = code;
        self.login_stderr = stderr.into();
        self
    }

    pub fn version_exit(mut self, code: i32) -> Self {
        self.version_exit = code;
        self
    }

    pub fn build(self) -> anyhow::Result<FakeCodex> {
        let dir = TempDir::new()?;
        let root = dir.path();

        fs::write(root.join("events.jsonl"), join_lines(&self.events))?;
        fs::write(root.join("exec_stderr.txt"), &self.exec_stderr)?;
        fs::write(root.join("login_stderr.txt"), &self.login_stderr)?;

        let (status_out, status_err, status_exit) = match &self.status {
            StatusProbe::Succeeds(stdout) => (stdout.clone(), String::new(), 0),
            StatusProbe::Fails { stderr, code } => (String::new(), stderr.clone(), *code),
        };
        fs::write(root.join("status_stdout.txt"), status_out)?;
        fs::write(root.join("status_stderr.txt"), status_err)?;

        let read_stdin = if self.read_stdin {
            r#"cat > "$DIR/stdin.json""#
        } else {
            ":"
        };
        let finish = if self.hang {
            "exec sleep 30".to_string()
        } else {
            format!("exit {}", self.exec_exit)
        };

        let script = format!(
            r#"#!/bin/sh
DIR='{dir}'
case "$1" in
  --version)
    echo "codex-cli 0.0.0-test"
    exit {version_exit}
    ;;
  login)
    if [ "$2" = "status" ]; then
      echo status >> "$DIR/calls.log"
      cat "$DIR/status_stdout.txt"
      cat "$DIR/status_stderr.txt" >&2
      exit {status_exit}
    fi
    echo login >> "$DIR/calls.log"
    cat "$DIR/login_stderr.txt" >&2
    exit {login_exit}
    ;;
  exec)
    case "$3" in
      ""|--*) ;;
      *)
        echo probe >> "$DIR/calls.log"
        exit {probe_exit}
        ;;
    esac
    echo exec >> "$DIR/calls.log"
    printf '%s\n' "$@" > "$DIR/args.txt"
    printf '%s' "${{OPENAI_API_KEY-}}" > "$DIR/api_key.txt"
    {read_stdin}
    cat "$DIR/events.jsonl"
    cat "$DIR/exec_stderr.txt" >&2
    {finish}
    ;;
esac
echo "unknown command: $1" >&2
exit 2
"#,
            dir = root.display(),
            version_exit = self.version_exit,
            status_exit = status_exit,
            login_exit = self.login_exit,
            probe_exit = self.probe_exit,
        );

        let path = root.join("codex");
        fs::write(&path, script)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;

        Ok(FakeCodex { dir, path })
    }
}

fn join_lines(lines: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out
}

/// A fake `codex` binary and the files it records into.
pub struct FakeCodex {
    dir: TempDir,
    path: PathBuf,
}

impl FakeCodex {
    pub fn builder() -> FakeCodexBuilder {
        FakeCodexBuilder::default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn binary(&self) -> String {
        self.path.display().to_string()
    }

    /// Config pointing at this binary with everything else defaulted.
    pub fn config(&self) -> CodexCliConfig {
        CodexCliConfig {
            binary_path: self.binary(),
            ..Default::default()
        }
    }

    /// Invocation kinds in order: `status`, `probe`, `login`, `exec`.
    pub fn calls(&self) -> Vec<String> {
        self.read("calls.log")
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Arguments of the last main `exec` run.
    pub fn exec_args(&self) -> Vec<String> {
        self.read("args.txt")
            .map(|args| args.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Prompt payload the last `exec` run received on stdin.
    pub fn exec_stdin(&self) -> serde_json::Value {
        let raw = self.read("stdin.json").expect("exec did not record stdin");
        serde_json::from_str(&raw).expect("stdin was not JSON")
    }

    /// `OPENAI_API_KEY` as seen by the last `exec` run (empty when unset).
    pub fn exec_api_key(&self) -> Option<String> {
        self.read("api_key.txt")
    }

    fn read(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.dir.path().join(name)).ok()
    }
}
