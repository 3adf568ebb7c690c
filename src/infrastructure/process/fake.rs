//! Scripted `ProcessRunner` for tests. Records every invocation and lets the
//! script write the files a real tool would have produced.

use super::runner::{ProcessOutput, ProcessRunner, RunError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Value following `flag`, e.g. the template after `-o`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Writes `bytes` where yt-dlp would, resolving `%(ext)s` to `ext`.
    pub fn write_output(&self, ext: &str, bytes: &[u8]) -> PathBuf {
        let template = self.value_of("-o").expect("download without -o");
        let path = PathBuf::from(template.replace("%(ext)s", ext));
        std::fs::write(&path, bytes).expect("write fake output");
        path
    }

    /// ffmpeg puts its output path last.
    pub fn write_last_arg(&self, bytes: &[u8]) -> PathBuf {
        let path = PathBuf::from(self.args.last().expect("no args"));
        std::fs::write(&path, bytes).expect("write fake output");
        path
    }
}

type Script = dyn Fn(&Invocation) -> Result<ProcessOutput, RunError> + Send + Sync;

pub struct FakeRunner {
    script: Box<Script>,
    calls: Mutex<Vec<Invocation>>,
    delay: Option<(Duration, fn(&Invocation) -> bool)>,
}

impl FakeRunner {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Invocation) -> Result<ProcessOutput, RunError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleeps after the script ran for invocations matching `when`,
    /// simulating a tool that is still busy.
    pub fn with_delay(mut self, delay: Duration, when: fn(&Invocation) -> bool) -> Self {
        self.delay = Some((delay, when));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn count(&self, program_name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.program_name() == program_name)
            .count()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        _timeout: Duration,
    ) -> Result<ProcessOutput, RunError> {
        let invocation = Invocation {
            program: program.to_path_buf(),
            args: args.to_vec(),
        };
        self.calls.lock().push(invocation.clone());
        let result = (self.script)(&invocation);
        if let Some((delay, when)) = self.delay {
            if when(&invocation) {
                tokio::time::sleep(delay).await;
            }
        }
        result
    }
}

pub fn ok(stdout: impl Into<Vec<u8>>) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(0),
        stdout: stdout.into(),
        stderr: Vec::new(),
    }
}

pub fn failed(code: i32, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}
