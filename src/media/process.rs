use std::io;
use std::process::Command;

use tracing::debug;

/// Captured result of one external tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// A successful exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed exit with the given stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs external tools. A spawn error of kind `NotFound` means the tool is
/// not installed.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput>;
}

/// Runs tools as real subprocesses, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        debug!("Running {} {}", program, args.join(" "));

        let output = Command::new(program).args(args).output()?;

        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_is_not_found() {
        let result = SystemRunner.run("tgsplit-definitely-not-a-real-tool", &[]);
        match result {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            Ok(_) => panic!("Expected spawn failure"),
        }
    }

    #[test]
    fn test_output_constructors() {
        let ok = ProcessOutput::ok("{}");
        assert!(ok.success);
        assert_eq!(ok.stdout, "{}");

        let failed = ProcessOutput::failed(1, "boom");
        assert!(!failed.success);
        assert_eq!(failed.code, Some(1));
        assert_eq!(failed.stderr, "boom");
    }
}
