//! Transformer seam: every file transformation goes through [`Transform`].
//!
//! Built-in transformers live in the submodules. Anything else (a Sass compiler,
//! a script transpiler, a linter) is plugged in as a [`CommandTransform`] that
//! pipes the file through an external program.

pub mod image;
pub mod markup;
pub mod style;

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::error::{BuildError, TransformFailure};
use crate::mode::ModePolicy;

/// Per-file information handed to every transformer
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Absolute path of the file being transformed
    pub source: &'a Path,
    /// Root of the source tree (used to resolve imports and includes)
    pub source_root: &'a Path,
    pub policy: &'a ModePolicy,
}

/// An opaque `bytes -> bytes` transformation
pub trait Transform: Send + Sync {
    /// Name shown in error messages
    fn name(&self) -> &str;

    fn apply(&self, input: Vec<u8>, ctx: &TransformContext<'_>)
        -> Result<Vec<u8>, TransformFailure>;
}

/// Shared handle to a transformer; chains are built once and shared across workers
pub type TransformRef = Arc<dyn Transform>;

/// Run `chain` in order over `input`. An empty chain returns the input unchanged.
///
/// The first failure stops the chain and is reported with the transformer's name
/// and the source path.
pub fn run_chain(
    chain: &[TransformRef],
    input: Vec<u8>,
    ctx: &TransformContext<'_>,
) -> Result<Vec<u8>, BuildError> {
    chain.iter().try_fold(input, |bytes, transform| {
        debug!(
            transformer = transform.name(),
            source = %ctx.source.display(),
            "applying"
        );
        transform
            .apply(bytes, ctx)
            .map_err(|source| BuildError::Transform {
                path: ctx.source.to_path_buf(),
                transformer: transform.name().to_string(),
                source,
            })
    })
}

/// What to do with an external program's stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutput {
    /// stdout replaces the input
    Replace,
    /// Only the exit status matters; the input passes through (linters)
    CheckOnly,
}

/// External program used as a transformer.
///
/// The file content is written to stdin. The program runs in the source root
/// with `ASSET_SOURCE`, `BUILD_MODE`, `BUILD_MINIFY` and `BUILD_SOURCE_MAPS` set.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    name: String,
    program: String,
    args: Vec<String>,
    output: CommandOutput,
}

impl CommandTransform {
    /// Build from a whitespace-separated command line. Returns `None` for a blank line.
    pub fn parse(name: &str, command_line: &str, output: CommandOutput) -> Option<Self> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            name: name.to_string(),
            program,
            args: words.collect(),
            output,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Transform for CommandTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(
        &self,
        input: Vec<u8>,
        ctx: &TransformContext<'_>,
    ) -> Result<Vec<u8>, TransformFailure> {
        let spawn_failed = |source| TransformFailure::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(ctx.source_root)
            .env("ASSET_SOURCE", ctx.source)
            .env("BUILD_MODE", ctx.policy.mode().as_str())
            .env("BUILD_MINIFY", flag(ctx.policy.should_minify()))
            .env(
                "BUILD_SOURCE_MAPS",
                flag(ctx.policy.should_generate_source_maps()),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_failed)?;

        // Feed stdin from a separate thread so a chatty child cannot deadlock on a full stdout pipe
        let writer = child.stdin.take().map(|mut stdin| {
            let data = input.clone();
            thread::spawn(move || stdin.write_all(&data))
        });

        let output = child.wait_with_output().map_err(spawn_failed)?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                // The program may legitimately exit without reading all of stdin
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(TransformFailure::Io(e)),
                Err(_) => {
                    return Err(TransformFailure::Syntax(format!(
                        "stdin writer for `{}` panicked",
                        self.program
                    )))
                }
            }
        }

        if !output.status.success() {
            return Err(TransformFailure::Command {
                program: self.program.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match self.output {
            CommandOutput::Replace => Ok(output.stdout),
            CommandOutput::CheckOnly => Ok(input),
        }
    }
}

#[inline]
fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::BuildMode;
    use std::path::PathBuf;

    struct Append(&'static str);

    impl Transform for Append {
        fn name(&self) -> &str {
            "append"
        }

        fn apply(
            &self,
            mut input: Vec<u8>,
            _ctx: &TransformContext<'_>,
        ) -> Result<Vec<u8>, TransformFailure> {
            input.extend_from_slice(self.0.as_bytes());
            Ok(input)
        }
    }

    struct Fail;

    impl Transform for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        fn apply(
            &self,
            _input: Vec<u8>,
            _ctx: &TransformContext<'_>,
        ) -> Result<Vec<u8>, TransformFailure> {
            Err(TransformFailure::Syntax("boom".to_string()))
        }
    }

    fn with_ctx<R>(f: impl FnOnce(&TransformContext<'_>) -> R) -> R {
        let source = PathBuf::from("/src/css/app.scss");
        let root = std::env::temp_dir();
        let policy = ModePolicy::new(BuildMode::Development);
        let ctx = TransformContext {
            source: &source,
            source_root: &root,
            policy: &policy,
        };
        f(&ctx)
    }

    #[test]
    fn test_run_chain_empty_is_passthrough() {
        let out = with_ctx(|ctx| run_chain(&[], b"abc".to_vec(), ctx)).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_run_chain_applies_in_order() {
        let chain: Vec<TransformRef> = vec![Arc::new(Append("1")), Arc::new(Append("2"))];
        let out = with_ctx(|ctx| run_chain(&chain, b"x".to_vec(), ctx)).unwrap();
        assert_eq!(out, b"x12");
    }

    #[test]
    fn test_run_chain_reports_transformer_and_path() {
        let chain: Vec<TransformRef> = vec![Arc::new(Append("1")), Arc::new(Fail)];
        let err = with_ctx(|ctx| run_chain(&chain, b"x".to_vec(), ctx)).unwrap_err();

        match &err {
            BuildError::Transform {
                path, transformer, ..
            } => {
                assert_eq!(path, &PathBuf::from("/src/css/app.scss"));
                assert_eq!(transformer, "fail");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("app.scss"));
    }

    #[test]
    fn test_command_parse() {
        let cmd = CommandTransform::parse("sass", "  sass --stdin  --no-source-map ", CommandOutput::Replace)
            .unwrap();
        assert_eq!(cmd.program(), "sass");
        assert_eq!(cmd.args(), &["--stdin".to_string(), "--no-source-map".to_string()]);
        assert!(CommandTransform::parse("sass", "   ", CommandOutput::Replace).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_replace_uses_stdout() {
        let cmd = CommandTransform::parse("upper", "tr a-z A-Z", CommandOutput::Replace).unwrap();
        let out = with_ctx(|ctx| cmd.apply(b"body{}".to_vec(), ctx)).unwrap();
        assert_eq!(out, b"BODY{}");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_check_only_keeps_input() {
        let cmd = CommandTransform::parse("lint", "cat", CommandOutput::CheckOnly).unwrap();
        let out = with_ctx(|ctx| cmd.apply(b"let a = 1;".to_vec(), ctx)).unwrap();
        assert_eq!(out, b"let a = 1;");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_nonzero_exit_fails() {
        let cmd = CommandTransform::parse("lint", "false", CommandOutput::CheckOnly).unwrap();
        let err = with_ctx(|ctx| cmd.apply(b"x".to_vec(), ctx)).unwrap_err();
        assert!(matches!(err, TransformFailure::Command { code: 1, .. }));
    }

    #[test]
    fn test_command_missing_program_fails_to_spawn() {
        let cmd = CommandTransform::parse(
            "transpiler",
            "definitely-not-a-real-program-4711",
            CommandOutput::Replace,
        )
        .unwrap();
        let err = with_ctx(|ctx| cmd.apply(b"x".to_vec(), ctx)).unwrap_err();
        assert!(matches!(err, TransformFailure::Spawn { .. }));
    }
}
