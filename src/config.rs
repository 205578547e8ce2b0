//! CLI configuration and runtime settings for a site build.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::mode::{BuildMode, ModePolicy};
use crate::paths::PathResolver;
use crate::router::ExternalTransformers;
use crate::transform::{CommandOutput, CommandTransform, TransformRef};

/// Single-pass static site asset build pipeline
#[derive(Parser, Debug)]
#[command(name = "asset-pipeline")]
#[command(version)]
#[command(about = "Build a static site's pages, styles, scripts, images and fonts")]
pub struct Cli {
    /// Source directory
    #[arg(default_value = "src")]
    pub source: String,

    /// Output directory (replaced on every successful build)
    #[arg(short, long, default_value = "app")]
    pub out: String,

    /// Build mode: "development" or anything else for production
    #[arg(short, long, env = "NODE_ENV")]
    pub mode: Option<String>,

    /// Port for an external live-reload server
    #[arg(long, default_value_t = 3000)]
    pub port: u16,

    /// Ask the live-reload server to open a browser
    #[arg(long)]
    pub open: bool,

    /// Number of parallel workers
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub jobs: usize,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Favicon location relative to the output directory
    #[arg(long, default_value = "favicon.ico")]
    pub favicon: String,

    /// Verbatim-copied asset directory, relative to the source directory
    #[arg(long, default_value = "assets")]
    pub assets_dir: String,

    /// Command replacing the built-in SCSS preprocessor (stdin -> stdout)
    #[arg(long, value_name = "COMMAND")]
    pub style_preprocessor: Option<String>,

    /// Command transpiling scripts (stdin -> stdout)
    #[arg(long, value_name = "COMMAND")]
    pub script_transpiler: Option<String>,

    /// Command linting scripts in development; a non-zero exit fails the build
    #[arg(long, value_name = "COMMAND")]
    pub script_linter: Option<String>,
}

/// Where a build reads from and writes to. All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    pub source_root: PathBuf,
    pub assets_dir: PathBuf,
    pub output_root: PathBuf,
    /// Relative to the output root
    pub favicon: PathBuf,
}

impl SiteLayout {
    /// Layout with the default asset directory and favicon name
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        let source_root = source_root.into();
        Self {
            assets_dir: source_root.join("assets"),
            source_root,
            output_root: output_root.into(),
            favicon: PathBuf::from("favicon.ico"),
        }
    }
}

/// Options handed to an external live-reload server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevServer {
    pub port: u16,
    pub open: bool,
}

impl Default for DevServer {
    fn default() -> Self {
        Self {
            port: 3000,
            open: false,
        }
    }
}

/// Runtime configuration parsed from CLI
#[derive(Debug, Clone)]
pub struct Config {
    pub layout: SiteLayout,
    /// Decided once here and threaded explicitly from then on
    pub mode: BuildMode,
    pub dev_server: DevServer,
    /// Number of parallel workers
    pub jobs: usize,
    /// Enable verbose output
    pub verbose: bool,
    pub style_preprocessor: Option<String>,
    pub script_transpiler: Option<String>,
    pub script_linter: Option<String>,
}

impl Config {
    /// Create Config from CLI arguments, resolving paths against the working directory
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine the working directory")?;
        Self::from_cli_in(cli, &cwd)
    }

    /// Create Config from CLI arguments, resolving paths against `base`
    pub fn from_cli_in(cli: Cli, base: &Path) -> anyhow::Result<Self> {
        let resolver = PathResolver::new(base);
        let source_root = resolver.resolve(&cli.source);
        let output_root = resolver.resolve(&cli.out);
        let assets_dir = PathResolver::new(&source_root).resolve(&cli.assets_dir);

        let favicon = PathBuf::from(cli.favicon.trim());
        let escapes = favicon
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if favicon.as_os_str().is_empty() || escapes {
            bail!(
                "Invalid favicon path '{}': must be relative to the output directory",
                cli.favicon
            );
        }

        for (flag, command) in [
            ("--style-preprocessor", &cli.style_preprocessor),
            ("--script-transpiler", &cli.script_transpiler),
            ("--script-linter", &cli.script_linter),
        ] {
            if command.as_deref().is_some_and(|c| c.trim().is_empty()) {
                bail!("{flag} needs a command");
            }
        }

        Ok(Config {
            layout: SiteLayout {
                source_root,
                assets_dir,
                output_root,
                favicon,
            },
            mode: BuildMode::from_signal(cli.mode.as_deref()),
            dev_server: DevServer {
                port: cli.port,
                open: cli.open,
            },
            jobs: cli.jobs.max(1),
            verbose: cli.verbose,
            style_preprocessor: cli.style_preprocessor,
            script_transpiler: cli.script_transpiler,
            script_linter: cli.script_linter,
        })
    }

    /// Programmatic configuration with defaults for everything but the layout and mode
    pub fn new(layout: SiteLayout, mode: BuildMode) -> Self {
        Self {
            layout,
            mode,
            dev_server: DevServer::default(),
            jobs: num_cpus::get().max(1),
            verbose: false,
            style_preprocessor: None,
            script_transpiler: None,
            script_linter: None,
        }
    }

    #[inline]
    pub fn policy(&self) -> ModePolicy {
        ModePolicy::new(self.mode)
    }

    /// External commands wrapped as transformers
    pub fn external_transformers(&self) -> ExternalTransformers {
        fn command(name: &str, line: Option<&str>, output: CommandOutput) -> Option<TransformRef> {
            let transform: TransformRef = Arc::new(CommandTransform::parse(name, line?, output)?);
            Some(transform)
        }

        ExternalTransformers {
            style_preprocessor: command(
                "style preprocessor",
                self.style_preprocessor.as_deref(),
                CommandOutput::Replace,
            ),
            script_transpiler: command(
                "script transpiler",
                self.script_transpiler.as_deref(),
                CommandOutput::Replace,
            ),
            script_linter: command(
                "script linter",
                self.script_linter.as_deref(),
                CommandOutput::CheckOnly,
            ),
        }
    }
}
