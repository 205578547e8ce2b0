//! Build orchestration.
//!
//! A build runs in two phases inside a staging directory next to the output root:
//! - phase 1 transforms and writes every non-page file in parallel
//! - phase 2 renders the pages sequentially, referencing phase-1 artifacts
//!
//! Only a fully successful build replaces the previous output tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;
use rayon::prelude::*;
use tempfile::TempDir;
use tracing::{debug, error, info};

use crate::config::{Config, SiteLayout};
use crate::copier::{copy_file, write_file};
use crate::error::BuildError;
use crate::housekeeping::remove_placeholders;
use crate::mode::ModePolicy;
use crate::pages::{discover_pages, Page};
use crate::plan::{collect_assets, display_name, BuildPlan, Route, WorkItem};
use crate::router::{AssetKind, AssetRouter};
use crate::transform::markup::{PageAssets, PageRenderer};
use crate::transform::{run_chain, TransformContext, TransformRef};

/// Cache-line aligned atomic counter to prevent false sharing
/// Each counter is on its own 64-byte cache line
#[repr(align(64))]
pub struct CacheAlignedAtomic(pub AtomicU64);

impl CacheAlignedAtomic {
    pub const fn new(val: u64) -> Self {
        Self(AtomicU64::new(val))
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters updated by workers while a build runs
pub struct BuildStats {
    /// Files written, pages included
    pub artifacts: CacheAlignedAtomic,
    pub bytes: CacheAlignedAtomic,
    pub pages: CacheAlignedAtomic,
}

impl BuildStats {
    pub fn new() -> Self {
        Self {
            artifacts: CacheAlignedAtomic::new(0),
            bytes: CacheAlignedAtomic::new(0),
            pages: CacheAlignedAtomic::new(0),
        }
    }
}

impl Default for BuildStats {
    fn default() -> Self {
        Self::new()
    }
}

/// One file in the output tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub source: PathBuf,
    /// Relative to the output root
    pub output: PathBuf,
    /// `None` for passthrough copies
    pub kind: Option<AssetKind>,
    pub bytes: u64,
}

impl OutputArtifact {
    /// Output path as a URL relative to the output root
    pub fn url(&self) -> String {
        url_path(&self.output)
    }
}

fn url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Runs a [`BuildPlan`] into the output root of a [`SiteLayout`]
pub struct Assembler<'a> {
    layout: &'a SiteLayout,
    policy: ModePolicy,
    shutdown: &'a AtomicBool,
    stats: &'a BuildStats,
    progress: Option<&'a ProgressBar>,
}

impl<'a> Assembler<'a> {
    pub fn new(
        layout: &'a SiteLayout,
        policy: ModePolicy,
        shutdown: &'a AtomicBool,
        stats: &'a BuildStats,
    ) -> Self {
        Self {
            layout,
            policy,
            shutdown,
            stats,
            progress: None,
        }
    }

    /// Tick `progress` once per file and page
    pub fn with_progress(mut self, progress: Option<&'a ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    /// Build everything in `plan`, then swap the result into the output root.
    ///
    /// Returns the artifacts sorted by output path. On error the previous output
    /// tree is left untouched and the staging directory is removed.
    pub fn build(&self, plan: &BuildPlan<'_>) -> Result<Vec<OutputArtifact>, BuildError> {
        let staging = self.create_staging()?;
        debug!(staging = %staging.path().display(), "staging directory created");

        info!(files = plan.items.len(), "phase 1: assets");
        let mut artifacts = plan
            .items
            .par_iter()
            .map(|item| self.build_item(item, staging.path()))
            .collect::<Result<Vec<_>, _>>()?;
        check_collisions(&mut artifacts)?;
        self.check_cancelled()?;

        info!(pages = plan.pages.len(), "phase 2: pages");
        let pages = self.render_pages(&plan.pages, &artifacts, staging.path())?;
        artifacts.extend(pages);
        check_collisions(&mut artifacts)?;

        self.check_cancelled()?;
        commit(staging, &self.layout.output_root)?;
        info!(output = %self.layout.output_root.display(), "output committed");

        Ok(artifacts)
    }

    fn check_cancelled(&self) -> Result<(), BuildError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(BuildError::Cancelled);
        }
        Ok(())
    }

    fn create_staging(&self) -> Result<TempDir, BuildError> {
        let parent = output_parent(&self.layout.output_root);
        let create_failed = |source| BuildError::CreateDirFailed {
            path: parent.to_path_buf(),
            source,
        };

        fs::create_dir_all(parent).map_err(create_failed)?;
        tempfile::Builder::new()
            .prefix(".build-")
            .tempdir_in(parent)
            .map_err(create_failed)
    }

    fn context<'c>(&'c self, source: &'c Path) -> TransformContext<'c> {
        TransformContext {
            source,
            source_root: &self.layout.source_root,
            policy: &self.policy,
        }
    }

    fn record(&self, bytes: u64) {
        self.stats.artifacts.0.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes.0.fetch_add(bytes, Ordering::Relaxed);
        if let Some(pb) = self.progress {
            pb.inc(1);
        }
    }

    fn build_item(
        &self,
        item: &WorkItem<'_>,
        staging: &Path,
    ) -> Result<OutputArtifact, BuildError> {
        self.check_cancelled()?;

        let (output, bytes) = match item.route {
            Route::Rule(rule) => {
                let input = read_source(&item.source)?;
                let content = run_chain(&rule.chain, input, &self.context(&item.source))?;
                let output = match &rule.output {
                    Some(template) => template.output_path(&item.source, &content, &self.policy),
                    None => item.relative.clone(),
                };
                let bytes = write_file(&staging.join(&output), &content)?;
                (output, bytes)
            }
            Route::Passthrough => {
                let bytes = copy_file(&item.source, &staging.join(&item.relative))?;
                (item.relative.clone(), bytes)
            }
        };

        debug!(
            source = %display_name(item),
            output = %output.display(),
            bytes,
            "artifact written"
        );
        self.record(bytes);

        Ok(OutputArtifact {
            source: item.source.clone(),
            output,
            kind: item.route.kind(),
            bytes,
        })
    }

    /// Favicon to link from pages: production only, and only when phase 1 produced it
    fn favicon(&self, staging: &Path) -> Option<PathBuf> {
        if self.policy.is_development() {
            return None;
        }
        let favicon = &self.layout.favicon;
        if staging.join(favicon).is_file() {
            Some(favicon.clone())
        } else {
            debug!(favicon = %favicon.display(), "favicon not built, skipping link");
            None
        }
    }

    fn render_pages(
        &self,
        pages: &[Page],
        artifacts: &[OutputArtifact],
        staging: &Path,
    ) -> Result<Vec<OutputArtifact>, BuildError> {
        let urls = |kind: AssetKind| {
            artifacts
                .iter()
                .filter(|a| a.kind == Some(kind))
                .map(OutputArtifact::url)
                .collect::<Vec<_>>()
        };
        let styles = urls(AssetKind::Style);
        let scripts = urls(AssetKind::Script);
        let favicon = self.favicon(staging);

        let mut rendered = Vec::with_capacity(pages.len());
        for page in pages {
            self.check_cancelled()?;
            let page = page.with_favicon(favicon.clone());

            let renderer: TransformRef = Arc::new(PageRenderer::new(PageAssets {
                styles: styles.clone(),
                scripts: scripts.clone(),
                favicon: page.favicon.as_deref().map(url_path),
            }));
            let input = read_source(&page.template_path)?;
            let content = run_chain(
                std::slice::from_ref(&renderer),
                input,
                &self.context(&page.template_path),
            )?;

            let output = PathBuf::from(&page.output_name);
            let bytes = write_file(&staging.join(&output), &content)?;
            debug!(page = %page.logical_name, bytes, "page rendered");
            self.stats.pages.0.fetch_add(1, Ordering::Relaxed);
            self.record(bytes);

            rendered.push(OutputArtifact {
                source: page.template_path,
                output,
                kind: Some(AssetKind::Markup),
                bytes,
            });
        }

        Ok(rendered)
    }
}

fn output_parent(output_root: &Path) -> &Path {
    output_root
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn read_source(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|source| BuildError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Sort by output path and fail on the first path produced twice
fn check_collisions(artifacts: &mut [OutputArtifact]) -> Result<(), BuildError> {
    artifacts.sort_by(|a, b| a.output.cmp(&b.output));
    match artifacts.windows(2).find(|w| w[0].output == w[1].output) {
        Some([first, second]) => Err(BuildError::OutputCollision {
            output: second.output.clone(),
            first: first.source.clone(),
            second: second.source.clone(),
        }),
        _ => Ok(()),
    }
}

/// Replace `output_root` with the staging tree.
///
/// The previous output is moved aside first and restored if the final rename fails.
fn commit(staging: TempDir, output_root: &Path) -> Result<(), BuildError> {
    let commit_failed = |source: io::Error| BuildError::CommitFailed {
        path: output_root.to_path_buf(),
        source,
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staging.path(), fs::Permissions::from_mode(0o755))
            .map_err(commit_failed)?;
    }

    let previous = if fs::symlink_metadata(output_root).is_ok() {
        let trash = tempfile::Builder::new()
            .prefix(".previous-")
            .tempdir_in(output_parent(output_root))
            .map_err(commit_failed)?;
        let aside = trash.path().join("output");
        fs::rename(output_root, &aside).map_err(commit_failed)?;
        Some((trash, aside))
    } else {
        None
    };

    if let Err(e) = fs::rename(staging.path(), output_root) {
        if let Some((trash, aside)) = previous {
            restore_previous(trash, &aside, output_root)?;
        }
        return Err(commit_failed(e));
    }

    // Dropping `previous` deletes the old output; `staging` no longer exists
    drop(previous);
    Ok(())
}

/// Move the previous output at `aside` back to `output_root`.
///
/// If that fails too, `trash` is kept on disk so the old output is never deleted.
fn restore_previous(trash: TempDir, aside: &Path, output_root: &Path) -> Result<(), BuildError> {
    if let Err(source) = fs::rename(aside, output_root) {
        let kept = trash.keep().join(aside.file_name().unwrap_or_default());
        error!(
            output = %output_root.display(),
            kept = %kept.display(),
            "previous output could not be restored"
        );
        return Err(BuildError::RestoreFailed {
            path: output_root.to_path_buf(),
            kept,
            source,
        });
    }
    Ok(())
}

/// Outcome of [`run_build`]
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Sorted by output path
    pub artifacts: Vec<OutputArtifact>,
    pub pages: usize,
    pub removed_placeholders: Vec<PathBuf>,
}

impl BuildReport {
    pub fn total_bytes(&self) -> u64 {
        self.artifacts.iter().map(|a| a.bytes).sum()
    }
}

fn validate_layout(layout: &SiteLayout) -> Result<(), BuildError> {
    if !layout.source_root.is_dir() {
        return Err(BuildError::SourceNotFound {
            path: layout.source_root.clone(),
        });
    }
    if layout.source_root.starts_with(&layout.output_root) {
        return Err(BuildError::OutputOverlapsSource {
            output: layout.output_root.clone(),
            source_root: layout.source_root.clone(),
        });
    }
    Ok(())
}

/// Run one complete build: validation, housekeeping, planning, assembly.
///
/// Page discovery and the asset scan run in parallel once housekeeping is done.
pub fn run_build(
    config: &Config,
    shutdown: &AtomicBool,
    stats: &BuildStats,
    progress: Option<&ProgressBar>,
) -> Result<BuildReport, BuildError> {
    let layout = &config.layout;
    validate_layout(layout)?;

    let removed_placeholders = remove_placeholders(&layout.assets_dir)?;

    let policy = config.policy();
    let router = AssetRouter::standard(&config.external_transformers(), &policy);

    let (pages, items) = rayon::join(
        || discover_pages(&layout.source_root),
        || {
            collect_assets(
                &layout.source_root,
                &layout.assets_dir,
                &layout.output_root,
                &router,
            )
        },
    );
    let plan = BuildPlan::new(pages?, items?);
    info!(
        mode = %policy.mode(),
        pages = plan.pages.len(),
        files = plan.items.len(),
        "build planned"
    );

    if let Some(pb) = progress {
        pb.set_length(plan.len() as u64);
    }

    let artifacts = Assembler::new(layout, policy, shutdown, stats)
        .with_progress(progress)
        .build(&plan)?;

    Ok(BuildReport {
        artifacts,
        pages: plan.pages.len(),
        removed_placeholders,
    })
}
