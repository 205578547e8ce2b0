use std::path::PathBuf;
use thiserror::Error;

/// Build error types
///
/// Every variant is fatal: the build stops and the previous output tree is left untouched.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Source directory not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Source directory is not readable: {path}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output directory {output} would replace the source directory {source_root}")]
    OutputOverlapsSource {
        output: PathBuf,
        source_root: PathBuf,
    },

    #[error("Failed to remove placeholder file: {path}")]
    Housekeeping {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{transformer} failed for {path}")]
    Transform {
        path: PathBuf,
        transformer: String,
        #[source]
        source: TransformFailure,
    },

    #[error("Both {first} and {second} produce {output}")]
    OutputCollision {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("No space left on device for {path}")]
    DiskFull { path: PathBuf },

    #[error("Failed to read {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy {src} to {dst}")]
    CopyFailed {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory: {path}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move the finished build into {path}")]
    CommitFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to restore the previous output to {path}; it was kept at {kept}")]
    RestoreFailed {
        path: PathBuf,
        kept: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build cancelled")]
    Cancelled,
}

/// Why a single transformer rejected its input
#[derive(Error, Debug)]
pub enum TransformFailure {
    #[error("failed to run `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with code {code}: {stderr}")]
    Command {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("{0}")]
    Syntax(String),

    #[error("import cycle through {0}")]
    ImportCycle(PathBuf),

    #[error("cannot resolve `{name}` from {from}")]
    Unresolved { name: String, from: PathBuf },

    #[error("input is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid SVG")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid image data")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
