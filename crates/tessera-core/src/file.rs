use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::FragmentError;

/// A file addressed relative to a project root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectFile {
    root: PathBuf,
    rel_path: PathBuf,
}

impl ProjectFile {
    pub fn new(
        root: impl Into<PathBuf>,
        rel_path: impl Into<PathBuf>,
    ) -> Result<Self, FragmentError> {
        let root = root.into();
        let rel_path = rel_path.into();
        if root.as_os_str().is_empty() {
            return Err(FragmentError::EmptyField { field: "repo_root" });
        }
        if rel_path.as_os_str().is_empty() {
            return Err(FragmentError::EmptyField { field: "rel_path" });
        }
        if rel_path.is_absolute() {
            return Err(FragmentError::NotRelative {
                field: "rel_path",
                path: rel_path.display().to_string(),
            });
        }
        Ok(Self { root, rel_path })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }

    pub fn abs_path(&self) -> PathBuf {
        self.root.join(&self.rel_path)
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.rel_path)
    }

    /// Relative path with forward slashes, used for display and ordering ties.
    pub fn display_path(&self) -> String {
        self.rel_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn exists(&self) -> bool {
        self.abs_path().is_file()
    }

    pub fn mtime(&self) -> io::Result<SystemTime> {
        std::fs::metadata(self.abs_path())?.modified()
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        std::fs::read_to_string(self.abs_path())
    }
}

impl fmt::Display for ProjectFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_path())
    }
}

/// A file outside any project, addressed by absolute path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExternalFile {
    abs_path: PathBuf,
}

impl ExternalFile {
    pub fn new(abs_path: impl Into<PathBuf>) -> Result<Self, FragmentError> {
        let abs_path = abs_path.into();
        require_absolute("abs_path", &abs_path)?;
        Ok(Self { abs_path })
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    pub fn file_name(&self) -> String {
        file_name_of(&self.abs_path)
    }

    pub fn mtime(&self) -> io::Result<SystemTime> {
        std::fs::metadata(&self.abs_path)?.modified()
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        std::fs::read_to_string(&self.abs_path)
    }
}

pub(crate) fn require_absolute(field: &'static str, path: &Path) -> Result<(), FragmentError> {
    if path.as_os_str().is_empty() {
        return Err(FragmentError::EmptyField { field });
    }
    if !path.is_absolute() {
        return Err(FragmentError::NotAbsolute {
            field,
            path: path.display().to_string(),
        });
    }
    Ok(())
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Syntax-highlighting hint derived from a file extension.
pub fn syntax_style_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "rs" => "rust",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" => "cpp",
        "md" => "markdown",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "xml" => "xml",
        "sh" => "bash",
        _ => "none",
    }
}
