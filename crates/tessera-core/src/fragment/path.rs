use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::frozen::FrozenFragment;
use super::FragmentType;
use crate::error::FragmentError;
use crate::file::{file_name_of, require_absolute, syntax_style_for, ExternalFile, ProjectFile};
use crate::ids::FragmentId;

/// A fragment backed by a file location.
///
/// Two path fragments are equal when they point at the same location,
/// regardless of id.
#[derive(Debug, Clone)]
pub enum PathFragment {
    ProjectFile(ProjectFileFragment),
    ExternalFile(ExternalFileFragment),
    ImageFile(ImageFileFragment),
    GitFile(GitFileFragment),
    Frozen(FrozenFragment),
}

#[derive(Debug, Clone)]
pub struct ProjectFileFragment {
    pub(crate) id: FragmentId,
    pub(crate) file: ProjectFile,
}

#[derive(Debug, Clone)]
pub struct ExternalFileFragment {
    pub(crate) id: FragmentId,
    pub(crate) file: ExternalFile,
}

#[derive(Debug, Clone)]
pub struct ImageFileFragment {
    pub(crate) id: FragmentId,
    pub(crate) path: PathBuf,
    pub(crate) media_type: Option<String>,
}

impl ImageFileFragment {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }
}

/// A file's content at a specific revision. Never changes once built.
#[derive(Debug, Clone)]
pub struct GitFileFragment {
    pub(crate) id: FragmentId,
    pub(crate) file: ProjectFile,
    pub(crate) revision: String,
    pub(crate) content: String,
}

impl GitFileFragment {
    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    fn short_revision(&self) -> &str {
        let end = self
            .revision
            .char_indices()
            .nth(7)
            .map_or(self.revision.len(), |(i, _)| i);
        &self.revision[..end]
    }
}

#[derive(PartialEq, Eq)]
enum Location<'a> {
    Project(&'a ProjectFile),
    External(&'a Path),
    Image(&'a Path),
    Git(&'a ProjectFile, &'a str),
    Frozen(&'a FrozenFragment),
}

impl PathFragment {
    pub fn project_file(id: FragmentId, file: ProjectFile) -> Self {
        Self::ProjectFile(ProjectFileFragment { id, file })
    }

    pub fn external_file(id: FragmentId, file: ExternalFile) -> Self {
        Self::ExternalFile(ExternalFileFragment { id, file })
    }

    pub fn image_file(
        id: FragmentId,
        path: impl Into<PathBuf>,
        media_type: Option<String>,
    ) -> Result<Self, FragmentError> {
        let path = path.into();
        require_absolute("abs_path", &path)?;
        Ok(Self::ImageFile(ImageFileFragment {
            id,
            path,
            media_type,
        }))
    }

    pub fn git_file(
        id: FragmentId,
        file: ProjectFile,
        revision: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, FragmentError> {
        let revision = revision.into();
        if revision.is_empty() {
            return Err(FragmentError::EmptyField { field: "revision" });
        }
        Ok(Self::GitFile(GitFileFragment {
            id,
            file,
            revision,
            content: content.into(),
        }))
    }

    pub fn id(&self) -> FragmentId {
        match self {
            Self::ProjectFile(f) => f.id,
            Self::ExternalFile(f) => f.id,
            Self::ImageFile(f) => f.id,
            Self::GitFile(f) => f.id,
            Self::Frozen(f) => f.id(),
        }
    }

    /// Type of the fragment, or of the live fragment a frozen one captured.
    pub fn fragment_type(&self) -> FragmentType {
        match self {
            Self::ProjectFile(_) => FragmentType::ProjectFile,
            Self::ExternalFile(_) => FragmentType::ExternalFile,
            Self::ImageFile(_) => FragmentType::ImageFile,
            Self::GitFile(_) => FragmentType::GitFile,
            Self::Frozen(f) => f.original_type(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::ProjectFile(f) => f.file.display_path(),
            Self::ExternalFile(f) => f.file.abs_path().display().to_string(),
            Self::ImageFile(f) => f.path.display().to_string(),
            Self::GitFile(f) => format!("{} @ {}", f.file.display_path(), f.short_revision()),
            Self::Frozen(f) => f.description().to_string(),
        }
    }

    pub fn short_description(&self) -> String {
        match self {
            Self::ProjectFile(f) => f.file.file_name(),
            Self::ExternalFile(f) => f.file.file_name(),
            Self::ImageFile(f) => file_name_of(&f.path),
            Self::GitFile(f) => format!("{} @ {}", f.file.file_name(), f.short_revision()),
            Self::Frozen(f) => f.short_description().to_string(),
        }
    }

    /// Content is read live from disk and may change between reads.
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            Self::ProjectFile(_) | Self::ExternalFile(_) | Self::ImageFile(_)
        )
    }

    pub fn is_text(&self) -> bool {
        match self {
            Self::ImageFile(_) => false,
            Self::Frozen(f) => f.text().is_some(),
            _ => true,
        }
    }

    /// The project file behind this fragment, if it has one.
    pub fn as_project_file(&self) -> Option<&ProjectFile> {
        match self {
            Self::ProjectFile(f) => Some(&f.file),
            Self::GitFile(f) => Some(&f.file),
            _ => None,
        }
    }

    pub fn files(&self) -> BTreeSet<ProjectFile> {
        match self {
            Self::ProjectFile(f) => BTreeSet::from([f.file.clone()]),
            Self::GitFile(f) => BTreeSet::from([f.file.clone()]),
            Self::Frozen(f) => f.files().clone(),
            Self::ExternalFile(_) | Self::ImageFile(_) => BTreeSet::new(),
        }
    }

    pub fn syntax_style(&self) -> String {
        match self {
            Self::ProjectFile(f) => syntax_style_for(f.file.rel_path()).to_string(),
            Self::ExternalFile(f) => syntax_style_for(f.file.abs_path()).to_string(),
            Self::GitFile(f) => syntax_style_for(f.file.rel_path()).to_string(),
            Self::ImageFile(_) => "none".to_string(),
            Self::Frozen(f) => f.syntax_style().to_string(),
        }
    }

    pub fn mtime(&self) -> io::Result<SystemTime> {
        match self {
            Self::ProjectFile(f) => f.file.mtime(),
            Self::ExternalFile(f) => f.file.mtime(),
            Self::ImageFile(f) => std::fs::metadata(&f.path)?.modified(),
            Self::GitFile(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "git revisions carry no modification time",
            )),
            Self::Frozen(f) => f.mtime().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "snapshot has no modification time")
            }),
        }
    }

    fn location(&self) -> Location<'_> {
        match self {
            Self::ProjectFile(f) => Location::Project(&f.file),
            Self::ExternalFile(f) => Location::External(f.file.abs_path()),
            Self::ImageFile(f) => Location::Image(&f.path),
            Self::GitFile(f) => Location::Git(&f.file, &f.revision),
            Self::Frozen(f) => Location::Frozen(f),
        }
    }
}

impl PartialEq for PathFragment {
    fn eq(&self, other: &Self) -> bool {
        self.location() == other.location()
    }
}

impl Eq for PathFragment {}

#[cfg(test)]
mod tests {
    use super::*;

    fn pf(rel: &str) -> ProjectFile {
        ProjectFile::new("/repo", rel).unwrap()
    }

    #[test]
    fn equality_is_by_location_not_id() {
        let a = PathFragment::project_file(FragmentId(1), pf("src/A.java"));
        let b = PathFragment::project_file(FragmentId(2), pf("src/A.java"));
        let c = PathFragment::project_file(FragmentId(1), pf("src/B.java"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn git_file_differs_from_live_file_and_other_revisions() {
        let live = PathFragment::project_file(FragmentId(1), pf("A.java"));
        let v1 = PathFragment::git_file(FragmentId(2), pf("A.java"), "abc123456789", "x").unwrap();
        let v2 = PathFragment::git_file(FragmentId(3), pf("A.java"), "def", "x").unwrap();
        assert_ne!(live, v1);
        assert_ne!(v1, v2);
        assert_eq!(v1.description(), "A.java @ abc1234");
        assert!(!v1.is_dynamic());
        assert!(live.is_dynamic());
    }

    #[test]
    fn git_file_requires_revision() {
        assert_eq!(
            PathFragment::git_file(FragmentId(1), pf("A.java"), "", "x").unwrap_err(),
            FragmentError::EmptyField { field: "revision" }
        );
    }

    #[test]
    fn image_requires_absolute_path() {
        assert!(PathFragment::image_file(FragmentId(1), "shot.png", None).is_err());
        let img =
            PathFragment::image_file(FragmentId(1), "/tmp/shot.png", Some("image/png".into()))
                .unwrap();
        assert_eq!(img.short_description(), "shot.png");
        assert!(!img.is_text());
        assert!(img.files().is_empty());
    }
}
