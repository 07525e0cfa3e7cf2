use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::path::PathFragment;
use super::virtual_fragment::{CallGraphFragment, SkeletonFragment, SummaryType, UsageFragment};
use super::{Fragment, FragmentType, VirtualFragment};
use crate::error::FragmentError;
use crate::file::{ExternalFile, ProjectFile};
use crate::hash::sha256_fields;
use crate::ids::FragmentId;

/// Keys recorded in [`FrozenFragment::meta`] so a snapshot can be revived
/// as its live counterpart.
pub mod meta_key {
    pub const REPO_ROOT: &str = "repo_root";
    pub const REL_PATH: &str = "rel_path";
    pub const ABS_PATH: &str = "abs_path";
    pub const MEDIA_TYPE: &str = "media_type";
    pub const TARGET: &str = "target";
    pub const TARGETS: &str = "targets";
    pub const SUMMARY_TYPE: &str = "summary_type";
    pub const METHOD: &str = "method";
    pub const DEPTH: &str = "depth";
    pub const CALLEES: &str = "callees";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrozenContent {
    Text(String),
    Image { base64: String },
}

/// Everything captured from a live fragment at freeze time.
#[derive(Debug, Clone)]
pub struct FrozenParts {
    pub original_type: FragmentType,
    pub description: String,
    pub short_description: String,
    pub content: FrozenContent,
    pub syntax_style: String,
    pub files: BTreeSet<ProjectFile>,
    pub meta: BTreeMap<String, String>,
    pub mtime_millis: Option<u64>,
}

/// Static stand-in for a dynamic fragment, holding the content it had when
/// captured.
#[derive(Debug, Clone)]
pub struct FrozenFragment {
    id: FragmentId,
    parts: FrozenParts,
    content_hash: String,
}

impl FrozenFragment {
    pub fn new(id: FragmentId, parts: FrozenParts) -> Result<Self, FragmentError> {
        if let FrozenContent::Image { base64 } = &parts.content {
            if base64.is_empty() {
                return Err(FragmentError::EmptyField {
                    field: "image_base64",
                });
            }
            STANDARD
                .decode(base64)
                .map_err(|e| FragmentError::InvalidBase64(e.to_string()))?;
        }
        let content_hash = content_hash(&parts);
        Ok(Self {
            id,
            parts,
            content_hash,
        })
    }

    pub fn id(&self) -> FragmentId {
        self.id
    }

    pub fn original_type(&self) -> FragmentType {
        self.parts.original_type
    }

    pub fn description(&self) -> &str {
        &self.parts.description
    }

    pub fn short_description(&self) -> &str {
        &self.parts.short_description
    }

    pub fn content(&self) -> &FrozenContent {
        &self.parts.content
    }

    pub fn text(&self) -> Option<&str> {
        match &self.parts.content {
            FrozenContent::Text(t) => Some(t),
            FrozenContent::Image { .. } => None,
        }
    }

    pub fn image_bytes(&self) -> Option<Result<Vec<u8>, FragmentError>> {
        match &self.parts.content {
            FrozenContent::Image { base64 } => Some(
                STANDARD
                    .decode(base64)
                    .map_err(|e| FragmentError::InvalidBase64(e.to_string())),
            ),
            FrozenContent::Text(_) => None,
        }
    }

    pub fn syntax_style(&self) -> &str {
        &self.parts.syntax_style
    }

    pub fn files(&self) -> &BTreeSet<ProjectFile> {
        &self.parts.files
    }

    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.parts.meta
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn mtime_millis(&self) -> Option<u64> {
        self.parts.mtime_millis
    }

    pub fn mtime(&self) -> Option<SystemTime> {
        self.parts
            .mtime_millis
            .map(|ms| UNIX_EPOCH + Duration::from_millis(ms))
    }

    fn meta_value(&self, key: &'static str) -> Result<&str, FragmentError> {
        self.parts
            .meta
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or(FragmentError::EmptyField { field: key })
    }

    /// Rebuild the live fragment this snapshot was captured from.
    pub fn unfreeze(&self) -> Result<Fragment, FragmentError> {
        let id = self.id;
        let fragment = match self.parts.original_type {
            FragmentType::ProjectFile => {
                let file = ProjectFile::new(
                    self.meta_value(meta_key::REPO_ROOT)?,
                    self.meta_value(meta_key::REL_PATH)?,
                )?;
                Fragment::Path(PathFragment::project_file(id, file))
            }
            FragmentType::ExternalFile => {
                let file = ExternalFile::new(self.meta_value(meta_key::ABS_PATH)?)?;
                Fragment::Path(PathFragment::external_file(id, file))
            }
            FragmentType::ImageFile => {
                let path = PathBuf::from(self.meta_value(meta_key::ABS_PATH)?);
                let media_type = self.parts.meta.get(meta_key::MEDIA_TYPE).cloned();
                Fragment::Path(PathFragment::image_file(id, path, media_type)?)
            }
            FragmentType::Usage => Fragment::Virtual(VirtualFragment::Usage(UsageFragment::new(
                id,
                self.meta_value(meta_key::TARGET)?,
            )?)),
            FragmentType::Skeleton => {
                let targets = self
                    .meta_value(meta_key::TARGETS)?
                    .lines()
                    .map(str::to_string)
                    .collect();
                let summary_type = SummaryType::parse(self.meta_value(meta_key::SUMMARY_TYPE)?)?;
                Fragment::Virtual(VirtualFragment::Skeleton(SkeletonFragment::new(
                    id,
                    targets,
                    summary_type,
                )?))
            }
            FragmentType::CallGraph => {
                let depth = self
                    .meta_value(meta_key::DEPTH)?
                    .parse::<i64>()
                    .map_err(|_| FragmentError::EmptyField { field: "depth" })?;
                let callees = self.meta_value(meta_key::CALLEES)? == "true";
                Fragment::Virtual(VirtualFragment::CallGraph(CallGraphFragment::new(
                    id,
                    self.meta_value(meta_key::METHOD)?,
                    depth,
                    callees,
                )?))
            }
            other => return Err(FragmentError::WrongFamily(other)),
        };
        Ok(fragment)
    }
}

impl PartialEq for FrozenFragment {
    fn eq(&self, other: &Self) -> bool {
        self.parts.original_type == other.parts.original_type
            && self.content_hash == other.content_hash
    }
}

impl Eq for FrozenFragment {}

fn content_hash(parts: &FrozenParts) -> String {
    let (tag, body): (&[u8], &[u8]) = match &parts.content {
        FrozenContent::Text(t) => (b"text", t.as_bytes()),
        FrozenContent::Image { base64 } => (b"image", base64.as_bytes()),
    };
    let files = parts
        .files
        .iter()
        .map(ProjectFile::display_path)
        .collect::<Vec<_>>()
        .join("\n");
    sha256_fields([
        parts.original_type.as_str().as_bytes(),
        parts.description.as_bytes(),
        files.as_bytes(),
        tag,
        body,
    ])
}

pub(crate) fn millis_since_epoch(t: SystemTime) -> Option<u64> {
    t.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u64::try_from(d.as_millis()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_parts(body: &str) -> FrozenParts {
        let file = ProjectFile::new("/repo", "src/A.java").unwrap();
        FrozenParts {
            original_type: FragmentType::ProjectFile,
            description: "src/A.java".into(),
            short_description: "A.java".into(),
            content: FrozenContent::Text(body.into()),
            syntax_style: "java".into(),
            files: BTreeSet::from([file]),
            meta: BTreeMap::from([
                (meta_key::REPO_ROOT.to_string(), "/repo".to_string()),
                (meta_key::REL_PATH.to_string(), "src/A.java".to_string()),
            ]),
            mtime_millis: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn hash_tracks_content() {
        let a = FrozenFragment::new(FragmentId(1), text_parts("class A {}")).unwrap();
        let b = FrozenFragment::new(FragmentId(2), text_parts("class A {}")).unwrap();
        let c = FrozenFragment::new(FragmentId(3), text_parts("class A { int x; }")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn unfreeze_restores_project_file() {
        let frozen = FrozenFragment::new(FragmentId(9), text_parts("x")).unwrap();
        match frozen.unfreeze().unwrap() {
            Fragment::Path(p) => {
                assert_eq!(p.fragment_type(), FragmentType::ProjectFile);
                assert_eq!(p.id(), FragmentId(9));
                assert_eq!(p.description(), "src/A.java");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn image_content_must_be_base64() {
        let mut parts = text_parts("");
        parts.original_type = FragmentType::ImageFile;
        parts.content = FrozenContent::Image {
            base64: "not base64!!".into(),
        };
        assert!(matches!(
            FrozenFragment::new(FragmentId(1), parts.clone()),
            Err(FragmentError::InvalidBase64(_))
        ));
        parts.content = FrozenContent::Image {
            base64: STANDARD.encode([0x89, b'P', b'N', b'G']),
        };
        let frozen = FrozenFragment::new(FragmentId(1), parts).unwrap();
        assert_eq!(frozen.image_bytes().unwrap().unwrap()[1], b'P');
    }
}
