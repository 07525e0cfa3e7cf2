//! Freezing: replacing dynamic fragments with static snapshots of their
//! current content so a context can be stored and replayed.

use std::collections::{BTreeMap, BTreeSet};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::capability::Analyzer;
use crate::context::Context;
use crate::fragment::{
    meta_key, millis_since_epoch, Fragment, FrozenContent, FrozenFragment, FrozenParts,
    PathFragment, SkeletonFragment, VirtualFragment,
};

/// A frozen context plus the dynamic fragments that could not be captured.
#[derive(Debug)]
pub struct FreezeOutcome {
    pub context: Context,
    pub unresolved: Vec<Fragment>,
}

impl Context {
    /// Same id with every dynamic fragment replaced by a frozen snapshot.
    /// Fragments that cannot be captured stay live and are reported.
    pub fn freeze(&self) -> FreezeOutcome {
        if self.is_frozen() {
            return FreezeOutcome {
                context: self.clone(),
                unresolved: Vec::new(),
            };
        }
        let analyzer = self.manager().analyzer();
        let mut unresolved = Vec::new();

        let mut freeze_paths = |list: &[PathFragment]| -> Vec<PathFragment> {
            list.iter()
                .map(|p| {
                    if !p.is_dynamic() {
                        return p.clone();
                    }
                    match capture_path(p) {
                        Some(frozen) => PathFragment::Frozen(frozen),
                        None => {
                            unresolved.push(Fragment::Path(p.clone()));
                            p.clone()
                        }
                    }
                })
                .collect()
        };
        let editable = freeze_paths(self.editable_files());
        let readonly = freeze_paths(self.readonly_files());

        let virtuals = self
            .virtual_fragments()
            .iter()
            .map(|v| {
                if !v.is_dynamic() {
                    return v.clone();
                }
                match capture_virtual(v, analyzer.as_ref()) {
                    Some(frozen) => VirtualFragment::Frozen(frozen),
                    None => {
                        unresolved.push(Fragment::Virtual(v.clone()));
                        v.clone()
                    }
                }
            })
            .collect();

        if !unresolved.is_empty() {
            tracing::debug!(
                context = %self.id(),
                unresolved = unresolved.len(),
                "some fragments could not be frozen"
            );
        }
        FreezeOutcome {
            context: self.with_lists_same_id(editable, readonly, virtuals),
            unresolved,
        }
    }

    /// Freeze, dropping whatever could not be captured. The result is always
    /// frozen and keeps this context's id.
    pub fn freeze_and_cleanup(&self) -> Context {
        let FreezeOutcome {
            context,
            unresolved,
        } = self.freeze();
        if unresolved.is_empty() {
            return context;
        }
        for f in &unresolved {
            tracing::warn!(
                context = %context.id(),
                fragment = %f.description(),
                "dropping fragment that could not be frozen"
            );
        }
        let editable = context
            .editable_files()
            .iter()
            .filter(|p| !p.is_dynamic())
            .cloned()
            .collect();
        let readonly = context
            .readonly_files()
            .iter()
            .filter(|p| !p.is_dynamic())
            .cloned()
            .collect();
        let virtuals = context
            .virtual_fragments()
            .iter()
            .filter(|v| !v.is_dynamic())
            .cloned()
            .collect();
        context.with_lists_same_id(editable, readonly, virtuals)
    }

    /// Same id with frozen fragments revived as live ones where possible.
    pub fn unfreeze(&self) -> Context {
        let thaw_path = |p: &PathFragment| match p {
            PathFragment::Frozen(f) => match f.unfreeze() {
                Ok(Fragment::Path(live)) => live,
                Ok(Fragment::Virtual(_)) | Err(_) => p.clone(),
            },
            _ => p.clone(),
        };
        let editable = self.editable_files().iter().map(thaw_path).collect();
        let readonly = self.readonly_files().iter().map(thaw_path).collect();
        let virtuals = self
            .virtual_fragments()
            .iter()
            .map(|v| match v {
                VirtualFragment::Frozen(f) => match f.unfreeze() {
                    Ok(Fragment::Virtual(live)) => live,
                    Ok(Fragment::Path(_)) | Err(_) => v.clone(),
                },
                _ => v.clone(),
            })
            .collect();
        self.with_lists_same_id(editable, readonly, virtuals)
    }
}

fn capture_path(p: &PathFragment) -> Option<FrozenFragment> {
    let (content, meta) = match p {
        PathFragment::ProjectFile(f) => {
            let text = read_or_warn(f.file.read_to_string(), &p.description())?;
            let meta = BTreeMap::from([
                (meta_key::REPO_ROOT.to_string(), f.file.root().display().to_string()),
                (meta_key::REL_PATH.to_string(), f.file.display_path()),
            ]);
            (FrozenContent::Text(text), meta)
        }
        PathFragment::ExternalFile(f) => {
            let text = read_or_warn(f.file.read_to_string(), &p.description())?;
            let meta = BTreeMap::from([(
                meta_key::ABS_PATH.to_string(),
                f.file.abs_path().display().to_string(),
            )]);
            (FrozenContent::Text(text), meta)
        }
        PathFragment::ImageFile(f) => {
            let bytes = read_or_warn(std::fs::read(f.path()), &p.description())?;
            let mut meta = BTreeMap::from([(
                meta_key::ABS_PATH.to_string(),
                f.path().display().to_string(),
            )]);
            if let Some(media_type) = f.media_type() {
                meta.insert(meta_key::MEDIA_TYPE.to_string(), media_type.to_string());
            }
            (
                FrozenContent::Image {
                    base64: STANDARD.encode(bytes),
                },
                meta,
            )
        }
        PathFragment::GitFile(_) | PathFragment::Frozen(_) => return None,
    };
    let parts = FrozenParts {
        original_type: p.fragment_type(),
        description: p.description(),
        short_description: p.short_description(),
        content,
        syntax_style: p.syntax_style(),
        files: p.files(),
        meta,
        mtime_millis: p.mtime().ok().and_then(millis_since_epoch),
    };
    FrozenFragment::new(p.id(), parts).ok()
}

fn capture_virtual(v: &VirtualFragment, analyzer: &dyn Analyzer) -> Option<FrozenFragment> {
    let (text, meta) = match v {
        VirtualFragment::Skeleton(f) => {
            let rendered = render_skeleton(f, analyzer)?;
            let meta = BTreeMap::from([
                (meta_key::TARGETS.to_string(), f.targets().join("\n")),
                (
                    meta_key::SUMMARY_TYPE.to_string(),
                    f.summary_type().as_str().to_string(),
                ),
            ]);
            (rendered, meta)
        }
        VirtualFragment::Usage(f) => {
            let rendered = analyzer.usages(f.target())?;
            let meta = BTreeMap::from([(meta_key::TARGET.to_string(), f.target().to_string())]);
            (rendered, meta)
        }
        VirtualFragment::CallGraph(f) => {
            let rendered =
                analyzer.call_graph(f.method_name(), f.depth(), f.is_callee_graph())?;
            let meta = BTreeMap::from([
                (meta_key::METHOD.to_string(), f.method_name().to_string()),
                (meta_key::DEPTH.to_string(), f.depth().to_string()),
                (meta_key::CALLEES.to_string(), f.is_callee_graph().to_string()),
            ]);
            (rendered, meta)
        }
        _ => return None,
    };
    let fragment = Fragment::Virtual(v.clone());
    let parts = FrozenParts {
        original_type: v.fragment_type(),
        description: v.description(),
        short_description: v.short_description(),
        content: FrozenContent::Text(text),
        syntax_style: "none".to_string(),
        files: fragment.files(analyzer),
        meta,
        mtime_millis: None,
    };
    FrozenFragment::new(v.id(), parts).ok()
}

fn render_skeleton(f: &SkeletonFragment, analyzer: &dyn Analyzer) -> Option<String> {
    let fq_names: BTreeSet<String> = match f.summary_type() {
        crate::fragment::SummaryType::CodeUnitSkeleton => f.targets().iter().cloned().collect(),
        crate::fragment::SummaryType::FileSkeletons => analyzer
            .all_declarations()
            .into_iter()
            .filter(|cu| cu.is_class() && f.targets().contains(&cu.source().display_path()))
            .map(|cu| cu.fq_name())
            .collect(),
    };
    let rendered: Vec<String> = fq_names
        .iter()
        .filter_map(|name| analyzer.skeleton(name))
        .collect();
    if rendered.is_empty() {
        return None;
    }
    Some(rendered.join("\n\n"))
}

fn read_or_warn<T>(result: std::io::Result<T>, what: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(fragment = %what, error = %e, "cannot read fragment content");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capability::{ContextManager, OfflineManager};
    use crate::file::ProjectFile;
    use crate::fragment::{FragmentType, UsageFragment};

    #[test]
    fn freeze_captures_file_content_and_keeps_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        let manager: Arc<dyn ContextManager> = Arc::new(OfflineManager::new(dir.path()));
        let file = ProjectFile::new(dir.path(), "A.java").unwrap();
        let id = manager.ids().next_fragment_id();
        let ctx = Context::new(Arc::clone(&manager))
            .add_editable_files([PathFragment::project_file(id, file)]);
        assert!(!ctx.is_frozen());

        let outcome = ctx.freeze();
        assert!(outcome.unresolved.is_empty());
        let frozen = outcome.context;
        assert_eq!(frozen.id(), ctx.id());
        assert!(frozen.is_frozen());
        match &frozen.editable_files()[0] {
            PathFragment::Frozen(f) => {
                assert_eq!(f.text(), Some("class A {}"));
                assert_eq!(f.original_type(), FragmentType::ProjectFile);
                assert_eq!(f.id(), id);
            }
            other => panic!("expected frozen, got {other:?}"),
        }

        // freezing a frozen context is the identity
        assert!(frozen.freeze().context.is_same_snapshot(&frozen));

        let thawed = frozen.unfreeze();
        assert!(!thawed.is_frozen());
        assert_eq!(thawed.editable_files()[0], ctx.editable_files()[0]);
    }

    #[test]
    fn cleanup_drops_unresolvable_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let manager: Arc<dyn ContextManager> = Arc::new(OfflineManager::new(dir.path()));
        let missing = ProjectFile::new(dir.path(), "gone.rs").unwrap();
        let usage = UsageFragment::new(manager.ids().next_fragment_id(), "p.A.run").unwrap();
        let ctx = Context::new(Arc::clone(&manager))
            .add_readonly_files([PathFragment::project_file(
                manager.ids().next_fragment_id(),
                missing,
            )])
            .add_virtual_fragment(VirtualFragment::Usage(usage));

        let outcome = ctx.freeze();
        assert_eq!(outcome.unresolved.len(), 2);
        assert!(!outcome.context.is_frozen());

        let cleaned = ctx.freeze_and_cleanup();
        assert!(cleaned.is_frozen());
        assert_eq!(cleaned.id(), ctx.id());
        assert!(cleaned.is_empty());
    }
}
