use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FragmentError;
use crate::file::ProjectFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeUnitKind {
    Class,
    Function,
    Field,
    Module,
}

impl CodeUnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Function => "function",
            Self::Field => "field",
            Self::Module => "module",
        }
    }

    pub fn parse(s: &str) -> Result<Self, FragmentError> {
        match s.to_ascii_lowercase().as_str() {
            "class" => Ok(Self::Class),
            "function" => Ok(Self::Function),
            "field" => Ok(Self::Field),
            "module" => Ok(Self::Module),
            _ => Err(FragmentError::UnknownKind(s.to_string())),
        }
    }
}

/// A named declaration (class, function, field, module) within a project file.
///
/// Nested classes use `$` in `short_name`, e.g. `Outer$Inner`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodeUnit {
    source: ProjectFile,
    kind: CodeUnitKind,
    package_name: String,
    short_name: String,
}

impl CodeUnit {
    pub fn new(
        source: ProjectFile,
        kind: CodeUnitKind,
        package_name: impl Into<String>,
        short_name: impl Into<String>,
    ) -> Result<Self, FragmentError> {
        let short_name = short_name.into();
        if short_name.is_empty() {
            return Err(FragmentError::EmptyField { field: "short_name" });
        }
        Ok(Self {
            source,
            kind,
            package_name: package_name.into(),
            short_name,
        })
    }

    pub fn source(&self) -> &ProjectFile {
        &self.source
    }

    pub fn kind(&self) -> CodeUnitKind {
        self.kind
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn is_class(&self) -> bool {
        self.kind == CodeUnitKind::Class
    }

    pub fn fq_name(&self) -> String {
        if self.package_name.is_empty() {
            self.short_name.clone()
        } else {
            format!("{}.{}", self.package_name, self.short_name)
        }
    }

    /// Last segment of the short name: `Outer$Inner.run` yields `run`.
    pub fn identifier(&self) -> &str {
        self.short_name
            .rsplit(['.', '$'])
            .next()
            .unwrap_or(&self.short_name)
    }
}

impl fmt::Display for CodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fq_name())
    }
}

/// Fully-qualified name of the outermost enclosing class for a nested name:
/// `pkg.Outer$Inner` becomes `pkg.Outer`. Names without `$` are returned as-is.
pub fn top_level_name(fq_name: &str) -> &str {
    match fq_name.split_once('$') {
        Some((outer, _)) => outer,
        None => fq_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pf() -> ProjectFile {
        ProjectFile::new("/repo", "src/A.java").unwrap()
    }

    #[test]
    fn fq_name_joins_package() {
        let cu = CodeUnit::new(pf(), CodeUnitKind::Class, "com.example", "A").unwrap();
        assert_eq!(cu.fq_name(), "com.example.A");
        let bare = CodeUnit::new(pf(), CodeUnitKind::Class, "", "A").unwrap();
        assert_eq!(bare.fq_name(), "A");
    }

    #[test]
    fn identifier_is_last_segment() {
        let cu = CodeUnit::new(pf(), CodeUnitKind::Function, "p", "Outer$Inner.run").unwrap();
        assert_eq!(cu.identifier(), "run");
    }

    #[test]
    fn top_level_name_strips_nested_suffix() {
        assert_eq!(top_level_name("p.Outer$Inner$Deep"), "p.Outer");
        assert_eq!(top_level_name("p.Plain"), "p.Plain");
    }

    #[test]
    fn empty_short_name_is_rejected() {
        assert!(CodeUnit::new(pf(), CodeUnitKind::Class, "p", "").is_err());
    }

    #[test]
    fn kind_parse_round_trips_names() {
        for kind in [
            CodeUnitKind::Class,
            CodeUnitKind::Function,
            CodeUnitKind::Field,
            CodeUnitKind::Module,
        ] {
            assert_eq!(CodeUnitKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(CodeUnitKind::parse("trait").is_err());
    }
}
