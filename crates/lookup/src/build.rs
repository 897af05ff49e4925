//! Build-info documents, as published by CI for every build.
//!
//! Only the parts needed to find a build's dependencies are modelled; any
//! other field in the document is ignored when deserializing.

use crate::keys::ContentKeyed;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub name: String,
    pub number: String,
    #[serde(default)]
    pub modules: Vec<Module>,
}
impl BuildInfo {
    /// `<name>/<number>`, the way builds are referred to.
    pub fn label(&self) -> String {
        format!("{}/{}", self.name, self.number)
    }

    /// Dependencies of every module, in document order.
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.modules.iter().flat_map(|m| &m.dependencies)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
}
impl ContentKeyed for Dependency {
    fn content_key(&self) -> Option<&str> {
        self.sha1.as_deref().filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::collect;

    const DOCUMENT: &str = r#"{
        "version": "1.0.1",
        "name": "my-build",
        "number": "42",
        "started": "2024-01-01T00:00:00.000+0000",
        "modules": [
            {
                "id": "org:app:1.0",
                "artifacts": [{"name": "app.jar", "sha1": "123"}],
                "dependencies": [
                    {"id": "org:lib:2.1", "type": "jar", "sha1": "456", "md5": "x"},
                    {"id": "org:util:0.3", "sha1": "789"}
                ]
            },
            {"id": "org:docs:1.0"},
            {"id": "org:cli:1.0", "dependencies": [{"id": "org:lib:2.1", "sha1": "456"}, {"id": "unresolved"}]}
        ]
    }"#;

    #[test]
    fn test_parse_document() {
        let build: BuildInfo = serde_json::from_str(DOCUMENT).unwrap();
        assert_eq!(build.label(), "my-build/42");
        assert_eq!(build.modules.len(), 3);
        assert!(build.modules[1].dependencies.is_empty());
        assert_eq!(build.modules[0].dependencies[0].kind.as_deref(), Some("jar"));
        assert_eq!(build.dependencies().count(), 4);
    }

    #[test]
    fn test_dependency_keys() {
        let build: BuildInfo = serde_json::from_str(DOCUMENT).unwrap();
        let (keys, results) = collect(build.dependencies());
        assert_eq!(keys.as_slice(), ["456", "789"]);
        assert_eq!(results.len(), 2);
    }
}
