//! Records returned by the metadata store, and what a lookup extracts from
//! them.

use serde::{Deserialize, Serialize};

/// Rendered in place of any value the store didn't have.
pub const NOT_AVAILABLE: &str = "N/A";

pub const PROPERTY_BUILD_NAME: &str = "build.name";
pub const PROPERTY_BUILD_NUMBER: &str = "build.number";
pub const PROPERTY_VCS_URL: &str = "vcs.url";
pub const PROPERTY_VCS_REVISION: &str = "vcs.revision";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: String,
}

/// One item found by the store, identified by the content hash of the
/// artifact it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(rename = "actual_sha1")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}
impl MetadataRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            repo: None,
            path: None,
            name: None,
            properties: Vec::new(),
        }
    }

    pub fn in_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(Property { key: key.into(), value: value.into() });
        self
    }

    /// Value of the last property named `key`.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.iter().rev().find(|p| p.key == key).map(|p| p.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vcs {
    pub url: Option<String>,
    pub revision: Option<String>,
}
impl Vcs {
    /// Link to the revision when both are known, the bare URL otherwise.
    ///
    /// ```
    /// use depinfo_lookup::models::Vcs;
    ///
    /// let vcs = Vcs { url: Some("https://git.example.com/app.git".into()), revision: Some("248".into()) };
    /// assert_eq!(vcs.label(), "https://git.example.com/app/commit/248");
    /// assert_eq!(Vcs::default().label(), "N/A");
    /// ```
    pub fn label(&self) -> String {
        match (self.url.as_deref(), self.revision.as_deref()) {
            (Some(url), Some(revision)) => format!("{}/commit/{revision}", url.strip_suffix(".git").unwrap_or(url)),
            (Some(url), None) => url.to_string(),
            (None, _) => NOT_AVAILABLE.to_string(),
        }
    }
}

/// Build and VCS details of one dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyProps {
    /// `<build name>/<build number>` of the build that published it.
    pub build: Option<String>,
    pub vcs: Vcs,
}
impl DependencyProps {
    /// Pick out the build and VCS properties. Unrelated properties, and
    /// properties with an empty value, are ignored. When a property repeats,
    /// the last value is used.
    pub fn from_properties<'a>(properties: impl IntoIterator<Item = &'a Property>) -> Self {
        let (mut name, mut number, mut url, mut revision) = (None, None, None, None);
        for property in properties {
            if property.value.is_empty() {
                continue;
            }
            let slot = match property.key.as_str() {
                PROPERTY_BUILD_NAME => &mut name,
                PROPERTY_BUILD_NUMBER => &mut number,
                PROPERTY_VCS_URL => &mut url,
                PROPERTY_VCS_REVISION => &mut revision,
                _ => continue,
            };
            *slot = Some(property.value.as_str());
        }
        let build = match (name, number) {
            (None, None) => None,
            (name, number) => Some(format!(
                "{}{}",
                name.map(|n| format!("{n}/")).unwrap_or_default(),
                number.unwrap_or_default()
            )),
        };
        Self {
            build,
            vcs: Vcs { url: url.map(str::to_string), revision: revision.map(str::to_string) },
        }
    }

    pub fn build_label(&self) -> &str {
        self.build.as_deref().unwrap_or(NOT_AVAILABLE)
    }
}
