use crate::error::{BootError, Result};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashMap;

/// The parts of a Maven POM needed to follow runtime dependencies.
#[derive(Debug, Deserialize)]
pub struct Pom {
    #[serde(rename = "groupId")]
    group_id: Option<String>,
    #[serde(rename = "artifactId")]
    artifact_id: Option<String>,
    version: Option<String>,
    packaging: Option<String>,
    parent: Option<PomParent>,
    #[serde(default)]
    properties: HashMap<String, String>,
    dependencies: Option<PomDependencies>,
}

#[derive(Debug, Deserialize)]
struct PomParent {
    #[serde(rename = "groupId")]
    group_id: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PomDependencies {
    #[serde(default)]
    dependency: Vec<PomDependency>,
}

#[derive(Debug, Deserialize)]
struct PomDependency {
    #[serde(rename = "groupId")]
    group_id: String,
    #[serde(rename = "artifactId")]
    artifact_id: String,
    version: Option<String>,
    scope: Option<String>,
    optional: Option<String>,
}

/// A dependency declared by a POM, with properties already expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

/// Result of reading the runtime dependencies of a POM.
#[derive(Debug, Default)]
pub struct RuntimeDependencies {
    pub dependencies: Vec<DeclaredDependency>,
    /// Human-readable reasons for declarations that could not be followed.
    pub skipped: Vec<String>,
}

impl Pom {
    pub fn parse(text: &str) -> Result<Self> {
        from_str(text).map_err(|e| BootError::Metadata(format!("Failed to parse POM: {e}")))
    }

    pub fn packaging(&self) -> &str {
        self.packaging.as_deref().unwrap_or("jar")
    }

    /// Whether the module publishes a jar next to its POM.
    pub fn has_jar(&self) -> bool {
        !matches!(self.packaging(), "pom")
    }

    fn project_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.version.as_deref()))
    }

    fn project_group(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.group_id.as_deref()))
    }

    /// Compile and runtime scoped, non-optional dependencies.
    pub fn runtime_dependencies(&self) -> RuntimeDependencies {
        let mut result = RuntimeDependencies::default();
        let Some(declared) = &self.dependencies else {
            return result;
        };

        for dep in &declared.dependency {
            let scope = dep.scope.as_deref().unwrap_or("compile");
            if !matches!(scope, "compile" | "runtime") {
                continue;
            }
            if dep.optional.as_deref().map(str::trim) == Some("true") {
                continue;
            }

            let name = format!("{}:{}", dep.group_id, dep.artifact_id);
            let Some(raw_version) = dep.version.as_deref() else {
                result
                    .skipped
                    .push(format!("{name}: version is managed by a parent POM"));
                continue;
            };

            let group = self.interpolate(&dep.group_id);
            let version = self.interpolate(raw_version);
            match (group, version) {
                (Some(group), Some(version)) if !is_range(&version) => {
                    result.dependencies.push(DeclaredDependency {
                        group,
                        artifact: dep.artifact_id.clone(),
                        version,
                    })
                }
                (_, Some(version)) if is_range(&version) => result
                    .skipped
                    .push(format!("{name}: version range '{version}' is not supported")),
                _ => result
                    .skipped
                    .push(format!("{name}: unresolved property in '{raw_version}'")),
            }
        }
        result
    }

    /// Expands `${...}` references; `None` if any reference is unknown.
    fn interpolate(&self, value: &str) -> Option<String> {
        let mut out = String::with_capacity(value.len());
        let mut rest = value.trim();
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let end = rest[start..].find('}')? + start;
            let key = &rest[start + 2..end];
            out.push_str(self.property(key)?);
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        Some(out)
    }

    fn property(&self, key: &str) -> Option<&str> {
        match key {
            "project.version" | "pom.version" | "version" => self.project_version(),
            "project.groupId" | "pom.groupId" | "groupId" => self.project_group(),
            "project.artifactId" | "artifactId" => self.artifact_id.as_deref(),
            "project.parent.version" => self.parent.as_ref()?.version.as_deref(),
            _ => self.properties.get(key).map(String::as_str),
        }
    }
}

fn is_range(version: &str) -> bool {
    version.starts_with('[') || version.starts_with('(')
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPILER_POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.scala-lang</groupId>
  <artifactId>scala-compiler</artifactId>
  <packaging>jar</packaging>
  <version>2.8.1</version>
  <properties>
    <jline.version>0.9.94</jline.version>
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.scala-lang</groupId>
      <artifactId>scala-library</artifactId>
      <version>${project.version}</version>
    </dependency>
    <dependency>
      <groupId>jline</groupId>
      <artifactId>jline</artifactId>
      <version>${jline.version}</version>
      <scope>runtime</scope>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>4.8</version>
      <scope>test</scope>
    </dependency>
    <dependency>
      <groupId>org.apache.ant</groupId>
      <artifactId>ant</artifactId>
      <version>1.7.1</version>
      <optional>true</optional>
    </dependency>
  </dependencies>
</project>"#;

    #[test]
    fn follows_compile_and_runtime_dependencies() {
        let pom = Pom::parse(COMPILER_POM).unwrap();
        let deps = pom.runtime_dependencies();

        assert_eq!(
            deps.dependencies,
            vec![
                DeclaredDependency {
                    group: "org.scala-lang".to_string(),
                    artifact: "scala-library".to_string(),
                    version: "2.8.1".to_string(),
                },
                DeclaredDependency {
                    group: "jline".to_string(),
                    artifact: "jline".to_string(),
                    version: "0.9.94".to_string(),
                },
            ]
        );
        assert!(deps.skipped.is_empty());
        assert!(pom.has_jar());
    }

    #[test]
    fn skips_unresolvable_versions() {
        let pom = Pom::parse(
            r#"<project>
  <artifactId>tool</artifactId>
  <version>1.0</version>
  <dependencies>
    <dependency><groupId>a</groupId><artifactId>managed</artifactId></dependency>
    <dependency><groupId>a</groupId><artifactId>prop</artifactId><version>${missing}</version></dependency>
    <dependency><groupId>a</groupId><artifactId>range</artifactId><version>[1.0,2.0)</version></dependency>
  </dependencies>
</project>"#,
        )
        .unwrap();

        let deps = pom.runtime_dependencies();
        assert!(deps.dependencies.is_empty());
        assert_eq!(deps.skipped.len(), 3);
    }

    #[test]
    fn parent_supplies_version() {
        let pom = Pom::parse(
            r#"<project>
  <parent><groupId>org.example</groupId><version>3.1</version></parent>
  <artifactId>child</artifactId>
  <packaging>pom</packaging>
  <dependencies>
    <dependency><groupId>${project.groupId}</groupId><artifactId>core</artifactId><version>${project.version}</version></dependency>
  </dependencies>
</project>"#,
        )
        .unwrap();

        let deps = pom.runtime_dependencies();
        assert_eq!(deps.dependencies[0].group, "org.example");
        assert_eq!(deps.dependencies[0].version, "3.1");
        assert!(!pom.has_jar());
    }
}
