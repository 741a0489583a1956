//! .csproj/.vbproj MSBuild XML extraction.
//!
//! Only the handful of elements the pipeline needs are read; a full XML
//! parser is not warranted for this shape of document. Handles SDK-style
//! and legacy project formats, attribute or child-element `Version`.

use std::path::Path;

/// Data extracted from a project file.
#[derive(Debug, Clone, Default)]
pub struct ProjectFile {
    pub name: String,
    pub target_framework: Option<String>,
    pub root_namespace: Option<String>,
    pub assembly_name: Option<String>,
    /// Relative paths, backslashes normalized.
    pub project_references: Vec<String>,
    /// (package name, version) pairs.
    pub package_references: Vec<(String, String)>,
}

/// Parse project XML. `project_path` supplies the default namespace and
/// assembly name when the PropertyGroup omits them.
pub fn parse_project_file(content: &str, project_path: &str) -> ProjectFile {
    let project_name = Path::new(project_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut info = ProjectFile {
        name: project_name.clone(),
        ..Default::default()
    };

    info.root_namespace = element_text(content, "RootNamespace");
    info.assembly_name = element_text(content, "AssemblyName");
    info.target_framework = element_text(content, "TargetFramework").or_else(|| {
        element_text(content, "TargetFrameworks")
            .map(|multi| multi.split(';').next().unwrap_or("").to_string())
    });

    for include in include_attrs(content, "ProjectReference") {
        info.project_references.push(include.replace('\\', "/"));
    }
    info.package_references = package_refs(content);

    // MSBuild defaults both to the project file stem
    if info.root_namespace.is_none() {
        info.root_namespace = Some(project_name.clone());
    }
    if info.assembly_name.is_none() {
        info.assembly_name = Some(project_name);
    }

    info
}

/// Text content of `<Tag>value</Tag>`.
fn element_text(content: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = content.find(&open)? + open.len();
    let end = content[start..].find(&close)?;
    let text = content[start..start + end].trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// `Include` attribute values of every `<Tag .../>` element.
fn include_attrs(content: &str, tag: &str) -> Vec<String> {
    let pattern = format!("<{tag}");
    let mut results = Vec::new();
    let mut from = 0;
    while let Some(pos) = content[from..].find(&pattern) {
        let abs = from + pos;
        if let Some(end) = content[abs..].find('>') {
            if let Some(include) = attr_value(&content[abs..abs + end + 1], "Include") {
                results.push(include);
            }
        }
        from = abs + pattern.len();
    }
    results
}

/// `<PackageReference Include="..." Version="..."/>` entries; `Version`
/// may also be a child element.
fn package_refs(content: &str) -> Vec<(String, String)> {
    let pattern = "<PackageReference";
    let mut results = Vec::new();
    let mut from = 0;
    while let Some(pos) = content[from..].find(pattern) {
        let abs = from + pos;
        let rest = &content[abs..];
        let Some(gt) = rest.find('>') else {
            break;
        };
        let element = &rest[..gt + 1];
        let name = attr_value(element, "Include").unwrap_or_default();
        let mut version = attr_value(element, "Version").unwrap_or_default();

        if version.is_empty() && !element.ends_with("/>") {
            if let Some(close) = rest.find("</PackageReference>") {
                if let Some(v) = element_text(&rest[gt + 1..close], "Version") {
                    version = v;
                }
            }
        }

        if !name.is_empty() {
            results.push((name, version));
        }
        from = abs + pattern.len();
    }
    results
}

fn attr_value(element: &str, attr: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let pat = format!("{attr}={quote}");
        if let Some(start) = element.find(&pat) {
            let after = start + pat.len();
            if let Some(end) = element[after..].find(quote) {
                return Some(element[after..after + end].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
    <RootNamespace>Absence.Services</RootNamespace>
    <AssemblyName>Absence.Services</AssemblyName>
  </PropertyGroup>
  <ItemGroup>
    <ProjectReference Include="..\Absence.Core\Absence.Core.csproj" />
    <ProjectReference Include="..\Absence.Data\Absence.Data.csproj" />
  </ItemGroup>
  <ItemGroup>
    <PackageReference Include="Newtonsoft.Json" Version="13.0.1" />
    <PackageReference Include="Serilog">
      <Version>3.1.1</Version>
    </PackageReference>
  </ItemGroup>
</Project>"#;

    #[test]
    fn extracts_property_group() {
        let info = parse_project_file(SAMPLE, "Services/Services.csproj");
        assert_eq!(info.root_namespace.as_deref(), Some("Absence.Services"));
        assert_eq!(info.assembly_name.as_deref(), Some("Absence.Services"));
        assert_eq!(info.target_framework.as_deref(), Some("net8.0"));
    }

    #[test]
    fn extracts_project_references_with_forward_slashes() {
        let info = parse_project_file(SAMPLE, "Services/Services.csproj");
        assert_eq!(info.project_references.len(), 2);
        assert_eq!(info.project_references[0], "../Absence.Core/Absence.Core.csproj");
    }

    #[test]
    fn extracts_package_references_attr_and_child_version() {
        let info = parse_project_file(SAMPLE, "Services/Services.csproj");
        assert_eq!(info.package_references.len(), 2);
        assert_eq!(
            info.package_references[0],
            ("Newtonsoft.Json".to_string(), "13.0.1".to_string())
        );
        assert_eq!(
            info.package_references[1],
            ("Serilog".to_string(), "3.1.1".to_string())
        );
    }

    #[test]
    fn target_frameworks_takes_the_first() {
        let multi = r#"<Project><PropertyGroup>
            <TargetFrameworks>net8.0;netstandard2.1</TargetFrameworks>
        </PropertyGroup></Project>"#;
        let info = parse_project_file(multi, "X/X.csproj");
        assert_eq!(info.target_framework.as_deref(), Some("net8.0"));
    }

    #[test]
    fn defaults_derive_from_file_stem() {
        let minimal = "<Project Sdk=\"Microsoft.NET.Sdk\"></Project>";
        let info = parse_project_file(minimal, "MyProject/MyProject.csproj");
        assert_eq!(info.root_namespace.as_deref(), Some("MyProject"));
        assert_eq!(info.assembly_name.as_deref(), Some("MyProject"));
    }
}
