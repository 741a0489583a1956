//! .sln text format parser.

use once_cell::sync::Lazy;
use regex::Regex;

/// A project entry from a solution file.
#[derive(Debug, Clone)]
pub struct SlnProject {
    pub name: String,
    pub path: String,
    pub type_guid: String,
    pub project_guid: String,
}

/// Solution folders are virtual organisers, not buildable projects.
const SOLUTION_FOLDER_GUID: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";

static PROJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^Project\("\{([^}]+)\}"\)\s*=\s*"([^"]+)"\s*,\s*"([^"]+)"\s*,\s*"\{([^}]+)\}""#,
    )
    .unwrap()
});

/// Parse `Project("{type-guid}") = "Name", "Path", "{guid}"` lines,
/// skipping solution folders.
pub fn parse_solution(content: &str) -> Vec<SlnProject> {
    PROJECT_RE
        .captures_iter(content)
        .filter_map(|cap| {
            let type_guid = cap[1].to_uppercase();
            if type_guid == SOLUTION_FOLDER_GUID {
                return None;
            }
            Some(SlnProject {
                name: cap[2].to_string(),
                path: cap[3].replace('\\', "/"),
                type_guid,
                project_guid: cap[4].to_uppercase(),
            })
        })
        .collect()
}
