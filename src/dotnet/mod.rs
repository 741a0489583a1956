//! .NET project and solution file extraction.
//!
//! `.sln` is a custom text format; `.csproj`/`.vbproj` are MSBuild XML. The
//! imports phase feeds the extracted RootNamespace/AssemblyName values into
//! the namespace index and records project/package references.

pub mod project;
pub mod solution;

pub use project::{parse_project_file, ProjectFile};
pub use solution::{parse_solution, SlnProject};
