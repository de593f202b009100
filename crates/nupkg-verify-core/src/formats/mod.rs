//! Package format handling: the `.nuspec` manifest and NuGet versions.

pub mod nuspec;
pub mod version;

pub use nuspec::License;
pub use nuspec::PackageMetadata;
pub use nuspec::Repository;
pub use nuspec::parse_nuspec;
pub use version::PackageVersion;
