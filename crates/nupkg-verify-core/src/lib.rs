//! NuGet release package verification.
//!
//! `nupkg-verify-core` opens a `.nupkg`, checks its package signature and
//! the Authenticode signature of every file inside it, and compares what it
//! found with an expected release manifest. Every comparison becomes a
//! pass/fail [`ValidationResult`]; only an unreadable package is an error.
//!
//! # Examples
//!
//! ```no_run
//! use nupkg_verify_core::ManifestExpectation;
//! use nupkg_verify_core::NoopProgress;
//! use nupkg_verify_core::signature::AuthenticodeInspector;
//! use nupkg_verify_core::verify_package;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let expectation = ManifestExpectation::msal("2.7.0");
//! let outcome = verify_package(
//!     Path::new("Microsoft.Identity.Client.2.7.0.nupkg"),
//!     &expectation,
//!     &AuthenticodeInspector::new(),
//!     &mut NoopProgress,
//! )?;
//! println!("{} checks failed", outcome.report.failed_count());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod config;
pub mod entry;
pub mod error;
pub mod formats;
pub mod inspection;
pub mod io;
pub mod signature;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;

pub use archive::NuGetPackage;
pub use config::ManifestExpectation;
pub use config::MetadataField;
pub use entry::PackageEntry;
pub use error::Result;
pub use error::VerifyError;
pub use formats::PackageMetadata;
pub use formats::PackageVersion;
pub use inspection::InspectionProgress;
pub use inspection::NoopProgress;
pub use inspection::PackageInspection;
pub use inspection::VerificationOutcome;
pub use inspection::inspect_package;
pub use inspection::verify_package;
pub use signature::PackageSignatureStatus;
pub use signature::SignatureInspector;
pub use signature::SignatureRecord;
pub use signature::SignatureVerdict;
pub use validation::Comparator;
pub use validation::FieldValue;
pub use validation::ValidationReport;
pub use validation::ValidationResult;
pub use validation::Validator;
