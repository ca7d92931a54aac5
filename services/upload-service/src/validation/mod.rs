// /forum-platform/services/upload-service/src/validation/mod.rs
pub mod dangerous;
pub mod sanitizer;
pub mod signatures;
pub mod validator;
pub mod verdict;

pub use dangerous::DangerousExtensionSet;
pub use sanitizer::sanitize_filename;
pub use signatures::{MagicSignature, SignatureDescriptor, SignatureRegistry};
pub use validator::{FileValidator, UploadCandidate, ValidationPolicy};
pub use verdict::{ErrorKind, ValidationVerdict};
