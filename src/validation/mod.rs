//! Signing-Key Resolver (spec §4.5) and Validator (spec §4.6).

pub mod key_resolver;
pub mod params;
pub mod replay;
pub mod validator;

pub use key_resolver::SigningKeyResolver;
pub use params::{SignatureValidator, TokenReaderOverride, ValidationParameters, ValidationResult};
pub use replay::{InMemoryReplayCache, ReplayCache};
pub use validator::Validator;
