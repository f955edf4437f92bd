pub mod metadata;
pub mod pom;
pub mod revision;

pub use metadata::MetadataClient;
pub use pom::Pom;
