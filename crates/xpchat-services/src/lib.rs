pub mod ai;
pub mod endpoint;
pub mod media;

pub use ai::HttpAssistant;
pub use endpoint::EndpointClient;
pub use media::HttpMediaStore;
