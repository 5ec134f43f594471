pub mod anthropic;
pub mod azure_openai;
pub mod factory;
pub mod google;
pub mod http_client;
pub mod openai;

pub use factory::{HttpProviderFactory, ProviderFactory};
pub use http_client::{HttpClient, HttpClientTrait, JsonResponse};
