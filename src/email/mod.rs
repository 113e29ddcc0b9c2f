pub mod bootstrap;
pub mod provider;
pub mod templates;

pub use provider::{
    DynEmailProvider, EmailMessage, EmailProvider, MockEmailProvider, ProviderError,
    ResendProvider,
};
