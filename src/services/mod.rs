pub mod auth;
pub mod email;
pub mod identity;
pub mod session;

pub use auth::AuthService;
pub use email::{EmailProvider, MockEmailService, SmtpEmailService};
pub use identity::IdentityResolver;
