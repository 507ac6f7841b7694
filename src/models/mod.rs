pub mod access_token;
pub mod identity;
pub mod permission;
pub mod role;
pub mod user;
pub mod verification_token;

pub use access_token::AccessToken;
pub use identity::{Identity, RoleGrant, SUPERUSER_ROLE};
pub use permission::{NewPermission, Permission, PermissionUpdate};
pub use role::{NewRole, Role, RoleUpdate, RoleWithPermissions};
pub use user::{NewUser, User, UserResponse, UserSummary, UserUpdate};
pub use verification_token::{TokenKind, VerificationToken};
