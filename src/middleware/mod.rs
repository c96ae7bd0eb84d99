pub mod auth;
pub mod permission;
pub mod response;

pub use auth::{authenticate, AuthUser, PlatformAuth};
pub use permission::{check_permission, PermissionChecker, PermitAll, RoutePermissions};
pub use response::{ApiResponse, ApiResult, JsonBody};
