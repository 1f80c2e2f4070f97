pub mod audit;
pub mod configuration;
pub mod education;
pub mod menu_item;
pub mod role;
pub mod user;

pub use audit::{Audit, AuditEvent, AuditFilter, AuditStats, Auditable, NewAudit, RecentActivity};
pub use configuration::{ConfigGroup, ConfigType, Configuration, ConfigurationInput};
pub use education::{Category, Education, EducationFilter, EducationInput, EducationStatus};
pub use menu_item::{MenuItem, MenuItemInput, MenuNode};
pub use role::{Permission, PermissionInput, Role, RoleInput, RoleWithPermissions};
pub use user::{RoleSummary, User, UserFilter, UserInput, UserStats, UserWithRoles};
