//! HTTP handlers

mod auth;
mod health;
mod members;
mod records;

pub use auth::{change_password, login, logout, logout_all, me, refresh, switch_tenant};
pub use health::{health, ready};
pub use members::{add_member, change_role, list_members, remove_member};
pub use records::{create_record, delete_record, get_record, list_records, update_record};
