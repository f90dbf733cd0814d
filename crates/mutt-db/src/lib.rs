//! Postgres-backed storage for everything that isn't event traffic:
//! classification rules, the development-host and device-team registries,
//! and the two append-only audit logs. Event/alert traffic itself never
//! touches this crate — that's `mutt-queue`'s job.

mod audit;
mod error;
mod hosts;
mod pool;
mod rules;
mod teams;

pub use audit::{audit_logs_for_host, ensure_partition_for, insert_config_audit, insert_event_audit};
pub use error::{DbError, DbResult};
pub use hosts::{add_dev_host, list_dev_hosts, remove_dev_host, DevelopmentHost};
pub use pool::{connect, run_migrations};
pub use rules::{create_rule, deactivate_rule, get_rule, list_active_rules, update_rule};
pub use teams::{add_device_team, list_device_teams, remove_device_team, DeviceTeam};
