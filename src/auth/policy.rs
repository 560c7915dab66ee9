//! Which roles may perform which operations.

use crate::models::Role;
use serde::Serialize;

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ViewProfile,
    UpdateProfile,
    ManageUsers,
    ReadCategories,
    WriteCatalog,
    Borrow,
    ReturnLoan,
    ExtendLoan,
    ListOwnLoans,
    ListAllLoans,
    ViewStats,
    OwnNotifications,
    SendNotifications,
    LiveChannel,
}

impl Operation {
    pub fn admin_only(&self) -> bool {
        matches!(
            self,
            Operation::ManageUsers
                | Operation::WriteCatalog
                | Operation::ReturnLoan
                | Operation::ListAllLoans
                | Operation::ViewStats
                | Operation::SendNotifications
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::ViewProfile => "view profile",
            Operation::UpdateProfile => "update profile",
            Operation::ManageUsers => "manage users",
            Operation::ReadCategories => "read categories",
            Operation::WriteCatalog => "edit catalog",
            Operation::Borrow => "borrow",
            Operation::ReturnLoan => "return loan",
            Operation::ExtendLoan => "extend loan",
            Operation::ListOwnLoans => "list own loans",
            Operation::ListAllLoans => "list all loans",
            Operation::ViewStats => "view stats",
            Operation::OwnNotifications => "notifications",
            Operation::SendNotifications => "send notifications",
            Operation::LiveChannel => "live channel",
        };
        f.write_str(name)
    }
}

/// Admins may do everything; member roles share one permission set.
pub fn allowed(op: Operation, role: Role) -> bool {
    role.is_admin() || !op.admin_only()
}
