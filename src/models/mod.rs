//! Domain records shared by the stores, the loan engine and the HTTP layer.

pub mod book;
pub mod category;
pub mod loan;
pub mod notification;
pub mod settings;
pub mod user;

pub use book::{Book, BookPatch, NewBook};
pub use category::Category;
pub use loan::{Loan, LoanStatus, LoanView};
pub use notification::Notification;
pub use settings::LoanPolicy;
pub use user::{NewUser, ProfilePatch, Role, User, UserPatch};
