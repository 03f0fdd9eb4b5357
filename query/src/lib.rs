pub mod balance;
pub mod call;
pub mod format_balance;
pub mod params;

pub use balance::{BalanceQuery, BalanceView};
pub use call::{Call, ResultStream};
pub use format_balance::{FormatBalance, PLACEHOLDER};
pub use params::{is_callable, QueryParam};
