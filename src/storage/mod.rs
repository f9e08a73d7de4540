pub mod ledger;
pub mod models;
pub mod recovery;

pub use ledger::Ledger;
pub use recovery::recover_in_flight;
