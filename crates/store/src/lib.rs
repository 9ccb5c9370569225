pub mod budget;
pub mod document;
pub mod transport;

pub use budget::{BudgetExhausted, BudgetedFetcher};
pub use document::Store;
pub use transport::{ContentStoreTransport, GetOutcome, PutOutcome};
