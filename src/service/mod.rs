//! Data access: the generic adapter, descriptor-driven table services, form validation,
//! dashboard figures, canned queries and the transaction demos.

mod adapter;
mod table;
mod validation;
pub mod dashboard;
pub mod demos;
pub mod queries;

pub use adapter::{strip_empty, Adapter};
pub use dashboard::{load_dashboard, Dashboard};
pub use queries::{canned_queries, run_query, CannedQuery, QueryResult};
pub use table::{amount, expansions, flatten, parse_id, TableService};
pub use validation::FormValidator;
