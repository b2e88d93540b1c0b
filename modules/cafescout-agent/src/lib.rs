pub mod intent;
pub mod ranker;
pub mod search;
pub mod session;

pub use intent::{Decision, IntentResolver, Recommender, TurnOutcome};
pub use ranker::rank;
pub use search::{SearchAdapter, SearchOutcome};
pub use session::SessionTable;
