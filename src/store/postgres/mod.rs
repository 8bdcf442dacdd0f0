//! `sqlx`/Postgres implementations of the store traits: plain
//! `query_as`/`query` calls bound positionally, no query-builder DSL.

mod account;
mod campaign;
mod lead;
mod prospect;
mod step;

pub use account::PgAccountStore;
pub use campaign::PgCampaignStore;
pub use lead::PgLeadStore;
pub use prospect::{PgLeadCreator, PgProspectListSource};
pub use step::PgStepStore;
