pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_user;
pub use rest::{
    latest_summary_handler, list_summaries_handler, preview_rewards_handler,
    reward_message_handler, user_stats_handler,
};
