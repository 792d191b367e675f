//! Algorithm components for self-play training.
//!
//! - `credit_assignment`: backward discounted value targets per player
//! - `policy_target`: visit-count and heuristic policy targets, move sampling, prior mixing, root noise

pub mod credit_assignment;
pub mod policy_target;

pub use credit_assignment::{assign_credit, compute_value_targets, CreditError, DISCOUNT};
pub use policy_target::{
    add_dirichlet_noise, heuristic_policy, mix_priors, normalize_over_actions, sample_visit_action,
    visit_policy,
};
