//! Actor system.
//!
//! - `Actor`: self-play worker playing one episode per job
//! - `ActorPool`: live actor records with crash/quota detection

pub mod actor;
pub mod actor_pool;

pub use actor::{
    actor_config_for, Actor, ActorChannels, ActorConfig, ActorDriver, ActorHandle, ActorKind,
    SearchDriver,
};
pub use actor_pool::{ActorExit, ActorPool, PoolJoinReport};
