//! Episode records exchanged between actors, the orchestrator and the trainer.
//!
//! ```text
//! Actor ──(Trajectory + outcome)──► Orchestrator ──(Experience)──► Trainer
//!          one Step per ply                     one per Step
//! ```

/// Index into the game's full action space.
pub type ActionId = usize;

/// Index of a player, always in `[0, num_players)`.
pub type PlayerId = usize;

/// One ply of an episode as recorded by the acting worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Observation tensor taken before the move
    pub observation: Vec<f32>,
    /// Player who chose the move
    pub player: PlayerId,
    /// Distribution over the full action space, summing to 1 over legal actions
    pub policy_target: Vec<f32>,
    /// Per-player reward produced by applying the move
    pub rewards: Vec<f32>,
}

/// Ordered steps of one episode, first ply first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    steps: Vec<Step>,
}

impl Trajectory {
    /// Create an empty trajectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Number of recorded plies.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Borrow the steps in chronological order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Sum of the intermediate rewards per player.
    ///
    /// Steps with a shorter reward vector only contribute to the players they cover.
    pub fn reward_totals(&self, num_players: usize) -> Vec<f32> {
        let mut totals = vec![0.0; num_players];
        for step in &self.steps {
            for (total, reward) in totals.iter_mut().zip(&step.rewards) {
                *total += reward;
            }
        }
        totals
    }
}

impl From<Vec<Step>> for Trajectory {
    fn from(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}

/// What an actor reports after one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeResult {
    /// Episode id taken from the job
    pub episode: u64,
    /// Actor that played the episode
    pub actor_id: u64,
    pub trajectory: Trajectory,
    /// Final per-player returns, one entry per player
    pub outcome: Vec<f32>,
    /// True when the episode ended without reaching a terminal state
    pub aborted: bool,
}

/// Training sample derived from one step by credit assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub observation: Vec<f32>,
    pub policy_target: Vec<f32>,
    /// Discounted value per player
    pub value_target: Vec<f32>,
    pub player: PlayerId,
}

impl Experience {
    /// True when every number in the sample is finite.
    pub fn is_finite(&self) -> bool {
        self.observation
            .iter()
            .chain(&self.policy_target)
            .chain(&self.value_target)
            .all(|x| x.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(player: PlayerId, rewards: Vec<f32>) -> Step {
        Step {
            observation: vec![0.0; 2],
            player,
            policy_target: vec![1.0],
            rewards,
        }
    }

    #[test]
    fn test_trajectory_push_and_len() {
        let mut trajectory = Trajectory::new();
        assert!(trajectory.is_empty());

        trajectory.push(step(0, vec![0.0, 0.0]));
        trajectory.push(step(1, vec![0.0, 0.0]));

        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.steps()[1].player, 1);
    }

    #[test]
    fn test_reward_totals() {
        let trajectory = Trajectory::from(vec![
            step(0, vec![1.0, 0.5, 0.0]),
            step(1, vec![-1.0, 0.5, 2.0]),
        ]);

        assert_eq!(trajectory.reward_totals(3), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_reward_totals_short_reward_vector() {
        let trajectory = Trajectory::from(vec![step(0, vec![1.0])]);
        assert_eq!(trajectory.reward_totals(2), vec![1.0, 0.0]);
    }

    #[test]
    fn test_experience_is_finite() {
        let mut experience = Experience {
            observation: vec![0.5, 1.0],
            policy_target: vec![0.25, 0.75],
            value_target: vec![1.0, -1.0],
            player: 0,
        };
        assert!(experience.is_finite());

        experience.value_target[1] = f32::NAN;
        assert!(!experience.is_finite());

        experience.value_target[1] = 0.0;
        experience.observation[0] = f32::INFINITY;
        assert!(!experience.is_finite());
    }
}
