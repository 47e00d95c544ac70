use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::signature::{Region, Signature};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub escape: EscapeConfig,
    pub signatures: SignatureTable,
    /// Sub-selection options: alternative name -> target signature.
    #[serde(default)]
    pub alternatives: BTreeMap<String, Signature>,
    #[serde(default)]
    pub dispel: DispelConfig,
}

impl Config {
    /// Target signature of the configured alternative, if it is mapped.
    pub fn selected_alternative(&self) -> Option<&Signature> {
        self.alternatives.get(&self.session.alternative)
    }
}

/// Session budget and policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Rounds to run before stopping (0 = unbounded).
    #[serde(default)]
    pub round_limit: u32,
    /// Attempts per round before the round is declared lost.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Name of the alternative picked during sub-selection.
    #[serde(default)]
    pub alternative: String,
    #[serde(default)]
    pub branch_policy: BranchPolicy,
    /// Which round shape the session plays.
    #[serde(default)]
    pub task: SessionTask,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            round_limit: 0,
            max_attempts: default_max_attempts(),
            alternative: String::new(),
            branch_policy: BranchPolicy::default(),
            task: SessionTask::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

/// Round shape played by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTask {
    /// Reward selection, branch choice and letter sub-selection.
    #[default]
    Walnut,
    /// Start a challenge, wait for the map, cast, replay.
    Dispel,
}

impl SessionTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Walnut => "walnut",
            Self::Dispel => "dispel",
        }
    }
}

/// Which affordance to take at the branch choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchPolicy {
    /// Always continue into the next round.
    #[default]
    Continue,
    /// Withdraw at the first branch choice.
    Withdraw,
    /// Continue until the last budgeted round, withdraw on that round.
    WithdrawAtLimit,
}

/// Polling cadence and timeouts, all in milliseconds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Pause after every click so the UI transition can finish.
    #[serde(default = "default_action_delay")]
    pub action_delay_ms: u64,
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_ms: u64,
    /// Overall wait for the round-start signal.
    #[serde(default = "default_primary_timeout")]
    pub primary_timeout_ms: u64,
    #[serde(default = "default_primary_poll_interval")]
    pub primary_poll_interval_ms: u64,
    /// Fixed pause between retry attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_key_hold")]
    pub key_hold_ms: u64,
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn primary_poll_interval(&self) -> Duration {
        Duration::from_millis(self.primary_poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn key_hold(&self) -> Duration {
        Duration::from_millis(self.key_hold_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            action_delay_ms: default_action_delay(),
            stage_timeout_ms: default_stage_timeout(),
            primary_timeout_ms: default_primary_timeout(),
            primary_poll_interval_ms: default_primary_poll_interval(),
            retry_delay_ms: default_retry_delay(),
            key_hold_ms: default_key_hold(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_action_delay() -> u64 {
    1000
}

fn default_stage_timeout() -> u64 {
    30_000
}

fn default_primary_timeout() -> u64 {
    130_000
}

fn default_primary_poll_interval() -> u64 {
    5000
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_key_hold() -> u64 {
    200
}

/// Recovery procedure run between failed attempts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EscapeConfig {
    /// When disabled, attempts are retried without any recovery input.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cancel_key")]
    pub cancel_key: String,
    /// Wait before and after the cancel key.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl EscapeConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cancel_key: default_cancel_key(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cancel_key() -> String {
    "esc".to_string()
}

fn default_settle_delay() -> u64 {
    2000
}

/// The dispel round: start a challenge, wait for the map, cast, replay
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispelConfig {
    /// Wait before the first round so the player can focus the game.
    #[serde(default = "default_prepare")]
    pub prepare_ms: u64,
    #[serde(default = "default_skill_key")]
    pub skill_key: String,
    /// Presses of the skill key per round.
    #[serde(default = "default_skill_presses")]
    pub skill_presses: u32,
    #[serde(default = "default_skill_interval")]
    pub skill_interval_ms: u64,
    /// Extra wait once the map marker shows up.
    #[serde(default = "default_map_settle")]
    pub map_settle_ms: u64,
    /// How long a run may last before the replay button is given up on.
    #[serde(default = "default_replay_timeout")]
    pub replay_timeout_ms: u64,
    #[serde(default = "default_replay_poll_interval")]
    pub replay_poll_interval_ms: u64,
    #[serde(default = "default_start_signature")]
    pub start: Signature,
    /// Marker proving the map loaded.
    #[serde(default = "default_map_loaded_signature")]
    pub map_loaded: Signature,
    #[serde(default = "default_replay_signature")]
    pub replay: Signature,
}

impl DispelConfig {
    pub fn prepare(&self) -> Duration {
        Duration::from_millis(self.prepare_ms)
    }

    pub fn skill_interval(&self) -> Duration {
        Duration::from_millis(self.skill_interval_ms)
    }

    pub fn map_settle(&self) -> Duration {
        Duration::from_millis(self.map_settle_ms)
    }

    pub fn replay_timeout(&self) -> Duration {
        Duration::from_millis(self.replay_timeout_ms)
    }

    pub fn replay_poll_interval(&self) -> Duration {
        Duration::from_millis(self.replay_poll_interval_ms)
    }
}

impl Default for DispelConfig {
    fn default() -> Self {
        Self {
            prepare_ms: default_prepare(),
            skill_key: default_skill_key(),
            skill_presses: default_skill_presses(),
            skill_interval_ms: default_skill_interval(),
            map_settle_ms: default_map_settle(),
            replay_timeout_ms: default_replay_timeout(),
            replay_poll_interval_ms: default_replay_poll_interval(),
            start: default_start_signature(),
            map_loaded: default_map_loaded_signature(),
            replay: default_replay_signature(),
        }
    }
}

fn default_prepare() -> u64 {
    3000
}

fn default_skill_key() -> String {
    "4".to_string()
}

fn default_skill_presses() -> u32 {
    3
}

fn default_skill_interval() -> u64 {
    1000
}

fn default_map_settle() -> u64 {
    3000
}

fn default_replay_timeout() -> u64 {
    120_000
}

fn default_replay_poll_interval() -> u64 {
    2000
}

fn default_start_signature() -> Signature {
    Signature::text("start_challenge", ["开始挑战"])
}

fn default_map_loaded_signature() -> Signature {
    Signature::text("dispel_marker", ["驱离"]).within(Region::top_right())
}

fn default_replay_signature() -> Signature {
    Signature::text("replay", ["再次进行"]).within(Region::bottom_right())
}

/// The signatures a round is built from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignatureTable {
    /// Screen that opens every round.
    pub round_start: Signature,
    /// Confirmation button, used after the round start and after sub-selection.
    pub confirm: Signature,
    pub withdraw: Signature,
    #[serde(rename = "continue")]
    pub proceed: Signature,
    /// Heading of the sub-selection screen. Only used to log whether it loaded.
    #[serde(default)]
    pub selection_screen: Option<Signature>,
    /// Abandon affordance shown after the cancel key (escape procedure).
    #[serde(default)]
    pub abandon: Option<Signature>,
    /// Confirmation of the abandon dialog (escape procedure).
    #[serde(default)]
    pub dismiss: Option<Signature>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Pattern;

    const MINIMAL: &str = r#"
[signatures.round_start]
id = "reward_selection"
kind = "text"
any_of = ["密函报酬选择"]

[signatures.confirm]
id = "confirm_selection"
kind = "text"
any_of = ["确认选择"]

[signatures.withdraw]
id = "withdraw"
kind = "text"
any_of = ["撤离"]

[signatures.continue]
id = "continue"
kind = "text"
any_of = ["继续挑战", "○继续挑战"]
"#;

    #[test]
    fn test_deserialize_minimal_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.session.round_limit, 0);
        assert_eq!(config.session.max_attempts, 3);
        assert_eq!(config.session.branch_policy, BranchPolicy::Continue);
        assert_eq!(config.timing.primary_timeout_ms, 130_000);
        assert_eq!(config.timing.primary_poll_interval_ms, 5000);
        assert_eq!(config.timing.stage_timeout(), Duration::from_secs(30));
        assert!(config.escape.enabled);
        assert_eq!(config.escape.cancel_key, "esc");
        assert!(config.alternatives.is_empty());
        assert_eq!(config.signatures.proceed.id, "continue");
        assert!(config.signatures.selection_screen.is_none());
        assert_eq!(config.session.task, SessionTask::Walnut);
        assert_eq!(config.dispel.skill_key, "4");
        assert_eq!(config.dispel.replay_timeout(), Duration::from_secs(120));
        assert_eq!(config.dispel.map_loaded.region, Some(Region::top_right()));
    }

    #[test]
    fn test_deserialize_dispel_task() {
        let toml = format!(
            r#"
[session]
task = "dispel"
round_limit = 4

[dispel]
skill_key = "q"
skill_presses = 5

[dispel.replay]
id = "play_again"
kind = "text"
any_of = ["再次进行", "再来一次"]
{MINIMAL}"#
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.session.task, SessionTask::Dispel);
        assert_eq!(config.dispel.skill_key, "q");
        assert_eq!(config.dispel.skill_presses, 5);
        assert_eq!(config.dispel.prepare_ms, 3000);
        assert_eq!(config.dispel.replay.id, "play_again");
        assert!(config.dispel.replay.region.is_none());
        assert_eq!(config.dispel.start.id, "start_challenge");
    }

    #[test]
    fn test_deserialize_session_and_alternatives() {
        let toml = format!(
            r#"
[session]
round_limit = 5
max_attempts = 2
alternative = "lizbeth"
branch_policy = "withdraw_at_limit"

[alternatives.lizbeth]
id = "lizbeth_letter"
kind = "feature"
name = "lizibeier"
{MINIMAL}"#
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.session.round_limit, 5);
        assert_eq!(config.session.max_attempts, 2);
        assert_eq!(config.session.branch_policy, BranchPolicy::WithdrawAtLimit);

        let target = config.selected_alternative().unwrap();
        assert_eq!(target.id, "lizbeth_letter");
        assert_eq!(
            target.pattern,
            Pattern::Feature {
                name: "lizibeier".to_string()
            }
        );
    }

    #[test]
    fn test_deserialize_missing_signatures_fails() {
        let toml = r#"
[session]
round_limit = 1
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_unmapped_alternative_is_none() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.session.alternative = "nobody".to_string();
        assert!(config.selected_alternative().is_none());
    }
}
