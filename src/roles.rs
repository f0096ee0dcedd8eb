//! Role ranks and capability checks
//!
//! Roles are plain strings supplied by the organisation. Every permission
//! decision goes through [`RolePolicy`], which holds an ordered rank list
//! (lowest first) and the named thresholds for each gated action.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, PermissionError, Result};

/// Actions gated by role rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TacticalAction {
    Flare,
    MuteAll,
    MuteAck,
}

impl TacticalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TacticalAction::Flare => "FLARE",
            TacticalAction::MuteAll => "MUTE_ALL",
            TacticalAction::MuteAck => "MUTE_ACK",
        }
    }
}

impl fmt::Display for TacticalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TacticalAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FLARE" => Ok(TacticalAction::Flare),
            "MUTE_ALL" => Ok(TacticalAction::MuteAll),
            "MUTE_ACK" => Ok(TacticalAction::MuteAck),
            other => Err(Error::Config(format!("Unknown tactical action: {}", other))),
        }
    }
}

/// Rank list plus per-action thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolePolicy {
    /// Ranks ordered lowest first
    pub ranks: Vec<String>,
    /// Minimum rank allowed to trigger a priority mute
    pub command_min: String,
    /// Minimum rank whose MUTE_ACK lifts a priority mute
    pub ack_min: String,
    /// Net minimum used when the directory has no entry for a net
    pub default_net_min: Option<String>,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            ranks: vec![
                "Vagrant".to_string(),
                "Scout".to_string(),
                "Pioneer".to_string(),
                "Command".to_string(),
            ],
            command_min: "Command".to_string(),
            ack_min: "Pioneer".to_string(),
            default_net_min: None,
        }
    }
}

impl RolePolicy {
    /// Position of a role in the rank list (case-insensitive)
    pub fn rank_of(&self, role: &str) -> Option<usize> {
        self.ranks.iter().position(|r| r.eq_ignore_ascii_case(role))
    }

    /// True if `role` is at or above `minimum`. Unknown roles or thresholds fail closed.
    pub fn meets(&self, role: &str, minimum: &str) -> bool {
        match (self.rank_of(role), self.rank_of(minimum)) {
            (Some(have), Some(need)) => have >= need,
            _ => false,
        }
    }

    fn meets_net(&self, role: &str, net_min: Option<&str>) -> bool {
        match net_min.or(self.default_net_min.as_deref()) {
            Some(minimum) => self.meets(role, minimum),
            None => true,
        }
    }

    pub fn is_command(&self, role: &str) -> bool {
        self.meets(role, &self.command_min)
    }

    /// Roles allowed to lift a priority mute, and to speak through one
    pub fn can_acknowledge(&self, role: &str) -> bool {
        self.meets(role, &self.ack_min)
    }

    /// Whether `role` may open a microphone on a net with the given minimum rank
    pub fn can_transmit(&self, role: &str, net_min: Option<&str>) -> bool {
        self.meets_net(role, net_min)
    }

    pub fn can_transmit_tactical(
        &self,
        role: &str,
        action: TacticalAction,
        net_min: Option<&str>,
    ) -> bool {
        match action {
            TacticalAction::Flare => self.meets_net(role, net_min),
            TacticalAction::MuteAll => self.meets_net(role, net_min) && self.is_command(role),
            TacticalAction::MuteAck => self.can_acknowledge(role),
        }
    }

    /// Same check as [`can_transmit_tactical`](Self::can_transmit_tactical), as a `Result`
    pub fn check_tactical(
        &self,
        role: &str,
        action: TacticalAction,
        net_min: Option<&str>,
    ) -> std::result::Result<(), PermissionError> {
        if self.can_transmit_tactical(role, action, net_min) {
            Ok(())
        } else {
            Err(PermissionError {
                role: role.to_string(),
                action: action.to_string(),
            })
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ranks.is_empty() {
            return Err(Error::Config("Rank list is empty".to_string()));
        }
        let named = [
            Some(("command_min", self.command_min.as_str())),
            Some(("ack_min", self.ack_min.as_str())),
            self.default_net_min.as_deref().map(|r| ("default_net_min", r)),
        ];
        for (field, rank) in named.into_iter().flatten() {
            if self.rank_of(rank).is_none() {
                return Err(Error::Config(format!(
                    "{} names unknown rank {:?}",
                    field, rank
                )));
            }
        }
        Ok(())
    }
}
