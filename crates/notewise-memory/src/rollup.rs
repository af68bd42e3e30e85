//! Round budget for resident history.

use crate::error::{MemoryError, Result};
use crate::message::ChatMessage;

pub const DEFAULT_MAX_ROUNDS: usize = 20;
pub const DEFAULT_TRIM_ROUNDS: usize = 6;

/// Decides when a session log is over budget and where to cut it.
///
/// A round is one assistant message. Once more than `max_rounds` rounds are
/// resident, the prefix ending with the `trim_rounds`-th assistant message is
/// cut off for summarization. Cutting right after an assistant message keeps
/// each user turn together with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupPolicy {
    max_rounds: usize,
    trim_rounds: usize,
}

impl Default for RollupPolicy {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            trim_rounds: DEFAULT_TRIM_ROUNDS,
        }
    }
}

impl RollupPolicy {
    pub fn new(max_rounds: usize, trim_rounds: usize) -> Result<Self> {
        if trim_rounds == 0 {
            return Err(MemoryError::Config(
                "trim_rounds must be greater than zero".to_string(),
            ));
        }
        if trim_rounds > max_rounds {
            return Err(MemoryError::Config(format!(
                "trim_rounds ({trim_rounds}) must not exceed max_rounds ({max_rounds})"
            )));
        }
        Ok(Self {
            max_rounds,
            trim_rounds,
        })
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    pub fn trim_rounds(&self) -> usize {
        self.trim_rounds
    }

    pub fn round_count(messages: &[ChatMessage]) -> usize {
        messages.iter().filter(|msg| msg.is_round()).count()
    }

    pub fn exceeds_budget(&self, messages: &[ChatMessage]) -> bool {
        Self::round_count(messages) > self.max_rounds
    }

    /// Index just past the `trim_rounds`-th assistant message, or 0 if there
    /// are not that many.
    pub fn cutoff(&self, messages: &[ChatMessage]) -> usize {
        messages
            .iter()
            .enumerate()
            .filter(|(_, msg)| msg.is_round())
            .nth(self.trim_rounds - 1)
            .map(|(index, _)| index + 1)
            .unwrap_or(0)
    }

    /// Split into `(cut prefix, remaining tail)`. The prefix is empty when
    /// there is nothing to cut.
    pub fn split(&self, mut messages: Vec<ChatMessage>) -> (Vec<ChatMessage>, Vec<ChatMessage>) {
        let cutoff = self.cutoff(&messages);
        let tail = messages.split_off(cutoff);
        (messages, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rounds(count: usize) -> Vec<ChatMessage> {
        (0..count)
            .flat_map(|i| {
                [
                    ChatMessage::user(format!("q{i}")),
                    ChatMessage::assistant(format!("a{i}")),
                ]
            })
            .collect()
    }

    #[test]
    fn rejects_invalid_budgets() {
        assert!(RollupPolicy::new(20, 0).is_err());
        assert!(RollupPolicy::new(5, 6).is_err());
        assert!(RollupPolicy::new(6, 6).is_ok());
    }

    #[test]
    fn counts_assistant_messages_only() {
        let mut messages = rounds(3);
        messages.push(ChatMessage::user("dangling"));
        messages.push(ChatMessage::system("note"));
        assert_eq!(RollupPolicy::round_count(&messages), 3);
    }

    #[test]
    fn budget_is_inclusive() {
        let policy = RollupPolicy::default();
        assert!(!policy.exceeds_budget(&rounds(20)));
        assert!(policy.exceeds_budget(&rounds(21)));
    }

    #[test]
    fn cutoff_lands_after_nth_assistant() {
        let policy = RollupPolicy::new(4, 2).unwrap();
        let messages = rounds(5);
        assert_eq!(policy.cutoff(&messages), 4);

        let (old, tail) = policy.split(messages);
        assert_eq!(old.len(), 4);
        assert_eq!(old.last().unwrap().content, "a1");
        assert_eq!(tail.first().unwrap().content, "q2");
    }

    #[test]
    fn split_keeps_consecutive_user_turns_with_their_reply() {
        let policy = RollupPolicy::new(2, 1).unwrap();
        let messages = vec![
            ChatMessage::user("first"),
            ChatMessage::user("retry"),
            ChatMessage::assistant("answer"),
            ChatMessage::user("next"),
        ];
        let (old, tail) = policy.split(messages);
        assert_eq!(old.len(), 3);
        assert_eq!(tail.len(), 1);
    }

    #[test]
    fn too_few_rounds_means_no_cut() {
        let policy = RollupPolicy::new(6, 6).unwrap();
        let messages = rounds(5);
        assert_eq!(policy.cutoff(&messages), 0);
        let (old, tail) = policy.split(messages);
        assert!(old.is_empty());
        assert_eq!(tail.len(), 10);
    }
}
