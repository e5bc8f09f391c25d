use crate::errors::{PilotError, PilotResult};
use crate::llm::types::Turn;

/// Append-only, bounded list of conversation turns.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::with_capacity(max_turns.min(64)),
            max_turns,
        }
    }

    /// Store `turn` after the existing ones. Fails, without storing, once the ceiling is reached.
    pub fn append(&mut self, turn: Turn) -> PilotResult<()> {
        if !self.has_room() {
            return Err(PilotError::ConversationOverflow {
                max_turns: self.max_turns,
            });
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn has_room(&self) -> bool {
        self.has_room_for(1)
    }

    /// True if `count` more turns fit under the ceiling.
    pub fn has_room_for(&self, count: usize) -> bool {
        self.turns.len() + count <= self.max_turns
    }

    /// Reject up front when an observer turn and its reply would not both fit.
    pub fn reserve_exchange(&self) -> PilotResult<()> {
        if self.has_room_for(2) {
            Ok(())
        } else {
            Err(PilotError::ConversationOverflow {
                max_turns: self.max_turns,
            })
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{Role, Segment};

    #[test]
    fn preserves_order_and_enforces_ceiling() {
        let mut store = ConversationStore::new(3);
        store.append(Turn::observer(vec![Segment::text("a")])).unwrap();
        store.append(Turn::reasoner(vec![Segment::text("b")])).unwrap();
        store.append(Turn::observer(vec![Segment::text("c")])).unwrap();
        assert!(!store.has_room());

        let err = store.append(Turn::reasoner(vec![Segment::text("d")])).unwrap_err();
        assert!(matches!(err, PilotError::ConversationOverflow { max_turns: 3 }));
        assert_eq!(store.len(), 3);

        let texts: Vec<String> = store.turns().iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(store.last().map(|t| t.role), Some(Role::Observer));
    }

    #[test]
    fn exchange_needs_room_for_both_turns() {
        let mut store = ConversationStore::new(3);
        assert!(store.reserve_exchange().is_ok());
        store.append(Turn::observer(vec![Segment::text("a")])).unwrap();
        store.append(Turn::reasoner(vec![Segment::text("b")])).unwrap();
        assert!(store.has_room());
        assert!(matches!(
            store.reserve_exchange(),
            Err(PilotError::ConversationOverflow { max_turns: 3 })
        ));
    }

    #[test]
    fn identical_turns_are_not_deduplicated() {
        let mut store = ConversationStore::new(4);
        let turn = Turn::observer(vec![Segment::text("same")]);
        store.append(turn.clone()).unwrap();
        store.append(turn).unwrap();
        assert_eq!(store.len(), 2);
    }
}
