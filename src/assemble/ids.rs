use std::collections::HashSet;

use crate::util::slugify;

/// Hands out element ids that are unique within one document.
///
/// Collisions get `_2`, `_3`, ... suffixes in request order. Participant and message-flow ids
/// carry a short token derived from the flow seed, so the same input always yields the same ids.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    seed: String,
    used: HashSet<String>,
    next_sequence_flow: usize,
}

impl IdAllocator {
    pub fn new(seed: &str) -> Self {
        IdAllocator {
            seed: seed.to_string(),
            used: HashSet::new(),
            next_sequence_flow: 1,
        }
    }

    /// Mark a fixed id as taken. Returns false when it already was.
    pub fn reserve(&mut self, id: &str) -> bool {
        self.used.insert(id.to_string())
    }

    /// Claim `hint` (made XML-safe), or the first free `<hint>_<n>` with n >= 2.
    pub fn claim(&mut self, hint: &str) -> String {
        let base = slugify(hint);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut idx = 2usize;
        loop {
            let candidate = format!("{base}_{idx}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            idx += 1;
        }
    }

    pub fn sequence_flow(&mut self) -> String {
        loop {
            let candidate = format!("SequenceFlow_{}", self.next_sequence_flow);
            self.next_sequence_flow += 1;
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    pub fn participant(&mut self, component_id: &str) -> String {
        let token = self.token(component_id);
        self.claim(&format!("Participant_{component_id}_{token}"))
    }

    pub fn message_flow(&mut self, component_id: &str) -> String {
        let token = self.token(component_id);
        self.claim(&format!("MessageFlow_{component_id}_{token}"))
    }

    /// Six hex characters of `blake3(seed ":" id)`.
    pub fn token(&self, id: &str) -> String {
        let digest = blake3::hash(format!("{}:{id}", self.seed).as_bytes());
        digest.to_hex()[..6].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collisions_get_counter_suffixes() {
        let mut ids = IdAllocator::new("flow");
        assert_eq!(ids.claim("task1"), "task1");
        assert_eq!(ids.claim("task1"), "task1_2");
        assert_eq!(ids.claim("task1"), "task1_3");
    }

    #[test]
    fn sequence_flows_skip_reserved_ids() {
        let mut ids = IdAllocator::new("flow");
        ids.reserve("SequenceFlow_1");
        assert_eq!(ids.sequence_flow(), "SequenceFlow_2");
        assert_eq!(ids.sequence_flow(), "SequenceFlow_3");
    }

    #[test]
    fn tokens_are_deterministic_per_seed() {
        let a = IdAllocator::new("Orders").token("c1");
        let b = IdAllocator::new("Orders").token("c1");
        let c = IdAllocator::new("Invoices").token("c1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn participant_and_message_flow_ids_share_token() {
        let mut ids = IdAllocator::new("Orders");
        let participant = ids.participant("c1");
        let flow = ids.message_flow("c1");
        let token = ids.token("c1");
        assert_eq!(participant, format!("Participant_c1_{token}"));
        assert_eq!(flow, format!("MessageFlow_c1_{token}"));
    }
}
