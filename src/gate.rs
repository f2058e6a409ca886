//! Last-request-wins bookkeeping for the evaluation boundary.
//!
//! Each client session carries a sequence number. Once a newer request has
//! been seen for a session, older requests are refused and results computed
//! for them are discarded instead of being returned. A session's entry is
//! dropped once its newest request finishes, so only sessions with a request
//! in flight occupy the map.

use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request {sequence} of session {session} was superseded by request {latest}")]
pub struct Superseded {
    pub session: String,
    pub sequence: u64,
    pub latest: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    session: String,
    sequence: u64,
}

impl Ticket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[derive(Debug, Default)]
pub struct RequestGate {
    latest: DashMap<String, u64>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sequence` as the newest request of `session`. Repeating the
    /// current sequence is allowed; going backwards is not.
    pub fn begin(&self, session: &str, sequence: u64) -> Result<Ticket, Superseded> {
        let mut latest = self.latest.entry(session.to_string()).or_insert(sequence);
        if *latest > sequence {
            return Err(Superseded {
                session: session.to_string(),
                sequence,
                latest: *latest,
            });
        }
        *latest = sequence;
        Ok(Ticket {
            session: session.to_string(),
            sequence,
        })
    }

    /// Issues the next sequence for a session whose client does not number
    /// its own requests.
    pub fn begin_next(&self, session: &str) -> Ticket {
        let mut latest = self.latest.entry(session.to_string()).or_insert(0);
        *latest += 1;
        Ticket {
            session: session.to_string(),
            sequence: *latest,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest
            .get(&ticket.session)
            .is_some_and(|latest| *latest == ticket.sequence)
    }

    /// Releases `value` only if no newer request arrived while it was computed.
    /// Finishing the newest request frees the session's slot.
    pub fn finish<T>(&self, ticket: &Ticket, value: T) -> Result<T, Superseded> {
        if self
            .latest
            .remove_if(&ticket.session, |_, latest| *latest == ticket.sequence)
            .is_some()
        {
            return Ok(value);
        }
        // no entry left means a request at least as new already finished
        let latest = self
            .latest
            .get(&ticket.session)
            .map_or(ticket.sequence, |latest| *latest);
        Err(Superseded {
            session: ticket.session.clone(),
            sequence: ticket.sequence,
            latest,
        })
    }

    /// Sessions with a request in flight.
    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_request_is_refused_after_newer_one() {
        let gate = RequestGate::new();
        gate.begin("s", 2).unwrap();
        let err = gate.begin("s", 1).unwrap_err();
        assert_eq!(err.latest, 2);
        assert!(gate.begin("s", 2).is_ok());
    }

    #[test]
    fn result_of_superseded_request_is_discarded() {
        let gate = RequestGate::new();
        let first = gate.begin("s", 1).unwrap();
        let second = gate.begin("s", 2).unwrap();

        assert!(!gate.is_current(&first));
        assert!(gate.finish(&first, "stale").is_err());
        assert_eq!(gate.finish(&second, "fresh"), Ok("fresh"));
    }

    #[test]
    fn sessions_are_independent() {
        let gate = RequestGate::new();
        gate.begin("a", 10).unwrap();
        assert!(gate.begin("b", 1).is_ok());
    }

    #[test]
    fn begin_next_supersedes_previous_ticket() {
        let gate = RequestGate::new();
        let t1 = gate.begin_next("s");
        let t2 = gate.begin_next("s");
        assert_eq!((t1.sequence(), t2.sequence()), (1, 2));
        assert!(!gate.is_current(&t1));
        assert!(gate.is_current(&t2));
    }

    #[test]
    fn finished_sessions_release_their_slot() {
        let gate = RequestGate::new();
        for i in 0..1_000 {
            let ticket = gate.begin_next(&format!("s{i}"));
            assert_eq!(gate.finish(&ticket, i), Ok(i));
        }
        assert!(gate.is_empty());
    }

    #[test]
    fn stale_finish_keeps_the_newer_slot() {
        let gate = RequestGate::new();
        let old = gate.begin("s", 1).unwrap();
        let new = gate.begin("s", 2).unwrap();

        assert!(gate.finish(&old, ()).is_err());
        assert_eq!(gate.len(), 1);
        assert!(gate.is_current(&new));
        assert!(gate.finish(&new, ()).is_ok());
        assert!(gate.is_empty());
    }

    #[test]
    fn stale_result_is_refused_after_newer_one_finished() {
        let gate = RequestGate::new();
        let old = gate.begin("s", 1).unwrap();
        let new = gate.begin("s", 2).unwrap();

        assert!(gate.finish(&new, ()).is_ok());
        assert!(gate.finish(&old, ()).is_err());
        assert!(gate.is_empty());
    }
}
