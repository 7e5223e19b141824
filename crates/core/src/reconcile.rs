//! Settlement notification reconciliation.
//!
//! Settlement results can reach a consumer over more than one path: the
//! realtime push channel and a REST polling fallback. The gate funnels
//! every path into one decision point keyed by trade id so the consumer
//! surfaces each settled trade exactly once, and never lets a weaker
//! (poll-derived) delivery overwrite a result that already arrived on
//! the push channel.
//!
//! Deliveries carry the engine's monotonic `seq`; anything at or below
//! the last applied sequence for a trade is dropped outright.

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::SettlementEvent;

#[derive(Debug, Clone, Copy)]
struct Applied {
    seq: u64,
    authoritative: bool,
}

/// A delivery the consumer should surface.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub event: SettlementEvent,
    /// True when this authoritative delivery supersedes a provisional
    /// one already surfaced for the same trade; the consumer should
    /// replace the displayed result in place rather than add a second
    /// notification.
    pub replaces_provisional: bool,
}

/// Idempotent per-trade notification gate.
#[derive(Debug)]
pub struct NotificationGate {
    applied: HashMap<Uuid, Applied>,
    cap: usize,
}

impl Default for NotificationGate {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl NotificationGate {
    /// Creates a gate remembering at most `cap` settled trades.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            applied: HashMap::new(),
            cap: cap.max(1),
        }
    }

    /// Offers a delivery from one of the reconciliation paths.
    ///
    /// `authoritative` marks the push channel (or a direct database
    /// read); polling fallbacks pass `false`. Returns the delivery to
    /// surface, or `None` when it is a duplicate, stale, or outranked.
    pub fn offer(&mut self, event: SettlementEvent, authoritative: bool) -> Option<Delivery> {
        let decision = match self.applied.get(&event.trade_id) {
            None => Some(Delivery {
                replaces_provisional: false,
                event: event.clone(),
            }),
            Some(prior) if prior.authoritative => None,
            Some(prior) => {
                if authoritative && event.seq >= prior.seq {
                    Some(Delivery {
                        replaces_provisional: true,
                        event: event.clone(),
                    })
                } else {
                    None
                }
            }
        };

        if decision.is_some() {
            self.applied.insert(
                event.trade_id,
                Applied {
                    seq: event.seq,
                    authoritative,
                },
            );
            self.prune();
        }
        decision
    }

    /// Number of trades the gate currently remembers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    fn prune(&mut self) {
        while self.applied.len() > self.cap {
            let oldest = self
                .applied
                .iter()
                .min_by_key(|(_, a)| a.seq)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    self.applied.remove(&id);
                }
                None => break,
            }
        }
    }
}
