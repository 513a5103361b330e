//! Weighted random load balancing strategy.

use rand::Rng;
use crate::instance::ServiceInstance;
use crate::load_balancer::Selector;

/// Picks an instance with probability proportional to its weight.
#[derive(Debug, Default)]
pub struct Weighted;

impl Weighted {
    pub fn new() -> Self {
        Self
    }
}

/// Walk the cumulative weights and return the first instance whose running
/// total reaches `draw`. Falls back to the first candidate when nothing
/// qualifies (all-zero weights, or a draw at the floating point edge).
pub fn pick_by_draw(candidates: &[ServiceInstance], draw: f64) -> Option<&ServiceInstance> {
    let mut cumulative = 0.0;
    for candidate in candidates {
        cumulative += f64::from(candidate.weight);
        if candidate.weight > 0 && cumulative >= draw {
            return Some(candidate);
        }
    }
    candidates.first()
}

impl Selector for Weighted {
    fn next_instance<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        _client_ip: Option<&str>,
    ) -> Option<&'a ServiceInstance> {
        let total: f64 = candidates.iter().map(|i| f64::from(i.weight)).sum();
        if total <= 0.0 {
            return candidates.first();
        }
        let draw = rand::thread_rng().gen_range(0.0..total);
        pick_by_draw(candidates, draw)
    }
}
