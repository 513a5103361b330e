//! Client IP affinity strategy.

use crate::instance::ServiceInstance;
use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::Selector;

/// Maps a client IP to a fixed position in the candidate list.
///
/// The mapping is only stable while the candidate list keeps its length and
/// order. Requests without a client IP are spread round-robin.
#[derive(Debug, Default)]
pub struct IpHash {
    fallback: RoundRobin,
}

impl IpHash {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 32-bit rolling hash (`h = h * 31 + unit`) over the UTF-16 code units of `key`.
pub fn rolling_hash(key: &str) -> i32 {
    key.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

impl Selector for IpHash {
    fn next_instance<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        client_ip: Option<&str>,
    ) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        match client_ip {
            Some(ip) => {
                let index = rolling_hash(ip).unsigned_abs() as usize % candidates.len();
                candidates.get(index)
            }
            None => self.fallback.next_instance(candidates, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::instance;

    #[test]
    fn test_known_hash_values() {
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("a"), 97);
        assert_eq!(rolling_hash("ab"), 97 * 31 + 98);

        // Long keys wrap like 32-bit integer arithmetic.
        let ip = "192.168.100.200";
        let wide = ip
            .bytes()
            .fold(0i64, |h, b| (h * 31 + i64::from(b)) & 0xffff_ffff);
        assert_eq!(rolling_hash(ip), wide as u32 as i32);
    }

    #[test]
    fn test_same_ip_same_instance() {
        let lb = IpHash::new();
        let candidates = vec![instance("a", 1, 0), instance("b", 1, 0), instance("c", 1, 0)];
        let first = lb.next_instance(&candidates, Some("10.1.2.3")).unwrap().id.clone();
        for _ in 0..50 {
            assert_eq!(lb.next_instance(&candidates, Some("10.1.2.3")).unwrap().id, first);
        }
    }

    #[test]
    fn test_index_is_hash_mod_len() {
        let lb = IpHash::new();
        let candidates = vec![instance("a", 1, 0), instance("b", 1, 0), instance("c", 1, 0)];
        // "a" hashes to 97, 97 % 3 == 1
        assert_eq!(lb.next_instance(&candidates, Some("a")).unwrap().id, "b");
    }

    #[test]
    fn test_missing_ip_rotates() {
        let lb = IpHash::new();
        let candidates = vec![instance("a", 1, 0), instance("b", 1, 0)];
        assert_eq!(lb.next_instance(&candidates, None).unwrap().id, "a");
        assert_eq!(lb.next_instance(&candidates, None).unwrap().id, "b");
    }
}
