//! Canonical IP and CIDR arithmetic
//!
//! Every comparison works on the canonical 16-byte form of an address:
//! IPv4 addresses are widened with the standard v4-mapped prefix
//! (`::ffff:0:0/96`) so mixed inputs order consistently. Family checks stay
//! with the caller; two addresses from different families still compare
//! bytewise here.

use ipnet::IpNet;
use std::cmp::Ordering;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Widen an address to its canonical 16-byte form.
#[inline]
#[must_use]
pub fn widen(ip: &IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

/// Lexicographic comparison of two addresses in canonical form.
#[inline]
#[must_use]
pub fn byte_compare(a: &IpAddr, b: &IpAddr) -> Ordering {
    widen(a).cmp(&widen(b))
}

/// Inclusive `[first, last]` bounds of a CIDR.
#[inline]
#[must_use]
pub fn cidr_range(net: &IpNet) -> (IpAddr, IpAddr) {
    (net.network(), net.broadcast())
}

/// Number of addresses covered by a CIDR: `2^(bits - prefix)`.
///
/// Saturates at `u128::MAX` for an IPv6 `/0`, whose exact count does not fit.
#[inline]
#[must_use]
pub fn cidr_size(net: &IpNet) -> u128 {
    let shift = u32::from(net.max_prefix_len() - net.prefix_len());
    1u128.checked_shl(shift).unwrap_or(u128::MAX)
}

/// Successor of an address, carrying right-to-left through the bytes.
/// Overflow of the whole address wraps around to all-zero.
#[inline]
#[must_use]
pub fn successor(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => {
            let mut octets = v4.octets();
            carry(&mut octets);
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        IpAddr::V6(v6) => {
            let mut octets = v6.octets();
            carry(&mut octets);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    }
}

fn carry(octets: &mut [u8]) {
    for byte in octets.iter_mut().rev() {
        let (next, overflow) = byte.overflowing_add(1);
        *byte = next;
        if !overflow {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn widen_maps_v4_into_v6_space() {
        let widened = widen(&v4("10.0.0.1"));
        assert_eq!(&widened[..10], &[0u8; 10]);
        assert_eq!(&widened[10..12], &[0xff, 0xff]);
        assert_eq!(&widened[12..], &[10, 0, 0, 1]);

        let native: IpAddr = "::ffff:10.0.0.1".parse().unwrap();
        assert_eq!(widen(&native), widened);
    }

    #[test]
    fn byte_compare_orders_addresses() {
        assert_eq!(byte_compare(&v4("10.0.0.1"), &v4("10.0.0.2")), Ordering::Less);
        assert_eq!(byte_compare(&v4("10.0.0.2"), &v4("10.0.0.2")), Ordering::Equal);
        assert_eq!(
            byte_compare(&v4("10.0.1.0"), &v4("10.0.0.255")),
            Ordering::Greater
        );
        // v4 space sits inside the v4-mapped v6 range
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert_eq!(byte_compare(&v4("255.255.255.255"), &v6), Ordering::Less);
    }

    #[test]
    fn cidr_range_is_inclusive() {
        let net: IpNet = "192.168.1.0/24".parse().unwrap();
        let (first, last) = cidr_range(&net);
        assert_eq!(first, v4("192.168.1.0"));
        assert_eq!(last, v4("192.168.1.255"));

        let host: IpNet = "192.168.1.7/32".parse().unwrap();
        let (first, last) = cidr_range(&host);
        assert_eq!(first, last);
        assert_eq!(first, v4("192.168.1.7"));
    }

    #[test]
    fn cidr_size_counts_addresses() {
        let cases = [
            ("10.0.0.0/24", 256u128),
            ("10.0.0.0/30", 4),
            ("10.0.0.1/32", 1),
            ("10.0.0.0/8", 1 << 24),
            ("2001:db8::/120", 256),
        ];
        for (input, expected) in cases {
            let net: IpNet = input.parse().unwrap();
            assert_eq!(cidr_size(&net), expected, "size of {input}");
        }

        let all_v6: IpNet = "::/0".parse().unwrap();
        assert_eq!(cidr_size(&all_v6), u128::MAX);
    }

    #[test]
    fn successor_carries_and_wraps() {
        assert_eq!(successor(&v4("10.0.0.1")), v4("10.0.0.2"));
        assert_eq!(successor(&v4("10.0.0.255")), v4("10.0.1.0"));
        assert_eq!(successor(&v4("10.255.255.255")), v4("11.0.0.0"));
        assert_eq!(successor(&v4("255.255.255.255")), v4("0.0.0.0"));

        let v6: IpAddr = "2001:db8::ffff".parse().unwrap();
        assert_eq!(successor(&v6), "2001:db8::1:0".parse::<IpAddr>().unwrap());

        // successor stays in the address family
        assert!(matches!(successor(&v4("1.2.3.4")), IpAddr::V4(_)));
    }

    #[test]
    fn successor_walks_a_cidr() {
        let net: IpNet = "192.168.1.252/30".parse().unwrap();
        let (first, last) = cidr_range(&net);
        let mut current = first;
        let mut seen = vec![current];
        while current != last {
            current = successor(&current);
            seen.push(current);
        }
        assert_eq!(seen.len() as u128, cidr_size(&net));
        assert_eq!(seen[0], v4("192.168.1.252"));
        assert_eq!(seen[3], v4("192.168.1.255"));
    }
}
