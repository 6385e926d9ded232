#[cfg(test)]
mod tests_impl {
    use crate::core::firewall::{Direction, Protocol, RuleIndex};
    use crate::core::query::DecisionReason;
    use crate::core::test_helpers::{index_from, query};

    #[test]
    fn test_range_rule_scenario() {
        let index = index_from("inbound,tcp:80,192.168.1.1-192.168.1.10");

        assert!(index.accept("inbound", "tcp", 80, "192.168.1.5"));
        assert!(!index.accept("inbound", "tcp", 80, "192.168.1.11"));
        assert!(!index.accept("inbound", "tcp", 81, "192.168.1.5"));
        assert!(!index.accept("outbound", "tcp", 80, "192.168.1.5"));
    }

    #[test]
    fn test_single_address_scenario() {
        let index = index_from("inbound,udp:53,8.8.8.8");

        assert!(index.accept("inbound", "udp", 53, "8.8.8.8"));
        assert!(!index.accept("inbound", "udp", 53, "8.8.4.4"));
    }

    #[test]
    fn test_range_endpoints_are_inclusive() {
        let index = index_from("outbound,tcp,443,10.0.0.10-10.0.0.20");

        assert!(index.accept("outbound", "tcp", 443, "10.0.0.10"));
        assert!(index.accept("outbound", "tcp", 443, "10.0.0.20"));
        assert!(!index.accept("outbound", "tcp", 443, "10.0.0.9"));
        assert!(!index.accept("outbound", "tcp", 443, "10.0.0.21"));
    }

    #[test]
    fn test_neighbor_covered_by_another_rule_is_accepted() {
        let index = index_from(
            "outbound,tcp,443,10.0.0.10-10.0.0.20\n\
             outbound,tcp,443,10.0.0.21",
        );
        assert!(index.accept("outbound", "tcp", 443, "10.0.0.21"));
        assert!(!index.accept("outbound", "tcp", 443, "10.0.0.22"));
    }

    #[test]
    fn test_criteria_from_different_rules_combine_within_bucket() {
        // Port and address sets are per bucket, not per rule: port 22 from
        // one rule and 1.1.1.1 from another together allow 22 from 1.1.1.1.
        let index = index_from(
            "inbound,tcp,22,10.0.0.1\n\
             inbound,tcp,80,1.1.1.1",
        );
        assert!(index.accept("inbound", "tcp", 22, "1.1.1.1"));
    }

    #[test]
    fn test_buckets_are_independent() {
        let index = index_from("outbound,udp,1000-2000,52.12.48.92");
        assert!(index.accept("outbound", "udp", 1500, "52.12.48.92"));
        for (dir, proto) in [("inbound", "udp"), ("outbound", "tcp"), ("inbound", "tcp")] {
            assert!(!index.accept(dir, proto, 1500, "52.12.48.92"));
        }
    }

    #[test]
    fn test_unrecognized_fields_fail_closed() {
        let index = index_from("inbound,tcp,80,0.0.0.0-255.255.255.255");
        assert!(index.accept("inbound", "tcp", 80, "1.2.3.4"));
        assert!(!index.accept("INBOUND", "tcp", 80, "1.2.3.4"));
        assert!(!index.accept("inbound", "TCP", 80, "1.2.3.4"));
        assert!(!index.accept("", "", 80, "1.2.3.4"));
        assert!(!index.accept("inbound", "tcp", 80, "not-an-ip"));
        assert!(!index.accept("inbound", "tcp", 80, "1.2.3.256"));
    }

    #[test]
    fn test_overlapping_ranges_all_apply() {
        let index = index_from(
            "inbound,tcp,80,10.0.0.0-10.0.0.100\n\
             inbound,tcp,80,10.0.0.50-10.0.0.200\n\
             inbound,tcp,80,10.0.0.50-10.0.0.200",
        );
        for ip in ["10.0.0.0", "10.0.0.75", "10.0.0.200"] {
            assert!(index.accept("inbound", "tcp", 80, ip), "{ip}");
        }
        assert!(!index.accept("inbound", "tcp", 80, "10.0.0.201"));
    }

    #[test]
    fn test_widest_matching_range_is_reported() {
        let index = index_from(
            "inbound,tcp,80,10.0.0.5-10.0.0.6\n\
             inbound,tcp,80,10.0.0.0-10.0.0.255",
        );
        let decision = index.evaluate(&query(Direction::Inbound, Protocol::Tcp, 80, "10.0.0.5"));
        assert!(decision.accepted);
        let DecisionReason::RangeMatched { low, high } = decision.reason else {
            panic!("expected a range match, got {:?}", decision.reason);
        };
        assert_eq!(low.to_string(), "10.0.0.0");
        assert_eq!(high.to_string(), "10.0.0.255");
    }

    #[test]
    fn test_index_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleIndex>();

        let index = index_from("inbound,tcp,1-1024,10.0.0.0-10.255.255.255");
        let verdicts: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4u16)
                .map(|i| {
                    let index = &index;
                    s.spawn(move || index.accept("inbound", "tcp", 100 + i, "10.1.2.3"))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(verdicts, vec![true; 4]);
    }
}

#[cfg(test)]
mod property_tests {
    use crate::core::address::NumericIp;
    use crate::core::firewall::{Direction, Protocol, RangeOrder, RuleIndex};
    use crate::core::rule::PortSpec;
    use crate::core::test_helpers::{index_with_order, query};
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    prop_compose! {
        fn arb_direction()(inbound in any::<bool>()) -> Direction {
            if inbound { Direction::Inbound } else { Direction::Outbound }
        }
    }

    prop_compose! {
        fn arb_protocol()(tcp in any::<bool>()) -> Protocol {
            if tcp { Protocol::Tcp } else { Protocol::Udp }
        }
    }

    prop_compose! {
        // Addresses clustered in 10.0.0.0/22 so that random queries hit
        // random ranges often enough to matter.
        fn arb_addr()(host in 0u32..1024) -> Ipv4Addr {
            Ipv4Addr::from(0x0a00_0000 + host)
        }
    }

    prop_compose! {
        fn arb_range()(a in arb_addr(), b in arb_addr()) -> (Ipv4Addr, Ipv4Addr) {
            (a.min(b), a.max(b))
        }
    }

    prop_compose! {
        fn arb_rule_line()(
            direction in arb_direction(),
            protocol in arb_protocol(),
            start in 0u16..64,
            len in 0u16..8,
            single in proptest::option::of(arb_addr()),
            range in arb_range(),
        ) -> String {
            let ports = if len == 0 { start.to_string() } else { format!("{start}-{}", start + len) };
            let addr = match single {
                Some(a) => a.to_string(),
                None => format!("{}-{}", range.0, range.1),
            };
            format!("{direction},{protocol},{ports},{addr}")
        }
    }

    /// Straight-line reference: scans the raw rule lines, no index.
    fn reference_accept(rules: &[String], dir: Direction, proto: Protocol, port: u16, ip: Ipv4Addr) -> bool {
        let mut port_ok = false;
        let mut addr_ok = false;
        for line in rules {
            let fields: Vec<&str> = line.split(',').collect();
            if fields[0] != dir.as_ref() || fields[1] != proto.as_ref() {
                continue;
            }
            let (lo, hi) = fields[2]
                .split_once('-')
                .map_or((fields[2], fields[2]), |(a, b)| (a, b));
            let (lo, hi): (u16, u16) = (lo.parse().unwrap(), hi.parse().unwrap());
            port_ok |= (lo..=hi).contains(&port);
            let (a, b) = fields[3]
                .split_once('-')
                .map_or((fields[3], fields[3]), |(a, b)| (a, b));
            let (a, b): (Ipv4Addr, Ipv4Addr) = (a.parse().unwrap(), b.parse().unwrap());
            addr_ok |= a <= ip && ip <= b;
        }
        port_ok && addr_ok
    }

    proptest! {
        #[test]
        fn test_index_agrees_with_reference(
            rules in proptest::collection::vec(arb_rule_line(), 0..24),
            dir in arb_direction(),
            proto in arb_protocol(),
            port in 0u16..80,
            ip in arb_addr(),
        ) {
            let index = index_with_order(&rules.join("\n"), RangeOrder::WidestFirst);
            prop_assert_eq!(
                index.accept(dir.as_ref(), proto.as_ref(), port, &ip.to_string()),
                reference_accept(&rules, dir, proto, port, ip)
            );
        }

        #[test]
        fn test_scan_order_never_changes_verdict(
            rules in proptest::collection::vec(arb_rule_line(), 0..24),
            dir in arb_direction(),
            proto in arb_protocol(),
            port in 0u16..80,
            ip in arb_addr(),
        ) {
            let text = rules.join("\n");
            let widest = index_with_order(&text, RangeOrder::WidestFirst);
            let inserted = index_with_order(&text, RangeOrder::Insertion);
            let q = query(dir, proto, port, &ip.to_string());
            prop_assert_eq!(widest.evaluate(&q).accepted, inserted.evaluate(&q).accepted);
        }

        #[test]
        fn test_accept_is_pure(
            rules in proptest::collection::vec(arb_rule_line(), 1..12),
            port in 0u16..80,
            ip in arb_addr(),
        ) {
            let index = index_with_order(&rules.join("\n"), RangeOrder::WidestFirst);
            let q = query(Direction::Inbound, Protocol::Tcp, port, &ip.to_string());
            let first = index.evaluate(&q);
            for _ in 0..3 {
                prop_assert_eq!(&index.evaluate(&q), &first);
            }
        }

        #[test]
        fn test_port_range_equals_individual_ports(start in any::<u16>(), len in 0u16..512, probe in any::<u16>()) {
            let end = start.saturating_add(len);
            let mut ranged = RuleIndex::new();
            ranged
                .insert_port_rule(Direction::Outbound, Protocol::Udp, PortSpec::Range { start, end })
                .unwrap();
            let mut single = RuleIndex::new();
            for port in start..=end {
                single
                    .insert_port_rule(Direction::Outbound, Protocol::Udp, PortSpec::single(port))
                    .unwrap();
            }
            for index in [&mut ranged, &mut single] {
                index
                    .insert_range_rule(Direction::Outbound, Protocol::Udp, "0.0.0.0", "255.255.255.255")
                    .unwrap();
            }
            prop_assert_eq!(
                ranged.accept("outbound", "udp", probe, "1.2.3.4"),
                single.accept("outbound", "udp", probe, "1.2.3.4")
            );
            prop_assert_eq!(ranged.stats(), single.stats());
        }

        #[test]
        fn test_absent_port_rejects_any_address(port in any::<u16>(), ip in any::<[u8; 4]>()) {
            let mut index = RuleIndex::new();
            index
                .insert_range_rule(Direction::Inbound, Protocol::Tcp, "0.0.0.0", "255.255.255.255")
                .unwrap();
            index
                .insert_address_rule(Direction::Inbound, Protocol::Tcp, &Ipv4Addr::from(ip).to_string())
                .unwrap();
            if port != u16::MAX {
                index
                    .insert_port_rule(Direction::Inbound, Protocol::Tcp, PortSpec::Range { start: port + 1, end: u16::MAX })
                    .unwrap();
            }
            prop_assert!(!index.accept("inbound", "tcp", port, &Ipv4Addr::from(ip).to_string()));
        }

        #[test]
        fn test_range_bounds_are_inclusive(a in any::<u32>(), b in any::<u32>()) {
            let (low, high) = (Ipv4Addr::from(a.min(b)), Ipv4Addr::from(a.max(b)));
            let mut index = RuleIndex::new();
            index
                .insert_port_rule(Direction::Inbound, Protocol::Udp, PortSpec::single(53))
                .unwrap();
            index
                .insert_range_rule(Direction::Inbound, Protocol::Udp, &low.to_string(), &high.to_string())
                .unwrap();

            prop_assert!(index.accept("inbound", "udp", 53, &low.to_string()));
            prop_assert!(index.accept("inbound", "udp", 53, &high.to_string()));
            if let Some(before) = NumericIp::from(low).prev() {
                prop_assert!(!index.accept("inbound", "udp", 53, &before.to_string()));
            }
            if let Some(after) = NumericIp::from(high).next() {
                prop_assert!(!index.accept("inbound", "udp", 53, &after.to_string()));
            }
        }

        #[test]
        fn test_unrecognized_direction_or_protocol_rejected(
            dir in "[a-zA-Z]{0,10}",
            proto in "[a-zA-Z]{0,6}",
            port in any::<u16>(),
        ) {
            prop_assume!(
                !matches!(dir.as_str(), "inbound" | "outbound")
                    || !matches!(proto.as_str(), "tcp" | "udp")
            );
            let mut index = RuleIndex::new();
            for d in [Direction::Inbound, Direction::Outbound] {
                for p in [Protocol::Tcp, Protocol::Udp] {
                    index.insert_port_rule(d, p, PortSpec::Range { start: 0, end: u16::MAX }).unwrap();
                    index.insert_range_rule(d, p, "0.0.0.0", "255.255.255.255").unwrap();
                }
            }
            prop_assert!(!index.accept(&dir, &proto, port, "1.2.3.4"));
        }
    }
}
