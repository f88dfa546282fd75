//! BPF filter builders

/// All ARP packets
pub fn arp_filter() -> String {
    "arp".to_string()
}

/// All TCP segments, IPv4 or IPv6
pub fn tcp_filter() -> String {
    "tcp".to_string()
}

/// `filter` inside a single 802.1Q tag
pub fn vlan_wrapped(filter: &str) -> String {
    format!("vlan and ({})", filter)
}

/// Combine multiple filters with OR logic
pub fn combine_filters_or(filters: &[&str]) -> String {
    if filters.is_empty() {
        return String::new();
    }

    filters
        .iter()
        .map(|f| format!("({})", f))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Filter matching what the enabled handlers can act on
///
/// Untagged and single-tagged frames are both kept. Returns `None` when no
/// handler needs either protocol.
pub fn handler_filter(arp: bool, tcp: bool) -> Option<String> {
    let base = match (arp, tcp) {
        (true, true) => combine_filters_or(&[&arp_filter(), &tcp_filter()]),
        (true, false) => arp_filter(),
        (false, true) => tcp_filter(),
        (false, false) => return None,
    };
    Some(combine_filters_or(&[&base, &vlan_wrapped(&base)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_filters() {
        assert_eq!(arp_filter(), "arp");
        assert_eq!(tcp_filter(), "tcp");
    }

    #[test]
    fn test_combine_filters_or() {
        let combined = combine_filters_or(&["tcp port 80", "tcp port 443"]);
        assert_eq!(combined, "(tcp port 80) or (tcp port 443)");
        assert_eq!(combine_filters_or(&[]), "");
    }

    #[test]
    fn test_handler_filter() {
        assert_eq!(handler_filter(false, false), None);
        assert_eq!(
            handler_filter(true, false).unwrap(),
            "(arp) or (vlan and (arp))"
        );
        assert_eq!(
            handler_filter(true, true).unwrap(),
            "((arp) or (tcp)) or (vlan and ((arp) or (tcp)))"
        );
    }
}
