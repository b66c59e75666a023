//! Packet field names and TCP flag helpers shared by decoders and queries

/// Well-known field names produced by the packet decoder
pub mod fields {
    pub const TIME: &str = "time";
    pub const ETH_SRC: &str = "eth.src";
    pub const ETH_DST: &str = "eth.dst";
    pub const ETH_ETHERTYPE: &str = "eth.ethertype";
    pub const IPV4_HLEN: &str = "ipv4.hlen";
    pub const IPV4_PROTO: &str = "ipv4.proto";
    pub const IPV4_LEN: &str = "ipv4.len";
    pub const IPV4_SRC: &str = "ipv4.src";
    pub const IPV4_DST: &str = "ipv4.dst";
    pub const L4_SPORT: &str = "l4.sport";
    pub const L4_DPORT: &str = "l4.dport";
    pub const L4_FLAGS: &str = "l4.flags";
}

/// IP protocol number for TCP
pub const IPPROTO_TCP: i64 = 6;

pub const TCP_FIN: i64 = 1;
pub const TCP_SYN: i64 = 1 << 1;
pub const TCP_RST: i64 = 1 << 2;
pub const TCP_PSH: i64 = 1 << 3;
pub const TCP_ACK: i64 = 1 << 4;
pub const TCP_URG: i64 = 1 << 5;
pub const TCP_ECE: i64 = 1 << 6;
pub const TCP_CWR: i64 = 1 << 7;

const TCP_FLAG_NAMES: [(&str, i64); 8] = [
    ("FIN", TCP_FIN),
    ("SYN", TCP_SYN),
    ("RST", TCP_RST),
    ("PSH", TCP_PSH),
    ("ACK", TCP_ACK),
    ("URG", TCP_URG),
    ("ECE", TCP_ECE),
    ("CWR", TCP_CWR),
];

/// Render a TCP flag byte as `SYN|ACK` style text, lowest bit first.
pub fn tcp_flags_to_string(flags: i64) -> String {
    TCP_FLAG_NAMES
        .iter()
        .filter(|(_, bit)| flags & bit == *bit)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join("|")
}
