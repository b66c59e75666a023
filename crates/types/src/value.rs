//! Typed field values carried by tuples
//!
//! A [`Value`] is a closed sum over the shapes a decoded packet field can take.
//! [`Value::Empty`] is reserved as the seed of reductions and never appears as
//! a meaningful field value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// A 6-byte hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

/// A single field value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Float(f64),
    Int(i64),
    Ipv4(Ipv4Addr),
    Mac(MacAddr),
    /// Seed accumulator for reductions
    Empty,
}

impl Value {
    /// Short variant name, used in type-mismatch errors
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Float(_) => "float",
            Value::Int(_) => "int",
            Value::Ipv4(_) => "ipv4",
            Value::Mac(_) => "mac",
            Value::Empty => "empty",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            Value::Ipv4(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_mac(&self) -> Option<MacAddr> {
        match self {
            Value::Mac(mac) => Some(*mac),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Appends an unambiguous, variant-tagged rendering used for key derivation.
    ///
    /// `Int(1)` and `Float(1.0)` must never collide, so every fragment carries
    /// its variant tag; floats are rendered by bit pattern.
    pub(crate) fn write_key_fragment(&self, out: &mut String) {
        use std::fmt::Write;
        // Writing into a String cannot fail.
        let _ = match self {
            Value::Float(x) => write!(out, "f:{:016x}", x.to_bits()),
            Value::Int(n) => write!(out, "i:{n}"),
            Value::Ipv4(addr) => write!(out, "ip:{addr}"),
            Value::Mac(mac) => write!(out, "mac:{mac}"),
            Value::Empty => write!(out, "e"),
        };
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(x) => write!(f, "{x}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Ipv4(addr) => write!(f, "{addr}"),
            Value::Mac(mac) => write!(f, "{mac}"),
            Value::Empty => f.write_str("Empty"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Ipv4Addr> for Value {
    fn from(addr: Ipv4Addr) -> Self {
        Value::Ipv4(addr)
    }
}

impl From<MacAddr> for Value {
    fn from(mac: MacAddr) -> Self {
        Value::Mac(mac)
    }
}
