//! Key projections and predicates shared by operators and queries
//!
//! Grouping, distinct and join operators take a projection closure that picks
//! the key fields out of a record. The helpers here build the common ones, plus
//! the threshold and TCP predicates used by the detection queries.

use crate::error::Result;
use flowwatch_types::net::{fields, IPPROTO_TCP};
use flowwatch_types::Tuple;

/// Project onto the listed fields
///
/// # Example
///
/// ```rust
/// use flowwatch_types::Tuple;
/// use processor::core::filter_groups;
///
/// let by_port = filter_groups(&["l4.dport"]);
/// let key = by_port(&Tuple::new().with("l4.dport", 22i64).with("l4.sport", 5000i64));
/// assert_eq!(key, Tuple::new().with("l4.dport", 22i64));
/// ```
pub fn filter_groups<S: AsRef<str>>(
    keys: &[S],
) -> impl Fn(&Tuple) -> Tuple + Send + Sync + Clone + 'static {
    let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
    move |tuple: &Tuple| tuple.project(&keys)
}

/// Map every record to the same, empty key
pub fn single_group(_tuple: &Tuple) -> Tuple {
    Tuple::new()
}

/// Project onto the listed fields, renaming each `(old, new)` pair
pub fn rename_filtered_keys<S: AsRef<str>>(
    pairs: &[(S, S)],
) -> impl Fn(&Tuple) -> Tuple + Send + Sync + Clone + 'static {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(old, new)| (old.as_ref().to_string(), new.as_ref().to_string()))
        .collect();
    move |tuple: &Tuple| tuple.project_renamed(&pairs)
}

/// True when the integer `field` is at least `threshold`
pub fn key_geq_int<S: Into<String>>(
    field: S,
    threshold: i64,
) -> impl Fn(&Tuple) -> Result<bool> + Send + Sync + Clone + 'static {
    let field = field.into();
    move |tuple: &Tuple| -> Result<bool> { Ok(tuple.get_int(&field)? >= threshold) }
}

/// True when the integer `field` is at most `threshold`
pub fn key_leq_int<S: Into<String>>(
    field: S,
    threshold: i64,
) -> impl Fn(&Tuple) -> Result<bool> + Send + Sync + Clone + 'static {
    let field = field.into();
    move |tuple: &Tuple| -> Result<bool> { Ok(tuple.get_int(&field)? <= threshold) }
}

/// True for TCP records. Reads only `ipv4.proto`.
pub fn is_tcp(tuple: &Tuple) -> Result<bool> {
    Ok(tuple.get_int(fields::IPV4_PROTO)? == IPPROTO_TCP)
}

/// TCP records whose flag byte equals `flags` exactly
pub fn is_tcp_with_flags(
    flags: i64,
) -> impl Fn(&Tuple) -> Result<bool> + Send + Sync + Clone + 'static {
    move |tuple: &Tuple| -> Result<bool> {
        Ok(is_tcp(tuple)? && tuple.get_int(fields::L4_FLAGS)? == flags)
    }
}

/// TCP records with every bit of `bits` set in the flag byte
pub fn is_tcp_with_flag_bits(
    bits: i64,
) -> impl Fn(&Tuple) -> Result<bool> + Send + Sync + Clone + 'static {
    move |tuple: &Tuple| -> Result<bool> {
        Ok(is_tcp(tuple)? && (tuple.get_int(fields::L4_FLAGS)? & bits) == bits)
    }
}

/// TCP records addressed to destination port `port`
pub fn is_tcp_to_port(
    port: i64,
) -> impl Fn(&Tuple) -> Result<bool> + Send + Sync + Clone + 'static {
    move |tuple: &Tuple| -> Result<bool> {
        Ok(is_tcp(tuple)? && tuple.get_int(fields::L4_DPORT)? == port)
    }
}

/// Build a join extractor returning `(key projection, selected value fields)`
pub fn join_fields<K, S>(
    key: K,
    values: &[S],
) -> impl Fn(&Tuple) -> (Tuple, Tuple) + Send + Sync + 'static
where
    K: Fn(&Tuple) -> Tuple + Send + Sync + 'static,
    S: AsRef<str>,
{
    let values = filter_groups(values);
    move |tuple: &Tuple| (key(tuple), values(tuple))
}
