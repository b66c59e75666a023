//! Windowing for packet streams
//!
//! Records are batched into fixed-width, non-overlapping epochs derived from a
//! time field carried by each record. Epoch ids are assigned independently by
//! every [`EpochOperator`] instance and start at 0.
//!
//! ```text
//! time:   t0 ------ t0+w ------ t0+2w ------ t0+3w
//! eid:    [   0    ][    1     ][     2     ]
//! flush:           ^ {eid: 0}  ^ {eid: 1}   ^ {eid: 2}
//! ```
//!
//! Stateful operators downstream (grouping, distinct, join) key their state
//! on these windows and release it when the flush for a window arrives.

pub mod epoch;

pub use epoch::EpochOperator;
