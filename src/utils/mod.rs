//! Utility functions and helpers
//!
//! This module contains clock and timestamp utilities.

pub mod time;

pub use time::{
    current_week, format_date, format_timestamp, parse_date, parse_timestamp, Clock, ManualClock,
    SystemClock,
};
