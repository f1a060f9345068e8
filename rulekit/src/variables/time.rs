//! Clock-derived variables (`TIME`, `TIME_MIN`, ...).
//!
//! All fields read local wall-clock time through an injectable [`Clock`] and
//! ignore the transaction. Values are formatted the way `strftime` would,
//! so `TIME_MIN` at 09:05 is `"05"`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::transaction::Transaction;
use crate::variables::{Variable, VariableValue};

/// Source of "now".
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    /// `HH:MM:SS`
    Time,
    /// Seconds since the Unix epoch.
    Epoch,
    Year,
    /// Month, `01`-`12`.
    Month,
    Day,
    Hour,
    Minute,
    Second,
    /// Day of week, `0` (Sunday) - `6`.
    Weekday,
}

impl TimeField {
    pub const ALL: [TimeField; 9] = [
        TimeField::Time,
        TimeField::Epoch,
        TimeField::Year,
        TimeField::Month,
        TimeField::Day,
        TimeField::Hour,
        TimeField::Minute,
        TimeField::Second,
        TimeField::Weekday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TimeField::Time => "TIME",
            TimeField::Epoch => "TIME_EPOCH",
            TimeField::Year => "TIME_YEAR",
            TimeField::Month => "TIME_MON",
            TimeField::Day => "TIME_DAY",
            TimeField::Hour => "TIME_HOUR",
            TimeField::Minute => "TIME_MIN",
            TimeField::Second => "TIME_SEC",
            TimeField::Weekday => "TIME_WDAY",
        }
    }

    /// Look up by upper-case variable name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    pub fn format(self, now: &DateTime<Local>) -> String {
        let pattern = match self {
            TimeField::Epoch => return now.timestamp().to_string(),
            TimeField::Time => "%H:%M:%S",
            TimeField::Year => "%Y",
            TimeField::Month => "%m",
            TimeField::Day => "%d",
            TimeField::Hour => "%H",
            TimeField::Minute => "%M",
            TimeField::Second => "%S",
            TimeField::Weekday => "%w",
        };
        now.format(pattern).to_string()
    }
}

#[derive(Debug, Clone)]
pub struct TimeVariable {
    field: TimeField,
    clock: Arc<dyn Clock>,
}

impl TimeVariable {
    pub fn new(field: TimeField, clock: Arc<dyn Clock>) -> Self {
        Self { field, clock }
    }

    /// `TIME_MIN`: current minute of the hour.
    pub fn minute(clock: Arc<dyn Clock>) -> Self {
        Self::new(TimeField::Minute, clock)
    }
}

impl Variable for TimeVariable {
    fn name(&self) -> &str {
        self.field.name()
    }

    fn evaluate(&self, _transaction: &Transaction) -> Vec<VariableValue> {
        let now = self.clock.now();
        vec![VariableValue::new(self.field.name(), self.field.format(&now))]
    }
}
