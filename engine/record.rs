//! # Collision Records and Partial Queries
//!
//! The engine sees a collision as five categorical conditions plus an injury
//! label. `Conditions` doubles as the query type: any field left as `None` is
//! unconstrained, so the same struct describes a full observation, a
//! dropdown-driven point estimate, or a selection under construction during
//! chain search.

use std::fmt;

/// Upstream placeholder for an unrecorded category. Never produces a feature.
pub const UNSPECIFIED: &str = "Unspecified";

/// Day names indexed by the `dow` encoding (Sunday = 0).
const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// The categorical fields a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    VehicleType,
    PreCrash,
    Borough,
    Hour,
    DayOfWeek,
}

impl Field {
    /// Canonical field order. Feature hashing and chain search both iterate
    /// in exactly this order, which fixes tie-breaking between candidates.
    pub const ALL: [Field; 5] = [
        Field::VehicleType,
        Field::PreCrash,
        Field::Borough,
        Field::Hour,
        Field::DayOfWeek,
    ];

    /// Position of the field in `Field::ALL`.
    pub fn index(self) -> usize {
        match self {
            Self::VehicleType => 0,
            Self::PreCrash => 1,
            Self::Borough => 2,
            Self::Hour => 3,
            Self::DayOfWeek => 4,
        }
    }

    /// Stable key used when building hashed feature names.
    pub fn key(self) -> &'static str {
        match self {
            Self::VehicleType => "vehicleType",
            Self::PreCrash => "preCrash",
            Self::Borough => "borough",
            Self::Hour => "hour",
            Self::DayOfWeek => "dow",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::VehicleType => "Vehicle",
            Self::PreCrash => "Pre-crash action",
            Self::Borough => "Borough",
            Self::Hour => "Hour",
            Self::DayOfWeek => "Day of week",
        }
    }

    /// Whether the field holds a small integer rather than a category label.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Hour | Self::DayOfWeek)
    }

    /// Human rendering of a value of this field, e.g. `17:00` or `Wednesday`.
    pub fn format_value(self, value: &FieldValue) -> String {
        match (self, value) {
            (Self::Hour, FieldValue::Number(hour)) => format!("{hour:02}:00"),
            (Self::DayOfWeek, FieldValue::Number(day)) => WEEKDAY_NAMES
                .get(usize::from(*day))
                .map_or_else(|| day.to_string(), |name| (*name).to_string()),
            (_, value) => value.to_string(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A single value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Text(String),
    Number(u8),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// True for the upstream `Unspecified` placeholder.
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Self::Text(text) if text == UNSPECIFIED)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

/// A full or partial assignment of the categorical fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Conditions {
    pub vehicle_type: Option<String>,
    pub pre_crash: Option<String>,
    pub borough: Option<String>,
    pub hour: Option<u8>,
    pub dow: Option<u8>,
}

impl Conditions {
    /// The unconstrained query.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::VehicleType => self.vehicle_type.clone().map(FieldValue::Text),
            Field::PreCrash => self.pre_crash.clone().map(FieldValue::Text),
            Field::Borough => self.borough.clone().map(FieldValue::Text),
            Field::Hour => self.hour.map(FieldValue::Number),
            Field::DayOfWeek => self.dow.map(FieldValue::Number),
        }
    }

    pub fn is_constrained(&self, field: Field) -> bool {
        match field {
            Field::VehicleType => self.vehicle_type.is_some(),
            Field::PreCrash => self.pre_crash.is_some(),
            Field::Borough => self.borough.is_some(),
            Field::Hour => self.hour.is_some(),
            Field::DayOfWeek => self.dow.is_some(),
        }
    }

    /// Fields currently constrained, in canonical order.
    pub fn constrained_fields(&self) -> impl Iterator<Item = Field> + '_ {
        Field::ALL
            .into_iter()
            .filter(|field| self.is_constrained(*field))
    }

    /// Compares one field against `value` without allocating. An absent
    /// field never holds anything.
    pub fn holds(&self, field: Field, value: &FieldValue) -> bool {
        match (field, value) {
            (Field::VehicleType, FieldValue::Text(text)) => {
                self.vehicle_type.as_deref() == Some(text.as_str())
            }
            (Field::PreCrash, FieldValue::Text(text)) => {
                self.pre_crash.as_deref() == Some(text.as_str())
            }
            (Field::Borough, FieldValue::Text(text)) => {
                self.borough.as_deref() == Some(text.as_str())
            }
            (Field::Hour, FieldValue::Number(hour)) => self.hour == Some(*hour),
            (Field::DayOfWeek, FieldValue::Number(day)) => self.dow == Some(*day),
            _ => false,
        }
    }

    /// Assigns a field. Values are coerced to the field's kind: a number
    /// given for a category is stored as its decimal text, and text given for
    /// a numeric field is parsed, leaving the field unconstrained when the
    /// text is not a number in range.
    pub fn set(&mut self, field: Field, value: FieldValue) {
        match field {
            Field::VehicleType => self.vehicle_type = Some(value.to_string()),
            Field::PreCrash => self.pre_crash = Some(value.to_string()),
            Field::Borough => self.borough = Some(value.to_string()),
            Field::Hour => self.hour = numeric_in_range(&value, 23),
            Field::DayOfWeek => self.dow = numeric_in_range(&value, 6),
        }
    }

    pub fn clear(&mut self, field: Field) {
        match field {
            Field::VehicleType => self.vehicle_type = None,
            Field::PreCrash => self.pre_crash = None,
            Field::Borough => self.borough = None,
            Field::Hour => self.hour = None,
            Field::DayOfWeek => self.dow = None,
        }
    }

    /// Returns a copy with one more assignment.
    pub fn with(&self, field: Field, value: FieldValue) -> Self {
        let mut next = self.clone();
        next.set(field, value);
        next
    }

    /// True when `other` satisfies every constraint in `self`.
    pub fn is_matched_by(&self, other: &Conditions) -> bool {
        fn agrees<T: PartialEq>(wanted: &Option<T>, actual: &Option<T>) -> bool {
            match wanted {
                None => true,
                Some(value) => actual.as_ref() == Some(value),
            }
        }

        agrees(&self.vehicle_type, &other.vehicle_type)
            && agrees(&self.pre_crash, &other.pre_crash)
            && agrees(&self.borough, &other.borough)
            && agrees(&self.hour, &other.hour)
            && agrees(&self.dow, &other.dow)
    }
}

fn numeric_in_range(value: &FieldValue, max: u8) -> Option<u8> {
    let number = match value {
        FieldValue::Number(number) => Some(*number),
        FieldValue::Text(text) => text.trim().parse::<u8>().ok(),
    };
    number.filter(|n| *n <= max)
}

/// One flattened collision observation as supplied by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub conditions: Conditions,
    /// Whether anyone was injured. This is the training label.
    pub injured: bool,
    /// Carried for consumers; the engine ignores it.
    pub severity: Option<f64>,
    /// Carried for consumers; the engine ignores it.
    pub injured_count: Option<u32>,
}

impl Record {
    pub fn new(conditions: Conditions, injured: bool) -> Self {
        Self {
            conditions,
            injured,
            severity: None,
            injured_count: None,
        }
    }

    pub fn label(&self) -> f64 {
        if self.injured { 1.0 } else { 0.0 }
    }
}
