// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The full device state record and single-field updates.

use std::fmt;

use crate::error::ValueError;
use crate::types::Brightness;

/// The complete set of a plug's controllable fields.
///
/// This record is exchanged atomically with the device: a read returns
/// all fields and a write must supply all fields. The serialized field
/// names match the vendor wire shape.
///
/// There is deliberately no `Default` implementation — a `PlugState`
/// must originate from a device read (or an explicit construction in
/// tests), never from made-up values.
///
/// # Examples
///
/// ```
/// use plugbridge::state::{FieldUpdate, PlugState};
///
/// let current = PlugState {
///     power: false,
///     nightlight: true,
///     indicator: true,
///     nightlight_brightness: plugbridge::types::Brightness::new(40).unwrap(),
///     max_work_time: 0,
///     child_lock: false,
/// };
///
/// // Merging a single-field update leaves every other field intact.
/// let merged = current.with(FieldUpdate::Power(true));
/// assert!(merged.power);
/// assert!(merged.nightlight);
/// assert_eq!(merged.nightlight_brightness.value(), 40);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlugState {
    /// Relay power state.
    #[serde(rename = "pwr")]
    pub power: bool,
    /// Nightlight on/off.
    #[serde(rename = "ntlight")]
    pub nightlight: bool,
    /// Status indicator LED on/off.
    #[serde(rename = "indicator")]
    pub indicator: bool,
    /// Nightlight brightness (0-100).
    #[serde(rename = "ntlbrightness")]
    pub nightlight_brightness: Brightness,
    /// Auto-off timer in minutes (0 disables it).
    #[serde(rename = "maxworktime")]
    pub max_work_time: u32,
    /// Physical button lock.
    #[serde(rename = "childlock")]
    pub child_lock: bool,
}

impl PlugState {
    /// Returns a copy of this state with a single field replaced.
    ///
    /// This is the merge step of the mandatory read-before-write policy:
    /// the caller reads the current full state, merges the one changed
    /// field, and sends the result back in full.
    #[must_use]
    pub fn with(&self, update: FieldUpdate) -> Self {
        let mut next = *self;
        match update {
            FieldUpdate::Power(on) => next.power = on,
            FieldUpdate::Nightlight(on) => next.nightlight = on,
            FieldUpdate::Indicator(on) => next.indicator = on,
            FieldUpdate::NightlightBrightness(level) => next.nightlight_brightness = level,
            FieldUpdate::MaxWorkTime(minutes) => next.max_work_time = minutes,
            FieldUpdate::ChildLock(locked) => next.child_lock = locked,
        }
        next
    }

    /// Returns the current value of a single field.
    #[must_use]
    pub fn value_of(&self, field: Field) -> FieldValue {
        match field {
            Field::Power => FieldValue::Bool(self.power),
            Field::Nightlight => FieldValue::Bool(self.nightlight),
            Field::Indicator => FieldValue::Bool(self.indicator),
            Field::NightlightBrightness => {
                FieldValue::Number(u32::from(self.nightlight_brightness.value()))
            }
            Field::MaxWorkTime => FieldValue::Number(self.max_work_time),
            Field::ChildLock => FieldValue::Bool(self.child_lock),
        }
    }
}

/// Names of the individual fields in a [`PlugState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Relay power.
    Power,
    /// Nightlight on/off.
    Nightlight,
    /// Status indicator LED.
    Indicator,
    /// Nightlight brightness.
    NightlightBrightness,
    /// Auto-off timer.
    MaxWorkTime,
    /// Physical button lock.
    ChildLock,
}

impl Field {
    /// Returns the field name as used in the wire shape.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Power => "pwr",
            Self::Nightlight => "ntlight",
            Self::Indicator => "indicator",
            Self::NightlightBrightness => "ntlbrightness",
            Self::MaxWorkTime => "maxworktime",
            Self::ChildLock => "childlock",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A primitive value read from or written to a single field.
///
/// This is the value shape exchanged with the host platform's
/// characteristic handlers: booleans and numbers only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    /// A boolean field value.
    Bool(bool),
    /// A numeric field value.
    Number(u32),
}

/// A single-field update to be merged into a full [`PlugState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    /// Set relay power.
    Power(bool),
    /// Set the nightlight on/off.
    Nightlight(bool),
    /// Set the status indicator LED.
    Indicator(bool),
    /// Set the nightlight brightness.
    NightlightBrightness(Brightness),
    /// Set the auto-off timer in minutes.
    MaxWorkTime(u32),
    /// Set the physical button lock.
    ChildLock(bool),
}

impl FieldUpdate {
    /// Returns the field this update targets.
    #[must_use]
    pub const fn field(&self) -> Field {
        match self {
            Self::Power(_) => Field::Power,
            Self::Nightlight(_) => Field::Nightlight,
            Self::Indicator(_) => Field::Indicator,
            Self::NightlightBrightness(_) => Field::NightlightBrightness,
            Self::MaxWorkTime(_) => Field::MaxWorkTime,
            Self::ChildLock(_) => Field::ChildLock,
        }
    }

    /// Builds an update for a field from a host-supplied primitive value.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::WrongType` if the primitive does not match
    /// the field's type, or `ValueError::OutOfRange` for an invalid
    /// brightness.
    pub fn from_value(field: Field, value: FieldValue) -> Result<Self, ValueError> {
        match (field, value) {
            (Field::Power, FieldValue::Bool(on)) => Ok(Self::Power(on)),
            (Field::Nightlight, FieldValue::Bool(on)) => Ok(Self::Nightlight(on)),
            (Field::Indicator, FieldValue::Bool(on)) => Ok(Self::Indicator(on)),
            (Field::NightlightBrightness, FieldValue::Number(level)) => {
                let level = u8::try_from(level).map_err(|_| ValueError::OutOfRange {
                    min: 0,
                    max: u16::from(Brightness::MAX),
                    actual: u16::try_from(level).unwrap_or(u16::MAX),
                })?;
                Ok(Self::NightlightBrightness(Brightness::new(level)?))
            }
            (Field::MaxWorkTime, FieldValue::Number(minutes)) => Ok(Self::MaxWorkTime(minutes)),
            (Field::ChildLock, FieldValue::Bool(locked)) => Ok(Self::ChildLock(locked)),
            (Field::Power | Field::Nightlight | Field::Indicator | Field::ChildLock, _) => {
                Err(ValueError::WrongType {
                    field: field.as_str(),
                    expected: "boolean",
                })
            }
            (Field::NightlightBrightness | Field::MaxWorkTime, _) => Err(ValueError::WrongType {
                field: field.as_str(),
                expected: "number",
            }),
        }
    }
}
