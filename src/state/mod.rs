// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state types and merge semantics.
//!
//! A plug exchanges its state atomically: reads return every field, and
//! writes must carry every field. Partial updates are therefore
//! expressed as a [`FieldUpdate`] merged against a freshly read
//! [`PlugState`] before being sent — sending a default-filled state
//! would silently reset physical settings nobody asked to change.

mod plug_state;

pub use plug_state::{Field, FieldUpdate, FieldValue, PlugState};
