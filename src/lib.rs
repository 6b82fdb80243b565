// Copyright 2021 Parity Technologies (UK) Ltd.
// This file is part of scale-registry.
//
// scale-registry is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// scale-registry is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with scale-registry.  If not, see <http://www.gnu.org/licenses/>.

//! A crate to build registries of reusable SCALE decoders from the V14 metadata
//! handed back by substrate nodes.
//!
//! Given a [`frame_metadata::RuntimeMetadataV14`], a [`registry::Factory`] walks the
//! metadata type graph once and produces three lookup tables (calls, events and
//! errors), each mapping a stable identifier to a [`registry::Type`] whose decoders
//! can then be executed against SCALE encoded bytes over and over, without touching
//! the metadata again. See [`registry`] for more information.

pub mod registry;
pub mod value;

pub use registry::{CallRegistry, ErrorRegistry, EventId, EventRegistry, Factory, Field, RegistryError, Type};
pub use registry::{DecodeError, FieldDecoder};
pub use value::Value;

/// A re-export of the [`scale_info`] crate, since we delegate all type inspection to it.
pub use scale_info;
