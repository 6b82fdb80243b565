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

//! Given the V14 metadata obtained from a substrate node, this module exposes a
//! [`Factory`] that builds registries of decoders for the calls, events and errors
//! the runtime declares, and the [`Type`] entries those registries hand back.
//!
//! A registry is built once per metadata and is immutable afterwards; decoding the
//! same entry many times re-uses the decoder graph built up front.

mod factory;
mod field_decoder;
mod u8_map;

use crate::value::Value;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;

pub use factory::Factory;
pub use field_decoder::{
	ArrayDecoder, BitSequenceDecoder, CompositeDecoder, DecodeError, FieldDecoder, RecursiveDecoder, SequenceDecoder,
	ValueDecoder, VariantDecoder,
};

/// Maps a call name, `"Pallet.call"`, to the [`Type`] decoding its arguments.
pub type CallRegistry = HashMap<String, Type>;

/// Maps an error name, `"Pallet.Error"`, to the [`Type`] decoding its fields.
pub type ErrorRegistry = HashMap<String, Type>;

/// Maps an [`EventId`] to the [`Type`] decoding that event's fields.
pub type EventRegistry = HashMap<EventId, Type>;

/// Identifies an event by the pallet index and the event variant index, the two
/// bytes that prefix an encoded event. This is deliberately a distinct type
/// rather than a plain `[u8; 2]`, so that it cannot be mixed up with other
/// two byte values when looking things up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub [u8; 2]);

impl EventId {
	pub fn new(pallet_index: u8, variant_index: u8) -> EventId {
		EventId([pallet_index, variant_index])
	}

	pub fn pallet_index(&self) -> u8 {
		self.0[0]
	}

	pub fn variant_index(&self) -> u8 {
		self.0[1]
	}
}

impl Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.0[0], self.0[1])
	}
}

/// A registry entry: a named, ordered list of fields. Decoding one executes
/// each field's decoder in order against the byte stream.
#[derive(Debug)]
pub struct Type {
	pub name: String,
	pub fields: Vec<Field>,
}

impl Type {
	/// Decode an encoded payload of this type's shape, moving the cursor
	/// forwards past the consumed bytes. Any trailing bytes are left for the
	/// caller to deal with.
	pub fn decode(&self, data: &mut &[u8]) -> Result<Value, DecodeError> {
		field_decoder::decode_fields(&self.fields, data)
	}
}

/// One field of a [`Type`]: the display name derived when the registry was
/// built, the decoder for the field's type, and the lookup index that type
/// has in the metadata.
#[derive(Debug)]
pub struct Field {
	pub name: String,
	pub decoder: Arc<FieldDecoder>,
	pub lookup_index: u32,
}

/// Which of the three registries is being built; used to give errors context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
	Calls,
	Events,
	Errors,
}

impl Display for RegistryKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RegistryKind::Calls => f.write_str("calls"),
			RegistryKind::Events => f.write_str("events"),
			RegistryKind::Errors => f.write_str("errors"),
		}
	}
}

/// An enum of the possible errors that can be returned from attempting to
/// build a registry from metadata.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
	#[error("{kind} type {type_id} not found for pallet '{pallet}'")]
	PalletTypeNotFound { kind: RegistryKind, type_id: u32, pallet: String },
	#[error("{kind} type {type_id} for pallet '{pallet}' is not a variant; got {got}")]
	ExpectedVariantType { kind: RegistryKind, type_id: u32, pallet: String, got: String },
	#[error("couldn't get fields for {kind} entry '{name}': {source}")]
	EntryFields { kind: RegistryKind, name: String, source: Box<RegistryError> },
	#[error("type {type_id} not found for field '{field}'")]
	FieldTypeNotFound { field: String, type_id: u32 },
	#[error("couldn't get field decoder for '{field}': {source}")]
	FieldDecoder { field: String, source: Box<RegistryError> },
	#[error("couldn't get type fields for variant {index}: {source}")]
	VariantFields { index: u8, source: Box<RegistryError> },
	#[error("unsupported compact field type for '{field}'")]
	UnsupportedCompactTypeDef { field: String },
	#[error("couldn't get field decoder for recursive field with lookup index {0}")]
	UnresolvedRecursiveType(u32),
	#[error("recursive field with lookup index {0} cannot be resolved with another recursive field decoder")]
	RecursiveResolvedToRecursive(u32),
}
