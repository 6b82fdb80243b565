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

//! The closed set of decoder nodes that a registry is built out of, and the
//! logic to execute them against SCALE encoded bytes.
//!
//! Nodes are built once per metadata by the [`crate::registry::Factory`] and are
//! immutable from then on, so a single decoder graph can be shared across
//! parallel decode calls; each call just owns its own byte cursor.

use super::u8_map::U8Map;
use super::Field;
use crate::value::{Primitive, Value};
use codec::{Compact, Decode};
use scale_info::TypeDefPrimitive;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

/// An enum of the possible errors that can be returned from attempting to
/// decode bytes with a [`FieldDecoder`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
	#[error("{0}")]
	CodecError(#[from] codec::Error),
	#[error("{0} is expected to be a valid char, but is not")]
	InvalidChar(u32),
	#[error("variant decoder for variant {0} not found")]
	VariantNotFound(u8),
	#[error("recursive field decoder has not been resolved")]
	UnresolvedRecursive,
	#[error("couldn't decode field '{field}': {source}")]
	Field { field: String, source: Box<DecodeError> },
}

/// A single node of a decoder tree. Each node knows how to decode one shape
/// of SCALE encoded data into a [`Value`].
#[derive(Debug)]
pub enum FieldDecoder {
	/// Decodes nothing and yields [`Value::Null`]. Used for nil tuples and
	/// variants with no inner fields.
	Noop,
	/// Decodes a single primitive value.
	Value(ValueDecoder),
	/// Decodes a fixed number of items; no length prefix exists on the wire.
	Array(ArrayDecoder),
	/// Decodes a compact length prefix and then that many items.
	Sequence(SequenceDecoder),
	/// Decodes an ordered set of named fields into a mapping.
	Composite(CompositeDecoder),
	/// Reads a discriminant byte and dispatches to the matching decoder.
	Variant(VariantDecoder),
	/// Decodes the store and order shapes of a bit sequence.
	BitSequence(BitSequenceDecoder),
	/// Delegates to another decoder that was not yet built when this node
	/// was created; patched once building completes.
	Recursive(Arc<RecursiveDecoder>),
}

impl FieldDecoder {
	/// Decode one value of this node's shape from the front of `data`,
	/// moving the cursor forwards past the consumed bytes.
	pub fn decode(&self, data: &mut &[u8]) -> Result<Value, DecodeError> {
		match self {
			FieldDecoder::Noop => Ok(Value::Null),
			FieldDecoder::Value(inner) => inner.decode(data),
			FieldDecoder::Array(inner) => inner.decode(data),
			FieldDecoder::Sequence(inner) => inner.decode(data),
			FieldDecoder::Composite(inner) => inner.decode(data),
			FieldDecoder::Variant(inner) => inner.decode(data),
			FieldDecoder::BitSequence(inner) => inner.decode(data),
			FieldDecoder::Recursive(inner) => inner.decode(data),
		}
	}
}

/// Variant and composite types, as well as registry entries, all decode an
/// ordered list of fields into a name-keyed mapping.
pub(crate) fn decode_fields(fields: &[Field], data: &mut &[u8]) -> Result<Value, DecodeError> {
	let mut decoded = Vec::with_capacity(fields.len());
	for field in fields {
		let value = field
			.decoder
			.decode(data)
			.map_err(|e| DecodeError::Field { field: field.name.clone(), source: Box::new(e) })?;
		decoded.push((field.name.clone(), value));
	}
	Ok(Value::Composite(decoded))
}

/// Decodes a primitive value. One decoder serves every primitive tag; the
/// tag stored here picks the byte reader to delegate to at decode time.
#[derive(Debug, Clone)]
pub enum ValueDecoder {
	/// One of the fixed-width (or length-prefixed, for strings) primitives.
	Primitive(TypeDefPrimitive),
	/// A compact encoded unsigned integer. The encoding is self describing,
	/// so a single decoder covers every declared bit width.
	CompactUInt,
	/// A carrier for a compact wrapped empty tuple; consumes no bytes.
	Any,
}

impl ValueDecoder {
	fn decode(&self, data: &mut &[u8]) -> Result<Value, DecodeError> {
		match self {
			ValueDecoder::Primitive(primitive) => decode_primitive(primitive, data),
			ValueDecoder::CompactUInt => Ok(Value::Primitive(Primitive::U128(Compact::<u128>::decode(data)?.0))),
			ValueDecoder::Any => Ok(Value::Null),
		}
	}
}

fn decode_primitive(ty: &TypeDefPrimitive, data: &mut &[u8]) -> Result<Value, DecodeError> {
	let val = match ty {
		TypeDefPrimitive::Bool => Primitive::Bool(bool::decode(data)?),
		TypeDefPrimitive::Char => {
			// chars are encoded as u32s on the wire; not every u32 is a valid char.
			let val = u32::decode(data)?;
			Primitive::Char(char::from_u32(val).ok_or(DecodeError::InvalidChar(val))?)
		}
		TypeDefPrimitive::Str => Primitive::Str(String::decode(data)?),
		TypeDefPrimitive::U8 => Primitive::U8(u8::decode(data)?),
		TypeDefPrimitive::U16 => Primitive::U16(u16::decode(data)?),
		TypeDefPrimitive::U32 => Primitive::U32(u32::decode(data)?),
		TypeDefPrimitive::U64 => Primitive::U64(u64::decode(data)?),
		TypeDefPrimitive::U128 => Primitive::U128(u128::decode(data)?),
		TypeDefPrimitive::U256 => Primitive::U256(<[u8; 32]>::decode(data)?),
		TypeDefPrimitive::I8 => Primitive::I8(i8::decode(data)?),
		TypeDefPrimitive::I16 => Primitive::I16(i16::decode(data)?),
		TypeDefPrimitive::I32 => Primitive::I32(i32::decode(data)?),
		TypeDefPrimitive::I64 => Primitive::I64(i64::decode(data)?),
		TypeDefPrimitive::I128 => Primitive::I128(i128::decode(data)?),
		TypeDefPrimitive::I256 => Primitive::I256(<[u8; 32]>::decode(data)?),
	};
	Ok(Value::Primitive(val))
}

/// Holds the known length of the array and the decoder used for its items.
#[derive(Debug)]
pub struct ArrayDecoder {
	pub length: usize,
	pub item: Arc<FieldDecoder>,
}

impl ArrayDecoder {
	fn decode(&self, data: &mut &[u8]) -> Result<Value, DecodeError> {
		// The length is known from the type, so no length exists on the wire.
		let mut values = Vec::with_capacity(self.length);
		for _ in 0..self.length {
			values.push(self.item.decode(data)?);
		}
		Ok(Value::Sequence(values))
	}
}

/// Holds the decoder used for the items of a sequence.
#[derive(Debug)]
pub struct SequenceDecoder {
	pub item: Arc<FieldDecoder>,
}

impl SequenceDecoder {
	fn decode(&self, data: &mut &[u8]) -> Result<Value, DecodeError> {
		// Sequences are preceeded by a compact encoded length, so that we know
		// how many values to try pulling out of the data.
		let len = Compact::<u64>::decode(data)?;
		let mut values = Vec::with_capacity(len.0 as usize);
		for _ in 0..len.0 {
			values.push(self.item.decode(data)?);
		}
		Ok(Value::Sequence(values))
	}
}

/// Holds everything required to decode a struct-like set of fields.
#[derive(Debug)]
pub struct CompositeDecoder {
	pub field_name: String,
	pub fields: Vec<Field>,
}

impl CompositeDecoder {
	fn decode(&self, data: &mut &[u8]) -> Result<Value, DecodeError> {
		decode_fields(&self.fields, data)
	}
}

/// Holds a decoder for each variant of an enum, keyed by discriminant.
#[derive(Debug)]
pub struct VariantDecoder {
	pub(crate) field_decoders: U8Map<Arc<FieldDecoder>>,
}

impl VariantDecoder {
	/// The decoder dispatched to for the given discriminant, if one exists.
	pub fn decoder_for(&self, index: u8) -> Option<&Arc<FieldDecoder>> {
		self.field_decoders.get(index)
	}

	fn decode(&self, data: &mut &[u8]) -> Result<Value, DecodeError> {
		let index = u8::decode(data)?;
		log::trace!("decoding variant with index {}", index);

		let decoder = self.field_decoders.get(index).ok_or(DecodeError::VariantNotFound(index))?;

		// A variant with no payload surfaces as its raw discriminant byte.
		if let FieldDecoder::Noop = &**decoder {
			return Ok(Value::Primitive(Primitive::U8(index)));
		}

		decoder.decode(data)
	}
}

/// Holds the decoders for the bit store and the bit order of a bit sequence.
#[derive(Debug)]
pub struct BitSequenceDecoder {
	pub bit_store: Arc<FieldDecoder>,
	pub bit_order: Arc<FieldDecoder>,
}

pub(crate) const BIT_STORE_KEY: &str = "bit_store";
pub(crate) const BIT_ORDER_KEY: &str = "bit_order";

impl BitSequenceDecoder {
	fn decode(&self, data: &mut &[u8]) -> Result<Value, DecodeError> {
		let bit_store = self
			.bit_store
			.decode(data)
			.map_err(|e| DecodeError::Field { field: BIT_STORE_KEY.to_string(), source: Box::new(e) })?;
		let bit_order = self
			.bit_order
			.decode(data)
			.map_err(|e| DecodeError::Field { field: BIT_ORDER_KEY.to_string(), source: Box::new(e) })?;

		Ok(Value::Composite(vec![(BIT_STORE_KEY.to_string(), bit_store), (BIT_ORDER_KEY.to_string(), bit_order)]))
	}
}

/// A placeholder for a decoder that takes part in a cycle. It is inserted
/// where a type is first seen, and pointed at the fully built decoder for
/// that type once the build pass has finished.
pub struct RecursiveDecoder {
	target: OnceLock<Arc<FieldDecoder>>,
}

impl RecursiveDecoder {
	pub(crate) fn new() -> RecursiveDecoder {
		RecursiveDecoder { target: OnceLock::new() }
	}

	/// Point this placeholder at its fully built decoder. Written at most
	/// once per build; later writes are ignored.
	pub(crate) fn resolve(&self, target: Arc<FieldDecoder>) {
		let _ = self.target.set(target);
	}

	/// The decoder this placeholder was patched to, if resolution has happened.
	pub fn target(&self) -> Option<&Arc<FieldDecoder>> {
		self.target.get()
	}

	fn decode(&self, data: &mut &[u8]) -> Result<Value, DecodeError> {
		let target = self.target.get().ok_or(DecodeError::UnresolvedRecursive)?;
		target.decode(data)
	}
}

// The target may point back into a decoder graph containing this very node,
// so a derived Debug would not terminate.
impl Debug for RecursiveDecoder {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.target.get() {
			Some(_) => f.write_str("RecursiveDecoder(resolved)"),
			None => f.write_str("RecursiveDecoder(unresolved)"),
		}
	}
}

#[cfg(test)]
mod test {

	use super::*;
	use codec::Encode;

	fn field(name: &str, decoder: FieldDecoder) -> Field {
		Field { name: name.to_string(), decoder: Arc::new(decoder), lookup_index: 0 }
	}

	fn value_decoder(primitive: TypeDefPrimitive) -> FieldDecoder {
		FieldDecoder::Value(ValueDecoder::Primitive(primitive))
	}

	/// Decode the provided bytes in full, checking that nothing is left over.
	fn decode_all(decoder: &FieldDecoder, bytes: &[u8]) -> Value {
		let data = &mut &*bytes;
		let val = decoder.decode(data).expect("decoding failed");
		assert_eq!(data.len(), 0, "decoding did not consume all of the encoded bytes");
		val
	}

	#[test]
	fn decode_primitives() {
		assert_eq!(decode_all(&value_decoder(TypeDefPrimitive::Bool), &true.encode()), Value::bool(true));
		assert_eq!(decode_all(&value_decoder(TypeDefPrimitive::U8), &123u8.encode()), Value::u8(123));
		assert_eq!(
			decode_all(&value_decoder(TypeDefPrimitive::U16), &123u16.encode()),
			Value::Primitive(Primitive::U16(123))
		);
		assert_eq!(decode_all(&value_decoder(TypeDefPrimitive::U32), &123u32.encode()), Value::u32(123));
		assert_eq!(
			decode_all(&value_decoder(TypeDefPrimitive::U64), &123u64.encode()),
			Value::Primitive(Primitive::U64(123))
		);
		assert_eq!(decode_all(&value_decoder(TypeDefPrimitive::U128), &123u128.encode()), Value::u128(123));
		assert_eq!(
			decode_all(&value_decoder(TypeDefPrimitive::I32), &(-123i32).encode()),
			Value::Primitive(Primitive::I32(-123))
		);
		assert_eq!(decode_all(&value_decoder(TypeDefPrimitive::Str), &"hello".encode()), Value::str("hello"));
		assert_eq!(
			decode_all(&value_decoder(TypeDefPrimitive::Char), &('a' as u32).encode()),
			Value::Primitive(Primitive::Char('a'))
		);
		assert_eq!(
			decode_all(&value_decoder(TypeDefPrimitive::U256), &[7u8; 32].encode()),
			Value::Primitive(Primitive::U256([7u8; 32]))
		);
	}

	#[test]
	fn decode_invalid_char() {
		let decoder = value_decoder(TypeDefPrimitive::Char);
		let bytes = 0xD800u32.encode();
		let err = decoder.decode(&mut &*bytes).expect_err("lone surrogate is not a char");
		assert!(matches!(err, DecodeError::InvalidChar(0xD800)));
	}

	#[test]
	fn decode_compact_uints() {
		// One decoder covers every declared width; the value always comes back as a u128.
		let decoder = FieldDecoder::Value(ValueDecoder::CompactUInt);
		assert_eq!(decode_all(&decoder, &Compact(123u8).encode()), Value::u128(123));
		assert_eq!(decode_all(&decoder, &Compact(123u16).encode()), Value::u128(123));
		assert_eq!(decode_all(&decoder, &Compact(123u32).encode()), Value::u128(123));
		assert_eq!(decode_all(&decoder, &Compact(1_000_000_000_000u64).encode()), Value::u128(1_000_000_000_000));
		assert_eq!(decode_all(&decoder, &Compact(123u128).encode()), Value::u128(123));
	}

	#[test]
	fn noop_and_any_consume_nothing() {
		let bytes = [1u8, 2, 3];

		let data = &mut &bytes[..];
		assert_eq!(FieldDecoder::Noop.decode(data).unwrap(), Value::null());
		assert_eq!(data.len(), 3);

		let data = &mut &bytes[..];
		assert_eq!(FieldDecoder::Value(ValueDecoder::Any).decode(data).unwrap(), Value::null());
		assert_eq!(data.len(), 3);
	}

	#[test]
	fn decode_array() {
		let decoder = FieldDecoder::Array(ArrayDecoder {
			length: 3,
			item: Arc::new(value_decoder(TypeDefPrimitive::U8)),
		});
		assert_eq!(
			decode_all(&decoder, &[1u8, 2, 3]),
			Value::sequence(vec![Value::u8(1), Value::u8(2), Value::u8(3)])
		);
	}

	#[test]
	fn decode_sequence() {
		let decoder = FieldDecoder::Sequence(SequenceDecoder { item: Arc::new(value_decoder(TypeDefPrimitive::U8)) });
		assert_eq!(
			decode_all(&decoder, &vec![0xAAu8, 0xBB].encode()),
			Value::sequence(vec![Value::u8(0xAA), Value::u8(0xBB)])
		);
		// An empty sequence is just the zero length prefix.
		assert_eq!(decode_all(&decoder, &Vec::<u8>::new().encode()), Value::sequence(vec![]));
	}

	#[test]
	fn decode_composite() {
		let decoder = FieldDecoder::Composite(CompositeDecoder {
			field_name: "outer".to_string(),
			fields: vec![
				field("is_valid", value_decoder(TypeDefPrimitive::Bool)),
				field("name", value_decoder(TypeDefPrimitive::Str)),
			],
		});
		let bytes = (true, "James").encode();
		assert_eq!(
			decode_all(&decoder, &bytes),
			Value::composite(vec![("is_valid", Value::bool(true)), ("name", Value::str("James"))])
		);
	}

	#[test]
	fn decode_composite_surfaces_failing_field() {
		let decoder = FieldDecoder::Composite(CompositeDecoder {
			field_name: "outer".to_string(),
			fields: vec![field("amount", value_decoder(TypeDefPrimitive::U32))],
		});
		// Too few bytes for a u32:
		let err = decoder.decode(&mut &[1u8][..]).expect_err("u32 needs 4 bytes");
		match err {
			DecodeError::Field { field, source } => {
				assert_eq!(field, "amount");
				assert!(matches!(*source, DecodeError::CodecError(_)));
			}
			other => panic!("expected a field error, got {:?}", other),
		}
	}

	#[test]
	fn decode_variant_with_payload() {
		let mut field_decoders = U8Map::new();
		field_decoders.insert(
			0,
			Arc::new(FieldDecoder::Composite(CompositeDecoder {
				field_name: "variant_item_0".to_string(),
				fields: vec![field("amount", value_decoder(TypeDefPrimitive::U32))],
			})),
		);
		let decoder = FieldDecoder::Variant(VariantDecoder { field_decoders });

		let mut bytes = vec![0u8];
		bytes.extend(123u32.encode());
		assert_eq!(decode_all(&decoder, &bytes), Value::composite(vec![("amount", Value::u32(123))]));
	}

	#[test]
	fn decode_variant_without_payload_yields_discriminant() {
		let mut field_decoders = U8Map::new();
		field_decoders.insert(9, Arc::new(FieldDecoder::Noop));
		let decoder = FieldDecoder::Variant(VariantDecoder { field_decoders });

		assert_eq!(decode_all(&decoder, &[9u8]), Value::u8(9));
	}

	#[test]
	fn decode_variant_unknown_discriminant() {
		let mut field_decoders = U8Map::new();
		field_decoders.insert(0, Arc::new(FieldDecoder::Noop));
		let decoder = FieldDecoder::Variant(VariantDecoder { field_decoders });

		let err = decoder.decode(&mut &[7u8][..]).expect_err("no variant 7 exists");
		assert!(matches!(err, DecodeError::VariantNotFound(7)));
	}

	#[test]
	fn decode_bit_sequence() {
		let decoder = FieldDecoder::BitSequence(BitSequenceDecoder {
			bit_store: Arc::new(value_decoder(TypeDefPrimitive::U8)),
			bit_order: Arc::new(value_decoder(TypeDefPrimitive::U8)),
		});
		assert_eq!(
			decode_all(&decoder, &[0x05u8, 0x00]),
			Value::composite(vec![("bit_store", Value::u8(5)), ("bit_order", Value::u8(0))])
		);
	}

	#[test]
	fn recursive_decoder_fails_until_resolved() {
		let recursive = Arc::new(RecursiveDecoder::new());
		let decoder = FieldDecoder::Recursive(recursive.clone());

		let err = decoder.decode(&mut &[1u8][..]).expect_err("nothing to delegate to yet");
		assert!(matches!(err, DecodeError::UnresolvedRecursive));

		recursive.resolve(Arc::new(value_decoder(TypeDefPrimitive::U8)));
		assert_eq!(decode_all(&decoder, &[1u8]), Value::u8(1));
	}
}
