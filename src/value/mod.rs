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

/*!
This module exposes the [`Value`] type and related subtypes, which are used as the
runtime representations of SCALE encoded data (much like `serde_json::Value` is a
runtime representation of JSON data).
*/

mod serialize;

use std::fmt::Debug;

/// [`Value`] holds a representation of some value that has been decoded.
///
/// Composite values keep their fields in decode order and are keyed by the
/// display names derived when the decoder registry was built. A variant with
/// no payload surfaces as its raw `u8` discriminant, and shapes that carry no
/// data at all decode to [`Value::Null`].
#[derive(Clone, PartialEq)]
pub enum Value {
	/// Nothing; decoded from a shape that carries no data.
	Null,
	/// Any of the primitive values we can have.
	Primitive(Primitive),
	/// An ordered series of values, eg from an array or sequence.
	Sequence(Vec<Value>),
	/// An ordered mapping from field name to value, eg from a struct.
	Composite(Vec<(String, Value)>),
}

impl Value {
	/// Look up a field of a composite value by name.
	pub fn field(&self, name: &str) -> Option<&Value> {
		match self {
			Value::Composite(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
			_ => None,
		}
	}

	/// Look up a value of a sequence or composite by position.
	pub fn at(&self, index: usize) -> Option<&Value> {
		match self {
			Value::Sequence(vals) => vals.get(index),
			Value::Composite(fields) => fields.get(index).map(|(_, v)| v),
			_ => None,
		}
	}

	/// Construct a null value.
	pub fn null() -> Value {
		Value::Null
	}

	/// Construct a `u8` primitive value.
	pub fn u8(val: u8) -> Value {
		Value::Primitive(Primitive::U8(val))
	}

	/// Construct a `u32` primitive value.
	pub fn u32(val: u32) -> Value {
		Value::Primitive(Primitive::U32(val))
	}

	/// Construct a `u128` primitive value.
	pub fn u128(val: u128) -> Value {
		Value::Primitive(Primitive::U128(val))
	}

	/// Construct a `bool` primitive value.
	pub fn bool(val: bool) -> Value {
		Value::Primitive(Primitive::Bool(val))
	}

	/// Construct a string primitive value.
	pub fn str(val: impl Into<String>) -> Value {
		Value::Primitive(Primitive::Str(val.into()))
	}

	/// Construct a sequence of values.
	pub fn sequence(vals: Vec<Value>) -> Value {
		Value::Sequence(vals)
	}

	/// Construct a composite value from name/value pairs.
	pub fn composite(fields: Vec<(&str, Value)>) -> Value {
		Value::Composite(fields.into_iter().map(|(n, v)| (n.to_string(), v)).collect())
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Primitive(val) => Debug::fmt(val, f),
			Value::Sequence(vals) => {
				let mut struc = f.debug_tuple("");
				for val in vals {
					struc.field(val);
				}
				struc.finish()
			}
			Value::Composite(fields) => {
				let mut struc = f.debug_struct("");
				for (name, val) in fields {
					struc.field(name, val);
				}
				struc.finish()
			}
		}
	}
}

impl From<Primitive> for Value {
	fn from(val: Primitive) -> Self {
		Value::Primitive(val)
	}
}

/// A "primitive" value (this includes strings).
#[derive(Clone, PartialEq)]
pub enum Primitive {
	Bool(bool),
	Char(char),
	Str(String),
	U8(u8),
	U16(u16),
	U32(u32),
	U64(u64),
	U128(u128),
	U256([u8; 32]),
	I8(i8),
	I16(i16),
	I32(i32),
	I64(i64),
	I128(i128),
	I256([u8; 32]),
}

impl Debug for Primitive {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Primitive::Bool(val) => Debug::fmt(val, f),
			Primitive::Char(val) => Debug::fmt(val, f),
			Primitive::Str(val) => Debug::fmt(val, f),
			Primitive::U8(val) => Debug::fmt(val, f),
			Primitive::U16(val) => Debug::fmt(val, f),
			Primitive::U32(val) => Debug::fmt(val, f),
			Primitive::U64(val) => Debug::fmt(val, f),
			Primitive::U128(val) => Debug::fmt(val, f),
			Primitive::I8(val) => Debug::fmt(val, f),
			Primitive::I16(val) => Debug::fmt(val, f),
			Primitive::I32(val) => Debug::fmt(val, f),
			Primitive::I64(val) => Debug::fmt(val, f),
			Primitive::I128(val) => Debug::fmt(val, f),
			Primitive::U256(val) | Primitive::I256(val) => {
				f.write_str("BigNum(")?;
				Debug::fmt(val, f)?;
				f.write_str(")")
			}
		}
	}
}
