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

use super::{Primitive, Value};
use serde::{
	ser::{SerializeMap, SerializeSeq},
	Serialize,
};

impl Serialize for Value {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		match self {
			Value::Null => serializer.serialize_unit(),
			Value::Primitive(val) => val.serialize(serializer),
			Value::Sequence(vals) => {
				let mut seq = serializer.serialize_seq(Some(vals.len()))?;
				for val in vals {
					seq.serialize_element(val)?;
				}
				seq.end()
			}
			Value::Composite(fields) => {
				let mut map = serializer.serialize_map(Some(fields.len()))?;
				for (key, val) in fields {
					map.serialize_entry(key, val)?;
				}
				map.end()
			}
		}
	}
}

impl Serialize for Primitive {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		// Delegate to the serialization strategy used by the primitive types.
		match self {
			Primitive::Bool(v) => v.serialize(serializer),
			Primitive::Char(v) => v.serialize(serializer),
			Primitive::Str(v) => v.serialize(serializer),
			Primitive::U8(v) => v.serialize(serializer),
			Primitive::U16(v) => v.serialize(serializer),
			Primitive::U32(v) => v.serialize(serializer),
			Primitive::U64(v) => v.serialize(serializer),
			Primitive::U128(v) => v.serialize(serializer),
			Primitive::U256(v) => v.serialize(serializer),
			Primitive::I8(v) => v.serialize(serializer),
			Primitive::I16(v) => v.serialize(serializer),
			Primitive::I32(v) => v.serialize(serializer),
			Primitive::I64(v) => v.serialize(serializer),
			Primitive::I128(v) => v.serialize(serializer),
			Primitive::I256(v) => v.serialize(serializer),
		}
	}
}

#[cfg(test)]
mod test {

	use super::*;
	use serde_json::json;

	fn assert_value(value: Value, expected: serde_json::Value) {
		let val = serde_json::to_value(&value).expect("can serialize to serde_json::Value");
		assert_eq!(val, expected);
	}

	#[test]
	fn serialize_primitives() {
		// a subset of the primitives to sanity check that they are unwrapped:
		assert_value(Value::u8(1), json!(1));
		assert_value(Value::u32(1), json!(1));
		assert_value(Value::u128(1), json!(1));
		assert_value(Value::bool(true), json!(true));
		assert_value(Value::str("hi"), json!("hi"));
	}

	#[test]
	fn serialize_null() {
		assert_value(Value::null(), json!(null));
	}

	#[test]
	fn serialize_sequences() {
		assert_value(Value::sequence(vec![Value::u8(1), Value::u8(2), Value::u8(3)]), json!([1, 2, 3]));
	}

	#[test]
	fn serialize_composites() {
		assert_value(
			Value::composite(vec![
				("a", Value::bool(true)),
				("b", Value::str("hello")),
				("c", Value::sequence(vec![Value::u8(1), Value::u8(2)])),
			]),
			json!({
				"a": true,
				"b": "hello",
				"c": [1, 2],
			}),
		);
	}
}
