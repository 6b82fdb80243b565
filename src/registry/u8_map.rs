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

/// A map keyed by `u8`, backed by a flat array so that lookups
/// are a bounds check and an index. Variant discriminants are `u8`s,
/// and decoding dispatches on them for every variant value seen, so
/// this sits on a hot path.
#[derive(Debug, Clone)]
pub struct U8Map<V> {
	values: Vec<Option<V>>,
}

impl<V> U8Map<V> {
	pub fn new() -> U8Map<V> {
		U8Map { values: Vec::new() }
	}

	/// Insert an entry, returning the previous value at that key if there was one.
	pub fn insert(&mut self, key: u8, value: V) -> Option<V> {
		let idx = key as usize;
		if self.values.len() <= idx {
			self.values.resize_with(idx + 1, || None);
		}
		self.values[idx].replace(value)
	}

	pub fn get(&self, key: u8) -> Option<&V> {
		self.values.get(key as usize).and_then(|v| v.as_ref())
	}
}

impl<V> std::iter::FromIterator<(u8, V)> for U8Map<V> {
	fn from_iter<T: IntoIterator<Item = (u8, V)>>(iter: T) -> Self {
		let mut map = U8Map::new();
		for (key, value) in iter {
			map.insert(key, value);
		}
		map
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn insert_and_get() {
		let mut map = U8Map::new();
		assert_eq!(map.insert(7, "seven"), None);
		assert_eq!(map.insert(0, "zero"), None);
		assert_eq!(map.get(7), Some(&"seven"));
		assert_eq!(map.get(0), Some(&"zero"));
		assert_eq!(map.get(1), None);
		assert_eq!(map.get(255), None);
	}

	#[test]
	fn insert_replaces() {
		let mut map = U8Map::new();
		map.insert(42, 1);
		assert_eq!(map.insert(42, 2), Some(1));
		assert_eq!(map.get(42), Some(&2));
	}
}
