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

//! Walk the type graph in some V14 metadata and turn the call/event/error
//! declarations of each pallet into registries of decoders.

use super::field_decoder::{
	ArrayDecoder, BitSequenceDecoder, CompositeDecoder, FieldDecoder, RecursiveDecoder, SequenceDecoder, ValueDecoder,
	VariantDecoder, BIT_ORDER_KEY, BIT_STORE_KEY,
};
use super::u8_map::U8Map;
use super::{CallRegistry, ErrorRegistry, EventId, EventRegistry, Field, RegistryError, RegistryKind, Type};
use frame_metadata::RuntimeMetadataV14;
use scale_info::{form::PortableForm, PortableRegistry, TypeDef};
use std::collections::HashMap;
use std::sync::Arc;

// Some type aliases used below. `scale-info` is re-exported at the crate root,
// so to avoid confusion we only publicly export scale-info types from there.
type ScaleType = scale_info::Type<PortableForm>;
type ScaleField = scale_info::Field<PortableForm>;
type TypeDefVariant = scale_info::TypeDefVariant<PortableForm>;
type ScaleTypeId = scale_info::interner::UntrackedSymbol<std::any::TypeId>;

/// Builds registries of decoders from V14 metadata.
///
/// The per-build memoization state lives on the factory and is reset at the
/// start of every `build_*` call, so one factory can build any number of
/// registries; the registries handed back share nothing with the factory and
/// are immutable from then on.
pub struct Factory {
	/// Memo of every decoder built so far, keyed by the lookup index of the
	/// type it decodes. Holds a recursive placeholder for types that are
	/// currently being built further up the stack.
	field_storage: HashMap<u32, Arc<FieldDecoder>>,
	/// Placeholders that were observed by a back-edge while the type they
	/// stand for was still being built. Patched after the pallet scan.
	recursive_field_storage: HashMap<u32, Arc<RecursiveDecoder>>,
}

impl Factory {
	pub fn new() -> Factory {
		Factory { field_storage: HashMap::new(), recursive_field_storage: HashMap::new() }
	}

	/// Build the registry that contains the types for calls, keyed by
	/// `"Pallet.call"`.
	pub fn build_call_registry(&mut self, meta: &RuntimeMetadataV14) -> Result<CallRegistry, RegistryError> {
		self.init_storages();
		log::trace!("building call registry");

		let mut call_registry = HashMap::new();

		for pallet in &meta.pallets {
			let calls = match &pallet.calls {
				Some(calls) => calls,
				None => continue,
			};

			let variants = expect_variant_type(&meta.types, RegistryKind::Calls, &pallet.name, calls.ty.id())?;

			for variant in variants.variants() {
				let call_name = format!("{}.{}", pallet.name, variant.name());

				let call_fields =
					self.get_type_fields(&meta.types, variant.fields()).map_err(|e| RegistryError::EntryFields {
						kind: RegistryKind::Calls,
						name: call_name.clone(),
						source: Box::new(e),
					})?;

				call_registry.insert(call_name.clone(), Type { name: call_name, fields: call_fields });
			}
		}

		self.resolve_recursive_decoders()?;

		Ok(call_registry)
	}

	/// Build the registry that contains the types for errors, keyed by
	/// `"Pallet.Error"`.
	pub fn build_error_registry(&mut self, meta: &RuntimeMetadataV14) -> Result<ErrorRegistry, RegistryError> {
		self.init_storages();
		log::trace!("building error registry");

		let mut error_registry = HashMap::new();

		for pallet in &meta.pallets {
			let error = match &pallet.error {
				Some(error) => error,
				None => continue,
			};

			let variants = expect_variant_type(&meta.types, RegistryKind::Errors, &pallet.name, error.ty.id())?;

			for variant in variants.variants() {
				let error_name = format!("{}.{}", pallet.name, variant.name());

				let error_fields =
					self.get_type_fields(&meta.types, variant.fields()).map_err(|e| RegistryError::EntryFields {
						kind: RegistryKind::Errors,
						name: error_name.clone(),
						source: Box::new(e),
					})?;

				error_registry.insert(error_name.clone(), Type { name: error_name, fields: error_fields });
			}
		}

		self.resolve_recursive_decoders()?;

		Ok(error_registry)
	}

	/// Build the registry that contains the types for events, keyed by the
	/// `(pallet index, variant index)` pair that prefixes an encoded event.
	pub fn build_event_registry(&mut self, meta: &RuntimeMetadataV14) -> Result<EventRegistry, RegistryError> {
		self.init_storages();
		log::trace!("building event registry");

		let mut event_registry = HashMap::new();

		for pallet in &meta.pallets {
			let event = match &pallet.event {
				Some(event) => event,
				None => continue,
			};

			let variants = expect_variant_type(&meta.types, RegistryKind::Events, &pallet.name, event.ty.id())?;

			for variant in variants.variants() {
				let event_id = EventId::new(pallet.index, variant.index());
				let event_name = format!("{}.{}", pallet.name, variant.name());

				let event_fields =
					self.get_type_fields(&meta.types, variant.fields()).map_err(|e| RegistryError::EntryFields {
						kind: RegistryKind::Events,
						name: event_name.clone(),
						source: Box::new(e),
					})?;

				event_registry.insert(event_id, Type { name: event_name, fields: event_fields });
			}
		}

		self.resolve_recursive_decoders()?;

		Ok(event_registry)
	}

	/// Reset the storages used while creating registries. Called at the start
	/// of every build so that leftovers from a previous metadata cannot leak
	/// into the next registry.
	fn init_storages(&mut self) {
		self.field_storage = HashMap::new();
		self.recursive_field_storage = HashMap::new();
	}

	/// Patch every recursive placeholder that a back-edge observed during the
	/// pallet scan to point at the decoder that was eventually built for its
	/// lookup index.
	fn resolve_recursive_decoders(&mut self) -> Result<(), RegistryError> {
		for (lookup_index, recursive) in &self.recursive_field_storage {
			let decoder = self
				.field_storage
				.get(lookup_index)
				.ok_or(RegistryError::UnresolvedRecursiveType(*lookup_index))?;

			if let FieldDecoder::Recursive(_) = &**decoder {
				return Err(RegistryError::RecursiveResolvedToRecursive(*lookup_index));
			}

			recursive.resolve(decoder.clone());
		}

		Ok(())
	}

	/// Parse and return decoders for all the fields handed in, memoizing each
	/// field's decoder by the lookup index of its type.
	fn get_type_fields(&mut self, types: &PortableRegistry, fields: &[ScaleField]) -> Result<Vec<Field>, RegistryError> {
		let mut type_fields = Vec::with_capacity(fields.len());

		for field in fields {
			let lookup_index = field.ty().id();

			let field_type = types.resolve(lookup_index).ok_or_else(|| RegistryError::FieldTypeNotFound {
				field: field.name().cloned().unwrap_or_default(),
				type_id: lookup_index,
			})?;

			let field_name = get_field_name(field, field_type);

			if let Some(decoder) = self.get_stored_field_decoder(lookup_index) {
				type_fields.push(Field { name: field_name, decoder, lookup_index });
				continue;
			}

			let decoder = self
				.get_field_decoder(types, &field_name, field_type.type_def())
				.map_err(|e| RegistryError::FieldDecoder { field: field_name.clone(), source: Box::new(e) })?;
			let decoder = Arc::new(decoder);

			self.field_storage.insert(lookup_index, decoder.clone());

			type_fields.push(Field { name: field_name, decoder, lookup_index });
		}

		Ok(type_fields)
	}

	/// Attempt to return a decoder that was already built for this lookup index.
	///
	/// On a miss, a recursive placeholder is left at the index before the
	/// caller descends into the type, so that a type whose subtree refers back
	/// to itself finds the placeholder instead of recursing forever. The
	/// caller overwrites the entry with the real decoder once it is built; any
	/// placeholder a back-edge saw in the meantime is recorded for patching in
	/// [`Factory::resolve_recursive_decoders`].
	fn get_stored_field_decoder(&mut self, lookup_index: u32) -> Option<Arc<FieldDecoder>> {
		if let Some(decoder) = self.field_storage.get(&lookup_index) {
			if let FieldDecoder::Recursive(recursive) = &**decoder {
				self.recursive_field_storage.insert(lookup_index, recursive.clone());
			}
			return Some(decoder.clone());
		}

		self.field_storage.insert(lookup_index, Arc::new(FieldDecoder::Recursive(Arc::new(RecursiveDecoder::new()))));

		None
	}

	/// Return the decoder for the provided type definition.
	fn get_field_decoder(
		&mut self,
		types: &PortableRegistry,
		field_name: &str,
		type_def: &TypeDef<PortableForm>,
	) -> Result<FieldDecoder, RegistryError> {
		match type_def {
			TypeDef::Compact(compact) => {
				let compact_type_id = compact.type_param().id();
				let compact_type = types.resolve(compact_type_id).ok_or_else(|| RegistryError::FieldTypeNotFound {
					field: field_name.to_string(),
					type_id: compact_type_id,
				})?;

				self.get_compact_field_decoder(types, field_name, compact_type.type_def())
			}
			TypeDef::Composite(composite) => {
				let fields = self.get_type_fields(types, composite.fields())?;

				Ok(FieldDecoder::Composite(CompositeDecoder { field_name: field_name.to_string(), fields }))
			}
			TypeDef::Variant(variant) => self.get_variant_field_decoder(types, variant),
			TypeDef::Primitive(primitive) => Ok(FieldDecoder::Value(ValueDecoder::Primitive(primitive.clone()))),
			TypeDef::Array(array) => {
				let item = self.get_field_decoder_by_id(types, field_name, array.type_param().id())?;

				Ok(FieldDecoder::Array(ArrayDecoder { length: array.len() as usize, item: Arc::new(item) }))
			}
			TypeDef::Sequence(sequence) => {
				let item = self.get_field_decoder_by_id(types, field_name, sequence.type_param().id())?;

				Ok(FieldDecoder::Sequence(SequenceDecoder { item: Arc::new(item) }))
			}
			TypeDef::Tuple(tuple) => {
				if tuple.fields().is_empty() {
					return Ok(FieldDecoder::Noop);
				}

				self.get_tuple_field_decoder(types, field_name, tuple.fields())
			}
			TypeDef::BitSequence(bit_sequence) => {
				let bit_store = self.get_field_decoder_by_id(types, BIT_STORE_KEY, bit_sequence.bit_store_type().id())?;
				let bit_order = self.get_field_decoder_by_id(types, BIT_ORDER_KEY, bit_sequence.bit_order_type().id())?;

				Ok(FieldDecoder::BitSequence(BitSequenceDecoder {
					bit_store: Arc::new(bit_store),
					bit_order: Arc::new(bit_order),
				}))
			}
		}
	}

	/// Resolve a lookup index and return the decoder for whatever it points at.
	fn get_field_decoder_by_id(
		&mut self,
		types: &PortableRegistry,
		field_name: &str,
		type_id: u32,
	) -> Result<FieldDecoder, RegistryError> {
		let ty = types
			.resolve(type_id)
			.ok_or_else(|| RegistryError::FieldTypeNotFound { field: field_name.to_string(), type_id })?;

		self.get_field_decoder(types, field_name, ty.type_def())
	}

	/// Parse a variant type definition and return a variant decoder that
	/// dispatches on the discriminant byte.
	fn get_variant_field_decoder(
		&mut self,
		types: &PortableRegistry,
		type_def: &TypeDefVariant,
	) -> Result<FieldDecoder, RegistryError> {
		let mut field_decoders = U8Map::new();

		for (i, variant) in type_def.variants().iter().enumerate() {
			if variant.fields().is_empty() {
				field_decoders.insert(variant.index(), Arc::new(FieldDecoder::Noop));
				continue;
			}

			// The composite is named after the variant's position within the
			// parent, not its discriminant.
			let variant_field_name = format!("variant_item_{}", i);

			let fields = self
				.get_type_fields(types, variant.fields())
				.map_err(|e| RegistryError::VariantFields { index: variant.index(), source: Box::new(e) })?;

			field_decoders.insert(
				variant.index(),
				Arc::new(FieldDecoder::Composite(CompositeDecoder { field_name: variant_field_name, fields })),
			);
		}

		Ok(FieldDecoder::Variant(VariantDecoder { field_decoders }))
	}

	/// Parse a tuple type definition and return a composite decoder whose
	/// fields are named after the tuple item positions.
	fn get_tuple_field_decoder(
		&mut self,
		types: &PortableRegistry,
		field_name: &str,
		items: &[ScaleTypeId],
	) -> Result<FieldDecoder, RegistryError> {
		let mut fields = Vec::with_capacity(items.len());

		for (i, item) in items.iter().enumerate() {
			let item_name = format!("tuple_item_{}", i);

			let item_decoder = self.get_field_decoder_by_id(types, &item_name, item.id())?;

			fields.push(Field { name: item_name, decoder: Arc::new(item_decoder), lookup_index: item.id() });
		}

		Ok(FieldDecoder::Composite(CompositeDecoder { field_name: field_name.to_string(), fields }))
	}

	/// Parse a type definition found inside a compact wrapper and return the
	/// according decoder. Compact only changes how integers are laid out on
	/// the wire, so the shapes accepted here bottom out at unsigned integers.
	fn get_compact_field_decoder(
		&mut self,
		types: &PortableRegistry,
		field_name: &str,
		type_def: &TypeDef<PortableForm>,
	) -> Result<FieldDecoder, RegistryError> {
		match type_def {
			TypeDef::Primitive(_) => Ok(FieldDecoder::Value(ValueDecoder::CompactUInt)),
			TypeDef::Tuple(tuple) => {
				if tuple.fields().is_empty() {
					return Ok(FieldDecoder::Value(ValueDecoder::Any));
				}

				let mut fields = Vec::with_capacity(tuple.fields().len());

				for (i, item) in tuple.fields().iter().enumerate() {
					let item_name = format!("tuple_item_{}", i);

					let item_type = types.resolve(item.id()).ok_or_else(|| RegistryError::FieldTypeNotFound {
						field: item_name.clone(),
						type_id: item.id(),
					})?;

					let item_decoder = self.get_compact_field_decoder(types, &item_name, item_type.type_def())?;

					fields.push(Field { name: item_name, decoder: Arc::new(item_decoder), lookup_index: item.id() });
				}

				Ok(FieldDecoder::Composite(CompositeDecoder { field_name: field_name.to_string(), fields }))
			}
			TypeDef::Composite(composite) => {
				let mut fields = Vec::with_capacity(composite.fields().len());

				for field in composite.fields() {
					let lookup_index = field.ty().id();

					let field_type = types.resolve(lookup_index).ok_or_else(|| RegistryError::FieldTypeNotFound {
						field: field.name().cloned().unwrap_or_default(),
						type_id: lookup_index,
					})?;

					let compact_field_name = get_field_name(field, field_type);

					let field_decoder =
						self.get_compact_field_decoder(types, &compact_field_name, field_type.type_def())?;

					fields.push(Field {
						name: compact_field_name,
						decoder: Arc::new(field_decoder),
						lookup_index,
					});
				}

				Ok(FieldDecoder::Composite(CompositeDecoder { field_name: field_name.to_string(), fields }))
			}
			_ => Err(RegistryError::UnsupportedCompactTypeDef { field: field_name.to_string() }),
		}
	}
}

impl Default for Factory {
	fn default() -> Self {
		Factory::new()
	}
}

/// Resolve a pallet's declared type and expect it to be a variant; calls,
/// events and errors are all declared as one variant per item.
fn expect_variant_type<'a>(
	types: &'a PortableRegistry,
	kind: RegistryKind,
	pallet_name: &str,
	type_id: u32,
) -> Result<&'a TypeDefVariant, RegistryError> {
	let ty = types.resolve(type_id).ok_or_else(|| RegistryError::PalletTypeNotFound {
		kind,
		type_id,
		pallet: pallet_name.to_string(),
	})?;

	match ty.type_def() {
		TypeDef::Variant(variant) => Ok(variant),
		other => Err(RegistryError::ExpectedVariantType {
			kind,
			type_id,
			pallet: pallet_name.to_string(),
			got: format!("{:?}", other),
		}),
	}
}

fn get_field_path(field_type: &ScaleType) -> String {
	field_type.path().segments().join("_")
}

/// Derive the display name for a field: the path of the field's type if it
/// has one, else the field's own name, else its type name, else the lookup
/// index spelled out.
fn get_field_name(field: &ScaleField, field_type: &ScaleType) -> String {
	let field_path = get_field_path(field_type);

	if !field_path.is_empty() {
		return field_path;
	}

	if let Some(name) = field.name() {
		return name.clone();
	}

	if let Some(type_name) = field.type_name() {
		return type_name.clone();
	}

	format!("lookup_index_{}", field.ty().id())
}

#[cfg(test)]
mod test {

	use super::*;
	use crate::value::Value;
	use codec::Encode;
	use frame_metadata::{ExtrinsicMetadata, PalletCallMetadata, PalletEventMetadata, PalletMetadata};
	use scale_info::{meta_type, TypeInfo};

	fn pallet(name: &'static str, index: u8) -> PalletMetadata {
		PalletMetadata { name, index, storage: None, calls: None, event: None, constants: vec![], error: None }
	}

	fn v14_metadata(pallets: Vec<PalletMetadata>) -> RuntimeMetadataV14 {
		let extrinsic = ExtrinsicMetadata { ty: meta_type::<()>(), version: 4, signed_extensions: vec![] };
		RuntimeMetadataV14::new(pallets, extrinsic, meta_type::<()>())
	}

	/// The display name that path-based naming produces for types declared in
	/// this test module.
	fn path_name(ident: &str) -> String {
		format!("{}_{}", module_path!().replace("::", "_"), ident)
	}

	#[derive(TypeInfo, Encode)]
	struct Xcm {
		instructions: Vec<XcmInstruction>,
	}

	#[derive(TypeInfo, Encode)]
	enum XcmInstruction {
		ClearOrigin,
		Transact { xcm: Xcm },
	}

	#[allow(dead_code, non_camel_case_types)]
	#[derive(TypeInfo)]
	enum XcmCall {
		execute { message: Xcm },
	}

	fn xcm_metadata() -> RuntimeMetadataV14 {
		v14_metadata(vec![PalletMetadata {
			calls: Some(PalletCallMetadata { ty: meta_type::<XcmCall>() }),
			..pallet("XcmPallet", 30)
		}])
	}

	#[test]
	fn recursive_type_builds_one_patched_placeholder() {
		let meta = xcm_metadata();

		let mut factory = Factory::new();
		let registry = factory.build_call_registry(&meta).expect("can build registry for recursive type");
		assert!(registry.contains_key("XcmPallet.execute"));

		// Only Xcm itself takes part in the cycle, so exactly one placeholder
		// should have been observed and patched.
		assert_eq!(factory.recursive_field_storage.len(), 1);

		let recursive = factory.recursive_field_storage.values().next().unwrap();
		let target = recursive.target().expect("placeholder is patched after a successful build");
		assert!(matches!(&**target, FieldDecoder::Composite(_)), "patched target is the composite, not another placeholder");
	}

	#[test]
	fn recursive_type_decodes_nested_payloads() {
		let meta = xcm_metadata();

		let registry = Factory::new().build_call_registry(&meta).expect("can build registry for recursive type");
		let ty = registry.get("XcmPallet.execute").expect("call entry exists");

		// Three levels of nesting: transact(transact(clear_origin)).
		let message = Xcm {
			instructions: vec![XcmInstruction::Transact {
				xcm: Xcm {
					instructions: vec![XcmInstruction::Transact {
						xcm: Xcm { instructions: vec![XcmInstruction::ClearOrigin] },
					}],
				},
			}],
		};
		let bytes = message.encode();

		let data = &mut &*bytes;
		let value = ty.decode(data).expect("can decode nested payload");
		assert_eq!(data.len(), 0);

		let xcm_key = path_name("Xcm");
		let level_3 = Value::composite(vec![("instructions", Value::sequence(vec![Value::u8(0)]))]);
		let level_2 = Value::composite(vec![(
			"instructions",
			Value::sequence(vec![Value::composite(vec![(xcm_key.as_str(), level_3)])]),
		)]);
		let level_1 = Value::composite(vec![(
			"instructions",
			Value::sequence(vec![Value::composite(vec![(xcm_key.as_str(), level_2)])]),
		)]);
		assert_eq!(value, Value::composite(vec![(xcm_key.as_str(), level_1)]));
	}

	#[test]
	fn shared_field_types_share_decoders() {
		#[allow(dead_code, non_camel_case_types)]
		#[derive(TypeInfo)]
		enum BalancesCall {
			transfer { amount: u128 },
			force_transfer { amount: u128 },
		}

		let meta = v14_metadata(vec![PalletMetadata {
			calls: Some(PalletCallMetadata { ty: meta_type::<BalancesCall>() }),
			..pallet("Balances", 5)
		}]);

		let registry = Factory::new().build_call_registry(&meta).expect("can build call registry");

		let transfer = &registry.get("Balances.transfer").unwrap().fields[0];
		let force_transfer = &registry.get("Balances.force_transfer").unwrap().fields[0];

		assert_eq!(transfer.lookup_index, force_transfer.lookup_index);
		assert!(Arc::ptr_eq(&transfer.decoder, &force_transfer.decoder), "memoized decoder is re-used, not rebuilt");
	}

	#[test]
	fn storages_reset_between_builds() {
		#[allow(dead_code)]
		#[derive(TypeInfo)]
		enum SystemEvent {
			ExtrinsicSuccess { weight: u64 },
		}

		let meta = v14_metadata(vec![PalletMetadata {
			calls: Some(PalletCallMetadata { ty: meta_type::<XcmCall>() }),
			event: Some(PalletEventMetadata { ty: meta_type::<SystemEvent>() }),
			..pallet("XcmPallet", 30)
		}]);

		let mut factory = Factory::new();
		factory.build_call_registry(&meta).expect("can build call registry");
		assert!(!factory.field_storage.is_empty());

		let events = factory.build_event_registry(&meta).expect("can build event registry with the same factory");
		assert!(events.contains_key(&EventId::new(30, 0)));

		// The event build saw no recursive back-edges, so nothing is pending.
		assert!(factory.recursive_field_storage.is_empty());
	}
}
