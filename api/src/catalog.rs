use std::fmt;

use codec::Decode;
use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed};
use scale_info::{PortableRegistry, TypeDef};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A callable extrinsic, addressed by its camelCased section and method name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle {
    pub section: String,
    pub method: String,
    pub pallet_index: u8,
    pub call_index: u8,
}

impl TxHandle {
    /// SCALE call prefix (`pallet_index ++ call_index`).
    pub fn call_prefix(&self) -> [u8; 2] {
        [self.pallet_index, self.call_index]
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.method)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxSection {
    pub name: String,
    pub methods: Vec<TxHandle>,
}

/// Extrinsics exposed by the runtime, keyed by section then method.
///
/// Iteration follows metadata declaration order and is never re-sorted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodCatalog {
    sections: Vec<TxSection>,
}

impl MethodCatalog {
    /// Sections without methods are dropped.
    pub fn new(sections: Vec<TxSection>) -> Self {
        Self {
            sections: sections
                .into_iter()
                .filter(|section| !section.methods.is_empty())
                .collect(),
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = &TxSection> {
        self.sections.iter()
    }

    pub fn section(&self, name: &str) -> Option<&TxSection> {
        self.sections.iter().find(|section| section.name == name)
    }

    pub fn get(&self, section: &str, method: &str) -> Option<&TxHandle> {
        self.section(section)?
            .methods
            .iter()
            .find(|handle| handle.method == method)
    }

    /// First method of the first section.
    pub fn first(&self) -> Option<&TxHandle> {
        self.sections.first()?.methods.first()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Runtime constants, keyed by section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstantsCatalog {
    sections: Vec<(String, Vec<String>)>,
}

impl ConstantsCatalog {
    pub fn new(sections: Vec<(String, Vec<String>)>) -> Self {
        Self {
            sections: sections
                .into_iter()
                .filter(|(_, names)| !names.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, section: &str, name: &str) -> bool {
        self.sections
            .iter()
            .any(|(s, names)| s == section && names.iter().any(|n| n == name))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }
}

/// What the chain exposes once its metadata is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSurface {
    pub genesis_hash: [u8; 32],
    pub tx: MethodCatalog,
    pub consts: ConstantsCatalog,
}

impl RuntimeSurface {
    pub fn from_metadata(genesis_hash: [u8; 32], metadata_bytes: &[u8]) -> Result<Self, ApiError> {
        let metadata = decode_metadata(metadata_bytes)?;
        let (tx, consts) = build_catalogs(&metadata)?;
        Ok(Self {
            genesis_hash,
            tx,
            consts,
        })
    }
}

pub fn decode_metadata(metadata_bytes: &[u8]) -> Result<RuntimeMetadata, ApiError> {
    let prefixed = RuntimeMetadataPrefixed::decode(&mut &metadata_bytes[..]).map_err(|e| {
        ApiError::Serialization(format!("failed to decode runtime metadata: {e}"))
    })?;
    Ok(prefixed.1)
}

pub fn build_catalogs(
    metadata: &RuntimeMetadata,
) -> Result<(MethodCatalog, ConstantsCatalog), ApiError> {
    match metadata {
        RuntimeMetadata::V14(meta) => build_catalogs_impl(
            &meta.pallets,
            &meta.types,
            |pallet| pallet.name.as_ref(),
            |pallet| pallet.index,
            |pallet| pallet.calls.as_ref().map(|calls| calls.ty.id),
            |pallet| pallet.constants.iter().map(|c| c.name.clone()).collect(),
        ),
        RuntimeMetadata::V15(meta) => build_catalogs_impl(
            &meta.pallets,
            &meta.types,
            |pallet| pallet.name.as_ref(),
            |pallet| pallet.index,
            |pallet| pallet.calls.as_ref().map(|calls| calls.ty.id),
            |pallet| pallet.constants.iter().map(|c| c.name.clone()).collect(),
        ),
        RuntimeMetadata::V16(meta) => build_catalogs_impl(
            &meta.pallets,
            &meta.types,
            |pallet| pallet.name.as_ref(),
            |pallet| pallet.index,
            |pallet| pallet.calls.as_ref().map(|calls| calls.ty.id),
            |pallet| pallet.constants.iter().map(|c| c.name.clone()).collect(),
        ),
        _ => Err(ApiError::Serialization(format!(
            "unsupported runtime metadata version {}",
            metadata.version()
        ))),
    }
}

fn build_catalogs_impl<Pallet, NameFn, IndexFn, CallsFn, ConstsFn>(
    pallets: &[Pallet],
    registry: &PortableRegistry,
    name_fn: NameFn,
    index_fn: IndexFn,
    calls_fn: CallsFn,
    consts_fn: ConstsFn,
) -> Result<(MethodCatalog, ConstantsCatalog), ApiError>
where
    NameFn: Fn(&Pallet) -> &str,
    IndexFn: Fn(&Pallet) -> u8,
    CallsFn: Fn(&Pallet) -> Option<u32>,
    ConstsFn: Fn(&Pallet) -> Vec<String>,
{
    let mut tx_sections = Vec::with_capacity(pallets.len());
    let mut const_sections = Vec::with_capacity(pallets.len());

    for pallet in pallets {
        let pallet_name = name_fn(pallet);
        let section = camel_case(pallet_name);

        const_sections.push((
            section.clone(),
            consts_fn(pallet).iter().map(|name| camel_case(name)).collect(),
        ));

        let Some(call_type_id) = calls_fn(pallet) else {
            continue;
        };
        let call_type = registry.resolve(call_type_id).ok_or_else(|| {
            ApiError::Serialization(format!(
                "runtime metadata missing call type {call_type_id} for {pallet_name}"
            ))
        })?;
        let TypeDef::Variant(variant) = &call_type.type_def else {
            return Err(ApiError::Serialization(format!(
                "runtime metadata call enum for {pallet_name} is not a variant"
            )));
        };

        let pallet_index = index_fn(pallet);
        let methods = variant
            .variants
            .iter()
            .map(|call| TxHandle {
                section: section.clone(),
                method: camel_case(&call.name),
                pallet_index,
                call_index: call.index,
            })
            .collect();
        tx_sections.push(TxSection {
            name: section,
            methods,
        });
    }

    Ok((
        MethodCatalog::new(tx_sections),
        ConstantsCatalog::new(const_sections),
    ))
}

/// `ShieldedPool` -> `shieldedPool`, `set_code` -> `setCode`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, ch) in name.chars().enumerate() {
        if ch == '_' || ch == '-' || ch == ' ' {
            upper_next = !out.is_empty();
            continue;
        }
        if i == 0 || out.is_empty() {
            out.extend(ch.to_lowercase());
        } else if upper_next {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        upper_next = false;
    }
    out
}
