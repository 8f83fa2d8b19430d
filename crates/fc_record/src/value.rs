//! Field values and the on-disk column type system.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

/// Per-field dimension annotation. A missing shape, or a non-positive
/// leading entry, selects the variable-length column variant at table
/// creation.
pub type Shape = SmallVec<[i32; 2]>;

/// A single recorded field value. The set is closed: backends match on the
/// tag and never inspect runtime types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
    Uuid(Uuid),
    String(String),
    Blob(Vec<u8>),
    VectorInt(Vec<i32>),
    VectorString(Vec<String>),
    SetInt(BTreeSet<i32>),
    ListInt(Vec<i32>),
    PairIntInt(i32, i32),
    MapIntInt(BTreeMap<i32, i32>),
}

impl Value {
    /// Human-readable kind name for error context.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Uuid(_) => "uuid",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
            Value::VectorInt(_) => "vector<int>",
            Value::VectorString(_) => "vector<string>",
            Value::SetInt(_) => "set<int>",
            Value::ListInt(_) => "list<int>",
            Value::PairIntInt(_, _) => "pair<int,int>",
            Value::MapIntInt(_) => "map<int,int>",
        }
    }
}

/// On-disk column kinds. Ordinals are persisted in archive schemas and
/// must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbType {
    Bool = 0,
    Int = 1,
    Float = 2,
    Double = 3,
    String = 4,
    VlString = 5,
    Blob = 6,
    Uuid = 7,
    VectorInt = 8,
    VlVectorInt = 9,
    VectorString = 10,
    VectorVlString = 11,
    VlVectorString = 12,
    VlVectorVlString = 13,
    SetInt = 14,
    VlSetInt = 15,
    ListInt = 16,
    VlListInt = 17,
    PairIntInt = 18,
    MapIntInt = 19,
    VlMapIntInt = 20,
}

impl DbType {
    pub fn ordinal(self) -> u32 {
        self as u32
    }

    pub fn from_ordinal(ordinal: u32) -> Option<DbType> {
        use DbType::{
            Blob, Bool, Double, Float, Int, ListInt, MapIntInt, PairIntInt, SetInt, String, Uuid,
            VectorInt, VectorString, VectorVlString, VlListInt, VlMapIntInt, VlSetInt, VlString,
            VlVectorInt, VlVectorString, VlVectorVlString,
        };
        const ALL: [DbType; 21] = [
            Bool,
            Int,
            Float,
            Double,
            String,
            VlString,
            Blob,
            Uuid,
            VectorInt,
            VlVectorInt,
            VectorString,
            VectorVlString,
            VlVectorString,
            VlVectorVlString,
            SetInt,
            VlSetInt,
            ListInt,
            VlListInt,
            PairIntInt,
            MapIntInt,
            VlMapIntInt,
        ];
        ALL.get(ordinal as usize).copied()
    }

    /// Whether the row stores a side-store digest instead of the value.
    pub fn is_vl(self) -> bool {
        self.vl_family().is_some()
    }

    /// The side store this type's payloads live in, if any. Fixed-width
    /// string vectors also touch the `String` family for their elements
    /// but carry digests inline, so they report `None` here.
    pub fn vl_family(self) -> Option<VlFamily> {
        match self {
            DbType::VlString => Some(VlFamily::String),
            DbType::Blob => Some(VlFamily::Blob),
            DbType::VlVectorInt => Some(VlFamily::VectorInt),
            DbType::VlVectorString | DbType::VlVectorVlString => Some(VlFamily::VectorString),
            DbType::VlSetInt => Some(VlFamily::SetInt),
            DbType::VlListInt => Some(VlFamily::ListInt),
            DbType::VlMapIntInt => Some(VlFamily::MapIntInt),
            _ => None,
        }
    }
}

/// The variable-length side stores. Each family owns a keys dataset (one
/// digest per unique value, insertion-ordered) and a values dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VlFamily {
    String = 0,
    Blob = 1,
    VectorInt = 2,
    VectorString = 3,
    SetInt = 4,
    ListInt = 5,
    MapIntInt = 6,
}

impl VlFamily {
    pub const ALL: [VlFamily; 7] = [
        VlFamily::String,
        VlFamily::Blob,
        VlFamily::VectorInt,
        VlFamily::VectorString,
        VlFamily::SetInt,
        VlFamily::ListInt,
        VlFamily::MapIntInt,
    ];

    /// Dataset base name; `Keys`/`Vals` suffixes hang off this.
    pub fn dataset_name(self) -> &'static str {
        match self {
            VlFamily::String => "String",
            VlFamily::Blob => "Blob",
            VlFamily::VectorInt => "VectorInt",
            VlFamily::VectorString => "VectorString",
            VlFamily::SetInt => "SetInt",
            VlFamily::ListInt => "ListInt",
            VlFamily::MapIntInt => "MapIntInt",
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<VlFamily> {
        VlFamily::ALL.get(tag as usize).copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
