//! JSON wire form of a compilation unit.
//!
//! Front-ends hand the analyzer a [`WireUnit`]; the annotated IR goes back
//! out in the same shape, with elided regions spelled out and inferred
//! variances attached to each type definition.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A compilation unit as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireUnit {
    /// Unit name
    #[serde(default)]
    pub name: String,
    /// File identifier the spans refer to
    #[serde(default)]
    pub file: u32,
    /// Type constructor definitions
    #[serde(default)]
    pub types: Vec<WireTypeDef>,
    /// Function definitions
    #[serde(default)]
    pub functions: Vec<WireFnDef>,
    /// Disjointness proof requests
    #[serde(default)]
    pub proofs: Vec<WireProof>,
}

/// Struct or enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireTypeKind {
    /// Struct
    #[default]
    Struct,
    /// Enum
    Enum,
}

/// A type constructor definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireTypeDef {
    /// Constructor name
    pub name: String,
    /// Struct or enum
    #[serde(default)]
    pub kind: WireTypeKind,
    /// Region parameter declarations (`"'a"`, `"'b: 'a"`)
    #[serde(default)]
    pub regions: Vec<String>,
    /// Type parameter names
    #[serde(default)]
    pub params: Vec<String>,
    /// Struct fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<WireField>,
    /// Enum variants
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<WireVariant>,
    /// Phantom ownership markers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owns: Vec<String>,
    /// Destructor logic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop: Option<WireDrop>,
    /// Iterator-like type yielding at most one loan per step
    #[serde(default, skip_serializing_if = "is_false")]
    pub one_shot: bool,
    /// Inferred variance per parameter (annotated output only)
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variances: IndexMap<String, String>,
    /// Source span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<[u32; 2]>,
}

/// A field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireField {
    /// Field name
    pub name: String,
    /// Field type in text syntax
    pub ty: String,
    /// Whether the field is public
    #[serde(default, rename = "pub", skip_serializing_if = "is_false")]
    pub public: bool,
}

/// An enum variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireVariant {
    /// Variant name
    pub name: String,
    /// Payload fields
    #[serde(default)]
    pub fields: Vec<WireField>,
}

/// Destructor logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireDrop {
    /// Type parameters the destructor accesses
    #[serde(default)]
    pub accesses: Vec<String>,
    /// Source span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<[u32; 2]>,
}

/// A function definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireFnDef {
    /// Function name
    pub name: String,
    /// Whether the function is public
    #[serde(default, rename = "pub", skip_serializing_if = "is_false")]
    pub public: bool,
    /// Region parameter declarations
    #[serde(default)]
    pub regions: Vec<String>,
    /// Type parameter names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<String>,
    /// Parameters; a parameter named `self` is the receiver
    #[serde(default)]
    pub params: Vec<WireParam>,
    /// Return type in text syntax, unit when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ret: Option<String>,
    /// Body locals, parameters excluded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locals: Vec<WireLocal>,
    /// Body operations; `None` for declarations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<WireOp>>,
    /// Source span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<[u32; 2]>,
}

/// A function parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireParam {
    /// Parameter name
    pub name: String,
    /// Parameter type in text syntax
    pub ty: String,
    /// Element count for sequential containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<u64>,
}

/// A body local.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireLocal {
    /// Local name
    pub name: String,
    /// Local type in text syntax
    pub ty: String,
    /// Whether the binding is mutable
    #[serde(default, rename = "mut", skip_serializing_if = "is_false")]
    pub mutable: bool,
    /// Element count for sequential containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<u64>,
}

/// Borrow kind on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireBorrowKind {
    /// Shared
    #[default]
    Shared,
    /// Mutable
    Mut,
}

/// A body operation on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum WireOpKind {
    /// Open a scope
    EnterScope,
    /// Close a scope
    ExitScope,
    /// Bind a local
    Bind {
        /// Local name
        local: String,
    },
    /// End a local's storage
    Drop {
        /// Local name
        local: String,
    },
    /// Read a place
    Read {
        /// Place text
        place: String,
    },
    /// Write a place
    Write {
        /// Place text
        place: String,
        /// Whether the write changes an enum discriminant
        #[serde(default, skip_serializing_if = "is_false")]
        discriminant: bool,
    },
    /// Borrow a place
    Borrow {
        /// Handle name
        handle: String,
        /// Place text
        place: String,
        /// Shared or mutable
        #[serde(default)]
        kind: WireBorrowKind,
        /// Explicit region
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
    },
    /// Copy a handle
    Copy {
        /// New handle
        handle: String,
        /// Source handle
        from: String,
    },
    /// Store a handle into a place
    Store {
        /// Handle name
        handle: String,
        /// Destination place text
        into: String,
    },
    /// Release a handle
    Release {
        /// Handle name
        handle: String,
    },
    /// Call a function
    Call {
        /// Callee name
        callee: String,
        /// Argument handles; `null` for plain values
        #[serde(default)]
        args: Vec<Option<String>>,
        /// Result handle
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dest: Option<String>,
    },
    /// Return
    Return {
        /// Returned handle
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// Split a mutable container loan
    Split {
        /// Source handle
        source: String,
        /// Split index
        at: u64,
        /// Left handle
        left: String,
        /// Right handle
        right: String,
        /// Region the halves are re-bounded to
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<String>,
    },
    /// Create an iterator
    Iter {
        /// Iterator name
        iter: String,
        /// Source handle
        source: String,
        /// Whether yields are pairwise disjoint. Trusted as given; only
        /// one-shot type definitions are checked for encapsulation.
        #[serde(default = "default_true")]
        one_shot: bool,
    },
    /// Advance an iterator
    Advance {
        /// Iterator name
        iter: String,
        /// Output handle
        output: String,
    },
    /// Access the backing store through an iterator
    Expose {
        /// Iterator name
        iter: String,
        /// Shared or mutable
        #[serde(default)]
        kind: WireBorrowKind,
    },
}

/// A body operation with an optional span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOp {
    /// The operation
    #[serde(flatten)]
    pub kind: WireOpKind,
    /// Source span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<[u32; 2]>,
}

/// A disjointness proof request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireProof {
    /// Function the request applies to
    pub function: String,
    /// First place text
    pub left: String,
    /// Second place text
    pub right: String,
    /// Source span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<[u32; 2]>,
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "serde skip predicates take references")]
fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

impl WireUnit {
    /// Decodes a unit from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the decoder error when the document does not match the wire form.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encodes the unit as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the encoder error; this only happens for non-string map keys.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ops() {
        let text = r#"{
            "name": "demo",
            "functions": [{
                "name": "main",
                "locals": [{"name": "v", "ty": "Vec<u8>", "mut": true, "len": 4}],
                "body": [
                    {"op": "bind", "local": "v"},
                    {"op": "borrow", "handle": "l", "place": "v", "kind": "mut", "span": [3, 9]},
                    {"op": "call", "callee": "f", "args": ["l", null], "dest": "r"},
                    {"op": "iter", "iter": "it", "source": "r"}
                ]
            }]
        }"#;
        let unit = WireUnit::from_json(text).unwrap_or_else(|err| panic!("{err}"));
        let body = unit.functions[0].body.as_ref().unwrap_or_else(|| panic!("no body"));
        assert_eq!(body.len(), 4);
        assert_eq!(body[1].span, Some([3, 9]));
        assert!(matches!(
            &body[1].kind,
            WireOpKind::Borrow { kind: WireBorrowKind::Mut, region: None, .. }
        ));
        assert!(matches!(
            &body[2].kind,
            WireOpKind::Call { args, .. } if args == &[Some("l".to_string()), None]
        ));
        assert!(matches!(&body[3].kind, WireOpKind::Iter { one_shot: true, .. }));
    }
}
