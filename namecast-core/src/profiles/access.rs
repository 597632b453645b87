// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access-control namespace layout.
//!
//! Protected content lives under a node whose `%C1.M.ACCESS` sub-tree
//! carries the control plane: the policy root, wrapped data keys and the
//! key-superseding chain. This module only derives and recognizes the
//! names of that layout; wrapping and unwrapping keys is out of scope for
//! the data plane.

use crate::name::{Component, ContentName};
use crate::profiles::versioning;

/// Command marker component opening an access-control sub-tree,
/// `%C1.M.ACCESS` in native form.
pub const ACCESS_MARKER_BYTES: [u8; 10] =
    [0xc1, b'.', b'M', b'.', b'A', b'C', b'C', b'E', b'S', b'S'];

/// Label of the wrapped data key node under the marker.
pub const DATA_KEY_LABEL: &str = "DK";

/// Label of the policy root node under the marker.
pub const ROOT_LABEL: &str = "ROOT";

/// Link from a retired key to the key replacing it.
pub const SUPERSEDED_BY_LABEL: &str = "SupersededBy";

/// Link from a key to the key it replaced.
pub const PREVIOUS_KEY_LABEL: &str = "PreviousKey";

/// Public half of a stored key pair.
pub const KEY_LABEL: &str = "Key";

/// Wrapped private half of a stored key pair.
pub const PRIVATE_KEY_LABEL: &str = "PrivateKey";

pub fn access_marker() -> Component {
    Component::new(ACCESS_MARKER_BYTES.to_vec())
}

/// True when the name passes through an access-control sub-tree.
pub fn is_access_name(name: &ContentName) -> bool {
    name.contains(&access_marker())
}

/// The protected node: the name truncated just before its access-control
/// marker, or `None` when it carries none.
pub fn access_root(name: &ContentName) -> Option<ContentName> {
    name.cut(&access_marker())
}

/// Name of the wrapped data key node for a protected node.
pub fn data_key_name(node: &ContentName) -> ContentName {
    node.append_component(access_marker())
        .append_component(Component::from(DATA_KEY_LABEL))
}

/// True for a versioned data key name: an access name whose last version
/// component directly follows the `DK` label.
pub fn is_data_key_name(name: &ContentName) -> bool {
    if !is_access_name(name) {
        return false;
    }
    let Some(index) = versioning::find_last_version_component(name) else {
        return false;
    };
    index >= 1 && name.components()[index - 1] == Component::from(DATA_KEY_LABEL)
}

/// Name of the policy root for a namespace.
pub fn root_name(namespace: &ContentName) -> ContentName {
    namespace.append(&root_postfix())
}

/// The marker-relative policy root suffix, `/%C1.M.ACCESS/ROOT`.
pub fn root_postfix() -> ContentName {
    ContentName::new(vec![access_marker(), Component::from(ROOT_LABEL)])
}
