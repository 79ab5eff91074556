//! Structural equality for query descriptors, used as the resume-safety gate.

use std::collections::BTreeSet;

use crate::query::descriptor::QueryDescriptor;

/// Two descriptors are equal iff they have the same parameter names and, for
/// every name, the same values in the same order.
pub fn descriptors_equal(a: &QueryDescriptor, b: &QueryDescriptor) -> bool {
    let a_names: BTreeSet<&str> = a.names().collect();
    let b_names: BTreeSet<&str> = b.names().collect();

    if a_names != b_names {
        return false;
    }

    a_names.into_iter().all(|name| a.get(name) == b.get(name))
}
