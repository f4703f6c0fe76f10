use super::{Entity, METADATA_FIELD};

/// Strips store-injected metadata, leaving identity and data attributes untouched.
pub trait Sanitize {
    fn sanitize(&mut self);
}

impl Sanitize for Entity {
    fn sanitize(&mut self) {
        self.0.remove(METADATA_FIELD);
    }
}

impl Sanitize for [Entity] {
    fn sanitize(&mut self) {
        for e in self.iter_mut() {
            e.sanitize();
        }
    }
}

impl Sanitize for Vec<Entity> {
    fn sanitize(&mut self) {
        self.as_mut_slice().sanitize();
    }
}

/// Owned-value convenience over [`Sanitize`]; works for one entity or a sequence.
#[must_use]
pub fn clean<T: Sanitize>(mut value: T) -> T {
    value.sanitize();
    value
}
