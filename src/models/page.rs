//! One page of a marker-paginated bucket listing.

use super::object::ObjectRecord;

/// Ordered listing page plus the marker to resume from.
///
/// `next_marker == None` means this is the last page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub objects: Vec<ObjectRecord>,
    pub next_marker: Option<String>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next_marker.is_none()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
