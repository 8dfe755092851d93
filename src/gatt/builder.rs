use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::mem;

use smallvec::SmallVec;
use tracing::warn;

use crate::att::{Handle, HandleRange};
use crate::Uuid;

use super::*;

/// Incremental [`Db`] constructor driven by the discovery procedures
/// ([Vol 3] Part G, Section 4).
///
/// The caller feeds in attributes as the peer reports them and asks the
/// builder which handle range to explore next. Services are visited in
/// ascending start-handle order regardless of insertion order, so a service
/// first learned about through an include declaration is still explored even
/// when its range precedes the service currently being walked.
///
/// Malformed input from the peer is logged and dropped; the builder never
/// panics on it.
#[derive(Clone, Debug)]
#[must_use]
pub struct DbBuilder {
    db: Db,
    /// Range of the service currently being explored.
    exploring: Option<HandleRange>,
    /// Declaration handle of the last characteristic whose descriptor range
    /// was handed out, `MAX` once the current service is exhausted.
    pending_char: Handle,
    to_explore: BTreeSet<HandleRange>,
}

impl DbBuilder {
    /// Creates an empty builder.
    #[inline]
    pub fn new() -> Self {
        Self {
            db: Db::default(),
            exploring: None,
            pending_char: Handle::MIN,
            to_explore: BTreeSet::new(),
        }
    }

    /// Adds a service discovered on the peer and queues its handle range for
    /// exploration.
    ///
    /// Services may arrive in any order. The database stays sorted by start
    /// handle, with an append fast path for the common in-order case.
    pub fn add_service(&mut self, handle: Handle, end_handle: Handle, uuid: Uuid, is_primary: bool) {
        if end_handle < handle {
            warn!("Service {handle} with invalid end handle {end_handle}");
            return;
        }
        let s = Service {
            handle,
            end_handle,
            uuid,
            is_primary,
            included_services: SmallVec::new(),
            characteristics: Vec::new(),
        };
        match self.db.services.last() {
            Some(last) if handle <= last.end_handle => {
                let i = (self.db.services).partition_point(|v| v.end_handle < handle);
                self.db.services.insert(i, s);
            }
            _ => self.db.services.push(s),
        }
        self.to_explore.insert(HandleRange::new(handle, end_handle));
    }

    /// Adds an include declaration to the service containing `handle`.
    ///
    /// Primary services are all discovered up front, so an include whose
    /// target is not in the database yet must refer to a secondary service.
    /// The target is added as one and queued for exploration.
    pub fn add_included_service(
        &mut self,
        handle: Handle,
        uuid: Uuid,
        start_handle: Handle,
        end_handle: Handle,
    ) {
        if self.db.service_at(handle).is_none() {
            warn!("Include declaration {handle} without a covering service");
            return;
        }
        if self.db.service_at(start_handle).is_none() {
            self.add_service(start_handle, end_handle, uuid, false);
        }
        // add_service may have shifted the vec, so re-find the owner
        if let Some(s) = self.db.service_at_mut(handle) {
            s.included_services.push(IncludedService {
                handle,
                uuid,
                start_handle,
                end_handle,
            });
        }
    }

    /// Adds a characteristic declaration to the service containing `handle`.
    pub fn add_characteristic(
        &mut self,
        handle: Handle,
        value_handle: Handle,
        uuid: Uuid,
        properties: CharProps,
    ) {
        let Some(s) = self.db.service_at_mut(handle) else {
            warn!("Characteristic declaration {handle} without a covering service");
            return;
        };
        if s.end_handle < value_handle {
            // Tolerated because the declaration itself is in range
            warn!(
                "Characteristic {handle} value handle {value_handle} outside of service {}",
                s.handle
            );
        }
        s.characteristics.push(Characteristic {
            handle,
            value_handle,
            uuid,
            properties,
            descriptors: SmallVec::new(),
        });
    }

    /// Adds a descriptor to the characteristic preceding `handle` within the
    /// service containing `handle`.
    pub fn add_descriptor(&mut self, handle: Handle, uuid: Uuid) {
        let Some(s) = self.db.service_at_mut(handle) else {
            warn!("Descriptor {handle} without a covering service");
            return;
        };
        let Some(c) = (s.characteristics.iter_mut())
            .rev()
            .find(|c| c.handle <= handle)
        else {
            warn!("Descriptor {handle} without a preceding characteristic");
            return;
        };
        c.descriptors.push(Descriptor { handle, uuid });
    }

    /// Picks the next queued service and makes it current. Returns `false`
    /// when no explorable services remain.
    ///
    /// Services whose range covers only the declaration itself can contain
    /// nothing and are consumed without becoming current.
    pub fn start_next_service(&mut self) -> bool {
        while let Some(r) = self.to_explore.pop_first() {
            if r.is_single() {
                continue;
            }
            self.exploring = Some(r);
            self.pending_char = Handle::MIN;
            return true;
        }
        self.exploring = None;
        false
    }

    /// Returns the handle range of the service currently being explored.
    #[inline]
    #[must_use]
    pub fn current_service(&self) -> Option<HandleRange> {
        self.exploring
    }

    /// Returns the next descriptor handle range of the current service, or
    /// [`None`] once every characteristic has been visited.
    ///
    /// A characteristic declaration is followed by its value attribute, so
    /// candidate descriptors occupy `declaration + 2` through the handle
    /// preceding the next declaration (or the service end for the last
    /// characteristic). Characteristics with no room for descriptors are
    /// skipped.
    pub fn next_descriptor_range(&mut self) -> Option<HandleRange> {
        let r = self.exploring?;
        let Some(s) = self.db.service_at(r.start()) else {
            self.pending_char = Handle::MAX;
            return None;
        };
        for (i, c) in s.characteristics.iter().enumerate() {
            if c.handle <= self.pending_char {
                continue;
            }
            let Some(start) = c.handle.checked_add(2) else {
                continue;
            };
            let end = match s.characteristics.get(i + 1) {
                // A misordered next declaration at the minimum handle leaves
                // no valid gap, same as end < start below
                Some(next) => match Handle::new(u16::from(next.handle) - 1) {
                    Some(end) => end,
                    None => continue,
                },
                None => s.end_handle,
            };
            if end < start {
                continue;
            }
            self.pending_char = c.handle;
            return Some(HandleRange::new(start, end));
        }
        self.pending_char = Handle::MAX;
        None
    }

    /// Returns whether any services were discovered since the last
    /// [`Self::build`].
    #[inline]
    #[must_use]
    pub fn in_progress(&self) -> bool {
        !self.db.is_empty()
    }

    /// Finishes discovery, returning the database and resetting the builder.
    pub fn build(&mut self) -> Db {
        self.exploring = None;
        self.pending_char = Handle::MIN;
        self.to_explore = BTreeSet::new();
        mem::take(&mut self.db)
    }

    /// Discards all discovery state.
    #[inline]
    pub fn clear(&mut self) {
        drop(self.build());
    }
}

impl Default for DbBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DbBuilder {
    /// Writes a dump of the partial database.
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.db, f)
    }
}
