use std::fmt::{Display, Formatter};

use smallvec::SmallVec;

use crate::att::Handle;
use crate::Uuid;

use super::*;

/// Characteristic descriptor discovered on the peer
/// ([Vol 3] Part G, Section 3.3.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Descriptor {
    pub handle: Handle,
    pub uuid: Uuid,
}

/// Characteristic discovered on the peer ([Vol 3] Part G, Section 3.3).
///
/// `handle` is the declaration attribute; the value attribute follows at
/// `value_handle`. Descriptors are kept in discovery order, which is
/// ascending handle order for a well-behaved peer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Characteristic {
    pub handle: Handle,
    pub value_handle: Handle,
    pub uuid: Uuid,
    pub properties: CharProps,
    pub descriptors: SmallVec<[Descriptor; 2]>,
}

/// Include declaration discovered on the peer
/// ([Vol 3] Part G, Section 3.2).
///
/// A non-owning cross-reference: the service covering
/// `start_handle..=end_handle` is a normal top-level [`Service`] elsewhere in
/// the same database.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IncludedService {
    /// Handle of the include declaration within the including service.
    pub handle: Handle,
    pub uuid: Uuid,
    pub start_handle: Handle,
    pub end_handle: Handle,
}

/// Primary or secondary service discovered on the peer
/// ([Vol 3] Part G, Section 3.1).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Service {
    /// Declaration handle and start of the service's handle range.
    pub handle: Handle,
    pub end_handle: Handle,
    pub uuid: Uuid,
    pub is_primary: bool,
    pub included_services: SmallVec<[IncludedService; 1]>,
    pub characteristics: Vec<Characteristic>,
}

impl Service {
    /// Returns whether `hdl` falls within the service's handle range.
    #[inline]
    #[must_use]
    pub fn contains(&self, hdl: Handle) -> bool {
        self.handle <= hdl && hdl <= self.end_handle
    }
}

/// Read-only model of a remote device's attribute table.
///
/// Services are kept sorted by start handle with non-overlapping ranges.
/// Populated by [`DbBuilder::build`] or [`Db::deserialize`]; read-only
/// afterwards except for [`Db::clear`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct Db {
    pub(super) services: Vec<Service>,
}

impl Db {
    /// Returns the service whose handle range contains `hdl`, if any.
    ///
    /// Valid both for a finished database and for one still being built by
    /// [`DbBuilder`].
    #[must_use]
    pub fn service_at(&self, hdl: Handle) -> Option<&Service> {
        self.services.iter().find(|s| s.contains(hdl))
    }

    pub(super) fn service_at_mut(&mut self, hdl: Handle) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.contains(hdl))
    }

    /// Returns the characteristic whose value attribute is `hdl`, if any.
    #[must_use]
    pub fn characteristic_at(&self, hdl: Handle) -> Option<&Characteristic> {
        (self.service_at(hdl)?.characteristics.iter()).find(|c| c.value_handle == hdl)
    }

    /// Returns the descriptor at `hdl`, if any.
    #[must_use]
    pub fn descriptor_at(&self, hdl: Handle) -> Option<&Descriptor> {
        (self.service_at(hdl)?.characteristics.iter())
            .flat_map(|c| c.descriptors.iter())
            .find(|d| d.handle == hdl)
    }

    /// Returns whether the database contains no services.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Returns all services in ascending handle order.
    #[inline]
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Removes all services, releasing the backing storage.
    ///
    /// Repeated discovery sessions must not retain capacity proportional to
    /// the largest database ever seen.
    #[inline]
    pub fn clear(&mut self) {
        self.services = Vec::new();
    }

    /// Returns the number of records [`Db::serialize`] will produce.
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        (self.services.iter()).fold(0, |n, s| {
            n + 1
                + s.included_services.len()
                + (s.characteristics.iter()).fold(0, |n, c| n + 1 + c.descriptors.len())
        })
    }

    /// Flattens the database into a linear record stream for persistence.
    ///
    /// All service records come first, in database order, followed by each
    /// service's includes, then its characteristics, each immediately
    /// followed by its descriptors. An empty database yields an empty stream.
    #[must_use]
    pub fn serialize(&self) -> Vec<StoredAttribute> {
        let mut v = Vec::with_capacity(self.attribute_count());
        for s in &self.services {
            v.push(StoredAttribute::Service {
                handle: s.handle,
                end_handle: s.end_handle,
                uuid: s.uuid,
                is_primary: s.is_primary,
            });
        }
        for s in &self.services {
            for i in &s.included_services {
                v.push(StoredAttribute::Include {
                    handle: i.handle,
                    start_handle: i.start_handle,
                    end_handle: i.end_handle,
                    uuid: i.uuid,
                });
            }
            for c in &s.characteristics {
                v.push(StoredAttribute::Characteristic {
                    handle: c.handle,
                    value_handle: c.value_handle,
                    uuid: c.uuid,
                    properties: c.properties,
                });
                for d in &c.descriptors {
                    v.push(StoredAttribute::Descriptor {
                        handle: d.handle,
                        uuid: d.uuid,
                    });
                }
            }
        }
        v
    }

    /// Rebuilds a database from a [`Db::serialize`] record stream.
    ///
    /// A corrupted stream fails fast: the first record that does not fit the
    /// model aborts deserialization and the caller must discard everything.
    /// Service records must form a prefix sorted by ascending start handle
    /// with non-overlapping ranges.
    pub fn deserialize(attrs: &[StoredAttribute]) -> Result<Self, DeserializeError> {
        let mut db = Self::default();

        // Service records form a prefix of the stream.
        let n = (attrs.iter())
            .take_while(|at| matches!(at, StoredAttribute::Service { .. }))
            .count();
        for at in &attrs[..n] {
            let &StoredAttribute::Service {
                handle,
                end_handle,
                uuid,
                is_primary,
            } = at
            else {
                unreachable!();
            };
            db.services.push(Service {
                handle,
                end_handle,
                uuid,
                is_primary,
                included_services: SmallVec::new(),
                characteristics: Vec::new(),
            });
        }

        // The owner cursor below requires sorted, non-overlapping ranges.
        for w in db.services.windows(2) {
            if w[1].handle <= w[0].end_handle {
                return Err(DeserializeError::OverlappingService(w[1].handle));
            }
        }

        // Remaining records appear in ascending handle order and records of
        // one service are contiguous, so the owner cursor only moves forward.
        let mut cur = 0_usize;
        for at in &attrs[n..] {
            let hdl = at.handle();
            while db.services.get(cur).map_or(false, |s| s.end_handle < hdl) {
                cur += 1;
            }
            if !db.services.get(cur).map_or(false, |s| s.handle <= hdl) {
                return Err(DeserializeError::OrphanAttribute(hdl));
            }
            match *at {
                StoredAttribute::Service { handle, .. } => {
                    return Err(DeserializeError::MisplacedService(handle));
                }
                StoredAttribute::Include {
                    handle,
                    start_handle,
                    end_handle,
                    uuid,
                } => {
                    // The target must have been materialized from the prefix.
                    if !db.services.iter().any(|s| s.handle == start_handle) {
                        return Err(DeserializeError::UnknownIncludeTarget {
                            handle,
                            target: start_handle,
                        });
                    }
                    db.services[cur].included_services.push(IncludedService {
                        handle,
                        start_handle,
                        end_handle,
                        uuid,
                    });
                }
                StoredAttribute::Characteristic {
                    handle,
                    value_handle,
                    uuid,
                    properties,
                } => db.services[cur].characteristics.push(Characteristic {
                    handle,
                    value_handle,
                    uuid,
                    properties,
                    descriptors: SmallVec::new(),
                }),
                StoredAttribute::Descriptor { handle, uuid } => {
                    let Some(c) = db.services[cur].characteristics.last_mut() else {
                        return Err(DeserializeError::DescriptorWithoutCharacteristic(handle));
                    };
                    c.descriptors.push(Descriptor { handle, uuid });
                }
            }
        }
        Ok(db)
    }
}

impl Display for Db {
    /// Writes a hierarchical dump of the database, one attribute per line.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for s in &self.services {
            let typ = if s.is_primary {
                "Primary Service"
            } else {
                "Secondary Service"
            };
            writeln!(
                f,
                "[{}..={}] {typ} <{}>",
                s.handle, s.end_handle, s.uuid
            )?;
            for i in &s.included_services {
                writeln!(
                    f,
                    "    [{}] Include {}..={} <{}>",
                    i.handle, i.start_handle, i.end_handle, i.uuid
                )?;
            }
            for c in &s.characteristics {
                writeln!(
                    f,
                    "    [{}] Characteristic <{}> value {} props {:#04X}",
                    c.handle,
                    c.uuid,
                    c.value_handle,
                    c.properties.bits()
                )?;
                for d in &c.descriptors {
                    writeln!(f, "        [{}] Descriptor <{}>", d.handle, d.uuid)?;
                }
            }
        }
        Ok(())
    }
}

/// Error type returned by [`Db::deserialize`].
///
/// Any of these means the persisted stream is corrupt and the partial
/// database was discarded.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum DeserializeError {
    #[error("attribute {0} does not belong to any service")]
    OrphanAttribute(Handle),
    #[error("service declaration {0} after non-service records")]
    MisplacedService(Handle),
    #[error("service {0} overlaps or precedes an earlier service")]
    OverlappingService(Handle),
    #[error("include {handle} references unknown service {target}")]
    UnknownIncludeTarget { handle: Handle, target: Handle },
    #[error("descriptor {0} precedes any characteristic in its service")]
    DescriptorWithoutCharacteristic(Handle),
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;

    pub(in crate::gatt) fn hdl(h: u16) -> Handle {
        Handle::new(h).unwrap()
    }

    pub(in crate::gatt) fn uuid(v: u128) -> Uuid {
        #[allow(clippy::cast_possible_truncation)]
        if v <= u128::from(u16::MAX) {
            crate::Uuid16::new(v as u16).unwrap().as_uuid()
        } else {
            Uuid::new(v).unwrap()
        }
    }

    /// Two primary services, one include, two characteristics, and one
    /// descriptor, matching the serialized record order.
    pub(in crate::gatt) fn sample() -> Db {
        Db {
            services: vec![
                Service {
                    handle: hdl(0x0001),
                    end_handle: hdl(0x000B),
                    uuid: uuid(0x180D),
                    is_primary: true,
                    included_services: SmallVec::from_vec(vec![IncludedService {
                        handle: hdl(0x0002),
                        start_handle: hdl(0x0020),
                        end_handle: hdl(0x002F),
                        uuid: uuid(0x180F),
                    }]),
                    characteristics: vec![
                        Characteristic {
                            handle: hdl(0x0003),
                            value_handle: hdl(0x0004),
                            uuid: uuid(0x2A37),
                            properties: CharProps::NOTIFY,
                            descriptors: SmallVec::from_vec(vec![Descriptor {
                                handle: hdl(0x0005),
                                uuid: uuid(0x2902),
                            }]),
                        },
                        Characteristic {
                            handle: hdl(0x0006),
                            value_handle: hdl(0x0007),
                            uuid: uuid(0x2A38),
                            properties: CharProps::READ,
                            descriptors: SmallVec::new(),
                        },
                    ],
                },
                Service {
                    handle: hdl(0x0020),
                    end_handle: hdl(0x002F),
                    uuid: uuid(0x180F),
                    is_primary: false,
                    included_services: SmallVec::new(),
                    characteristics: vec![Characteristic {
                        handle: hdl(0x0021),
                        value_handle: hdl(0x0022),
                        uuid: uuid(0x2A19),
                        properties: CharProps::READ,
                        descriptors: SmallVec::new(),
                    }],
                },
            ],
        }
    }

    #[test]
    fn lookups() {
        let db = sample();
        assert_eq!(db.service_at(hdl(0x0001)).unwrap().uuid, uuid(0x180D));
        assert_eq!(db.service_at(hdl(0x000B)).unwrap().uuid, uuid(0x180D));
        assert!(db.service_at(hdl(0x000C)).is_none());
        assert_eq!(
            db.characteristic_at(hdl(0x0004)).unwrap().uuid,
            uuid(0x2A37)
        );
        assert!(db.characteristic_at(hdl(0x0003)).is_none());
        assert_eq!(db.descriptor_at(hdl(0x0005)).unwrap().uuid, uuid(0x2902));
        assert!(db.descriptor_at(hdl(0x0006)).is_none());
    }

    #[test]
    fn attribute_count() {
        assert_eq!(sample().attribute_count(), 7);
        assert_eq!(Db::default().attribute_count(), 0);
    }

    #[test]
    fn clear_releases_storage() {
        let mut db = sample();
        db.clear();
        assert!(db.is_empty());
        assert_eq!(db.services.capacity(), 0);
    }

    #[test]
    fn serialize_order() {
        use StoredAttribute::*;
        let v = sample().serialize();
        assert_eq!(v.len(), 7);
        assert!(matches!(v[0], Service { is_primary: true, .. }));
        assert!(matches!(v[1], Service { is_primary: false, .. }));
        assert!(matches!(v[2], Include { .. }));
        assert!(matches!(v[3], Characteristic { .. }));
        assert!(matches!(v[4], Descriptor { .. }));
        assert!(matches!(v[5], Characteristic { handle, .. } if handle == hdl(0x0006)));
        assert!(matches!(v[6], Characteristic { handle, .. } if handle == hdl(0x0021)));
        assert!(Db::default().serialize().is_empty());
    }

    #[test]
    fn round_trip() {
        let db = sample();
        assert_eq!(Db::deserialize(&db.serialize()).unwrap(), db);
        assert_eq!(Db::deserialize(&[]).unwrap(), Db::default());
    }

    #[test]
    fn deserialize_orphan() {
        let mut v = sample().serialize();
        if let StoredAttribute::Characteristic { handle, .. } = &mut v[3] {
            *handle = hdl(0x0010); // Between the two service ranges
        }
        assert_eq!(
            Db::deserialize(&v),
            Err(DeserializeError::OrphanAttribute(hdl(0x0010)))
        );
    }

    #[test]
    fn deserialize_overlapping_services() {
        let svc = |h, e| StoredAttribute::Service {
            handle: hdl(h),
            end_handle: hdl(e),
            uuid: uuid(0x1800),
            is_primary: true,
        };
        // Out of order and overlapping
        assert_eq!(
            Db::deserialize(&[svc(0x0010, 0x0020), svc(0x0001, 0x0015)]),
            Err(DeserializeError::OverlappingService(hdl(0x0001)))
        );
        // Sorted, but sharing a handle
        assert_eq!(
            Db::deserialize(&[svc(0x0001, 0x0010), svc(0x0010, 0x0020)]),
            Err(DeserializeError::OverlappingService(hdl(0x0010)))
        );
        assert!(Db::deserialize(&[svc(0x0001, 0x0010), svc(0x0011, 0x0020)]).is_ok());
    }

    #[test]
    fn deserialize_unknown_include_target() {
        let mut v = sample().serialize();
        if let StoredAttribute::Include { start_handle, .. } = &mut v[2] {
            *start_handle = hdl(0x0040);
        }
        assert!(matches!(
            Db::deserialize(&v),
            Err(DeserializeError::UnknownIncludeTarget { .. })
        ));
    }

    #[test]
    fn deserialize_descriptor_without_characteristic() {
        let v = [
            StoredAttribute::Service {
                handle: hdl(0x0001),
                end_handle: hdl(0x0005),
                uuid: uuid(0x180D),
                is_primary: true,
            },
            StoredAttribute::Descriptor {
                handle: hdl(0x0002),
                uuid: uuid(0x2902),
            },
        ];
        assert_eq!(
            Db::deserialize(&v),
            Err(DeserializeError::DescriptorWithoutCharacteristic(hdl(
                0x0002
            )))
        );
    }

    #[test]
    fn deserialize_misplaced_service() {
        let mut v = sample().serialize();
        v.push(StoredAttribute::Service {
            handle: hdl(0x0021),
            end_handle: hdl(0x0022),
            uuid: uuid(0x1800),
            is_primary: true,
        });
        assert_eq!(
            Db::deserialize(&v),
            Err(DeserializeError::MisplacedService(hdl(0x0021)))
        );
    }

    #[test]
    fn dump() {
        let s = sample().to_string();
        assert!(s.starts_with("[0x0001..=0x000B] Primary Service <0x180D>"));
        assert!(s.contains("    [0x0002] Include 0x0020..=0x002F <0x180F>"));
        assert!(s.contains(
            "    [0x0003] Characteristic <0x2A37> value 0x0004 props 0x10"
        ));
        assert!(s.contains("        [0x0005] Descriptor <0x2902>"));
        assert!(s.contains("[0x0020..=0x002F] Secondary Service <0x180F>"));
        assert!(Db::default().to_string().is_empty());
    }
}
