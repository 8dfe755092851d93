use structbuf::{Packer, Unpacker};

use crate::att::Handle;
use crate::Uuid;

use super::*;

/// One persisted attribute record.
///
/// The unit of [`Db::serialize`] output. On the wire this is a fixed-size
/// little-endian record: the handle, a 128-bit type tag (a GATT
/// [`Declaration`] UUID, or the descriptor's own UUID), and a zero-padded
/// payload whose shape is selected by the tag. Descriptors carry no payload;
/// the tag is the UUID.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum StoredAttribute {
    Service {
        handle: Handle,
        end_handle: Handle,
        uuid: Uuid,
        is_primary: bool,
    },
    Include {
        handle: Handle,
        start_handle: Handle,
        end_handle: Handle,
        uuid: Uuid,
    },
    Characteristic {
        handle: Handle,
        value_handle: Handle,
        uuid: Uuid,
        properties: CharProps,
    },
    Descriptor {
        handle: Handle,
        uuid: Uuid,
    },
}

/// Payload area size. The include payload (2 + 2 + 16) is the largest.
const PAYLOAD: usize = 20;

impl StoredAttribute {
    /// Encoded record size in bytes.
    pub const LEN: usize = 2 + Uuid::BYTES + PAYLOAD;

    /// Returns the record's attribute handle.
    #[must_use]
    pub const fn handle(&self) -> Handle {
        match *self {
            Self::Service { handle, .. }
            | Self::Include { handle, .. }
            | Self::Characteristic { handle, .. }
            | Self::Descriptor { handle, .. } => handle,
        }
    }

    /// Appends the encoded record to `p`. Always writes exactly
    /// [`Self::LEN`] bytes.
    pub fn pack(&self, p: &mut Packer) {
        p.u16(self.handle());
        match *self {
            Self::Service {
                end_handle,
                uuid,
                is_primary,
                ..
            } => {
                let tag = if is_primary {
                    Declaration::PrimaryService
                } else {
                    Declaration::SecondaryService
                };
                p.u128(tag.uuid());
                p.u128(uuid).u16(end_handle).put([0; 2]);
            }
            Self::Include {
                start_handle,
                end_handle,
                uuid,
                ..
            } => {
                p.u128(Declaration::Include.uuid());
                p.u16(start_handle).u16(end_handle).u128(uuid);
            }
            Self::Characteristic {
                value_handle,
                uuid,
                properties,
                ..
            } => {
                p.u128(Declaration::Characteristic.uuid());
                p.u8(properties.bits()).u16(value_handle).u128(uuid);
                p.put([0; 1]);
            }
            Self::Descriptor { uuid, .. } => {
                p.u128(uuid);
                p.put([0; PAYLOAD]);
            }
        }
    }

    /// Decodes one record from an exactly [`Self::LEN`]-byte buffer.
    /// Returns `None` for an invalid handle or a zero UUID.
    #[must_use]
    pub fn unpack(b: &[u8]) -> Option<Self> {
        if b.len() != Self::LEN {
            return None;
        }
        let mut p = Unpacker::new(b);
        let handle = Handle::new(p.u16())?;
        let tag = Uuid::new(p.u128())?;
        Some(match tag.as_uuid16().and_then(|u| Declaration::try_from(u).ok()) {
            Some(d @ (Declaration::PrimaryService | Declaration::SecondaryService)) => {
                let uuid = Uuid::new(p.u128())?;
                Self::Service {
                    handle,
                    end_handle: Handle::new(p.u16())?,
                    uuid,
                    is_primary: matches!(d, Declaration::PrimaryService),
                }
            }
            Some(Declaration::Include) => Self::Include {
                handle,
                start_handle: Handle::new(p.u16())?,
                end_handle: Handle::new(p.u16())?,
                uuid: Uuid::new(p.u128())?,
            },
            Some(Declaration::Characteristic) => {
                let properties = CharProps::from_bits_retain(p.u8());
                Self::Characteristic {
                    handle,
                    value_handle: Handle::new(p.u16())?,
                    uuid: Uuid::new(p.u128())?,
                    properties,
                }
            }
            _ => Self::Descriptor { handle, uuid: tag },
        })
    }
}

#[cfg(test)]
mod tests {
    use structbuf::{Pack, StructBuf};

    use super::db::tests::{hdl, uuid};
    use super::*;

    fn encode(at: &StoredAttribute) -> Vec<u8> {
        let mut b = StructBuf::new(StoredAttribute::LEN);
        at.pack(&mut b.append());
        assert_eq!(b.len(), StoredAttribute::LEN);
        b.as_ref().to_vec()
    }

    #[test]
    fn record_codec() {
        let v = [
            StoredAttribute::Service {
                handle: hdl(0x0001),
                end_handle: hdl(0x0007),
                uuid: uuid(0x180D),
                is_primary: true,
            },
            StoredAttribute::Service {
                handle: hdl(0x0020),
                end_handle: hdl(0x002F),
                uuid: uuid(0xDEADBEEF_DEAD_BEEF_DEAD_BEEFDEADBEEF),
                is_primary: false,
            },
            StoredAttribute::Include {
                handle: hdl(0x0002),
                start_handle: hdl(0x0020),
                end_handle: hdl(0x002F),
                uuid: uuid(0x180F),
            },
            StoredAttribute::Characteristic {
                handle: hdl(0x0003),
                value_handle: hdl(0x0004),
                uuid: uuid(0x2A37),
                properties: CharProps::NOTIFY | CharProps::READ,
            },
            StoredAttribute::Descriptor {
                handle: hdl(0x0005),
                uuid: uuid(0x2902),
            },
        ];
        for at in &v {
            let b = encode(at);
            assert_eq!(StoredAttribute::unpack(&b), Some(*at));
        }
    }

    #[test]
    fn record_layout() {
        let b = encode(&StoredAttribute::Include {
            handle: hdl(0x0002),
            start_handle: hdl(0x0020),
            end_handle: hdl(0x002F),
            uuid: uuid(0x180F),
        });
        assert_eq!(&b[..2], &[0x02, 0x00]);
        // Include tag expanded onto the base UUID, little-endian
        assert_eq!(
            u128::from_le_bytes(b[2..18].try_into().unwrap()),
            0x00002802_0000_1000_8000_00805F9B34FB
        );
        assert_eq!(&b[18..22], &[0x20, 0x00, 0x2F, 0x00]);
    }

    #[test]
    fn descriptor_has_no_payload() {
        let b = encode(&StoredAttribute::Descriptor {
            handle: hdl(0x0005),
            uuid: uuid(0x2902),
        });
        assert!(b[18..].iter().all(|&v| v == 0));
    }

    #[test]
    fn unpack_rejects_bad_records() {
        let at = StoredAttribute::Descriptor {
            handle: hdl(0x0005),
            uuid: uuid(0x2902),
        };
        let b = encode(&at);
        assert_eq!(StoredAttribute::unpack(&b[..StoredAttribute::LEN - 1]), None);
        let mut zero_hdl = b.clone();
        zero_hdl[0] = 0;
        zero_hdl[1] = 0;
        assert_eq!(StoredAttribute::unpack(&zero_hdl), None);
        let mut zero_tag = b;
        zero_tag[2..18].fill(0);
        assert_eq!(StoredAttribute::unpack(&zero_tag), None);
    }
}
