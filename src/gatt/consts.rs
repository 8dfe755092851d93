use bitflags::bitflags;

use crate::uuid::uuid16_enum;

uuid16_enum! {
    /// GATT profile attribute types ([Vol 3] Part G, Section 3).
    pub enum Declaration {
        PrimaryService = 0x2800,
        SecondaryService = 0x2801,
        Include = 0x2802,
        Characteristic = 0x2803,
    }
}

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    ///
    /// Discovered from the peer's characteristic declaration; kept verbatim,
    /// including any bits this crate does not interpret.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct CharProps: u8 {
        /// Permits broadcasts of the Characteristic Value.
        const BROADCAST = 0x01;
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permits writes of the Characteristic Value without response.
        const WRITE_WITHOUT_RESPONSE = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        const INDICATE = 0x20;
        /// Permits signed writes to the Characteristic Value.
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        /// Additional properties are defined in the Characteristic Extended
        /// Properties descriptor.
        const EXTENDED_PROPERTIES = 0x80;
    }
}

#[cfg(test)]
mod tests {
    use enum_iterator::all;

    use super::*;

    #[test]
    fn declaration_uuids() {
        assert_eq!(u16::from(Declaration::PRIMARY_SERVICE), 0x2800);
        assert_eq!(u16::from(Declaration::CHARACTERISTIC), 0x2803);
        for v in all::<Declaration>() {
            assert_eq!(Declaration::try_from(v.uuid16()).unwrap(), v);
            assert_eq!(v.uuid().as_uuid16(), Some(v.uuid16()));
        }
    }

    #[test]
    fn props_bits() {
        let p = CharProps::READ | CharProps::NOTIFY;
        assert_eq!(p.bits(), 0x12);
        assert_eq!(CharProps::from_bits_retain(0xFF).bits(), 0xFF);
    }
}
