//! Messages exchanged between participants.
//!
//! A [Message] carries one participant's signature share for a round. The signer is
//! not encoded: it is the (authenticated) sender reported by the transport.

use bytes::{Buf, BufMut};
use commoncoin_codec::{varint::UInt, EncodeSize, Error, Read, ReadExt, Write};

/// Tag of a [Message] carrying a coin share.
pub const COIN: u8 = 0;

/// A signature share for a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message<P> {
    pub round: u64,
    pub share: P,
}

impl<P> Message<P> {
    pub fn new(round: u64, share: P) -> Self {
        Self { round, share }
    }
}

impl<P: Write> Write for Message<P> {
    fn write(&self, buf: &mut impl BufMut) {
        COIN.write(buf);
        UInt(self.round).write(buf);
        self.share.write(buf);
    }
}

impl<P: Read<Cfg = ()>> Read for Message<P> {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, Error> {
        let tag = u8::read(buf)?;
        if tag != COIN {
            return Err(Error::InvalidEnum(tag));
        }
        let round = UInt::read(buf)?.into();
        let share = P::read(buf)?;
        Ok(Self { round, share })
    }
}

impl<P: EncodeSize> EncodeSize for Message<P> {
    fn encode_size(&self) -> usize {
        COIN.encode_size() + UInt(self.round).encode_size() + self.share.encode_size()
    }
}
