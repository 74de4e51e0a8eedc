use prometheus_client::encoding::EncodeLabelSet;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Message {
    pub origin: u32,
    pub recipient: u32,
}

impl Message {
    pub fn new(origin: u32, recipient: u32) -> Self {
        Self { origin, recipient }
    }
}
