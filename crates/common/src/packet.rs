//! Compressed input handed to the hardware codec.

/// One compressed video access unit from the demuxer.
///
/// Timestamps are in microseconds; `None` means the container did not
/// provide one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoPacket {
    pub data: Vec<u8>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
}

impl VideoPacket {
    pub fn new(data: Vec<u8>, pts: Option<i64>, dts: Option<i64>) -> Self {
        Self { data, pts, dts }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
