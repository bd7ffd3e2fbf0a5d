use bytes::Bytes;

/// Borrowed view over one compressed access unit.
///
/// The bytes belong to the reader that produced the view and are reused by
/// its next read.
#[derive(Debug, Clone, Copy)]
pub struct PacketRef<'a> {
    data: &'a [u8],
    stream_index: usize,
    pts: Option<i64>,
    dts: Option<i64>,
    is_key: bool,
}

impl<'a> PacketRef<'a> {
    pub fn new(data: &'a [u8], stream_index: usize) -> Self {
        Self {
            data,
            stream_index,
            pts: None,
            dts: None,
            is_key: false,
        }
    }

    pub fn with_timestamps(mut self, pts: Option<i64>, dts: Option<i64>) -> Self {
        self.pts = pts;
        self.dts = dts;
        self
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn index(&self) -> usize {
        self.stream_index
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn dts(&self) -> Option<i64> {
        self.dts
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn to_owned_packet(&self) -> Packet {
        Packet {
            data: Bytes::copy_from_slice(self.data),
            stream_index: self.stream_index,
            pts: self.pts,
            dts: self.dts,
            is_key: self.is_key,
        }
    }
}

/// Owned compressed access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    data: Bytes,
    stream_index: usize,
    pts: Option<i64>,
    dts: Option<i64>,
    is_key: bool,
}

impl Packet {
    pub fn new(data: impl Into<Bytes>, stream_index: usize) -> Self {
        Self {
            data: data.into(),
            stream_index,
            pts: None,
            dts: None,
            is_key: false,
        }
    }

    pub fn with_timestamps(mut self, pts: Option<i64>, dts: Option<i64>) -> Self {
        self.pts = pts;
        self.dts = dts;
        self
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn index(&self) -> usize {
        self.stream_index
    }

    pub fn as_packet_ref(&self) -> PacketRef<'_> {
        PacketRef {
            data: &self.data,
            stream_index: self.stream_index,
            pts: self.pts,
            dts: self.dts,
            is_key: self.is_key,
        }
    }
}
