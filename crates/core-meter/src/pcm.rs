/// Borrowed sample storage for one audio callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleData<'a> {
    F32(&'a [f32]),
    I16(&'a [i16]),
    I32(&'a [i32]),
}

impl<'a> SampleData<'a> {
    pub fn len(&self) -> usize {
        match self {
            SampleData::F32(samples) => samples.len(),
            SampleData::I16(samples) => samples.len(),
            SampleData::I32(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> From<&'a [f32]> for SampleData<'a> {
    fn from(samples: &'a [f32]) -> Self {
        SampleData::F32(samples)
    }
}

impl<'a> From<&'a [i16]> for SampleData<'a> {
    fn from(samples: &'a [i16]) -> Self {
        SampleData::I16(samples)
    }
}

impl<'a> From<&'a [i32]> for SampleData<'a> {
    fn from(samples: &'a [i32]) -> Self {
        SampleData::I32(samples)
    }
}

// Dividing by MAX leaves MIN slightly below -1.0, matching the platform
// converters; the lookup table clamps anything at or above 0 dB.
pub(crate) fn i16_to_f32(value: i16) -> f32 {
    value as f32 / i16::MAX as f32
}

pub(crate) fn i32_to_f32(value: i32) -> f32 {
    value as f32 / i32::MAX as f32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmLayout {
    /// Channel `c` occupies `[c * frames, (c + 1) * frames)`.
    Planar,
    /// Frame `f` occupies `[f * channels, (f + 1) * channels)`.
    Interleaved,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcmBuffer<'a> {
    data: SampleData<'a>,
    channel_count: usize,
    frame_length: usize,
    layout: PcmLayout,
}

impl<'a> PcmBuffer<'a> {
    pub fn planar(data: impl Into<SampleData<'a>>, channel_count: usize) -> Self {
        Self::with_layout(data.into(), channel_count, PcmLayout::Planar)
    }

    pub fn interleaved(data: impl Into<SampleData<'a>>, channel_count: usize) -> Self {
        Self::with_layout(data.into(), channel_count, PcmLayout::Interleaved)
    }

    pub const fn empty() -> Self {
        Self {
            data: SampleData::F32(&[]),
            channel_count: 0,
            frame_length: 0,
            layout: PcmLayout::Interleaved,
        }
    }

    fn with_layout(data: SampleData<'a>, channel_count: usize, layout: PcmLayout) -> Self {
        let frame_length = if channel_count == 0 {
            0
        } else {
            data.len() / channel_count
        };
        Self {
            data,
            channel_count,
            frame_length,
            layout,
        }
    }

    pub fn data(&self) -> SampleData<'a> {
        self.data
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn layout(&self) -> PcmLayout {
        self.layout
    }

    /// Distance between consecutive frames of one channel.
    pub fn stride(&self) -> usize {
        match self.layout {
            PcmLayout::Planar => 1,
            PcmLayout::Interleaved => self.channel_count,
        }
    }

    /// Index of the first sample of `channel`.
    pub fn channel_offset(&self, channel: usize) -> usize {
        match self.layout {
            PcmLayout::Planar => channel * self.frame_length,
            PcmLayout::Interleaved => channel,
        }
    }

    pub fn is_silent_shape(&self) -> bool {
        self.channel_count == 0 || self.frame_length == 0
    }
}
