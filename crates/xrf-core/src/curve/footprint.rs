/// Inclusive channel interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpan {
    pub start: usize,
    pub end: usize,
}

impl ChannelSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn contains(&self, channel: usize) -> bool {
        (self.start..=self.end).contains(&channel)
    }

    pub fn intersects(&self, other: &ChannelSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Union of the channel spans a signature occupies under one calibration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelFootprint {
    spans: Vec<ChannelSpan>,
}

impl ChannelFootprint {
    pub fn new(spans: Vec<ChannelSpan>) -> Self {
        Self { spans }
    }

    pub fn spans(&self) -> &[ChannelSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn contains(&self, channel: usize) -> bool {
        self.spans.iter().any(|span| span.contains(channel))
    }

    pub fn intersects(&self, other: &ChannelFootprint) -> bool {
        self.spans
            .iter()
            .any(|span| other.spans.iter().any(|candidate| span.intersects(candidate)))
    }
}
