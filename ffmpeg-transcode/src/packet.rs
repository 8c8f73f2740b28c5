use ffmpeg_next::Rational;

/// A compressed packet together with the time base its timestamps are in.
#[derive(Clone)]
pub struct RawPacket {
    packet: ffmpeg_next::codec::packet::Packet,
    time_base: Rational,
}

impl RawPacket {
    pub fn pts(&self) -> Option<i64> {
        self.packet.pts()
    }

    pub fn dts(&self) -> Option<i64> {
        self.packet.dts()
    }

    pub fn index(&self) -> usize {
        self.packet.stream()
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Moves the packet onto output stream `index` and rewrites its
    /// timestamps (pts, dts, duration) into `time_base`.
    pub fn retarget(&mut self, index: usize, time_base: Rational) {
        self.packet.set_stream(index);
        self.packet.set_position(-1);
        self.packet.rescale_ts(self.time_base, time_base);
        self.time_base = time_base;
    }

    /// Presentation time in seconds, when the packet carries a pts.
    pub fn pts_secs(&self) -> Option<f64> {
        self.pts().map(|pts| to_secs(pts, self.time_base))
    }

    pub fn get_mut(&mut self) -> &mut ffmpeg_next::codec::packet::Packet {
        &mut self.packet
    }

    pub fn packet(&self) -> &ffmpeg_next::codec::packet::Packet {
        &self.packet
    }
}

impl From<(ffmpeg_next::codec::packet::Packet, Rational)> for RawPacket {
    fn from((packet, time_base): (ffmpeg_next::codec::packet::Packet, Rational)) -> Self {
        Self { packet, time_base }
    }
}

pub(crate) fn to_secs(ts: i64, time_base: Rational) -> f64 {
    ts as f64 * f64::from(time_base)
}
