//! Data body: a channel subframe header followed by one subframe per
//! channel.
//!
//! Subframes are variable length. Each is located by adding the previous
//! subframe's `channelLength` (plus its own 4-byte length field) to the
//! previous offset. A subframe that declares more bytes than the body
//! holds rejects the whole frame; a subframe whose fields are merely odd
//! (garbled timestamp text, unknown codes) decodes as-is.

use bytes::BufMut;

use crate::wire::{self, FieldReader, WORD, padded_len};
use crate::{BodyCodec, JulianDate, ProtocolError};

// ---------------------------------------------------------------------------
// Channel description codes
// ---------------------------------------------------------------------------

/// The "transformation" byte of a channel description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionFormat {
    None,
    CanadianBeforeSignature,
    CanadianAfterSignature,
    Other(u8),
}

impl CompressionFormat {
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::CanadianBeforeSignature => 1,
            Self::CanadianAfterSignature => 2,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for CompressionFormat {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::CanadianBeforeSignature,
            2 => Self::CanadianAfterSignature,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    Seismic,
    Hydroacoustic,
    Infrasonic,
    Weather,
    Other(u8),
}

impl SensorType {
    pub fn code(self) -> u8 {
        match self {
            Self::Seismic => 0,
            Self::Hydroacoustic => 1,
            Self::Infrasonic => 2,
            Self::Weather => 3,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for SensorType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Seismic,
            1 => Self::Hydroacoustic,
            2 => Self::Infrasonic,
            3 => Self::Weather,
            other => Self::Other(other),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelSubframeHeader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSubframeHeader {
    pub num_of_channels: usize,
    /// Frame duration in milliseconds.
    pub frame_time_length: i32,
    pub nominal_time: JulianDate,
    /// Concatenated 10-character channel names, one per channel.
    pub channel_string: String,
}

impl ChannelSubframeHeader {
    const FIXED_LEN: usize = 4 + 4 + JulianDate::LEN + 4;

    pub fn channel_string_count(&self) -> usize {
        self.channel_string.chars().count()
    }

    pub fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + padded_len(self.channel_string_count())
    }

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, ProtocolError> {
        let num_of_channels = reader.read_len("numOfChannels")?;
        let frame_time_length = reader.read_i32("frameTimeLength")?;
        let nominal_time = JulianDate::decode(reader, "nominalTime")?;
        let count = reader.read_len("channelStringCount")?;
        let channel_string = reader.read_raw_text("channelString", count)?;

        // Some stations omit the word padding after the channel string.
        // With padding present, the pad bytes and the high bytes of the
        // first channelLength are all zero.
        let pad = padded_len(count) - count;
        if pad > 0 {
            match reader.peek(WORD) {
                Some(next) if next.iter().any(|&b| b != 0) => {
                    tracing::debug!(
                        count,
                        "channel string is not word aligned"
                    );
                }
                _ if reader.remaining() >= pad => {
                    reader.skip("channelString padding", pad)?;
                }
                _ => {}
            }
        }

        Ok(Self {
            num_of_channels,
            frame_time_length,
            nominal_time,
            channel_string,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        wire::put_len(buf, "numOfChannels", self.num_of_channels)?;
        buf.put_i32(self.frame_time_length);
        self.nominal_time.encode(buf)?;
        let channel_string =
            wire::latin1_bytes("channelString", &self.channel_string)?;
        wire::put_len(buf, "channelStringCount", channel_string.len())?;
        wire::put_padded(buf, &channel_string);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChannelSubframe
// ---------------------------------------------------------------------------

/// One channel's samples and metadata.
///
/// `channelLength` is not stored: it is derived from the content on
/// encode. Channel status, channel data and the authentication value are
/// each zero-padded to a word boundary on the wire; the fields here hold
/// the unpadded bytes their declared sizes describe.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSubframe {
    pub auth_offset: i32,
    pub authentication_on: bool,
    pub compression_format: CompressionFormat,
    pub sensor_type: SensorType,
    /// The "option flag": set for calibration data.
    pub is_calib: bool,
    pub site_name: String,
    pub channel_name: String,
    pub location_name: String,
    /// CSS 3.0 data type code, e.g. `s4`.
    pub data_type: String,
    pub calibration_factor: f32,
    pub calibration_period: f32,
    pub time_stamp: JulianDate,
    /// Subframe duration in milliseconds.
    pub subframe_time_length: i32,
    pub samples: i32,
    pub channel_status: Vec<u8>,
    pub channel_data: Vec<u8>,
    pub subframe_count: i32,
    pub auth_key_identifier: i32,
    pub auth_value: Vec<u8>,
}

impl ChannelSubframe {
    pub const SITE_LEN: usize = 5;
    pub const CHANNEL_LEN: usize = 3;
    pub const LOCATION_LEN: usize = 2;
    /// Two bytes, so the channel description stays at 24 bytes.
    pub const DATA_TYPE_LEN: usize = 2;
    /// Bytes of a subframe with empty status, data and authentication.
    pub const MIN_LEN: usize = 4 * 9 + 24 + JulianDate::LEN;

    pub fn encoded_len(&self) -> usize {
        Self::MIN_LEN
            + padded_len(self.channel_status.len())
            + padded_len(self.channel_data.len())
            + padded_len(self.auth_value.len())
    }

    /// The declared `channelLength`: every byte after that field.
    pub fn channel_length(&self) -> usize {
        self.encoded_len() - 4
    }

    /// The 10-character `site + channel + location` name.
    pub fn channel_string(&self) -> String {
        format!(
            "{:<5}{:<3}{:<2}",
            self.site_name, self.channel_name, self.location_name
        )
    }

    /// Samples per second, or `None` for a zero-length subframe.
    pub fn sample_rate_hz(&self) -> Option<f64> {
        (self.subframe_time_length > 0).then(|| {
            f64::from(self.samples) / f64::from(self.subframe_time_length)
                * 1000.0
        })
    }

    /// Time of the last sample in Unix milliseconds.
    ///
    /// The first sample sits at `time_stamp`, so the last one is a single
    /// sample period short of the subframe length. `None` if the
    /// timestamp is not a calendar instant or there are no samples.
    pub fn end_time_millis(&self) -> Option<i64> {
        let start = self.time_stamp.to_unix_millis()?;
        let rate = self.sample_rate_hz().filter(|r| *r > 0.0)?;
        let duration = f64::from(self.subframe_time_length) - 1000.0 / rate;
        Some(start + duration as i64)
    }

    /// Bytes per sample for uncompressed CSS 3.0 data types.
    pub fn sample_width(&self) -> Option<usize> {
        match self.data_type.as_str() {
            "s2" | "i2" | "g2" => Some(2),
            "s3" | "i3" => Some(3),
            "s4" | "i4" | "t4" | "f4" => Some(4),
            "t8" | "f8" | "s8" | "i8" => Some(8),
            _ => None,
        }
    }

    /// Decodes one subframe from the start of `region`.
    ///
    /// Returns the subframe and the number of bytes it occupies.
    fn decode(region: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let mut outer = FieldReader::new(region);
        let channel_length = outer.read_len("channelLength")?;
        let content = outer.read_bytes("channelLength", channel_length)?;
        let mut r = FieldReader::new(content);

        let auth_offset = r.read_i32("authOffset")?;
        let authentication_on = r.read_flag("authentication")?;
        let compression_format =
            CompressionFormat::from(r.read_u8("transformation")?);
        let sensor_type = SensorType::from(r.read_u8("sensorType")?);
        let is_calib = r.read_flag("optionFlag")?;
        let site_name = r.read_text("siteName", Self::SITE_LEN)?;
        let channel_name = r.read_text("channelName", Self::CHANNEL_LEN)?;
        let location_name = r.read_text("locationName", Self::LOCATION_LEN)?;
        let data_type = r.read_text("dataType", Self::DATA_TYPE_LEN)?;
        let calibration_factor = r.read_f32("calibrationFactor")?;
        let calibration_period = r.read_f32("calibrationPeriod")?;
        let time_stamp = JulianDate::decode(&mut r, "timeStamp")?;
        if !time_stamp.is_well_formed() {
            tracing::debug!(
                %time_stamp,
                %site_name,
                "subframe timestamp is not a calendar instant"
            );
        }
        let subframe_time_length = r.read_i32("subframeTimeLength")?;
        let samples = r.read_i32("samples")?;
        let status_size = r.read_len("channelStatusSize")?;
        let channel_status =
            r.read_padded_bytes("channelStatusData", status_size)?.to_vec();
        let data_size = r.read_len("dataSize")?;
        let channel_data =
            r.read_padded_bytes("channelData", data_size)?.to_vec();
        let subframe_count = r.read_i32("subframeCount")?;
        let auth_key_identifier = r.read_i32("authKeyIdentifier")?;
        let auth_size = r.read_len("authSize")?;
        let auth_value = r.read_padded_bytes("authValue", auth_size)?.to_vec();
        r.finish("authValue")?;

        let subframe = Self {
            auth_offset,
            authentication_on,
            compression_format,
            sensor_type,
            is_calib,
            site_name,
            channel_name,
            location_name,
            data_type,
            calibration_factor,
            calibration_period,
            time_stamp,
            subframe_time_length,
            samples,
            channel_status,
            channel_data,
            subframe_count,
            auth_key_identifier,
            auth_value,
        };
        Ok((subframe, 4 + channel_length))
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        wire::put_len(buf, "channelLength", self.channel_length())?;
        buf.put_i32(self.auth_offset);
        buf.put_u8(u8::from(self.authentication_on));
        buf.put_u8(self.compression_format.code());
        buf.put_u8(self.sensor_type.code());
        buf.put_u8(u8::from(self.is_calib));
        wire::put_text(buf, "siteName", &self.site_name, Self::SITE_LEN)?;
        wire::put_text(
            buf,
            "channelName",
            &self.channel_name,
            Self::CHANNEL_LEN,
        )?;
        wire::put_text(
            buf,
            "locationName",
            &self.location_name,
            Self::LOCATION_LEN,
        )?;
        wire::put_text(buf, "dataType", &self.data_type, Self::DATA_TYPE_LEN)?;
        buf.put_f32(self.calibration_factor);
        buf.put_f32(self.calibration_period);
        self.time_stamp.encode(buf)?;
        buf.put_i32(self.subframe_time_length);
        buf.put_i32(self.samples);
        wire::put_len(buf, "channelStatusSize", self.channel_status.len())?;
        wire::put_padded(buf, &self.channel_status);
        wire::put_len(buf, "dataSize", self.channel_data.len())?;
        wire::put_padded(buf, &self.channel_data);
        buf.put_i32(self.subframe_count);
        buf.put_i32(self.auth_key_identifier);
        wire::put_len(buf, "authSize", self.auth_value.len())?;
        wire::put_padded(buf, &self.auth_value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DataFrame
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub channel_header: ChannelSubframeHeader,
    pub subframes: Vec<ChannelSubframe>,
}

impl DataFrame {
    /// Builds a frame whose channel header describes `subframes`.
    pub fn new(
        frame_time_length: i32,
        nominal_time: JulianDate,
        subframes: Vec<ChannelSubframe>,
    ) -> Self {
        let channel_string =
            subframes.iter().map(ChannelSubframe::channel_string).collect();
        Self {
            channel_header: ChannelSubframeHeader {
                num_of_channels: subframes.len(),
                frame_time_length,
                nominal_time,
                channel_string,
            },
            subframes,
        }
    }
}

impl BodyCodec for DataFrame {
    fn decode_body(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = FieldReader::new(body);
        let channel_header = ChannelSubframeHeader::decode(&mut reader)?;
        let mut offset = reader.position();

        let capacity = channel_header
            .num_of_channels
            .min(body.len() / ChannelSubframe::MIN_LEN);
        let mut subframes = Vec::with_capacity(capacity);
        for _ in 0..channel_header.num_of_channels {
            let (subframe, used) = ChannelSubframe::decode(&body[offset..])?;
            subframes.push(subframe);
            offset += used;
        }
        if offset < body.len() {
            return Err(ProtocolError::TrailingBytes {
                field: "last channel subframe",
                extra: body.len() - offset,
            });
        }

        Ok(Self {
            channel_header,
            subframes,
        })
    }

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        if self.channel_header.num_of_channels != self.subframes.len() {
            return Err(ProtocolError::invalid_field(
                "numOfChannels",
                format!(
                    "header declares {} channels but {} subframes are present",
                    self.channel_header.num_of_channels,
                    self.subframes.len()
                ),
            ));
        }
        self.channel_header.encode(buf)?;
        for subframe in &self.subframes {
            subframe.encode(buf)?;
        }
        Ok(())
    }

    fn body_len(&self) -> usize {
        self.channel_header.encoded_len()
            + self
                .subframes
                .iter()
                .map(ChannelSubframe::encoded_len)
                .sum::<usize>()
    }
}
