/*
 *  Copyright (C) 2026 the project contributors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! External wire contracts: the RTCP transport-feedback encoder, the
//! sender that ships built packets, and the media packet header this engine
//! reads arrivals from. All are external collaborators — this crate only
//! depends on the traits.

/// A media packet header carrying (at minimum) the transport-wide sequence
/// number extension this engine tracks.
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    pub ssrc: u32,
    pub payload_type: u8,
    /// `None` when the packet carries no transport sequence number
    /// extension; such packets are logged once and dropped.
    pub transport_sequence: Option<u16>,
    /// The 24-bit absolute-send-time header extension (6.18 fixed-point
    /// seconds), if present on this packet. `None` when the sender didn't
    /// attach one; the predictor then sees a send time of zero.
    pub abs_send_time: Option<u32>,
    pub padding_len: u32,
    pub header_len: u32,
}

/// An RTCP transport-feedback packet under construction. Implemented
/// externally by the wire codec; this engine only fills one in.
pub trait TransportFeedbackPacket: std::any::Any {
    fn set_media_ssrc(&mut self, ssrc: u32);
    fn set_base(&mut self, seq: u16, base_time_us: i64);
    fn set_feedback_sequence_number(&mut self, counter: u8);
    /// Append one received packet. Returns `false` when the packet is at
    /// capacity and the entry was not added.
    fn add_received_packet(&mut self, seq: u16, arrival_us: i64) -> bool;
}

/// Ships fully-built feedback to the sender side.
pub trait FeedbackSender: Send + Sync {
    fn send_transport_feedback(&self, packet: &dyn TransportFeedbackPacket);
    fn send_application_packet(&self, sub_type: u8, name: [u8; 4], payload: &[u8]);
}
