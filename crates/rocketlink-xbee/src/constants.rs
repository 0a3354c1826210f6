//! XBee API mode constants.

// ============================================================================
// Framing
// ============================================================================

/// Start of every API frame. Never escaped.
pub const START_DELIMITER: u8 = 0x7E;
/// Marks the next byte as escaped.
pub const ESCAPE: u8 = 0x7D;
/// Software flow control on.
pub const XON: u8 = 0x11;
/// Software flow control off.
pub const XOFF: u8 = 0x13;
/// Escaped bytes are sent XORed with this mask.
pub const ESCAPE_MASK: u8 = 0x20;

/// Bytes that must be escaped anywhere after the start delimiter.
pub const ESCAPED_BYTES: [u8; 4] = [START_DELIMITER, ESCAPE, XON, XOFF];

// ============================================================================
// Frame Types
// ============================================================================

/// Transmit request, module input.
pub const FRAME_TX_REQUEST: u8 = 0x10;
/// Receive packet, module output.
pub const FRAME_RX_INDICATOR: u8 = 0x90;
/// Transmit status, module output.
pub const FRAME_TX_STATUS: u8 = 0x8B;

// ============================================================================
// Addressing and Field Values
// ============================================================================

/// 64-bit broadcast address.
pub const BROADCAST_ADDRESS: u64 = 0x0000_0000_0000_FFFF;
/// 16-bit network address reported when it is unknown.
pub const UNKNOWN_NETWORK_ADDRESS: u16 = 0xFFFE;
/// Receive options reported on RX indicators: packet was a broadcast.
pub const RX_OPTIONS_BROADCAST: u8 = 0x02;
/// Delivery status reported on success.
pub const DELIVERY_SUCCESS: u8 = 0x00;
/// Discovery status reported when no discovery overhead occurred.
pub const DISCOVERY_NONE: u8 = 0x00;

/// Fixed header bytes of a TX request after the type byte.
pub const TX_REQUEST_HEADER_LEN: usize = 13;
/// Fixed header bytes of an RX indicator after the type byte.
pub const RX_INDICATOR_HEADER_LEN: usize = 11;
/// Payload bytes of a TX status after the type byte.
pub const TX_STATUS_LEN: usize = 6;
