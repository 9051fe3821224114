//! RFC 1071 checksum helpers and the O(1) counter-patch fast path.
//!
//! `checksum_full`/`checksum_finalize`/`checksum_incomplete` are the same
//! fold-and-flip routine the teacher crate ships as
//! `calc_ip_checksum`/`calc_ip_checksum_finalize`/`calc_ip_checksum_incomplete`;
//! `patch_counter_checksum` is new and is the only checksum routine actually
//! used on the hot send path, since recomputing the full checksum on every
//! frame would dominate the per-frame budget.

/// Calculate a full RFC 1071 checksum over `data` and return the on-wire
/// (complemented) value. Equivalent to the teacher's `calc_ip_checksum`.
pub fn checksum_full(data: &[u8]) -> u16 {
    checksum_finalize(checksum_incomplete(data))
}

/// Accumulate `data` into a running RFC 1071 sum without folding or
/// complementing, so partial sums (e.g. pseudo-header + payload) can be
/// combined before a single final fold.
pub fn checksum_incomplete(data: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    let mut pairs = data.chunks_exact(2);
    for pair in &mut pairs {
        sum += u16::from_be_bytes([pair[0], pair[1]]) as u32;
    }
    if let [last] = pairs.remainder() {
        sum += (*last as u32) << 8;
    }
    sum
}

/// Fold a 32-bit accumulator into 16 bits and take the one's complement.
pub fn checksum_finalize(sum: u32) -> u16 {
    let mut sum = sum;
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Uncomplemented checksum of a frame template, captured once right after
/// the Frame Factory builds it. `raw_cksum` below combines this with the
/// checksum of a new counter value in constant time.
pub fn uncomplemented(wire_checksum: u16) -> u16 {
    !wire_checksum
}

/// One's-complement sum of the 8 counter bytes, in host byte order, as laid
/// out on the wire (spec: "raw_cksum(counter_bytes)").
fn raw_cksum_u64(counter: u64) -> u32 {
    checksum_incomplete(&counter.to_ne_bytes())
}

/// Patch a template's UDP checksum for a new counter value in O(1), per the
/// Checksum Patcher component:
///
/// 1. `sum = template_uncomplemented + raw_cksum(counter_bytes)`
/// 2. fold carries
/// 3. complement and mask to 16 bits
/// 4. substitute `0xFFFF` if the result is zero (UDP "no checksum" convention)
pub fn patch_counter_checksum(template_uncomplemented: u16, counter: u64) -> u16 {
    let sum = template_uncomplemented as u32 + raw_cksum_u64(counter);
    let folded = checksum_finalize(sum);
    if folded == 0 {
        0xFFFF
    } else {
        folded
    }
}
