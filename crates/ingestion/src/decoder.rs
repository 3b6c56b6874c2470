//! Wire decoder interface
//!
//! One decoder instance serves exactly one camera. Decoders are pure with
//! respect to the result cache: a failed decode never touches it.

use contracts::{TransportKind, VisionFrame};

use crate::error::Result;

/// Decode one raw input into a canonical frame
pub trait WireDecoder: Send + Sync {
    /// Raw input type (`[u8]` for datagrams, a table reading for polling)
    type Input: ?Sized;

    /// Wire encoding handled by this decoder
    fn transport(&self) -> TransportKind;

    /// Camera index this decoder is bound to
    fn camera_index(&self) -> u32;

    /// Decode `input` received at local time `received_at_us`.
    ///
    /// `Ok(None)` means "no update for this camera", which is not an error.
    ///
    /// # Errors
    /// `MalformedFrame`, `IdentityMismatch` or `StaleUpdate`
    fn decode(&self, input: &Self::Input, received_at_us: i64) -> Result<Option<VisionFrame>>;
}

/// Fail unless `tag_ids` has exactly `declared` entries.
pub(crate) fn check_tag_count(camera: u32, declared: usize, tag_ids: &[i32]) -> Result<()> {
    if tag_ids.len() != declared {
        return Err(crate::IngestionError::malformed(
            camera,
            format!(
                "declared {declared} tags, found {} tag ids",
                tag_ids.len()
            ),
        ));
    }
    Ok(())
}
