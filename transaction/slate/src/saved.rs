// Copyright (c) 2024 Botho Foundation

use crate::ParticipantId;
use bth_crypto_commitment::BlindingFactor;
use core::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A participant's secrets for one session, kept locally between rounds and
/// never sent to a peer.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SavedSlate {
    /// Session.
    #[zeroize(skip)]
    pub id: Uuid,
    /// Whose secrets these are. For a missing-party slate this is the
    /// absent shareholder, not the participant holding the record.
    #[zeroize(skip)]
    pub participant_id: ParticipantId,
    /// `b_p`: this participant's share of the new joint output's blinding,
    /// or the blinding of its received output.
    pub blind: BlindingFactor,
    /// Asset blinding of an input whose opening this participant knows.
    pub asset_blind: BlindingFactor,
    /// `x_p`, the private excess.
    pub excess_blind: BlindingFactor,
    /// `r_p`, the signing nonce. Also seeds the bulletproof tau secrets.
    pub nonce: BlindingFactor,
}

impl fmt::Debug for SavedSlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavedSlate")
            .field("id", &self.id)
            .field("participant_id", &self.participant_id)
            .finish_non_exhaustive()
    }
}
