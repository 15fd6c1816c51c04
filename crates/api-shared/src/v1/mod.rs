//! Version 1 of the provider contracts.
//!
//! Each provider endpoint accepts its payload wrapped in a `{"body": ...}` envelope
//! and answers with a provider-specific response object.

pub mod clincalc;
pub mod mdcalc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Envelope wrapping a provider payload on the inbound REST boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[aliases(
    MdCalcPreventEnvelope = RequestEnvelope<mdcalc::MdCalcPreventRequest>,
    ClinCalcPreventEnvelope = RequestEnvelope<clincalc::ClinCalcPreventRequest>
)]
pub struct RequestEnvelope<T> {
    pub body: T,
}

impl<T> RequestEnvelope<T> {
    pub fn new(body: T) -> Self {
        Self { body }
    }

    pub fn into_inner(self) -> T {
        self.body
    }
}
