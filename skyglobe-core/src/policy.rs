use std::fmt::Debug;

use crate::model::PlaceCandidate;

/// Picks one place out of several geocoding candidates.
pub trait CandidatePolicy: Send + Sync + Debug {
    fn choose<'a>(&self, candidates: &'a [PlaceCandidate]) -> Option<&'a PlaceCandidate>;
}

/// Trust the gateway's ranking: the first candidate wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct UseFirstGatewayRankedCandidate;

impl CandidatePolicy for UseFirstGatewayRankedCandidate {
    fn choose<'a>(&self, candidates: &'a [PlaceCandidate]) -> Option<&'a PlaceCandidate> {
        candidates.first()
    }
}
