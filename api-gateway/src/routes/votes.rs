use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use chain::{ConsensusError, ValidationError, Vote};

use crate::state::SharedState;

/// Request body for `POST /node_api/v1/temp/votes`.
///
/// `body` is hex-encoded RLP of a signed [`Vote`].
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub hash: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct AdmitResponse {
    pub status: &'static str,
    pub hash: String,
}

/// `POST /node_api/v1/temp/votes`
///
/// Decodes `body`, casts it through the node's [`chain::VoteManager`], and
/// returns 200. A forged or non-self-consistent signature is a 403; any
/// other validation failure (unknown miner, still warming up) is a 400.
pub async fn submit_vote(
    State(state): State<SharedState>,
    Json(req): Json<VoteRequest>,
) -> Result<(StatusCode, Json<AdmitResponse>), (StatusCode, String)> {
    let bytes = hex::decode(req.body.trim_start_matches("0x"))
        .map_err(|_| bad_request("invalid hex encoding"))?;
    let vote = Vote::decode(&bytes).map_err(|_| bad_request("malformed vote body"))?;
    let hash = vote.hash.to_hex();

    match state.vote_manager.cast_vote(vote) {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(AdmitResponse {
                status: "accepted",
                hash,
            }),
        )),
        Err(ConsensusError::Validation(ValidationError::BadVoteSignature)) => {
            Err((StatusCode::FORBIDDEN, "signer mismatch".to_string()))
        }
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

fn bad_request(msg: &'static str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.to_string())
}
