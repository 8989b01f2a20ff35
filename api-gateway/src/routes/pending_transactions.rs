use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use chain::{MempoolError, Tx};

use crate::state::SharedState;

/// Request body for `POST /node_api/v1/temp/pending_transactions`.
///
/// `body` is hex-encoded RLP of a signed [`Tx`]; `hash` is the sender's
/// claimed transaction hash, echoed back but not itself trusted — the
/// mempool recomputes it from `body` on admission.
#[derive(Debug, Deserialize)]
pub struct PendingTransactionRequest {
    pub hash: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct AdmitResponse {
    pub status: &'static str,
    pub hash: String,
}

/// `POST /node_api/v1/temp/pending_transactions`
///
/// Decodes `body`, admits it to the mempool, and returns 200. A malformed
/// payload is a 400; a transaction already sitting in the mempool is a
/// 409 (the sender may safely retry submission, since admission is
/// idempotent from their point of view).
pub async fn submit_pending_transaction(
    State(state): State<SharedState>,
    Json(req): Json<PendingTransactionRequest>,
) -> Result<(StatusCode, Json<AdmitResponse>), (StatusCode, String)> {
    let bytes = hex::decode(req.body.trim_start_matches("0x"))
        .map_err(|_| bad_request("invalid hex encoding"))?;
    let tx = Tx::decode(&bytes).map_err(|_| bad_request("malformed transaction body"))?;
    let hash = tx.hash.to_hex();

    match state.mempool.admit(tx) {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(AdmitResponse {
                status: "admitted",
                hash,
            }),
        )),
        Err(MempoolError::AlreadyKnown(_)) => {
            Err((StatusCode::CONFLICT, "transaction already known".to_string()))
        }
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

fn bad_request(msg: &'static str) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.to_string())
}
